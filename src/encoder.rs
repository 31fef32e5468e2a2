//! Mono to ambisonic encoding.

use crate::bus::AmbisonicBus;
use crate::spherical_harmonics::{self, channel_count, Order, MAX_ORDER};

/// Projects a mono signal onto the ambisonic channels of one direction.
///
/// Each source owns exactly one encoder. Gains only change through
/// [`MonoEncoder::update_gains`], and a change is spread linearly over the
/// next processed block.
#[derive(Debug, Clone)]
pub struct MonoEncoder {
    order: Order,
    azimuth: f64,
    elevation: f64,
    gains: Vec<f32>,
    previous: Vec<f32>,
}

impl MonoEncoder {
    /// An encoder already pointing at (`azimuth`, `elevation`), in degrees.
    pub fn new(order: Order, azimuth: f64, elevation: f64) -> Self {
        let mut encoder = Self {
            order,
            azimuth,
            elevation,
            gains: vec![0.0; channel_count(order)],
            previous: vec![0.0; channel_count(order)],
        };
        encoder.update_gains();
        encoder.previous.copy_from_slice(&encoder.gains);
        encoder
    }

    /// Ambisonic order.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Number of channels this encoder writes.
    pub fn channel_count(&self) -> usize {
        self.gains.len()
    }

    /// Current azimuth in degrees.
    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    /// Current elevation in degrees.
    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    /// Change the direction. Takes effect at the next
    /// [`MonoEncoder::update_gains`].
    pub fn set_direction(&mut self, azimuth: f64, elevation: f64) {
        self.azimuth = azimuth;
        self.elevation = elevation;
    }

    /// Recompute channel gains from the current direction.
    pub fn update_gains(&mut self) {
        let mut harmonics = [0.0; (MAX_ORDER + 1) * (MAX_ORDER + 1)];
        spherical_harmonics::evaluate(self.order, self.azimuth, self.elevation, &mut harmonics);
        for (gain, h) in self.gains.iter_mut().zip(harmonics) {
            *gain = h as f32;
        }
    }

    /// Target channel gains.
    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    /// Mix `input` into `bus`, adding to whatever is already there.
    pub fn process(&mut self, input: &[f32], bus: &mut AmbisonicBus) {
        debug_assert_eq!(bus.channel_count(), self.channel_count());
        let frames = input.len().min(bus.block_size());

        for (acn, channel) in bus.channels_mut().iter_mut().enumerate() {
            let to = self.gains[acn];
            let from = self.previous[acn];
            if from == to {
                if to != 0.0 {
                    for (out, &x) in channel[..frames].iter_mut().zip(input) {
                        *out += to * x;
                    }
                }
            } else {
                let step = (to - from) / frames as f32;
                for (i, (out, &x)) in channel[..frames].iter_mut().zip(input).enumerate() {
                    *out += (from + step * (i + 1) as f32) * x;
                }
            }
        }

        self.previous.copy_from_slice(&self.gains);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn gains_follow_direction() {
        let encoder = MonoEncoder::new(1, -90.0, 0.0);
        assert_abs_diff_eq!(encoder.gains(), &[1.0, 1.0, 0.0, 0.0][..], epsilon = 1e-6);
    }

    #[test]
    fn update_gains_is_idempotent() {
        let mut encoder = MonoEncoder::new(3, 33.0, 10.0);
        encoder.update_gains();
        let first = encoder.gains().to_vec();
        encoder.update_gains();
        assert_eq!(encoder.gains(), &first[..]);
    }

    #[test]
    fn set_direction_waits_for_update() {
        let mut encoder = MonoEncoder::new(1, 0.0, 0.0);
        let before = encoder.gains().to_vec();
        encoder.set_direction(180.0, 0.0);
        assert_eq!(encoder.gains(), &before[..]);
        encoder.update_gains();
        assert_abs_diff_eq!(encoder.gains()[3], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn process_accumulates_into_bus() {
        let mut encoder = MonoEncoder::new(1, 0.0, 0.0);
        let mut bus = AmbisonicBus::new(1, 4);
        encoder.process(&[1.0; 4], &mut bus);
        encoder.process(&[1.0; 4], &mut bus);
        assert_eq!(bus.channel(0), &[2.0; 4]);
        assert_eq!(bus.channel(3), &[2.0; 4]);
        assert_eq!(bus.channel(1), &[0.0; 4]);
    }

    #[test]
    fn gain_changes_are_interpolated_across_one_block() {
        let mut encoder = MonoEncoder::new(1, 0.0, 0.0);
        encoder.set_direction(180.0, 0.0);
        encoder.update_gains();

        let mut bus = AmbisonicBus::new(1, 4);
        encoder.process(&[1.0; 4], &mut bus);
        // X moves from 1 to -1 in four steps, landing on the new gain.
        assert_abs_diff_eq!(bus.channel(3), &[0.5, 0.0, -0.5, -1.0][..], epsilon = 1e-6);

        bus.clear();
        encoder.process(&[1.0; 4], &mut bus);
        assert_abs_diff_eq!(bus.channel(3), &[-1.0; 4][..], epsilon = 1e-6);
    }
}
