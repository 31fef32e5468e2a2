//! Binaural decoding of the rotated ambisonic bus.
//!
//! Every ACN channel is convolved with one left-ear impulse response. The
//! real harmonics are either symmetric or antisymmetric under a left/right
//! mirror (the `m < 0` ones flip sign), so the right ear reuses the same
//! convolutions with those channels negated.

use crate::bus::AmbisonicBus;
use crate::error::ConfigError;
use crate::ramp::GainRamp;
use crate::spherical_harmonics::{self, channel_count, degree_and_index, Order, MAX_ORDER};

use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which impulse-response bank the decoder runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum FilterProfile {
    /// Anechoic virtual-source filters.
    Virtual,
    /// Filters recorded in a furnished room, louder to the ear.
    RoomReverb,
}

impl FilterProfile {
    /// Correction applied on top of the master gain so both profiles are
    /// perceived at the same loudness.
    pub fn loudness_compensation(self) -> f32 {
        match self {
            FilterProfile::Virtual => 1.0,
            FilterProfile::RoomReverb => 0.5,
        }
    }
}

impl fmt::Display for FilterProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterProfile::Virtual => write!(f, "virtual"),
            FilterProfile::RoomReverb => write!(f, "room-reverb"),
        }
    }
}

/// One left-ear FIR filter per ambisonic channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponseSet {
    order: Order,
    filters: Vec<Vec<f32>>,
}

impl ImpulseResponseSet {
    /// Wrap already-decoded filters, checking there is exactly one
    /// non-empty filter per channel of `order`.
    pub fn new(order: Order, filters: Vec<Vec<f32>>) -> Result<Self, ConfigError> {
        if order == 0 || order > MAX_ORDER {
            return Err(ConfigError::UnsupportedOrder(order));
        }
        if filters.len() != channel_count(order) {
            return Err(ConfigError::ChannelMismatch {
                expected: channel_count(order),
                found: filters.len(),
            });
        }
        if let Some(channel) = filters.iter().position(Vec::is_empty) {
            return Err(ConfigError::EmptyFilter(channel));
        }
        Ok(Self { order, filters })
    }

    /// Single-tap filters modelling two ideal ears as virtual microphones
    /// aimed left and right, weighted so a source on the ear axis arrives
    /// at unity gain.
    pub fn virtual_ears(order: Order) -> Self {
        let n = channel_count(order);
        let mut left = [0.0; (MAX_ORDER + 1) * (MAX_ORDER + 1)];
        spherical_harmonics::evaluate(order, -90.0, 0.0, &mut left);
        let filters = (0..n)
            .map(|acn| {
                let (l, _) = degree_and_index(acn);
                vec![((2 * l + 1) as f64 / n as f64 * left[acn]) as f32]
            })
            .collect();
        Self { order, filters }
    }

    /// The virtual ears followed by an exponentially decaying diffuse tail
    /// on the omnidirectional channel. Deterministic for a given `seed`.
    pub fn synthetic_room(order: Order, sample_rate: u32, rt60: f64, seed: u64) -> Self {
        let mut set = Self::virtual_ears(order);
        let mut rng = StdRng::seed_from_u64(seed);
        let length = ((rt60 * sample_rate as f64) as usize).max(1);
        // -60 dB after rt60 seconds.
        let decay = (-6.9078 / length as f64).exp();

        let omni = &mut set.filters[0];
        let mut envelope = 0.3;
        for _ in 1..length {
            envelope *= decay;
            omni.push((envelope * rng.gen_range(-1.0..1.0)) as f32);
        }
        set
    }

    /// Ambisonic order the set was built for.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Per-channel filters in ACN order.
    pub fn filters(&self) -> &[Vec<f32>] {
        &self.filters
    }

    /// Length of the longest filter.
    pub fn taps(&self) -> usize {
        self.filters.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Convolves the bus down to stereo and applies the master gain.
#[derive(Debug, Clone)]
pub struct BinauralDecoder {
    order: Order,
    profile: FilterProfile,
    filters: ImpulseResponseSet,
    signs: Vec<f32>,
    history: Vec<Vec<f32>>,
    work: Vec<f32>,
    base_gain: f32,
    master: GainRamp,
}

impl BinauralDecoder {
    /// A decoder for `order` running on `filters`, with the master gain set
    /// to `base_gain` corrected for `profile`.
    pub fn new(
        order: Order,
        profile: FilterProfile,
        filters: ImpulseResponseSet,
        base_gain: f32,
    ) -> Result<Self, ConfigError> {
        check_order(order, &filters)?;
        let signs = (0..channel_count(order))
            .map(|acn| if degree_and_index(acn).1 < 0 { -1.0 } else { 1.0 })
            .collect();
        let history = fresh_history(&filters);
        Ok(Self {
            order,
            profile,
            filters,
            signs,
            history,
            work: Vec::new(),
            base_gain,
            master: GainRamp::new(base_gain * profile.loudness_compensation()),
        })
    }

    /// Ambisonic order.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Active filter profile.
    pub fn profile(&self) -> FilterProfile {
        self.profile
    }

    /// Master gain the output is heading towards.
    pub fn master_gain(&self) -> f32 {
        self.master.target()
    }

    /// Swap the impulse-response bank. Sources and encoders are untouched;
    /// only the convolution state restarts. The master gain follows the
    /// new profile over `ramp_frames`.
    pub fn update_filters(
        &mut self,
        profile: FilterProfile,
        filters: ImpulseResponseSet,
        ramp_frames: u64,
    ) -> Result<(), ConfigError> {
        check_order(self.order, &filters)?;
        info!("decoder switching to {} filters ({} taps)", profile, filters.taps());
        self.history = fresh_history(&filters);
        self.filters = filters;
        self.profile = profile;
        self.master
            .ramp_to(self.base_gain * profile.loudness_compensation(), ramp_frames);
        Ok(())
    }

    /// Decode `bus` into `left` and `right`, overwriting them.
    pub fn process(&mut self, bus: &AmbisonicBus, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(bus.channel_count(), self.signs.len());
        let frames = bus.block_size().min(left.len()).min(right.len());
        left[..frames].fill(0.0);
        right[..frames].fill(0.0);

        for (acn, filter) in self.filters.filters.iter().enumerate() {
            let history = &mut self.history[acn];
            let past = history.len();

            self.work.clear();
            self.work.extend_from_slice(history);
            self.work.extend_from_slice(&bus.channel(acn)[..frames]);

            let sign = self.signs[acn];
            for s in 0..frames {
                let now = past + s;
                let y: f32 = filter
                    .iter()
                    .enumerate()
                    .map(|(k, h)| h * self.work[now - k])
                    .sum();
                left[s] += y;
                right[s] += sign * y;
            }

            let keep = self.work.len() - past;
            history.copy_from_slice(&self.work[keep..]);
        }

        for (l, r) in left[..frames].iter_mut().zip(right[..frames].iter_mut()) {
            let gain = self.master.next_sample();
            *l *= gain;
            *r *= gain;
        }
    }
}

fn check_order(order: Order, filters: &ImpulseResponseSet) -> Result<(), ConfigError> {
    if filters.order() != order {
        return Err(ConfigError::ChannelMismatch {
            expected: channel_count(order),
            found: channel_count(filters.order()),
        });
    }
    Ok(())
}

/// Each channel remembers `taps - 1` past input samples, zeroed.
fn fresh_history(filters: &ImpulseResponseSet) -> Vec<Vec<f32>> {
    vec![vec![0.0; filters.taps().saturating_sub(1)]; filters.filters().len()]
}
