//! Linear gain ramps, advanced one sample at a time on the render path.
//!
//! Every gain change that reaches the audio (fades, master gain) goes
//! through a [`GainRamp`] so that nothing jumps between two samples.

/// A gain that moves linearly towards a target over a number of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct GainRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u64,
}

impl GainRamp {
    /// A ramp resting at `value`.
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Start moving towards `target`, arriving after `frames` samples. A
    /// zero-frame ramp jumps immediately.
    pub fn ramp_to(&mut self, target: f32, frames: u64) {
        self.target = target;
        if frames == 0 {
            self.current = target;
            self.step = 0.0;
            self.remaining = 0;
        } else {
            self.step = (target - self.current) / frames as f32;
            self.remaining = frames;
        }
    }

    /// Gain for the next sample.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    /// Gain of the most recent sample.
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Where the ramp is heading.
    pub fn target(&self) -> f32 {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn reaches_target_exactly() {
        let mut ramp = GainRamp::new(1.0);
        ramp.ramp_to(0.0, 4);
        let values: Vec<f32> = (0..6).map(|_| ramp.next_sample()).collect();
        assert_abs_diff_eq!(values[0], 0.75);
        assert_abs_diff_eq!(values[1], 0.5);
        assert_eq!(values[3], 0.0);
        assert_eq!(values[5], 0.0);
        assert_eq!(ramp.value(), ramp.target());
    }

    #[test]
    fn zero_length_jumps() {
        let mut ramp = GainRamp::new(0.0);
        ramp.ramp_to(0.5, 0);
        assert_eq!(ramp.value(), 0.5);
        assert_eq!(ramp.next_sample(), 0.5);
    }

    #[test]
    fn retarget_mid_ramp_starts_from_current_value() {
        let mut ramp = GainRamp::new(0.0);
        ramp.ramp_to(1.0, 10);
        for _ in 0..5 {
            ramp.next_sample();
        }
        ramp.ramp_to(0.0, 5);
        assert_abs_diff_eq!(ramp.next_sample(), 0.4, epsilon = 1e-6);
    }
}
