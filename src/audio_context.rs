//! The audio context is created once by whoever owns the output and passed
//! to everything that needs to know the sample rate, the block size or
//! "now" on the audio clock.

use crate::error::ConfigError;

/// Sample rate, block size and the frame clock shared by the render path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioContext {
    sample_rate: u32,
    block_size: usize,
    frame: u64,
}

impl AudioContext {
    /// A context whose clock starts at frame 0.
    pub fn new(sample_rate: u32, block_size: usize) -> Result<Self, ConfigError> {
        if sample_rate == 0 || block_size == 0 {
            return Err(ConfigError::InvalidAudioContext);
        }
        Ok(Self {
            sample_rate,
            block_size,
            frame: 0,
        })
    }

    /// Samples per second.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// First frame of the block about to be rendered.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    /// [`AudioContext::current_frame`] in seconds.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    /// Length of a duration in frames, rounded to the nearest frame.
    /// Negative and non-finite durations count as zero.
    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        if seconds.is_finite() && seconds > 0.0 {
            (seconds * self.sample_rate as f64).round() as u64
        } else {
            0
        }
    }

    /// Move the clock forward by one block.
    pub fn advance(&mut self) {
        self.frame += self.block_size as u64;
    }
}
