//! The shared ambisonic bus every source encodes into, and which the
//! rotator and decoder then process in place.

use crate::spherical_harmonics::{channel_count, Order};

/// One block of `(order+1)^2` ambisonic channels. The channel count is
/// fixed for the lifetime of the bus.
#[derive(Debug, Clone)]
pub struct AmbisonicBus {
    order: Order,
    channels: Vec<Vec<f32>>,
}

impl AmbisonicBus {
    /// A silent bus of `block_size` frames.
    pub fn new(order: Order, block_size: usize) -> Self {
        Self {
            order,
            channels: vec![vec![0.0; block_size]; channel_count(order)],
        }
    }

    /// Ambisonic order of the bus.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames per block.
    pub fn block_size(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Silence every channel.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    /// Read access to one ACN channel.
    pub fn channel(&self, acn: usize) -> &[f32] {
        &self.channels[acn]
    }

    /// Write access to one ACN channel.
    pub fn channel_mut(&mut self, acn: usize) -> &mut [f32] {
        &mut self.channels[acn]
    }

    /// All channels in ACN order.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// All channels in ACN order, mutably.
    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }
}
