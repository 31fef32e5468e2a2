//! The in-memory asset bank: decoded PCM buffers, pre-encoded ambisonic
//! beds and impulse-response sets. Decoding files is somebody else's job;
//! by the time anything lands here it is plain `f32` samples.

use crate::config::{InstallationConfig, SourceSpec};
use crate::decoder::{FilterProfile, ImpulseResponseSet};
use crate::spherical_harmonics::{channel_count, Order};

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

/// Index of an audio buffer in the bank.
pub type BufferId = usize;

/// A recording already encoded to ambisonics, played straight onto the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbisonicBuffer {
    order: Order,
    channels: Vec<Vec<f32>>,
}

impl AmbisonicBuffer {
    /// Wrap ACN-ordered channels. Returns `None` when the channel count does
    /// not match `order` or the channels differ in length.
    pub fn new(order: Order, channels: Vec<Vec<f32>>) -> Option<Self> {
        let same_length = channels.windows(2).all(|w| w[0].len() == w[1].len());
        (channels.len() == channel_count(order) && same_length)
            .then_some(Self { order, channels })
    }

    /// Ambisonic order of the recording.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Channels in ACN order.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Whether the recording has no frames.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every asset the soundscape may play, keyed by id or filter profile.
#[derive(Debug, Clone, Default)]
pub struct AssetBank {
    buffers: HashMap<BufferId, Arc<[f32]>>,
    beds: HashMap<BufferId, Arc<AmbisonicBuffer>>,
    filters: HashMap<FilterProfile, ImpulseResponseSet>,
}

impl AssetBank {
    /// An empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a mono buffer under `id`, replacing any previous one.
    pub fn insert_buffer(&mut self, id: BufferId, samples: Vec<f32>) {
        self.buffers.insert(id, Arc::from(samples));
    }

    /// Store an ambisonic bed under `id`.
    pub fn insert_bed(&mut self, id: BufferId, bed: AmbisonicBuffer) {
        self.beds.insert(id, Arc::new(bed));
    }

    /// Store the impulse responses for `profile`.
    pub fn insert_filters(&mut self, profile: FilterProfile, filters: ImpulseResponseSet) {
        self.filters.insert(profile, filters);
    }

    /// Mono buffer `id`, if loaded.
    pub fn buffer(&self, id: BufferId) -> Option<Arc<[f32]>> {
        self.buffers.get(&id).cloned()
    }

    /// Ambisonic bed `id`, if loaded.
    pub fn bed(&self, id: BufferId) -> Option<Arc<AmbisonicBuffer>> {
        self.beds.get(&id).cloned()
    }

    /// Impulse responses for `profile`, if loaded.
    pub fn filters(&self, profile: FilterProfile) -> Option<&ImpulseResponseSet> {
        self.filters.get(&profile)
    }

    /// A bank holding a distinct tone for every buffer `config` refers to,
    /// plus both impulse-response profiles. Stands in for real recordings
    /// when no asset provider is attached.
    pub fn synthetic(config: &InstallationConfig) -> Self {
        let mut bank = Self::new();
        let rate = config.sample_rate;

        for spec in config.zones.iter().flatten() {
            match *spec {
                SourceSpec::Point { buffer, .. } => {
                    bank.insert_buffer(buffer, tone(tone_frequency(buffer), 4.0, rate, 0.2));
                }
                SourceSpec::Bed { buffer, .. } => {
                    let mono = tone(tone_frequency(buffer), 4.0, rate, 0.2);
                    let mut channels = vec![vec![0.0; mono.len()]; channel_count(config.ambisonic_order)];
                    channels[0] = mono;
                    if let Some(bed) = AmbisonicBuffer::new(config.ambisonic_order, channels) {
                        bank.insert_bed(buffer, bed);
                    }
                }
            }
        }
        for cue in &config.transition_cues {
            bank.insert_buffer(cue.buffer, chirp(880.0, 0.6, rate, 0.3));
        }
        if let Some(bonus) = &config.bonus {
            bank.insert_buffer(bonus.buffer, tone(tone_frequency(bonus.buffer), 6.0, rate, 0.25));
        }

        bank.insert_filters(
            FilterProfile::Virtual,
            ImpulseResponseSet::virtual_ears(config.ambisonic_order),
        );
        bank.insert_filters(
            FilterProfile::RoomReverb,
            ImpulseResponseSet::synthetic_room(config.ambisonic_order, rate, 0.4, 0x5eed),
        );
        bank
    }
}

/// Pentatonic-ish pitch per buffer id so neighbouring sources are easy to
/// tell apart by ear.
fn tone_frequency(id: BufferId) -> f64 {
    const STEPS: [f64; 5] = [0.0, 2.0, 4.0, 7.0, 9.0];
    let octave = (id / STEPS.len()) as f64;
    220.0 * 2f64.powf(octave + STEPS[id % STEPS.len()] / 12.0)
}

/// A sine tone with short raised-cosine edges, so it loops without clicks.
pub fn tone(frequency: f64, seconds: f64, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let frames = (seconds * sample_rate as f64) as usize;
    let edge = (sample_rate as usize / 100).min(frames / 2).max(1);
    (0..frames)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let from_edge = i.min(frames - 1 - i);
            let window = if from_edge < edge {
                0.5 - 0.5 * (PI * from_edge as f64 / edge as f64).cos()
            } else {
                1.0
            };
            (amplitude as f64 * window * (2.0 * PI * frequency * t).sin()) as f32
        })
        .collect()
}

/// A decaying upward sweep, used for one-shot transition cues.
fn chirp(start: f64, seconds: f64, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let frames = (seconds * sample_rate as f64) as usize;
    (0..frames)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let phase = 2.0 * PI * (start * t + start * t * t / seconds);
            let envelope = (-4.0 * t / seconds).exp();
            (amplitude as f64 * envelope * phase.sin()) as f32
        })
        .collect()
}
