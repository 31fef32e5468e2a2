//! Owns every playing source and mixes them onto the ambisonic bus.
//!
//! Each source is a voice: a buffer, a play position, a fade ramp and,
//! for mono buffers, a dedicated encoder. Voices are keyed by buffer id.
//! Stopping a voice only schedules its fade; it is detached on the audio
//! clock once the fade has run, at the end of the block that completes it.
//! Starting an id that is still sounding releases the old voice, which
//! finishes its fade on its own without being addressable anymore.

use crate::assets::{AmbisonicBuffer, AssetBank, BufferId};
use crate::audio_context::AudioContext;
use crate::bus::AmbisonicBus;
use crate::encoder::MonoEncoder;
use crate::ramp::GainRamp;
use crate::spherical_harmonics::Order;

use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shortest fade applied to a voice that is cut off by a restart.
pub const DECLICK_SECONDS: f64 = 0.01;

/// Which sources a stop applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTarget {
    /// The source playing this buffer.
    Source(BufferId),
    /// Every source.
    All,
}

/// Public view of one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundSource {
    /// Buffer being played.
    pub buffer_id: BufferId,
    /// Encoding azimuth in degrees, 0 for beds.
    pub azimuth: f64,
    /// Encoding elevation in degrees, 0 for beds.
    pub elevation: f64,
    /// Whether the buffer restarts when it ends.
    pub looping: bool,
    /// False once a stop has been scheduled.
    pub active: bool,
    /// Whether this is a pre-encoded ambisonic bed.
    pub bed: bool,
}

/// `(block offset, buffer offset, frames)` of one contiguous read.
type Run = (usize, usize, usize);

#[derive(Debug)]
enum Signal {
    Mono {
        samples: Arc<[f32]>,
        encoder: MonoEncoder,
    },
    Bed(Arc<AmbisonicBuffer>),
}

#[derive(Debug)]
struct Voice {
    source: SoundSource,
    signal: Signal,
    position: usize,
    gain: GainRamp,
    stop_at: Option<u64>,
    finished: bool,
}

impl Voice {
    fn len(&self) -> usize {
        match &self.signal {
            Signal::Mono { samples, .. } => samples.len(),
            Signal::Bed(bed) => bed.len(),
        }
    }

    fn fade_out(&mut self, ctx: &AudioContext, frames: u64) {
        self.source.active = false;
        self.gain.ramp_to(0.0, frames);
        self.stop_at = Some(ctx.current_frame() + frames);
    }

    /// Fill `gains` with this block's fade and `runs` with the buffer
    /// frames the block reads.
    fn plan(&mut self, gains: &mut [f32], runs: &mut Vec<Run>) {
        runs.clear();
        for g in gains.iter_mut() {
            *g = self.gain.next_sample();
        }

        let len = self.len();
        let mut written = 0;
        while written < gains.len() && !self.finished {
            if self.position >= len {
                if self.source.looping {
                    self.position = 0;
                } else {
                    self.finished = true;
                    break;
                }
            }
            let take = (len - self.position).min(gains.len() - written);
            runs.push((written, self.position, take));
            self.position += take;
            written += take;
        }
        if !self.source.looping && self.position >= len {
            self.finished = true;
        }
    }

    fn render(
        &mut self,
        bus: &mut AmbisonicBus,
        gains: &mut [f32],
        scratch: &mut Vec<f32>,
        runs: &mut Vec<Run>,
    ) {
        self.plan(gains, runs);
        match &mut self.signal {
            Signal::Mono { samples, encoder } => {
                scratch.clear();
                scratch.resize(gains.len(), 0.0);
                for &(at, from, count) in runs.iter() {
                    scratch[at..at + count].copy_from_slice(&samples[from..from + count]);
                }
                for (s, g) in scratch.iter_mut().zip(gains.iter()) {
                    *s *= g;
                }
                encoder.process(scratch, bus);
            }
            Signal::Bed(bed) => {
                for (acn, channel) in bus.channels_mut().iter_mut().enumerate() {
                    let source = &bed.channels()[acn];
                    for &(at, from, count) in runs.iter() {
                        let out = &mut channel[at..at + count];
                        let gains = &gains[at..at + count];
                        let input = &source[from..from + count];
                        for ((o, x), g) in out.iter_mut().zip(input).zip(gains) {
                            *o += x * g;
                        }
                    }
                }
            }
        }
    }

    fn is_done(&self, block_end: u64) -> bool {
        self.finished || self.stop_at.is_some_and(|at| at <= block_end)
    }
}

/// The set of playing sources.
#[derive(Debug)]
pub struct SourceManager {
    order: Order,
    voices: BTreeMap<BufferId, Voice>,
    released: Vec<Voice>,
    gains: Vec<f32>,
    scratch: Vec<f32>,
    runs: Vec<Run>,
}

impl SourceManager {
    /// An empty manager whose voices encode at `order`.
    pub fn new(order: Order) -> Self {
        Self {
            order,
            voices: BTreeMap::new(),
            released: Vec::new(),
            gains: Vec::new(),
            scratch: Vec::new(),
            runs: Vec::new(),
        }
    }

    /// Ambisonic order of the voices.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Play mono buffer `id` from (`azimuth`, `elevation`), fading in over
    /// `fade_in` seconds. Returns false, leaving everything as it was, when
    /// the buffer is not in `assets`.
    #[allow(clippy::too_many_arguments)]
    pub fn start_source(
        &mut self,
        ctx: &AudioContext,
        assets: &AssetBank,
        id: BufferId,
        azimuth: f64,
        elevation: f64,
        looping: bool,
        fade_in: f64,
    ) -> bool {
        let samples = match assets.buffer(id) {
            Some(samples) if !samples.is_empty() => samples,
            _ => {
                warn!("no audio buffer {}, not starting source", id);
                return false;
            }
        };
        let signal = Signal::Mono {
            samples,
            encoder: MonoEncoder::new(self.order, azimuth, elevation),
        };
        let source = SoundSource {
            buffer_id: id,
            azimuth,
            elevation,
            looping,
            active: true,
            bed: false,
        };
        self.insert(ctx, source, signal, fade_in);
        true
    }

    /// Play ambisonic bed `id`. Returns false when the bed is missing or
    /// was encoded at another order.
    pub fn start_bed(
        &mut self,
        ctx: &AudioContext,
        assets: &AssetBank,
        id: BufferId,
        looping: bool,
        fade_in: f64,
    ) -> bool {
        let bed = match assets.bed(id) {
            Some(bed) if !bed.is_empty() => bed,
            _ => {
                warn!("no ambisonic bed {}, not starting source", id);
                return false;
            }
        };
        if bed.order() != self.order {
            warn!(
                "bed {} is order {}, the scene is order {}; not starting",
                id,
                bed.order(),
                self.order
            );
            return false;
        }
        let source = SoundSource {
            buffer_id: id,
            azimuth: 0.0,
            elevation: 0.0,
            looping,
            active: true,
            bed: true,
        };
        self.insert(ctx, source, Signal::Bed(bed), fade_in);
        true
    }

    fn insert(&mut self, ctx: &AudioContext, source: SoundSource, signal: Signal, fade_in: f64) {
        let fade_frames = ctx.seconds_to_frames(fade_in);
        if let Some(mut old) = self.voices.remove(&source.buffer_id) {
            if old.stop_at.is_none() {
                let declick = fade_frames.max(ctx.seconds_to_frames(DECLICK_SECONDS));
                old.fade_out(ctx, declick);
            }
            debug!("source {} restarted, releasing the old voice", source.buffer_id);
            self.released.push(old);
        }

        let mut gain = GainRamp::new(0.0);
        gain.ramp_to(1.0, fade_frames);
        debug!(
            "starting source {} at ({:.1}, {:.1}), fade in {} frames",
            source.buffer_id, source.azimuth, source.elevation, fade_frames
        );
        self.voices.insert(
            source.buffer_id,
            Voice {
                source,
                signal,
                position: 0,
                gain,
                stop_at: None,
                finished: false,
            },
        );
    }

    /// Fade out `target` over `fade_out` seconds. Sources already fading
    /// out keep their original fade.
    pub fn stop(&mut self, ctx: &AudioContext, target: StopTarget, fade_out: f64) {
        let frames = ctx.seconds_to_frames(fade_out);
        let stopping = self
            .voices
            .iter_mut()
            .filter(|(id, _)| match target {
                StopTarget::Source(wanted) => **id == wanted,
                StopTarget::All => true,
            })
            .filter(|(_, voice)| voice.stop_at.is_none());
        for (id, voice) in stopping {
            debug!("stopping source {} over {} frames", id, frames);
            voice.fade_out(ctx, frames);
        }
        if frames == 0 {
            self.voices.retain(|_, v| v.stop_at.is_none() || v.gain.value() != 0.0);
        }
    }

    /// Mix every voice into `bus` for the block starting at the context's
    /// current frame, then detach voices that ended or finished fading.
    pub fn render_into(&mut self, ctx: &AudioContext, bus: &mut AmbisonicBus) {
        debug_assert_eq!(bus.order(), self.order);
        let frames = bus.block_size();
        self.gains.resize(frames, 0.0);

        for voice in self.voices.values_mut().chain(self.released.iter_mut()) {
            voice.render(bus, &mut self.gains, &mut self.scratch, &mut self.runs);
        }

        let block_end = ctx.current_frame() + frames as u64;
        self.voices.retain(|id, voice| {
            let done = voice.is_done(block_end);
            if done {
                debug!("source {} detached", id);
            }
            !done
        });
        self.released.retain(|voice| !voice.is_done(block_end));
    }

    /// Snapshots of the addressable sources, ordered by buffer id.
    pub fn sources(&self) -> Vec<SoundSource> {
        self.voices.values().map(|v| v.source).collect()
    }

    /// Snapshot of the source playing `id`.
    pub fn source(&self, id: BufferId) -> Option<SoundSource> {
        self.voices.get(&id).map(|v| v.source)
    }

    /// Whether `id` is playing and not fading out.
    pub fn is_active(&self, id: BufferId) -> bool {
        self.source(id).is_some_and(|s| s.active)
    }

    /// Every voice still producing sound, released ones included.
    pub fn voice_count(&self) -> usize {
        self.voices.len() + self.released.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: usize = 4;

    fn setup() -> (AudioContext, AssetBank, SourceManager, AmbisonicBus) {
        let ctx = AudioContext::new(1000, BLOCK).unwrap();
        let mut assets = AssetBank::new();
        assets.insert_buffer(1, vec![1.0; 10]);
        assets.insert_buffer(2, vec![1.0; 6]);
        (ctx, assets, SourceManager::new(1), AmbisonicBus::new(1, BLOCK))
    }

    fn render(ctx: &mut AudioContext, manager: &mut SourceManager, bus: &mut AmbisonicBus) -> Vec<f32> {
        bus.clear();
        manager.render_into(ctx, bus);
        ctx.advance();
        bus.channel(0).to_vec()
    }

    #[test]
    fn missing_buffer_is_a_no_op() {
        let (ctx, assets, mut manager, _) = setup();
        manager.start_source(&ctx, &assets, 1, 0.0, 0.0, true, 0.0);
        let before = manager.sources();

        assert!(!manager.start_source(&ctx, &assets, 99, 30.0, 0.0, true, 1.0));
        assert_eq!(manager.sources(), before);
        assert!(manager.source(99).is_none());
    }

    #[test]
    fn fade_in_ramps_up() {
        let (mut ctx, assets, mut manager, mut bus) = setup();
        manager.start_source(&ctx, &assets, 1, 0.0, 0.0, true, 0.004);
        assert_eq!(render(&mut ctx, &mut manager, &mut bus), vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(render(&mut ctx, &mut manager, &mut bus), vec![1.0; 4]);
    }

    #[test]
    fn one_shot_ends_and_is_collected() {
        let (mut ctx, assets, mut manager, mut bus) = setup();
        manager.start_source(&ctx, &assets, 2, 0.0, 0.0, false, 0.0);
        assert_eq!(render(&mut ctx, &mut manager, &mut bus), vec![1.0; 4]);
        assert!(manager.source(2).is_some());
        assert_eq!(render(&mut ctx, &mut manager, &mut bus), vec![1.0, 1.0, 0.0, 0.0]);
        assert!(manager.source(2).is_none());
        assert_eq!(manager.voice_count(), 0);
    }

    #[test]
    fn looping_wraps_around() {
        let (mut ctx, mut assets, mut manager, mut bus) = setup();
        assets.insert_buffer(3, vec![1.0, 2.0, 3.0]);
        manager.start_source(&ctx, &assets, 3, 0.0, 0.0, true, 0.0);
        assert_eq!(render(&mut ctx, &mut manager, &mut bus), vec![1.0, 2.0, 3.0, 1.0]);
        assert_eq!(render(&mut ctx, &mut manager, &mut bus), vec![2.0, 3.0, 1.0, 2.0]);
    }

    #[test]
    fn stop_fades_then_detaches() {
        let (mut ctx, assets, mut manager, mut bus) = setup();
        manager.start_source(&ctx, &assets, 1, 0.0, 0.0, true, 0.0);
        manager.stop(&ctx, StopTarget::Source(1), 0.008);

        assert!(!manager.is_active(1));
        assert_eq!(render(&mut ctx, &mut manager, &mut bus), vec![0.875, 0.75, 0.625, 0.5]);
        assert!(manager.source(1).is_some());
        assert_eq!(render(&mut ctx, &mut manager, &mut bus), vec![0.375, 0.25, 0.125, 0.0]);
        assert!(manager.source(1).is_none());
    }

    #[test]
    fn second_stop_does_not_restart_the_fade() {
        let (mut ctx, assets, mut manager, mut bus) = setup();
        manager.start_source(&ctx, &assets, 1, 0.0, 0.0, true, 0.0);
        manager.stop(&ctx, StopTarget::Source(1), 0.008);
        render(&mut ctx, &mut manager, &mut bus);
        manager.stop(&ctx, StopTarget::All, 1.0);
        assert_eq!(render(&mut ctx, &mut manager, &mut bus), vec![0.375, 0.25, 0.125, 0.0]);
        assert!(manager.sources().is_empty());
    }

    #[test]
    fn restart_supersedes_a_fading_source() {
        let (mut ctx, assets, mut manager, mut bus) = setup();
        manager.start_source(&ctx, &assets, 1, 0.0, 0.0, true, 0.0);
        manager.stop(&ctx, StopTarget::Source(1), 0.008);
        manager.start_source(&ctx, &assets, 1, 90.0, 0.0, true, 0.0);

        let source = manager.source(1).unwrap();
        assert!(source.active);
        assert_eq!(source.azimuth, 90.0);
        assert_eq!(manager.voice_count(), 2);

        // The old voice keeps fading from the front, the new one plays
        // at full gain from the side.
        let w = render(&mut ctx, &mut manager, &mut bus);
        assert_eq!(w, vec![1.875, 1.75, 1.625, 1.5]);
        render(&mut ctx, &mut manager, &mut bus);
        assert_eq!(manager.voice_count(), 1);
    }

    #[test]
    fn stop_all_with_no_fade_detaches_immediately() {
        let (ctx, assets, mut manager, _) = setup();
        manager.start_source(&ctx, &assets, 1, 0.0, 0.0, true, 0.0);
        manager.start_source(&ctx, &assets, 2, 0.0, 0.0, true, 0.0);
        manager.stop(&ctx, StopTarget::All, 0.0);
        assert!(manager.sources().is_empty());
    }

    #[test]
    fn beds_play_straight_onto_the_bus() {
        let (mut ctx, mut assets, mut manager, mut bus) = setup();
        let channels = vec![vec![1.0; 8], vec![0.5; 8], vec![0.0; 8], vec![-0.5; 8]];
        assets.insert_bed(5, AmbisonicBuffer::new(1, channels).unwrap());
        assert!(manager.start_bed(&ctx, &assets, 5, false, 0.0));
        assert!(manager.source(5).unwrap().bed);

        render(&mut ctx, &mut manager, &mut bus);
        assert_eq!(bus.channel(1), &[0.5; 4]);
        assert_eq!(bus.channel(3), &[-0.5; 4]);
    }

    #[test]
    fn beds_of_another_order_are_refused() {
        let (ctx, mut assets, mut manager, _) = setup();
        let channels = vec![vec![0.0; 8]; 9];
        assets.insert_bed(6, AmbisonicBuffer::new(2, channels).unwrap());
        assert!(!manager.start_bed(&ctx, &assets, 6, true, 0.0));
        assert!(!manager.start_bed(&ctx, &assets, 7, true, 0.0));
        assert!(manager.sources().is_empty());
    }
}
