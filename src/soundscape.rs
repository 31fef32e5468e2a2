//! The experience controller.
//!
//! A [`Soundscape`] owns the whole chain for one listener: ranging samples
//! go through the zone and proximity detectors, accepted changes start and
//! stop sources, orientation samples steer the rotator, and every call to
//! [`Soundscape::render_block`] produces one block of binaural audio:
//!
//! ```text
//! sources -> encoders -> bus -> rotator -> decoder -> master gain -> stereo
//! ```
//!
//! Everything runs on the caller's thread; feeds are handled to completion
//! in the order they arrive.

use crate::assets::AssetBank;
use crate::audio_context::AudioContext;
use crate::bus::AmbisonicBus;
use crate::config::{InstallationConfig, SourceSpec};
use crate::decoder::{BinauralDecoder, FilterProfile};
use crate::error::ConfigError;
use crate::listener_aim::{AimCorrection, ListenerAimTracker};
use crate::proximity_detector::{ProximityDetector, ProximityEvent};
use crate::ranging::{DistanceSample, Timestamp};
use crate::rotator::SceneRotator;
use crate::source_manager::{SourceManager, SoundSource, StopTarget};
use crate::spherical_harmonics::channel_count;
use crate::zone_detector::{ZoneDetector, ZoneId, ZoneState, ZoneTransition};

use log::{debug, info};

/// Time the master gain takes to settle after a filter swap, in seconds.
const FILTER_SWAP_SECONDS: f64 = 0.05;

/// One reading of the listener's head orientation, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    /// Heading, clockwise positive.
    pub azimuth: f64,
    /// Pitch, positive up. `None` when the sensor only reports heading.
    pub elevation: Option<f64>,
    /// When the reading was taken.
    pub timestamp: Timestamp,
}

/// A running installation.
#[derive(Debug)]
pub struct Soundscape {
    config: InstallationConfig,
    assets: AssetBank,
    ctx: AudioContext,
    zones: ZoneDetector,
    bonus: Option<ProximityDetector>,
    aim: ListenerAimTracker,
    sources: SourceManager,
    bus: AmbisonicBus,
    rotator: SceneRotator,
    decoder: BinauralDecoder,
}

impl Soundscape {
    /// Build the chain for `config`, playing audio out of `assets`.
    ///
    /// Fails if the configuration is inconsistent, if `assets` has no
    /// impulse responses for the configured profile, or if a bed or filter
    /// set was made for another ambisonic order. Missing audio buffers are
    /// not an error here; they are reported when something tries to play
    /// them.
    pub fn new(config: InstallationConfig, assets: AssetBank) -> Result<Self, ConfigError> {
        config.validate()?;
        let order = config.ambisonic_order;

        for spec in config.zones.iter().flatten() {
            if let SourceSpec::Bed { buffer, .. } = spec {
                if let Some(bed) = assets.bed(*buffer) {
                    if bed.order() != order {
                        return Err(ConfigError::ChannelMismatch {
                            expected: channel_count(order),
                            found: channel_count(bed.order()),
                        });
                    }
                }
            }
        }

        let filters = assets
            .filters(config.filter_profile)
            .ok_or(ConfigError::MissingFilters(config.filter_profile))?
            .clone();
        let decoder =
            BinauralDecoder::new(order, config.filter_profile, filters, config.master_gain)?;
        let ctx = AudioContext::new(config.sample_rate, config.block_size)?;
        let zones = ZoneDetector::new(config.zone_detector_config())?;
        let bonus = config
            .bonus
            .map(|b| ProximityDetector::new(b.enter_distance, b.exit_distance))
            .transpose()?;

        info!(
            "soundscape ready: order {}, {} zones, {} Hz, {} frame blocks",
            order,
            zones.zone_count(),
            ctx.sample_rate(),
            ctx.block_size()
        );

        Ok(Self {
            bus: AmbisonicBus::new(order, config.block_size),
            rotator: SceneRotator::new(order),
            sources: SourceManager::new(order),
            aim: ListenerAimTracker::new(),
            config,
            assets,
            ctx,
            zones,
            bonus,
            decoder,
        })
    }

    /// Handle one ranging sample. Returns the zone transition it caused.
    pub fn on_ranging(&mut self, sample: DistanceSample) -> Option<ZoneTransition> {
        let bonus_beacon = self.config.bonus.map(|b| b.beacon);
        let mut used = false;

        if bonus_beacon == Some(sample.beacon) {
            used = true;
            let event = self
                .bonus
                .as_mut()
                .and_then(|detector| detector.update(sample.reading, sample.timestamp));
            match event {
                Some(ProximityEvent::Entered(_)) => self.enter_bonus(),
                Some(ProximityEvent::Left(_)) => self.leave_bonus(),
                None => {}
            }
        }

        let mut transition = None;
        if sample.beacon == self.config.zone_beacon {
            used = true;
            if self.is_bonus_active() {
                debug!("bonus active, zone sample at {} not used", sample.timestamp);
            } else {
                transition = self.zones.update(sample.reading, sample.timestamp);
                if let Some(tr) = transition {
                    self.apply_transition(tr);
                }
            }
        }

        if !used {
            debug!("sample from unknown beacon {} ignored", sample.beacon);
        }
        transition
    }

    /// Forget where the listener is. Everything fades out, and the next
    /// usable zone sample snaps straight to its zone.
    pub fn restart_ranging(&mut self) {
        info!("ranging restarted, waiting for the next zone sample");
        self.sources
            .stop(&self.ctx, StopTarget::All, self.config.crossfade_seconds);
        self.zones.reset();
        if let Some(detector) = self.bonus.as_mut() {
            detector.reset();
        }
    }

    /// Handle one orientation sample.
    pub fn on_orientation(&mut self, sample: OrientationSample) {
        let correction = self.aim.set_aim(sample.azimuth, sample.elevation);
        self.steer(correction);
    }

    /// Make the current heading "straight ahead". With `azimuth_only`
    /// unset, the current pitch becomes level as well.
    pub fn reset_aim(&mut self, azimuth_only: bool) {
        let correction = self.aim.reset_aim(azimuth_only);
        info!("aim reset, offset now {:?}", self.aim.offset());
        self.steer(correction);
    }

    /// Swap the decoder's impulse responses. Sources keep playing.
    pub fn set_filter_profile(&mut self, profile: FilterProfile) -> Result<(), ConfigError> {
        let filters = self
            .assets
            .filters(profile)
            .ok_or(ConfigError::MissingFilters(profile))?
            .clone();
        let ramp = self.ctx.seconds_to_frames(FILTER_SWAP_SECONDS);
        self.decoder.update_filters(profile, filters, ramp)
    }

    /// Render the next block into `left` and `right`, which should hold
    /// [`AudioContext::block_size`] frames, and advance the audio clock.
    pub fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.bus.clear();
        self.sources.render_into(&self.ctx, &mut self.bus);
        self.rotator.update_rot_mtx();
        self.rotator.process(&mut self.bus);
        self.decoder.process(&self.bus, left, right);
        self.ctx.advance();
    }

    /// Zone the listener is in, once known.
    pub fn current_zone(&self) -> Option<ZoneId> {
        self.zones.current_zone()
    }

    /// Full zone detector state.
    pub fn zone_state(&self) -> ZoneState {
        self.zones.state()
    }

    /// Whether the bonus override is playing.
    pub fn is_bonus_active(&self) -> bool {
        self.bonus.as_ref().map_or(false, ProximityDetector::is_near)
    }

    /// Snapshots of the addressable sources.
    pub fn sources(&self) -> Vec<SoundSource> {
        self.sources.sources()
    }

    /// The source manager, for inspection.
    pub fn source_manager(&self) -> &SourceManager {
        &self.sources
    }

    /// The audio context driving the render path.
    pub fn context(&self) -> &AudioContext {
        &self.ctx
    }

    /// The installation being played.
    pub fn config(&self) -> &InstallationConfig {
        &self.config
    }

    /// Current rotator `(yaw, pitch)` in degrees.
    pub fn rotation(&self) -> (f64, f64) {
        (self.rotator.yaw(), self.rotator.pitch())
    }

    /// Master gain the decoder is heading towards.
    pub fn master_gain(&self) -> f32 {
        self.decoder.master_gain()
    }

    fn steer(&mut self, correction: AimCorrection) {
        self.rotator.set_yaw(correction.yaw);
        if let Some(pitch) = correction.pitch {
            self.rotator.set_pitch(pitch);
        }
    }

    fn apply_transition(&mut self, tr: ZoneTransition) {
        let fade = self.config.crossfade_seconds;
        match tr.from {
            Some(from) => info!("zone {} -> {} at {:.2}s", from, tr.to, tr.timestamp),
            None => info!("starting in zone {} at {:.2}s", tr.to, tr.timestamp),
        }

        if let Some(cue) = tr.from.and_then(|from| self.config.cue_for(from, tr.to)) {
            self.sources
                .start_source(&self.ctx, &self.assets, cue, 0.0, 0.0, false, 0.0);
        }

        let leaving = tr
            .from
            .map(|from| self.config.zones[from].clone())
            .unwrap_or_default();
        let entering = self.config.zones[tr.to].clone();

        for spec in leaving.iter().filter(|spec| !entering.contains(spec)) {
            self.sources
                .stop(&self.ctx, StopTarget::Source(spec.buffer()), fade);
        }
        for spec in &entering {
            if leaving.contains(spec) && self.sources.is_active(spec.buffer()) {
                debug!("source {} carries over", spec.buffer());
                continue;
            }
            self.start_spec(spec, fade);
        }
    }

    fn start_spec(&mut self, spec: &SourceSpec, fade_in: f64) {
        match *spec {
            SourceSpec::Point {
                buffer,
                azimuth,
                elevation,
                looping,
            } => {
                self.sources.start_source(
                    &self.ctx,
                    &self.assets,
                    buffer,
                    azimuth,
                    elevation,
                    looping,
                    fade_in,
                );
            }
            SourceSpec::Bed { buffer, looping } => {
                self.sources
                    .start_bed(&self.ctx, &self.assets, buffer, looping, fade_in);
            }
        }
    }

    fn enter_bonus(&mut self) {
        let Some(bonus) = self.config.bonus else {
            return;
        };
        info!("bonus beacon {} reached, suspending zone audio", bonus.beacon);
        let fade = self.config.crossfade_seconds;
        self.sources.stop(&self.ctx, StopTarget::All, fade);
        self.sources.start_source(
            &self.ctx,
            &self.assets,
            bonus.buffer,
            0.0,
            0.0,
            bonus.looping,
            fade,
        );
    }

    fn leave_bonus(&mut self) {
        let Some(bonus) = self.config.bonus else {
            return;
        };
        let fade = self.config.crossfade_seconds;
        self.sources
            .stop(&self.ctx, StopTarget::Source(bonus.buffer), fade);

        match self.zones.current_zone() {
            Some(zone) => {
                info!("left bonus beacon {}, resuming zone {}", bonus.beacon, zone);
                for spec in self.config.zones[zone].clone() {
                    self.start_spec(&spec, fade);
                }
            }
            None => info!("left bonus beacon {}, no zone to resume yet", bonus.beacon),
        }
    }
}
