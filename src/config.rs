//! Installation configuration, read from and written to [ron] files.
//!
//! A configuration describes one installation: the ambisonic order and
//! audio block layout, the beacons, the zone radii and their hysteresis,
//! which sources play in which zone, the transition cues between zones and
//! the optional bonus beacon. A file only needs the fields it wants to
//! change, everything else falls back to [`InstallationConfig::default`]:
//!
//! ```text
//! (
//!     ambisonic_order: 1,
//!     zone_radii: [3.0, 6.0],
//!     hysteresis_distance: 1.0,
//!     hysteresis_time: 2.0,
//!     zones: [
//!         [Point(buffer: 0, azimuth: 0.0, elevation: 0.0, looping: true)],
//!         [Point(buffer: 1, azimuth: 90.0, elevation: 0.0, looping: true)],
//!         [Bed(buffer: 2, looping: true)],
//!     ],
//! )
//! ```

use crate::assets::BufferId;
use crate::decoder::FilterProfile;
use crate::error::ConfigError;
use crate::ranging::{BeaconId, DEFAULT_TX_POWER};
use crate::spherical_harmonics::MAX_ORDER;
use crate::zone_detector::{ZoneDetectorConfig, ZoneId};

use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fs, path::Path, str::FromStr};

/// Everything needed to build a [`Soundscape`](crate::soundscape::Soundscape).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallationConfig {
    /// Ambisonic order shared by encoders, rotator and decoder.
    pub ambisonic_order: usize,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Frames rendered per block.
    pub block_size: usize,
    /// Master gain before loudness compensation.
    pub master_gain: f32,
    /// Impulse-response bank used at start-up.
    pub filter_profile: FilterProfile,
    /// Calibrated RSSI at one metre, in dBm.
    pub tx_power: i32,
    /// Beacon whose distance selects the zone.
    pub zone_beacon: BeaconId,
    /// Outer radius of every zone but the last, in metres.
    pub zone_radii: Vec<f64>,
    /// Half-width of the dead band around each radius, in metres.
    pub hysteresis_distance: f64,
    /// Minimum time between two zone changes, in seconds.
    pub hysteresis_time: f64,
    /// Fade-out of the old zone and fade-in of the new one, in seconds.
    pub crossfade_seconds: f64,
    /// Sources played in each zone, one list per zone.
    pub zones: Vec<Vec<SourceSpec>>,
    /// One-shot cues played when moving from one zone to another.
    pub transition_cues: Vec<TransitionCue>,
    /// Optional proximity-triggered override.
    pub bonus: Option<BonusConfig>,
}

/// A source that plays while its zone is active.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub enum SourceSpec {
    /// A mono buffer encoded at a fixed direction.
    Point {
        /// Buffer to play.
        buffer: BufferId,
        /// Degrees, 0 ahead, clockwise positive.
        azimuth: f64,
        /// Degrees, positive up.
        elevation: f64,
        /// Restart at the end of the buffer.
        looping: bool,
    },
    /// A pre-encoded ambisonic recording.
    Bed {
        /// Bed to play.
        buffer: BufferId,
        /// Restart at the end of the recording.
        looping: bool,
    },
}

impl SourceSpec {
    /// The buffer this source plays.
    pub fn buffer(&self) -> BufferId {
        match *self {
            SourceSpec::Point { buffer, .. } | SourceSpec::Bed { buffer, .. } => buffer,
        }
    }
}

/// Cue played on the transition `from` → `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransitionCue {
    /// Zone being left.
    pub from: ZoneId,
    /// Zone being entered.
    pub to: ZoneId,
    /// One-shot buffer to play.
    pub buffer: BufferId,
}

/// The bonus override: getting close to a second beacon replaces the zone
/// soundscape with a dedicated track until the listener walks away again.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BonusConfig {
    /// Beacon that triggers the override.
    pub beacon: BeaconId,
    /// Override engages below this distance, in metres.
    pub enter_distance: f64,
    /// Override releases above this distance, in metres.
    pub exit_distance: f64,
    /// Track played during the override.
    pub buffer: BufferId,
    /// Restart the track when it ends.
    pub looping: bool,
}

/// Sources for `buffers`, spread evenly around the listener at ear level.
pub fn circle_layout(buffers: &[BufferId], looping: bool) -> Vec<SourceSpec> {
    buffers
        .iter()
        .enumerate()
        .map(|(i, &buffer)| SourceSpec::Point {
            buffer,
            azimuth: 360.0 / buffers.len() as f64 * i as f64,
            elevation: 0.0,
            looping,
        })
        .collect()
}

impl Default for InstallationConfig {
    /// Three zones around one beacon (radii 3 m and 6 m), with a cue on
    /// every adjacent transition and a bonus beacon.
    fn default() -> Self {
        Self {
            ambisonic_order: 1,
            sample_rate: 44100,
            block_size: 512,
            master_gain: 0.5,
            filter_profile: FilterProfile::Virtual,
            tx_power: DEFAULT_TX_POWER,
            zone_beacon: BeaconId::new(0, 0),
            zone_radii: vec![3.0, 6.0],
            hysteresis_distance: 1.0,
            hysteresis_time: 2.0,
            crossfade_seconds: 1.0,
            zones: vec![
                circle_layout(&[0, 1], true),
                circle_layout(&[2, 3, 4], true),
                circle_layout(&[5], true),
            ],
            transition_cues: vec![
                TransitionCue { from: 0, to: 1, buffer: 10 },
                TransitionCue { from: 1, to: 0, buffer: 11 },
                TransitionCue { from: 1, to: 2, buffer: 12 },
                TransitionCue { from: 2, to: 1, buffer: 13 },
            ],
            bonus: Some(BonusConfig {
                beacon: BeaconId::new(0, 1),
                enter_distance: 5.0,
                exit_distance: 7.0,
                buffer: 20,
                looping: true,
            }),
        }
    }
}

impl InstallationConfig {
    /// Read and validate a configuration from the path provided.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        fs::read_to_string(path)?.parse()
    }

    /// Write the configuration to the path provided, as pretty RON.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, PrettyConfig::default())?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Check every constraint that would make the soundscape unbuildable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ambisonic_order == 0 || self.ambisonic_order > MAX_ORDER {
            return Err(ConfigError::UnsupportedOrder(self.ambisonic_order));
        }
        if self.sample_rate == 0 || self.block_size == 0 {
            return Err(ConfigError::InvalidAudioContext);
        }
        self.zone_detector_config().validate()?;

        let zone_count = self.zone_count();
        if self.zones.len() != zone_count {
            return Err(ConfigError::ZoneMappingMismatch {
                zones: zone_count,
                mappings: self.zones.len(),
            });
        }
        if let Some(cue) = self
            .transition_cues
            .iter()
            .find(|c| c.from >= zone_count || c.to >= zone_count)
        {
            return Err(ConfigError::UnknownZone(cue.from.max(cue.to)));
        }
        if let Some(bonus) = &self.bonus {
            let valid = bonus.enter_distance.is_finite()
                && bonus.exit_distance.is_finite()
                && bonus.enter_distance > 0.0
                && bonus.enter_distance < bonus.exit_distance;
            if !valid {
                return Err(ConfigError::InvalidProximity {
                    enter: bonus.enter_distance,
                    exit: bonus.exit_distance,
                });
            }
        }

        // Voices are keyed by buffer, so a cue sharing a zone source's
        // buffer would be replaced by the zone it announces.
        let zone_buffers: BTreeSet<BufferId> =
            self.zones.iter().flatten().map(SourceSpec::buffer).collect();
        if let Some(buffer) = self
            .transition_cues
            .iter()
            .map(|c| c.buffer)
            .chain(self.bonus.iter().map(|b| b.buffer))
            .find(|b| zone_buffers.contains(b))
        {
            return Err(ConfigError::SharedBuffer(buffer));
        }
        Ok(())
    }

    /// Number of zones implied by the radii.
    pub fn zone_count(&self) -> usize {
        self.zone_radii.len() + 1
    }

    /// The part of the configuration the zone detector needs.
    pub fn zone_detector_config(&self) -> ZoneDetectorConfig {
        ZoneDetectorConfig {
            radii: self.zone_radii.clone(),
            hysteresis_distance: self.hysteresis_distance,
            hysteresis_time: self.hysteresis_time,
        }
    }

    /// Cue for the ordered zone pair, if one is configured.
    pub fn cue_for(&self, from: ZoneId, to: ZoneId) -> Option<BufferId> {
        self.transition_cues
            .iter()
            .find(|c| c.from == from && c.to == to)
            .map(|c| c.buffer)
    }

    /// Every buffer the installation may play.
    pub fn buffer_ids(&self) -> BTreeSet<BufferId> {
        self.zones
            .iter()
            .flatten()
            .map(SourceSpec::buffer)
            .chain(self.transition_cues.iter().map(|c| c.buffer))
            .chain(self.bonus.iter().map(|b| b.buffer))
            .collect()
    }
}

impl FromStr for InstallationConfig {
    type Err = ConfigError;

    /// Parse and validate a RON configuration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: InstallationConfig = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
