//! Configuration errors. Everything in here is fatal at construction time:
//! a soundscape that cannot be built correctly is never built at all.

use crate::assets::BufferId;
use crate::decoder::FilterProfile;

use std::{borrow::Cow, error::Error, fmt};

/// Returned when an installation, or one of the audio graph stages, is
/// configured inconsistently.
#[derive(Debug)]
pub enum ConfigError {
    /// Two stages of the ambisonic graph disagree on the number of channels.
    ChannelMismatch {
        /// Channel count implied by the configured order.
        expected: usize,
        /// Channel count actually supplied.
        found: usize,
    },

    /// The ambisonic order is zero or larger than we can evaluate.
    UnsupportedOrder(usize),

    /// The zone radius list is empty.
    EmptyZones,

    /// The zone radii are not strictly increasing positive numbers.
    UnorderedZones,

    /// The hysteresis distance or time is negative or not finite.
    InvalidHysteresis,

    /// Two neighbouring dead bands touch or overlap, leaving no room
    /// between them for a zone change to commit.
    OverlappingDeadBands {
        /// Configured hysteresis distance.
        hysteresis: f64,
        /// Smallest distance between two neighbouring radii.
        gap: f64,
    },

    /// The bonus beacon's enter distance is not below its exit distance.
    InvalidProximity {
        /// Distance under which the override engages.
        enter: f64,
        /// Distance over which the override releases.
        exit: f64,
    },

    /// The number of zone source lists does not match the number of zones.
    ZoneMappingMismatch {
        /// Zones implied by the radius list.
        zones: usize,
        /// Source lists found in the configuration.
        mappings: usize,
    },

    /// A transition cue refers to a zone that does not exist.
    UnknownZone(usize),

    /// A cue or bonus buffer is also played as a zone source, and the two
    /// voices would share one slot.
    SharedBuffer(BufferId),

    /// No impulse responses were provided for the requested profile.
    MissingFilters(FilterProfile),

    /// An impulse response set contains an empty filter.
    EmptyFilter(usize),

    /// Sample rate or block size is zero.
    InvalidAudioContext,

    /// Returned when io fails while reading or writing a configuration file.
    Io(std::io::Error),

    /// Returned when deserialization of a configuration file fails.
    RonSpanned(ron::de::SpannedError),

    /// Returned when serialization of a configuration fails.
    Ron(ron::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError as CE;
        let msg = match self {
            CE::ChannelMismatch { expected, found } => Cow::from(format!(
                "channel count mismatch: expected {} channels, found {}",
                expected, found
            )),
            CE::UnsupportedOrder(order) => {
                Cow::from(format!("unsupported ambisonic order {}", order))
            }
            CE::EmptyZones => Cow::from("zone radius list is empty"),
            CE::UnorderedZones => Cow::from("zone radii must be positive and strictly increasing"),
            CE::InvalidHysteresis => Cow::from("hysteresis offsets must be finite and non-negative"),
            CE::OverlappingDeadBands { hysteresis, gap } => Cow::from(format!(
                "hysteresis distance {} leaves no room between radii {} apart",
                hysteresis, gap
            )),
            CE::InvalidProximity { enter, exit } => Cow::from(format!(
                "bonus enter distance {} must be below exit distance {}",
                enter, exit
            )),
            CE::ZoneMappingMismatch { zones, mappings } => Cow::from(format!(
                "{} zones configured but {} zone source lists given",
                zones, mappings
            )),
            CE::UnknownZone(zone) => Cow::from(format!("unknown zone {}", zone)),
            CE::SharedBuffer(buffer) => Cow::from(format!(
                "buffer {} is both a zone source and a cue or bonus track",
                buffer
            )),
            CE::MissingFilters(profile) => {
                Cow::from(format!("no impulse responses for profile {}", profile))
            }
            CE::EmptyFilter(channel) => {
                Cow::from(format!("impulse response for channel {} is empty", channel))
            }
            CE::InvalidAudioContext => Cow::from("sample rate and block size must be non-zero"),
            CE::Io(error) => Cow::from(format!("io error: {}", error)),
            CE::RonSpanned(error) => Cow::from(format!("ron parse error: {}", error)),
            CE::Ron(error) => Cow::from(format!("ron error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ron::de::SpannedError> for ConfigError {
    fn from(value: ron::de::SpannedError) -> Self {
        Self::RonSpanned(value)
    }
}

impl From<ron::Error> for ConfigError {
    fn from(value: ron::Error) -> Self {
        Self::Ron(value)
    }
}
