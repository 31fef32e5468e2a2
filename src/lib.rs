//! Soundwalk plays a location-aware spatial soundscape to a listener
//! walking around an installation. The listener carries a phone that
//! ranges Bluetooth beacons and tracks head orientation; the distance to
//! one beacon selects a zone, each zone plays its own set of sources placed
//! around the listener, and the whole scene is rendered binaurally so that
//! the sources stay put in the room when the listener turns their head.
//!
//! The audio side is a higher-order ambisonic chain. Every source is
//! encoded onto a shared bus, the bus is rotated once against the
//! listener's heading, and a binaural decoder folds it down to stereo:
//!
//! * [`encoder`], [`rotator`] and [`decoder`] are the three ambisonic
//!   stages, built on the real harmonics in [`spherical_harmonics`];
//! * [`source_manager`] owns the playing sources and their fades;
//! * [`zone_detector`] and [`proximity_detector`] turn noisy distances into
//!   stable decisions;
//! * [`soundscape`] wires everything to the ranging and orientation feeds.
//!
//! Installations are described in RON files, see [`config`].

#![warn(missing_docs)]
pub mod args;
pub mod assets;
pub mod audio_context;
pub mod bus;
pub mod component;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod listener_aim;
pub mod proximity_detector;
pub mod ramp;
pub mod ranging;
pub mod rotator;
pub mod scan_ranging;
pub mod scan_report_decoder;
pub mod simulated_ranging;
pub mod soundscape;
pub mod source_manager;
pub mod spherical_harmonics;
pub mod wav_sink;
pub mod zone_detector;
