//! Beacon ranging: distance samples, RSSI to distance estimation and the
//! [`RangingSource`] capability every feed implements.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the start of the walk, on the feed's own clock.
pub type Timestamp = f64;

/// Calibrated RSSI one metre away from a beacon, in dBm.
pub const DEFAULT_TX_POWER: i32 = -55;

/// iBeacon identifiers of one beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct BeaconId {
    /// Major number, shared by the beacons of one installation.
    pub major: u16,
    /// Minor number, unique within the installation.
    pub minor: u16,
}

impl BeaconId {
    #[allow(missing_docs)]
    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for BeaconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What a ranging scan says about one beacon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Estimated distance in metres.
    Distance(f64),
    /// The beacon was not heard during the scan.
    NoSignal,
}

impl Reading {
    /// The distance, if there is a usable one.
    pub fn distance(self) -> Option<f64> {
        match self {
            Reading::Distance(d) if d.is_finite() && d >= 0.0 => Some(d),
            _ => None,
        }
    }
}

/// One ranging measurement of one beacon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    /// Beacon that was measured.
    pub beacon: BeaconId,
    /// Raw signal strength in dBm, zero when not heard.
    pub rssi: i32,
    /// Distance estimated from `rssi`.
    pub reading: Reading,
    /// When the measurement was taken.
    pub timestamp: Timestamp,
}

impl DistanceSample {
    /// A sample whose reading is estimated from `rssi`.
    pub fn from_rssi(beacon: BeaconId, rssi: i32, tx_power: i32, timestamp: Timestamp) -> Self {
        Self {
            beacon,
            rssi,
            reading: estimate_distance(rssi, tx_power),
            timestamp,
        }
    }
}

/// Log-distance estimate used by the common iBeacon stacks. An `rssi` of
/// zero means the scan did not hear the beacon.
pub fn estimate_distance(rssi: i32, tx_power: i32) -> Reading {
    if rssi == 0 || tx_power == 0 {
        return Reading::NoSignal;
    }
    let ratio = rssi as f64 / tx_power as f64;
    if ratio < 1.0 {
        Reading::Distance(ratio.powi(10))
    } else {
        Reading::Distance(0.89976 * ratio.powf(7.7095) + 0.111)
    }
}

/// `RangingSource`
///
/// A typed, clearable iterator that emits [`DistanceSample`]s when iterated
/// upon, in arrival order. Iteration never blocks: `None` means nothing new
/// has arrived yet, not that the feed is over.
pub trait RangingSource: Iterator<Item = DistanceSample> {
    /// Drop every sample that has not been read yet.
    fn clear(&mut self);
}
