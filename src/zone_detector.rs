//! Turns noisy distance readings into a stable zone.
//!
//! Zones are concentric rings around a beacon: with radii `r[0] < r[1] <
//! ...`, zone `k` covers `[r[k-1], r[k])`, zone 0 starts at the beacon and
//! the last zone is unbounded. Two mechanisms keep the zone from
//! flickering when the listener stands near a boundary:
//!
//! * a spatial dead band: a reading strictly closer than
//!   `hysteresis_distance` to one of the current zone's own boundaries
//!   proposes no change at all;
//! * a dwell time: a change is only accepted `hysteresis_time` seconds or
//!   more after the previous one.
//!
//! The very first usable reading snaps straight to its zone, ignoring both.

use crate::error::ConfigError;
use crate::ranging::{Reading, Timestamp};

use log::debug;

/// Index of a zone, 0 being the closest to the beacon.
pub type ZoneId = usize;

/// Zone thresholds and hysteresis.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneDetectorConfig {
    /// Outer radius of every zone but the last, strictly increasing.
    pub radii: Vec<f64>,
    /// Half-width of the dead band around each radius, in metres. Two
    /// neighbouring bands may not touch.
    pub hysteresis_distance: f64,
    /// Minimum time between two accepted transitions, in seconds.
    pub hysteresis_time: f64,
}

impl ZoneDetectorConfig {
    /// Check the radii are usable, the hysteresis is non-negative and the
    /// dead bands leave room for every zone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.radii.is_empty() {
            return Err(ConfigError::EmptyZones);
        }
        let positive = self.radii.iter().all(|r| r.is_finite() && *r > 0.0);
        let increasing = self.radii.windows(2).all(|w| w[0] < w[1]);
        if !positive || !increasing {
            return Err(ConfigError::UnorderedZones);
        }
        let valid = |x: f64| x.is_finite() && x >= 0.0;
        if !valid(self.hysteresis_distance) || !valid(self.hysteresis_time) {
            return Err(ConfigError::InvalidHysteresis);
        }
        let gap = self
            .radii
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(f64::INFINITY, f64::min);
        if 2.0 * self.hysteresis_distance >= gap {
            return Err(ConfigError::OverlappingDeadBands {
                hysteresis: self.hysteresis_distance,
                gap,
            });
        }
        Ok(())
    }
}

/// What the detector currently believes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZoneState {
    /// Zone the listener is in, once initialised.
    pub current_zone: Option<ZoneId>,
    /// Time of the last accepted transition.
    pub last_transition: Option<Timestamp>,
    /// Whether a first usable reading has been seen.
    pub has_initialized: bool,
}

/// An accepted zone change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneTransition {
    /// Zone left, `None` for the initial snap.
    pub from: Option<ZoneId>,
    /// Zone entered.
    pub to: ZoneId,
    /// Timestamp of the reading that caused the change.
    pub timestamp: Timestamp,
}

/// The hysteresis state machine.
#[derive(Debug, Clone)]
pub struct ZoneDetector {
    config: ZoneDetectorConfig,
    state: ZoneState,
}

impl ZoneDetector {
    /// A detector that has not seen any reading yet.
    pub fn new(config: ZoneDetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: ZoneState::default(),
        })
    }

    /// Number of zones, one more than the number of radii.
    pub fn zone_count(&self) -> usize {
        self.config.radii.len() + 1
    }

    /// The thresholds in use.
    pub fn config(&self) -> &ZoneDetectorConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> ZoneState {
        self.state
    }

    /// Current zone, once initialised.
    pub fn current_zone(&self) -> Option<ZoneId> {
        self.state.current_zone
    }

    /// Zone a distance falls in, without any hysteresis.
    pub fn raw_zone(&self, distance: f64) -> ZoneId {
        self.config.radii.partition_point(|r| *r <= distance)
    }

    /// Whether `distance` lies strictly inside the dead band of one of the
    /// two radii bounding `zone`.
    pub fn in_dead_band(&self, zone: ZoneId, distance: f64) -> bool {
        let radii = &self.config.radii;
        let inner = zone.checked_sub(1).and_then(|k| radii.get(k));
        let outer = radii.get(zone);
        inner
            .into_iter()
            .chain(outer)
            .any(|r| (distance - r).abs() < self.config.hysteresis_distance)
    }

    /// Feed one reading. Returns the transition it caused, if any.
    pub fn update(&mut self, reading: Reading, timestamp: Timestamp) -> Option<ZoneTransition> {
        let distance = match reading.distance() {
            Some(d) if timestamp.is_finite() => d,
            _ => {
                debug!("ignoring unusable reading {:?} at {}", reading, timestamp);
                return None;
            }
        };

        let current = match self.state.current_zone {
            Some(zone) if self.state.has_initialized => zone,
            _ => return Some(self.accept(None, self.raw_zone(distance), timestamp)),
        };

        let candidate = if self.in_dead_band(current, distance) {
            current
        } else {
            self.raw_zone(distance)
        };
        if candidate == current {
            return None;
        }

        let elapsed = self
            .state
            .last_transition
            .map_or(f64::INFINITY, |last| timestamp - last);
        if !(elapsed >= self.config.hysteresis_time) {
            debug!(
                "zone {} -> {} held back, {:.2}s since last change",
                current, candidate, elapsed
            );
            return None;
        }

        Some(self.accept(Some(current), candidate, timestamp))
    }

    /// Forget everything. The next usable reading snaps again.
    pub fn reset(&mut self) {
        self.state = ZoneState::default();
    }

    fn accept(&mut self, from: Option<ZoneId>, to: ZoneId, timestamp: Timestamp) -> ZoneTransition {
        self.state = ZoneState {
            current_zone: Some(to),
            last_transition: Some(timestamp),
            has_initialized: true,
        };
        ZoneTransition {
            from,
            to,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn detector() -> ZoneDetector {
        ZoneDetector::new(ZoneDetectorConfig {
            radii: vec![3.0, 6.0],
            hysteresis_distance: 1.0,
            hysteresis_time: 2.0,
        })
        .unwrap()
    }

    fn feed(detector: &mut ZoneDetector, samples: &[(f64, f64)]) -> Vec<ZoneId> {
        samples
            .iter()
            .filter_map(|&(d, t)| detector.update(Reading::Distance(d), t))
            .map(|tr| tr.to)
            .collect()
    }

    #[test]
    fn raw_zone_boundaries() {
        let det = detector();
        assert_eq!(det.zone_count(), 3);
        assert_eq!(det.raw_zone(0.0), 0);
        assert_eq!(det.raw_zone(2.99), 0);
        assert_eq!(det.raw_zone(3.0), 1);
        assert_eq!(det.raw_zone(6.0), 2);
        assert_eq!(det.raw_zone(100.0), 2);
    }

    #[test]
    fn walking_out_and_back() {
        let mut det = detector();
        let zones = feed(&mut det, &[(2.5, 0.0), (4.5, 3.0), (2.0, 6.0)]);
        assert_eq!(zones, vec![0, 1, 0]);
    }

    #[test]
    fn dead_band_holds_the_zone() {
        let mut det = detector();
        let zones = feed(&mut det, &[(2.5, 0.0), (3.5, 3.0), (2.8, 6.0)]);
        assert_eq!(zones, vec![0]);
        assert_eq!(det.current_zone(), Some(0));
    }

    #[test]
    fn dead_band_edge_is_outside() {
        let mut det = detector();
        feed(&mut det, &[(1.0, 0.0)]);
        // |4.0 - 3.0| == 1.0 is not strictly inside the band.
        assert_eq!(feed(&mut det, &[(4.0, 5.0)]), vec![1]);
    }

    #[test]
    fn only_the_current_zone_boundaries_hold() {
        let mut det = detector();
        feed(&mut det, &[(2.5, 0.0)]);
        // 5.5 is within the band of 6.0, which zone 0 does not touch.
        assert!(!det.in_dead_band(0, 5.5));
        assert!(det.in_dead_band(1, 5.5));
        let zones = feed(&mut det, &[(5.5, 10.0), (5.5, 20.0), (5.5, 30.0)]);
        assert_eq!(zones, vec![1]);
        assert_eq!(det.current_zone(), Some(1));
    }

    #[test]
    fn walking_back_in_from_outside() {
        let mut det = ZoneDetector::new(ZoneDetectorConfig {
            radii: vec![3.0, 6.0],
            hysteresis_distance: 1.4,
            hysteresis_time: 2.0,
        })
        .unwrap();
        feed(&mut det, &[(9.0, 0.0)]);
        let walk = [8.0, 7.0, 5.0, 4.0, 3.0, 2.0, 1.0];
        let zones: Vec<_> = walk
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                det.update(Reading::Distance(d), 10.0 * (i + 1) as f64);
                det.current_zone().unwrap()
            })
            .collect();
        assert_eq!(zones, vec![2, 2, 2, 1, 1, 1, 0]);
    }

    #[test]
    fn changes_inside_dwell_time_are_dropped() {
        let mut det = detector();
        let zones = feed(&mut det, &[(2.5, 0.0), (4.5, 3.0), (1.0, 3.5), (1.0, 5.0)]);
        assert_eq!(zones, vec![0, 1, 0]);
        assert_eq!(det.state().last_transition, Some(5.0));
    }

    #[test]
    fn initial_snap_ignores_dead_band_and_dwell() {
        let mut det = detector();
        let tr = det.update(Reading::Distance(3.2), 100.0).unwrap();
        assert_eq!(tr.from, None);
        assert_eq!(tr.to, 1);
        assert!(det.state().has_initialized);
    }

    #[test]
    fn snap_starts_the_dwell_clock() {
        let mut det = detector();
        assert_eq!(feed(&mut det, &[(0.5, 0.0), (9.0, 1.0)]), vec![0]);
        assert_eq!(feed(&mut det, &[(9.0, 2.0)]), vec![2]);
    }

    #[test]
    fn unusable_readings_change_nothing() {
        let mut det = detector();
        assert_eq!(det.update(Reading::NoSignal, 0.0), None);
        assert_eq!(det.update(Reading::Distance(-1.0), 0.0), None);
        assert_eq!(det.update(Reading::Distance(f64::NAN), 0.0), None);
        assert_eq!(det.update(Reading::Distance(f64::INFINITY), 0.0), None);
        assert_eq!(det.state(), ZoneState::default());

        feed(&mut det, &[(2.0, 0.0)]);
        let before = det.state();
        assert_eq!(det.update(Reading::NoSignal, 10.0), None);
        assert_eq!(det.state(), before);
    }

    #[test]
    fn late_samples_never_pass_the_dwell() {
        let mut det = detector();
        feed(&mut det, &[(2.0, 10.0)]);
        assert_eq!(det.update(Reading::Distance(9.0), 4.0), None);
        assert_eq!(det.current_zone(), Some(0));
    }

    #[test]
    fn reset_snaps_again() {
        let mut det = detector();
        feed(&mut det, &[(2.0, 0.0)]);
        det.reset();
        let tr = det.update(Reading::Distance(9.0), 0.5).unwrap();
        assert_eq!(tr, ZoneTransition { from: None, to: 2, timestamp: 0.5 });
    }

    #[test]
    fn bad_configs_are_rejected() {
        let config = |radii: Vec<f64>, hd: f64, ht: f64| ZoneDetectorConfig {
            radii,
            hysteresis_distance: hd,
            hysteresis_time: ht,
        };
        assert!(matches!(
            ZoneDetector::new(config(vec![], 1.0, 1.0)),
            Err(ConfigError::EmptyZones)
        ));
        assert!(matches!(
            ZoneDetector::new(config(vec![6.0, 3.0], 1.0, 1.0)),
            Err(ConfigError::UnorderedZones)
        ));
        assert!(matches!(
            ZoneDetector::new(config(vec![3.0, 3.0], 1.0, 1.0)),
            Err(ConfigError::UnorderedZones)
        ));
        assert!(matches!(
            ZoneDetector::new(config(vec![3.0], -1.0, 1.0)),
            Err(ConfigError::InvalidHysteresis)
        ));
        assert!(matches!(
            ZoneDetector::new(config(vec![3.0], 1.0, f64::NAN)),
            Err(ConfigError::InvalidHysteresis)
        ));
        assert!(matches!(
            ZoneDetector::new(config(vec![3.0, 6.0], 1.5, 1.0)),
            Err(ConfigError::OverlappingDeadBands { gap, .. }) if gap == 3.0
        ));
        assert!(ZoneDetector::new(config(vec![3.0, 6.0], 1.49, 1.0)).is_ok());
        assert!(ZoneDetector::new(config(vec![3.0], 10.0, 1.0)).is_ok());
    }

    proptest! {
        #[test]
        fn dead_band_readings_never_move_the_zone(
            start in 0.0f64..10.0,
            offsets in prop::collection::vec((-0.99f64..0.99, 0usize..2), 1..40),
        ) {
            let mut det = detector();
            det.update(Reading::Distance(start), 0.0);
            let zone = det.current_zone();
            let bounds: Vec<f64> = match zone {
                Some(0) => vec![3.0],
                Some(1) => vec![3.0, 6.0],
                _ => vec![6.0],
            };
            for (i, (offset, pick)) in offsets.into_iter().enumerate() {
                let d = bounds[pick % bounds.len()] + offset;
                let tr = det.update(Reading::Distance(d), 10.0 * (i + 1) as f64);
                prop_assert_eq!(tr, None);
                prop_assert_eq!(det.current_zone(), zone);
            }
        }

        #[test]
        fn accepted_transitions_respect_dwell_time(
            samples in prop::collection::vec((0.0f64..10.0, 0.0f64..3.0), 1..60),
        ) {
            let mut det = detector();
            let mut t = 0.0;
            let mut stamps = Vec::new();
            for (d, dt) in samples {
                t += dt;
                if let Some(tr) = det.update(Reading::Distance(d), t) {
                    prop_assert!(tr.to < det.zone_count());
                    prop_assert_ne!(Some(tr.to), tr.from);
                    stamps.push(tr.timestamp);
                }
            }
            for pair in stamps.windows(2) {
                prop_assert!(pair[1] - pair[0] >= 2.0);
            }
        }
    }
}
