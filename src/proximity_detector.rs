//! Enter/exit detection around a single beacon, used for the bonus
//! override. Separate thresholds keep the state from chattering: the
//! listener is "near" once closer than `enter` and stays near until they
//! are further than `exit`.

use crate::error::ConfigError;
use crate::ranging::{Reading, Timestamp};

use log::debug;

/// A change of the near/far state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProximityEvent {
    /// The listener came closer than the enter distance.
    Entered(Timestamp),
    /// The listener went further than the exit distance.
    Left(Timestamp),
}

/// Two-threshold proximity detector.
#[derive(Debug, Clone)]
pub struct ProximityDetector {
    enter: f64,
    exit: f64,
    near: bool,
}

impl ProximityDetector {
    /// A detector that starts "far". `enter` must be positive and below
    /// `exit`.
    pub fn new(enter: f64, exit: f64) -> Result<Self, ConfigError> {
        if !(enter.is_finite() && exit.is_finite() && enter > 0.0 && enter < exit) {
            return Err(ConfigError::InvalidProximity { enter, exit });
        }
        Ok(Self {
            enter,
            exit,
            near: false,
        })
    }

    /// Whether the listener is currently near.
    pub fn is_near(&self) -> bool {
        self.near
    }

    /// Feed one reading. Unusable readings are ignored.
    pub fn update(&mut self, reading: Reading, timestamp: Timestamp) -> Option<ProximityEvent> {
        let Some(distance) = reading.distance() else {
            debug!("proximity ignoring {:?}", reading);
            return None;
        };
        match self.near {
            false if distance < self.enter => {
                self.near = true;
                Some(ProximityEvent::Entered(timestamp))
            }
            true if distance > self.exit => {
                self.near = false;
                Some(ProximityEvent::Left(timestamp))
            }
            _ => None,
        }
    }

    /// Back to "far", without emitting anything.
    pub fn reset(&mut self) {
        self.near = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_and_leave() {
        let mut det = ProximityDetector::new(5.0, 7.0).unwrap();
        assert_eq!(det.update(Reading::Distance(8.0), 0.0), None);
        assert_eq!(
            det.update(Reading::Distance(4.0), 1.0),
            Some(ProximityEvent::Entered(1.0))
        );
        assert!(det.is_near());
        assert_eq!(
            det.update(Reading::Distance(8.0), 2.0),
            Some(ProximityEvent::Left(2.0))
        );
        assert!(!det.is_near());
    }

    #[test]
    fn between_thresholds_keeps_state() {
        let mut det = ProximityDetector::new(5.0, 7.0).unwrap();
        assert_eq!(det.update(Reading::Distance(6.0), 0.0), None);
        det.update(Reading::Distance(4.9), 1.0);
        assert_eq!(det.update(Reading::Distance(6.9), 2.0), None);
        assert_eq!(det.update(Reading::Distance(7.0), 3.0), None);
        assert!(det.is_near());
    }

    #[test]
    fn no_signal_is_ignored() {
        let mut det = ProximityDetector::new(5.0, 7.0).unwrap();
        det.update(Reading::Distance(1.0), 0.0);
        assert_eq!(det.update(Reading::NoSignal, 1.0), None);
        assert!(det.is_near());
    }

    #[test]
    fn thresholds_must_leave_a_band() {
        assert!(ProximityDetector::new(7.0, 5.0).is_err());
        assert!(ProximityDetector::new(5.0, 5.0).is_err());
        assert!(ProximityDetector::new(0.0, 5.0).is_err());
    }
}
