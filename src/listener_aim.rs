//! Tracks where the listener is looking and how that maps onto the scene.
//!
//! Orientation sensors report an absolute heading with no idea of which way
//! the installation faces. The tracker keeps an offset, rebased whenever the
//! listener asks to reset (by tapping, for instance), so that the heading at
//! reset time becomes "straight ahead".

/// One raw orientation reading, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aim {
    /// Heading, clockwise positive.
    pub azimuth: f64,
    /// Pitch, positive up.
    pub elevation: f64,
}

/// Rotator settings produced by a new aim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimCorrection {
    /// Corrected yaw.
    pub yaw: f64,
    /// Corrected pitch, `None` when the reading carried no elevation.
    pub pitch: Option<f64>,
}

/// Raw aim to corrected yaw and pitch, with a resettable offset.
#[derive(Debug, Clone, Default)]
pub struct ListenerAimTracker {
    last: Aim,
    offset: Aim,
}

impl ListenerAimTracker {
    /// A tracker with no offset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw aim. `elevation` of `None` leaves the last elevation
    /// alone.
    pub fn set_aim(&mut self, azimuth: f64, elevation: Option<f64>) -> AimCorrection {
        self.last.azimuth = azimuth;
        if let Some(elevation) = elevation {
            self.last.elevation = elevation;
        }
        AimCorrection {
            yaw: azimuth - self.offset.azimuth,
            pitch: elevation.map(|e| e - self.offset.elevation),
        }
    }

    /// Make the last raw aim the new "ahead". Returns the correction the
    /// rotator should now use, which is zero on the rebased axes.
    pub fn reset_aim(&mut self, azimuth_only: bool) -> AimCorrection {
        self.offset.azimuth = self.last.azimuth;
        if !azimuth_only {
            self.offset.elevation = self.last.elevation;
        }
        AimCorrection {
            yaw: self.last.azimuth - self.offset.azimuth,
            pitch: Some(self.last.elevation - self.offset.elevation),
        }
    }

    /// Current offset.
    pub fn offset(&self) -> Aim {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_subtracted() {
        let mut tracker = ListenerAimTracker::new();
        tracker.set_aim(40.0, Some(10.0));
        tracker.reset_aim(false);
        let c = tracker.set_aim(70.0, Some(5.0));
        assert_eq!(c.yaw, 30.0);
        assert_eq!(c.pitch, Some(-5.0));
    }

    #[test]
    fn missing_elevation_is_not_zero() {
        let mut tracker = ListenerAimTracker::new();
        tracker.set_aim(0.0, Some(12.0));
        let c = tracker.set_aim(15.0, None);
        assert_eq!(c.pitch, None);
        tracker.reset_aim(false);
        assert_eq!(tracker.offset(), Aim { azimuth: 15.0, elevation: 12.0 });
    }

    #[test]
    fn azimuth_only_reset_keeps_elevation_offset() {
        let mut tracker = ListenerAimTracker::new();
        tracker.set_aim(90.0, Some(20.0));
        let c = tracker.reset_aim(true);
        assert_eq!(c.yaw, 0.0);
        assert_eq!(c.pitch, Some(20.0));
        assert_eq!(tracker.offset(), Aim { azimuth: 90.0, elevation: 0.0 });
    }

    #[test]
    fn full_reset_rebases_elevation_on_elevation() {
        let mut tracker = ListenerAimTracker::new();
        tracker.set_aim(90.0, Some(20.0));
        tracker.reset_aim(false);
        assert_eq!(tracker.offset(), Aim { azimuth: 90.0, elevation: 20.0 });
    }

    #[test]
    fn reset_is_idempotent() {
        let mut tracker = ListenerAimTracker::new();
        tracker.set_aim(123.0, Some(-7.0));
        let first = tracker.reset_aim(false);
        let offset = tracker.offset();
        let second = tracker.reset_aim(false);
        assert_eq!(first, second);
        assert_eq!(tracker.offset(), offset);
        assert_eq!(first, AimCorrection { yaw: 0.0, pitch: Some(0.0) });
    }
}
