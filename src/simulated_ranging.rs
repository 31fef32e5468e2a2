//! A simulated beacon scanner, for running an installation without hardware.

use crate::ranging::{
    BeaconId, DistanceSample, RangingSource, Reading, Timestamp, DEFAULT_TX_POWER,
};

use log::{debug, warn};
use rand::prelude::*;
use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Distance to one beacon over time, as piecewise-linear waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkPath {
    waypoints: Vec<(Timestamp, f64)>,
    repeat: bool,
}

impl WalkPath {
    /// `(time, distance)` waypoints, sorted by time. Before the first and
    /// after the last waypoint the distance holds still.
    pub fn new(mut waypoints: Vec<(Timestamp, f64)>) -> Self {
        waypoints.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            waypoints,
            repeat: false,
        }
    }

    /// A path that walks from `near` to `far` and back every `period`
    /// seconds, forever.
    pub fn back_and_forth(near: f64, far: f64, period: f64) -> Self {
        Self {
            waypoints: vec![(0.0, near), (period / 2.0, far), (period, near)],
            repeat: true,
        }
    }

    /// Standing still at `distance`.
    pub fn fixed(distance: f64) -> Self {
        Self::new(vec![(0.0, distance)])
    }

    /// Distance at time `t`.
    pub fn distance_at(&self, t: Timestamp) -> f64 {
        let (first, last) = match (self.waypoints.first(), self.waypoints.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return f64::INFINITY,
        };
        let t = if self.repeat && last.0 > first.0 {
            first.0 + (t - first.0).rem_euclid(last.0 - first.0)
        } else {
            t
        };
        if t <= first.0 {
            return first.1;
        }
        self.waypoints
            .windows(2)
            .find(|w| t <= w[1].0)
            .map(|w| {
                let (t0, d0) = w[0];
                let (t1, d1) = w[1];
                if t1 > t0 {
                    d0 + (d1 - d0) * (t - t0) / (t1 - t0)
                } else {
                    d1
                }
            })
            .unwrap_or(last.1)
    }
}

/// Knobs of the simulated scanner.
#[derive(Debug, Clone)]
struct Simulation {
    beacons: Vec<(BeaconId, WalkPath)>,
    noise: f64,
    dropout: f64,
    tx_power: i32,
}

/// RSSI that would produce `distance`, inverting [`crate::ranging::estimate_distance`].
fn rssi_for_distance(distance: f64, tx_power: i32) -> i32 {
    let ratio = if distance < 1.0 {
        distance.max(1e-6).powf(0.1)
    } else {
        ((distance - 0.111).max(1e-6) / 0.89976).powf(1.0 / 7.7095)
    };
    ((ratio * tx_power as f64).round() as i32).min(-1)
}

impl Simulation {
    /// One scan: a sample per beacon at time `t`.
    fn scan(&self, t: Timestamp, rng: &mut impl Rng) -> Vec<DistanceSample> {
        self.beacons
            .iter()
            .map(|(beacon, path)| {
                if self.dropout > 0.0 && rng.gen_bool(self.dropout.min(1.0)) {
                    return DistanceSample {
                        beacon: *beacon,
                        rssi: 0,
                        reading: Reading::NoSignal,
                        timestamp: t,
                    };
                }
                let distance =
                    (path.distance_at(t) + rng.gen_range(-self.noise..=self.noise)).max(0.0);
                let rssi = rssi_for_distance(distance, self.tx_power);
                DistanceSample {
                    beacon: *beacon,
                    rssi,
                    reading: Reading::Distance(distance),
                    timestamp: t,
                }
            })
            .collect()
    }
}

enum Signal {
    Stop,
}

/// Builds a [`SimulatedRanging`].
#[derive(Debug, Clone)]
pub struct SimulatedRangingBuilder {
    simulation: Simulation,
    interval: Duration,
    seed: Option<u64>,
}

impl Default for SimulatedRangingBuilder {
    fn default() -> Self {
        Self {
            simulation: Simulation {
                beacons: Vec::new(),
                noise: 0.0,
                dropout: 0.0,
                tx_power: DEFAULT_TX_POWER,
            },
            interval: Duration::from_secs(1),
            seed: None,
        }
    }
}

impl SimulatedRangingBuilder {
    /// Add a beacon the listener moves along `path` relative to.
    pub fn beacon(mut self, beacon: BeaconId, path: WalkPath) -> Self {
        self.simulation.beacons.push((beacon, path));
        self
    }

    /// Time between two scans.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Uniform distance noise in metres, added to every reading. Anything
    /// not finite means no noise.
    pub fn noise(mut self, noise: f64) -> Self {
        self.simulation.noise = if noise.is_finite() { noise.abs() } else { 0.0 };
        self
    }

    /// Probability that a beacon is not heard during a scan. Anything not
    /// finite means no dropout.
    pub fn dropout(mut self, dropout: f64) -> Self {
        self.simulation.dropout = if dropout.is_finite() {
            dropout.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Calibrated RSSI at one metre.
    pub fn tx_power(mut self, tx_power: i32) -> Self {
        self.simulation.tx_power = tx_power;
        self
    }

    /// Make the noise reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Start scanning on a new thread.
    pub fn spawn(self) -> SimulatedRanging {
        SimulatedRanging::spawn(self)
    }
}

/// A [`RangingSource`] that walks a synthetic listener around the beacons
/// on its own timer thread.
pub struct SimulatedRanging {
    handle: Option<thread::JoinHandle<()>>,
    tx: mpsc::Sender<Signal>,
    msgs: Arc<Mutex<VecDeque<DistanceSample>>>,
}

impl SimulatedRanging {
    /// Start configuring a simulation.
    pub fn builder() -> SimulatedRangingBuilder {
        SimulatedRangingBuilder::default()
    }

    fn spawn(builder: SimulatedRangingBuilder) -> Self {
        let (tx, rx) = mpsc::channel::<Signal>();
        let msgs = Arc::new(Mutex::new(VecDeque::new()));
        let th_msgs = Arc::clone(&msgs);

        let SimulatedRangingBuilder {
            simulation,
            interval,
            seed,
        } = builder;

        let handle = thread::spawn(move || {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let started = Instant::now();
            loop {
                if let Ok(Signal::Stop) = rx.try_recv() {
                    break;
                }
                let scan = simulation.scan(started.elapsed().as_secs_f64(), &mut rng);
                debug!("simulated scan of {} beacons", scan.len());
                th_msgs.lock().unwrap().extend(scan);
                spin_sleep::sleep(interval);
            }
        });

        SimulatedRanging {
            handle: Some(handle),
            tx,
            msgs,
        }
    }

    /// Stop the scanning thread and wait for it. Samples already buffered
    /// can still be read.
    pub fn stop(&mut self) {
        // `.join()` moves the handle, hence the `Option` and `.take()`.
        if let Some(thread) = self.handle.take() {
            if self.tx.send(Signal::Stop).is_err() {
                warn!("simulated ranging thread is gone");
            }
            if thread.join().is_err() {
                warn!("simulated ranging thread panicked");
            }
        }
    }
}

impl Drop for SimulatedRanging {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Iterator for SimulatedRanging {
    type Item = DistanceSample;
    fn next(&mut self) -> Option<Self::Item> {
        self.msgs.lock().unwrap().pop_front()
    }
}

impl RangingSource for SimulatedRanging {
    fn clear(&mut self) {
        self.msgs.lock().unwrap().clear();
    }
}
