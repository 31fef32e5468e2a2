//! The thread-safe buffer where we store [`ScanReport`]s from a beacon
//! scanner, exposed as a [`RangingSource`].

use crate::ranging::{DistanceSample, RangingSource};
use crate::scan_report_decoder::ScanReport;

use log::{debug, warn};
use std::{
    collections::VecDeque,
    io::BufRead,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

/// A [`RangingSource`] that simply acts as a thread-safe buffer of decoded
/// scan reports. Clones share the same buffer, so one clone can be handed
/// to a reader thread while the other is iterated.
#[derive(Debug, Clone)]
pub struct ScanRanging {
    tx_power: i32,
    msgs: Arc<Mutex<VecDeque<DistanceSample>>>,
}

impl ScanRanging {
    /// An empty buffer that converts RSSI with `tx_power`.
    pub fn new(tx_power: i32) -> Self {
        ScanRanging {
            tx_power,
            msgs: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queue a new report behind everything already buffered.
    pub fn add_report(&self, report: ScanReport) {
        let sample = report.to_sample(self.tx_power);
        self.msgs.lock().unwrap().push_back(sample);
    }
}

impl Iterator for ScanRanging {
    type Item = DistanceSample;

    fn next(&mut self) -> Option<Self::Item> {
        self.msgs.lock().unwrap().pop_front()
    }
}

impl RangingSource for ScanRanging {
    fn clear(&mut self) {
        self.msgs.lock().unwrap().clear();
    }
}

/// Read scan report lines from `reader` on a new thread, pushing each
/// decoded report into `ranging`. Lines that do not parse are logged and
/// skipped. With `pace` set, reports are released on the scanner's own
/// clock instead of as fast as they can be read.
pub fn feed_from_reader<R>(ranging: ScanRanging, reader: R, pace: bool) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        let mut first_stamp = None;
        let started = std::time::Instant::now();

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read scan report: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<ScanReport>() {
                Ok(report) => {
                    if pace {
                        let origin = *first_stamp.get_or_insert(report.timestamp_ms);
                        let due = Duration::from_millis(report.timestamp_ms.saturating_sub(origin));
                        if let Some(wait) = due.checked_sub(started.elapsed()) {
                            spin_sleep::sleep(wait);
                        }
                    }
                    debug!("Received {:?}, adding to ranging buffer", report);
                    ranging.add_report(report);
                }
                Err(e) => {
                    warn!("Was unable to parse scan report {:?}: {:?}", line, e.code);
                }
            }
        }
        debug!("scan report reader finished");
    })
}
