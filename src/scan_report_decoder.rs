//! Decoder for the text reports a beacon scanner prints, one per line:
//!
//! ```text
//! +RANGE:<major>,<minor>,<rssi>,"<proximity>",<timestamp_ms>
//! ```

use crate::ranging::{BeaconId, DistanceSample};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, i32, space0, u16, u64},
    combinator::{map, value},
    error::Error,
    sequence::{delimited, preceded, terminated, tuple},
    Finish, IResult,
};

use std::str::FromStr;

/// Why a line is not a scan report: the unparsed input and the failing
/// parser.
pub type ScanReportError = Error<String>;

/// The scanner's own coarse proximity class. Informational only, the
/// distance is always estimated from the RSSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    #[allow(missing_docs)]
    Immediate,
    #[allow(missing_docs)]
    Near,
    #[allow(missing_docs)]
    Far,
    #[allow(missing_docs)]
    Unknown,
}

/// One decoded scan report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Beacon the report is about.
    pub beacon: BeaconId,
    /// Signal strength in dBm, zero when the beacon was not heard.
    pub rssi: i32,
    /// Scanner's proximity class.
    pub proximity: Proximity,
    /// Scanner clock, in milliseconds.
    pub timestamp_ms: u64,
}

impl ScanReport {
    /// Turn the report into a [`DistanceSample`] using the calibrated
    /// `tx_power`.
    pub fn to_sample(&self, tx_power: i32) -> DistanceSample {
        DistanceSample::from_rssi(
            self.beacon,
            self.rssi,
            tx_power,
            self.timestamp_ms as f64 / 1000.0,
        )
    }
}

fn parse_proximity(s: &str) -> IResult<&str, Proximity> {
    delimited(
        char('"'),
        alt((
            value(Proximity::Immediate, tag("immediate")),
            value(Proximity::Near, tag("near")),
            value(Proximity::Far, tag("far")),
            value(Proximity::Unknown, tag("unknown")),
        )),
        char('"'),
    )(s)
}

fn parse_scan_report(s: &str) -> IResult<&str, ScanReport> {
    map(
        terminated(
            tuple((
                preceded(tag("+RANGE:"), u16),
                preceded(tag(","), u16),
                preceded(tag(","), i32),
                preceded(tag(","), parse_proximity),
                preceded(tag(","), u64),
            )),
            space0,
        ),
        |(major, minor, rssi, proximity, timestamp_ms)| ScanReport {
            beacon: BeaconId::new(major, minor),
            rssi,
            proximity,
            timestamp_ms,
        },
    )(s)
}

impl FromStr for ScanReport {
    type Err = ScanReportError;

    /// Parse one line. Trailing line endings are ignored, anything else
    /// after the report is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches(&['\r', '\n'][..]);
        match parse_scan_report(s).finish() {
            Ok(("", report)) => Ok(report),
            Ok((remaining, _)) => Err(Error {
                input: remaining.to_string(),
                code: nom::error::ErrorKind::Eof,
            }),
            Err(Error { input, code }) => Err(Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}
