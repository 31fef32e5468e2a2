//! A wrapper for the hound library that writes the rendered binaural
//! audio to a WAV file.

use crate::component::{Component, ComponentError};
use hound::{Error as HoundError, SampleFormat, WavSpec, WavWriter};

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

/// One rendered block, left channel then right channel.
pub type StereoBlock = (Vec<f32>, Vec<f32>);

/// Writes stereo blocks as interleaved 32-bit float WAV.
pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    frames: u64,
}

impl WavSink {
    /// Create (or truncate) `path` for stereo audio at `sample_rate`.
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, HoundError> {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, spec)?;

        Ok(Self {
            writer: Some(writer),
            frames: 0,
        })
    }
}

impl Component for WavSink {
    type InData = StereoBlock;
    type OutData = Result<u64, HoundError>;

    /// Appends one block to the file and returns the total frames written.
    fn convert(&mut self, input: StereoBlock) -> Result<u64, HoundError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            HoundError::IoError(io::Error::new(io::ErrorKind::Other, "sink already finalized"))
        })?;
        let (left_samps, right_samps) = input;

        // interleave the two streams and write the samples to the WAV file
        for (left, right) in std::iter::zip(left_samps, right_samps) {
            writer.write_sample(left)?;
            writer.write_sample(right)?;
            self.frames += 1;
        }

        // flush after each write to save state of the WAV file in the header
        writer.flush()?;
        Ok(self.frames)
    }

    /// Clean up the WavWriter after the last block. This happens
    /// automatically when the WavWriter is dropped, but calling this gives
    /// us controlled error checking.
    fn finalize(&mut self) -> Result<(), ComponentError> {
        match self.writer.take() {
            Some(writer) => Ok(writer.finalize()?),
            None => Ok(()),
        }
    }
}

impl fmt::Display for WavSink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "WavSink")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::run_component;
    use hound::WavReader;

    use std::f32::consts::PI;
    use std::sync::mpsc::channel;

    const SAMP_RATE: u32 = 44100;

    fn create_sine_wave(frames: usize, freq: f32) -> Vec<f32> {
        (0..frames)
            .map(|x| (x as f32 / SAMP_RATE as f32 * freq * 2.0 * PI).sin() * 0.5)
            .collect()
    }

    fn read_back(path: &Path) -> StereoBlock {
        let mut reader = WavReader::open(path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, SAMP_RATE);

        let all_samps = reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, hound::Error>>()
            .unwrap();

        let left = all_samps.iter().step_by(2).copied().collect();
        let right = all_samps.iter().skip(1).step_by(2).copied().collect();
        (left, right)
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sine.wav");

        let left = create_sine_wave(100, 261.61);
        let right = create_sine_wave(100, 329.63);

        let mut sink = WavSink::create(&path, SAMP_RATE).unwrap();
        assert_eq!(sink.convert((left.clone(), right.clone())).unwrap(), 100);
        sink.finalize().unwrap();

        assert_eq!(read_back(&path), (left, right));
    }

    /// Write several blocks through a WavSink running as a Component
    /// thread, then read the file back.
    #[test]
    fn test_sink_as_component() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.wav");

        let sine = create_sine_wave(256, 440.0);
        let sink = WavSink::create(&path, SAMP_RATE).unwrap();

        let (block_tx, block_rx) = channel::<StereoBlock>();
        let (result_tx, result_rx) = channel::<Result<u64, HoundError>>();
        let handle = run_component(Box::new(sink), block_rx, result_tx);

        for chunk in sine.chunks(64) {
            assert!(block_tx.send((chunk.to_vec(), vec![0.0; chunk.len()])).is_ok());
        }
        drop(block_tx);
        handle.join().unwrap();

        let totals: Vec<u64> = result_rx.iter().map(|r| r.unwrap()).collect();
        assert_eq!(totals, vec![64, 128, 192, 256]);

        let (left, right) = read_back(&path);
        assert_eq!(left, sine);
        assert!(right.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.wav");
        assert!(WavSink::create(path, SAMP_RATE).is_err());
    }
}
