//! Defines the Component trait, used by each stage that runs beside the
//! render loop. This enforces a common interface between stages, so that
//! each one can consume data from the preceding stage on its own thread,
//! process it, and pass new data on to the next.

use log::{info, warn};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::{error::Error, fmt};

/// Returned when a stage fails to shut down cleanly.
#[derive(Debug)]
pub enum ComponentError {
    /// The WAV writer could not finish the file.
    Hound(hound::Error),
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ComponentError::Hound(error) => write!(f, "wav error: {}", error),
        }
    }
}

impl Error for ComponentError {}

impl From<hound::Error> for ComponentError {
    fn from(value: hound::Error) -> Self {
        Self::Hound(value)
    }
}

///
/// A stage of the output pipeline. Anything that consumes rendered audio
/// off the render thread implements Component, so that it can be run with
/// [`run_component`]. Its [`fmt::Display`] is its name in the logs.
///
pub trait Component: fmt::Display {
    #[allow(missing_docs)]
    type InData;
    #[allow(missing_docs)]
    type OutData;

    /// Converts an input of type InData into an output of type OutData
    fn convert(&mut self, input: Self::InData) -> Self::OutData;

    /// Cleans up at termination of pipeline
    fn finalize(&mut self) -> Result<(), ComponentError>;
}

/// Runs the given Component on its own thread. On receiving data of type
/// InData on the input channel, the Component converts them to data of type
/// OutData and sends it to the output channel. When the input channel
/// closes the Component is finalized and the thread ends.
pub fn run_component<C: Component + Send + 'static>(
    mut component: Box<C>,
    input: Receiver<<C as Component>::InData>,
    output: Sender<<C as Component>::OutData>,
) -> JoinHandle<()>
where
    <C as Component>::InData: Send + 'static,
    <C as Component>::OutData: Send + 'static,
{
    thread::spawn(move || {
        while let Ok(data) = input.recv() {
            let out_data = component.convert(data);
            if let Err(error) = output.send(out_data) {
                warn!("{} : received error {}.", component, error);
            }
        }

        if let Err(component_error) = component.finalize() {
            warn!("{} : error during terminating : {}.", component, component_error);
        }
        info!("{} : terminated.", component);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    /// Gain stage standing in for a real sink
    struct MockGain {
        gain: f32,
        finalized: Sender<()>,
    }

    impl Component for MockGain {
        type InData = Vec<f32>;
        type OutData = Vec<f32>;

        fn convert(&mut self, input: Vec<f32>) -> Vec<f32> {
            input.into_iter().map(|s| s * self.gain).collect()
        }

        fn finalize(&mut self) -> Result<(), ComponentError> {
            self.finalized.send(()).ok();
            Ok(())
        }
    }

    impl fmt::Display for MockGain {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "MockGain")
        }
    }

    /// Checks that writing a block to the Component's input produces that
    /// block, converted, on the Component's output
    #[test]
    fn test_mock_component() {
        let (done_tx, _done_rx) = channel();
        let mock = MockGain {
            gain: 2.0,
            finalized: done_tx,
        };
        let (test_tx, block_rx) = channel::<Vec<f32>>();
        let (block_tx, test_rx) = channel::<Vec<f32>>();

        run_component(Box::new(mock), block_rx, block_tx);

        assert!(test_tx.send(vec![0.5, -1.0]).is_ok());
        assert_eq!(test_rx.recv(), Ok(vec![1.0, -2.0]));
    }

    #[test]
    fn test_chained_component() {
        let (done_tx, done_rx) = channel();
        let mock_a = MockGain {
            gain: 2.0,
            finalized: done_tx.clone(),
        };
        let mock_b = MockGain {
            gain: 0.25,
            finalized: done_tx,
        };

        let (test_tx, block_a_rx) = channel::<Vec<f32>>();
        let (block_a_tx, block_b_rx) = channel::<Vec<f32>>();
        let (block_b_tx, test_rx) = channel::<Vec<f32>>();

        let a = run_component(Box::new(mock_a), block_a_rx, block_a_tx);
        let b = run_component(Box::new(mock_b), block_b_rx, block_b_tx);

        assert!(test_tx.send(vec![4.0]).is_ok());
        assert_eq!(test_rx.recv(), Ok(vec![2.0]));

        // Closing the input winds the whole chain down.
        drop(test_tx);
        a.join().unwrap();
        b.join().unwrap();
        assert_eq!(done_rx.iter().count(), 2);
    }
}
