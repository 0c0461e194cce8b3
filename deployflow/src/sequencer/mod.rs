//! The pipeline sequencer.
//!
//! [`state`] holds the pure transition function — the one component of
//! this system with real semantics — and [`runner`] drives a single run
//! through the five stages against the configured ports.

mod runner;
mod state;


pub use runner::PipelineRunner;
pub use state::{advance, Sequencer, SequencerEvent};
