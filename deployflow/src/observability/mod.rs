//! Tracing integration.

mod tracing;

pub use tracing::{init_tracing, RunSpanAttributes};
