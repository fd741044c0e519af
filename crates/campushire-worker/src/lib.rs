//! Import pipeline: submission gate, job queue, worker, and row processor.
//!
//! The flow is: `ImportQueue::submit` (the gate) validates the payload,
//! creates the queued job record atomically, and hands the payload to an
//! in-process worker pool; `run_import` then drives the rows through the
//! row processor and writes progress back to the job store.

pub mod processor;
pub mod queue;
pub mod runner;

pub use processor::{process_row, RowOutcome};
pub use queue::{ImportQueue, ImportQueueConfig};
pub use runner::{run_import, ImportRunnerConfig};

#[cfg(test)]
mod test_support;
