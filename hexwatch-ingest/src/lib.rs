//! Scrape-extract-upsert pipeline: the SQLite store, the per-cycle pipeline, and the
//! fixed-interval scheduler that drives it.
pub mod pipeline;
pub mod scheduler;
pub mod store;

pub use pipeline::{CycleReport, Pipeline, PipelineError};
pub use scheduler::{OverlapPolicy, Scheduler};
pub use store::{PersistenceError, Store};
