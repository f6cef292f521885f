//! Pooled background syntax highlighting.
//!
//! A fixed-size set of dedicated worker threads each hosts one instance of
//! an external highlighting engine. The [`HighlightService`] schedules
//! requests across them, queueing callers FIFO when every worker is busy,
//! and converts the engine's markup into per-line ranges via
//! `spectro-markup`. Failures degrade to empty results instead of errors.

mod engine;
mod proto;
mod report;
mod service;
mod spawn;
mod worker;

pub use engine::{EngineError, EngineLoader, HighlightEngine};
pub use proto::{WorkerRequest, WorkerResponse};
pub use report::{LogSink, ReportSink};
pub use service::{HighlightService, HighlightServiceCfg, PoolStatus};
pub use worker::WorkerId;
