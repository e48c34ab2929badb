//! Result sink boundary: where finished inference records leave the core.
//!
//! The sink owns timestamping and storage; the core hands over the raw
//! sample, all nine features and every fused-result field, and never waits
//! on a retry. A failing sink degrades persistence, not inference.

use crate::state::InferenceRecord;
use thiserror::Error;

pub mod influx;
pub mod memory;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink transport error: {0}")]
    Transport(String),
    #[error("sink rejected write: http status {0}")]
    Rejected(u16),
}

pub trait ResultSink: Send + Sync + std::fmt::Debug {
    fn record(&self, record: &InferenceRecord) -> Result<(), SinkError>;
}

/// Sink used when no persistence is configured.
#[derive(Debug, Default)]
pub struct NoopSink;

impl ResultSink for NoopSink {
    fn record(&self, _record: &InferenceRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
