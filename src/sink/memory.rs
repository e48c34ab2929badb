use crate::sink::{ResultSink, SinkError};
use crate::state::InferenceRecord;
use std::sync::Mutex;

/// In-memory sink for tests: collects every record, or fails every write
/// when constructed with `failing()`.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<InferenceRecord>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<InferenceRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ResultSink for MemorySink {
    fn record(&self, record: &InferenceRecord) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Transport(
                "memory sink configured to fail".to_string(),
            ));
        }
        match self.records.lock() {
            Ok(mut guard) => {
                guard.push(record.clone());
                Ok(())
            }
            Err(_) => Err(SinkError::Transport("records lock poisoned".to_string())),
        }
    }
}
