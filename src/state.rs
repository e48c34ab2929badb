use crate::features::{FeatureVector, GasWindow};
use serde::Deserialize;
use tokio::sync::watch;

/// One instantaneous reading from the device: DHT temperature/humidity plus
/// the raw MQ gas ADC value. Any finite float is accepted; range validation
/// is not this service's job.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SensorSample {
    pub temp: f64,
    pub hum: f64,
    pub mq: f64,
}

/// Air-quality level as decided by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AqLevel {
    Good,
    Moderate,
    Poor,
    Hazardous,
}

impl AqLevel {
    /// Maps a raw classifier class to a level. Anything outside {0,1,2,3}
    /// means the model and the feature pipeline disagree about the world.
    pub fn from_class(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Good),
            1 => Some(Self::Moderate),
            2 => Some(Self::Poor),
            3 => Some(Self::Hazardous),
            _ => None,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Self::Good => 0,
            Self::Moderate => 1,
            Self::Poor => 2,
            Self::Hazardous => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::Hazardous => "Hazardous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationVerdict {
    pub level: AqLevel,
    /// Max class probability, rounded to 2 decimal places.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyVerdict {
    /// Raw decision-function value, rounded to 3 decimal places. More
    /// negative means more anomalous; the sign convention is the trained
    /// model's and is passed through unchanged.
    pub score: f64,
    pub is_anomaly: bool,
}

/// Final, user-facing result. Constructed once per request by fusion and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub label: String,
    pub level: AqLevel,
    pub confidence: f64,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
}

/// Everything one inference produced: the raw sample, the derived features
/// and the fused result. This is what the result sink receives and what
/// `GET /api/latest` serves.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRecord {
    pub sample: SensorSample,
    pub features: FeatureVector,
    pub result: FusedResult,
}

/// Shared state of the service: the rolling gas window and the most recent
/// inference record. The window is mutated only under the write lock held
/// by the pipeline, so one process serves one serial sensor stream.
#[derive(Debug)]
pub struct AppState {
    window: GasWindow,
    latest: Option<InferenceRecord>,
    latest_tx: watch::Sender<Option<InferenceRecord>>,
}

impl AppState {
    pub fn new() -> Self {
        let (latest_tx, _latest_rx) = watch::channel(None);
        Self {
            window: GasWindow::new(),
            latest: None,
            latest_tx,
        }
    }

    pub fn window_mut(&mut self) -> &mut GasWindow {
        &mut self.window
    }

    pub fn window_fill(&self) -> usize {
        self.window.len()
    }

    pub fn latest(&self) -> Option<&InferenceRecord> {
        self.latest.as_ref()
    }

    pub fn subscribe_latest(&self) -> watch::Receiver<Option<InferenceRecord>> {
        self.latest_tx.subscribe()
    }

    pub fn set_latest(&mut self, record: InferenceRecord) {
        self.latest = Some(record.clone());
        self.latest_tx.send_replace(Some(record));
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
