//! Decision fusion: one display label out of two model verdicts.
//!
//! The override only escalates the *label*. The numeric level always stays
//! the classifier's raw decision so downstream consumers can distinguish a
//! genuine Hazardous classification from an anomaly-escalated Poor one.

use crate::state::{AnomalyVerdict, AqLevel, ClassificationVerdict, FusedResult};

pub const ANOMALY_OVERRIDE_LABEL: &str = "Hazardous (Anomaly)";

/// Minimum classified level at which an anomaly escalates the label.
pub const ANOMALY_OVERRIDE_MIN_LEVEL: AqLevel = AqLevel::Poor;

pub fn fuse(classification: &ClassificationVerdict, anomaly: &AnomalyVerdict) -> FusedResult {
    let label = if anomaly.is_anomaly && classification.level >= ANOMALY_OVERRIDE_MIN_LEVEL {
        ANOMALY_OVERRIDE_LABEL.to_string()
    } else {
        classification.level.label().to_string()
    };

    FusedResult {
        label,
        level: classification.level,
        confidence: classification.confidence,
        is_anomaly: anomaly.is_anomaly,
        anomaly_score: anomaly.score,
    }
}
