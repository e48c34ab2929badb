use crate::api::ApiContext;
use crate::api::responses::{
    HealthErrorCode, HealthErrorResponse, HealthStatus, HealthSuccessResponse, InferErrorCode,
    InferErrorResponse, InferSuccessResponse, LatestErrorCode, LatestErrorResponse,
    LatestSuccessResponse,
};
use crate::error::AppError;
use crate::inference::run_pipeline;
use crate::state::SensorSample;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const MODEL_FAULT_MESSAGE: &str = "Model bundle is inconsistent with the feature pipeline";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

fn fallback_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

// POST /api/infer

pub enum InferResponse {
    Success(InferSuccessResponse),
    Error {
        status: StatusCode,
        body: InferErrorResponse,
    },
}

impl IntoResponse for InferResponse {
    fn into_response(self) -> Response {
        match self {
            InferResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            InferResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn post_infer(
    State(context): State<ApiContext>,
    Json(sample): Json<SensorSample>,
) -> impl IntoResponse {
    build_infer_response(&context, sample)
}

fn build_infer_response(context: &ApiContext, sample: SensorSample) -> InferResponse {
    match run_pipeline(&context.state, &context.bundle, context.sink.as_ref(), sample) {
        Ok(record) => InferResponse::Success(InferSuccessResponse {
            aq_label: record.result.label,
            aq_level: record.result.level.as_i64(),
            confidence: record.result.confidence,
            is_anomaly: record.result.is_anomaly,
            anomaly_score: record.result.anomaly_score,
        }),
        Err(AppError::Inference(err)) => {
            error!(error = %err, "Model consistency fault during inference");
            InferResponse::Error {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: InferErrorResponse {
                    error_code: InferErrorCode::ModelFault,
                    error_message: MODEL_FAULT_MESSAGE.to_string(),
                    timestamp: format_timestamp(SystemTime::now())
                        .unwrap_or_else(|_| fallback_timestamp()),
                },
            }
        }
        Err(AppError::StateLock) => infer_internal_error("state lock poisoned during inference"),
    }
}

fn infer_internal_error(message: &str) -> InferResponse {
    error!(message = message, "Internal error while handling /api/infer");
    InferResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: InferErrorResponse {
            error_code: InferErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: format_timestamp(SystemTime::now())
                .unwrap_or_else(|_| fallback_timestamp()),
        },
    }
}

// GET /api/latest

pub enum LatestResponse {
    Success(LatestSuccessResponse),
    Error {
        status: StatusCode,
        body: LatestErrorResponse,
    },
}

impl IntoResponse for LatestResponse {
    fn into_response(self) -> Response {
        match self {
            LatestResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            LatestResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_latest(State(context): State<ApiContext>) -> impl IntoResponse {
    build_latest_response(&context, SystemTime::now())
}

fn build_latest_response(context: &ApiContext, now: SystemTime) -> LatestResponse {
    let guard = match context.state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return latest_internal_error("state lock poisoned while reading latest record");
        }
    };
    let latest = guard.latest().cloned();
    let window_fill = guard.window_fill();
    drop(guard);

    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => {
            return latest_internal_error("timestamp formatting failure");
        }
    };

    match latest {
        Some(record) => LatestResponse::Success(LatestSuccessResponse {
            temp: record.sample.temp,
            hum: record.sample.hum,
            mq: record.sample.mq,
            aq_label: record.result.label,
            aq_level: record.result.level.as_i64(),
            confidence: record.result.confidence,
            is_anomaly: record.result.is_anomaly,
            anomaly_score: record.result.anomaly_score,
            window_fill,
            timestamp,
        }),
        None => LatestResponse::Error {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: LatestErrorResponse {
                error_code: LatestErrorCode::NoData,
                error_message: "No inference has been served yet".to_string(),
                timestamp,
            },
        },
    }
}

fn latest_internal_error(message: &str) -> LatestResponse {
    error!(message = message, "Internal error while handling /api/latest");
    LatestResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: LatestErrorResponse {
            error_code: LatestErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: format_timestamp(SystemTime::now())
                .unwrap_or_else(|_| fallback_timestamp()),
        },
    }
}

// GET /api/health

pub enum HealthResponse {
    Success(HealthSuccessResponse),
    Error {
        status: StatusCode,
        body: HealthErrorResponse,
    },
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        match self {
            HealthResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            HealthResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_health(State(context): State<ApiContext>) -> impl IntoResponse {
    build_health_response(&context, SystemTime::now())
}

fn build_health_response(context: &ApiContext, now: SystemTime) -> HealthResponse {
    let window_fill = match context.state.read() {
        Ok(guard) => guard.window_fill(),
        Err(_) => {
            return health_internal_error("state lock poisoned while reading window");
        }
    };

    match format_timestamp(now) {
        // A complete model bundle is a precondition of serving, so a
        // responding process is healthy.
        Ok(timestamp) => HealthResponse::Success(HealthSuccessResponse {
            status: HealthStatus::Ok,
            window_fill,
            timestamp,
        }),
        Err(_) => health_internal_error("timestamp formatting failure"),
    }
}

fn health_internal_error(message: &str) -> HealthResponse {
    error!(message = message, "Internal error while handling /api/health");
    HealthResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: HealthErrorResponse {
            error_code: HealthErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: format_timestamp(SystemTime::now())
                .unwrap_or_else(|_| fallback_timestamp()),
        },
    }
}
