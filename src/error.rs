use crate::inference::InferenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("state lock poisoned")]
    StateLock,
    #[error(transparent)]
    Inference(#[from] InferenceError),
}
