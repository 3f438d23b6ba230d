// author: kodeholic (powered by Gemini)

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Invalid message payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid report id: {0:?}")]
    InvalidReportId(String),
    #[error("Media engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Report I/O error: {0}")]
    Report(#[from] std::io::Error),
}

pub type SignalResult<T> = Result<T, SignalError>;
