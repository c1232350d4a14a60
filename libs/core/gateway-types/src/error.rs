//! Caller-visible error kinds.

use thiserror::Error;

/// One child source's outcome, preserved in attempt order inside
/// [`GatewayError::AllSourcesFailed`].
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source_name: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    #[error("not found")]
    NotFound,

    #[error("no sources configured")]
    NoSourcesConfigured,

    #[error("all {} sources failed",.0.len())]
    AllSourcesFailed(Vec<SourceFailure>),

    #[error("timed out")]
    Timeout,

    #[error("integrity error: {0}")]
    IntegrityError(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("hop limit exceeded")]
    HopLimitExceeded,

    #[error("temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("canceled")]
    Canceled,
}

impl GatewayError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, GatewayError::IntegrityError(_))
    }

    /// Short discriminant name, used when recording per-source failures
    /// in [`GatewayError::AllSourcesFailed`].
    pub fn kind_name(&self) -> &'static str {
        match self {
            GatewayError::NotFound => "NotFound",
            GatewayError::NoSourcesConfigured => "NoSourcesConfigured",
            GatewayError::AllSourcesFailed(_) => "AllSourcesFailed",
            GatewayError::Timeout => "Timeout",
            GatewayError::IntegrityError(_) => "IntegrityError",
            GatewayError::MalformedInput(_) => "MalformedInput",
            GatewayError::HopLimitExceeded => "HopLimitExceeded",
            GatewayError::Unavailable(_) => "Unavailable",
            GatewayError::Canceled => "Canceled",
        }
    }
}
