use haulage_warehouse::WarehouseError;
use thiserror::Error;

use crate::http_client::HttpError;

/// Validation and contract errors exposed by `haulage-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("watermark must be an ISO-8601 date-time: '{value}'")]
    InvalidWatermark { value: String },

    #[error("setting '{name}' must be an integer of at least {min}: '{value}'")]
    InvalidNumber {
        name: &'static str,
        value: String,
        min: u32,
    },

    #[error("service account key is not valid JSON: {reason}")]
    ServiceAccountJson { reason: String },
    #[error("service account key is missing field '{field}'")]
    ServiceAccountField { field: &'static str },

    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
    #[error("unknown schedule '{name}'")]
    UnknownSchedule { name: String },
}

/// Top-level error type for pipeline runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("api returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("rate limited after {attempts} attempts (last retry-after {retry_after_secs}s)")]
    RateLimited { attempts: u32, retry_after_secs: u64 },

    #[error("transport error: {0}")]
    Transport(#[from] HttpError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Short stable code for reports and exit-code mapping.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Config(_) => "config",
            Self::Api { .. } => "api",
            Self::MalformedResponse(_) => "malformed_response",
            Self::RateLimited { .. } => "rate_limited",
            Self::Transport(_) => "transport",
            Self::Validation(_) => "validation",
            Self::Warehouse(_) => "warehouse",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Keep at most `limit` characters of an upstream body.
pub(crate) fn truncate_body(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}
