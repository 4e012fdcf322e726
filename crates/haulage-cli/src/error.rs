use haulage_core::{LoggingError, PipelineError, ValidationError};
use haulage_warehouse::WarehouseError;
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Pipeline(error) => match error {
                PipelineError::Config(_) | PipelineError::Validation(_) => 2,
                PipelineError::Auth(_) => 3,
                PipelineError::Api { .. }
                | PipelineError::RateLimited { .. }
                | PipelineError::Transport(_) => 4,
                PipelineError::MalformedResponse(_) | PipelineError::Serialization(_) => 5,
                PipelineError::Warehouse(_) => 6,
            },
            Self::Validation(_) | Self::Logging(_) | Self::Command(_) => 2,
            Self::Serialization(_) => 5,
            Self::Warehouse(_) => 6,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_distinct_codes() {
        let cases = [
            (PipelineError::Config(String::from("missing")), 2),
            (PipelineError::Auth(String::from("denied")), 3),
            (
                PipelineError::Api {
                    status: 500,
                    body: String::new(),
                },
                4,
            ),
            (
                PipelineError::RateLimited {
                    attempts: 6,
                    retry_after_secs: 60,
                },
                4,
            ),
            (PipelineError::MalformedResponse(String::from("edges")), 5),
            (PipelineError::Warehouse(WarehouseError::PoolPoisoned), 6),
        ];

        for (error, code) in cases {
            assert_eq!(CliError::from(error).exit_code(), code);
        }
    }

    #[test]
    fn io_errors_use_exit_code_ten() {
        let error = CliError::from(std::io::Error::other("broken pipe"));
        assert_eq!(error.exit_code(), 10);
    }
}
