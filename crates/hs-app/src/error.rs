//! Error types for the invocation controller.

use std::path::PathBuf;

/// Every failure of an invocation. All of them are fatal for the process.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] hs_project::ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] hs_model::ModelError),

    #[error("Trace error: {0}")]
    Trace(#[from] hs_trace::TraceError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] hs_checkpoint::CheckpointError),

    #[error("Invalid trace_num {trace_num}: expected -1 (standalone) or an invocation index >= 0")]
    InvalidInvocation { trace_num: i64 },

    #[error("Inconsistent settings: {reason}")]
    Contradiction { reason: String },

    #[error("Invalid volt vector {text:?}: {reason}")]
    VoltVector { text: String, reason: String },

    #[error("no power numbers in trace file")]
    EmptyTrace,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn contradiction(reason: impl Into<String>) -> Self {
        AppError::Contradiction {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_keep_their_source() {
        let err: AppError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, AppError::Json(_)));
        assert!(err.to_string().starts_with("JSON error: "));
    }
}
