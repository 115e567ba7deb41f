//! hs-checkpoint: transient state carried between simulator invocations.
//!
//! A checkpoint is a header of six native-endian `i32`s (magic, last
//! invocation index, layers, rows, cols, extra nodes) followed by `f64`
//! payload: the cell field, the extra nodes, then the temperature vector.

pub mod codec;
pub mod store;

pub use codec::{HEADER_BYTES, Header, HeaderError, Layout, MAGIC};
pub use store::{MappedCheckpoint, create, inspect, load, remove_stale};

use std::path::PathBuf;

pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[derive(thiserror::Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Checkpoint {path} is held by another invocation")]
    Busy { path: PathBuf },

    #[error("Invalid checkpoint {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: HeaderError,
    },

    #[error("Core error: {0}")]
    Core(#[from] hs_core::HsError),
}

impl CheckpointError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CheckpointError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(path: impl Into<PathBuf>, source: HeaderError) -> Self {
        CheckpointError::Invalid {
            path: path.into(),
            source,
        }
    }
}
