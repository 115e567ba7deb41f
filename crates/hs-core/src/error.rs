use thiserror::Error;

pub type HsResult<T> = Result<T, HsError>;

#[derive(Error, Debug)]
pub enum HsError {
    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Length mismatch: {what} (expected={expected}, got={got})")]
    LenMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Check that a caller-provided slice has the length the model expects.
pub fn ensure_len(what: &'static str, expected: usize, got: usize) -> HsResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(HsError::LenMismatch {
            what,
            expected,
            got,
        })
    }
}
