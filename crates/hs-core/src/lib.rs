//! hs-core: shared foundation for hotstep.
//!
//! Contains:
//! - units (uom SI types + constructors)
//! - numeric (Real + float helpers)
//! - timing (opt-in wall-clock timers)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod timing;
pub mod units;

pub use error::{HsError, HsResult, ensure_len};
pub use numeric::*;
pub use units::*;
