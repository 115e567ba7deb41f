//! Invocation controller for hotstep.
//!
//! One call of [`run_invocation`] is one simulator process: it reads a power
//! trace, advances the thermal model one sampling interval per line, writes
//! the temperature trace and carries the transient state to the next
//! invocation of a sequence through the checkpoint file.

pub mod context;
pub mod error;
pub mod invocation;

pub use context::{Invocation, InvocationContext, parse_volt_vector};
pub use error::{AppError, AppResult};
pub use invocation::{RunSummary, build_model, run_invocation, solve_steady};
