//! TransientModel trait for the RC network's dynamics.

use crate::error::ModelResult;

/// A dynamic system `x_dot = f(t, x)` that an [`Integrator`](crate::Integrator)
/// can advance.
///
/// Implementors provide the state arithmetic the integrators need
/// (element-wise add and scalar scaling) so the integrators stay generic
/// over the state representation.
pub trait TransientModel {
    type State: Clone;

    fn initial_state(&self) -> Self::State;

    /// Compute the state derivative at `(t, x)`.
    fn rhs(&mut self, t: f64, x: &Self::State) -> ModelResult<Self::State>;

    /// Element-wise `a + b`.
    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// `scale * a`.
    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;
}
