//! Storage of the transient state carried between steps.
//!
//! The solver never owns the buffers it integrates. A state is either a
//! pair of heap vectors ([`OwnedState`]) or views into a mapped checkpoint,
//! and both are handed to [`GridModel::compute_temp`](crate::GridModel::compute_temp)
//! through this trait.

/// Transient cell field plus extra nodes (`last_trans`) and the block
/// temperature vector (`last_temp`).
pub trait TransientState {
    /// Cells in `[layer][row][col]` order followed by the extra nodes.
    fn last_trans(&self) -> &[f64];

    /// Block temperatures in solver order followed by the extra nodes.
    fn last_temp(&self) -> &[f64];

    /// Both vectors, mutably.
    fn split_mut(&mut self) -> (&mut [f64], &mut [f64]);

    fn last_temp_mut(&mut self) -> &mut [f64] {
        self.split_mut().1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnedState {
    pub last_trans: Vec<f64>,
    pub last_temp: Vec<f64>,
}

impl OwnedState {
    pub fn new(trans_len: usize, temp_len: usize) -> Self {
        Self {
            last_trans: vec![0.0; trans_len],
            last_temp: vec![0.0; temp_len],
        }
    }
}

impl TransientState for OwnedState {
    fn last_trans(&self) -> &[f64] {
        &self.last_trans
    }

    fn last_temp(&self) -> &[f64] {
        &self.last_temp
    }

    fn split_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        (&mut self.last_trans, &mut self.last_temp)
    }
}
