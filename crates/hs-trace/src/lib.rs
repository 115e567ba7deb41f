//! hs-trace: power and temperature trace files.
//!
//! A trace starts with a line of block names followed by one line of values
//! per timestep, columns in trace order. [`TraceMap`] translates between
//! trace order and the solver's block order.

pub mod map;
pub mod reader;
pub mod writer;

pub use map::TraceMap;
pub use reader::TraceReader;
pub use writer::TraceWriter;

/// Most columns a trace line may carry.
pub const MAX_UNITS: usize = 8192;

/// Longest accepted trace line, newline included.
pub const LINE_SIZE: usize = 65536;

pub type TraceResult<T> = Result<T, TraceError>;

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line} too long (limit {limit} bytes)")]
    LineTooLong { line: usize, limit: usize },

    #[error("too many functional units in trace file (max {max})")]
    TooManyUnits { max: usize },

    #[error("not enough names in trace file")]
    NotEnoughNames,

    #[error("line {line}: expected {expected} values, got {got}")]
    ColumnCount {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("line {line}: invalid power value {token:?}")]
    InvalidValue { line: usize, token: String },

    #[error("no. of units in floorplan ({floorplan}) and trace file ({trace}) differ")]
    UnitCountMismatch { floorplan: usize, trace: usize },

    #[error("unit {name} not found in floorplan of layer {layer}")]
    UnknownName { name: String, layer: usize },

    #[error("unit {name} listed twice for layer {layer}")]
    DuplicateName { name: String, layer: usize },

    #[error("Core error: {0}")]
    Core(#[from] hs_core::HsError),
}
