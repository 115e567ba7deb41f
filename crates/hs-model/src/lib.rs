//! Grid RC thermal model used by the trace-driven simulator.
//!
//! Provides:
//! - floorplan reading and name -> block index lookup
//! - a layered grid RC network with package periphery nodes
//! - fixed-substep RK4 transient integration and LU steady state
//! - natural convection package model and temperature-dependent leakage
//! - temperature file dump/read helpers

pub mod error;
pub mod floorplan;
pub mod grid;
pub mod integrator;
pub mod leakage;
pub mod model;
pub mod package;
pub mod state;
pub mod temp_io;

pub use error::{ModelError, ModelResult};
pub use floorplan::{Floorplan, Unit, load_floorplans};
pub use grid::{GridDims, GridModel, Layer, SteadyState};
pub use integrator::{Integrator, RK4};
pub use model::TransientModel;
pub use package::{
    EXTRA, EXTRA_SEC, MAX_SINK_TEMP, NATURAL_CONVEC_TOL, R_CONVEC_HIGH, R_CONVEC_LOW,
    SMALL_FOR_CONVEC,
};
pub use state::{OwnedState, TransientState};
pub use temp_io::{dump_grid, dump_temp, read_temp};
