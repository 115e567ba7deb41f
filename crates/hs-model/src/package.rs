//! Package constants and the natural convection heat sink model.

use hs_project::PackageDef;
use tracing::warn;

/// Package periphery nodes: spreader (W, E, N, S), inner sink ring
/// (W, E, N, S) and outer sink ring (W, E, N, S).
pub const EXTRA: usize = 12;

/// Secondary heat path nodes: substrate, solder, inner PCB and outer PCB,
/// one per side each.
pub const EXTRA_SEC: usize = 16;

/// Sane range of the heat sink convection resistance, K/W.
pub const R_CONVEC_LOW: f64 = 1e-3;
pub const R_CONVEC_HIGH: f64 = 3.0;

/// Minimum sink to ambient temperature difference used by the convection
/// correlation, K.
pub const SMALL_FOR_CONVEC: f64 = 0.01;

/// Convergence bound on `r_convec` for the steady-state natural convection
/// iteration, K/W.
pub const NATURAL_CONVEC_TOL: f64 = 0.01;

/// A sink hotter than this during the natural convection iteration means
/// thermal runaway, K.
pub const MAX_SINK_TEMP: f64 = 1000.0;

/// Laminar natural convection coefficient for a vertical plate.
const NATURAL_H_COEFF: f64 = 1.32;

pub(crate) mod node {
    pub const SP: usize = 0;
    pub const SINK_C: usize = 4;
    pub const SINK: usize = 8;
    pub const SUB: usize = 12;
    pub const SOLDER: usize = 16;
    pub const PCB_C: usize = 20;
    pub const PCB: usize = 24;

    pub const W: usize = 0;
    pub const E: usize = 1;
    pub const N: usize = 2;
    pub const S: usize = 3;

    pub const SIDES: [&str; 4] = ["west", "east", "north", "south"];
    pub const GROUPS: [&str; 7] = [
        "spreader",
        "sink_inner",
        "sink",
        "sub",
        "solder",
        "pcb_inner",
        "pcb",
    ];
}

/// Convection resistance of the sink under natural convection at
/// `sink_temp`, K/W.
pub fn natural_r_convec(package: &PackageDef, ambient: f64, sink_temp: f64) -> f64 {
    let side = hs_core::meters_of(package.sink_side);
    let delta = (sink_temp - ambient).max(SMALL_FOR_CONVEC);
    let h = NATURAL_H_COEFF * (delta / side).powf(0.25);
    1.0 / (h * side * side)
}

/// Refresh `package.r_convec` for the current sink temperature.
///
/// Returns whether natural convection is modeled; with forced convection
/// the configured resistance is kept as is.
pub fn package_model(package: &mut PackageDef, ambient: f64, sink_temp: f64) -> bool {
    if !package.natural_convection {
        return false;
    }
    package.r_convec = natural_r_convec(package, ambient, sink_temp);
    true
}

/// Warn when the convection resistance is usable but physically unlikely.
pub fn check_r_convec(r_convec: f64) {
    if !(R_CONVEC_LOW..=R_CONVEC_HIGH).contains(&r_convec) {
        warn!(
            r_convec,
            "Heatsink convection resistance is not realistic, double-check your package settings"
        );
    }
}
