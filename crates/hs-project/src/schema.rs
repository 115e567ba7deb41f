//! Config schema definitions.
//!
//! Physical quantities are `uom` SI types; in YAML they are written as bare
//! numbers in SI base units (meters, seconds, kelvin).

use hs_core::{Length, Temperature, Time, k, m, s};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default checkpoint file name, relative to the working directory.
pub const DEFAULT_CHECKPOINT_FILE: &str = "last_trans_temp_mmap.bin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    pub version: u32,
    pub model: ModelDef,
    #[serde(default)]
    pub thermal: ThermalDef,
    #[serde(default)]
    pub package: PackageDef,
    #[serde(default)]
    pub leakage: LeakageDef,
    #[serde(default)]
    pub checkpoint: CheckpointDef,
}

/// Grid model geometry. Layers are listed bottom to top; the last two
/// layers are the heat spreader and the heat sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDef {
    pub rows: usize,
    pub cols: usize,
    pub layers: Vec<LayerDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerDef {
    pub name: String,
    pub floorplan: PathBuf,
    #[serde(default)]
    pub has_power: bool,
    pub thickness: Length,
    /// Thermal conductivity, W/(m-K).
    pub conductivity: f64,
    /// Volumetric heat capacity, J/(m^3-K).
    pub vol_heat_capacity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThermalDef {
    pub ambient: Temperature,
    pub init_temp: Temperature,
    pub init_file: Option<PathBuf>,
    pub sampling_intvl: Time,
    /// Clip initial temperatures read from `init_file` at `thermal_threshold`.
    pub dtm_used: bool,
    pub thermal_threshold: Temperature,
    pub steady_file: Option<PathBuf>,
    pub grid_steady_file: Option<PathBuf>,
    pub grid_transient_file: Option<PathBuf>,
}

impl Default for ThermalDef {
    fn default() -> Self {
        Self {
            ambient: k(318.15),
            init_temp: k(333.15),
            init_file: None,
            sampling_intvl: s(3.333e-6),
            dtm_used: false,
            thermal_threshold: k(354.95),
            steady_file: None,
            grid_steady_file: None,
            grid_transient_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PackageDef {
    pub spreader_side: Length,
    pub sink_side: Length,
    /// Convection resistance of the heat sink, K/W.
    pub r_convec: f64,
    /// Recompute `r_convec` from the sink temperature every step.
    pub natural_convection: bool,
    pub model_secondary: bool,
    pub secondary: SecondaryDef,
}

impl Default for PackageDef {
    fn default() -> Self {
        Self {
            spreader_side: m(0.03),
            sink_side: m(0.06),
            r_convec: 0.1,
            natural_convection: false,
            model_secondary: false,
            secondary: SecondaryDef::default(),
        }
    }
}

/// Lumped per-side parameters of the secondary heat path
/// (substrate, solder balls, PCB).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecondaryDef {
    pub r_sub: f64,
    pub r_solder: f64,
    pub r_pcb: f64,
    pub r_convec_sec: f64,
    pub c_sub: f64,
    pub c_solder: f64,
    pub c_pcb: f64,
}

impl Default for SecondaryDef {
    fn default() -> Self {
        Self {
            r_sub: 4.0,
            r_solder: 8.0,
            r_pcb: 2.0,
            r_convec_sec: 50.0,
            c_sub: 0.01,
            c_solder: 0.005,
            c_pcb: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeakageMode {
    Linear,
    Quadratic,
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LeakageDef {
    pub enabled: bool,
    pub mode: LeakageMode,
    /// Leakage power density scale, W/m^2.
    pub alpha: f64,
    /// Exponential temperature coefficient, 1/K.
    pub beta: f64,
    pub tbase: Temperature,
}

impl Default for LeakageDef {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: LeakageMode::Exponential,
            alpha: 1.5e4,
            beta: 0.036,
            tbase: k(383.15),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckpointDef {
    pub path: PathBuf,
}

impl Default for CheckpointDef {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CHECKPOINT_FILE),
        }
    }
}

impl SimConfig {
    /// Make floorplan and output paths relative to `base` absolute.
    /// The checkpoint path stays relative to the working directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for layer in &mut self.model.layers {
            join(&mut layer.floorplan);
        }
        let thermal = &mut self.thermal;
        for p in [
            &mut thermal.init_file,
            &mut thermal.steady_file,
            &mut thermal.grid_steady_file,
            &mut thermal.grid_transient_file,
        ]
        .into_iter()
        .flatten()
        {
            join(p);
        }
    }

    /// Number of package layers at the top of the stack (spreader, sink).
    pub const PACKAGE_LAYERS: usize = 2;
}
