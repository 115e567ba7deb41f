//! Config validation logic.

use crate::schema::SimConfig;
use hs_core::{kelvin_of, meters_of, seconds_of};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Grid model needs at least {min} layers (chip layers, then spreader and sink), got {got}")]
    TooFewLayers { min: usize, got: usize },

    #[error("No power dissipating layer in the grid model")]
    NoPowerLayer,

    #[error("Package layer {name} cannot dissipate power")]
    PowerInPackage { name: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn require_positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be positive".to_string(),
        })
    }
}

pub fn validate_config(config: &SimConfig) -> Result<(), ValidationError> {
    if config.version > crate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: config.version,
        });
    }

    let model = &config.model;
    require_positive("model.rows", model.rows as f64)?;
    require_positive("model.cols", model.cols as f64)?;

    let min = SimConfig::PACKAGE_LAYERS + 1;
    if model.layers.len() < min {
        return Err(ValidationError::TooFewLayers {
            min,
            got: model.layers.len(),
        });
    }
    let chip_layers = model.layers.len() - SimConfig::PACKAGE_LAYERS;
    if let Some(layer) = model.layers[chip_layers..].iter().find(|l| l.has_power) {
        return Err(ValidationError::PowerInPackage {
            name: layer.name.clone(),
        });
    }
    if !model.layers.iter().any(|l| l.has_power) {
        return Err(ValidationError::NoPowerLayer);
    }
    for layer in &model.layers {
        require_positive(
            &format!("layers.{}.thickness", layer.name),
            meters_of(layer.thickness),
        )?;
        require_positive(
            &format!("layers.{}.conductivity", layer.name),
            layer.conductivity,
        )?;
        require_positive(
            &format!("layers.{}.vol_heat_capacity", layer.name),
            layer.vol_heat_capacity,
        )?;
    }

    let thermal = &config.thermal;
    require_positive("thermal.ambient", kelvin_of(thermal.ambient))?;
    require_positive("thermal.init_temp", kelvin_of(thermal.init_temp))?;
    require_positive("thermal.sampling_intvl", seconds_of(thermal.sampling_intvl))?;

    let package = &config.package;
    require_positive("package.r_convec", package.r_convec)?;
    require_positive("package.spreader_side", meters_of(package.spreader_side))?;
    require_positive("package.sink_side", meters_of(package.sink_side))?;
    if package.sink_side <= package.spreader_side {
        return Err(ValidationError::InvalidValue {
            field: "package.sink_side".to_string(),
            value: meters_of(package.sink_side).to_string(),
            reason: "heat sink must be wider than the spreader".to_string(),
        });
    }
    if package.model_secondary {
        let sec = &package.secondary;
        for (field, value) in [
            ("secondary.r_sub", sec.r_sub),
            ("secondary.r_solder", sec.r_solder),
            ("secondary.r_pcb", sec.r_pcb),
            ("secondary.r_convec_sec", sec.r_convec_sec),
            ("secondary.c_sub", sec.c_sub),
            ("secondary.c_solder", sec.c_solder),
            ("secondary.c_pcb", sec.c_pcb),
        ] {
            require_positive(field, value)?;
        }
    }

    Ok(())
}
