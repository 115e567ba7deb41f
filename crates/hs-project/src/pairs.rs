//! Ordered name/value tables and their mapping onto [`SimConfig`].
//!
//! Entries earlier in a table take precedence over later ones, so command
//! line assignments placed first override anything appended after them.

use crate::schema::{LeakageMode, SimConfig};
use crate::{ConfigError, ConfigResult};
use hs_core::{k, kelvin_of, m, meters_of, s, seconds_of};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameValueTable {
    entries: Vec<(String, String)>,
}

impl NameValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name=value` assignments (as given to `--set`).
    pub fn from_assignments<I, S>(assignments: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for text in assignments {
            let text = text.as_ref();
            let (name, value) = text
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedOverride {
                    text: text.to_string(),
                })?;
            let name = name.trim().trim_start_matches('-');
            if name.is_empty() {
                return Err(ConfigError::MalformedOverride {
                    text: text.to_string(),
                });
            }
            table.push(name, value.trim());
        }
        Ok(table)
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Drop every entry whose name already appeared earlier in the table.
    /// Returns the new size.
    pub fn remove_duplicates(&mut self) -> usize {
        let mut seen = std::collections::HashSet::new();
        self.entries.retain(|(name, _)| seen.insert(name.clone()));
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_f64(name: &str, value: &str) -> ConfigResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| invalid(name, value, "expected a number"))
}

fn parse_usize(name: &str, value: &str) -> ConfigResult<usize> {
    value
        .parse::<usize>()
        .map_err(|_| invalid(name, value, "expected a non-negative integer"))
}

fn parse_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(invalid(name, value, "expected on/off")),
    }
}

fn parse_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() || value == "(null)" {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Apply a table of overrides onto `config`. Duplicates are resolved first
/// (earlier wins); unknown names are rejected.
pub fn apply_overrides(config: &mut SimConfig, table: &NameValueTable) -> ConfigResult<()> {
    let mut table = table.clone();
    table.remove_duplicates();

    for (name, value) in table.iter() {
        let thermal = &mut config.thermal;
        let package = &mut config.package;
        let leakage = &mut config.leakage;
        match name {
            "ambient" => thermal.ambient = k(parse_f64(name, value)?),
            "init_temp" => thermal.init_temp = k(parse_f64(name, value)?),
            "init_file" => thermal.init_file = parse_path(value),
            "sampling_intvl" => thermal.sampling_intvl = s(parse_f64(name, value)?),
            "dtm_used" => thermal.dtm_used = parse_bool(name, value)?,
            "thermal_threshold" => thermal.thermal_threshold = k(parse_f64(name, value)?),
            "steady_file" => thermal.steady_file = parse_path(value),
            "grid_steady_file" => thermal.grid_steady_file = parse_path(value),
            "grid_transient_file" => thermal.grid_transient_file = parse_path(value),
            "grid_rows" => config.model.rows = parse_usize(name, value)?,
            "grid_cols" => config.model.cols = parse_usize(name, value)?,
            "r_convec" => package.r_convec = parse_f64(name, value)?,
            "natural_convection" => package.natural_convection = parse_bool(name, value)?,
            "model_secondary" => package.model_secondary = parse_bool(name, value)?,
            "spreader_side" => package.spreader_side = m(parse_f64(name, value)?),
            "sink_side" => package.sink_side = m(parse_f64(name, value)?),
            "leakage_used" => leakage.enabled = parse_bool(name, value)?,
            "leakage_mode" => {
                leakage.mode = match value {
                    "linear" => LeakageMode::Linear,
                    "quadratic" => LeakageMode::Quadratic,
                    "exponential" => LeakageMode::Exponential,
                    _ => return Err(invalid(name, value, "expected linear/quadratic/exponential")),
                }
            }
            "leak_alpha" => leakage.alpha = parse_f64(name, value)?,
            "leak_beta" => leakage.beta = parse_f64(name, value)?,
            "leak_tbase" => leakage.tbase = k(parse_f64(name, value)?),
            "checkpoint_file" => {
                config.checkpoint.path = parse_path(value)
                    .ok_or_else(|| invalid(name, value, "checkpoint path cannot be empty"))?
            }
            _ => {
                return Err(ConfigError::UnknownParameter {
                    name: name.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Render the effective scalar settings as a table (for logging).
pub fn to_pairs(config: &SimConfig) -> NameValueTable {
    let path = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(null)".to_string())
    };
    let t = &config.thermal;
    let p = &config.package;
    let l = &config.leakage;

    let mut table = NameValueTable::new();
    table.push("grid_rows", config.model.rows.to_string());
    table.push("grid_cols", config.model.cols.to_string());
    table.push("ambient", kelvin_of(t.ambient).to_string());
    table.push("init_temp", kelvin_of(t.init_temp).to_string());
    table.push("init_file", path(&t.init_file));
    table.push("sampling_intvl", seconds_of(t.sampling_intvl).to_string());
    table.push("dtm_used", t.dtm_used.to_string());
    table.push("thermal_threshold", kelvin_of(t.thermal_threshold).to_string());
    table.push("steady_file", path(&t.steady_file));
    table.push("grid_steady_file", path(&t.grid_steady_file));
    table.push("grid_transient_file", path(&t.grid_transient_file));
    table.push("r_convec", p.r_convec.to_string());
    table.push("natural_convection", p.natural_convection.to_string());
    table.push("model_secondary", p.model_secondary.to_string());
    table.push("spreader_side", meters_of(p.spreader_side).to_string());
    table.push("sink_side", meters_of(p.sink_side).to_string());
    table.push("leakage_used", l.enabled.to_string());
    table.push("leak_alpha", l.alpha.to_string());
    table.push("leak_beta", l.beta.to_string());
    table.push("leak_tbase", kelvin_of(l.tbase).to_string());
    table.push("checkpoint_file", config.checkpoint.path.display().to_string());
    table
}
