//! Temperature file dump/read helpers.
//!
//! Block temperature files hold one `<name>\t<temp>` line per node in
//! [`GridModel::node_names`] order. Grid files hold the cell field, one line
//! per row, each layer introduced by a `# layer <l>` line.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use hs_core::{ensure_len, kelvin_of};

use crate::error::{ModelError, ModelResult};
use crate::grid::GridModel;

/// Write every block and extra node temperature in `temps` to `path`.
pub fn dump_temp(model: &GridModel, temps: &[f64], path: &Path) -> ModelResult<()> {
    ensure_len("temperature vector", model.temp_len(), temps.len())?;
    let file = std::fs::File::create(path).map_err(|e| ModelError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for (name, t) in model.node_names().iter().zip(temps) {
        writeln!(out, "{name}\t{t:.2}").map_err(|e| ModelError::io(path, e))?;
    }
    out.flush().map_err(|e| ModelError::io(path, e))
}

/// Fill `temps` from a file written by [`dump_temp`]. Every node must be
/// listed. With `clip`, values above the thermal threshold are clipped.
pub fn read_temp(model: &GridModel, temps: &mut [f64], path: &Path, clip: bool) -> ModelResult<()> {
    ensure_len("temperature vector", model.temp_len(), temps.len())?;
    let text = std::fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
    let bad = |reason: String| ModelError::TempFile {
        path: path.to_path_buf(),
        reason,
    };

    let names = model.node_names();
    let index: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let mut seen = vec![false; names.len()];

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(name), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(bad(format!("line {}: expected <name> <temperature>", line_no + 1)));
        };
        let &i = index
            .get(name)
            .ok_or_else(|| bad(format!("line {}: unknown node {name}", line_no + 1)))?;
        let t: f64 = value
            .parse()
            .ok()
            .filter(|t: &f64| t.is_finite())
            .ok_or_else(|| bad(format!("line {}: invalid temperature {value:?}", line_no + 1)))?;
        temps[i] = t;
        seen[i] = true;
    }

    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(bad(format!("no temperature for {}", names[missing])));
    }
    if clip {
        let threshold = kelvin_of(model.config().thermal.thermal_threshold);
        for t in temps.iter_mut() {
            *t = t.min(threshold);
        }
    }
    Ok(())
}

/// Write the cell field, appending when `append` is set. `time` adds a
/// `# t = <time>` line ahead of the layers.
pub fn dump_grid(
    model: &GridModel,
    field: &[f64],
    path: &Path,
    append: bool,
    time: Option<f64>,
) -> ModelResult<()> {
    let dims = model.dims();
    ensure_len("cell field", dims.n_cells(), field.len())?;
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(|e| ModelError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let io = |e| ModelError::io(path, e);

    if let Some(t) = time {
        writeln!(out, "# t = {t:e}").map_err(io)?;
    }
    for l in 0..dims.layers {
        writeln!(out, "# layer {l}").map_err(io)?;
        for r in 0..dims.rows {
            let start = dims.cell_index(l, r, 0);
            let row: Vec<String> = field[start..start + dims.cols]
                .iter()
                .map(|t| format!("{t:.2}"))
                .collect();
            writeln!(out, "{}", row.join("\t")).map_err(io)?;
        }
    }
    out.flush().map_err(io)
}
