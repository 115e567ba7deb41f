//! Floorplan reading and block name lookup.
//!
//! One functional block per line:
//! `<name> <width> <height> <left-x> <bottom-y> [extra columns ignored]`,
//! all lengths in meters. Blank lines and `#` comments are skipped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hs_project::SimConfig;

use crate::error::{ModelError, ModelResult};

/// A rectangular functional block.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub bottom: f64,
}

impl Unit {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x < self.left + self.width && y >= self.bottom && y < self.bottom + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + 0.5 * self.width, self.bottom + 0.5 * self.height)
    }
}

/// Ordered set of blocks; the order is the floorplan (solver) order.
#[derive(Debug, Clone, PartialEq)]
pub struct Floorplan {
    units: Vec<Unit>,
    index: HashMap<String, usize>,
}

impl Floorplan {
    pub fn from_units(units: Vec<Unit>) -> ModelResult<Self> {
        Self::build(units, "<memory>")
    }

    pub fn read(path: &Path) -> ModelResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
        Self::parse_named(&text, &path.display().to_string())
    }

    fn parse_named(text: &str, source_name: &str) -> ModelResult<Self> {
        let err = |line: usize, reason: String| ModelError::Floorplan {
            source_name: source_name.to_string(),
            line,
            reason,
        };

        let mut units = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return Err(err(
                    line_no,
                    format!("expected name, width, height, left-x, bottom-y; got {} fields", fields.len()),
                ));
            }
            let mut nums = [0.0_f64; 4];
            for (slot, tok) in nums.iter_mut().zip(&fields[1..5]) {
                *slot = tok
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| err(line_no, format!("invalid number {tok:?}")))?;
            }
            let [width, height, left, bottom] = nums;
            if width <= 0.0 || height <= 0.0 {
                return Err(err(line_no, format!("block {} has non-positive size", fields[0])));
            }
            units.push(Unit {
                name: fields[0].to_string(),
                width,
                height,
                left,
                bottom,
            });
        }
        Self::build(units, source_name)
    }

    fn build(units: Vec<Unit>, source_name: &str) -> ModelResult<Self> {
        if units.is_empty() {
            return Err(ModelError::Floorplan {
                source_name: source_name.to_string(),
                line: 0,
                reason: "no functional units".to_string(),
            });
        }
        let mut index = HashMap::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            if index.insert(unit.name.clone(), i).is_some() {
                return Err(ModelError::Floorplan {
                    source_name: source_name.to_string(),
                    line: 0,
                    reason: format!("duplicate block name {}", unit.name),
                });
            }
        }
        Ok(Self { units, index })
    }

    /// Floorplan index of the block called `name`.
    pub fn block_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn n_units(&self) -> usize {
        self.units.len()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, i: usize) -> &Unit {
        &self.units[i]
    }

    /// Extent of the bounding box along x.
    pub fn width(&self) -> f64 {
        let (x0, _, x1, _) = self.bbox();
        x1 - x0
    }

    /// Extent of the bounding box along y.
    pub fn height(&self) -> f64 {
        let (_, y0, _, y1) = self.bbox();
        y1 - y0
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)`.
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        self.units.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), u| {
                (
                    x0.min(u.left),
                    y0.min(u.bottom),
                    x1.max(u.left + u.width),
                    y1.max(u.bottom + u.height),
                )
            },
        )
    }
}

impl FromStr for Floorplan {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_named(s, "<string>")
    }
}

/// Read the floorplan of every configured layer. A file shared by several
/// layers is read once.
pub fn load_floorplans(config: &SimConfig) -> ModelResult<Vec<Floorplan>> {
    let mut cache: HashMap<PathBuf, Floorplan> = HashMap::new();
    let mut out = Vec::with_capacity(config.model.layers.len());
    for layer in &config.model.layers {
        let flp = match cache.get(&layer.floorplan) {
            Some(flp) => flp.clone(),
            None => {
                let flp = Floorplan::read(&layer.floorplan)?;
                cache.insert(layer.floorplan.clone(), flp.clone());
                flp
            }
        };
        out.push(flp);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EV6_LIKE: &str = "\
# name  width   height  left-x  bottom-y
L2      0.016   0.008   0.000   0.000
Icache  0.008   0.008   0.000   0.008

Dcache  0.008   0.008   0.008   0.008   1.75e6   0.01
";

    #[test]
    fn parses_blocks_in_file_order() {
        let flp: Floorplan = EV6_LIKE.parse().unwrap();
        assert_eq!(flp.n_units(), 3);
        assert_eq!(flp.block_index("L2"), Some(0));
        assert_eq!(flp.block_index("Dcache"), Some(2));
        assert_eq!(flp.block_index("Bpred"), None);
        assert_eq!(flp.bbox(), (0.0, 0.0, 0.016, 0.016));
        assert!((flp.width() - 0.016).abs() < 1e-15);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = "a 1 1 0 0\na 1 1 1 0\n".parse::<Floorplan>().unwrap_err();
        assert!(err.to_string().contains("duplicate block name a"));
    }

    #[test]
    fn reports_line_of_bad_number() {
        let err = "a 1 1 0 0\nb 1 x 1 0\n".parse::<Floorplan>().unwrap_err();
        assert!(matches!(err, ModelError::Floorplan { line: 2, .. }));
    }

    #[test]
    fn empty_floorplan_is_an_error() {
        assert!("# nothing\n".parse::<Floorplan>().is_err());
    }

    #[test]
    fn unit_contains_is_half_open() {
        let u = Unit {
            name: "u".into(),
            width: 1.0,
            height: 1.0,
            left: 0.0,
            bottom: 0.0,
        };
        assert!(u.contains(0.0, 0.5));
        assert!(!u.contains(1.0, 0.5));
    }
}
