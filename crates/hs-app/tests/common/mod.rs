#![allow(dead_code)]

use std::path::{Path, PathBuf};

use hs_core::m;
use hs_project::{CheckpointDef, LayerDef, ModelDef, SimConfig};
use tempfile::TempDir;

/// Two blocks side by side on a 1 cm square die.
pub const DIE_FLP: &str = "# name width height left bottom\n\
                           core 0.005 0.01 0 0\n\
                           cache 0.005 0.01 0.005 0\n";

/// One block covering the whole die.
pub const SINGLE_FLP: &str = "chip 0.01 0.01 0 0\n";

/// Scratch directory holding a floorplan and a config that points into it.
pub struct Fixture {
    pub dir: TempDir,
    pub config: SimConfig,
}

impl Fixture {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_floorplan(rows, cols, DIE_FLP)
    }

    pub fn with_floorplan(rows: usize, cols: usize, floorplan: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let flp = dir.path().join("die.flp");
        std::fs::write(&flp, floorplan).unwrap();

        let layer = |name: &str, has_power: bool| LayerDef {
            name: name.to_string(),
            floorplan: flp.clone(),
            has_power,
            thickness: m(0.0005),
            conductivity: 100.0,
            vol_heat_capacity: 1.75e6,
        };
        let config = SimConfig {
            version: 1,
            model: ModelDef {
                rows,
                cols,
                layers: vec![layer("die", true), layer("spreader", false), layer("sink", false)],
            },
            thermal: Default::default(),
            package: Default::default(),
            leakage: Default::default(),
            checkpoint: CheckpointDef {
                path: dir.path().join("ckpt.bin"),
            },
        };
        Self { dir, config }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn checkpoint(&self) -> &Path {
        &self.config.checkpoint.path
    }

    /// Write a power trace with the given header and rows.
    pub fn power_trace(&self, name: &str, header: &str, rows: &[&str]) -> PathBuf {
        let path = self.path(name);
        let mut text = format!("{header}\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        std::fs::write(&path, text).unwrap();
        path
    }
}

pub fn lines_of(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
