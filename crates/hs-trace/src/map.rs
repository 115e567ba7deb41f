//! Translation between trace column order and solver block order.

use hs_core::ensure_len;
use hs_model::Layer;

use crate::{TraceError, TraceResult};

/// For every trace column, the solver block it feeds.
///
/// Only power dissipating layers contribute columns, in layer order. The
/// block offset advances over every layer, the column cursor over power
/// layers only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceMap {
    slots: Vec<usize>,
    names: Vec<String>,
}

impl TraceMap {
    pub fn build<S: AsRef<str>>(names: &[S], layers: &[Layer]) -> TraceResult<Self> {
        let expected: usize = layers
            .iter()
            .filter(|l| l.has_power)
            .map(Layer::n_units)
            .sum();
        if names.len() != expected {
            return Err(TraceError::UnitCountMismatch {
                floorplan: expected,
                trace: names.len(),
            });
        }

        let mut slots = Vec::with_capacity(expected);
        let mut base = 0;
        let mut count = 0;
        for (l, layer) in layers.iter().enumerate() {
            let n = layer.n_units();
            if layer.has_power {
                let mut seen = vec![false; n];
                for name in &names[count..count + n] {
                    let name = name.as_ref();
                    let idx = layer
                        .floorplan
                        .block_index(name)
                        .ok_or_else(|| TraceError::UnknownName {
                            name: name.to_string(),
                            layer: l,
                        })?;
                    if std::mem::replace(&mut seen[idx], true) {
                        return Err(TraceError::DuplicateName {
                            name: name.to_string(),
                            layer: l,
                        });
                    }
                    slots.push(base + idx);
                }
                count += n;
            }
            base += n;
        }

        Ok(Self {
            slots,
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
        })
    }

    /// Number of trace columns.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Block names in trace order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Solver block index of each trace column.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Write trace-order `vals` into their solver slots of `out`. Slots of
    /// non-power layers are left untouched.
    pub fn scatter(&self, vals: &[f64], out: &mut [f64]) -> TraceResult<()> {
        ensure_len("trace line", self.slots.len(), vals.len())?;
        let len = out.len();
        for (&slot, &v) in self.slots.iter().zip(vals) {
            let cell = out.get_mut(slot).ok_or(hs_core::HsError::IndexOob {
                what: "solver block",
                index: slot,
                len,
            })?;
            *cell = v;
        }
        Ok(())
    }

    /// Read solver-order `src` back out in trace order.
    pub fn gather(&self, src: &[f64]) -> TraceResult<Vec<f64>> {
        self.slots
            .iter()
            .map(|&slot| {
                src.get(slot).copied().ok_or_else(|| {
                    hs_core::HsError::IndexOob {
                        what: "solver block",
                        index: slot,
                        len: src.len(),
                    }
                    .into()
                })
            })
            .collect()
    }
}
