//! Layered grid RC model.
//!
//! Every layer is discretized into the same `rows x cols` cells over the
//! bounding box of all floorplans. Cells are numbered
//! `(layer * rows + row) * cols + col` with row 0 along the north edge;
//! the package periphery (and optionally the secondary heat path) follows
//! as extra nodes. The last two layers are the heat spreader and the sink.

use hs_core::{ensure_len, kelvin_of, max_abs_diff, meters_of};
use hs_project::SimConfig;
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::floorplan::Floorplan;
use crate::integrator::{Integrator, RK4};
use crate::leakage::block_leakage;
use crate::model::TransientModel;
use crate::package::{self, EXTRA, EXTRA_SEC, SMALL_FOR_CONVEC, node};
use crate::state::{OwnedState, TransientState};

const LEAKAGE_MAX_ITER: usize = 10;
const LEAKAGE_TOL: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub layers: usize,
    pub rows: usize,
    pub cols: usize,
}

impl GridDims {
    pub fn cells_per_layer(&self) -> usize {
        self.rows * self.cols
    }

    pub fn n_cells(&self) -> usize {
        self.layers * self.cells_per_layer()
    }

    pub fn cell_index(&self, layer: usize, row: usize, col: usize) -> usize {
        (layer * self.rows + row) * self.cols + col
    }
}

/// One grid layer with its block/cell mapping.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub floorplan: Floorplan,
    pub has_power: bool,
    pub thickness: f64,
    pub conductivity: f64,
    pub vol_heat_capacity: f64,
    /// Index of this layer's first block in the model-wide block numbering.
    pub base: usize,
    cell_block: Vec<Option<usize>>,
    block_cells: Vec<Vec<usize>>,
}

impl Layer {
    pub fn n_units(&self) -> usize {
        self.floorplan.n_units()
    }

    /// Layer-local cell indices (`row * cols + col`) owned by block `b`.
    pub fn block_cells(&self, b: usize) -> &[usize] {
        &self.block_cells[b]
    }

    /// Block whose area covers the center of layer-local cell `cell`.
    pub fn cell_block(&self, cell: usize) -> Option<usize> {
        self.cell_block[cell]
    }
}

#[derive(Debug, Clone, Copy)]
struct Geometry {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    cell_w: f64,
    cell_h: f64,
    spreader_side: f64,
    sink_side: f64,
}

impl Geometry {
    fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.left + (col as f64 + 0.5) * self.cell_w,
            self.top - (row as f64 + 0.5) * self.cell_h,
        )
    }

    fn cell_at(&self, x: f64, y: f64, dims: &GridDims) -> usize {
        let col = (((x - self.left) / self.cell_w).floor().max(0.0) as usize).min(dims.cols - 1);
        let row = (((self.top - y) / self.cell_h).floor().max(0.0) as usize).min(dims.rows - 1);
        row * dims.cols + col
    }

    fn cell_area(&self) -> f64 {
        self.cell_w * self.cell_h
    }

    /// Spreader area outside the chip, per side.
    fn spreader_ring(&self) -> f64 {
        (self.spreader_side * self.spreader_side - self.width * self.height) / 4.0
    }

    /// Sink area outside the spreader, per side.
    fn sink_ring(&self) -> f64 {
        (self.sink_side * self.sink_side - self.spreader_side * self.spreader_side) / 4.0
    }

    /// Chip extent facing `side`.
    fn chip_extent(&self, side: usize) -> f64 {
        if side == node::W || side == node::E {
            self.width
        } else {
            self.height
        }
    }
}

/// Conductance network: symmetric node to node links plus a conductance
/// to ambient per node.
#[derive(Debug, Clone)]
struct Network {
    adjacency: Vec<Vec<(usize, f64)>>,
    g_amb: Vec<f64>,
}

impl Network {
    fn new(n: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); n],
            g_amb: vec![0.0; n],
        }
    }

    fn connect(&mut self, a: usize, b: usize, g: f64) {
        self.adjacency[a].push((b, g));
        self.adjacency[b].push((a, g));
    }

    fn total(&self, i: usize) -> f64 {
        self.adjacency[i].iter().map(|(_, g)| g).sum::<f64>() + self.g_amb[i]
    }
}

/// One sampling interval of the RC network under constant power.
struct RcStep<'a> {
    net: &'a Network,
    cap: &'a [f64],
    q: &'a [f64],
    x0: &'a [f64],
    ambient: f64,
}

impl TransientModel for RcStep<'_> {
    type State = Vec<f64>;

    fn initial_state(&self) -> Vec<f64> {
        self.x0.to_vec()
    }

    fn rhs(&mut self, _t: f64, x: &Vec<f64>) -> ModelResult<Vec<f64>> {
        Ok(x
            .iter()
            .enumerate()
            .map(|(i, &ti)| {
                let mut flow = self.q[i] - self.net.g_amb[i] * (ti - self.ambient);
                for &(j, g) in &self.net.adjacency[i] {
                    flow -= g * (ti - x[j]);
                }
                flow / self.cap[i]
            })
            .collect())
    }

    fn add(&self, a: &Vec<f64>, b: &Vec<f64>) -> Vec<f64> {
        a.iter().zip(b).map(|(x, y)| x + y).collect()
    }

    fn scale(&self, a: &Vec<f64>, scale: f64) -> Vec<f64> {
        a.iter().map(|x| x * scale).collect()
    }
}

/// Steady-state solution: block temperatures followed by the extra nodes,
/// plus the cell field for grid dumps.
#[derive(Debug, Clone, PartialEq)]
pub struct SteadyState {
    pub temps: Vec<f64>,
    pub field: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct GridModel {
    config: SimConfig,
    dims: GridDims,
    layers: Vec<Layer>,
    geom: Geometry,
    total_blocks: usize,
    extra_nodes: usize,
    supply_scale: Vec<f64>,
    network: Option<Network>,
    capacitance: Option<Vec<f64>>,
}

impl GridModel {
    /// Lay out the grid for `config`, one floorplan per configured layer.
    ///
    /// Also runs the package model once at ambient so a natural convection
    /// package starts from a sensible `r_convec`.
    pub fn alloc(config: &SimConfig, floorplans: Vec<Floorplan>) -> ModelResult<Self> {
        let defs = &config.model.layers;
        ensure_len("floorplans", defs.len(), floorplans.len())?;
        if defs.len() < SimConfig::PACKAGE_LAYERS + 1 {
            return Err(ModelError::InvalidGeometry {
                what: format!("{} layers, need chip layers plus spreader and sink", defs.len()),
            });
        }
        let dims = GridDims {
            layers: defs.len(),
            rows: config.model.rows,
            cols: config.model.cols,
        };
        if dims.rows == 0 || dims.cols == 0 {
            return Err(ModelError::InvalidGeometry {
                what: format!("grid of {} x {} cells", dims.rows, dims.cols),
            });
        }

        let (x0, y0, x1, y1) = floorplans.iter().map(Floorplan::bbox).fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)),
        );
        let (width, height) = (x1 - x0, y1 - y0);
        let spreader_side = meters_of(config.package.spreader_side);
        let sink_side = meters_of(config.package.sink_side);
        if spreader_side <= width.max(height) {
            return Err(ModelError::InvalidGeometry {
                what: format!(
                    "heat spreader ({spreader_side} m) must be wider than the chip ({width} m x {height} m)"
                ),
            });
        }
        if sink_side <= spreader_side {
            return Err(ModelError::InvalidGeometry {
                what: format!("heat sink ({sink_side} m) must be wider than the spreader ({spreader_side} m)"),
            });
        }
        let geom = Geometry {
            left: x0,
            top: y1,
            width,
            height,
            cell_w: width / dims.cols as f64,
            cell_h: height / dims.rows as f64,
            spreader_side,
            sink_side,
        };

        let mut layers = Vec::with_capacity(defs.len());
        let mut base = 0;
        for (def, floorplan) in defs.iter().zip(floorplans) {
            let (cell_block, block_cells) = map_cells(&floorplan, &dims, &geom);
            let n_units = floorplan.n_units();
            layers.push(Layer {
                name: def.name.clone(),
                floorplan,
                has_power: def.has_power,
                thickness: meters_of(def.thickness),
                conductivity: def.conductivity,
                vol_heat_capacity: def.vol_heat_capacity,
                base,
                cell_block,
                block_cells,
            });
            base += n_units;
        }

        let mut config = config.clone();
        if config.package.natural_convection {
            let ambient = kelvin_of(config.thermal.ambient);
            package::package_model(&mut config.package, ambient, ambient + SMALL_FOR_CONVEC);
        }
        package::check_r_convec(config.package.r_convec);

        let extra_nodes = EXTRA + if config.package.model_secondary { EXTRA_SEC } else { 0 };
        debug!(
            layers = dims.layers,
            rows = dims.rows,
            cols = dims.cols,
            blocks = base,
            extra_nodes,
            "allocated grid model"
        );
        Ok(Self {
            config,
            dims,
            layers,
            geom,
            total_blocks: base,
            extra_nodes,
            supply_scale: vec![1.0; base],
            network: None,
            capacitance: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_base(&self, layer: usize) -> usize {
        self.layers[layer].base
    }

    /// Blocks over all layers.
    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    pub fn extra_nodes(&self) -> usize {
        self.extra_nodes
    }

    pub fn n_cells(&self) -> usize {
        self.dims.n_cells()
    }

    pub fn node_count(&self) -> usize {
        self.n_cells() + self.extra_nodes
    }

    /// Length of the transient state vector (cells then extra nodes).
    pub fn trans_len(&self) -> usize {
        self.node_count()
    }

    /// Length of the temperature vector (blocks then extra nodes).
    pub fn temp_len(&self) -> usize {
        self.total_blocks + self.extra_nodes
    }

    /// Blocks of the power dissipating layers, the width of a trace line.
    pub fn power_units(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| l.has_power)
            .map(Layer::n_units)
            .sum()
    }

    pub fn ambient(&self) -> f64 {
        kelvin_of(self.config.thermal.ambient)
    }

    pub fn r_convec(&self) -> f64 {
        self.config.package.r_convec
    }

    pub fn alloc_state(&self) -> OwnedState {
        OwnedState::new(self.trans_len(), self.temp_len())
    }

    /// Set every node of `state` to `temp`.
    pub fn set_temp<S: TransientState + ?Sized>(&self, state: &mut S, temp: f64) {
        let (trans, temps) = state.split_mut();
        trans.fill(temp);
        temps.fill(temp);
    }

    /// Per-block supply voltage scale applied to leakage, in block order.
    pub fn set_supply_scale(&mut self, scale: Vec<f64>) -> ModelResult<()> {
        ensure_len("supply scale", self.total_blocks, scale.len())?;
        self.supply_scale = scale;
        Ok(())
    }

    /// Rerun the package model for the given sink temperature. Returns
    /// whether natural convection is modeled. The resistance network must be
    /// repopulated for a new `r_convec` to take effect.
    pub fn package_model(&mut self, sink_temp: f64) -> bool {
        let ambient = self.ambient();
        package::package_model(&mut self.config.package, ambient, sink_temp)
    }

    /// Names of all temperature vector entries: `layer_<l>_<block>` for the
    /// blocks, then the extra nodes.
    pub fn node_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.temp_len());
        for (l, layer) in self.layers.iter().enumerate() {
            for unit in layer.floorplan.units() {
                names.push(format!("layer_{l}_{}", unit.name));
            }
        }
        for group in &node::GROUPS[..self.extra_nodes / 4] {
            for side in node::SIDES {
                names.push(format!("{group}_{side}"));
            }
        }
        names
    }

    fn extra(&self, group: usize, side: usize) -> usize {
        self.n_cells() + group + side
    }

    /// Build the conductance network from the current configuration.
    pub fn populate_r_model(&mut self) {
        let d = self.dims;
        let g = self.geom;
        let mut net = Network::new(self.node_count());

        for (l, layer) in self.layers.iter().enumerate() {
            let kt = layer.conductivity * layer.thickness;
            let g_ew = kt * g.cell_h / g.cell_w;
            let g_ns = kt * g.cell_w / g.cell_h;
            let g_up = self.layers.get(l + 1).map(|above| {
                g.cell_area()
                    / (layer.thickness / (2.0 * layer.conductivity)
                        + above.thickness / (2.0 * above.conductivity))
            });
            for r in 0..d.rows {
                for c in 0..d.cols {
                    let i = d.cell_index(l, r, c);
                    if c + 1 < d.cols {
                        net.connect(i, i + 1, g_ew);
                    }
                    if r + 1 < d.rows {
                        net.connect(i, d.cell_index(l, r + 1, c), g_ns);
                    }
                    if let Some(g_up) = g_up {
                        net.connect(i, d.cell_index(l + 1, r, c), g_up);
                    }
                }
            }
        }

        // Edge cells of the spreader and the sink feed their periphery.
        let sp_l = d.layers - 2;
        let sink_l = d.layers - 1;
        let over_x = (g.spreader_side - g.width) / 2.0;
        let over_y = (g.spreader_side - g.height) / 2.0;
        for (l, group) in [(sp_l, node::SP), (sink_l, node::SINK_C)] {
            let layer = &self.layers[l];
            let kt = layer.conductivity * layer.thickness;
            let g_we = kt * g.cell_h / (g.cell_w / 2.0 + over_x / 2.0);
            let g_ns = kt * g.cell_w / (g.cell_h / 2.0 + over_y / 2.0);
            for r in 0..d.rows {
                net.connect(d.cell_index(l, r, 0), self.extra(group, node::W), g_we);
                net.connect(d.cell_index(l, r, d.cols - 1), self.extra(group, node::E), g_we);
            }
            for c in 0..d.cols {
                net.connect(d.cell_index(l, 0, c), self.extra(group, node::N), g_ns);
                net.connect(d.cell_index(l, d.rows - 1, c), self.extra(group, node::S), g_ns);
            }
        }

        let sp = &self.layers[sp_l];
        let sink = &self.layers[sink_l];
        let ring = g.spreader_ring();
        let outer = g.sink_ring();
        let g_sp_sink = ring
            / (sp.thickness / (2.0 * sp.conductivity) + sink.thickness / (2.0 * sink.conductivity));
        for side in 0..4 {
            net.connect(self.extra(node::SP, side), self.extra(node::SINK_C, side), g_sp_sink);
            let chip = g.chip_extent(side);
            let g_out = sink.conductivity * sink.thickness * g.spreader_side
                / ((g.spreader_side - chip) / 4.0 + (g.sink_side - g.spreader_side) / 4.0);
            net.connect(self.extra(node::SINK_C, side), self.extra(node::SINK, side), g_out);
        }

        // Convection: r_convec is shared by sink area.
        let per_area = 1.0 / (g.sink_side * g.sink_side * self.config.package.r_convec);
        for i in d.cell_index(sink_l, 0, 0)..d.n_cells() {
            net.g_amb[i] = g.cell_area() * per_area;
        }
        for side in 0..4 {
            net.g_amb[self.extra(node::SINK_C, side)] = ring * per_area;
            net.g_amb[self.extra(node::SINK, side)] = outer * per_area;
        }

        if self.config.package.model_secondary {
            self.populate_secondary(&mut net);
        }
        self.network = Some(net);
    }

    /// Substrate, solder and PCB below the bottom layer. Each bottom cell
    /// drains into the substrate node of its nearest side.
    fn populate_secondary(&self, net: &mut Network) {
        let d = self.dims;
        let sec = &self.config.package.secondary;
        let sides: Vec<usize> = (0..d.cells_per_layer())
            .map(|cell| self.nearest_side(cell / d.cols, cell % d.cols))
            .collect();
        let mut counts = [0usize; 4];
        for &side in &sides {
            counts[side] += 1;
        }
        for (cell, &side) in sides.iter().enumerate() {
            let g = 1.0 / (sec.r_sub * counts[side] as f64);
            net.connect(cell, self.extra(node::SUB, side), g);
        }
        let g_amb = 1.0 / (8.0 * sec.r_convec_sec);
        for side in 0..4 {
            net.connect(self.extra(node::SUB, side), self.extra(node::SOLDER, side), 1.0 / sec.r_solder);
            net.connect(self.extra(node::SOLDER, side), self.extra(node::PCB_C, side), 1.0 / sec.r_pcb);
            net.connect(self.extra(node::PCB_C, side), self.extra(node::PCB, side), 1.0 / sec.r_pcb);
            net.g_amb[self.extra(node::PCB_C, side)] = g_amb;
            net.g_amb[self.extra(node::PCB, side)] = g_amb;
        }
    }

    /// West, east, north, south; ties go to the earlier side.
    fn nearest_side(&self, row: usize, col: usize) -> usize {
        let g = self.geom;
        let (x, y) = g.cell_center(row, col);
        let dist = [
            x - g.left,
            g.left + g.width - x,
            g.top - y,
            y - (g.top - g.height),
        ];
        (1..4).fold(0, |best, s| if dist[s] < dist[best] { s } else { best })
    }

    /// Node capacitances, J/K.
    pub fn populate_c_model(&mut self) {
        let g = self.geom;
        let mut cap = Vec::with_capacity(self.node_count());
        for layer in &self.layers {
            let c = layer.vol_heat_capacity * layer.thickness * g.cell_area();
            cap.extend(std::iter::repeat_n(c, self.dims.cells_per_layer()));
        }

        let sp = &self.layers[self.dims.layers - 2];
        let sink = &self.layers[self.dims.layers - 1];
        let ring = g.spreader_ring();
        let outer = g.sink_ring();
        let mut extra = [0.0; EXTRA + EXTRA_SEC];
        for side in 0..4 {
            extra[node::SP + side] = sp.vol_heat_capacity * sp.thickness * ring;
            extra[node::SINK_C + side] = sink.vol_heat_capacity * sink.thickness * ring;
            extra[node::SINK + side] = sink.vol_heat_capacity * sink.thickness * outer;
            let sec = &self.config.package.secondary;
            extra[node::SUB + side] = sec.c_sub;
            extra[node::SOLDER + side] = sec.c_solder;
            extra[node::PCB_C + side] = sec.c_pcb;
            extra[node::PCB + side] = sec.c_pcb;
        }
        cap.extend_from_slice(&extra[..self.extra_nodes]);
        self.capacitance = Some(cap);
    }

    fn network(&self) -> ModelResult<&Network> {
        self.network
            .as_ref()
            .ok_or(ModelError::NotPopulated { what: "resistance model" })
    }

    fn capacitance(&self) -> ModelResult<&[f64]> {
        self.capacitance
            .as_deref()
            .ok_or(ModelError::NotPopulated { what: "capacitance model" })
    }

    /// Spread block powers over their cells.
    fn node_power(&self, power: &[f64]) -> Vec<f64> {
        let cpl = self.dims.cells_per_layer();
        let mut q = vec![0.0; self.node_count()];
        for (l, layer) in self.layers.iter().enumerate() {
            for b in 0..layer.n_units() {
                let cells = layer.block_cells(b);
                let share = power[layer.base + b] / cells.len() as f64;
                for &cell in cells {
                    q[l * cpl + cell] += share;
                }
            }
        }
        q
    }

    /// Mean cell temperature of every block.
    fn block_temps_into(&self, x: &[f64], out: &mut [f64]) {
        let cpl = self.dims.cells_per_layer();
        for (l, layer) in self.layers.iter().enumerate() {
            for b in 0..layer.n_units() {
                let cells = layer.block_cells(b);
                let sum: f64 = cells.iter().map(|&cell| x[l * cpl + cell]).sum();
                out[layer.base + b] = sum / cells.len() as f64;
            }
        }
    }

    fn refresh_temp(&self, trans: &[f64], temp: &mut [f64]) {
        let (blocks, extra) = temp.split_at_mut(self.total_blocks);
        self.block_temps_into(trans, blocks);
        extra.copy_from_slice(&trans[self.n_cells()..]);
    }

    /// Warm-up: cells take the temperature of their block, cells outside
    /// every block the layer mean.
    fn seed_grid(&self, temp: &[f64], trans: &mut [f64]) {
        let cpl = self.dims.cells_per_layer();
        for (l, layer) in self.layers.iter().enumerate() {
            let blocks = &temp[layer.base..layer.base + layer.n_units()];
            let mean = blocks.iter().sum::<f64>() / blocks.len() as f64;
            for cell in 0..cpl {
                trans[l * cpl + cell] = layer.cell_block(cell).map_or(mean, |b| blocks[b]);
            }
        }
        let n_cells = self.n_cells();
        trans[n_cells..].copy_from_slice(&temp[self.total_blocks..]);
    }

    /// `power` plus leakage at the block temperatures `blocks`.
    fn with_leakage(&self, power: &[f64], blocks: &[f64], out: &mut [f64]) {
        out.copy_from_slice(power);
        let leak = &self.config.leakage;
        for layer in self.layers.iter().filter(|l| l.has_power) {
            for (b, unit) in layer.floorplan.units().iter().enumerate() {
                let i = layer.base + b;
                out[i] += block_leakage(leak, unit.area(), blocks[i], self.supply_scale[i]);
            }
        }
    }

    fn integrate(&self, x0: &[f64], power: &[f64], dt: f64) -> ModelResult<Vec<f64>> {
        let net = self.network()?;
        let cap = self.capacitance()?;
        let q = self.node_power(power);

        // Keep each RK4 substep within the fastest node time constant.
        let max_rate = (0..x0.len())
            .map(|i| net.total(i) / cap[i])
            .fold(0.0_f64, f64::max);
        let substeps = ((dt * max_rate).ceil() as usize).max(1);
        let h = dt / substeps as f64;

        let mut step = RcStep {
            net,
            cap,
            q: &q,
            x0,
            ambient: self.ambient(),
        };
        let mut x = step.initial_state();
        for i in 0..substeps {
            x = RK4.step(&mut step, i as f64 * h, &x, h)?;
        }
        Ok(x)
    }

    /// Advance `state` by `dt` seconds under the block powers `power`.
    ///
    /// With `first`, the cell field is seeded from the temperature vector
    /// before integrating. With leakage enabled the step is repeated until
    /// block temperatures settle, and the total power including leakage is
    /// written to `power_with_leak`.
    pub fn compute_temp<S: TransientState + ?Sized>(
        &self,
        state: &mut S,
        power: &[f64],
        first: bool,
        power_with_leak: Option<&mut [f64]>,
        dt: f64,
    ) -> ModelResult<()> {
        self.network()?;
        self.capacitance()?;
        ensure_len("power", self.total_blocks, power.len())?;
        let (trans, temp) = state.split_mut();
        ensure_len("transient state", self.trans_len(), trans.len())?;
        ensure_len("temperature vector", self.temp_len(), temp.len())?;

        if first {
            self.seed_grid(temp, trans);
        }

        let mut total = power.to_vec();
        let x = if self.config.leakage.enabled {
            let mut blocks = temp[..self.total_blocks].to_vec();
            let mut next = vec![0.0; self.total_blocks];
            let mut x = Vec::new();
            for iter in 0..LEAKAGE_MAX_ITER {
                self.with_leakage(power, &blocks, &mut total);
                x = self.integrate(trans, &total, dt)?;
                self.block_temps_into(&x, &mut next);
                let delta = max_abs_diff(&next, &blocks);
                std::mem::swap(&mut blocks, &mut next);
                if delta < LEAKAGE_TOL {
                    debug!(iterations = iter + 1, "leakage loop settled");
                    break;
                }
            }
            x
        } else {
            self.integrate(trans, power, dt)?
        };

        if let Some(out) = power_with_leak {
            ensure_len("power with leakage", self.total_blocks, out.len())?;
            out.copy_from_slice(&total);
        }
        trans.copy_from_slice(&x);
        self.refresh_temp(trans, temp);
        Ok(())
    }

    /// Solve `G x = q + g_amb * T_amb` for the node temperatures.
    fn solve_steady(&self, power: &[f64]) -> ModelResult<Vec<f64>> {
        let net = self.network()?;
        let n = self.node_count();
        let ambient = self.ambient();

        let mut g = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::from_vec(self.node_power(power));
        for i in 0..n {
            g[(i, i)] += net.g_amb[i];
            rhs[i] += net.g_amb[i] * ambient;
            for &(j, gij) in &net.adjacency[i] {
                g[(i, i)] += gij;
                g[(i, j)] -= gij;
            }
        }

        let x = g.lu().solve(&rhs).ok_or_else(|| ModelError::Numeric {
            what: "conductance matrix is singular".to_string(),
        })?;
        debug!(nodes = n, "steady state solved");
        Ok(x.iter().copied().collect())
    }

    /// Steady-state temperatures for constant block powers.
    pub fn steady_state_temp(&self, power: &[f64]) -> ModelResult<SteadyState> {
        ensure_len("power", self.total_blocks, power.len())?;
        let mut x = self.solve_steady(power)?;
        let mut temps = vec![0.0; self.temp_len()];
        self.refresh_temp(&x, &mut temps);

        if self.config.leakage.enabled {
            let mut total = power.to_vec();
            for _ in 0..LEAKAGE_MAX_ITER {
                self.with_leakage(power, &temps[..self.total_blocks], &mut total);
                x = self.solve_steady(&total)?;
                let prev = temps.clone();
                self.refresh_temp(&x, &mut temps);
                if max_abs_diff(&temps, &prev) < LEAKAGE_TOL {
                    break;
                }
            }
        }

        let field = x[..self.n_cells()].to_vec();
        Ok(SteadyState { temps, field })
    }

    /// Area-weighted mean temperature of the sink layer and its periphery.
    pub fn sink_temp(&self, temps: &[f64]) -> f64 {
        let sink = &self.layers[self.dims.layers - 1];
        let mut sum = 0.0;
        let mut area = 0.0;
        for (b, unit) in sink.floorplan.units().iter().enumerate() {
            sum += unit.area() * temps[sink.base + b];
            area += unit.area();
        }
        let ring = self.geom.spreader_ring();
        let outer = self.geom.sink_ring();
        for side in 0..4 {
            sum += ring * temps[self.total_blocks + node::SINK_C + side];
            sum += outer * temps[self.total_blocks + node::SINK + side];
            area += ring + outer;
        }
        sum / area
    }
}

/// Assign each cell of a layer to the block covering its center. Blocks
/// too small to cover any center take the cell under their own center.
fn map_cells(
    floorplan: &Floorplan,
    dims: &GridDims,
    geom: &Geometry,
) -> (Vec<Option<usize>>, Vec<Vec<usize>>) {
    let mut cell_block = vec![None; dims.cells_per_layer()];
    let mut block_cells = vec![Vec::new(); floorplan.n_units()];
    for r in 0..dims.rows {
        for c in 0..dims.cols {
            let (x, y) = geom.cell_center(r, c);
            if let Some(b) = floorplan.units().iter().position(|u| u.contains(x, y)) {
                let cell = r * dims.cols + c;
                cell_block[cell] = Some(b);
                block_cells[b].push(cell);
            }
        }
    }
    for (b, cells) in block_cells.iter_mut().enumerate() {
        if cells.is_empty() {
            let (x, y) = floorplan.unit(b).center();
            cells.push(geom.cell_at(x, y, dims));
        }
    }
    (cell_block, block_cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::m;
    use hs_project::{LayerDef, LeakageMode, ModelDef};
    use std::path::PathBuf;

    fn layer(name: &str, has_power: bool, thickness: f64, k: f64, sp: f64) -> LayerDef {
        LayerDef {
            name: name.to_string(),
            floorplan: PathBuf::from("chip.flp"),
            has_power,
            thickness: m(thickness),
            conductivity: k,
            vol_heat_capacity: sp,
        }
    }

    fn config(rows: usize, cols: usize) -> SimConfig {
        SimConfig {
            version: 1,
            model: ModelDef {
                rows,
                cols,
                layers: vec![
                    layer("silicon", true, 0.00015, 100.0, 1.75e6),
                    layer("spreader", false, 0.001, 400.0, 3.55e6),
                    layer("sink", false, 0.0069, 400.0, 3.55e6),
                ],
            },
            thermal: Default::default(),
            package: Default::default(),
            leakage: Default::default(),
            checkpoint: Default::default(),
        }
    }

    fn two_blocks() -> Floorplan {
        "left 0.005 0.01 0 0\nright 0.005 0.01 0.005 0\n".parse().unwrap()
    }

    fn model(cfg: &SimConfig, flp: Floorplan) -> GridModel {
        let floorplans = vec![flp; cfg.model.layers.len()];
        let mut model = GridModel::alloc(cfg, floorplans).unwrap();
        model.populate_r_model();
        model.populate_c_model();
        model
    }

    /// Heat leaving through every ambient link at temperatures `x`.
    fn heat_to_ambient(model: &GridModel, x: &[f64]) -> f64 {
        let net = model.network().unwrap();
        let amb = model.ambient();
        x.iter()
            .zip(&net.g_amb)
            .map(|(t, g)| g * (t - amb))
            .sum()
    }

    #[test]
    fn layout_sizes() {
        let m = model(&config(2, 4), two_blocks());
        assert_eq!(m.n_cells(), 24);
        assert_eq!(m.total_blocks(), 6);
        assert_eq!(m.extra_nodes(), EXTRA);
        assert_eq!(m.temp_len(), 18);
        assert_eq!(m.power_units(), 2);
        assert_eq!(m.layer_base(2), 4);
        let names = m.node_names();
        assert_eq!(names.len(), m.temp_len());
        assert_eq!(names[3], "layer_1_right");
        assert_eq!(names[6], "spreader_west");
        assert_eq!(names[17], "sink_south");
    }

    #[test]
    fn blocks_own_cells_under_their_centers() {
        let m = model(&config(2, 4), two_blocks());
        let si = &m.layers()[0];
        assert_eq!(si.block_cells(0), &[0, 1, 4, 5]);
        assert_eq!(si.block_cells(1), &[2, 3, 6, 7]);
        assert_eq!(si.cell_block(3), Some(1));
    }

    #[test]
    fn tiny_block_takes_cell_under_its_center() {
        let flp: Floorplan = "big 0.01 0.01 0 0\ndot 0.0001 0.0001 0.0001 0.0001\n"
            .parse()
            .unwrap();
        let m = model(&config(4, 4), flp);
        // Bottom-left cell: row 3 (south), column 0.
        assert_eq!(m.layers()[0].block_cells(1), &[12]);
        assert_eq!(m.layers()[0].cell_block(12), Some(0));
    }

    #[test]
    fn spreader_must_be_wider_than_chip() {
        let flp: Floorplan = "huge 0.04 0.04 0 0\n".parse().unwrap();
        let cfg = config(1, 1);
        let err = GridModel::alloc(&cfg, vec![flp; 3]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidGeometry { .. }));
    }

    #[test]
    fn compute_requires_population() {
        let cfg = config(1, 1);
        let m = GridModel::alloc(&cfg, vec![two_blocks(); 3]).unwrap();
        let mut state = m.alloc_state();
        let err = m
            .compute_temp(&mut state, &[0.0; 6], true, None, 1e-6)
            .unwrap_err();
        assert!(matches!(err, ModelError::NotPopulated { .. }));
    }

    #[test]
    fn wrong_power_length_is_rejected() {
        let m = model(&config(1, 2), two_blocks());
        let mut state = m.alloc_state();
        let err = m
            .compute_temp(&mut state, &[0.0; 2], false, None, 1e-6)
            .unwrap_err();
        assert!(matches!(err, ModelError::Core(_)));
    }

    #[test]
    fn ambient_is_an_equilibrium() {
        let m = model(&config(2, 2), two_blocks());
        let mut state = m.alloc_state();
        m.set_temp(&mut state, m.ambient());
        m.compute_temp(&mut state, &[0.0; 6], true, None, 1e-3).unwrap();
        for t in &state.last_temp {
            assert!((t - m.ambient()).abs() < 1e-9);
        }
    }

    #[test]
    fn powered_block_heats_up_first() {
        let m = model(&config(2, 2), two_blocks());
        let mut state = m.alloc_state();
        m.set_temp(&mut state, 330.0);
        let power = [10.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        m.compute_temp(&mut state, &power, true, None, 1e-4).unwrap();
        assert!(state.last_temp[0] > 330.0);
        assert!(state.last_temp[0] > state.last_temp[1]);
        assert_eq!(state.last_trans.len(), m.trans_len());
    }

    #[test]
    fn first_step_seeds_cells_from_blocks() {
        let m = model(&config(2, 2), two_blocks());
        let mut state = m.alloc_state();
        m.set_temp(&mut state, 0.0);
        state.last_temp.fill(340.0);
        state.last_temp[0] = 350.0;
        m.compute_temp(&mut state, &[0.0; 6], true, None, 1e-12).unwrap();
        assert!((state.last_trans[0] - 350.0).abs() < 1e-3);
        assert!((state.last_trans[1] - 340.0).abs() < 1e-3);
        assert!((state.last_trans[m.n_cells()] - 340.0).abs() < 1e-3);
    }

    #[test]
    fn steady_state_balances_energy() {
        let m = model(&config(2, 2), two_blocks());
        let power = [6.0, 4.0, 0.0, 0.0, 0.0, 0.0];
        let steady = m.steady_state_temp(&power).unwrap();
        assert_eq!(steady.field.len(), m.n_cells());
        let mut x = steady.field.clone();
        x.extend_from_slice(&steady.temps[m.total_blocks()..]);
        let out = heat_to_ambient(&m, &x);
        assert!((out - 10.0).abs() < 0.1, "heat out {out}");
        // 10 W through 0.1 K/W lifts the sink about 1 K.
        let sink = m.sink_temp(&steady.temps);
        assert!((sink - m.ambient() - 1.0).abs() < 0.2, "sink {sink}");
        assert!(steady.temps[0] > steady.temps[1]);
    }

    #[test]
    fn secondary_path_carries_part_of_the_heat() {
        let mut cfg = config(2, 2);
        cfg.package.model_secondary = true;
        let m = model(&cfg, two_blocks());
        assert_eq!(m.extra_nodes(), EXTRA + EXTRA_SEC);
        assert_eq!(m.node_names().last().map(String::as_str), Some("pcb_south"));
        let steady = m.steady_state_temp(&[5.0, 5.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let pcb = m.total_blocks() + node::PCB;
        assert!(steady.temps[pcb] > m.ambient());
    }

    #[test]
    fn leakage_adds_power() {
        let mut cfg = config(1, 2);
        cfg.leakage.enabled = true;
        cfg.leakage.mode = LeakageMode::Linear;
        cfg.leakage.alpha = 1e4;
        cfg.leakage.tbase = hs_core::k(300.0);
        let m = model(&cfg, two_blocks());
        let mut state = m.alloc_state();
        m.set_temp(&mut state, 330.0);
        let power = [1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let mut with_leak = [0.0; 6];
        m.compute_temp(&mut state, &power, true, Some(&mut with_leak), 1e-4)
            .unwrap();
        // 5e-5 m^2 * 1e4 W/m^2/K * ~30 K
        assert!((with_leak[0] - 1.0 - 15.0).abs() < 0.5, "{with_leak:?}");
        assert_eq!(with_leak[2], 0.0);
    }

    #[test]
    fn natural_convection_updates_r_convec() {
        let mut cfg = config(1, 1);
        cfg.package.natural_convection = true;
        let mut m = model(&cfg, two_blocks());
        let at_ambient = m.r_convec();
        assert!(m.package_model(m.ambient() + 40.0));
        assert!(m.r_convec() < at_ambient);
    }

    #[test]
    fn steady_state_with_natural_convection_resistance() {
        let mut cfg = config(2, 2);
        cfg.package.natural_convection = true;
        let m = model(&cfg, two_blocks());
        assert!(m.r_convec() > 100.0);
        let power = [0.1, 0.1, 0.0, 0.0, 0.0, 0.0];
        let steady = m.steady_state_temp(&power).unwrap();
        let mut x = steady.field.clone();
        x.extend_from_slice(&steady.temps[m.total_blocks()..]);
        let out = heat_to_ambient(&m, &x);
        assert!((out - 0.2).abs() < 1e-6, "heat out {out}");
        let rise = m.sink_temp(&steady.temps) - m.ambient();
        assert!((rise / (0.2 * m.r_convec()) - 1.0).abs() < 0.05, "sink rise {rise}");
    }

    #[test]
    fn sink_temp_of_uniform_field() {
        let m = model(&config(2, 2), two_blocks());
        let temps = vec![321.0; m.temp_len()];
        assert!((m.sink_temp(&temps) - 321.0).abs() < 1e-9);
    }
}
