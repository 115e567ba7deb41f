//! The per-invocation control loop.

use std::fs::File;
use std::io::BufReader;

use hs_checkpoint::MappedCheckpoint;
use hs_core::{kelvin_of, seconds_of, timing::Timer};
use hs_model::{
    GridModel, MAX_SINK_TEMP, ModelError, NATURAL_CONVEC_TOL, OwnedState, SMALL_FOR_CONVEC,
    SteadyState, TransientState, dump_grid, dump_temp, load_floorplans, read_temp,
};
use hs_project::{SimConfig, to_pairs};
use hs_trace::{TraceMap, TraceReader, TraceWriter};
use tracing::{debug, error, info};

use crate::context::{Invocation, InvocationContext};
use crate::error::{AppError, AppResult};

/// Upper bound on package model rounds of the steady-state solve.
const NATURAL_CONVEC_MAX_ITER: usize = 100;

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Power trace lines simulated.
    pub lines: usize,
    /// Sum of the per-block average powers, W.
    pub total_power: f64,
    /// Block names in trace order.
    pub names: Vec<String>,
    /// Steady-state temperature of each trace column at the average power.
    pub steady: Vec<f64>,
    /// Convection resistance in effect at the end of the run, K/W.
    pub r_convec: f64,
}

/// Where the transient state lives for this invocation.
enum StateSlot {
    Owned(OwnedState),
    /// Checkpoint loaded by invocation `k`, which it advances to on flush.
    Mapped(MappedCheckpoint, u32),
}

impl StateSlot {
    fn state(&mut self) -> &mut dyn TransientState {
        match self {
            StateSlot::Owned(s) => s,
            StateSlot::Mapped(m, _) => m,
        }
    }
}

/// Read the floorplans and build a populated grid model for `config`.
pub fn build_model(config: &SimConfig) -> AppResult<GridModel> {
    let floorplans = load_floorplans(config)?;
    let mut model = GridModel::alloc(config, floorplans)?;
    model.populate_r_model();
    model.populate_c_model();
    for (l, layer) in model.layers().iter().enumerate() {
        debug!(
            layer = l,
            name = %layer.name,
            thickness_um = layer.thickness * 1e6,
            conductivity = layer.conductivity,
            vol_heat_capacity = layer.vol_heat_capacity,
            has_power = layer.has_power,
            "layer"
        );
    }
    Ok(model)
}

/// Fresh state for a standalone or first invocation.
fn initial_state(model: &GridModel) -> AppResult<OwnedState> {
    let mut state = model.alloc_state();
    let thermal = &model.config().thermal;
    match &thermal.init_file {
        Some(path) => {
            read_temp(model, state.last_temp_mut(), path, thermal.dtm_used)?;
            debug!(path = %path.display(), clipped = thermal.dtm_used, "initial temperatures from file");
        }
        None => model.set_temp(&mut state, kelvin_of(thermal.init_temp)),
    }
    Ok(state)
}

/// Steady-state temperatures at constant block powers. With natural
/// convection the package model is rerun until `r_convec` settles.
pub fn solve_steady(model: &mut GridModel, power: &[f64]) -> AppResult<SteadyState> {
    if !model.config().package.natural_convection {
        info!("Computing steady-state temperatures...");
        return Ok(model.steady_state_temp(power)?);
    }
    for iter in 0..NATURAL_CONVEC_MAX_ITER {
        let r_old = model.r_convec();
        let steady = model.steady_state_temp(power)?;
        let sink = model.sink_temp(&steady.temps) + SMALL_FOR_CONVEC;
        model.package_model(sink);
        model.populate_r_model();
        if sink > MAX_SINK_TEMP {
            return Err(ModelError::ThermalRunaway { sink_temp: sink }.into());
        }
        debug!(iter, sink, r_convec = model.r_convec(), "natural convection round");
        if (model.r_convec() - r_old).abs() < NATURAL_CONVEC_TOL {
            return Ok(steady);
        }
    }
    Err(ModelError::ConvergenceFailed {
        what: format!("natural convection after {NATURAL_CONVEC_MAX_ITER} rounds"),
    }
    .into())
}

/// Run one invocation of the simulator.
pub fn run_invocation(config: &SimConfig, ctx: &InvocationContext) -> AppResult<RunSummary> {
    ctx.check(config)?;
    let invocation = ctx.invocation;
    let transient = ctx.transient();
    let leakage = config.leakage.enabled;
    info!(
        trace_num = invocation.trace_num(),
        transient, leakage, "starting invocation"
    );
    for (name, value) in to_pairs(config).iter() {
        debug!("{name} = {value}");
    }

    let mut model = build_model(config)?;
    let natural = model.config().package.natural_convection;
    let dt = seconds_of(config.thermal.sampling_intvl);
    let ckpt_path = config.checkpoint.path.as_path();

    let pin = File::open(&ctx.power_trace).map_err(|e| AppError::io(&ctx.power_trace, e))?;
    let mut reader = TraceReader::new(BufReader::new(pin));
    let names = reader.read_names()?;
    let map = TraceMap::build(&names, model.layers())?;

    if !ctx.volts.is_empty() {
        if ctx.volts.len() != map.len() {
            return Err(AppError::VoltVector {
                text: format!("{:?}", ctx.volts),
                reason: format!("{} levels for {} trace columns", ctx.volts.len(), map.len()),
            });
        }
        let levels: Vec<f64> = ctx.volts.iter().map(|&v| f64::from(v) / 10.0).collect();
        let mut scale = vec![1.0; model.total_blocks()];
        map.scatter(&levels, &mut scale)?;
        model.set_supply_scale(scale)?;
    }

    let mut tout = ctx.temp_trace.as_deref().map(TraceWriter::append).transpose()?;
    let mut pout = match (&ctx.leakage_trace, transient && leakage) {
        (Some(path), true) => Some(TraceWriter::append(path)?),
        _ => None,
    };

    let mut slot = None;
    if transient {
        match invocation {
            Invocation::Sequence(k) if k > 0 => {
                let timer = Timer::start("checkpoint load");
                let mapped = hs_checkpoint::load(ckpt_path, &model, k - 1)?;
                timer.stop_and_print();
                info!(path = %ckpt_path.display(), index = k - 1, "resuming from checkpoint");
                slot = Some(StateSlot::Mapped(mapped, k));
            }
            _ => {
                debug!("Writing header of trace files");
                if let Some(w) = tout.as_mut() {
                    w.write_names(map.names())?;
                }
                if let Some(w) = pout.as_mut() {
                    w.write_names(map.names())?;
                }
                if invocation == Invocation::Sequence(0) {
                    hs_checkpoint::remove_stale(ckpt_path)?;
                }
                slot = Some(StateSlot::Owned(initial_state(&model)?));
            }
        }
    }

    let total_blocks = model.total_blocks();
    let mut power = vec![0.0; total_blocks];
    let mut power_with_leak = vec![0.0; total_blocks];
    let mut overall = vec![0.0; total_blocks];
    let mut lines = 0usize;

    let timer = Timer::start("simulate");
    while let Some(vals) = reader.read_vals()? {
        map.scatter(&vals, &mut power)?;

        if let Some(slot) = slot.as_mut() {
            let state = slot.state();
            if natural {
                let sink = model.sink_temp(state.last_temp());
                model.package_model(sink);
                model.populate_r_model();
            }

            let first = invocation.initializes() && lines == 0;
            let t = match invocation {
                Invocation::Standalone => lines as f64 * dt,
                Invocation::Sequence(k) => f64::from(k) * dt,
            };
            debug!("Computing temperatures for t = {t:e}...");
            let leak_out = leakage.then_some(power_with_leak.as_mut_slice());
            model.compute_temp(state, &power, first, leak_out, dt)?;

            if let Some(path) = &config.thermal.grid_transient_file {
                dump_grid(&model, &state.last_trans()[..model.n_cells()], path, true, Some(t + dt))?;
            }
            if let Some(w) = tout.as_mut() {
                w.write_vals(&map.gather(state.last_temp())?)?;
            }
            if let Some(w) = pout.as_mut() {
                w.write_vals(&map.gather(&power_with_leak)?)?;
            }
        }

        for &i in map.slots() {
            overall[i] += power[i];
        }
        lines += 1;
    }
    timer.stop_and_print();
    if lines == 0 {
        return Err(AppError::EmptyTrace);
    }
    for w in [tout.as_mut(), pout.as_mut()].into_iter().flatten() {
        w.flush()?;
    }

    for v in overall.iter_mut() {
        *v /= lines as f64;
    }
    let total_power: f64 = map.slots().iter().map(|&i| overall[i]).sum();
    info!(lines, total_power, "average power over the trace");

    // Commit the checkpoint only once the steady phase has succeeded.
    let steady = solve_steady(&mut model, &overall)?;
    if let Some(path) = &config.thermal.steady_file {
        dump_temp(&model, &steady.temps, path)?;
    }
    if let Some(path) = &config.thermal.grid_steady_file {
        dump_grid(&model, &steady.field, path, false, None)?;
    }

    let steady_out = map.gather(&steady.temps)?;

    match slot {
        Some(StateSlot::Owned(state)) if invocation == Invocation::Sequence(0) => {
            let timer = Timer::start("checkpoint create");
            hs_checkpoint::create(ckpt_path, &model, &state, 0)?;
            timer.stop_and_print();
            info!(path = %ckpt_path.display(), "created checkpoint");
        }
        Some(StateSlot::Mapped(mut mapped, index)) => {
            let timer = Timer::start("checkpoint flush");
            if let Err(e) = mapped.flush(index) {
                error!(error = %e, "failed to sync checkpoint");
            }
            timer.stop_and_print();
            mapped.release()?;
        }
        _ => {}
    }

    info!(trace_num = invocation.trace_num(), lines, "invocation complete");
    Ok(RunSummary {
        lines,
        total_power,
        names: map.names().to_vec(),
        steady: steady_out,
        r_convec: model.r_convec(),
    })
}
