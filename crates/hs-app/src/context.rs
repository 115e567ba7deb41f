//! Per-invocation inputs.

use std::path::PathBuf;

use hs_project::SimConfig;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Position of this process in a sequence of invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Simulate the whole trace; nothing persists.
    Standalone,
    /// Invocation `k` of an incremental sequence. `0` creates the
    /// checkpoint, later ones consume and advance it.
    Sequence(u32),
}

impl Invocation {
    pub fn from_trace_num(trace_num: i64) -> AppResult<Self> {
        match trace_num {
            -1 => Ok(Invocation::Standalone),
            n => u32::try_from(n)
                .map(Invocation::Sequence)
                .map_err(|_| AppError::InvalidInvocation { trace_num }),
        }
    }

    pub fn trace_num(&self) -> i64 {
        match self {
            Invocation::Standalone => -1,
            Invocation::Sequence(k) => i64::from(*k),
        }
    }

    /// Standalone runs and the first of a sequence initialize the model.
    pub fn initializes(&self) -> bool {
        self.trace_num() <= 0
    }
}

#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub invocation: Invocation,
    pub power_trace: PathBuf,
    /// Transient simulation runs only when a temperature trace is given.
    pub temp_trace: Option<PathBuf>,
    /// Total power including leakage, per step.
    pub leakage_trace: Option<PathBuf>,
    /// Supply level per trace column, encoded `10 * volts`.
    pub volts: Vec<u32>,
}

impl InvocationContext {
    pub fn new(invocation: Invocation, power_trace: impl Into<PathBuf>) -> Self {
        Self {
            invocation,
            power_trace: power_trace.into(),
            temp_trace: None,
            leakage_trace: None,
            volts: Vec::new(),
        }
    }

    pub fn transient(&self) -> bool {
        self.temp_trace.is_some()
    }

    /// Reject settings that contradict each other and warn about the ones
    /// this invocation ignores.
    pub fn check(&self, config: &SimConfig) -> AppResult<()> {
        if let Invocation::Sequence(_) = self.invocation
            && !self.transient()
        {
            return Err(AppError::contradiction(
                "incremental invocations (trace_num >= 0) need a temperature trace output",
            ));
        }
        if config.leakage.enabled && self.transient() && self.leakage_trace.is_none() {
            return Err(AppError::contradiction(
                "leakage loop enabled but no leakage power trace output given",
            ));
        }
        if !config.leakage.enabled && self.leakage_trace.is_some() {
            warn!("Ignoring leakage trace output because the leakage loop is off");
        }
        if !self.invocation.initializes() && config.thermal.init_file.is_some() {
            warn!("Ignoring init_file for a continuing invocation");
        }
        Ok(())
    }
}

/// Parse a comma separated list of `x.y` supply voltages into levels
/// `10 * x + y`.
pub fn parse_volt_vector(text: &str) -> AppResult<Vec<u32>> {
    let bad = |reason: &str| AppError::VoltVector {
        text: text.to_string(),
        reason: reason.to_string(),
    };
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|item| {
            let (whole, tenth) = item
                .trim()
                .split_once('.')
                .ok_or_else(|| bad("expected x.y entries"))?;
            match (whole.parse::<u32>(), tenth.parse::<u32>()) {
                (Ok(x), Ok(y)) if whole.len() == 1 && tenth.len() == 1 => Ok(10 * x + y),
                _ => Err(bad("each entry needs one digit before and after the point")),
            }
        })
        .collect()
}
