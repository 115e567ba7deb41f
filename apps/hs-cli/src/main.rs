use clap::{Parser, Subcommand};
use hs_app::{AppResult, Invocation, InvocationContext, parse_volt_vector, run_invocation};
use hs_project::{ConfigError, NameValueTable, apply_overrides, load_yaml, save_yaml, validate_config};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hotstep")]
#[command(about = "hotstep - trace-driven grid thermal simulator", long_about = None)]
struct Cli {
    /// Print phase timings to stderr
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a power trace
    Run(RunArgs),
    /// Show the header of a checkpoint file
    Inspect {
        /// Path to the checkpoint file
        checkpoint: PathBuf,
        /// Print the header as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to the configuration YAML file
    #[arg(short, long)]
    config: PathBuf,
    /// Input power trace
    #[arg(short, long)]
    power_trace: PathBuf,
    /// Output temperature trace; enables transient simulation
    #[arg(short, long)]
    temp_trace: Option<PathBuf>,
    /// Output trace of total power including leakage
    #[arg(long)]
    leakage_trace: Option<PathBuf>,
    /// -1 for a standalone run, k >= 0 for invocation k of a sequence
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    trace_num: i64,
    /// Supply voltage per trace column, e.g. 1.2,0.9
    #[arg(long)]
    volt_vector: Option<String>,
    /// Override a configuration parameter (name=value), repeatable
    #[arg(long = "set", value_name = "NAME=VALUE")]
    overrides: Vec<String>,
    /// Write the effective configuration to this file
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.timing {
        hs_core::timing::enable_timing();
    }

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Inspect { checkpoint, json } => cmd_inspect(&checkpoint, json),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(args: RunArgs) -> AppResult<()> {
    let mut config = load_yaml(&args.config)?;
    let table = NameValueTable::from_assignments(&args.overrides)?;
    apply_overrides(&mut config, &table)?;
    validate_config(&config).map_err(ConfigError::from)?;
    if let Some(path) = &args.dump_config {
        save_yaml(path, &config)?;
    }

    let mut ctx = InvocationContext::new(Invocation::from_trace_num(args.trace_num)?, args.power_trace);
    ctx.temp_trace = args.temp_trace;
    ctx.leakage_trace = args.leakage_trace;
    if let Some(text) = &args.volt_vector {
        ctx.volts = parse_volt_vector(text)?;
    }

    let summary = run_invocation(&config, &ctx)?;
    println!("Unit\tSteady(Kelvin)");
    for (name, t) in summary.names.iter().zip(&summary.steady) {
        println!("{name}\t{t:.2}");
    }
    Ok(())
}

fn cmd_inspect(path: &Path, json: bool) -> AppResult<()> {
    let header = hs_checkpoint::inspect(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&header)?);
    } else {
        println!("Checkpoint: {}", path.display());
        println!("  magic:      {:#010x}", header.magic);
        println!("  last index: {}", header.last_index);
        println!("  grid:       {} x {} x {}", header.layers, header.rows, header.cols);
        println!("  extra:      {}", header.extra);
    }
    Ok(())
}
