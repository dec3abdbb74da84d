//! roms-drift command-line interface.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roms_drift::config::SimulationConfig;
use roms_drift::particle::Mortality;
use roms_drift::simulation::SimulationResult;
use roms_drift::time::Calendar;

/// Lagrangian particle tracking on ROMS output.
#[derive(Parser)]
#[command(name = "roms-drift")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lagrangian particle tracking on ROMS ocean model output", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation on ROMS NetCDF files (needs a build with `--features netcdf`)
    Run(RunArgs),
    /// Parse and validate a configuration file
    Check(CheckArgs),
    /// Convert a date into seconds since 1900-01-01, or seconds into a date
    ConvertDate(ConvertArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Configuration file
    config: PathBuf,

    /// Output directory, overriding the configuration
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Random seed, overriding the configuration
    #[arg(short, long)]
    seed: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args)]
struct CheckArgs {
    /// Configuration file
    config: PathBuf,
}

#[derive(Args)]
struct ConvertArgs {
    /// `"year YYYY month MM day DD at HH:mm"` or a number of seconds
    value: String,

    #[arg(short, long, default_value = "gregorian")]
    calendar: Calendar,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            init_tracing(args.verbose);
            run(args)
        }
        Commands::Check(args) => {
            init_tracing(false);
            check(&args.config)
        }
        Commands::ConvertDate(args) => convert_date(&args),
    }
}

fn load(path: &Path) -> Result<SimulationConfig> {
    SimulationConfig::load(path).with_context(|| format!("Invalid configuration {}", path.display()))
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = load(&args.config)?;
    if let Some(output) = args.output {
        config.output.output_path = output;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.dataset.validate().context("Invalid dataset section")?;

    let result = run_netcdf(config)?;
    report(&result);
    if !result.success {
        bail!("Simulation failed: {}", result.error.unwrap_or_default());
    }
    Ok(())
}

#[cfg(feature = "netcdf")]
fn run_netcdf(config: SimulationConfig) -> Result<SimulationResult> {
    use roms_drift::io::RomsNetcdfSource;
    use roms_drift::simulation::Simulation;

    let ds = &config.dataset;
    let source = RomsNetcdfSource::open(ds.files.clone(), ds.grid_file.clone(), ds.variables.clone(), ds.three_d)
        .context("Cannot open the ROMS dataset")?;
    let mut sim = Simulation::new(config, source).context("Cannot set up the simulation")?;
    Ok(sim.run())
}

#[cfg(not(feature = "netcdf"))]
fn run_netcdf(_config: SimulationConfig) -> Result<SimulationResult> {
    Err(roms_drift::io::NetCDFError::FeatureDisabled)
        .context("Cannot open the ROMS dataset: rebuild roms-drift with `--features netcdf`")
}

fn report(result: &SimulationResult) {
    info!(
        steps = result.n_steps,
        released = result.n_released,
        alive = result.n_alive,
        wall_time = %format!("{:.2}s", result.wall_time),
        "Run finished"
    );
    for cause in Mortality::ALL {
        let n = result.count(cause);
        if n > 0 {
            info!(cause = cause.name(), particles = n, "Mortality");
        }
    }
    if let Some(path) = &result.output_path {
        info!(path = %path.display(), records = result.n_records, "Trajectories written");
    }
}

fn check(path: &Path) -> Result<()> {
    let config = load(path)?;
    if let Err(e) = config.dataset.validate() {
        warn!(error = %e, "Dataset section not usable");
    }
    let clock = config.time.time_manager()?;
    info!(
        id = %config.id,
        start = %clock.calendar().iso_string(clock.t0()),
        dt = clock.dt(),
        steps = clock.n_steps(),
        release = config.release.name(),
        output = %config.output.file_path(&config.id).display(),
        "Configuration is valid"
    );
    Ok(())
}

fn convert_date(args: &ConvertArgs) -> Result<()> {
    match args.value.trim().parse::<f64>() {
        Ok(seconds) => {
            let date = args
                .calendar
                .format_date(seconds)
                .with_context(|| format!("Cannot convert {seconds} s"))?;
            println!("{date}");
        }
        Err(_) => {
            let seconds = args
                .calendar
                .parse_date(&args.value)
                .with_context(|| format!("Cannot convert {:?}", args.value))?;
            println!("{seconds}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_help_names_netcdf_feature() {
        let mut cmd = Cli::command();
        let run = cmd.find_subcommand_mut("run").unwrap();
        let help = run.render_help().to_string();
        assert!(help.contains("--features netcdf"), "{help}");
    }

    #[cfg(not(feature = "netcdf"))]
    #[test]
    fn test_run_without_netcdf_feature() {
        let err = run_netcdf(SimulationConfig::default()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("--features netcdf"), "{message}");
        assert!(message.contains("NetCDF feature not enabled"), "{message}");
    }
}
