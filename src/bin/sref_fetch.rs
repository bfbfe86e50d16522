use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use sref_fetch::app::{App, RunOptions, RunReport, TaskAction};
use sref_fetch::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use sref_fetch::domain::{BoundingBox, CleanupPolicy, InitTime};
use sref_fetch::error::{ErrorKind, SrefError};
use sref_fetch::nomads::NomadsHttpClient;
use sref_fetch::output::{JsonOutput, OutputMode, TracingSink};
use sref_fetch::plan::{FetchTask, plan};
use sref_fetch::wgrib2::{Converter, Wgrib2Converter};
use sref_fetch::workspace::Workspace;

#[derive(Parser)]
#[command(name = "sref-fetch")]
#[command(about = "Download SREF ensemble grib2 subsets from NOMADS and convert them to NetCDF")]
#[command(version)]
struct Cli {
    /// Print machine-readable JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// JSON config file (default: ./sref-fetch.json, then the user config dir).
    #[arg(long, global = true)]
    config: Option<String>,

    /// Forecast cycle as YYYYMMDDHH.
    #[arg(long, global = true)]
    init: Option<InitTime>,

    /// Subregion as left,right,top,bottom in decimal degrees.
    #[arg(long, global = true, allow_hyphen_values = true)]
    bbox: Option<BoundingBox>,

    /// Model cores, comma-separated.
    #[arg(long, global = true, value_delimiter = ',')]
    cores: Option<Vec<String>>,

    /// Perturbation members, comma-separated.
    #[arg(long, global = true, value_delimiter = ',')]
    perts: Option<Vec<String>>,

    #[arg(long, global = true)]
    cleanup: Option<CleanupPolicy>,

    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Path to the wgrib2 executable.
    #[arg(long, global = true)]
    converter: Option<PathBuf>,

    /// Directory files are written to (default: current directory).
    #[arg(long, global = true)]
    workdir: Option<Utf8PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List the planned downloads without touching any files")]
    Plan,
    #[command(about = "Clean up, then download and convert every missing member (default)")]
    Fetch(FetchArgs),
    #[command(about = "Remove this run's files according to the cleanup policy")]
    Clean,
    #[command(about = "Check that wgrib2 can be found")]
    Doctor,
}

#[derive(Args, Clone, Default)]
struct FetchArgs {
    /// Re-download members whose NetCDF file already exists.
    #[arg(long)]
    force: bool,

    /// Report what would be downloaded without doing it.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SrefError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SrefError) -> u8 {
    match error.kind() {
        ErrorKind::Planning | ErrorKind::Config => 2,
        ErrorKind::Transport | ErrorKind::Conversion | ErrorKind::Batch => 3,
        ErrorKind::Filesystem => 1,
    }
}

fn run() -> miette::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let resolved = resolve_config(&cli.run)?;
    if let Some(source) = &resolved.source {
        tracing::debug!("config loaded from {}", source.display());
    }
    let workspace = match &cli.run.workdir {
        Some(dir) => Workspace::new(dir.clone()),
        None => Workspace::current_dir()?,
    };
    let tasks = plan(&resolved.params)?;
    tracing::info!(
        "planned {} tasks for cycle {}",
        tasks.len(),
        resolved.params.init_time
    );

    match cli.command.unwrap_or(Commands::Fetch(FetchArgs::default())) {
        Commands::Plan => run_plan(&tasks, output_mode),
        Commands::Fetch(args) => run_fetch(args, &tasks, &resolved, workspace, output_mode),
        Commands::Clean => run_clean(&tasks, &resolved, workspace, output_mode),
        Commands::Doctor => run_doctor(&resolved),
    }
}

fn resolve_config(args: &RunArgs) -> Result<ResolvedConfig, SrefError> {
    let overrides = ConfigOverrides {
        init_time: args.init,
        bbox: args.bbox,
        cores: args.cores.clone(),
        perts: args.perts.clone(),
        cleanup: args.cleanup,
        base_url: args.base_url.clone(),
        converter: args.converter.clone(),
    };
    ConfigLoader::resolve(args.config.as_deref(), overrides)
}

fn build_converter(resolved: &ResolvedConfig) -> Wgrib2Converter {
    match &resolved.converter {
        Some(path) => Wgrib2Converter::with_program(path),
        None => Wgrib2Converter::locate(),
    }
}

fn run_plan(tasks: &[FetchTask], output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_plan(tasks).into_diagnostic(),
        OutputMode::Human => {
            for task in tasks {
                println!(
                    "{:<4} {:<4} {} -> {}",
                    task.core, task.pert, task.raw_filename, task.converted_filename
                );
                println!("     {}", task.url);
            }
            Ok(())
        }
    }
}

fn run_fetch(
    args: FetchArgs,
    tasks: &[FetchTask],
    resolved: &ResolvedConfig,
    workspace: Workspace,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let fetcher = NomadsHttpClient::with_timeout(Duration::from_secs(resolved.timeout_secs))?;
    let converter = build_converter(resolved);
    if !args.dry_run && !converter.is_available() {
        let name = converter
            .program()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "wgrib2".to_string());
        return Err(SrefError::MissingTool(name).into());
    }

    let app = App::new(workspace, fetcher, converter);
    let options = RunOptions {
        force: args.force,
        dry_run: args.dry_run,
    };
    let report = app.fetch(tasks, resolved.cleanup, options, &TracingSink)?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => print_fetch_summary(&report),
    }
    report.into_result()?;
    Ok(())
}

fn run_clean(
    tasks: &[FetchTask],
    resolved: &ResolvedConfig,
    workspace: Workspace,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let app = App::new(workspace, NopFetcher, build_converter(resolved));
    let result = app.clean(tasks, resolved.cleanup, &TracingSink)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_clean(&result).into_diagnostic(),
        OutputMode::Human => {
            println!("removed {} file(s) (policy: {})", result.removed.len(), result.policy);
            Ok(())
        }
    }
}

fn run_doctor(resolved: &ResolvedConfig) -> miette::Result<()> {
    let converter = build_converter(resolved);
    let Some(program) = converter.program().filter(|_| converter.is_available()) else {
        let name = converter
            .program()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "wgrib2".to_string());
        return Err(SrefError::MissingTool(name).into());
    };
    println!("wgrib2: {}", program.display());
    println!(
        "version: {}",
        converter.tool_info().version.as_deref().unwrap_or("unknown")
    );
    Ok(())
}

fn print_fetch_summary(report: &RunReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}SREF fetch summary{reset}");
    println!(
        "{green}downloaded: {}{reset}",
        report.count(TaskAction::Downloaded)
    );
    println!("{green}skipped: {}{reset}", report.count(TaskAction::Skipped));
    let planned = report.count(TaskAction::WouldDownload);
    if planned > 0 {
        println!("{yellow}would download: {planned}{reset}");
    }
    let failed_color = if report.is_success() { green } else { red };
    println!("{failed_color}failed: {}{reset}", report.failures.len());

    for failure in &report.failures {
        println!(
            "{red}  {} {} ({}): {}{reset}",
            failure.core, failure.pert, failure.stage, failure.message
        );
    }
}

struct NopFetcher;

impl sref_fetch::nomads::Fetcher for NopFetcher {
    fn fetch(&self, _url: &str, _destination: &std::path::Path) -> Result<(), SrefError> {
        Err(SrefError::Transport("fetcher not configured".to_string()))
    }
}
