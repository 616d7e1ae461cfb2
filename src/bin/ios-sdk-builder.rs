use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ios_sdk_builder::config::{check_developer_dir, PROJECT_SUBDIR};
use ios_sdk_builder::plan::resolve::OUTDIR_USAGE;
use ios_sdk_builder::toolchain::{detect_developer_dir, DEVELOPER_DIR_ENV};
use ios_sdk_builder::version::{repo_root, GitDescribe};
use ios_sdk_builder::{
    preflight, BuildError, BuildReport, BuildRequest, Executor, FixedVersion, PlanSpec,
    PreprocessorFlags, RunConfig, SystemRunner, VersionOracle,
};

/// Build a multi-architecture static library SDK with xcodebuild and lipo.
#[derive(Parser)]
#[command(name = "ios-sdk-builder", version, about, long_about = None)]
struct Cli {
    /// Show toolchain output and debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Xcode developer directory, e.g. /Applications/Xcode6.2.app
    #[arg(long, global = true, value_name = "DIR")]
    developer_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the SDK
    Build(BuildArgs),
    /// Check that the required host tools are installed
    Preflight,
}

#[derive(Args)]
struct BuildArgs {
    /// Parent directory of the generated SDK
    #[arg(long, value_name = "DIR")]
    outdir: Option<PathBuf>,

    /// SDK for the archived device architectures
    #[arg(long, value_name = "SDK")]
    device_sdk: Option<String>,

    /// SDK for the individually built simulator architectures
    #[arg(long, value_name = "SDK")]
    simulator_sdk: Option<String>,

    /// Preprocessor override, repeatable
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE")]
    defines: Vec<String>,

    /// TOML file replacing the built-in targets and architectures
    #[arg(long, value_name = "FILE")]
    plan: Option<PathBuf>,

    /// Directory the toolchain runs in [default: <git toplevel>/OpenCV-iOS]
    #[arg(long, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Use this version instead of `git describe`
    #[arg(long, value_name = "TAG")]
    version_tag: Option<String>,

    /// Keep the temporary work directory
    #[arg(long)]
    keep_temp: bool,

    /// Write a JSON build report
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Library errors carry their own exit code; anything else is a plain failure.
fn exit_code(err: &anyhow::Error) -> u8 {
    let code = err
        .downcast_ref::<BuildError>()
        .map(BuildError::exit_code)
        .unwrap_or(1);
    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Preflight => {
            preflight::check_host_tools()?;
            println!("All required host tools found.");
            Ok(())
        }
        Commands::Build(args) => build(args, cli.verbose, cli.developer_dir.as_deref()),
    }
}

fn build(args: BuildArgs, verbose: bool, developer_dir: Option<&Path>) -> Result<()> {
    // Validate everything local before the first external invocation.
    if args.outdir.is_none() {
        return Err(BuildError::configuration(OUTDIR_USAGE).into());
    }
    let explicit_dir = explicit_developer_dir(developer_dir);
    if let Some(dir) = &explicit_dir {
        check_developer_dir(dir)?;
    }
    let mut defines = PreprocessorFlags::new();
    for assignment in &args.defines {
        defines.insert_assignment(assignment)?;
    }
    let spec = match &args.plan {
        Some(path) => PlanSpec::load(path)?,
        None => PlanSpec::default(),
    };

    let runner = SystemRunner::echoing(verbose);
    preflight::check_host_tools()?;

    let cwd = env::current_dir().context("resolving current directory")?;
    let (project_dir, repo) = match &args.project_dir {
        Some(dir) => (dir.clone(), dir.clone()),
        None => {
            let root = repo_root(&runner, &cwd)?;
            (root.join(PROJECT_SUBDIR), root)
        }
    };

    let config = RunConfig::new(project_dir)
        .verbose(verbose)
        .keep_temp(args.keep_temp);
    let config = match explicit_dir.or_else(|| detect_developer_dir(&runner)) {
        Some(dir) => config.with_developer_dir(&dir)?,
        None => {
            warn!("no developer directory found; xcrun will use its default");
            config
        }
    };

    let oracle: Box<dyn VersionOracle + '_> = match args.version_tag {
        Some(tag) => Box::new(FixedVersion(tag)),
        None => Box::new(GitDescribe::new(&runner, repo, true)),
    };

    let request = BuildRequest {
        output_dir: args.outdir,
        primary_sdk: args.device_sdk,
        secondary_sdk: args.simulator_sdk,
        defines,
    };

    let executor = Executor::new(config, &runner);
    let report = executor.build(&spec, &request, oracle.as_ref())?;

    print_summary(&report);
    if let Some(path) = &args.report {
        write_report(&report, path)?;
    }
    Ok(())
}

/// Explicit flag, then `DEVELOPER_DIR`. `xcode-select -p` is the fallback
/// once neither is set.
fn explicit_developer_dir(flag: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = flag {
        return Some(dir.to_path_buf());
    }
    env::var_os(DEVELOPER_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn print_summary(report: &BuildReport) {
    info!(path = %report.sdk_dir.display(), "SDK assembled");
    println!("SDK {} in {}", report.version, report.sdk_dir.display());
    for lib in &report.libraries {
        println!(
            "  {}  {} bytes  sha256:{}",
            lib.path.display(),
            lib.size,
            lib.sha256
        );
    }
    if let Some(work) = &report.work_dir {
        println!("  work directory kept at {}", work.display());
    }
}

fn write_report(report: &BuildReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing build report")?;
    fs::write(path, json + "\n")
        .with_context(|| format!("writing build report '{}'", path.display()))
}
