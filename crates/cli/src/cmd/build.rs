//! Implementation of the build command.
//!
//! Both `plumbops build` and the standalone `plumbops-build` binary end up in
//! [`cmd_build`], so the two surfaces cannot drift apart.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::debug;

use plumbops_lib::consts::TARGET_DIR_NAME;
use plumbops_lib::pipeline::{BuildConfig, BuildReport, Pipeline};
use plumbops_lib::platform::BuildTarget;
use plumbops_lib::playbook::Playbook;
use plumbops_lib::toolchain::CargoToolchain;
use plumbops_lib::unit::RuntimeDep;

use crate::output::{format_duration, print_json, print_outcomes, print_stat, print_success, print_warning};

/// Where the playbook is and where its artifacts go.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
  /// Path to the playbook
  #[arg(long, default_value = "playbook.yaml")]
  pub playbook: PathBuf,

  /// Output directory for artifacts and the build manifest
  #[arg(long = "out", default_value = "./dist")]
  pub out_dir: PathBuf,

  /// Target platform as os/arch (default: this machine)
  #[arg(long)]
  pub target: Option<BuildTarget>,
}

impl ProjectArgs {
  pub fn config(&self) -> BuildConfig {
    let mut config = BuildConfig::new(&self.playbook, &self.out_dir);
    if let Some(target) = &self.target {
      config.target = target.clone();
    }
    config
  }
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
  #[command(flatten)]
  pub project: ProjectArgs,

  /// Rebuild every task even if its artifact is unchanged
  #[arg(short, long)]
  pub force: bool,

  /// Number of tasks compiled at once (default: number of CPUs)
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Time limit for compiling one task, e.g. "90s" or "5m"
  #[arg(long, value_parser = humantime::parse_duration)]
  pub timeout: Option<Duration>,

  /// Keep generated build units after a successful build
  #[arg(long)]
  pub keep_sources: bool,

  /// Exit non-zero when any task failed to build
  #[arg(long)]
  pub strict: bool,

  /// Local checkout of the plumbops-modules crate used by generated units
  #[arg(long, conflicts_with = "runtime_version")]
  pub runtime_path: Option<PathBuf>,

  /// Registry version of plumbops-modules used by generated units
  #[arg(long)]
  pub runtime_version: Option<String>,

  /// Print the build report as JSON
  #[arg(long)]
  pub json: bool,
}

impl BuildArgs {
  pub fn config(&self) -> Result<BuildConfig> {
    let mut config = self.project.config();
    config.force = self.force;
    config.keep_sources = self.keep_sources;
    config.task_timeout = self.timeout;

    if let Some(jobs) = self.jobs {
      if jobs == 0 {
        bail!("--jobs must be at least 1");
      }
      config.jobs = jobs;
    }

    if let Some(path) = &self.runtime_path {
      config.runtime = RuntimeDep::Path(dunce::canonicalize(path).unwrap_or_else(|_| path.clone()));
    } else if let Some(version) = &self.runtime_version {
      config.runtime = RuntimeDep::Version(version.clone());
    }

    Ok(config)
  }
}

/// Run the build pipeline and report per-task outcomes.
pub fn cmd_build(args: &BuildArgs) -> Result<ExitCode> {
  let config = args.config()?;
  debug!(?config, "resolved build configuration");
  let report = run_build(&config, None)?;
  report_build(&report, args.json, args.strict)
}

/// Build with the cargo toolchain. Uses `playbook` when given instead of
/// reading the configured file.
pub(crate) fn run_build(config: &BuildConfig, playbook: Option<&Playbook>) -> Result<BuildReport> {
  let toolchain = CargoToolchain::from_env(config.out_dir.join(TARGET_DIR_NAME));
  let pipeline = Pipeline::new(toolchain, config.clone());

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = match playbook {
    Some(playbook) => rt.block_on(pipeline.run(playbook)),
    None => rt.block_on(pipeline.run_from_config()),
  }
  .context("Build failed")?;

  Ok(report)
}

fn report_build(report: &BuildReport, json: bool, strict: bool) -> Result<ExitCode> {
  if json {
    print_json(report)?;
  } else {
    print_outcomes(report);
  }

  if report.has_failures() {
    if !json {
      print_warning(&format!("{} task(s) failed to build", report.failed()));
    }
    if strict {
      return Ok(ExitCode::FAILURE);
    }
  }

  Ok(ExitCode::SUCCESS)
}

/// Summary block after a build, used by commands that build as a first step.
pub(crate) fn print_summary(report: &BuildReport, started: Instant) {
  print_success("Build complete");
  print_stat("Built", &report.built().to_string());
  print_stat("Skipped", &report.skipped().to_string());
  print_stat("Failed", &report.failed().to_string());
  print_stat("Duration", &format_duration(started.elapsed()));
}
