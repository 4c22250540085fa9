//! Implementation of the deploy command: build, then run every artifact on
//! every inventory host.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use plumbops_lib::deploy::{DeployItem, OpenSshTransport, RemoteRun, RunOutcome, deploy, load_inventory};
use plumbops_lib::pipeline::BuildReport;
use plumbops_lib::playbook;

use super::build::{BuildArgs, print_summary, run_build};
use crate::output::{print_error, print_info, print_json, print_outcomes, print_warning, symbols};

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
  #[command(flatten)]
  pub build: BuildArgs,

  /// Inventory file listing the target hosts
  #[arg(short, long, default_value = "inventory.yaml")]
  pub inventory: PathBuf,

  /// How long to wait for each SSH connection, e.g. "10s"
  #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
  pub connect_timeout: Duration,
}

#[derive(Serialize)]
struct DeployOutput<'a> {
  build: &'a BuildReport,
  runs: &'a [RemoteRun],
}

pub fn cmd_deploy(args: &DeployArgs) -> Result<ExitCode> {
  let started = Instant::now();
  let inventory = load_inventory(&args.inventory)?;
  let config = args.build.config()?;
  let playbook = playbook::load(&config.playbook_path)?;

  let report = run_build(&config, Some(&playbook))?;
  if !args.build.json {
    print_outcomes(&report);
    print_summary(&report, started);
  }

  let items = DeployItem::from_report(&report, &playbook);
  if report.has_failures() && !args.build.json {
    print_warning("Tasks that failed to build are not deployed");
  }

  let transport = OpenSshTransport::new().with_connect_timeout(args.connect_timeout);
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let runs = rt.block_on(deploy(&inventory, &items, &transport));

  if args.build.json {
    print_json(&DeployOutput {
      build: &report,
      runs: &runs,
    })?;
  } else {
    println!();
    print_info(&format!(
      "Deployed {} artifact(s) to {} host(s)",
      items.len(),
      inventory.hosts.len()
    ));
    for run in &runs {
      print_run(run);
    }
  }

  let failed = runs.iter().any(RemoteRun::is_failed) || (args.build.strict && report.has_failures());
  Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_run(run: &RemoteRun) {
  match &run.outcome {
    RunOutcome::Reported { result } if result.failed => {
      print_error(&format!("{} {}: {}", run.host, run.cache_key, result.msg));
    }
    RunOutcome::Reported { result } => {
      let state = if result.changed { "changed" } else { "ok" };
      println!(
        "{} {} {} [{}]",
        symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
        run.host,
        run.cache_key,
        state.if_supports_color(Stream::Stdout, |s| s.yellow())
      );
    }
    RunOutcome::Error { error } => {
      print_error(&format!("{} {}: {}", run.host, run.cache_key, error));
    }
  }
}
