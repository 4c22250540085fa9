//! Implementation of the prune command.
//!
//! Removes manifest entries and artifacts that the current playbook no
//! longer produces for the selected target. Builds never do this on their
//! own.

use anyhow::{Context, Result};
use clap::Args;

use plumbops_lib::pipeline::{PruneReport, prune};
use plumbops_lib::playbook;

use super::build::ProjectArgs;
use crate::output::{print_info, print_json, print_stat, print_success, symbols};
use crate::prompts::confirm;

#[derive(Debug, Clone, Args)]
pub struct PruneArgs {
  #[command(flatten)]
  pub project: ProjectArgs,

  /// Show what would be removed without removing it
  #[arg(long)]
  pub dry_run: bool,

  /// Do not ask for confirmation
  #[arg(short, long)]
  pub yes: bool,

  /// Print the result as JSON
  #[arg(long)]
  pub json: bool,
}

pub fn cmd_prune(args: &PruneArgs) -> Result<()> {
  let config = args.project.config();
  let playbook = playbook::load(&config.playbook_path)?;

  let preview = prune(&config, &playbook, true).context("Failed to inspect output directory")?;
  let report = if args.dry_run || preview.removed.is_empty() {
    PruneReport {
      dry_run: args.dry_run,
      ..preview
    }
  } else {
    let question = format!("Remove {} stale artifact(s)?", preview.removed.len());
    if !confirm(&question, args.yes)? {
      print_info("Aborted.");
      return Ok(());
    }
    prune(&config, &playbook, false).context("Prune failed")?
  };

  if args.json {
    return print_json(&report);
  }

  for key in &report.removed {
    println!("  {} {}", symbols::REMOVE, key);
  }
  if report.dry_run {
    print_info("Dry run - no changes made");
  } else if report.removed.is_empty() {
    print_info("Nothing to prune");
  } else {
    print_success("Prune complete");
  }
  print_stat("Removed", &report.removed.len().to_string());
  print_stat("Kept", &report.kept.to_string());

  Ok(())
}
