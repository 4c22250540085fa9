//! Status command implementation.
//!
//! Shows, per playbook task, whether its artifact in the output directory is
//! still current. Never builds anything.

use anyhow::Result;
use clap::Args;
use owo_colors::{OwoColorize, Stream};

use plumbops_lib::pipeline::status;
use plumbops_lib::playbook;

use super::build::ProjectArgs;
use crate::output::{print_info, print_json, print_stat, symbols};

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
  #[command(flatten)]
  pub project: ProjectArgs,

  /// Print status as JSON
  #[arg(long)]
  pub json: bool,
}

pub fn cmd_status(args: &StatusArgs) -> Result<()> {
  let config = args.project.config();
  let playbook = playbook::load(&config.playbook_path)?;
  let rows = status(&config, &playbook)?;

  if args.json {
    return print_json(&rows);
  }

  if rows.is_empty() {
    print_info("Playbook has no tasks.");
    return Ok(());
  }

  let out_dir = dunce::canonicalize(&config.out_dir).unwrap_or_else(|_| config.out_dir.clone());
  print_stat("Output", &out_dir.display().to_string());
  print_stat("Target", &config.target.pair());
  println!();

  for row in &rows {
    let symbol = if row.fresh {
      symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()).to_string()
    } else {
      symbols::INFO.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string()
    };
    let built = row
      .built_at
      .as_deref()
      .map(|t| format!(", built {}", t))
      .unwrap_or_default();
    println!(
      "  {} {} {}",
      symbol,
      row.cache_key,
      format!("({}{})", row.detail, built).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }

  let stale = rows.iter().filter(|r| !r.fresh).count();
  println!();
  print_stat("Up to date", &(rows.len() - stale).to_string());
  print_stat("Needs build", &stale.to_string());

  Ok(())
}
