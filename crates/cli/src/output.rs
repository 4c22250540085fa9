//! Terminal output for plumbops commands.
//!
//! Status lines carry a colored symbol when the stream supports color. Machine
//! readable output goes through [`print_json`].

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use plumbops_lib::pipeline::{BuildReport, TaskOutcome, TaskState};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const SKIP: &str = "=";
  pub const REMOVE: &str = "-";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// The per-task line for a build outcome.
pub fn outcome_line(outcome: &TaskOutcome) -> String {
  match &outcome.state {
    TaskState::Skipped => format!("Skipping {} (unchanged)", outcome.cache_key),
    TaskState::Built { .. } => format!("Built {}", outcome.cache_key),
    TaskState::Failed { error } => format!("Failed {}: {}", outcome.cache_key, error),
  }
}

/// Print one line per task in playbook order.
///
/// On a terminal lines get a symbol and the artifact digest; otherwise they
/// are exactly [`outcome_line`], so scripts can match them.
pub fn print_outcomes(report: &BuildReport) {
  let decorate = std::io::stdout().is_terminal();
  for outcome in &report.outcomes {
    match &outcome.state {
      TaskState::Failed { .. } if decorate => print_error(&outcome_line(outcome)),
      TaskState::Failed { .. } => eprintln!("{}", outcome_line(outcome)),
      _ => println!("{}", display_outcome(outcome, decorate)),
    }
  }
}

/// Stdout line for a skipped or built task.
fn display_outcome(outcome: &TaskOutcome, decorate: bool) -> String {
  let line = outcome_line(outcome);
  if !decorate {
    return line;
  }
  match &outcome.state {
    TaskState::Skipped => format!(
      "{} {}",
      symbols::SKIP.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      line
    ),
    TaskState::Built { sha256 } => format!(
      "{} {} {}",
      symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
      line,
      format!("({})", truncate_hash(&sha256.0)).if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
    TaskState::Failed { .. } => line,
  }
}
