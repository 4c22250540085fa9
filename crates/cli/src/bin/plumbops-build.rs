use std::process::ExitCode;

use clap::Parser;

use plumbops_cli::cmd::{BuildArgs, cmd_build};
use plumbops_cli::init_tracing;
use plumbops_cli::output::print_error;

/// Build one executable per playbook task, skipping unchanged ones
#[derive(Parser)]
#[command(name = "plumbops-build")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,

  #[command(flatten)]
  build: BuildArgs,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match cmd_build(&cli.build) {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
