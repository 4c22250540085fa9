use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use plumbops_cli::cmd::{
  BuildArgs, DeployArgs, PruneArgs, StatusArgs, cmd_build, cmd_deploy, cmd_modules, cmd_prune, cmd_status,
};
use plumbops_cli::init_tracing;
use plumbops_cli::output::print_error;

/// plumbops - compile playbook tasks into standalone executables
#[derive(Parser)]
#[command(name = "plumbops")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build one artifact per playbook task, skipping unchanged ones
  Build(BuildArgs),

  /// Build, then run the artifacts on every inventory host
  Deploy(DeployArgs),

  /// Show which artifacts are up to date
  Status(StatusArgs),

  /// Remove artifacts the playbook no longer produces
  Prune(PruneArgs),

  /// List available task modules
  Modules {
    /// Print as JSON
    #[arg(long)]
    json: bool,
  },
}

fn run(cli: Cli) -> Result<ExitCode> {
  match cli.command {
    Commands::Build(args) => cmd_build(&args),
    Commands::Deploy(args) => cmd_deploy(&args),
    Commands::Status(args) => cmd_status(&args).map(|_| ExitCode::SUCCESS),
    Commands::Prune(args) => cmd_prune(&args).map(|_| ExitCode::SUCCESS),
    Commands::Modules { json } => cmd_modules(json).map(|_| ExitCode::SUCCESS),
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(cli) {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
