//! Command-line surfaces for plumbops.
//!
//! The `plumbops` binary exposes every command; `plumbops-build` is the flat
//! single-purpose builder. Both share the commands defined here.

pub mod cmd;
pub mod output;
mod prompts;

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}
