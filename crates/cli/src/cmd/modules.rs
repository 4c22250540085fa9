use anyhow::Result;

use plumbops_lib::modules;

use crate::output::{print_json, symbols};

/// List the modules tasks can use.
pub fn cmd_modules(json: bool) -> Result<()> {
  let names = modules::names();
  if json {
    return print_json(&names);
  }
  for name in names {
    println!("  {} {}", symbols::INFO, name);
  }
  Ok(())
}
