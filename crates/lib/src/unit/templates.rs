//! Template content for generated build units.
//!
//! Placeholders in `{braces}` are substituted by the generator.

/// Cargo manifest of a task unit.
///
/// The empty `[workspace]` table keeps cargo from attaching the unit to an
/// enclosing workspace when the output directory lives inside one.
pub const CARGO_TOML_TEMPLATE: &str = r#"[package]
name = "{package}"
version = "0.0.0"
edition = "2024"
publish = false

[[bin]]
name = "{package}"
path = "src/main.rs"

[dependencies]
plumbops-modules = {runtime}

[profile.release]
strip = true
debug = false
opt-level = "z"
lto = true
codegen-units = 1
panic = "abort"

[workspace]
"#;

/// Entry point of a task unit. The module type is referenced statically.
pub const MAIN_RS_TEMPLATE: &str = r#"// Generated by plumbops for task {task_name}. Do not edit.

use std::process::ExitCode;

const PARAMS: &str = include_str!("../{params_file}");

fn main() -> ExitCode {
  plumbops_modules::entrypoint(&{module_type}, PARAMS)
}
"#;
