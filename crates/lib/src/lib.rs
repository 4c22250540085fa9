//! plumbops-lib: incremental task-artifact builds for plumbops.
//!
//! A playbook is an ordered list of tasks. Each task is compiled into its own
//! small executable (optionally cross-compiled), and a persisted build manifest
//! records the content hash of every artifact so unchanged tasks are skipped on
//! later runs:
//! - `identity`: stable task ids and target-qualified cache keys
//! - `manifest`: the persisted `build-manifest.json`
//! - `cache`: content-hash freshness checks for existing artifacts
//! - `unit`: generation of the per-task build unit
//! - `toolchain`: compiler invocation for a target platform
//! - `pipeline`: the orchestrator tying the above together
//!
//! The task modules themselves live in `plumbops-modules`, re-exported as
//! [`modules`].

pub mod cache;
pub mod consts;
pub mod deploy;
pub mod identity;
pub mod manifest;
pub mod out_lock;
pub mod pipeline;
pub mod platform;
pub mod playbook;
pub mod toolchain;
pub mod unit;
pub mod util;

pub use plumbops_modules as modules;
