//! Build manifest.
//!
//! The manifest is the only persisted state of the build pipeline: one JSON
//! object in the output directory mapping each cache key to the hash and
//! provenance of the artifact last built for it.
//!
//! # Storage Layout
//!
//! ```text
//! {out_dir}/
//! ├── build-manifest.json   # BuildManifest
//! └── <cache_key>           # Artifacts named by cache key
//! ```

mod store;
mod types;

pub use store::*;
pub use types::*;
