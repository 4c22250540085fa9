/// Application name, used for lock metadata and generated package names.
pub const APP_NAME: &str = "plumbops";

/// Manifest file name at the root of the output directory.
pub const MANIFEST_FILENAME: &str = "build-manifest.json";

/// Advisory lock file guarding an output directory.
pub const LOCK_FILENAME: &str = ".plumbops.lock";

/// Cargo target directories inside the output directory, one per worker slot.
pub const TARGET_DIR_NAME: &str = ".target";

/// Directory inside the output directory holding generated build units.
pub const UNITS_DIR_NAME: &str = ".units";

/// Serialized parameter payload inside a generated build unit.
pub const PARAMS_FILENAME: &str = "params.json";

/// Prefix for generated package names (crate names may not start with a digit).
pub const UNIT_PACKAGE_PREFIX: &str = "task-";

/// Overrides the cargo executable used by the toolchain invoker.
pub const CARGO_ENV: &str = "PLUMBOPS_CARGO";

/// Remote directory artifacts are uploaded to before execution.
pub const REMOTE_STAGING_DIR: &str = "/tmp";
