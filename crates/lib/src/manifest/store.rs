use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::BuildManifest;
use crate::consts::MANIFEST_FILENAME;

/// Errors persisting the manifest.
///
/// Loading never fails; only writes can.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to serialize manifest: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write manifest {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Manifest file inside an output directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
  path: PathBuf,
}

impl ManifestStore {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  /// The store for `build-manifest.json` at the root of `out_dir`.
  pub fn in_dir(out_dir: &Path) -> Self {
    Self::new(out_dir.join(MANIFEST_FILENAME))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Load the manifest.
  ///
  /// A missing, unreadable or malformed file yields an empty manifest: the
  /// worst outcome is a full rebuild.
  pub fn load(&self) -> BuildManifest {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "no manifest yet, starting empty");
        return BuildManifest::new();
      }
      Err(e) => {
        warn!(path = %self.path.display(), error = %e, "cannot read manifest, starting empty");
        return BuildManifest::new();
      }
    };

    match serde_json::from_str::<BuildManifest>(&content) {
      Ok(manifest) => {
        debug!(path = %self.path.display(), entries = manifest.len(), "loaded manifest");
        manifest
      }
      Err(e) => {
        warn!(path = %self.path.display(), error = %e, "malformed manifest, starting empty");
        BuildManifest::new()
      }
    }
  }

  /// Persist the manifest.
  ///
  /// Writes to a temporary file in the same directory and renames it over the
  /// destination, so readers only ever observe a complete document.
  pub fn save(&self, manifest: &BuildManifest) -> Result<(), ManifestError> {
    let mut content = serde_json::to_string_pretty(manifest).map_err(ManifestError::Serialize)?;
    content.push('\n');

    let dir = match self.path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
      _ => PathBuf::from("."),
    };
    let write_err = |source: io::Error| ManifestError::Write {
      path: self.path.clone(),
      source,
    };

    let mut temp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(&self.path).map_err(|e| write_err(e.error))?;

    debug!(path = %self.path.display(), entries = manifest.len(), "saved manifest");
    Ok(())
  }
}
