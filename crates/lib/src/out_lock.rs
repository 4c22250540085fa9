//! Advisory locking of an output directory.
//!
//! `build` and `prune` rewrite the manifest and artifacts, so they hold the
//! lock exclusively for the whole run. `status` only reads and shares it. A
//! second writer on the same directory fails fast and is told which run is in
//! the way.
//!
//! The exclusive holder describes itself in `.plumbops.lock`; the file is
//! emptied again on release so a later contention never reports a run that
//! has already finished.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::LOCK_FILENAME;
use crate::platform::BuildTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

/// The run holding an exclusive lock, as recorded in the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockHolder {
  pub pid: u32,
  /// Subcommand, e.g. `build` or `prune`.
  pub command: String,
  pub playbook: PathBuf,
  /// `os/arch` the run works on.
  pub target: String,
  /// RFC 3339 UTC timestamp.
  pub started_at: String,
}

impl LockHolder {
  /// Describe a run of `command` in this process, starting now.
  pub fn current(command: &str, playbook: &Path, target: &BuildTarget) -> Self {
    Self {
      pid: std::process::id(),
      command: command.to_string(),
      playbook: playbook.to_path_buf(),
      target: target.pair(),
      started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
  }
}

#[derive(Debug, Error)]
pub enum OutDirLockError {
  #[error(
    "{} is in use by `plumbops {}` on {} for {} (pid {}, since {})",
    out_dir.display(),
    holder.command,
    holder.playbook.display(),
    holder.target,
    holder.pid,
    holder.started_at
  )]
  Busy { out_dir: PathBuf, holder: LockHolder },

  #[error(
    "{} is in use by another plumbops process; if none is running, delete {}",
    out_dir.display(),
    lock_path.display()
  )]
  BusyUnknown { out_dir: PathBuf, lock_path: PathBuf },

  #[error("failed to open lock file {}: {source}", path.display())]
  Open {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to lock {}: {source}", path.display())]
  Lock {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to record lock holder in {}: {source}", path.display())]
  Record {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A held lock on an output directory; released when dropped.
#[derive(Debug)]
pub struct OutDirLock {
  file: File,
  mode: LockMode,
  lock_path: PathBuf,
}

impl OutDirLock {
  /// Lock the existing directory `out_dir`. Never blocks.
  ///
  /// An exclusive lock records `holder` in the lock file; a shared lock
  /// leaves the file alone.
  pub fn acquire(out_dir: &Path, mode: LockMode, holder: &LockHolder) -> Result<Self, OutDirLockError> {
    let lock_path = out_dir.join(LOCK_FILENAME);

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(|source| OutDirLockError::Open {
        path: lock_path.clone(),
        source,
      })?;

    match try_lock(&file, mode) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
        return Err(match read_holder(&lock_path) {
          Some(holder) => OutDirLockError::Busy {
            out_dir: out_dir.to_path_buf(),
            holder,
          },
          None => OutDirLockError::BusyUnknown {
            out_dir: out_dir.to_path_buf(),
            lock_path,
          },
        });
      }
      Err(source) => return Err(OutDirLockError::Lock { path: lock_path, source }),
    }

    if mode == LockMode::Exclusive {
      record_holder(&file, holder).map_err(|source| OutDirLockError::Record {
        path: lock_path.clone(),
        source,
      })?;
    }

    debug!(path = %lock_path.display(), ?mode, command = %holder.command, "output directory locked");
    Ok(Self { file, mode, lock_path })
  }

  pub fn mode(&self) -> LockMode {
    self.mode
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

impl Drop for OutDirLock {
  fn drop(&mut self) {
    // The OS lock goes away with the handle; only the holder record needs clearing.
    if self.mode == LockMode::Exclusive
      && let Err(e) = self.file.set_len(0)
    {
      warn!(path = %self.lock_path.display(), error = %e, "failed to clear lock holder");
    }
  }
}

fn record_holder(mut file: &File, holder: &LockHolder) -> io::Result<()> {
  let json = serde_json::to_vec_pretty(holder).map_err(io::Error::other)?;
  file.set_len(0)?;
  file.write_all(&json)?;
  file.flush()
}

/// Holder recorded in `lock_path`, if it is readable and well formed.
fn read_holder(lock_path: &Path) -> Option<LockHolder> {
  let contents = std::fs::read_to_string(lock_path).ok()?;
  serde_json::from_str(&contents).ok()
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let flags = match mode {
    LockMode::Shared => LOCKFILE_FAIL_IMMEDIATELY,
    LockMode::Exclusive => LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
  };

  // SAFETY: `handle` is a valid open file handle and OVERLAPPED is valid zeroed.
  let locked = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };
  if locked != 0 {
    return Ok(());
  }

  let err = io::Error::last_os_error();
  if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
    Err(io::Error::from(io::ErrorKind::WouldBlock))
  } else {
    Err(err)
  }
}
