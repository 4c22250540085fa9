//! `file` module: ensure a path is a file, directory, link, or absent.
//!
//! Parameters:
//! - `path`: target path (required for `file`, `touch`, `directory`, `absent`)
//! - `state`: `file` (default), `touch`, `directory`, `absent`, `link`, `hard`
//! - `src`, `dest`: link source and link path (`dest` falls back to `path`)
//! - `force`: for `link`/`hard`, replace whatever already sits at `dest`
//! - `mode`: octal permission bits applied after the state is ensured (unix)

use std::fs;
use std::io;
use std::path::Path;

use crate::{Module, ModuleResult, Params, param_flag};

const NAME: &str = "file";

pub struct FileModule;

impl Module for FileModule {
  fn name(&self) -> &'static str {
    NAME
  }

  fn type_path(&self) -> &'static str {
    "plumbops_modules::file::FileModule"
  }

  fn run(&self, params: &Params) -> ModuleResult {
    let get = |key: &str| param(params, key);
    let path = get("path");
    let state = match get("state") {
      "" => "file",
      s => s,
    };
    let src = get("src");
    let dest = match get("dest") {
      "" => path,
      d => d,
    };

    let force = param_flag(params, "force");

    let needs_path = matches!(state, "file" | "touch" | "directory" | "absent");
    if needs_path && path.is_empty() {
      return ModuleResult::fail(NAME, "Missing 'path' parameter");
    }
    if matches!(state, "link" | "hard") && (src.is_empty() || dest.is_empty()) {
      return ModuleResult::fail(NAME, "For link/hard link state, both 'src' and 'dest' are required");
    }

    let outcome = match state {
      "file" => ensure_file(Path::new(path), false).map(|c| (c, format!("File '{}' created", path))),
      "touch" => ensure_file(Path::new(path), true).map(|c| (c, format!("File '{}' touched", path))),
      "directory" => ensure_directory(Path::new(path)).map(|c| (c, format!("Directory '{}' created", path))),
      "absent" => remove_path(Path::new(path)).map(|c| (c, format!("Removed '{}'", path))),
      "link" => ensure_symlink(Path::new(src), Path::new(dest), force)
        .map(|c| (c, format!("Symlink created: {} -> {}", dest, src))),
      "hard" => ensure_hard_link(Path::new(src), Path::new(dest), force)
        .map(|c| (c, format!("Hard link created: {} -> {}", dest, src))),
      other => return ModuleResult::fail(NAME, format!("Unknown state '{}'", other)),
    };

    let (mut changed, msg) = match outcome {
      Ok(v) => v,
      Err(e) => return ModuleResult::fail(NAME, e.to_string()),
    };

    let mode = get("mode");
    if state != "absent" && !mode.is_empty() {
      let target = if matches!(state, "link" | "hard") { dest } else { path };
      match apply_mode(Path::new(target), mode) {
        Ok(mode_changed) => changed |= mode_changed,
        Err(e) => return ModuleResult::fail(NAME, e.to_string()),
      }
    }

    ModuleResult::ok(NAME, changed, msg)
  }
}

fn param<'a>(params: &'a Params, key: &str) -> &'a str {
  params.get(key).map(String::as_str).unwrap_or("")
}

/// Create `path` as an empty file if missing. With `touch`, an existing file
/// gets its modification time bumped.
fn ensure_file(path: &Path, touch: bool) -> io::Result<bool> {
  match fs::symlink_metadata(path) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      fs::File::create(path)?;
      Ok(true)
    }
    Err(e) => Err(e),
    Ok(meta) if meta.is_dir() => Err(io::Error::other(format!(
      "'{}' exists but is a directory",
      path.display()
    ))),
    Ok(_) if touch => {
      let file = fs::OpenOptions::new().append(true).open(path)?;
      file.set_modified(std::time::SystemTime::now())?;
      Ok(true)
    }
    Ok(_) => Ok(false),
  }
}

fn ensure_directory(path: &Path) -> io::Result<bool> {
  match fs::symlink_metadata(path) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      fs::create_dir_all(path)?;
      Ok(true)
    }
    Err(e) => Err(e),
    Ok(meta) if !meta.is_dir() => Err(io::Error::other(format!(
      "'{}' exists but is not a directory",
      path.display()
    ))),
    Ok(_) => Ok(false),
  }
}

fn remove_path(path: &Path) -> io::Result<bool> {
  match fs::symlink_metadata(path) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
    Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map(|_| true),
    Ok(_) => fs::remove_file(path).map(|_| true),
  }
}

/// Existing entries at `dest` are kept unless `force` is set. A symlink that
/// already points at `src` is never touched.
fn ensure_symlink(src: &Path, dest: &Path, force: bool) -> io::Result<bool> {
  match fs::symlink_metadata(dest) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
    Ok(meta) if meta.file_type().is_symlink() && fs::read_link(dest)? == src => return Ok(false),
    Ok(meta) if force => clear(dest, &meta)?,
    Ok(_) => return Ok(false),
  }
  create_symlink(src, dest)?;
  Ok(true)
}

fn ensure_hard_link(src: &Path, dest: &Path, force: bool) -> io::Result<bool> {
  match fs::symlink_metadata(dest) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
    Ok(meta) if force => clear(dest, &meta)?,
    Ok(_) => return Ok(false),
  }
  fs::hard_link(src, dest)?;
  Ok(true)
}

/// Remove `path` so a link can take its place. Only empty directories go.
fn clear(path: &Path, meta: &fs::Metadata) -> io::Result<()> {
  if meta.is_dir() {
    fs::remove_dir(path)
  } else {
    fs::remove_file(path)
  }
}

#[cfg(unix)]
fn create_symlink(src: &Path, dest: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(src, dest)
}

#[cfg(windows)]
fn create_symlink(src: &Path, dest: &Path) -> io::Result<()> {
  if src.is_dir() {
    std::os::windows::fs::symlink_dir(src, dest)
  } else {
    std::os::windows::fs::symlink_file(src, dest)
  }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: &str) -> io::Result<bool> {
  use std::os::unix::fs::PermissionsExt;

  let bits = u32::from_str_radix(mode.trim_start_matches("0o"), 8)
    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid mode '{}'", mode)))?;
  let current = fs::metadata(path)?.permissions().mode() & 0o7777;
  if current == bits {
    return Ok(false);
  }
  fs::set_permissions(path, fs::Permissions::from_mode(bits))?;
  Ok(true)
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: &str) -> io::Result<bool> {
  Ok(false)
}
