//! Filesystem primitives used by capture, purge and restore.
//!
//! All functions are synchronous and depth-first. They return plain
//! `io::Result`s; callers attach the path context that matters to them.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Copy a single file, creating the destination's parent directory.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
  if let Some(parent) = dst.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::copy(src, dst)?;
  Ok(())
}

/// Recursively copy `src` into `dst`.
///
/// `dst` is created if missing. Symlinks are followed, so the copy holds
/// real files and directories even when a link points outside `src`. A
/// dangling link or a link cycle is an error.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
  fs::create_dir_all(dst)?;

  for entry in WalkDir::new(src).follow_links(true).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(rel);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&target)?;
    } else {
      fs::copy(entry.path(), &target)?;
    }
  }

  Ok(())
}

/// Copy a file or directory to `dst`, dereferencing `src` if it is a symlink.
pub fn copy_path(src: &Path, dst: &Path) -> io::Result<()> {
  if fs::metadata(src)?.is_dir() {
    copy_dir_all(src, dst)
  } else {
    copy_file(src, dst)
  }
}

/// Remove a path of any kind. Symlinks are removed, never followed.
pub fn remove_path(path: &Path) -> io::Result<()> {
  let metadata = fs::symlink_metadata(path)?;
  if metadata.is_dir() {
    fs::remove_dir_all(path)
  } else {
    fs::remove_file(path)
  }
}

/// List the direct children of `dir`, sorted by name.
pub fn list_dir(dir: &Path) -> io::Result<Vec<PathBuf>> {
  let mut children = fs::read_dir(dir)?
    .map(|entry| entry.map(|e| e.path()))
    .collect::<io::Result<Vec<_>>>()?;
  children.sort();
  Ok(children)
}

/// Extract a zip archive into `dest`.
///
/// Entries whose names would escape `dest` are rejected.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> io::Result<()> {
  let file = File::open(archive_path)?;
  let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(io::Error::other)?;

  fs::create_dir_all(dest)?;

  for i in 0..archive.len() {
    let mut entry = archive.by_index(i).map_err(io::Error::other)?;

    let Some(name) = entry.enclosed_name() else {
      return Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("invalid zip entry name: {}", entry.name()),
      ));
    };
    let dest_path = dest.join(name);

    if entry.is_dir() {
      fs::create_dir_all(&dest_path)?;
      continue;
    }

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }
    let mut outfile = File::create(&dest_path)?;
    io::copy(&mut entry, &mut outfile)?;

    #[cfg(unix)]
    if let Some(mode) = entry.unix_mode() {
      use std::os::unix::fs::PermissionsExt;
      fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode))?;
    }
  }

  debug!(archive = %archive_path.display(), dest = %dest.display(), "extracted archive");
  Ok(())
}
