//! Single-slot on-disk area holding the one currently active upload.

use std::{
	fs,
	io::ErrorKind,
	path::{Path, PathBuf},
};

use crate::error::{Error, Result};

pub const DEFAULT_STAGING_DIR: &str = "files";

/// Removes every entry directly under `dir`, recursing into subdirectories.
///
/// Best-effort: a failing entry is logged and skipped, and every other entry is still attempted. Returns whatever failed.
/// A missing `dir` is not an error.
pub fn clear_staging_area(dir: &Path) -> Vec<Error> {
	let entries = match fs::read_dir(dir) {
		Ok(entries) => entries,
		Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
		Err(e) => {
			tracing::error!("Failed to list {}. Reason: {e}", dir.display());
			return vec![Error::io(dir, e)];
		}
	};

	let mut errors = Vec::new();
	for entry in entries {
		let path = match entry {
			Ok(entry) => entry.path(),
			Err(e) => {
				tracing::error!("Failed to read an entry of {}. Reason: {e}", dir.display());
				errors.push(Error::io(dir, e));
				continue;
			}
		};
		// symlink_metadata, so a link to a directory is unlinked rather than followed
		let removed = fs::symlink_metadata(&path).and_then(|meta| match meta.is_dir() {
			true => fs::remove_dir_all(&path),
			false => fs::remove_file(&path),
		});
		if let Err(e) = removed {
			tracing::error!("Failed to delete {}. Reason: {e}", path.display());
			errors.push(Error::io(path, e));
		}
	}
	errors
}

/// Writes `bytes` to `<dir>/<filename>`, creating `dir` if needed.
///
/// Only the last component of `filename` is used, so an upload can't escape the staging directory.
pub fn stage_upload(dir: &Path, bytes: &[u8], filename: &str) -> Result<PathBuf> {
	let name = Path::new(filename)
		.file_name()
		.ok_or_else(|| Error::io(dir.join(filename), std::io::Error::new(ErrorKind::InvalidInput, "upload has no usable file name")))?;

	fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
	let path = dir.join(name);
	fs::write(&path, bytes).map_err(|e| Error::io(&path, e))?;
	tracing::info!(path = %path.display(), len = bytes.len(), "staged upload");
	Ok(path)
}

/// Owns the staging directory and the path of whatever is currently staged in it.
#[derive(Debug)]
pub struct StagingArea {
	dir: PathBuf,
	current: Option<PathBuf>,
}

impl StagingArea {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into(), current: None }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Path of the staged upload, if the last [replace](Self::replace) succeeded.
	pub fn current(&self) -> Option<&Path> {
		self.current.as_deref()
	}

	/// Purges the area, then stages `bytes` as the new sole upload.
	///
	/// Purge failures don't stop the write. If the write fails, nothing counts as staged.
	pub fn replace(&mut self, bytes: &[u8], filename: &str) -> Result<PathBuf> {
		self.current = None;
		let leftovers = clear_staging_area(&self.dir);
		if !leftovers.is_empty() {
			tracing::warn!(count = leftovers.len(), "staging area not fully cleared");
		}
		let path = stage_upload(&self.dir, bytes, filename)?;
		self.current = Some(path.clone());
		Ok(path)
	}

	pub fn clear(&mut self) -> Vec<Error> {
		self.current = None;
		clear_staging_area(&self.dir)
	}
}
