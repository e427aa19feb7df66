//! Atomic file writes shared by the state store and the reconciler

use crate::filter::TEMP_SUFFIX;
use filetime::FileTime;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Temp file beside `path`, on the same filesystem so rename is atomic.
///
/// The name ends in the temp suffix, which the filter never tracks.
pub fn temp_path_for(path: &Path) -> PathBuf {
	let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
	path.with_file_name(format!(".{}.{}{}", name, std::process::id(), TEMP_SUFFIX))
}

/// Write `content` to `path` via temp file, fsync and rename
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}

	let temp_path = temp_path_for(path);
	let result = (|| {
		let mut temp_file =
			OpenOptions::new().write(true).create(true).truncate(true).open(&temp_path)?;
		temp_file.write_all(content)?;
		temp_file.sync_all()?;
		fs::rename(&temp_path, path)
	})();

	if result.is_err() {
		let _ = fs::remove_file(&temp_path);
	}
	result
}

/// Copy `src` over `dst` atomically, keeping the source modification time
pub fn copy_atomic(src: &Path, dst: &Path) -> io::Result<()> {
	if let Some(parent) = dst.parent() {
		fs::create_dir_all(parent)?;
	}

	let temp_path = temp_path_for(dst);
	let result = (|| {
		fs::copy(src, &temp_path)?;
		let meta = fs::metadata(src)?;
		filetime::set_file_mtime(&temp_path, FileTime::from_last_modification_time(&meta))?;
		File::open(&temp_path)?.sync_all()?;
		fs::rename(&temp_path, dst)
	})();

	if result.is_err() {
		let _ = fs::remove_file(&temp_path);
	}
	result
}

/// Copy `src` into a new file at `dst`, failing if `dst` already exists
pub fn copy_new(src: &Path, dst: &Path) -> io::Result<()> {
	let mut reader = File::open(src)?;
	let mut writer = OpenOptions::new().write(true).create_new(true).open(dst)?;
	let result = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());

	if result.is_err() {
		drop(writer);
		let _ = fs::remove_file(dst);
	}
	result
}

/// Seconds since the Unix epoch, with sub-second precision
pub fn epoch_secs() -> f64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_write_atomic_replaces_content() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("state.json");
		fs::write(&path, "old").unwrap();

		write_atomic(&path, b"new").unwrap();

		assert_eq!(fs::read_to_string(&path).unwrap(), "new");
		assert!(!temp_path_for(&path).exists());
	}

	#[test]
	fn test_copy_atomic_creates_parents_and_keeps_mtime() {
		let dir = TempDir::new().unwrap();
		let src = dir.path().join("a.md");
		let dst = dir.path().join("mirror/deep/a.md");
		fs::write(&src, "content").unwrap();
		let mtime = FileTime::from_unix_time(1_600_000_000, 0);
		filetime::set_file_mtime(&src, mtime).unwrap();

		copy_atomic(&src, &dst).unwrap();

		assert_eq!(fs::read_to_string(&dst).unwrap(), "content");
		let meta = fs::metadata(&dst).unwrap();
		assert_eq!(FileTime::from_last_modification_time(&meta), mtime);
	}

	#[test]
	fn test_copy_new_refuses_to_overwrite() {
		let dir = TempDir::new().unwrap();
		let src = dir.path().join("remote.md");
		let dst = dir.path().join("side.md");
		fs::write(&src, "remote").unwrap();
		fs::write(&dst, "keep me").unwrap();

		let err = copy_new(&src, &dst).unwrap_err();

		assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
		assert_eq!(fs::read_to_string(&dst).unwrap(), "keep me");
	}

	#[test]
	fn test_temp_path_is_hidden_sibling() {
		let p = temp_path_for(Path::new("/x/docs/a.md"));
		assert_eq!(p.parent(), Some(Path::new("/x/docs")));
		let name = p.file_name().unwrap().to_string_lossy().into_owned();
		assert!(name.starts_with(".a.md."));
		assert!(name.ends_with(TEMP_SUFFIX));
	}
}

// vim: ts=4
