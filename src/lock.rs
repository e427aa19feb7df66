//! Single-instance lock for continuous mode
//!
//! The lock marker holds the decimal PID of its owner. A marker whose owner is
//! no longer running is stale and gets reclaimed. One-shot runs never take the
//! lock.

use crate::error::LockError;
use crate::logging::Tag;
use crate::util;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Answers whether a process is still running
pub trait ProcessProbe: Send + Sync {
	fn is_alive(&self, pid: u32) -> bool;
}

/// Give up if the marker is replaced this many times while acquiring
const MAX_ACQUIRE_ATTEMPTS: usize = 8;

/// Probe backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

#[cfg(unix)]
impl ProcessProbe for SystemProbe {
	fn is_alive(&self, pid: u32) -> bool {
		if pid == 0 || pid > i32::MAX as u32 {
			return false;
		}
		// Signal 0 performs the permission and existence checks only
		let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
		if rc == 0 {
			return true;
		}
		// EPERM: the process exists but belongs to someone else
		std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
	}
}

#[cfg(not(unix))]
impl ProcessProbe for SystemProbe {
	fn is_alive(&self, pid: u32) -> bool {
		use sysinfo::{Pid, ProcessesToUpdate, System};

		let pid = Pid::from_u32(pid);
		let mut sys = System::new();
		sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
		sys.process(pid).is_some()
	}
}

/// RAII guard for the project lock; the marker is removed on drop
#[derive(Debug)]
pub struct ProjectLock {
	path: PathBuf,
	pid: u32,
}

impl ProjectLock {
	/// Acquire the lock using the given liveness probe.
	///
	/// The marker is only ever created exclusively, so two starters cannot
	/// both win. A stale marker is moved aside before it is deleted, and put
	/// back if it turns out to have been replaced by a new owner meanwhile.
	pub fn acquire_with(
		path: impl Into<PathBuf>,
		probe: &dyn ProcessProbe,
	) -> Result<Self, LockError> {
		let path = path.into();
		let pid = std::process::id();
		let io_err = |path: &Path, source: io::Error| LockError::Io { path: path.to_path_buf(), source };

		for _ in 0..MAX_ACQUIRE_ATTEMPTS {
			match create_marker(&path, pid) {
				Ok(()) => {
					debug!("Acquired lock {} for PID {}", path.display(), pid);
					return Ok(ProjectLock { path, pid });
				}
				Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
				Err(e) => return Err(io_err(&path, e)),
			}

			let seen = match fs::read_to_string(&path) {
				Ok(content) => content,
				// Released between our attempt and the read
				Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
				Err(e) => return Err(io_err(&path, e)),
			};
			match seen.trim().parse::<u32>() {
				Ok(owner) if owner != pid && probe.is_alive(owner) => {
					warn!(tag = %Tag::Abort, "Lock {} is held by running PID {}", path.display(), owner);
					return Err(LockError::Held { pid: owner, path });
				}
				Ok(owner) => {
					info!(
						tag = %Tag::Reclaim,
						"Removing stale lockfile (PID {} no longer running)", owner
					);
				}
				Err(_) => {
					info!(tag = %Tag::Reclaim, "Removing unreadable lockfile {}", path.display());
				}
			}
			reclaim(&path, &seen).map_err(|e| io_err(&path, e))?;
		}

		Err(io_err(
			&path,
			io::Error::new(io::ErrorKind::WouldBlock, "lock marker keeps changing, giving up"),
		))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn pid(&self) -> u32 {
		self.pid
	}

	/// Release explicitly (same as dropping)
	pub fn release(self) {}
}

impl Drop for ProjectLock {
	fn drop(&mut self) {
		// Only remove a marker that is still ours
		if read_owner(&self.path) == Some(self.pid) {
			if let Err(e) = fs::remove_file(&self.path) {
				warn!("Failed to remove lock file {}: {}", self.path.display(), e);
			} else {
				debug!("Released lock {}", self.path.display());
			}
		}
	}
}

/// PID recorded in a lock marker, if it exists and parses
pub fn read_owner(path: &Path) -> Option<u32> {
	fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Create the marker holding `pid`, failing with `AlreadyExists` if any
/// marker is present. The marker never appears without its content.
fn create_marker(path: &Path, pid: u32) -> io::Result<()> {
	let temp = util::temp_path_for(path);
	fs::write(&temp, pid.to_string())?;
	let linked = fs::hard_link(&temp, path);
	let _ = fs::remove_file(&temp);

	match linked {
		Err(e) if e.kind() != io::ErrorKind::AlreadyExists => {
			// No hard links on this filesystem
			debug!("Hard link for {} failed ({}), using exclusive create", path.display(), e);
			let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
			file.write_all(pid.to_string().as_bytes())?;
			file.sync_all()
		}
		other => other,
	}
}

/// Delete the marker at `path` if it still reads `seen`.
///
/// The marker is renamed aside first, so whatever is deleted is exactly what
/// was inspected. A marker that changed meanwhile belongs to someone else and
/// is linked back unless yet another one took its place.
fn reclaim(path: &Path, seen: &str) -> io::Result<()> {
	let aside = util::temp_path_for(&path.with_extension("stale"));
	match fs::rename(path, &aside) {
		Ok(()) => {}
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
		Err(e) => return Err(e),
	}

	if fs::read_to_string(&aside).ok().as_deref() != Some(seen) {
		debug!("Lock {} changed while reclaiming, restoring it", path.display());
		match fs::hard_link(&aside, path) {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
			Err(e) => {
				// Put it back the only other way we can
				let _ = fs::rename(&aside, path);
				return Err(e);
			}
		}
	}
	fs::remove_file(&aside)
}


// vim: ts=4
