//! Checksum baseline: the last synced digest per tracked path
//!
//! The baseline is the common ancestor of the three-way comparison. It is
//! loaded once at startup, updated only after a sync action has completed,
//! and written back atomically after every single update.

use crate::checksum::Digest;
use crate::error::StateError;
use crate::logging::Tag;
use crate::util;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// Baseline for one tracked path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
	/// Digest of the content last written to both sides
	pub checksum: Digest,

	/// Unix time of that sync, in seconds
	pub last_sync: f64,
}

/// Full persisted mapping, keyed by relative path
pub type SyncState = BTreeMap<String, BaselineEntry>;

/// Owner of the baseline mapping and its durable backing file
#[derive(Debug)]
pub struct StateStore {
	path: PathBuf,
	entries: Mutex<SyncState>,
}

impl StateStore {
	/// Load the baseline, starting cold if the file is missing or corrupt
	pub fn load(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let entries = match read_state(&path) {
			Ok(Some(entries)) => {
				debug!("Loaded {} baseline entries from {}", entries.len(), path.display());
				entries
			}
			Ok(None) => {
				debug!("No state file at {}, starting with an empty baseline", path.display());
				SyncState::new()
			}
			Err(e) => {
				warn!(tag = %Tag::Error, "{}; starting with an empty baseline", e);
				SyncState::new()
			}
		};

		StateStore { path, entries: Mutex::new(entries) }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn baseline(&self, rel: &str) -> Option<Digest> {
		self.guard().get(rel).map(|e| e.checksum)
	}

	pub fn entry(&self, rel: &str) -> Option<BaselineEntry> {
		self.guard().get(rel).copied()
	}

	pub fn len(&self) -> usize {
		self.guard().len()
	}

	pub fn is_empty(&self) -> bool {
		self.guard().is_empty()
	}

	/// Record a completed sync and persist the whole mapping.
	///
	/// Update and write happen under one lock, so concurrent records are
	/// written in the order they were applied. If the write fails the
	/// in-memory entry stays and the error is returned for logging.
	pub fn record(&self, rel: &str, checksum: Digest) -> Result<(), StateError> {
		let mut entries = self.guard();
		entries.insert(rel.to_string(), BaselineEntry { checksum, last_sync: util::epoch_secs() });
		persist(&self.path, &entries)
	}

	/// Like `record`, but persistence failures are logged instead of returned
	pub fn record_logged(&self, rel: &str, checksum: Digest) {
		if let Err(e) = self.record(rel, checksum) {
			error!(tag = %Tag::Error, path = rel, "{}", e);
		}
	}

	fn guard(&self) -> MutexGuard<'_, SyncState> {
		// A panic elsewhere must not take the baseline down with it
		self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

/// Read a state file; `Ok(None)` if it does not exist
pub fn read_state(path: &Path) -> Result<Option<SyncState>, StateError> {
	let contents = match std::fs::read_to_string(path) {
		Ok(contents) => contents,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(StateError::LoadFailed { path: path.to_path_buf(), source: e }),
	};

	serde_json::from_str(&contents).map(Some).map_err(|e| StateError::Corrupted {
		path: path.to_path_buf(),
		message: e.to_string(),
	})
}

fn persist(path: &Path, entries: &SyncState) -> Result<(), StateError> {
	let json = serde_json::to_string_pretty(entries)
		.map_err(|e| StateError::SerializeFailed { source: e })?;

	util::write_atomic(path, json.as_bytes())
		.map_err(|e| StateError::SaveFailed { path: path.to_path_buf(), source: e })
}


// vim: ts=4
