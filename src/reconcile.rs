//! Three-way reconciliation of one path, and full passes over both trees
//!
//! The baseline digest stands in for a version vector: a side has changed iff
//! its current digest differs from the baseline. Only creations and
//! overwrites are ever propagated. A file missing on one side is never deleted
//! on the other, and never recreated while the other side is unchanged.

use crate::checksum::{self, Digest};
use crate::config::{Side, SyncConfig};
use crate::error::SyncError;
use crate::filter;
use crate::logging::Tag;
use crate::state::StateStore;
use crate::util;
use chrono::{DateTime, Local};
use ignore::WalkBuilder;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Marker inserted into conflict side-file names
pub const SIDE_FILE_MARKER: &str = ".obsidian-";

/// Give up finding a free side-file name after this many attempts
const MAX_SIDE_FILE_ATTEMPTS: usize = 1000;

/// What the engine decided for one path, given the three digests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
	/// Missing on both sides
	Absent,
	/// Nothing to propagate
	Unchanged,
	/// Only local changed: copy it over the remote copy
	CopyToRemote(Digest),
	/// Only remote changed: copy it over the local copy
	CopyToLocal(Digest),
	/// Both changed to the same content: only the baseline moves
	Converge(Digest),
	/// Both changed differently: archive remote, then local wins
	Conflict(Digest),
}

/// Three-way decision table
pub fn decide(local: Option<Digest>, remote: Option<Digest>, base: Option<Digest>) -> Decision {
	if local.is_none() && remote.is_none() {
		return Decision::Absent;
	}

	let local_changed = local != base;
	let remote_changed = remote != base;

	match (local, remote) {
		(Some(l), _) if local_changed && !remote_changed => Decision::CopyToRemote(l),
		(_, Some(r)) if remote_changed && !local_changed => Decision::CopyToLocal(r),
		(Some(l), Some(r)) if local_changed && remote_changed => {
			if l == r {
				Decision::Converge(l)
			} else {
				Decision::Conflict(l)
			}
		}
		_ => Decision::Unchanged,
	}
}

/// Result of reconciling one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
	CopiedToRemote,
	CopiedToLocal,
	/// Remote variant archived beside the local file
	Conflict { side_file: PathBuf },
	/// Same content on both sides; baseline recorded
	Converged,
	/// Destination changed while deciding; left for the next notification
	Deferred,
	Unchanged,
	Absent,
}

impl SyncOutcome {
	/// True if the filesystem was written
	pub fn is_action(&self) -> bool {
		matches!(
			self,
			SyncOutcome::CopiedToRemote | SyncOutcome::CopiedToLocal | SyncOutcome::Conflict { .. }
		)
	}
}

/// Counts for one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
	pub to_remote: usize,
	pub to_local: usize,
	pub conflicts: usize,
	pub converged: usize,
	pub deferred: usize,
	pub unchanged: usize,
	pub failed: usize,
}

impl PassReport {
	fn add(&mut self, outcome: &SyncOutcome) {
		match outcome {
			SyncOutcome::CopiedToRemote => self.to_remote += 1,
			SyncOutcome::CopiedToLocal => self.to_local += 1,
			SyncOutcome::Conflict { .. } => self.conflicts += 1,
			SyncOutcome::Converged => self.converged += 1,
			SyncOutcome::Deferred => self.deferred += 1,
			SyncOutcome::Unchanged | SyncOutcome::Absent => self.unchanged += 1,
		}
	}

	/// Number of filesystem writes performed
	pub fn actions(&self) -> usize {
		self.to_remote + self.to_local + self.conflicts
	}
}

/// Per-path mutual exclusion, so notifications from both sides for the same
/// path never interleave their decisions
#[derive(Debug, Default)]
struct PathLocks {
	locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PathLocks {
	fn acquire(&self, rel: &str) -> Arc<Mutex<()>> {
		let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
		locks.entry(rel.to_string()).or_default().clone()
	}

	fn release(&self, rel: &str, lock: Arc<Mutex<()>>) {
		let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
		// Map plus ours: nobody else is waiting
		if Arc::strong_count(&lock) == 2 {
			locks.remove(rel);
		}
	}
}

/// Applies three-way decisions to tracked paths
#[derive(Debug)]
pub struct Reconciler {
	config: Arc<SyncConfig>,
	state: Arc<StateStore>,
	path_locks: PathLocks,
}

impl Reconciler {
	pub fn new(config: Arc<SyncConfig>, state: Arc<StateStore>) -> Self {
		Reconciler { config, state, path_locks: PathLocks::default() }
	}

	pub fn config(&self) -> &Arc<SyncConfig> {
		&self.config
	}

	/// Reconcile one tracked path.
	///
	/// Errors are per-path I/O failures; the caller logs them and the path is
	/// retried on the next pass or notification.
	pub fn reconcile_path(&self, rel: &str) -> Result<SyncOutcome, SyncError> {
		let lock = self.path_locks.acquire(rel);
		let result = {
			let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
			self.reconcile_locked(rel)
		};
		self.path_locks.release(rel, lock);
		result
	}

	fn reconcile_locked(&self, rel: &str) -> Result<SyncOutcome, SyncError> {
		let l = checksum::digest(&self.config.path_on(Side::Local, rel));
		let r = checksum::digest(&self.config.path_on(Side::Remote, rel));
		let base = self.state.baseline(rel);

		self.apply(rel, decide(l, r, base), l, r)
	}

	/// Carry out `decision`, which was taken when the local and remote copies
	/// had digests `l` and `r`
	fn apply(
		&self,
		rel: &str,
		decision: Decision,
		l: Option<Digest>,
		r: Option<Digest>,
	) -> Result<SyncOutcome, SyncError> {
		let local = self.config.path_on(Side::Local, rel);
		let remote = self.config.path_on(Side::Remote, rel);

		match decision {
			Decision::Absent => Ok(SyncOutcome::Absent),
			Decision::Unchanged => {
				debug!(tag = %Tag::Skip, path = rel, "{}  (no change)", rel);
				Ok(SyncOutcome::Unchanged)
			}
			Decision::CopyToRemote(d) => {
				if !copy_if_unchanged(&local, &remote, r)? {
					return Ok(self.defer(rel));
				}
				self.state.record_logged(rel, d);
				info!(tag = %Tag::Sync, path = rel, "{}  ->  remote", rel);
				Ok(SyncOutcome::CopiedToRemote)
			}
			Decision::CopyToLocal(d) => {
				if !copy_if_unchanged(&remote, &local, l)? {
					return Ok(self.defer(rel));
				}
				self.state.record_logged(rel, d);
				info!(tag = %Tag::Sync, path = rel, "{}  <-  remote", rel);
				Ok(SyncOutcome::CopiedToLocal)
			}
			Decision::Converge(d) => {
				self.state.record_logged(rel, d);
				info!(tag = %Tag::Sync, path = rel, "{}  ==  remote (already identical)", rel);
				Ok(SyncOutcome::Converged)
			}
			Decision::Conflict(d) => {
				let (side_file, archived) = archive_remote(&remote, &local, r, Local::now())?;
				// Local wins, but only over the remote variant that was archived
				if !copy_if_unchanged(&local, &remote, archived)? {
					debug!(tag = %Tag::Skip, path = rel, "{} remote changed again, not overwritten", rel);
				}
				self.state.record_logged(rel, d);
				let name = side_file.file_name().map(|n| n.to_string_lossy().into_owned());
				warn!(
					tag = %Tag::Conflict,
					path = rel,
					side_file = ?name.unwrap_or_default(),
					"{}: both local and remote were edited since last sync. Remote version saved \
					 beside the local file; merge manually, then resync.",
					rel
				);
				Ok(SyncOutcome::Conflict { side_file })
			}
		}
	}

	fn defer(&self, rel: &str) -> SyncOutcome {
		debug!(tag = %Tag::Skip, path = rel, "{} changed while syncing, deferred", rel);
		SyncOutcome::Deferred
	}

	/// Every tracked relative path that exists on either side
	pub fn tracked_paths(&self) -> BTreeSet<String> {
		let mut paths = BTreeSet::new();
		for side in &[Side::Local, Side::Remote] {
			paths.extend(self.walk(*side));
		}
		paths
	}

	fn walk(&self, side: Side) -> Vec<String> {
		let root = self.config.root(side).to_path_buf();
		let prune_config = self.config.clone();
		let prune_root = root.clone();

		let walker = WalkBuilder::new(&root)
			.standard_filters(false)
			.follow_links(false)
			.filter_entry(move |entry| {
				let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
				if !is_dir || entry.depth() == 0 {
					return true;
				}
				match filter::relative_to(entry.path(), &prune_root) {
					Some(rel) => !prune_config.filter().is_excluded_dir(&rel),
					None => false,
				}
			})
			.build();

		let mut found = Vec::new();
		for entry in walker {
			let entry = match entry {
				Ok(entry) => entry,
				Err(e) => {
					debug!("Skipping unreadable entry under {}: {}", root.display(), e);
					continue;
				}
			};
			if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
				continue;
			}
			if let Some(rel) = filter::relative_to(entry.path(), &root) {
				if self.config.is_tracked(&rel) {
					found.push(rel);
				}
			}
		}
		found
	}

	/// One full reconciliation pass over all tracked paths, in sorted order
	pub fn reconcile_all(&self) -> PassReport {
		self.reconcile_all_until(&AtomicBool::new(false))
	}

	/// Like [`reconcile_all`](Self::reconcile_all), but stops before the next
	/// path once `stop` is set. A path already being reconciled is finished.
	pub fn reconcile_all_until(&self, stop: &AtomicBool) -> PassReport {
		let mut report = PassReport::default();
		let paths = self.tracked_paths();
		if paths.is_empty() {
			info!(tag = %Tag::Info, "No tracked files found.");
			return report;
		}

		info!(tag = %Tag::Info, "Reconciling {} tracked file(s)...", paths.len());
		for rel in &paths {
			if stop.load(Ordering::SeqCst) {
				info!(tag = %Tag::Info, "Reconciliation interrupted, remaining files left for next run");
				return report;
			}
			match self.reconcile_path(rel) {
				Ok(outcome) => report.add(&outcome),
				Err(e) => {
					error!(tag = %Tag::Error, path = rel.as_str(), "{}", e);
					report.failed += 1;
				}
			}
		}
		info!(
			tag = %Tag::Info,
			"Reconciliation complete: {} to remote, {} to local, {} conflict(s), {} failed",
			report.to_remote,
			report.to_local,
			report.conflicts,
			report.failed
		);
		report
	}
}

/// Copy `src` over `dst`, unless `dst` no longer has the digest the
/// decision was based on. Returns false when the copy was skipped.
fn copy_if_unchanged(src: &Path, dst: &Path, expected_dst: Option<Digest>) -> Result<bool, SyncError> {
	if checksum::digest(dst) != expected_dst {
		return Ok(false);
	}
	util::copy_atomic(src, dst).map_err(|e| SyncError::io(dst, e))?;
	Ok(true)
}

/// Timestamp inserted into side-file names
pub fn conflict_stamp(now: DateTime<Local>) -> String {
	now.format("%Y%m%d-%H%M").to_string()
}

/// `<stem>.obsidian-<stamp>[-n]<.ext>`
pub fn side_file_name(original: &Path, stamp: &str, attempt: usize) -> String {
	let stem = original.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
	let ext = original
		.extension()
		.map(|e| format!(".{}", e.to_string_lossy()))
		.unwrap_or_default();
	if attempt == 0 {
		format!("{}{}{}{}", stem, SIDE_FILE_MARKER, stamp, ext)
	} else {
		format!("{}{}{}-{}{}", stem, SIDE_FILE_MARKER, stamp, attempt, ext)
	}
}

/// Save the remote variant beside `local` under a name nobody uses yet
fn write_side_file(remote: &Path, local: &Path, now: DateTime<Local>) -> Result<PathBuf, SyncError> {
	let stamp = conflict_stamp(now);
	for attempt in 0..MAX_SIDE_FILE_ATTEMPTS {
		let candidate = local.with_file_name(side_file_name(local, &stamp, attempt));
		match util::copy_new(remote, &candidate) {
			Ok(()) => return Ok(candidate),
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
			Err(e) => return Err(SyncError::io(candidate, e)),
		}
	}
	Err(SyncError::io(
		local,
		io::Error::new(io::ErrorKind::AlreadyExists, "no free conflict side-file name"),
	))
}

/// Make sure the remote variant is preserved beside `local`.
///
/// An earlier attempt at the same conflict may have written the side-file and
/// then failed to push; that file is reused instead of piling up copies.
/// Returns the side-file and the digest of the content it holds.
fn archive_remote(
	remote: &Path,
	local: &Path,
	r: Option<Digest>,
	now: DateTime<Local>,
) -> Result<(PathBuf, Option<Digest>), SyncError> {
	if let Some(existing) = r.and_then(|r| find_side_file(local, r)) {
		debug!(tag = %Tag::Skip, side_file = %existing.display(), "remote variant already archived");
		return Ok((existing, r));
	}
	let side_file = write_side_file(remote, local, now)?;
	let archived = checksum::digest(&side_file);
	Ok((side_file, archived))
}

/// An existing side-file of `local` whose content has digest `want`
fn find_side_file(local: &Path, want: Digest) -> Option<PathBuf> {
	let stem = local.file_stem()?.to_string_lossy().into_owned();
	let prefix = format!("{}{}", stem, SIDE_FILE_MARKER);
	let ext = local.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();

	let mut candidates: Vec<PathBuf> = fs::read_dir(local.parent()?)
		.ok()?
		.filter_map(|entry| entry.ok())
		.filter(|entry| {
			let name = entry.file_name().to_string_lossy().into_owned();
			name.starts_with(&prefix) && name.ends_with(&ext)
		})
		.map(|entry| entry.path())
		.collect();
	candidates.sort();
	candidates.into_iter().find(|path| checksum::digest(path) == Some(want))
}


// vim: ts=4
