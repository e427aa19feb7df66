//! Validated sync configuration
//!
//! `SyncConfig` is built once at startup through `SyncConfigBuilder`, which
//! checks both roots and compiles the filter. It is immutable afterwards and
//! shared between the reconciler and both watchers.

use crate::error::ConfigError;
use crate::filter::{self, FilterSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Baseline file, kept in the local root
pub const STATE_FILE_NAME: &str = ".vault-sync-state.json";

/// Lock marker, kept in the local root
pub const LOCK_FILE_NAME: &str = ".vault-sync.lock";

/// Quiescence window for local edits (absorbs editor auto-save bursts)
pub const DEFAULT_LOCAL_DEBOUNCE: Duration = Duration::from_secs(2);

/// Quiescence window for the remote side (lets the vault sync agent finish writing)
pub const DEFAULT_REMOTE_DEBOUNCE: Duration = Duration::from_secs(5);

/// Which tree a path or notification belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
	Local,
	Remote,
}

impl Side {
	pub fn name(self) -> &'static str {
		match self {
			Side::Local => "local",
			Side::Remote => "remote",
		}
	}
}

/// Immutable engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
	local_root: PathBuf,
	remote_root: PathBuf,
	filter: FilterSpec,
	state_file: PathBuf,
	lock_file: PathBuf,
	local_debounce: Duration,
	remote_debounce: Duration,
}

impl SyncConfig {
	pub fn builder(local_root: impl Into<PathBuf>, remote_root: impl Into<PathBuf>) -> SyncConfigBuilder {
		SyncConfigBuilder::new(local_root, remote_root)
	}

	pub fn local_root(&self) -> &Path {
		&self.local_root
	}

	pub fn remote_root(&self) -> &Path {
		&self.remote_root
	}

	pub fn root(&self, side: Side) -> &Path {
		match side {
			Side::Local => &self.local_root,
			Side::Remote => &self.remote_root,
		}
	}

	pub fn filter(&self) -> &FilterSpec {
		&self.filter
	}

	pub fn state_file(&self) -> &Path {
		&self.state_file
	}

	pub fn lock_file(&self) -> &Path {
		&self.lock_file
	}

	pub fn debounce(&self, side: Side) -> Duration {
		match side {
			Side::Local => self.local_debounce,
			Side::Remote => self.remote_debounce,
		}
	}

	pub fn is_tracked(&self, rel: &str) -> bool {
		self.filter.is_tracked(rel)
	}

	/// Absolute location of a tracked path on one side
	pub fn path_on(&self, side: Side, rel: &str) -> PathBuf {
		rel.split('/').fold(self.root(side).to_path_buf(), |acc, part| acc.join(part))
	}
}

/// Builder for `SyncConfig`
#[derive(Debug, Clone)]
pub struct SyncConfigBuilder {
	local_root: PathBuf,
	remote_root: PathBuf,
	include: Vec<String>,
	exclude: Vec<String>,
	state_file: Option<PathBuf>,
	lock_file: Option<PathBuf>,
	local_debounce: Duration,
	remote_debounce: Duration,
}

impl SyncConfigBuilder {
	pub fn new(local_root: impl Into<PathBuf>, remote_root: impl Into<PathBuf>) -> Self {
		SyncConfigBuilder {
			local_root: local_root.into(),
			remote_root: remote_root.into(),
			include: Vec::new(),
			exclude: Vec::new(),
			state_file: None,
			lock_file: None,
			local_debounce: DEFAULT_LOCAL_DEBOUNCE,
			remote_debounce: DEFAULT_REMOTE_DEBOUNCE,
		}
	}

	/// Add one include rule (exact path or subtree prefix)
	pub fn include(mut self, rule: impl Into<String>) -> Self {
		self.include.push(rule.into());
		self
	}

	/// Add one exclude rule (exact path, subtree prefix or basename glob)
	pub fn exclude(mut self, rule: impl Into<String>) -> Self {
		self.exclude.push(rule.into());
		self
	}

	pub fn includes<I: IntoIterator<Item = String>>(mut self, rules: I) -> Self {
		self.include.extend(rules);
		self
	}

	pub fn excludes<I: IntoIterator<Item = String>>(mut self, rules: I) -> Self {
		self.exclude.extend(rules);
		self
	}

	/// Baseline file location; relative paths are taken from the local root
	pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.state_file = Some(path.into());
		self
	}

	/// Lock marker location; relative paths are taken from the local root
	pub fn lock_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.lock_file = Some(path.into());
		self
	}

	pub fn local_debounce(mut self, window: Duration) -> Self {
		self.local_debounce = window;
		self
	}

	pub fn remote_debounce(mut self, window: Duration) -> Self {
		self.remote_debounce = window;
		self
	}

	/// Validate roots, compile rules and freeze the configuration
	pub fn build(self) -> Result<SyncConfig, ConfigError> {
		let local_root = resolve_root("Local root", &self.local_root)?;
		let remote_root = resolve_root("Remote root", &self.remote_root)?;

		if local_root.starts_with(&remote_root) || remote_root.starts_with(&local_root) {
			return Err(ConfigError::OverlappingRoots { local: local_root, remote: remote_root });
		}

		let state_file = anchor(&local_root, self.state_file, STATE_FILE_NAME);
		let lock_file = anchor(&local_root, self.lock_file, LOCK_FILE_NAME);

		// The engine's own files must never be synced
		let mut reserved = Vec::new();
		for own in &[&state_file, &lock_file] {
			for root in &[&local_root, &remote_root] {
				if let Some(rel) = filter::relative_to(own, root) {
					reserved.push(rel);
				}
			}
		}

		let filter = FilterSpec::new(&self.include, &self.exclude)?.with_reserved(reserved)?;

		Ok(SyncConfig {
			local_root,
			remote_root,
			filter,
			state_file,
			lock_file,
			local_debounce: self.local_debounce,
			remote_debounce: self.remote_debounce,
		})
	}
}

fn resolve_root(what: &'static str, path: &Path) -> Result<PathBuf, ConfigError> {
	let meta = std::fs::metadata(path)
		.map_err(|_| ConfigError::RootMissing { what, path: path.to_path_buf() })?;
	if !meta.is_dir() {
		return Err(ConfigError::NotADirectory { what, path: path.to_path_buf() });
	}
	// Notifications report canonical paths, so roots must be canonical too
	path.canonicalize().map_err(|e| ConfigError::Io { path: path.to_path_buf(), source: e })
}

fn anchor(root: &Path, path: Option<PathBuf>, default_name: &str) -> PathBuf {
	match path {
		Some(p) if p.is_absolute() => p,
		Some(p) => root.join(p),
		None => root.join(default_name),
	}
}


// vim: ts=4
