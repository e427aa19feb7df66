//! Error types for vault-sync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// I/O error on a specific path
	Io { path: PathBuf, source: io::Error },

	/// Configuration error (nested)
	Config(ConfigError),

	/// State error (nested)
	State(StateError),

	/// Lock error (nested)
	Lock(LockError),

	/// Watcher error (nested)
	Watch(WatchError),

	/// Background task failed to complete
	TaskFailed { message: String },
}

impl SyncError {
	pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		SyncError::Io { path: path.into(), source }
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Io { path, source } => {
				write!(f, "I/O error on {}: {}", path.display(), source)
			}
			SyncError::Config(e) => write!(f, "Configuration error: {}", e),
			SyncError::State(e) => write!(f, "State error: {}", e),
			SyncError::Lock(e) => write!(f, "Lock error: {}", e),
			SyncError::Watch(e) => write!(f, "Watch error: {}", e),
			SyncError::TaskFailed { message } => write!(f, "Task failed: {}", message),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::Io { source, .. } => Some(source),
			SyncError::Config(e) => Some(e),
			SyncError::State(e) => Some(e),
			SyncError::Lock(e) => Some(e),
			SyncError::Watch(e) => Some(e),
			SyncError::TaskFailed { .. } => None,
		}
	}
}

impl From<ConfigError> for SyncError {
	fn from(e: ConfigError) -> Self {
		SyncError::Config(e)
	}
}

impl From<StateError> for SyncError {
	fn from(e: StateError) -> Self {
		SyncError::State(e)
	}
}

impl From<LockError> for SyncError {
	fn from(e: LockError) -> Self {
		SyncError::Lock(e)
	}
}

impl From<WatchError> for SyncError {
	fn from(e: WatchError) -> Self {
		SyncError::Watch(e)
	}
}

impl From<tokio::task::JoinError> for SyncError {
	fn from(e: tokio::task::JoinError) -> Self {
		SyncError::TaskFailed { message: e.to_string() }
	}
}

/// Configuration and blueprint errors. All of them are fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
	/// Blueprint file does not exist
	BlueprintMissing { path: PathBuf },

	/// Blueprint has no `---` delimited frontmatter
	MissingFrontmatter { path: PathBuf },

	/// Blueprint content could not be parsed
	Parse { path: PathBuf, message: String },

	/// A required root directory does not exist
	RootMissing { what: &'static str, path: PathBuf },

	/// A root exists but is not a directory
	NotADirectory { what: &'static str, path: PathBuf },

	/// Local and remote roots are the same or nested in each other
	OverlappingRoots { local: PathBuf, remote: PathBuf },

	/// An exclude glob failed to compile
	InvalidPattern { pattern: String, message: String },

	/// I/O error while reading configuration
	Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::BlueprintMissing { path } => {
				write!(f, "Blueprint not found: {}", path.display())
			}
			ConfigError::MissingFrontmatter { path } => write!(
				f,
				"{} has no valid YAML frontmatter (missing --- delimiters)",
				path.display()
			),
			ConfigError::Parse { path, message } => {
				write!(f, "Could not parse {}: {}", path.display(), message)
			}
			ConfigError::RootMissing { what, path } => {
				write!(f, "{} not found: {}", what, path.display())
			}
			ConfigError::NotADirectory { what, path } => {
				write!(f, "{} is not a directory: {}", what, path.display())
			}
			ConfigError::OverlappingRoots { local, remote } => write!(
				f,
				"Local root {} and remote root {} overlap",
				local.display(),
				remote.display()
			),
			ConfigError::InvalidPattern { pattern, message } => {
				write!(f, "Invalid exclude pattern '{}': {}", pattern, message)
			}
			ConfigError::Io { path, source } => {
				write!(f, "Cannot read {}: {}", path.display(), source)
			}
		}
	}
}

impl Error for ConfigError {}

/// State persistence errors
#[derive(Debug)]
pub enum StateError {
	/// Failed to read the state file
	LoadFailed { path: PathBuf, source: io::Error },

	/// State file exists but does not parse
	Corrupted { path: PathBuf, message: String },

	/// Failed to serialize state
	SerializeFailed { source: serde_json::Error },

	/// Failed to write the state file
	SaveFailed { path: PathBuf, source: io::Error },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::LoadFailed { path, source } => {
				write!(f, "Failed to load state {}: {}", path.display(), source)
			}
			StateError::Corrupted { path, message } => {
				write!(f, "State file {} corrupted: {}", path.display(), message)
			}
			StateError::SerializeFailed { source } => {
				write!(f, "Failed to serialize state: {}", source)
			}
			StateError::SaveFailed { path, source } => {
				write!(f, "Failed to save state {}: {}", path.display(), source)
			}
		}
	}
}

impl Error for StateError {}

/// Lock acquisition errors
#[derive(Debug)]
pub enum LockError {
	/// Another live instance owns the lock
	Held { pid: u32, path: PathBuf },

	/// Lock file could not be written
	Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for LockError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LockError::Held { pid, path } => write!(
				f,
				"vault-sync is already running (PID {}). Only one instance per project is allowed. \
				 To stop it: kill the process or delete {}",
				pid,
				path.display()
			),
			LockError::Io { path, source } => {
				write!(f, "Failed to write lock file {}: {}", path.display(), source)
			}
		}
	}
}

impl Error for LockError {}

/// File watcher errors
#[derive(Debug)]
pub enum WatchError {
	/// Could not subscribe to change notifications for a root
	Subscribe { root: PathBuf, source: notify::Error },
}

impl fmt::Display for WatchError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WatchError::Subscribe { root, source } => {
				write!(f, "Cannot watch {}: {}", root.display(), source)
			}
		}
	}
}

impl Error for WatchError {}

// vim: ts=4
