//! Logging setup and action tags.
//!
//! Every sync decision is logged with a `tag` field naming its category, so
//! the log alone is enough to audit what happened to each path:
//!
//! ```text
//! 2024-01-01T12:00:03Z  INFO vaultsync::reconcile: tag="sync" path="notes/a.md" -> remote
//! 2024-01-01T12:00:09Z  WARN vaultsync::reconcile: tag="conflict" path="notes/a.md" ...
//! ```

use std::fmt;

/// Category of a logged action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
	Sync,
	Skip,
	Conflict,
	Reclaim,
	Abort,
	Error,
	Info,
}

impl Tag {
	pub fn as_str(self) -> &'static str {
		match self {
			Tag::Sync => "sync",
			Tag::Skip => "skip",
			Tag::Conflict => "conflict",
			Tag::Reclaim => "reclaim",
			Tag::Abort => "abort",
			Tag::Error => "error",
			Tag::Info => "info",
		}
	}
}

impl fmt::Display for Tag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Initialize the tracing subscriber with environment filter support.
///
/// By default, logs at INFO level and above are displayed. Control the log level
/// with the `RUST_LOG` environment variable:
///
/// ```bash
/// RUST_LOG=debug vault-sync
/// RUST_LOG=vaultsync::watch=trace vault-sync
/// ```
pub fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_writer(std::io::stderr)
		.init();
}


// vim: ts=4
