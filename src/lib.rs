//! # vaultsync - Two-way sync between a project folder and its vault mirror
//!
//! vaultsync keeps a filtered subset of a project directory (the local side)
//! in step with a mirror folder inside a note vault (the remote side). Every
//! decision is a three-way comparison of the local content, the remote
//! content and the last synced baseline, so edits propagate in either
//! direction and concurrent edits never overwrite each other: the local copy
//! wins and the remote version is preserved in a timestamped side-file.
//!
//! Deletions are never propagated.
//!
//! ## One-shot
//!
//! ```rust,ignore
//! use vaultsync::{blueprint, sync::SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = blueprint::load_config(std::path::Path::new("."), None)?;
//!     let report = SyncEngine::new(config).run_once().await?;
//!     println!("{} file(s) copied", report.to_remote + report.to_local);
//!     Ok(())
//! }
//! ```
//!
//! ## Using the builder
//!
//! ```rust,ignore
//! use vaultsync::{config::SyncConfig, sync::SyncEngine, utils::shutdown_signal};
//!
//! let config = SyncConfig::builder("./project", "/vault/Projects/project")
//!     .include("docs/")
//!     .include("CLAUDE.md")
//!     .exclude("*.tmp")
//!     .build()?;
//! SyncEngine::new(config).run_continuous(shutdown_signal()).await?;
//! ```

pub mod blueprint;
pub mod checksum;
pub mod config;
pub mod error;
pub mod filter;
pub mod lock;
pub mod logging;
pub mod reconcile;
pub mod state;
pub mod sync;
pub mod util;
pub mod utils;
pub mod watch;

// Re-export commonly used types
pub use checksum::Digest;
pub use config::{Side, SyncConfig, SyncConfigBuilder};
pub use error::{ConfigError, LockError, StateError, SyncError, WatchError};
pub use filter::FilterSpec;
pub use reconcile::{Decision, PassReport, Reconciler, SyncOutcome};
pub use state::StateStore;
pub use sync::SyncEngine;

// vim: ts=4
