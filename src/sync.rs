//! Operating modes: one-shot reconciliation and continuous watching
//!
//! ```rust,ignore
//! use vaultsync::{blueprint, sync::SyncEngine, utils::shutdown_signal};
//!
//! let config = blueprint::load_config(project_dir, None)?;
//! let engine = SyncEngine::new(config);
//! engine.run_once().await?;                        // one pass, then return
//! engine.run_continuous(shutdown_signal()).await?; // lock, pass, watch
//! ```

use crate::config::{Side, SyncConfig};
use crate::error::SyncError;
use crate::lock::{ProcessProbe, ProjectLock, SystemProbe};
use crate::logging::Tag;
use crate::reconcile::{PassReport, Reconciler};
use crate::state::StateStore;
use crate::watch::SideWatcher;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Wires the state store, reconciler and watchers for one project
pub struct SyncEngine {
	config: Arc<SyncConfig>,
	reconciler: Arc<Reconciler>,
	probe: Box<dyn ProcessProbe>,
}

impl SyncEngine {
	/// Create an engine, loading the baseline from the configured state file
	pub fn new(config: SyncConfig) -> Self {
		let config = Arc::new(config);
		let state = Arc::new(StateStore::load(config.state_file()));
		let reconciler = Arc::new(Reconciler::new(config.clone(), state));
		SyncEngine { config, reconciler, probe: Box::new(SystemProbe) }
	}

	/// Use a custom liveness probe for the lock
	pub fn with_probe(mut self, probe: Box<dyn ProcessProbe>) -> Self {
		self.probe = probe;
		self
	}

	pub fn config(&self) -> &Arc<SyncConfig> {
		&self.config
	}

	pub fn reconciler(&self) -> &Arc<Reconciler> {
		&self.reconciler
	}

	/// One full reconciliation pass. Does not take the lock, so it must not
	/// run next to a live continuous instance.
	pub async fn run_once(&self) -> Result<PassReport, SyncError> {
		let reconciler = self.reconciler.clone();
		let report = tokio::task::spawn_blocking(move || reconciler.reconcile_all()).await?;
		Ok(report)
	}

	/// Take the lock, reconcile everything, then follow both trees until
	/// `shutdown` resolves.
	///
	/// Watchers are subscribed before the startup pass so edits made during
	/// the pass are not missed. `shutdown` is honoured during the startup pass
	/// too: the pass stops after the file it is on and the lock is released
	/// only once it has. Signal handlers behind `shutdown` must already be
	/// installed when this is called (see [`shutdown_signal`]).
	///
	/// [`shutdown_signal`]: crate::utils::shutdown_signal
	pub async fn run_continuous<F>(&self, shutdown: F) -> Result<(), SyncError>
	where
		F: Future,
	{
		tokio::pin!(shutdown);
		let lock = ProjectLock::acquire_with(self.config.lock_file(), self.probe.as_ref())?;

		let local = SideWatcher::start(Side::Local, self.reconciler.clone())?;
		let remote = match SideWatcher::start(Side::Remote, self.reconciler.clone()) {
			Ok(w) => w,
			Err(e) => {
				local.stop().await;
				return Err(e.into());
			}
		};

		let stop = Arc::new(AtomicBool::new(false));
		let mut pass = {
			let reconciler = self.reconciler.clone();
			let stop = stop.clone();
			tokio::task::spawn_blocking(move || reconciler.reconcile_all_until(&stop))
		};

		let startup = tokio::select! {
			joined = &mut pass => Some(joined),
			_ = &mut shutdown => None,
		};

		match startup {
			Some(Ok(_)) => {
				info!(tag = %Tag::Info, "Two-way sync active. Press Ctrl+C to stop.");
				shutdown.await;
				info!(tag = %Tag::Info, "Stopping vault-sync...");
			}
			Some(Err(e)) => {
				local.stop().await;
				remote.stop().await;
				return Err(e.into());
			}
			None => {
				info!(tag = %Tag::Info, "Stopping vault-sync...");
				stop.store(true, Ordering::SeqCst);
				if let Err(e) = pass.await {
					error!(tag = %Tag::Error, "Startup reconciliation failed: {}", e);
				}
			}
		}

		local.stop().await;
		remote.stop().await;
		lock.release();
		info!(tag = %Tag::Info, "Stopped.");
		Ok(())
	}
}

// vim: ts=4
