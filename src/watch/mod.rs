//! Change notifications for one side of the sync
//!
//! Each side gets its own recursive notify subscription and its own debouncer.
//! Creations and modifications of tracked files restart that path's countdown;
//! removals are ignored. When a countdown elapses the path goes through the
//! same `Reconciler::reconcile_path` used by the startup pass.

mod debounce;

pub use debounce::Debouncer;

use crate::config::Side;
use crate::error::WatchError;
use crate::filter;
use crate::logging::Tag;
use crate::reconcile::Reconciler;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Live subscription for one root
pub struct SideWatcher {
	side: Side,
	watcher: RecommendedWatcher,
	events: JoinHandle<()>,
	debouncer: Arc<Debouncer<String>>,
}

impl SideWatcher {
	/// Subscribe to `side`'s root and start dispatching debounced changes
	pub fn start(side: Side, reconciler: Arc<Reconciler>) -> Result<Self, WatchError> {
		let config = reconciler.config().clone();
		let root = config.root(side).to_path_buf();
		let debouncer = Arc::new(Debouncer::new(config.debounce(side)));

		let (tx, rx) = mpsc::unbounded_channel();
		let mut watcher = RecommendedWatcher::new(
			move |res: Result<Event, notify::Error>| match res {
				Ok(event) => {
					let _ = tx.send(event);
				}
				Err(e) => warn!("{} watcher error: {}", side.name(), e),
			},
			Config::default(),
		)
		.map_err(|e| WatchError::Subscribe { root: root.clone(), source: e })?;

		watcher
			.watch(&root, RecursiveMode::Recursive)
			.map_err(|e| WatchError::Subscribe { root: root.clone(), source: e })?;

		let events = tokio::spawn(event_loop(side, root.clone(), rx, debouncer.clone(), reconciler));

		info!(tag = %Tag::Info, "Watching ({}) {}", side.name(), root.display());
		Ok(SideWatcher { side, watcher, events, debouncer })
	}

	/// Stop the subscription, abandon pending countdowns and wait for running
	/// reconciliations to finish
	pub async fn stop(self) {
		let SideWatcher { side, watcher, events, debouncer, .. } = self;

		// Dropping the watcher drops the sender and ends the event loop
		drop(watcher);
		if let Err(e) = events.await {
			error!("{} event loop ended abnormally: {}", side.name(), e);
		}
		debouncer.shutdown().await;
		debug!("Stopped {} watcher", side.name());
	}
}

async fn event_loop(
	side: Side,
	root: PathBuf,
	mut rx: mpsc::UnboundedReceiver<Event>,
	debouncer: Arc<Debouncer<String>>,
	reconciler: Arc<Reconciler>,
) {
	while let Some(event) = rx.recv().await {
		if !is_content_change(&event.kind) {
			continue;
		}
		for path in &event.paths {
			if let Some(rel) = tracked_rel(&reconciler, &root, path) {
				trace!("{} change: {}", side.name(), rel);
				let reconciler = reconciler.clone();
				let key = rel.clone();
				debouncer.schedule(key, move || dispatch(&reconciler, &rel));
			}
		}
	}
}

/// Creations and modifications count; removals and reads never do
pub fn is_content_change(kind: &EventKind) -> bool {
	matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Relative tracked path for a notified absolute path
fn tracked_rel(reconciler: &Reconciler, root: &Path, path: &Path) -> Option<String> {
	if path.is_dir() {
		return None;
	}
	let rel = filter::relative_to(path, root)?;
	if reconciler.config().is_tracked(&rel) {
		Some(rel)
	} else {
		trace!("Ignoring untracked {}", rel);
		None
	}
}

fn dispatch(reconciler: &Reconciler, rel: &str) {
	match reconciler.reconcile_path(rel) {
		Ok(outcome) => trace!("{}: {:?}", rel, outcome),
		Err(e) => error!(tag = %Tag::Error, path = rel, "{}", e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use notify::event::{CreateKind, ModifyKind, RemoveKind};

	#[test]
	fn test_event_kinds() {
		assert!(is_content_change(&EventKind::Create(CreateKind::File)));
		assert!(is_content_change(&EventKind::Modify(ModifyKind::Any)));
		assert!(!is_content_change(&EventKind::Remove(RemoveKind::File)));
		assert!(!is_content_change(&EventKind::Any));
	}
}

// vim: ts=4
