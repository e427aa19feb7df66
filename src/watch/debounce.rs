//! Per-key debouncing
//!
//! `schedule` (re)starts a countdown for a key. A newer call for the same key
//! supersedes the pending one, so any burst collapses into a single action
//! that runs once the key has been quiet for the whole window. Countdowns for
//! different keys are independent. Actions run on the blocking pool.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::trace;

struct Pending {
	id: u64,
	handle: JoinHandle<()>,
}

type PendingMap<K> = Arc<Mutex<HashMap<K, Pending>>>;

pub struct Debouncer<K> {
	window: Duration,
	pending: PendingMap<K>,
	next_id: AtomicU64,
	// Running actions hold a read guard; shutdown takes the write side
	running: Arc<RwLock<()>>,
	closed: Arc<AtomicBool>,
}

impl<K> Debouncer<K>
where
	K: Eq + Hash + Clone + Debug + Send + 'static,
{
	pub fn new(window: Duration) -> Self {
		Debouncer {
			window,
			pending: Arc::new(Mutex::new(HashMap::new())),
			next_id: AtomicU64::new(0),
			running: Arc::new(RwLock::new(())),
			closed: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Start or restart the countdown for `key`; `action` runs on expiry.
	///
	/// Must be called from within a tokio runtime.
	pub fn schedule<F>(&self, key: K, action: F)
	where
		F: FnOnce() + Send + 'static,
	{
		if self.closed.load(Ordering::SeqCst) {
			return;
		}

		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let window = self.window;
		let pending = self.pending.clone();
		let running = self.running.clone();
		let closed = self.closed.clone();
		let task_key = key.clone();

		// Spawn and register under the map lock: the countdown cannot claim
		// itself before it is registered
		let mut map = lock(&self.pending);
		let handle = tokio::spawn(async move {
			tokio::time::sleep(window).await;

			{
				let mut map = lock(&pending);
				match map.get(&task_key) {
					Some(p) if p.id == id => {
						map.remove(&task_key);
					}
					_ => return,
				}
			}

			let _running = running.read_owned().await;
			if closed.load(Ordering::SeqCst) {
				return;
			}
			trace!("Debounce window elapsed for {:?}", task_key);
			if let Err(e) = tokio::task::spawn_blocking(action).await {
				tracing::error!("Debounced action for {:?} failed: {}", task_key, e);
			}
		});

		if let Some(old) = map.insert(key, Pending { id, handle }) {
			old.handle.abort();
		}
	}

	/// Number of countdowns not yet elapsed
	pub fn pending(&self) -> usize {
		lock(&self.pending).len()
	}

	/// Abandon pending countdowns and wait for running actions to finish.
	///
	/// Later `schedule` calls are ignored.
	pub async fn shutdown(&self) {
		self.closed.store(true, Ordering::SeqCst);
		let abandoned: Vec<Pending> = lock(&self.pending).drain().map(|(_, p)| p).collect();
		if !abandoned.is_empty() {
			trace!("Abandoning {} pending countdown(s)", abandoned.len());
		}
		for p in abandoned {
			p.handle.abort();
		}
		let _quiet = self.running.write().await;
	}
}

fn lock<K>(pending: &PendingMap<K>) -> MutexGuard<'_, HashMap<K, Pending>> {
	pending.lock().unwrap_or_else(|p| p.into_inner())
}


// vim: ts=4
