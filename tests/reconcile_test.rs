/// Reconciliation tests against real directories
///
/// Each test builds a local and a remote tree, runs one-shot passes through the
/// public library API and checks file contents and the persisted baseline.
///
/// Tests verify:
/// 1. Edits propagate in either direction and a second pass is a no-op
/// 2. Concurrent edits keep local and preserve remote in a side-file
/// 3. Deletions are never propagated
/// 4. Untracked and excluded paths are never touched
/// 5. A missing or corrupt state file is a cold start
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use vaultsync::checksum::Digest;
use vaultsync::config::{Side, SyncConfig, LOCK_FILE_NAME, STATE_FILE_NAME};
use vaultsync::state::StateStore;
use vaultsync::sync::SyncEngine;
use vaultsync::SyncOutcome;

struct Dirs {
	_local: TempDir,
	_remote: TempDir,
	config: SyncConfig,
}

impl Dirs {
	fn local(&self, rel: &str) -> PathBuf {
		self.config.path_on(Side::Local, rel)
	}

	fn remote(&self, rel: &str) -> PathBuf {
		self.config.path_on(Side::Remote, rel)
	}

	fn engine(&self) -> SyncEngine {
		SyncEngine::new(self.config.clone())
	}

	fn baseline(&self, rel: &str) -> Option<Digest> {
		StateStore::load(self.config.state_file()).baseline(rel)
	}
}

/// Two empty roots tracking `notes/` and `CLAUDE.md`, excluding `notes/private/` and `*.tmp`
fn setup() -> Dirs {
	let local = TempDir::new().unwrap();
	let remote = TempDir::new().unwrap();
	let config = SyncConfig::builder(local.path(), remote.path())
		.include("notes/")
		.include("CLAUDE.md")
		.exclude("notes/private/")
		.exclude("*.tmp")
		.build()
		.unwrap();
	Dirs { _local: local, _remote: remote, config }
}

fn write(path: &Path, content: &str) {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(path, content).unwrap();
}

fn read(path: &Path) -> Option<String> {
	fs::read_to_string(path).ok()
}

/// Bring `rel` to an agreed baseline holding `content` on both sides
async fn synced(dirs: &Dirs, rel: &str, content: &str) {
	write(&dirs.local(rel), content);
	let report = dirs.engine().run_once().await.unwrap();
	assert_eq!(report.failed, 0);
	assert_eq!(read(&dirs.remote(rel)).as_deref(), Some(content));
	assert_eq!(dirs.baseline(rel), Some(Digest::of(content.as_bytes())));
}

fn side_files(dir: &Path, stem: &str) -> Vec<PathBuf> {
	let marker = format!("{}.obsidian-", stem);
	let mut found: Vec<PathBuf> = fs::read_dir(dir)
		.unwrap()
		.map(|e| e.unwrap().path())
		.filter(|p| p.file_name().unwrap().to_string_lossy().starts_with(&marker))
		.collect();
	found.sort();
	found
}

// ===================================================================
// PROPAGATION
// ===================================================================

#[tokio::test]
async fn test_local_edit_propagates_then_idempotent() {
	let dirs = setup();
	synced(&dirs, "notes/a.md", "H0").await;

	write(&dirs.local("notes/a.md"), "H1");
	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.to_remote, 1);
	assert_eq!(report.actions(), 1);
	assert_eq!(read(&dirs.remote("notes/a.md")).as_deref(), Some("H1"));
	assert_eq!(dirs.baseline("notes/a.md"), Some(Digest::of(b"H1")));

	let second = dirs.engine().run_once().await.unwrap();
	assert_eq!(second.actions(), 0, "second pass must not act");
	assert_eq!(second.unchanged, 1);
}

#[tokio::test]
async fn test_remote_edit_propagates() {
	let dirs = setup();
	synced(&dirs, "CLAUDE.md", "rules v1").await;

	write(&dirs.remote("CLAUDE.md"), "rules v2");
	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.to_local, 1);
	assert_eq!(read(&dirs.local("CLAUDE.md")).as_deref(), Some("rules v2"));
	assert_eq!(dirs.baseline("CLAUDE.md"), Some(Digest::of(b"rules v2")));
}

#[tokio::test]
async fn test_new_remote_file_creates_local_parents() {
	let dirs = setup();
	write(&dirs.remote("notes/deep/er/b.md"), "from vault");

	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.to_local, 1);
	assert_eq!(read(&dirs.local("notes/deep/er/b.md")).as_deref(), Some("from vault"));
}

#[tokio::test]
async fn test_copy_leaves_no_temp_files() {
	let dirs = setup();
	write(&dirs.local("notes/a.md"), "content");

	dirs.engine().run_once().await.unwrap();

	let leftovers: Vec<_> = fs::read_dir(dirs.remote("notes"))
		.unwrap()
		.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
		.filter(|n| n.ends_with(vaultsync::filter::TEMP_SUFFIX))
		.collect();
	assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
}

// ===================================================================
// CONFLICTS
// ===================================================================

#[tokio::test]
async fn test_concurrent_edits_conflict() {
	let dirs = setup();
	synced(&dirs, "notes/a.md", "H0").await;

	write(&dirs.local("notes/a.md"), "H1 local");
	write(&dirs.remote("notes/a.md"), "H2 remote");
	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.conflicts, 1);
	assert_eq!(read(&dirs.local("notes/a.md")).as_deref(), Some("H1 local"));
	assert_eq!(dirs.baseline("notes/a.md"), Some(Digest::of(b"H1 local")));

	let sides = side_files(&dirs.local("notes"), "a");
	assert_eq!(sides.len(), 1, "exactly one side-file expected");
	let name = sides[0].file_name().unwrap().to_string_lossy().into_owned();
	assert!(name.starts_with("a.obsidian-") && name.ends_with(".md"), "bad name {}", name);
	assert_eq!(read(&sides[0]).as_deref(), Some("H2 remote"));

	// Local won: the remote copy follows it and the next pass is quiet
	assert_eq!(read(&dirs.remote("notes/a.md")).as_deref(), Some("H1 local"));
	let second = dirs.engine().run_once().await.unwrap();
	assert_eq!(second.actions(), 0);
	assert_eq!(read(&dirs.local("notes/a.md")).as_deref(), Some("H1 local"));
	assert_eq!(side_files(&dirs.local("notes"), "a").len(), 1);
}

#[tokio::test]
async fn test_repeated_conflicts_never_overwrite_side_files() {
	let dirs = setup();
	synced(&dirs, "notes/a.md", "H0").await;

	for round in 1..=3 {
		write(&dirs.local("notes/a.md"), &format!("local {}", round));
		write(&dirs.remote("notes/a.md"), &format!("remote {}", round));
		let report = dirs.engine().run_once().await.unwrap();
		assert_eq!(report.conflicts, 1);
	}

	let mut contents: Vec<String> =
		side_files(&dirs.local("notes"), "a").iter().map(|p| read(p).unwrap()).collect();
	contents.sort();
	assert_eq!(contents, vec!["remote 1", "remote 2", "remote 3"]);
}

#[tokio::test]
async fn test_new_on_both_sides_identical_converges() {
	let dirs = setup();
	write(&dirs.local("notes/a.md"), "same");
	write(&dirs.remote("notes/a.md"), "same");

	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.converged, 1);
	assert_eq!(report.actions(), 0);
	assert!(side_files(&dirs.local("notes"), "a").is_empty());
	assert_eq!(dirs.baseline("notes/a.md"), Some(Digest::of(b"same")));
}

#[tokio::test]
async fn test_new_on_both_sides_different_conflicts() {
	let dirs = setup();
	write(&dirs.local("notes/a.md"), "mine");
	write(&dirs.remote("notes/a.md"), "theirs");

	let outcome = dirs.engine().reconciler().reconcile_path("notes/a.md").unwrap();

	match outcome {
		SyncOutcome::Conflict { side_file } => {
			assert_eq!(read(&side_file).as_deref(), Some("theirs"));
			assert_eq!(side_file.parent(), Some(dirs.local("notes").as_path()));
		}
		other => panic!("expected conflict, got {:?}", other),
	}
	assert_eq!(read(&dirs.local("notes/a.md")).as_deref(), Some("mine"));
}

// ===================================================================
// DELETIONS
// ===================================================================

#[tokio::test]
async fn test_local_delete_not_propagated() {
	let dirs = setup();
	synced(&dirs, "notes/a.md", "H0").await;

	fs::remove_file(dirs.local("notes/a.md")).unwrap();
	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.actions(), 0);
	assert!(!dirs.local("notes/a.md").exists(), "local must not be recreated");
	assert_eq!(read(&dirs.remote("notes/a.md")).as_deref(), Some("H0"));
	assert_eq!(dirs.baseline("notes/a.md"), Some(Digest::of(b"H0")));
}

#[tokio::test]
async fn test_remote_delete_not_propagated() {
	let dirs = setup();
	synced(&dirs, "notes/a.md", "H0").await;

	fs::remove_file(dirs.remote("notes/a.md")).unwrap();
	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.actions(), 0);
	assert!(!dirs.remote("notes/a.md").exists(), "remote must not be recreated");
	assert_eq!(read(&dirs.local("notes/a.md")).as_deref(), Some("H0"));
}

// ===================================================================
// FILTERING
// ===================================================================

#[tokio::test]
async fn test_untracked_and_excluded_paths_untouched() {
	let dirs = setup();
	write(&dirs.local("src/main.c"), "int main;");
	write(&dirs.local("notes/private/secret.md"), "secret");
	write(&dirs.local("notes/scratch.tmp"), "tmp");
	write(&dirs.local("notes/a.obsidian-20240101-1200.md"), "old conflict");
	write(&dirs.local("notes/kept.md"), "kept");

	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.to_remote, 1);
	assert!(dirs.remote("notes/kept.md").exists());
	assert!(!dirs.remote("src").exists());
	assert!(!dirs.remote("notes/private").exists());
	assert!(!dirs.remote("notes/scratch.tmp").exists());
	assert!(!dirs.remote("notes/a.obsidian-20240101-1200.md").exists());

	let tracked = dirs.engine().reconciler().tracked_paths();
	assert_eq!(tracked.into_iter().collect::<Vec<_>>(), vec!["notes/kept.md".to_string()]);
}

#[tokio::test]
async fn test_directory_named_like_exclude_glob_is_walked() {
	let local = TempDir::new().unwrap();
	let remote = TempDir::new().unwrap();
	let config = SyncConfig::builder(local.path(), remote.path())
		.include("docs/")
		.exclude("archive")
		.build()
		.unwrap();
	let note = config.path_on(Side::Local, "docs/archive/note.md");
	write(&note, "kept in an archive folder");
	assert!(config.is_tracked("docs/archive/note.md"));

	let engine = SyncEngine::new(config.clone());
	let report = engine.run_once().await.unwrap();

	// The full pass must agree with a live notification for the same path
	assert_eq!(report.to_remote, 1);
	assert_eq!(
		read(&config.path_on(Side::Remote, "docs/archive/note.md")).as_deref(),
		Some("kept in an archive folder")
	);
	assert!(engine.reconciler().tracked_paths().contains("docs/archive/note.md"));
}

#[tokio::test]
async fn test_engine_files_never_synced() {
	let local = TempDir::new().unwrap();
	let remote = TempDir::new().unwrap();
	let config = SyncConfig::builder(local.path(), remote.path())
		.include("a.md")
		.include(STATE_FILE_NAME)
		.include(LOCK_FILE_NAME)
		.build()
		.unwrap();
	fs::write(config.local_root().join("a.md"), "a").unwrap();
	fs::write(config.lock_file(), "1").unwrap();

	let engine = SyncEngine::new(config.clone());
	engine.run_once().await.unwrap();
	engine.run_once().await.unwrap();

	assert!(config.remote_root().join("a.md").exists());
	assert!(config.state_file().exists());
	assert!(!config.remote_root().join(STATE_FILE_NAME).exists());
	assert!(!config.remote_root().join(LOCK_FILE_NAME).exists());
}

// ===================================================================
// STATE
// ===================================================================

#[tokio::test]
async fn test_corrupt_state_is_cold_start() {
	let dirs = setup();
	fs::write(dirs.config.state_file(), "{ not json").unwrap();
	write(&dirs.local("notes/a.md"), "same");
	write(&dirs.remote("notes/a.md"), "same");
	write(&dirs.local("notes/b.md"), "only local");

	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.failed, 0);
	assert_eq!(report.converged, 1);
	assert_eq!(report.to_remote, 1);
	assert_eq!(dirs.baseline("notes/a.md"), Some(Digest::of(b"same")));
	assert_eq!(dirs.baseline("notes/b.md"), Some(Digest::of(b"only local")));
}

#[tokio::test]
async fn test_state_file_format() {
	let dirs = setup();
	synced(&dirs, "notes/a.md", "H0").await;

	let text = fs::read_to_string(dirs.config.state_file()).unwrap();
	let value: serde_json::Value = serde_json::from_str(&text).unwrap();
	let entry = &value["notes/a.md"];

	assert_eq!(entry["checksum"].as_str(), Some(Digest::of(b"H0").to_hex().as_str()));
	assert_eq!(entry["checksum"].as_str().map(str::len), Some(64));
	assert!(entry["last_sync"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_one_shot_ignores_lock() {
	let dirs = setup();
	fs::write(dirs.config.lock_file(), "1").unwrap();
	write(&dirs.local("notes/a.md"), "content");

	let report = dirs.engine().run_once().await.unwrap();

	assert_eq!(report.to_remote, 1);
	assert_eq!(fs::read_to_string(dirs.config.lock_file()).unwrap(), "1");
}
