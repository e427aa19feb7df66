//! Project blueprint loading
//!
//! The blueprint is the YAML frontmatter of `VAULT-BLUEPRINT.md` in the
//! project root. A plain TOML file with the same structure is accepted too.
//!
//! ```yaml
//! vault:
//!   root: "/home/me/Obsidian"
//!   project_path: "Firmware/sensor-reading"
//! sync:
//!   include: [docs/, CLAUDE.md]
//!   exclude: [src/, "*.obsidian-*.md"]
//! ```

use crate::config::{SyncConfig, SyncConfigBuilder};
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default blueprint file name in the project root
pub const BLUEPRINT_NAME: &str = "VAULT-BLUEPRINT.md";

#[derive(Debug, Clone, Deserialize)]
pub struct Blueprint {
	pub vault: VaultSection,

	#[serde(default)]
	pub sync: SyncSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultSection {
	/// Vault root directory
	pub root: PathBuf,

	/// Project folder inside the vault
	pub project_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncSection {
	pub include: Vec<String>,
	pub exclude: Vec<String>,
	pub local_debounce_ms: Option<u64>,
	pub remote_debounce_ms: Option<u64>,
}

impl Blueprint {
	/// Parse blueprint text; `.toml` files are TOML, anything else is
	/// Markdown with YAML frontmatter
	pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
		let is_toml = path.extension().map(|e| e.eq_ignore_ascii_case("toml")).unwrap_or(false);
		if is_toml {
			return toml::from_str(text)
				.map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() });
		}

		let yaml = frontmatter(text)
			.ok_or_else(|| ConfigError::MissingFrontmatter { path: path.to_path_buf() })?;
		serde_yaml::from_str(yaml)
			.map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })
	}

	/// Read and parse a blueprint file
	pub fn read(path: &Path) -> Result<Self, ConfigError> {
		if !path.exists() {
			return Err(ConfigError::BlueprintMissing { path: path.to_path_buf() });
		}
		let text = std::fs::read_to_string(path)
			.map_err(|e| ConfigError::Io { path: path.to_path_buf(), source: e })?;
		Self::parse(&text, path)
	}

	/// Vault project folder: vault root joined with the project path
	pub fn remote_root(&self) -> PathBuf {
		self.vault
			.project_path
			.split(|c| c == '/' || c == '\\')
			.filter(|part| !part.is_empty())
			.fold(self.vault.root.clone(), |acc, part| acc.join(part))
	}

	/// Config builder for a project rooted at `project_dir`.
	///
	/// Fails if the vault root or the project folder inside it is missing.
	pub fn to_builder(&self, project_dir: &Path) -> Result<SyncConfigBuilder, ConfigError> {
		if !self.vault.root.exists() {
			return Err(ConfigError::RootMissing { what: "Vault root", path: self.vault.root.clone() });
		}
		let remote_root = self.remote_root();
		if !remote_root.exists() {
			return Err(ConfigError::RootMissing { what: "Vault project folder", path: remote_root });
		}

		let mut builder = SyncConfig::builder(project_dir, remote_root)
			.includes(self.sync.include.iter().cloned())
			.excludes(self.sync.exclude.iter().cloned());
		if let Some(ms) = self.sync.local_debounce_ms {
			builder = builder.local_debounce(Duration::from_millis(ms));
		}
		if let Some(ms) = self.sync.remote_debounce_ms {
			builder = builder.remote_debounce(Duration::from_millis(ms));
		}
		Ok(builder)
	}
}

/// Resolve the full configuration for a project directory.
///
/// `config_file` overrides the default `<project>/VAULT-BLUEPRINT.md`.
pub fn load_config(project_dir: &Path, config_file: Option<&Path>) -> Result<SyncConfig, ConfigError> {
	let path = match config_file {
		Some(p) => p.to_path_buf(),
		None => project_dir.join(BLUEPRINT_NAME),
	};
	Blueprint::read(&path)?.to_builder(project_dir)?.build()
}

/// Text between the first two `---` delimiters
fn frontmatter(text: &str) -> Option<&str> {
	let mut parts = text.splitn(3, "---");
	let _before = parts.next()?;
	let yaml = parts.next()?;
	parts.next()?;
	Some(yaml)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const BLUEPRINT: &str = r#"---
# VAULT-BLUEPRINT.md
project:
  name: sensor-reading

vault:
  root: "VAULT_ROOT"
  project_path: "Firmware/sensor-reading"

sync:
  include:
    - docs/
    - CLAUDE.md
  exclude:
    - src/
    - "*.obsidian-*.md"
  remote_debounce_ms: 8000
---

# Vault Blueprint
"#;

	#[test]
	fn test_parse_frontmatter() {
		let bp = Blueprint::parse(BLUEPRINT, Path::new(BLUEPRINT_NAME)).unwrap();

		assert_eq!(bp.vault.project_path, "Firmware/sensor-reading");
		assert_eq!(bp.sync.include, vec!["docs/", "CLAUDE.md"]);
		assert_eq!(bp.sync.exclude, vec!["src/", "*.obsidian-*.md"]);
		assert_eq!(bp.sync.remote_debounce_ms, Some(8000));
		assert_eq!(bp.sync.local_debounce_ms, None);
		assert_eq!(
			bp.remote_root(),
			PathBuf::from("VAULT_ROOT").join("Firmware").join("sensor-reading")
		);
	}

	#[test]
	fn test_missing_frontmatter() {
		let err = Blueprint::parse("# just markdown\n", Path::new(BLUEPRINT_NAME)).unwrap_err();
		assert!(matches!(err, ConfigError::MissingFrontmatter { .. }));
	}

	#[test]
	fn test_bad_yaml() {
		let err = Blueprint::parse("---\nvault: [\n---\n", Path::new(BLUEPRINT_NAME)).unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
	}

	#[test]
	fn test_parse_toml() {
		let text = r#"
[vault]
root = "/vault"
project_path = "p"

[sync]
include = ["docs"]
"#;
		let bp = Blueprint::parse(text, Path::new("vault-sync.toml")).unwrap();
		assert_eq!(bp.sync.include, vec!["docs"]);
		assert!(bp.sync.exclude.is_empty());
	}

	#[test]
	fn test_load_config_end_to_end() {
		let project = TempDir::new().unwrap();
		let vault = TempDir::new().unwrap();
		fs::create_dir_all(vault.path().join("Firmware/sensor-reading")).unwrap();
		let text = BLUEPRINT.replace("VAULT_ROOT", &vault.path().to_string_lossy().replace('\\', "/"));
		fs::write(project.path().join(BLUEPRINT_NAME), text).unwrap();

		let config = load_config(project.path(), None).unwrap();

		assert!(config.is_tracked("docs/a.md"));
		assert!(!config.is_tracked("src/main.c"));
		assert_eq!(config.debounce(crate::config::Side::Remote), Duration::from_millis(8000));
	}

	#[test]
	fn test_missing_blueprint() {
		let project = TempDir::new().unwrap();
		let err = load_config(project.path(), None).unwrap_err();
		assert!(matches!(err, ConfigError::BlueprintMissing { .. }));
	}

	#[test]
	fn test_missing_project_folder() {
		let project = TempDir::new().unwrap();
		let vault = TempDir::new().unwrap();
		let text = BLUEPRINT.replace("VAULT_ROOT", &vault.path().to_string_lossy().replace('\\', "/"));
		fs::write(project.path().join(BLUEPRINT_NAME), text).unwrap();

		let err = load_config(project.path(), None).unwrap_err();
		assert!(matches!(err, ConfigError::RootMissing { what: "Vault project folder", .. }));
	}
}

// vim: ts=4
