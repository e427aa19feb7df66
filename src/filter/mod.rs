//! Tracked-path filtering
//!
//! A relative path is tracked iff it survives every exclude rule and matches at
//! least one include rule. Each exclude rule is tried three ways: as an exact
//! path, as a subtree prefix, and as a glob against the basename. Include rules
//! are exact paths or subtree prefixes.

mod patterns;

pub use patterns::TEMP_SUFFIX;

use crate::error::ConfigError;
use patterns::BasenameMatcher;
use std::path::{Component, Path};

/// Ordered include/exclude rules, compiled once
#[derive(Debug, Clone)]
pub struct FilterSpec {
	includes: Vec<String>,
	excludes: Vec<String>,
	basenames: BasenameMatcher,
}

impl FilterSpec {
	/// Build a filter from raw rule strings.
	///
	/// Include rules lose their trailing `/`, exclude rules lose leading and
	/// trailing `/`. Empty rules are dropped.
	pub fn new<I, E>(includes: I, excludes: E) -> Result<Self, ConfigError>
	where
		I: IntoIterator,
		I::Item: AsRef<str>,
		E: IntoIterator,
		E::Item: AsRef<str>,
	{
		let includes: Vec<String> = includes
			.into_iter()
			.map(|s| s.as_ref().replace('\\', "/").trim_end_matches('/').to_string())
			.filter(|s| !s.is_empty())
			.collect();
		let excludes: Vec<String> = excludes
			.into_iter()
			.map(|s| s.as_ref().replace('\\', "/").trim_matches('/').to_string())
			.filter(|s| !s.is_empty())
			.collect();

		let basenames = BasenameMatcher::new(&excludes)?;
		Ok(Self { includes, excludes, basenames })
	}

	/// Add exact-path exclusions (used for the engine's own files)
	pub fn with_reserved<I>(mut self, paths: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = String>,
	{
		self.excludes.extend(paths);
		self.basenames = BasenameMatcher::new(&self.excludes)?;
		Ok(self)
	}

	/// Decide whether a relative, slash-separated path is tracked
	pub fn is_tracked(&self, rel: &str) -> bool {
		if rel.is_empty() || self.is_excluded(rel) {
			return false;
		}
		self.includes.iter().any(|inc| under(rel, inc))
	}

	/// True if a directory (and so its whole subtree) can be skipped.
	///
	/// A directory is skipped when an exact or subtree exclude rule covers it,
	/// or when no include rule could match anything beneath it. Basename globs
	/// only ever apply to file names, never to directory components.
	pub fn is_excluded_dir(&self, rel: &str) -> bool {
		if rel.is_empty() {
			return false;
		}
		if self.excludes.iter().any(|ex| under(rel, ex)) {
			return true;
		}
		!self.includes.iter().any(|inc| under(rel, inc) || under(inc, rel))
	}

	fn is_excluded(&self, rel: &str) -> bool {
		if self.excludes.iter().any(|ex| under(rel, ex)) {
			return true;
		}
		let basename = rel.rsplit('/').next().unwrap_or(rel);
		self.basenames.is_match(basename)
	}
}

/// `path` equals `prefix` or lies in its subtree
fn under(path: &str, prefix: &str) -> bool {
	path == prefix
		|| (path.len() > prefix.len()
			&& path.starts_with(prefix)
			&& path.as_bytes()[prefix.len()] == b'/')
}

/// Convert a relative path into the slash-normalized tracked form.
///
/// Returns `None` for empty paths, absolute paths, and paths containing `..`.
pub fn normalize_rel(path: &Path) -> Option<String> {
	let mut parts = Vec::new();
	for component in path.components() {
		match component {
			Component::Normal(part) => parts.push(part.to_str()?.to_string()),
			Component::CurDir => {}
			Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
		}
	}
	if parts.is_empty() {
		None
	} else {
		Some(parts.join("/"))
	}
}

/// Relative tracked form of `path` under `root`, if it lies beneath it
pub fn relative_to(path: &Path, root: &Path) -> Option<String> {
	normalize_rel(path.strip_prefix(root).ok()?)
}


// vim: ts=4
