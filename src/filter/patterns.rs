//! Basename glob matching for exclude rules

use crate::error::ConfigError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Suffix of in-flight copy temp files
pub const TEMP_SUFFIX: &str = ".vault-sync-tmp";

/// Basename globs that are never tracked, whatever the configuration says
const ALWAYS_EXCLUDED: &[&str] = &[
	"*.vault-sync-tmp", // in-flight copies
	"*.obsidian-[0-9][0-9][0-9][0-9][0-9][0-9][0-9][0-9]-[0-9][0-9][0-9][0-9]*", // conflict side-files
];

/// Compiled basename globs: the user's exclude rules plus the built-in set
#[derive(Debug, Clone)]
pub struct BasenameMatcher {
	user: GlobSet,
	always_exclude: GlobSet,
}

impl BasenameMatcher {
	pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
		let builtin: Vec<String> = ALWAYS_EXCLUDED.iter().map(|s| s.to_string()).collect();
		Ok(Self { user: build_glob_set(patterns)?, always_exclude: build_glob_set(&builtin)? })
	}

	/// True if the basename matches any user or built-in glob
	pub fn is_match(&self, basename: &str) -> bool {
		self.always_exclude.is_match(basename) || self.user.is_match(basename)
	}
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
	let mut builder = GlobSetBuilder::new();

	for pattern in patterns {
		let glob = GlobBuilder::new(pattern).literal_separator(true).build().map_err(|e| {
			ConfigError::InvalidPattern { pattern: pattern.clone(), message: e.to_string() }
		})?;
		builder.add(glob);
	}

	builder.build().map_err(|e| ConfigError::InvalidPattern {
		pattern: patterns.join(", "),
		message: e.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_user_globs() {
		let matcher = BasenameMatcher::new(&["*.log".to_string(), "draft-*".to_string()]).unwrap();

		assert!(matcher.is_match("build.log"));
		assert!(matcher.is_match("draft-notes.md"));
		assert!(!matcher.is_match("notes.md"));
	}

	#[test]
	fn test_literal_rule_matches_exact_basename() {
		let matcher = BasenameMatcher::new(&["CLAUDE.local.md".to_string()]).unwrap();

		assert!(matcher.is_match("CLAUDE.local.md"));
		assert!(!matcher.is_match("CLAUDE.md"));
	}

	#[test]
	fn test_always_excluded() {
		let matcher = BasenameMatcher::new(&[]).unwrap();

		assert!(matcher.is_match("a.md.vault-sync-tmp"));
		assert!(matcher.is_match("a.obsidian-20240101-1200.md"));
		assert!(matcher.is_match("a.obsidian-20240101-1200-2.md"));
		assert!(!matcher.is_match("a.obsidian.md"));
		assert!(!matcher.is_match("a.md"));
	}

	#[test]
	fn test_invalid_pattern() {
		let err = BasenameMatcher::new(&["[unclosed".to_string()]).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidPattern { .. }));
	}
}

// vim: ts=4
