//! Content digests for change detection.
//!
//! A file that is missing or cannot be read has no digest. Unreadable content
//! is treated the same as absent content: never fatal, retried on the next pass.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// 256-bit BLAKE3 content digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
	/// Digest of an in-memory buffer
	pub fn of(data: &[u8]) -> Self {
		Digest(*blake3::hash(data).as_bytes())
	}

	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}
}

impl fmt::Display for Digest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl fmt::Debug for Digest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// Short form is enough to tell digests apart in logs
		write!(f, "Digest({}..)", &self.to_hex()[..12])
	}
}

impl FromStr for Digest {
	type Err = hex::FromHexError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut bytes = [0u8; 32];
		hex::decode_to_slice(s.trim(), &mut bytes)?;
		Ok(Digest(bytes))
	}
}

impl Serialize for Digest {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> Deserialize<'de> for Digest {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// Digest the full content of a regular file.
///
/// Returns `None` when the file is missing, is not a regular file, or any read
/// error occurs.
pub fn digest(path: &Path) -> Option<Digest> {
	match try_digest(path) {
		Ok(d) => d,
		Err(e) => {
			debug!("Cannot digest {}: {}", path.display(), e);
			None
		}
	}
}

fn try_digest(path: &Path) -> io::Result<Option<Digest>> {
	let meta = match std::fs::metadata(path) {
		Ok(meta) => meta,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(e),
	};
	if !meta.is_file() {
		return Ok(None);
	}

	let mut file = File::open(path)?;
	let mut hasher = blake3::Hasher::new();
	io::copy(&mut file, &mut hasher)?;
	Ok(Some(Digest(*hasher.finalize().as_bytes())))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn test_digest_matches_content() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("a.md");
		fs::write(&path, b"hello vault").unwrap();

		assert_eq!(digest(&path), Some(Digest::of(b"hello vault")));
	}

	#[test]
	fn test_digest_changes_with_content() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("a.md");
		fs::write(&path, "one").unwrap();
		let first = digest(&path);
		fs::write(&path, "two").unwrap();
		let second = digest(&path);

		assert!(first.is_some());
		assert_ne!(first, second);
	}

	#[test]
	fn test_missing_file_is_absent() {
		let dir = TempDir::new().unwrap();
		assert_eq!(digest(&dir.path().join("nope.md")), None);
	}

	#[test]
	fn test_directory_is_absent() {
		let dir = TempDir::new().unwrap();
		assert_eq!(digest(dir.path()), None);
	}

	#[cfg(unix)]
	#[test]
	fn test_unreadable_file_is_absent() {
		use std::os::unix::fs::PermissionsExt;

		let dir = TempDir::new().unwrap();
		let path = dir.path().join("secret.md");
		fs::write(&path, "x").unwrap();
		fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

		// root can read anything, so only assert when the open really fails
		if File::open(&path).is_err() {
			assert_eq!(digest(&path), None);
		}
	}

	#[test]
	fn test_hex_round_trip() {
		let d = Digest::of(b"abc");
		let parsed: Digest = d.to_hex().parse().unwrap();
		assert_eq!(parsed, d);
		assert_eq!(d.to_hex().len(), 64);
		assert!("not-hex".parse::<Digest>().is_err());
	}
}

// vim: ts=4
