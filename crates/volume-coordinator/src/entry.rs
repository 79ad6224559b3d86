use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::RootType;

const FAKE_FILESYSTEM_PREFIX: &str = "fake:";

/// Identity of a mounted filesystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSystemId(String);

impl FileSystemId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for FileSystemId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A filesystem entry as seen by callers: the filesystem it lives on and its absolute path
/// inside it. Fake entries stand for virtual roots and carry the root type they represent.
///
/// Two entries are the same entry when all of their fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
	filesystem: FileSystemId,
	full_path: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	fake_root: Option<RootType>,
}

impl Entry {
	pub fn new(filesystem: FileSystemId, full_path: impl Into<String>) -> Self {
		Self {
			filesystem,
			full_path: full_path.into(),
			fake_root: None,
		}
	}

	#[must_use]
	pub fn root(filesystem: FileSystemId) -> Self {
		Self::new(filesystem, "/")
	}

	/// Synthetic root of `root_type` for the volume `volume_id`
	#[must_use]
	pub fn fake(volume_id: &str, root_type: RootType) -> Self {
		Self {
			filesystem: FileSystemId(format!("{FAKE_FILESYSTEM_PREFIX}{volume_id}")),
			full_path: format!("/{root_type}"),
			fake_root: Some(root_type),
		}
	}

	/// Entry for `path` on the same filesystem
	#[must_use]
	pub fn sibling(&self, path: impl Into<String>) -> Self {
		Self::new(self.filesystem.clone(), path)
	}

	#[must_use]
	pub const fn filesystem(&self) -> &FileSystemId {
		&self.filesystem
	}

	#[must_use]
	pub fn full_path(&self) -> &str {
		&self.full_path
	}

	#[must_use]
	pub const fn fake_root(&self) -> Option<RootType> {
		self.fake_root
	}

	#[must_use]
	pub const fn is_fake(&self) -> bool {
		self.fake_root.is_some()
	}

	/// Entries must carry an absolute path
	#[must_use]
	pub fn is_valid(&self) -> bool {
		self.full_path.starts_with('/')
	}

	#[must_use]
	pub fn is_same_filesystem(&self, other: &FileSystemId) -> bool {
		!self.is_fake() && &self.filesystem == other
	}

	/// Number of pieces when splitting the path on `/`, counting the empty one before the
	/// leading slash: `/a/b` has 3
	#[must_use]
	pub fn path_segments(&self) -> usize {
		self.full_path.split('/').count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fake_entries_never_share_a_real_filesystem() {
		let fake = Entry::fake("drive:me", RootType::DriveOffline);

		assert!(fake.is_fake());
		assert!(fake.is_valid());
		assert_eq!(fake.full_path(), "/drive_offline");
		assert!(!fake.is_same_filesystem(&FileSystemId::new("fake:drive:me")));
	}

	#[test]
	fn counts_segments_like_a_split() {
		let root = Entry::root(FileSystemId::new("fs"));

		assert_eq!(root.sibling("/.files-by-id/abc").path_segments(), 3);
		assert_eq!(root.sibling("/.files-by-id/abc/def").path_segments(), 4);
		assert!(!root.sibling("relative/path").is_valid());
		assert!(!root.sibling("").is_valid());
	}
}
