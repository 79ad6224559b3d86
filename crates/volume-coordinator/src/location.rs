use serde::{Deserialize, Serialize};

use super::{
	entry::Entry,
	types::{RootType, VolumeRecord, VolumeType},
};

const DRIVE_ROOT_PATH: &str = "/root";
const SHARED_DRIVES_DIRECTORY_PATH: &str = "/team_drives";
const COMPUTERS_DIRECTORY_PATH: &str = "/Computers";
const DRIVE_OTHER_PATH: &str = "/other";
const FILES_BY_ID_PATH: &str = "/.files-by-id";

// `/.files-by-id/<id>` itself is read-only, anything below it isn't
const FILES_BY_ID_WRITABLE_SEGMENTS: usize = 4;
// `/team_drives/<name>` and `/Computers/<name>`
const NAMED_ROOT_SEGMENTS: usize = 3;

/// Where an entry lives and what may be done with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLocation {
	/// Owning volume, looked up again in the registry when needed
	pub volume_id: Option<String>,
	pub root_type: RootType,
	pub is_root_entry: bool,
	pub is_read_only: bool,
}

impl EntryLocation {
	/// Fake entries are always read-only roots
	pub(crate) fn for_fake_entry(volume: Option<&VolumeRecord>, root_type: RootType) -> Self {
		Self {
			volume_id: volume.map(|v| v.volume_id.clone()),
			root_type,
			is_root_entry: true,
			is_read_only: true,
		}
	}

	/// Classifies a real entry living on `volume`, `None` when it falls outside every known
	/// root of the volume
	pub(crate) fn classify(volume: &VolumeRecord, entry: &Entry) -> Option<Self> {
		let (root_type, is_root_entry, is_read_only) = if volume.volume_type == VolumeType::Drive
		{
			classify_drive_path(entry, volume.is_read_only)?
		} else {
			let is_root_entry = volume.root_entry.as_ref() == Some(entry);
			// The Android files root is writable on disk, but only its sub directories are
			// offered for writing
			let is_read_only = if volume.volume_type == VolumeType::AndroidFiles && is_root_entry {
				true
			} else {
				volume.is_read_only
			};

			(volume.volume_type.root_type(), is_root_entry, is_read_only)
		};

		Some(Self {
			volume_id: Some(volume.volume_id.clone()),
			root_type,
			is_root_entry,
			is_read_only,
		})
	}
}

fn is_at_or_under(path: &str, prefix: &str) -> bool {
	path.strip_prefix(prefix)
		.is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Drive roots are `/root`, `/team_drives`, `/Computers`, `/other` and `/.files-by-id`
/// instead of `/`
fn classify_drive_path(entry: &Entry, volume_read_only: bool) -> Option<(RootType, bool, bool)> {
	let path = entry.full_path();

	if is_at_or_under(path, DRIVE_ROOT_PATH) {
		return Some((RootType::Drive, path == DRIVE_ROOT_PATH, volume_read_only));
	}

	if is_at_or_under(path, SHARED_DRIVES_DIRECTORY_PATH) {
		return Some(if path == SHARED_DRIVES_DIRECTORY_PATH {
			(RootType::SharedDrivesGrandRoot, true, true)
		} else if entry.path_segments() == NAMED_ROOT_SEGMENTS {
			(RootType::SharedDrive, true, false)
		} else {
			(RootType::SharedDrive, false, volume_read_only)
		});
	}

	if is_at_or_under(path, COMPUTERS_DIRECTORY_PATH) {
		return Some(if path == COMPUTERS_DIRECTORY_PATH {
			(RootType::ComputersGrandRoot, true, true)
		} else if entry.path_segments() == NAMED_ROOT_SEGMENTS {
			(RootType::Computer, true, true)
		} else {
			(RootType::Computer, false, volume_read_only)
		});
	}

	if is_at_or_under(path, DRIVE_OTHER_PATH) {
		return Some((RootType::DriveOther, path == DRIVE_OTHER_PATH, true));
	}

	if is_at_or_under(path, FILES_BY_ID_PATH) {
		let is_read_only =
			entry.path_segments() < FILES_BY_ID_WRITABLE_SEGMENTS || volume_read_only;
		return Some((RootType::DriveOther, path == FILES_BY_ID_PATH, is_read_only));
	}

	None
}
