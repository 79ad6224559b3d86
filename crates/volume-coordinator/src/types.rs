use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
	entry::{Entry, FileSystemId},
	event::{VolumeError, VolumeMetadata},
};

/// Kind of mounted volume.
///
/// Written as `snake_case`, read ignoring ASCII case so `PROVIDED` is accepted too.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
	strum::IntoStaticStr,
)]
#[serde(try_from = "String", into = "&'static str")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum VolumeType {
	Downloads,
	Drive,
	Removable,
	Archive,
	Provided,
	Mtp,
	MediaView,
	Crostini,
	AndroidFiles,
	DocumentsProvider,
	Smb,
	Testing,
}

impl TryFrom<String> for VolumeType {
	type Error = strum::ParseError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl VolumeType {
	/// Root type of entries living directly on a volume of this kind
	#[must_use]
	pub const fn root_type(self) -> RootType {
		match self {
			Self::Downloads => RootType::Downloads,
			Self::Drive => RootType::Drive,
			Self::Removable => RootType::Removable,
			Self::Archive => RootType::Archive,
			Self::Provided => RootType::Provided,
			Self::Mtp => RootType::Mtp,
			Self::MediaView => RootType::MediaView,
			Self::Crostini => RootType::Crostini,
			Self::AndroidFiles => RootType::AndroidFiles,
			Self::DocumentsProvider => RootType::DocumentsProvider,
			Self::Smb => RootType::Smb,
			Self::Testing => RootType::Testing,
		}
	}

	/// Whether a volume of this kind is worth listing even when its root couldn't be resolved.
	/// Removable and provided volumes are kept so they can still be unmounted or formatted.
	#[must_use]
	pub const fn is_listed_without_root(self) -> bool {
		!matches!(self, Self::Downloads | Self::Drive)
	}
}

/// Navigation root an entry belongs to
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Hash,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RootType {
	Downloads,
	Archive,
	Removable,
	Drive,
	SharedDrivesGrandRoot,
	SharedDrive,
	ComputersGrandRoot,
	Computer,
	DriveOther,
	DriveOffline,
	DriveSharedWithMe,
	DriveRecent,
	MediaView,
	Provided,
	Mtp,
	Crostini,
	AndroidFiles,
	DocumentsProvider,
	Smb,
	Testing,
}

/// Immutable snapshot of a mounted volume, taken when it was added to the registry.
///
/// Readers get it behind an [`Arc`](std::sync::Arc); a remount replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRecord {
	pub volume_id: String,
	pub volume_type: VolumeType,
	pub device_path: Option<String>,
	pub source_path: Option<String>,
	pub label: Option<String>,
	pub is_read_only: bool,
	pub profile_is_current: bool,
	/// Root directory of the mounted filesystem, `None` if the mount partially failed
	pub root_entry: Option<Entry>,
	/// Synthetic roots without real backing storage
	pub fake_entries: BTreeMap<RootType, Entry>,
	/// Soft failure the volume was mounted with, if any
	pub mount_condition: Option<VolumeError>,
}

impl VolumeRecord {
	/// Builds a record out of the metadata reported by the mount service
	#[must_use]
	pub fn from_metadata(metadata: &VolumeMetadata) -> Self {
		let root_entry = metadata
			.file_system_id
			.as_deref()
			.map(|id| Entry::root(FileSystemId::new(id)));

		let mut fake_entries = BTreeMap::new();
		// Drive exposes offline and shared-with-me listings as virtual roots
		if metadata.volume_type == VolumeType::Drive && root_entry.is_some() {
			for root_type in [RootType::DriveOffline, RootType::DriveSharedWithMe] {
				fake_entries.insert(root_type, Entry::fake(&metadata.volume_id, root_type));
			}
		}

		Self {
			volume_id: metadata.volume_id.clone(),
			volume_type: metadata.volume_type,
			device_path: metadata.device_path.clone(),
			source_path: metadata.source_path.clone(),
			label: metadata.volume_label.clone(),
			is_read_only: metadata.is_read_only,
			profile_is_current: metadata.profile.is_current_profile,
			root_entry,
			fake_entries,
			mount_condition: metadata.mount_condition,
		}
	}

	#[must_use]
	pub fn file_system(&self) -> Option<&FileSystemId> {
		self.root_entry.as_ref().map(Entry::filesystem)
	}

	/// Whether this record should be part of the volume list
	#[must_use]
	pub const fn is_listed(&self) -> bool {
		self.root_entry.is_some() || self.volume_type.is_listed_without_root()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
	Online,
	Metered,
	Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionReason {
	NoNetwork,
	NoService,
}

/// Connection state of the cloud drive backing Drive volumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
	#[serde(rename = "type")]
	pub kind: ConnectionType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<ConnectionReason>,
	#[serde(default)]
	pub has_cellular_network_access: bool,
}

impl ConnectionState {
	#[must_use]
	pub const fn online() -> Self {
		Self {
			kind: ConnectionType::Online,
			reason: None,
			has_cellular_network_access: false,
		}
	}
}

impl Default for ConnectionState {
	fn default() -> Self {
		Self {
			kind: ConnectionType::Offline,
			reason: Some(ConnectionReason::NoService),
			has_cellular_network_access: false,
		}
	}
}
