//! Mount completion protocol spoken by the platform mount service.
//!
//! Events arrive as [`RawMountEvent`]s, with free-form strings for the event type and the
//! status, and are validated into [`MountEvent`]s before anything touches the registry.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{error::Error, types::VolumeType};

/// Error codes reported by the mount service, plus [`VolumeError::Timeout`] which is
/// synthesized locally when a request never gets an answer.
///
/// Parsing accepts the wire spelling (`error_unknown_filesystem`) and the constant name
/// (`UNKNOWN_FILESYSTEM`), ignoring ASCII case.
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
#[strum(ascii_case_insensitive)]
pub enum VolumeError {
	#[strum(serialize = "timeout")]
	Timeout,
	#[strum(to_string = "error_unknown", serialize = "UNKNOWN")]
	Unknown,
	#[strum(to_string = "error_internal", serialize = "INTERNAL")]
	Internal,
	#[strum(to_string = "error_invalid_argument", serialize = "INVALID_ARGUMENT")]
	InvalidArgument,
	#[strum(to_string = "error_invalid_path", serialize = "INVALID_PATH")]
	InvalidPath,
	#[strum(to_string = "error_path_already_mounted", serialize = "ALREADY_MOUNTED")]
	AlreadyMounted,
	#[strum(to_string = "error_path_not_mounted", serialize = "PATH_NOT_MOUNTED")]
	PathNotMounted,
	#[strum(
		to_string = "error_directory_creation_failed",
		serialize = "DIRECTORY_CREATION_FAILED"
	)]
	DirectoryCreationFailed,
	#[strum(to_string = "error_invalid_mount_options", serialize = "INVALID_MOUNT_OPTIONS")]
	InvalidMountOptions,
	#[strum(
		to_string = "error_invalid_unmount_options",
		serialize = "INVALID_UNMOUNT_OPTIONS"
	)]
	InvalidUnmountOptions,
	#[strum(
		to_string = "error_insufficient_permissions",
		serialize = "INSUFFICIENT_PERMISSIONS"
	)]
	InsufficientPermissions,
	#[strum(
		to_string = "error_mount_program_not_found",
		serialize = "MOUNT_PROGRAM_NOT_FOUND"
	)]
	MountProgramNotFound,
	#[strum(to_string = "error_mount_program_failed", serialize = "MOUNT_PROGRAM_FAILED")]
	MountProgramFailed,
	#[strum(to_string = "error_invalid_device_path", serialize = "INVALID_DEVICE_PATH")]
	InvalidDevicePath,
	#[strum(to_string = "error_unknown_filesystem", serialize = "UNKNOWN_FILESYSTEM")]
	UnknownFilesystem,
	#[strum(
		to_string = "error_unsupported_filesystem",
		serialize = "UNSUPPORTED_FILESYSTEM"
	)]
	UnsupportedFilesystem,
	#[strum(to_string = "error_invalid_archive", serialize = "INVALID_ARCHIVE")]
	InvalidArchive,
	#[strum(to_string = "error_authentication", serialize = "AUTHENTICATION")]
	Authentication,
	#[strum(to_string = "error_path_unmounted", serialize = "PATH_UNMOUNTED")]
	PathUnmounted,
	#[strum(to_string = "error_need_password", serialize = "NEED_PASSWORD")]
	NeedPassword,
	#[strum(to_string = "error_busy", serialize = "BUSY")]
	Busy,
}

impl std::error::Error for VolumeError {}

impl TryFrom<String> for VolumeError {
	type Error = strum::ParseError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl VolumeError {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		self.into()
	}
}

/// Outcome reported for a mount or unmount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountStatus {
	Success,
	Failed(VolumeError),
}

impl MountStatus {
	#[must_use]
	pub const fn is_success(&self) -> bool {
		matches!(self, Self::Success)
	}

	#[must_use]
	pub const fn error(&self) -> Option<VolumeError> {
		match self {
			Self::Success => None,
			Self::Failed(e) => Some(*e),
		}
	}
}

impl FromStr for MountStatus {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.eq_ignore_ascii_case("success") {
			return Ok(Self::Success);
		}

		s.parse::<VolumeError>()
			.map(Self::Failed)
			.map_err(|_| Error::InvalidEvent {
				field: "status",
				value: s.to_string(),
			})
	}
}

impl fmt::Display for MountStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Success => write!(f, "success"),
			Self::Failed(e) => write!(f, "{e}"),
		}
	}
}

impl From<VolumeError> for MountStatus {
	fn from(e: VolumeError) -> Self {
		Self::Failed(e)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MountEventKind {
	Mount,
	Unmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
	#[serde(default)]
	pub profile_id: String,
	#[serde(default)]
	pub display_name: String,
	#[serde(default = "default_current_profile")]
	pub is_current_profile: bool,
}

const fn default_current_profile() -> bool {
	true
}

impl Default for Profile {
	fn default() -> Self {
		Self {
			profile_id: String::new(),
			display_name: String::new(),
			is_current_profile: true,
		}
	}
}

/// Volume description as reported by the mount service, both in the startup snapshot
/// and inside completion events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMetadata {
	pub volume_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_path: Option<String>,
	pub volume_type: VolumeType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device_path: Option<String>,
	#[serde(default)]
	pub is_read_only: bool,
	#[serde(default)]
	pub profile: Profile,
	/// Identity of the mounted filesystem, absent when the root couldn't be resolved
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_system_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub volume_label: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mount_condition: Option<VolumeError>,
}

impl VolumeMetadata {
	pub fn new(volume_id: impl Into<String>, volume_type: VolumeType) -> Self {
		Self {
			volume_id: volume_id.into(),
			source_path: None,
			volume_type,
			device_path: None,
			is_read_only: false,
			profile: Profile::default(),
			file_system_id: None,
			volume_label: None,
			mount_condition: None,
		}
	}

	#[must_use]
	pub fn with_source_path(mut self, source_path: impl Into<String>) -> Self {
		self.source_path = Some(source_path.into());
		self
	}

	#[must_use]
	pub fn with_device_path(mut self, device_path: impl Into<String>) -> Self {
		self.device_path = Some(device_path.into());
		self
	}

	#[must_use]
	pub fn with_file_system(mut self, file_system_id: impl Into<String>) -> Self {
		self.file_system_id = Some(file_system_id.into());
		self
	}

	#[must_use]
	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.volume_label = Some(label.into());
		self
	}

	#[must_use]
	pub fn read_only(mut self, is_read_only: bool) -> Self {
		self.is_read_only = is_read_only;
		self
	}

	#[must_use]
	pub fn current_profile(mut self, is_current_profile: bool) -> Self {
		self.profile.is_current_profile = is_current_profile;
		self
	}
}

/// A completion notification exactly as the mount service sent it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMountEvent {
	pub event_type: String,
	pub status: String,
	pub volume_metadata: VolumeMetadata,
}

impl RawMountEvent {
	pub fn mount(status: impl Into<String>, volume_metadata: VolumeMetadata) -> Self {
		Self {
			event_type: MountEventKind::Mount.to_string(),
			status: status.into(),
			volume_metadata,
		}
	}

	pub fn unmount(status: impl Into<String>, volume_metadata: VolumeMetadata) -> Self {
		Self {
			event_type: MountEventKind::Unmount.to_string(),
			status: status.into(),
			volume_metadata,
		}
	}
}

/// A validated completion notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEvent {
	pub kind: MountEventKind,
	pub status: MountStatus,
	pub metadata: VolumeMetadata,
}

impl TryFrom<RawMountEvent> for MountEvent {
	type Error = Error;

	fn try_from(raw: RawMountEvent) -> Result<Self, Self::Error> {
		let kind = raw
			.event_type
			.parse::<MountEventKind>()
			.map_err(|_| Error::InvalidEvent {
				field: "eventType",
				value: raw.event_type.clone(),
			})?;

		Ok(Self {
			kind,
			status: raw.status.parse()?,
			metadata: raw.volume_metadata,
		})
	}
}
