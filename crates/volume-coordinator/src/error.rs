use std::{io, path::PathBuf};

use thiserror::Error;

use super::event::VolumeError;

#[derive(Debug, Error)]
pub enum Error {
	#[error("volume request failed: {0}")]
	Volume(#[from] VolumeError),
	#[error(transparent)]
	Backend(#[from] BackendError),
	#[error("invalid mount event <field='{field}', value='{value}'>")]
	InvalidEvent { field: &'static str, value: String },
	#[error("request was dropped before being resolved")]
	Cancelled,

	#[error("failed to access config file <path='{}'>: {source}", .path.display())]
	ConfigIO {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("failed to parse config file: {0}")]
	ConfigParse(#[from] serde_json::Error),
}

impl Error {
	/// The mount error carried by a failed request, if that's what this is
	#[must_use]
	pub const fn volume_error(&self) -> Option<VolumeError> {
		if let Self::Volume(e) = self {
			Some(*e)
		} else {
			None
		}
	}
}

/// Failure reported by the platform mount service while dispatching a call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mount backend call failed: {0}")]
pub struct BackendError(pub String);

impl BackendError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}
