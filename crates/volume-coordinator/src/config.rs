use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{error::Error, event::VolumeError};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_CHANNEL_SIZE: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
	/// How long mount and unmount requests wait for their completion event
	pub request_timeout_ms: u64,

	/// Mount errors that still leave a usable volume behind
	pub tolerated_mount_errors: Vec<VolumeError>,

	/// Capacity of the coordinator and registry broadcast channels
	pub event_channel_size: usize,
}

impl Default for CoordinatorConfig {
	fn default() -> Self {
		Self {
			request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
			tolerated_mount_errors: vec![
				VolumeError::UnknownFilesystem,
				VolumeError::UnsupportedFilesystem,
			],
			event_channel_size: DEFAULT_CHANNEL_SIZE,
		}
	}
}

impl CoordinatorConfig {
	#[must_use]
	pub const fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	#[must_use]
	pub fn is_tolerated(&self, error: VolumeError) -> bool {
		self.tolerated_mount_errors.contains(&error)
	}

	/// Loads the config at `path`, falling back to the defaults if there is no file yet
	pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Error> {
		let path = path.as_ref();

		if !path.exists() {
			warn!(path = %path.display(), "No coordinator config found, using defaults");
			return Ok(Self::default());
		}

		info!(path = %path.display(), "Loading coordinator config");
		let json = fs::read_to_string(path).map_err(|source| Error::ConfigIO {
			path: path.to_path_buf(),
			source,
		})?;

		serde_json::from_str(&json).map_err(Into::into)
	}

	pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), Error> {
		let path = path.as_ref();
		let json = serde_json::to_string_pretty(self)?;

		fs::write(path, json).map_err(|source| Error::ConfigIO {
			path: path.to_path_buf(),
			source,
		})?;
		info!(path = %path.display(), "Saved coordinator config");

		Ok(())
	}
}
