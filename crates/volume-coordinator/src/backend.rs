use async_trait::async_trait;

use super::{
	error::BackendError,
	event::{RawMountEvent, VolumeMetadata},
	types::ConnectionState,
};

/// The platform mount service.
///
/// Requests are only dispatched here, their outcome arrives later as a [`RawMountEvent`] on
/// the stream returned by [`MountBackend::subscribe`].
#[async_trait]
pub trait MountBackend: Send + Sync + 'static {
	/// Volumes mounted right now, `None` if the service couldn't provide them
	async fn volume_snapshot(&self) -> Option<Vec<VolumeMetadata>>;

	/// Stream of completion events. Events sent before the receiver is polled must be kept.
	fn subscribe(&self) -> async_channel::Receiver<RawMountEvent>;

	/// Dispatches an archive mount, returning the source path its completion will carry
	async fn request_mount(&self, file_url: &str) -> Result<String, BackendError>;

	async fn request_unmount(&self, volume_id: &str) -> Result<(), BackendError>;

	/// Opens the volume's provider configuration, nothing is reported back
	async fn request_configure(&self, volume_id: &str) -> Result<(), BackendError>;

	async fn connection_state(&self) -> ConnectionState;
}
