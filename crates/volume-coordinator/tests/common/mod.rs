#![allow(dead_code)]

use sd_volume_coordinator::{
	BackendError, ConnectionState, MountBackend, RawMountEvent, VolumeMetadata, VolumeType,
};

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use async_channel as chan;
use async_trait::async_trait;
use tokio::time::sleep;

pub const ARCHIVE_DIR: &str = "/media/archive";

// The mount service answers a mount some time after accepting it
const MOUNT_REPLY_DELAY: Duration = Duration::from_millis(10);

/// Mount service double. Completion events are only sent when a test asks for them, either
/// explicitly or as scripted replies to dispatched requests.
pub struct FakeBackend {
	events_tx: chan::Sender<RawMountEvent>,
	events_rx: chan::Receiver<RawMountEvent>,
	snapshot: Option<Vec<VolumeMetadata>>,
	during_snapshot: Mutex<Vec<RawMountEvent>>,
	mount_replies: Mutex<HashMap<String, String>>,
	unmount_replies: Mutex<HashMap<String, RawMountEvent>>,
	refuse_dispatch: AtomicBool,
	dispatch_delay: Mutex<Duration>,
	configured: Mutex<Vec<String>>,
	connection_state: Mutex<ConnectionState>,
}

impl FakeBackend {
	pub fn new(snapshot: Option<Vec<VolumeMetadata>>) -> Arc<Self> {
		let (events_tx, events_rx) = chan::unbounded();

		Arc::new(Self {
			events_tx,
			events_rx,
			snapshot,
			during_snapshot: Mutex::default(),
			mount_replies: Mutex::default(),
			unmount_replies: Mutex::default(),
			refuse_dispatch: AtomicBool::new(false),
			dispatch_delay: Mutex::default(),
			configured: Mutex::default(),
			connection_state: Mutex::default(),
		})
	}

	pub fn emit(&self, event: RawMountEvent) {
		self.events_tx.try_send(event).expect("unbounded channel");
	}

	/// Sent while the snapshot is being fetched, as if they raced with it
	pub fn emit_during_snapshot(&self, event: RawMountEvent) {
		self.during_snapshot.lock().unwrap().push(event);
	}

	/// Every mount of `file_url` gets answered with `status`
	pub fn reply_to_mount(&self, file_url: &str, status: &str) {
		self.mount_replies
			.lock()
			.unwrap()
			.insert(source_path_for(file_url), status.to_string());
	}

	pub fn reply_to_unmount(&self, metadata: VolumeMetadata, status: &str) {
		self.unmount_replies.lock().unwrap().insert(
			metadata.volume_id.clone(),
			RawMountEvent::unmount(status, metadata),
		);
	}

	pub fn refuse_dispatch(&self, refuse: bool) {
		self.refuse_dispatch.store(refuse, Ordering::SeqCst);
	}

	/// Every mount and unmount dispatch takes this long to be accepted
	pub fn set_dispatch_delay(&self, delay: Duration) {
		*self.dispatch_delay.lock().unwrap() = delay;
	}

	pub fn set_connection_state(&self, state: ConnectionState) {
		*self.connection_state.lock().unwrap() = state;
	}

	pub fn configured(&self) -> Vec<String> {
		self.configured.lock().unwrap().clone()
	}

	async fn dispatch(&self) -> Result<(), BackendError> {
		let delay = *self.dispatch_delay.lock().unwrap();
		if !delay.is_zero() {
			sleep(delay).await;
		}

		if self.refuse_dispatch.load(Ordering::SeqCst) {
			Err(BackendError::new("mount service unavailable"))
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl MountBackend for FakeBackend {
	async fn volume_snapshot(&self) -> Option<Vec<VolumeMetadata>> {
		for event in self.during_snapshot.lock().unwrap().drain(..) {
			self.emit(event);
		}

		self.snapshot.clone()
	}

	fn subscribe(&self) -> chan::Receiver<RawMountEvent> {
		self.events_rx.clone()
	}

	async fn request_mount(&self, file_url: &str) -> Result<String, BackendError> {
		self.dispatch().await?;

		let source_path = source_path_for(file_url);
		let reply = self.mount_replies.lock().unwrap().get(&source_path).cloned();
		if let Some(status) = reply {
			let events_tx = self.events_tx.clone();
			let event = RawMountEvent::mount(status, archive(file_url));
			tokio::spawn(async move {
				sleep(MOUNT_REPLY_DELAY).await;
				events_tx.send(event).await.expect("unbounded channel");
			});
		}

		Ok(source_path)
	}

	async fn request_unmount(&self, volume_id: &str) -> Result<(), BackendError> {
		self.dispatch().await?;

		let reply = self.unmount_replies.lock().unwrap().get(volume_id).cloned();
		if let Some(event) = reply {
			self.emit(event);
		}

		Ok(())
	}

	async fn request_configure(&self, volume_id: &str) -> Result<(), BackendError> {
		if self.refuse_dispatch.load(Ordering::SeqCst) {
			return Err(BackendError::new("mount service unavailable"));
		}
		self.configured.lock().unwrap().push(volume_id.to_string());

		Ok(())
	}

	async fn connection_state(&self) -> ConnectionState {
		*self.connection_state.lock().unwrap()
	}
}

pub fn source_path_for(file_url: &str) -> String {
	let name = file_url.rsplit('/').next().unwrap_or(file_url);
	format!("{ARCHIVE_DIR}/{name}")
}

pub fn archive(file_url: &str) -> VolumeMetadata {
	let source_path = source_path_for(file_url);

	VolumeMetadata::new(format!("archive:{source_path}"), VolumeType::Archive)
		.with_file_system(format!("fs-{source_path}"))
		.with_source_path(source_path)
		.read_only(true)
}

pub fn removable(name: &str, device_path: &str) -> VolumeMetadata {
	VolumeMetadata::new(format!("removable:{name}"), VolumeType::Removable)
		.with_device_path(device_path)
		.with_file_system(format!("fs-{name}"))
		.with_label(name)
}

pub fn drive() -> VolumeMetadata {
	VolumeMetadata::new("drive:me", VolumeType::Drive).with_file_system("fs-drive")
}

pub fn downloads(profile_id: &str, is_current_profile: bool) -> VolumeMetadata {
	let mut metadata = VolumeMetadata::new(format!("downloads:{profile_id}"), VolumeType::Downloads)
		.with_file_system(format!("fs-downloads-{profile_id}"))
		.current_profile(is_current_profile);
	metadata.profile.profile_id = profile_id.to_string();

	metadata
}
