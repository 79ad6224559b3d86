use std::{
	fmt,
	pin::pin,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Weak,
	},
};

use futures::StreamExt;
use tokio::{
	spawn,
	sync::{
		broadcast::{self, error::RecvError},
		Mutex, RwLock,
	},
	task::JoinHandle,
};
use tracing::{debug, error, info, instrument, trace, warn};

use super::{
	backend::MountBackend,
	config::CoordinatorConfig,
	entry::Entry,
	error::Error,
	event::{MountEvent, MountEventKind, MountStatus, RawMountEvent, VolumeError, VolumeMetadata},
	gate::SerialGate,
	ledger::{RequestKey, RequestLedger},
	location::EntryLocation,
	registry::{AddOutcome, RegistrySplice, VolumeRegistry},
	types::{ConnectionState, VolumeRecord, VolumeType},
};

/// Notifications raised by the coordinator itself, on top of the registry splices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
	/// A mount was refused because the source is already mounted
	VolumeAlreadyMounted { volume_id: String },
	/// A volume went away without anyone asking for it, e.g. an ejected USB stick
	ExternallyUnmounted(Arc<VolumeRecord>),
	DriveConnectionChanged(ConnectionState),
}

/// What to do once the gate is released
enum FollowUp {
	Nothing,
	Announce(CoordinatorEvent),
	RefreshConnection,
}

struct Inner {
	backend: Arc<dyn MountBackend>,
	config: CoordinatorConfig,
	gate: SerialGate,
	registry: RwLock<VolumeRegistry>,
	mounts: RequestLedger<Arc<VolumeRecord>>,
	unmounts: RequestLedger<()>,
	event_tx: broadcast::Sender<CoordinatorEvent>,
	connection_state: RwLock<ConnectionState>,
	initialized: AtomicBool,
	pump: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
	fn drop(&mut self) {
		if let Some(pump) = self.pump.get_mut().take() {
			pump.abort();
		}
	}
}

/// Owns the volume registry and keeps it in sync with the mount service.
///
/// Cheap to clone, every clone drives the same registry.
#[derive(Clone)]
pub struct VolumeCoordinator {
	inner: Arc<Inner>,
}

impl fmt::Debug for VolumeCoordinator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("VolumeCoordinator")
			.field("config", &self.inner.config)
			.field("initialized", &self.inner.initialized.load(Ordering::Relaxed))
			.finish_non_exhaustive()
	}
}

impl VolumeCoordinator {
	#[must_use]
	pub fn new(backend: Arc<dyn MountBackend>, config: CoordinatorConfig) -> Self {
		let (event_tx, _) = broadcast::channel(config.event_channel_size.max(1));
		let timeout = config.request_timeout();

		Self {
			inner: Arc::new(Inner {
				backend,
				gate: SerialGate::new(),
				registry: RwLock::new(VolumeRegistry::new(config.event_channel_size)),
				mounts: RequestLedger::new(timeout),
				unmounts: RequestLedger::new(timeout),
				event_tx,
				connection_state: RwLock::default(),
				initialized: AtomicBool::new(false),
				pump: Mutex::new(None),
				config,
			}),
		}
	}

	#[must_use]
	pub fn config(&self) -> &CoordinatorConfig {
		&self.inner.config
	}

	/// Loads the currently mounted volumes and starts following completion events.
	///
	/// Events reported while the snapshot is being applied are kept and handled afterwards,
	/// in the order they arrived.
	#[instrument(skip(self))]
	pub async fn initialize(&self) {
		if self.inner.initialized.swap(true, Ordering::AcqRel) {
			warn!("Volume coordinator already initialized");
			return;
		}

		// Subscribing first so nothing reported during the snapshot gets lost
		let events = self.inner.backend.subscribe();

		let token = self.inner.gate.acquire().await;
		match self.inner.backend.volume_snapshot().await {
			Some(volumes) => {
				info!(count = volumes.len(), "Applying volume snapshot");
				let mut registry = self.inner.registry.write().await;
				for metadata in &volumes {
					let record = VolumeRecord::from_metadata(metadata);
					if record.is_listed() {
						registry.add(record);
					} else {
						debug!(volume_id = %record.volume_id, "Skipping volume without a root");
					}
				}
			}
			None => error!("Mount service returned no volume snapshot"),
		}
		self.inner.gate.release(token);

		self.refresh_connection_state().await;

		let pump = spawn(pump_events(Arc::downgrade(&self.inner), events));
		*self.inner.pump.lock().await = Some(pump);

		info!("Volume coordinator initialized");
	}

	/// Stops following completion events. Requests still pending will time out.
	pub async fn shutdown(&self) {
		let Some(pump) = self.inner.pump.lock().await.take() else {
			trace!("No mount event pump to stop");
			return;
		};

		pump.abort();
		if let Err(e) = pump.await {
			if !e.is_cancelled() {
				error!(?e, "Mount event pump panicked");
			}
		}

		debug!("Volume coordinator shut down");
	}

	/// Mounts an archive and waits for the mount service to report back.
	///
	/// Filesystems the platform can't read but still mounts (see
	/// [`CoordinatorConfig::tolerated_mount_errors`]) come back as `Ok`, with the error kept in
	/// [`VolumeRecord::mount_condition`].
	#[instrument(skip(self))]
	pub async fn mount_archive(&self, file_url: &str) -> Result<Arc<VolumeRecord>, Error> {
		// The source path is only known once dispatched, a completion reported before the
		// request is registered below is reconciled without resolving it
		let source_path = self.inner.backend.request_mount(file_url).await?;
		debug!(%source_path, "Archive mount dispatched");

		let token = self.inner.gate.acquire().await;
		let resolution = self.inner.mounts.start(RequestKey::mount(source_path)).await;
		self.inner.gate.release(token);

		resolution.await
	}

	#[instrument(skip_all, fields(volume_id = %volume.volume_id))]
	pub async fn unmount(&self, volume: &VolumeRecord) -> Result<(), Error> {
		let key = RequestKey::unmount(volume.volume_id.as_str());

		let token = self.inner.gate.acquire().await;
		let joined = self.inner.unmounts.contains(&key).await;
		let resolution = self.inner.unmounts.start(key.clone()).await;
		self.inner.gate.release(token);

		if let Err(e) = self.inner.backend.request_unmount(&volume.volume_id).await {
			warn!(?e, "Failed to dispatch unmount");
			// Someone else's dispatch may still be answered, only fail a request we started
			if !joined {
				let token = self.inner.gate.acquire().await;
				self.inner
					.unmounts
					.finish(&key, Err(VolumeError::Internal))
					.await;
				self.inner.gate.release(token);
			}

			return Err(e.into());
		}

		resolution.await
	}

	#[instrument(skip_all, fields(volume_id = %volume.volume_id))]
	pub async fn configure(&self, volume: &VolumeRecord) -> Result<(), Error> {
		self.inner
			.backend
			.request_configure(&volume.volume_id)
			.await
			.map_err(|e| {
				warn!(?e, "Failed to configure volume");
				e.into()
			})
	}

	/// Reconciles a completion event reported by the mount service.
	///
	/// Invalid events are rejected before touching anything. Failed requests aren't errors
	/// here, they're delivered to whoever is waiting on them.
	#[instrument(
		skip_all,
		fields(
			event_type = %raw.event_type,
			status = %raw.status,
			volume_id = %raw.volume_metadata.volume_id
		)
	)]
	pub async fn on_mount_completed(&self, raw: RawMountEvent) -> Result<(), Error> {
		let MountEvent {
			kind,
			status,
			metadata,
		} = MountEvent::try_from(raw).map_err(|e| {
			error!(?e, "Dropping invalid mount event");
			e
		})?;

		let token = self.inner.gate.acquire().await;
		let follow_up = match kind {
			MountEventKind::Mount => self.reconcile_mount(status, &metadata).await,
			MountEventKind::Unmount => self.reconcile_unmount(status, &metadata).await,
		};
		self.inner.gate.release(token);

		match follow_up {
			FollowUp::Nothing => {}
			FollowUp::Announce(event) => self.emit(event),
			FollowUp::RefreshConnection => self.refresh_connection_state().await,
		}

		Ok(())
	}

	async fn reconcile_mount(&self, status: MountStatus, metadata: &VolumeMetadata) -> FollowUp {
		let key = metadata.source_path.as_deref().map(RequestKey::mount);

		match status {
			MountStatus::Failed(VolumeError::AlreadyMounted) => {
				warn!("Volume is already mounted");
				self.finish_mount(key, Err(VolumeError::AlreadyMounted)).await;

				FollowUp::Announce(CoordinatorEvent::VolumeAlreadyMounted {
					volume_id: metadata.volume_id.clone(),
				})
			}

			MountStatus::Failed(e) if !self.inner.config.is_tolerated(e) => {
				warn!(%e, "Mount failed");
				self.finish_mount(key, Err(e)).await;

				FollowUp::Nothing
			}

			status => {
				let mut record = VolumeRecord::from_metadata(metadata);
				if let Some(e) = status.error() {
					info!(%e, "Volume mounted with an unreadable filesystem");
					record.mount_condition = Some(e);
				}
				let record = Arc::new(record);

				let outcome = if record.is_listed() {
					self.inner.registry.write().await.add(Arc::clone(&record))
				} else {
					debug!("Volume root couldn't be resolved, not listing it");
					AddOutcome::Ignored
				};

				let is_new_drive = record.volume_type == VolumeType::Drive
					&& matches!(outcome, AddOutcome::Inserted(_));

				self.finish_mount(key, Ok(record)).await;

				if is_new_drive {
					FollowUp::RefreshConnection
				} else {
					FollowUp::Nothing
				}
			}
		}
	}

	async fn finish_mount(
		&self,
		key: Option<RequestKey>,
		resolution: Result<Arc<VolumeRecord>, VolumeError>,
	) {
		let Some(key) = key else {
			trace!("Mount event without source path, nothing to resolve");
			return;
		};

		if !self.inner.mounts.finish(&key, resolution).await {
			trace!(%key, "Mount wasn't requested by us");
		}
	}

	async fn reconcile_unmount(&self, status: MountStatus, metadata: &VolumeMetadata) -> FollowUp {
		let volume_id = metadata.volume_id.as_str();
		let key = RequestKey::unmount(volume_id);

		let record = self.inner.registry.read().await.get(volume_id);
		let was_requested = self.inner.unmounts.contains(&key).await;

		let follow_up = match record {
			Some(record) if status.is_success() && !was_requested => {
				info!("Volume was unmounted externally");
				FollowUp::Announce(CoordinatorEvent::ExternallyUnmounted(record))
			}
			_ => FollowUp::Nothing,
		};

		if status.is_success() {
			self.inner.registry.write().await.remove(volume_id);
		} else {
			warn!(%status, "Unmount failed");
		}

		self.inner
			.unmounts
			.finish(&key, status.error().map_or(Ok(()), Err))
			.await;

		follow_up
	}

	/// Volume an entry lives on, matching fake entries too
	pub async fn get_volume_info(&self, entry: &Entry) -> Option<Arc<VolumeRecord>> {
		if !entry.is_valid() {
			error!(path = entry.full_path(), "Invalid entry");
			return None;
		}

		let registry = self.inner.registry.read().await;
		let volume = registry
			.iter()
			.find(|volume| {
				volume
					.file_system()
					.is_some_and(|fs| entry.is_same_filesystem(fs))
			})
			.or_else(|| {
				registry
					.iter()
					.find(|volume| volume.fake_entries.values().any(|fake| fake == entry))
			})
			.cloned();

		volume
	}

	pub async fn get_location_info(&self, entry: &Entry) -> Option<EntryLocation> {
		let volume = self.get_volume_info(entry).await;

		if let Some(root_type) = entry.fake_root() {
			return Some(EntryLocation::for_fake_entry(volume.as_deref(), root_type));
		}

		EntryLocation::classify(volume.as_deref()?, entry)
	}

	/// Waits until a volume with this id shows up in the registry
	#[instrument(skip(self))]
	pub async fn when_volume_info_ready(&self, volume_id: &str) -> Result<Arc<VolumeRecord>, Error> {
		let mut splices = self.inner.registry.read().await.subscribe();

		loop {
			if let Some(volume) = self.inner.registry.read().await.get(volume_id) {
				return Ok(volume);
			}

			match splices.recv().await {
				Ok(_) => {}
				Err(RecvError::Lagged(skipped)) => {
					trace!(skipped, "Registry subscriber lagged behind");
				}
				Err(RecvError::Closed) => return Err(Error::Cancelled),
			}
		}
	}

	pub async fn find_by_device_path(&self, device_path: &str) -> Option<Arc<VolumeRecord>> {
		self.inner.registry.read().await.find_by_device_path(device_path)
	}

	/// First volume of this type belonging to the signed in profile
	pub async fn get_current_profile_volume_info(
		&self,
		volume_type: VolumeType,
	) -> Option<Arc<VolumeRecord>> {
		self.inner
			.registry
			.read()
			.await
			.iter()
			.find(|volume| volume.volume_type == volume_type && volume.profile_is_current)
			.cloned()
	}

	pub async fn volumes(&self) -> Vec<Arc<VolumeRecord>> {
		self.inner.registry.read().await.snapshot()
	}

	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
		self.inner.event_tx.subscribe()
	}

	pub async fn subscribe_registry(&self) -> broadcast::Receiver<RegistrySplice> {
		self.inner.registry.read().await.subscribe()
	}

	pub async fn drive_connection_state(&self) -> ConnectionState {
		*self.inner.connection_state.read().await
	}

	/// Called by the platform when the cloud drive connectivity changes
	pub async fn on_drive_connection_status_changed(&self) {
		self.refresh_connection_state().await;
	}

	async fn refresh_connection_state(&self) {
		let state = self.inner.backend.connection_state().await;
		*self.inner.connection_state.write().await = state;
		debug!(?state, "Drive connection state refreshed");

		self.emit(CoordinatorEvent::DriveConnectionChanged(state));
	}

	fn emit(&self, event: CoordinatorEvent) {
		if self.inner.event_tx.send(event).is_err() {
			trace!("No coordinator subscribers");
		}
	}
}

async fn pump_events(inner: Weak<Inner>, events: async_channel::Receiver<RawMountEvent>) {
	let mut events = pin!(events);

	while let Some(raw) = events.next().await {
		let Some(inner) = inner.upgrade() else {
			break;
		};

		// Already logged, a bad event must not stop the pump
		let _ = VolumeCoordinator { inner }.on_mount_completed(raw).await;
	}

	debug!("Mount event pump stopped");
}
