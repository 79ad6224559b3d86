use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::types::{VolumeRecord, VolumeType};

/// Structural change of the registry: starting at `index`, `removed` records were taken out
/// and `added` records were put in their place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySplice {
	pub index: usize,
	pub removed: Vec<Arc<VolumeRecord>>,
	pub added: Vec<Arc<VolumeRecord>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
	/// New volume, appended at this index
	Inserted(usize),
	/// Remounted removable volume, replaced in place at this index
	Replaced(usize),
	/// Already known, nothing changed
	Ignored,
}

/// Ordered list of mounted volumes, with at most one record per volume id
#[derive(Debug)]
pub struct VolumeRegistry {
	volumes: Vec<Arc<VolumeRecord>>,
	splice_tx: broadcast::Sender<RegistrySplice>,
}

impl VolumeRegistry {
	#[must_use]
	pub fn new(channel_size: usize) -> Self {
		let (splice_tx, _) = broadcast::channel(channel_size.max(1));

		Self {
			volumes: Vec::new(),
			splice_tx,
		}
	}

	/// Adds a volume unless one with the same id is already registered.
	///
	/// Removable devices get remounted to switch their read-only policy, so a removable
	/// record replaces the one already registered under its id.
	pub fn add(&mut self, record: impl Into<Arc<VolumeRecord>>) -> AddOutcome {
		let record = record.into();

		match self.find_index(&record.volume_id) {
			None => {
				let index = self.volumes.len();
				debug!(volume_id = %record.volume_id, index, "Adding volume");
				self.volumes.push(Arc::clone(&record));
				self.emit(RegistrySplice {
					index,
					removed: vec![],
					added: vec![record],
				});

				AddOutcome::Inserted(index)
			}

			Some(index) if record.volume_type == VolumeType::Removable => {
				debug!(volume_id = %record.volume_id, index, "Replacing remounted volume");
				let old = std::mem::replace(&mut self.volumes[index], Arc::clone(&record));
				self.emit(RegistrySplice {
					index,
					removed: vec![old],
					added: vec![record],
				});

				AddOutcome::Replaced(index)
			}

			Some(_) => {
				trace!(volume_id = %record.volume_id, "Volume already registered");
				AddOutcome::Ignored
			}
		}
	}

	/// Removes the volume, doing nothing if it isn't registered
	pub fn remove(&mut self, volume_id: &str) -> Option<Arc<VolumeRecord>> {
		let index = self.find_index(volume_id)?;
		let removed = self.volumes.remove(index);
		debug!(volume_id, index, "Removed volume");

		self.emit(RegistrySplice {
			index,
			removed: vec![Arc::clone(&removed)],
			added: vec![],
		});

		Some(removed)
	}

	#[must_use]
	pub fn find_index(&self, volume_id: &str) -> Option<usize> {
		self.volumes.iter().position(|v| v.volume_id == volume_id)
	}

	#[must_use]
	pub fn item(&self, index: usize) -> Option<Arc<VolumeRecord>> {
		self.volumes.get(index).cloned()
	}

	#[must_use]
	pub fn get(&self, volume_id: &str) -> Option<Arc<VolumeRecord>> {
		self.find_index(volume_id).and_then(|index| self.item(index))
	}

	#[must_use]
	pub fn find_by_device_path(&self, device_path: &str) -> Option<Arc<VolumeRecord>> {
		self.volumes
			.iter()
			.find(|v| v.device_path.as_deref() == Some(device_path))
			.cloned()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.volumes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.volumes.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Arc<VolumeRecord>> {
		self.volumes.iter()
	}

	#[must_use]
	pub fn snapshot(&self) -> Vec<Arc<VolumeRecord>> {
		self.volumes.clone()
	}

	/// Receiver for every splice emitted from now on. Check the registry again after
	/// subscribing, the record being waited on might already be there.
	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<RegistrySplice> {
		self.splice_tx.subscribe()
	}

	fn emit(&self, splice: RegistrySplice) {
		if self.splice_tx.send(splice).is_err() {
			trace!("No registry subscribers");
		}
	}
}
