//!
//! # Volume Coordinator
//!
//! Keeps the authoritative list of mounted volumes for a device and reconciles it with the
//! asynchronous mount and unmount completions reported by the platform's mount service.
//!
//! The coordinator is built from three pieces:
//! - A [`SerialGate`], so registry mutations from the startup snapshot and from completion
//!   events never interleave;
//! - A [`VolumeRegistry`], the ordered and deduplicated list of mounted volumes, which
//!   announces every structural change;
//! - A [`RequestLedger`], which matches completion events with the callers waiting on
//!   them and fails requests that never receive an answer;
//!
//! The platform side is abstracted by the [`MountBackend`] trait.
//!
//! ## Basic example
//!
//! ```no_run
//! use sd_volume_coordinator::{CoordinatorConfig, MountBackend, VolumeCoordinator};
//! use std::sync::Arc;
//!
//! async fn run(backend: Arc<dyn MountBackend>) -> Result<(), sd_volume_coordinator::Error> {
//!     let coordinator = VolumeCoordinator::new(backend, CoordinatorConfig::default());
//!     coordinator.initialize().await;
//!
//!     let volume = coordinator.mount_archive("file:///home/chronos/archive.zip").await?;
//!     println!("mounted {}", volume.volume_id);
//!
//!     coordinator.unmount(&volume).await?;
//!     coordinator.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod backend;
mod config;
mod coordinator;
mod entry;
mod error;
mod event;
mod gate;
mod ledger;
mod location;
mod registry;
mod types;

pub use backend::MountBackend;
pub use config::CoordinatorConfig;
pub use coordinator::{CoordinatorEvent, VolumeCoordinator};
pub use entry::{Entry, FileSystemId};
pub use error::{BackendError, Error};
pub use event::{
	MountEvent, MountEventKind, MountStatus, Profile, RawMountEvent, VolumeError, VolumeMetadata,
};
pub use gate::{GateToken, SerialGate};
pub use ledger::{PendingResolution, RequestKey, RequestKind, RequestLedger, RequestState};
pub use location::EntryLocation;
pub use registry::{AddOutcome, RegistrySplice, VolumeRegistry};
pub use types::{
	ConnectionReason, ConnectionState, ConnectionType, RootType, VolumeRecord, VolumeType,
};
