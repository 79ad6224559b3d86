use std::{
	collections::HashMap,
	fmt,
	future::Future,
	pin::Pin,
	sync::{Arc, Weak},
	task::{Context, Poll},
	time::Duration,
};

use tokio::{
	spawn,
	sync::{oneshot, Mutex},
	task::JoinHandle,
	time::sleep,
};
use tracing::{debug, trace, warn};

use super::{error::Error, event::VolumeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RequestKind {
	Mount,
	Unmount,
}

/// Matches completion events with requests: the source path for mounts, the volume id for
/// unmounts. Mounting and unmounting the same volume never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
	kind: RequestKind,
	argument: String,
}

impl RequestKey {
	pub fn mount(source_path: impl Into<String>) -> Self {
		Self {
			kind: RequestKind::Mount,
			argument: source_path.into(),
		}
	}

	pub fn unmount(volume_id: impl Into<String>) -> Self {
		Self {
			kind: RequestKind::Unmount,
			argument: volume_id.into(),
		}
	}

	#[must_use]
	pub const fn kind(&self) -> RequestKind {
		self.kind
	}

	#[must_use]
	pub fn argument(&self) -> &str {
		&self.argument
	}
}

impl fmt::Display for RequestKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind, self.argument)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
	Idle,
	Pending { waiters: usize },
}

type Resolution<T> = Result<T, VolumeError>;

struct PendingRequest<T> {
	waiters: Vec<oneshot::Sender<Resolution<T>>>,
	deadline: JoinHandle<()>,
}

type PendingRequests<T> = Mutex<HashMap<RequestKey, PendingRequest<T>>>;

/// Requests waiting for their completion event, at most one per key.
///
/// Callers starting a request whose key is already pending join it and get the same
/// resolution. Every waiter is resolved exactly once: by [`RequestLedger::finish`] or, if
/// nothing arrives in time, with [`VolumeError::Timeout`].
pub struct RequestLedger<T> {
	requests: Arc<PendingRequests<T>>,
	timeout: Duration,
}

impl<T> fmt::Debug for RequestLedger<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RequestLedger")
			.field("requests", &"<mutex>")
			.field("timeout", &self.timeout)
			.finish()
	}
}

impl<T: Clone + Send + 'static> RequestLedger<T> {
	#[must_use]
	pub fn new(timeout: Duration) -> Self {
		Self {
			requests: Arc::default(),
			timeout,
		}
	}

	#[must_use]
	pub const fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Registers a waiter for `key`, arming the deadline if no request was pending yet
	pub async fn start(&self, key: RequestKey) -> PendingResolution<T> {
		let (tx, rx) = oneshot::channel();

		let mut requests = self.requests.lock().await;
		if let Some(request) = requests.get_mut(&key) {
			request.waiters.push(tx);
			debug!(%key, waiters = request.waiters.len(), "Joined pending request");
		} else {
			debug!(%key, timeout = ?self.timeout, "Starting request");
			let deadline = spawn(expire(
				Arc::downgrade(&self.requests),
				key.clone(),
				self.timeout,
			));
			requests.insert(
				key,
				PendingRequest {
					waiters: vec![tx],
					deadline,
				},
			);
		}

		PendingResolution { rx }
	}

	/// Resolves every waiter of `key` and forgets the request.
	///
	/// Returns `false`, doing nothing, when no request is pending for `key`: it was never
	/// started, was already resolved or timed out.
	pub async fn finish(&self, key: &RequestKey, resolution: Resolution<T>) -> bool {
		let Some(request) = self.requests.lock().await.remove(key) else {
			trace!(%key, "No pending request to finish");
			return false;
		};

		request.deadline.abort();
		debug!(%key, success = resolution.is_ok(), "Finishing request");
		deliver(request.waiters, &resolution);

		true
	}

	pub async fn state(&self, key: &RequestKey) -> RequestState {
		self.requests
			.lock()
			.await
			.get(key)
			.map_or(RequestState::Idle, |request| RequestState::Pending {
				waiters: request.waiters.len(),
			})
	}

	pub async fn contains(&self, key: &RequestKey) -> bool {
		self.requests.lock().await.contains_key(key)
	}

	pub async fn len(&self) -> usize {
		self.requests.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.requests.lock().await.is_empty()
	}
}

async fn expire<T: Clone>(requests: Weak<PendingRequests<T>>, key: RequestKey, timeout: Duration) {
	sleep(timeout).await;

	let Some(requests) = requests.upgrade() else {
		return;
	};

	// Someone else may have finished the request while we were waiting for the lock
	let Some(request) = requests.lock().await.remove(&key) else {
		return;
	};

	warn!(%key, ?timeout, "Request timed out");
	deliver(request.waiters, &Err(VolumeError::Timeout));
}

fn deliver<T: Clone>(waiters: Vec<oneshot::Sender<Resolution<T>>>, resolution: &Resolution<T>) {
	for waiter in waiters {
		if waiter.send(resolution.clone()).is_err() {
			trace!("Request waiter went away before being resolved");
		}
	}
}

pin_project_lite::pin_project! {
	/// Resolution of a request started on a [`RequestLedger`]
	#[must_use = "a request resolution does nothing unless awaited"]
	pub struct PendingResolution<T> {
		#[pin]
		rx: oneshot::Receiver<Resolution<T>>,
	}
}

impl<T> Future for PendingResolution<T> {
	type Output = Result<T, Error>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.project();

		match this.rx.poll(cx) {
			Poll::Ready(Ok(resolution)) => Poll::Ready(resolution.map_err(Error::Volume)),
			Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Cancelled)),
			Poll::Pending => Poll::Pending,
		}
	}
}
