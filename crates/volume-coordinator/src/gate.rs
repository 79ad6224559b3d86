use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Mutual exclusion for registry and ledger reconciliation.
///
/// At most one [`GateToken`] exists at a time and waiters are served in the order they
/// started waiting. Acquiring never fails, it can only take a while.
#[derive(Debug, Clone, Default)]
pub struct SerialGate {
	lock: Arc<Mutex<()>>,
}

/// Proof of holding the [`SerialGate`], the gate is released when it's dropped
#[derive(Debug)]
#[must_use = "dropping the token immediately releases the gate"]
pub struct GateToken {
	_guard: OwnedMutexGuard<()>,
}

impl SerialGate {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn acquire(&self) -> GateToken {
		trace!("Waiting for serial gate");
		let guard = Arc::clone(&self.lock).lock_owned().await;
		trace!("Serial gate acquired");

		GateToken { _guard: guard }
	}

	#[must_use]
	pub fn try_acquire(&self) -> Option<GateToken> {
		Arc::clone(&self.lock)
			.try_lock_owned()
			.ok()
			.map(|guard| GateToken { _guard: guard })
	}

	#[allow(clippy::unused_self)]
	pub fn release(&self, token: GateToken) {
		drop(token);
		trace!("Serial gate released");
	}

	#[must_use]
	pub fn is_held(&self) -> bool {
		self.lock.try_lock().is_err()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::{
		sync::atomic::{AtomicUsize, Ordering},
		time::Duration,
	};

	use pretty_assertions::assert_eq;
	use tokio::{sync::mpsc, task::yield_now, time::sleep};

	#[tokio::test]
	async fn waiters_are_served_in_arrival_order() {
		let gate = SerialGate::new();
		let token = gate.acquire().await;

		let (order_tx, mut order_rx) = mpsc::unbounded_channel();

		for i in 0..4 {
			tokio::spawn({
				let gate = gate.clone();
				let order_tx = order_tx.clone();
				async move {
					let token = gate.acquire().await;
					order_tx.send(i).expect("receiver alive");
					gate.release(token);
				}
			});
			// Let the task park on the gate before spawning the next one
			yield_now().await;
		}
		drop(order_tx);

		assert!(gate.is_held());
		gate.release(token);

		let mut order = Vec::new();
		while let Some(i) = order_rx.recv().await {
			order.push(i);
		}

		assert_eq!(order, vec![0, 1, 2, 3]);
		assert!(!gate.is_held());
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn only_one_holder_at_a_time() {
		let gate = SerialGate::new();
		let inside = Arc::new(AtomicUsize::new(0));
		let max_inside = Arc::new(AtomicUsize::new(0));

		let handles = (0..16)
			.map(|_| {
				let gate = gate.clone();
				let inside = Arc::clone(&inside);
				let max_inside = Arc::clone(&max_inside);
				tokio::spawn(async move {
					let _token = gate.acquire().await;
					let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
					max_inside.fetch_max(now, Ordering::SeqCst);
					sleep(Duration::from_millis(1)).await;
					inside.fetch_sub(1, Ordering::SeqCst);
				})
			})
			.collect::<Vec<_>>();

		for handle in handles {
			handle.await.expect("task panicked");
		}

		assert_eq!(max_inside.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn try_acquire_fails_while_held() {
		let gate = SerialGate::new();

		let token = gate.try_acquire().expect("gate is free");
		assert!(gate.try_acquire().is_none());

		gate.release(token);
		assert!(gate.try_acquire().is_some());
	}
}
