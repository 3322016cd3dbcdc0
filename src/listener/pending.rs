//! Mutex + condvar map handing verifiers from the HTTP handler thread to the waiting
//! orchestrator.

// std
use std::time::{Duration as StdDuration, Instant};
// crates.io
use parking_lot::Condvar;
// self
use crate::_prelude::*;

/// Upper bound on one condvar sleep so interruption is observed even without a notify.
pub const RECHECK_INTERVAL: StdDuration = StdDuration::from_millis(500);

/// Result of [`PendingVerifiers::wait`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
	/// The matching callback arrived; the entry has been removed.
	Verifier(String),
	/// The timeout elapsed first.
	TimedOut,
	/// [`PendingVerifiers::interrupt`] was called.
	Interrupted,
}

#[derive(Debug, Default)]
struct PendingState {
	entries: HashMap<String, String>,
	interrupted: bool,
}

#[derive(Debug, Default)]
struct PendingInner {
	state: Mutex<PendingState>,
	ready: Condvar,
}

/// Correlation token to verifier map shared by the listener and its waiter.
///
/// Cloning is cheap and every clone observes the same map.
#[derive(Clone, Debug, Default)]
pub struct PendingVerifiers(Arc<PendingInner>);
impl PendingVerifiers {
	/// Records a verifier and wakes every waiter. A later delivery for the same token replaces
	/// an unconsumed one.
	pub fn deliver(&self, token: impl Into<String>, verifier: impl Into<String>) {
		self.0.state.lock().entries.insert(token.into(), verifier.into());
		self.0.ready.notify_all();
	}

	/// Blocks until `token` has a verifier, the timeout elapses, or the map is interrupted.
	///
	/// The map is checked under the lock before sleeping, so a verifier delivered before the
	/// call is returned immediately. `None` waits without a deadline.
	pub fn wait(&self, token: &str, timeout: Option<StdDuration>) -> WaitOutcome {
		let deadline = timeout.map(|t| Instant::now() + t);
		let mut state = self.0.state.lock();

		loop {
			if let Some(verifier) = state.entries.remove(token) {
				return WaitOutcome::Verifier(verifier);
			}
			if state.interrupted {
				return WaitOutcome::Interrupted;
			}

			let slice = match deadline {
				Some(deadline) => {
					let now = Instant::now();

					if now >= deadline {
						return WaitOutcome::TimedOut;
					}

					(deadline - now).min(RECHECK_INTERVAL)
				},
				None => RECHECK_INTERVAL,
			};

			self.0.ready.wait_for(&mut state, slice);
		}
	}

	/// Wakes every waiter with [`WaitOutcome::Interrupted`]; later waits return immediately.
	pub fn interrupt(&self) {
		self.0.state.lock().interrupted = true;
		self.0.ready.notify_all();
	}

	/// Returns true once [`interrupt`](Self::interrupt) has been called.
	pub fn is_interrupted(&self) -> bool {
		self.0.state.lock().interrupted
	}

	/// Drops an entry the orchestrator gave up on.
	pub fn discard(&self, token: &str) -> Option<String> {
		self.0.state.lock().entries.remove(token)
	}

	/// Number of undelivered verifiers.
	pub fn len(&self) -> usize {
		self.0.state.lock().entries.len()
	}

	/// Returns true when no verifier is waiting to be consumed.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Forgets every entry and any earlier interruption.
	pub fn clear(&self) {
		let mut state = self.0.state.lock();

		state.entries.clear();
		state.interrupted = false;
	}
}
