use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Error;

/// A cancellation/deadline signal threaded through every Tree, repository and
/// tracker call (§5 "Cancellation and timeouts").
///
/// This is a deliberately small cousin of this codebase's `ctx::Context`
/// (`core/src/ctx/context.rs`), which additionally carries scoped values,
/// scripting/network capabilities and notification channels — none of which
/// the B-tree core needs. Only the cancellation facet survives here; the
/// rest is out of scope for an externalized, I/O-agnostic index.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
	cancelled: Arc<AtomicBool>,
}

/// A handle that can cancel the `OpContext` it was created from.
#[derive(Debug, Clone)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}
}

impl OpContext {
	/// A context that never cancels, for callers with no cancellation needs.
	pub fn background() -> Self {
		Self::default()
	}

	/// A child context whose cancellation flag is independent of `self`'s.
	pub fn new_isolated() -> Self {
		Self::default()
	}

	/// Returns a [`Canceller`] that can cancel this context.
	pub fn add_cancel(&self) -> Canceller {
		Canceller(self.cancelled.clone())
	}

	pub fn is_done(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}

	/// Returns `Err(Error::Cancelled)` iff this context has been cancelled.
	/// Called at the top of every repository/tracker-facing operation.
	pub fn check(&self) -> Result<(), Error> {
		if self.is_done() {
			Err(Error::Cancelled)
		} else {
			Ok(())
		}
	}
}
