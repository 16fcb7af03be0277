use crate::id::Identifier;
use thiserror::Error;

/// The single error type surfaced by this crate.
///
/// Mirrors the `#[derive(Debug, Error)]` + `#[error("...")]` convention used
/// throughout this codebase's error modules (see `gql::error::GqlError`,
/// `rpc::rpc_error::RpcError`): one flat enum per boundary, each variant
/// carrying just enough context to explain itself without a backtrace.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// A `NodeRepository` call (`get`/`add`/`update`/`remove`) failed.
	#[error("node repository error: {0}")]
	Repository(String),

	/// An `ItemActionTracker` call (`add`/`update`/`remove`/`get`) failed.
	#[error("item action tracker error: {0}")]
	Tracker(String),

	/// A node that must exist (by invariant) could not be found.
	#[error("corrupted index: {0}")]
	CorruptedIndex(&'static str),

	/// A getter (`get_current_key`/`get_current_value`/`get_current_item`)
	/// was called with no current-item selection.
	#[error("no current item is selected")]
	NoCurrentSelection,

	/// The transaction wrapper was asked to forward an operation before
	/// `begin` was called.
	#[error("transaction has not begun")]
	TransactionNotBegun,

	/// The transaction wrapper was asked to forward a writer operation while
	/// the transaction's mode is `ForReading`.
	#[error("transaction is not open for writing")]
	TransactionNotWritable,

	/// A delegated operation failed, and the wrapper's own `rollback` call
	/// then *also* failed; both causes are preserved.
	#[error("operation failed: {cause}; additionally, rollback failed: {rollback_failure}")]
	RollbackFailed {
		cause: Box<Error>,
		rollback_failure: String,
	},

	/// A `NodeRepository`/`ItemActionTracker` call observed a cancelled or
	/// expired operation context.
	#[error("operation cancelled")]
	Cancelled,

	/// A node identifier that the caller supplied (or that the tree
	/// computed) turned out to be `NIL` where a concrete node was required.
	#[error("unexpected nil identifier in {0}")]
	UnexpectedNil(&'static str),

	/// Every comparator fell through to the canonical-string fallback and
	/// even that failed (e.g. the key type cannot be rendered at all).
	#[error("no comparator available for key, and canonical string fallback failed")]
	IncomparableKey,

	/// Defensive bound check: a slot or child index fell outside
	/// `[0, slot_length]`. Only possible if an invariant was already broken.
	#[error("slot index {index} out of bounds for node {node} (slot_length {slot_length})")]
	SlotOutOfBounds {
		node: Identifier,
		index: usize,
		slot_length: usize,
	},
}

impl Error {
	pub(crate) fn repository(err: impl std::fmt::Display) -> Self {
		Self::Repository(err.to_string())
	}

	pub(crate) fn tracker(err: impl std::fmt::Display) -> Self {
		Self::Tracker(err.to_string())
	}
}
