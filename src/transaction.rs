use crate::context::OpContext;
use crate::error::Error;
use async_trait::async_trait;

/// The mode a [`TwoPhaseCommitTransaction`] was opened in (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
	ForReading,
	ForWriting,
	ForReadOrWrite,
}

impl TransactionMode {
	pub fn allows_writes(self) -> bool {
		matches!(self, Self::ForWriting | Self::ForReadOrWrite)
	}
}

/// The boundary contract consumed by [`crate::wrapper::TransactionWrapper`]
/// (§6.3). The core itself calls only `has_begun`, `get_mode`, and
/// `rollback` (§4.5) — the remaining methods exist because a real two-phase
/// commit session needs them, not because the tree does.
///
/// Generalizes this codebase's `TransactionType::{Read,Write}` dispatch
/// (seen gating `idx::trees::store::TreeStore::new`) to a three-mode,
/// full-session contract.
#[async_trait]
pub trait TwoPhaseCommitTransaction: Send + Sync {
	fn get_id(&self) -> String;

	async fn begin(&self, ctx: &OpContext, mode: TransactionMode) -> Result<(), Error>;

	fn has_begun(&self) -> bool;

	fn get_mode(&self) -> TransactionMode;

	async fn phase1_commit(&self, ctx: &OpContext) -> Result<(), Error>;

	async fn phase2_commit(&self, ctx: &OpContext) -> Result<(), Error>;

	/// `cause` is `None` for a deliberate, non-error rollback (e.g. a
	/// mode-mismatch or a stray pre-`begin` read), `Some` when triggered by
	/// a delegated operation's error (§4.5).
	async fn rollback(&self, ctx: &OpContext, cause: Option<&Error>) -> Result<(), Error>;

	async fn close(&self, ctx: &OpContext) -> Result<(), Error>;

	fn commit_max_duration(&self) -> Option<std::time::Duration>;

	fn get_stores(&self) -> Vec<String>;
}
