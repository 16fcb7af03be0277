use std::sync::Arc;

use tokio::sync::Mutex;

use crate::comparator::KeyComparator;
use crate::context::OpContext;
use crate::error::Error;
use crate::item::Item;
use crate::repository::{ItemActionTracker, NodeRepository};
use crate::transaction::{TransactionMode, TwoPhaseCommitTransaction};
use crate::tree::Tree;

/// Enforces the two-phase-commit transaction preconditions around a shared
/// [`Tree`] (§4.5, §6.3, §7 error kind 3).
///
/// All operations forward iff `transaction.has_begun()`; writer operations
/// additionally require `get_mode()` to allow writes. On precondition
/// failure or a delegated error, the wrapper issues `rollback` and composes
/// the two failures if rollback itself fails. This mirrors the
/// precondition-then-delegate-then-rollback-on-error shape this codebase's
/// own transaction-bound facades use ahead of their store calls, generalized
/// to the three `TransactionMode`s named in §6.3.
pub struct TransactionWrapper<K, V, R, A, C, T> {
	tree: Arc<Mutex<Tree<K, V, R, A, C>>>,
	transaction: T,
}

impl<K, V, R, A, C, T> TransactionWrapper<K, V, R, A, C, T>
where
	K: Clone + Send + Sync + 'static,
	V: Clone + Send + Sync + 'static,
	R: NodeRepository<K, V>,
	A: ItemActionTracker<K, V>,
	C: KeyComparator<K>,
	T: TwoPhaseCommitTransaction,
{
	pub fn new(tree: Arc<Mutex<Tree<K, V, R, A, C>>>, transaction: T) -> Self {
		Self {
			tree,
			transaction,
		}
	}

	pub fn transaction(&self) -> &T {
		&self.transaction
	}

	/// Precondition check for a read operation. A stray read issued before
	/// `begin` still triggers a deterministic rollback (§4.5 "Read-only
	/// operations executed before begin").
	async fn check_readable(&self, ctx: &OpContext) -> Result<(), Error> {
		if !self.transaction.has_begun() {
			let _ = self.transaction.rollback(ctx, None).await;
			return Err(Error::TransactionNotBegun);
		}
		Ok(())
	}

	async fn check_writable(&self, ctx: &OpContext) -> Result<(), Error> {
		self.check_readable(ctx).await?;
		if !self.transaction.get_mode().allows_writes() {
			let _ = self.transaction.rollback(ctx, None).await;
			return Err(Error::TransactionNotWritable);
		}
		Ok(())
	}

	/// Runs `op` after the appropriate precondition check, rolling back and
	/// composing the failure if `op` itself errors.
	async fn guarded<Fut, Res>(&self, ctx: &OpContext, writer: bool, op: Fut) -> Result<Res, Error>
	where
		Fut: std::future::Future<Output = Result<Res, Error>>,
	{
		if writer {
			self.check_writable(ctx).await?;
		} else {
			self.check_readable(ctx).await?;
		}
		match op.await {
			Ok(value) => Ok(value),
			Err(cause) => match self.transaction.rollback(ctx, Some(&cause)).await {
				Ok(()) => Err(cause),
				Err(rollback_err) => Err(Error::RollbackFailed {
					cause: Box::new(cause),
					rollback_failure: rollback_err.to_string(),
				}),
			},
		}
	}

	pub async fn add(&self, ctx: &OpContext, key: K, value: V) -> Result<bool, Error> {
		self.guarded(ctx, true, async {
			let mut tree = self.tree.lock().await;
			tree.add(ctx, key, value).await
		})
		.await
	}

	pub async fn add_if_not_exist(&self, ctx: &OpContext, key: K, value: V) -> Result<bool, Error> {
		self.guarded(ctx, true, async {
			let mut tree = self.tree.lock().await;
			tree.add_if_not_exist(ctx, key, value).await
		})
		.await
	}

	pub async fn upsert(&self, ctx: &OpContext, key: K, value: V) -> Result<(), Error> {
		self.guarded(ctx, true, async {
			let mut tree = self.tree.lock().await;
			tree.upsert(ctx, key, value).await
		})
		.await
	}

	pub async fn add_item(&self, ctx: &OpContext, item: Item<K, V>) -> Result<bool, Error> {
		self.guarded(ctx, true, async {
			let mut tree = self.tree.lock().await;
			tree.add_item(ctx, item).await
		})
		.await
	}

	pub async fn find(&self, ctx: &OpContext, key: &K) -> Result<bool, Error> {
		self.guarded(ctx, false, async {
			let mut tree = self.tree.lock().await;
			tree.find(ctx, key, false).await
		})
		.await
	}

	pub async fn remove(&self, ctx: &OpContext, key: &K) -> Result<bool, Error> {
		self.guarded(ctx, true, async {
			let mut tree = self.tree.lock().await;
			tree.remove(ctx, key).await
		})
		.await
	}

	pub async fn count(&self) -> u64 {
		self.tree.lock().await.count()
	}

	pub async fn is_empty(&self) -> bool {
		self.tree.lock().await.is_empty()
	}

	pub async fn begin(&self, ctx: &OpContext, mode: TransactionMode) -> Result<(), Error> {
		self.transaction.begin(ctx, mode).await
	}

	pub async fn commit(&self, ctx: &OpContext) -> Result<(), Error> {
		self.transaction.phase1_commit(ctx).await?;
		self.transaction.phase2_commit(ctx).await
	}

	pub async fn rollback(&self, ctx: &OpContext) -> Result<(), Error> {
		self.transaction.rollback(ctx, None).await
	}

	pub async fn close(&self, ctx: &OpContext) -> Result<(), Error> {
		self.transaction.close(ctx).await
	}
}
