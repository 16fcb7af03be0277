use crate::context::OpContext;
use crate::error::Error;
use crate::id::Identifier;
use crate::item::Item;
use crate::node::Node;
use async_trait::async_trait;

/// External node persistence / identifier resolution / caching (§6.1).
///
/// Deliberately out of scope per §1: this crate never implements a
/// `NodeRepository`, only consumes one. Modeled on the shape of
/// `idx::trees::store::TreeStore`/`TreeNodeProvider` in this codebase's
/// `core` crate — `get`/`add`/`update`/`remove`/`fetched` — generalized from
/// their node-type-specific form to a generic `Node<K, V>`.
#[async_trait]
pub trait NodeRepository<K, V>: Send + Sync
where
	K: Send + Sync,
	V: Send + Sync,
{
	/// Looks up a node by id. A `Ok(None)` with no error means the id is
	/// unknown to the repository; callers must treat that as a corruption
	/// indicator except where `move_to_first`/`move_to_last` descent treats
	/// a `NIL` *child id* as an ordinary walk terminator (that check never
	/// reaches this method, since a `NIL` id is never looked up).
	async fn get(&self, ctx: &OpContext, id: Identifier) -> Result<Option<Node<K, V>>, Error>;

	async fn add(&self, ctx: &OpContext, node: Node<K, V>) -> Result<(), Error>;

	async fn update(&self, ctx: &OpContext, node: Node<K, V>) -> Result<(), Error>;

	async fn remove(&self, ctx: &OpContext, id: Identifier) -> Result<(), Error>;

	/// Advisory cache hint: the caller observed that this node was served
	/// from a live read. Repositories are free to make this a no-op.
	async fn fetched(&self, _ctx: &OpContext, _id: Identifier) {}
}

/// External lifecycle notifications for transactional commit (§6.2).
///
/// Called *after* a structurally valid change has been staged in memory —
/// never speculatively. `get` is the one method that mutates its argument:
/// when `item.value_needs_fetch` is true, an implementation loads the value,
/// sets `item.value`, sets `value_was_fetched`, and clears
/// `value_needs_fetch` (§3 "Item").
#[async_trait]
pub trait ItemActionTracker<K, V>: Send + Sync
where
	K: Send + Sync,
	V: Send + Sync,
{
	async fn add(&self, ctx: &OpContext, item: &Item<K, V>) -> Result<(), Error>;

	async fn update(&self, ctx: &OpContext, item: &Item<K, V>) -> Result<(), Error>;

	async fn remove(&self, ctx: &OpContext, item: &Item<K, V>) -> Result<(), Error>;

	async fn get(&self, ctx: &OpContext, item: &mut Item<K, V>) -> Result<(), Error>;
}
