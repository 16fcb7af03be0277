use std::sync::Arc;

use tokio::sync::Mutex;

use crate::comparator::KeyComparator;
use crate::context::OpContext;
use crate::error::Error;
use crate::id::Identifier;
use crate::item::Item;
use crate::repository::{ItemActionTracker, NodeRepository};
use crate::tree::Tree;

/// A handle over a shared [`Tree`] that captures its own current-item
/// reference (§4.4).
///
/// Several cursors can traverse the same tree independently: each swaps its
/// own saved position into the tree before delegating, then copies the
/// tree's post-operation position back out. The Tree itself is wrapped in a
/// `tokio::sync::Mutex` rather than handed out as `&mut` — this codebase's
/// own `idx::trees::store::TreeStore` is similarly shared behind a lock
/// across concurrent users of one index.
#[derive(Clone)]
pub struct Cursor<K, V, R, A, C> {
	tree: Arc<Mutex<Tree<K, V, R, A, C>>>,
	position: Option<(Identifier, usize)>,
}

impl<K, V, R, A, C> Cursor<K, V, R, A, C>
where
	K: Clone + Send + Sync + 'static,
	V: Clone + Send + Sync + 'static,
	R: NodeRepository<K, V>,
	A: ItemActionTracker<K, V>,
	C: KeyComparator<K>,
{
	pub fn new(tree: Arc<Mutex<Tree<K, V, R, A, C>>>) -> Self {
		Self {
			tree,
			position: None,
		}
	}

	pub fn position(&self) -> Option<(Identifier, usize)> {
		self.position
	}

	pub async fn find(&mut self, ctx: &OpContext, key: &K, first_with_key: bool) -> Result<bool, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.find(ctx, key, first_with_key).await;
		self.position = tree.current_position();
		result
	}

	pub async fn find_in_descending_order(&mut self, ctx: &OpContext, key: &K) -> Result<bool, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.find_in_descending_order(ctx, key).await;
		self.position = tree.current_position();
		result
	}

	pub async fn first(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.first(ctx).await;
		self.position = tree.current_position();
		result
	}

	pub async fn last(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.last(ctx).await;
		self.position = tree.current_position();
		result
	}

	pub async fn next(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.next(ctx).await;
		self.position = tree.current_position();
		result
	}

	pub async fn previous(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.previous(ctx).await;
		self.position = tree.current_position();
		result
	}

	pub async fn get_current_key(&mut self, ctx: &OpContext) -> Result<K, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.get_current_key(ctx).await;
		self.position = tree.current_position();
		result
	}

	pub async fn get_current_value(&mut self, ctx: &OpContext) -> Result<Option<V>, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.get_current_value(ctx).await;
		self.position = tree.current_position();
		result
	}

	pub async fn get_current_item(&mut self, ctx: &OpContext) -> Result<Item<K, V>, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.get_current_item(ctx).await;
		self.position = tree.current_position();
		result
	}

	pub async fn update_current_value(&mut self, ctx: &OpContext, value: V) -> Result<(), Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.update_current_value(ctx, value).await;
		self.position = tree.current_position();
		result
	}

	pub async fn update_current_key(&mut self, ctx: &OpContext, new_key: K) -> Result<bool, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.update_current_key(ctx, new_key).await;
		self.position = tree.current_position();
		result
	}

	pub async fn update_current_item(&mut self, ctx: &OpContext, new_key: K, value: V) -> Result<bool, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.update_current_item(ctx, new_key, value).await;
		self.position = tree.current_position();
		result
	}

	pub async fn remove_current_item(&mut self, ctx: &OpContext) -> Result<Option<Item<K, V>>, Error> {
		let mut tree = self.tree.lock().await;
		tree.set_current_position(self.position);
		let result = tree.remove_current_item(ctx).await;
		self.position = tree.current_position();
		result
	}
}
