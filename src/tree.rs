use async_recursion::async_recursion;

use crate::comparator::KeyComparator;
use crate::context::OpContext;
use crate::descriptor::StoreDescriptor;
use crate::error::Error;
use crate::id::Identifier;
use crate::item::Item;
use crate::node::Node;
use crate::repository::{ItemActionTracker, NodeRepository};

/// The Tree's detached current-item reference (§3 "Tree", "Current-item
/// reference"): a `(node_id, slot_index)` pair, `NIL`/`-1` when unselected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CurrentRef {
	pub node_id: Identifier,
	pub slot_index: i64,
}

impl CurrentRef {
	pub const NONE: CurrentRef = CurrentRef {
		node_id: Identifier::NIL,
		slot_index: -1,
	};

	pub fn is_set(&self) -> bool {
		!self.node_id.is_nil() && self.slot_index >= 0
	}

	pub fn set(node_id: Identifier, slot_index: usize) -> Self {
		Self {
			node_id,
			slot_index: slot_index as i64,
		}
	}
}

impl Default for CurrentRef {
	fn default() -> Self {
		Self::NONE
	}
}

/// A deferred structural operation queued on the Tree and drained by the
/// controller loop after the recursive node operation returns (§4.3, §9
/// "Controller loop vs direct recursion").
#[derive(Debug)]
enum PromoteAction<K, V> {
	Promote {
		parent: Identifier,
		index: usize,
		median: Item<K, V>,
		left_child: Identifier,
		right_child: Identifier,
	},
}

#[derive(Debug)]
enum DistributeAction<K, V> {
	Distribute {
		source: Identifier,
		item: Item<K, V>,
		to_left: bool,
	},
}

/// The generic, externalized, transaction-aware B-tree index (§2 "Tree").
///
/// Generic over the key `K`, value `V`, the externalized
/// [`NodeRepository`]/[`ItemActionTracker`] collaborators, and the pluggable
/// [`KeyComparator`]. The repository and tracker are consumed as trait
/// bounds rather than trait objects because a `Tree` is always built against
/// one concrete pair of collaborators — matching how this codebase's
/// `idx::docids::DocIds` is built against one concrete `BTreeStore<TrieKeys>`
/// rather than a boxed store.
pub struct Tree<K, V, R, A, C> {
	descriptor: StoreDescriptor,
	repository: R,
	tracker: A,
	comparator: C,
	current: CurrentRef,
	promote_action: Option<PromoteAction<K, V>>,
	distribute_action: Option<DistributeAction<K, V>>,
}

impl<K, V, R, A, C> Tree<K, V, R, A, C>
where
	K: Clone + Send + Sync + 'static,
	V: Clone + Send + Sync + 'static,
	R: NodeRepository<K, V>,
	A: ItemActionTracker<K, V>,
	C: KeyComparator<K>,
{
	pub fn new(descriptor: StoreDescriptor, repository: R, tracker: A, comparator: C) -> Self {
		Self {
			descriptor,
			repository,
			tracker,
			comparator,
			current: CurrentRef::NONE,
			promote_action: None,
			distribute_action: None,
		}
	}

	pub fn count(&self) -> u64 {
		self.descriptor.count
	}

	pub fn is_empty(&self) -> bool {
		self.descriptor.count == 0
	}

	pub fn descriptor(&self) -> &StoreDescriptor {
		&self.descriptor
	}

	pub fn repository(&self) -> &R {
		&self.repository
	}

	pub fn tracker(&self) -> &A {
		&self.tracker
	}

	fn clear_cursor(&mut self) {
		self.current = CurrentRef::NONE;
	}

	/// The Tree's current-item reference, exposed so a [`crate::cursor::Cursor`]
	/// can save and restore it around a delegated call (§4.4).
	pub fn current_position(&self) -> Option<(Identifier, usize)> {
		self.current.is_set().then_some((self.current.node_id, self.current.slot_index as usize))
	}

	pub fn set_current_position(&mut self, position: Option<(Identifier, usize)>) {
		self.current = match position {
			Some((node_id, slot_index)) => CurrentRef::set(node_id, slot_index),
			None => CurrentRef::NONE,
		};
	}

	/// Invariant 8: both controller actions must be clear at the start and
	/// end of every public operation.
	fn assert_controller_clear(&self) {
		debug_assert!(self.promote_action.is_none());
		debug_assert!(self.distribute_action.is_none());
	}

	async fn get_node(&self, ctx: &OpContext, id: Identifier) -> Result<Node<K, V>, Error> {
		ctx.check()?;
		match self.repository.get(ctx, id).await? {
			Some(node) => {
				self.repository.fetched(ctx, id).await;
				Ok(node)
			}
			None => Err(Error::CorruptedIndex("NodeRepository::get returned nil for a referenced node id")),
		}
	}

	async fn save_node(&self, ctx: &OpContext, node: &Node<K, V>, is_new: bool) -> Result<(), Error> {
		ctx.check()?;
		if is_new {
			self.repository.add(ctx, node.clone()).await
		} else {
			self.repository.update(ctx, node.clone()).await
		}
	}

	/// Position of `node` within its parent's `children_ids`, using the
	/// cache when it still checks out (§3 "Node": "invalidated by checking
	/// equality"), recomputing by scanning the parent otherwise.
	fn index_in_parent(node: &Node<K, V>, parent: &Node<K, V>) -> Result<usize, Error> {
		if let Some(idx) = node.index_of_node {
			if parent.child_id(idx) == node.id {
				return Ok(idx);
			}
		}
		parent
			.children_ids
			.iter()
			.position(|c| *c == node.id)
			.ok_or(Error::CorruptedIndex("node id not found among parent's children"))
	}

	// ---------------------------------------------------------------
	// §4.2.7 / §4.2.8 find
	// ---------------------------------------------------------------

	/// `find(key, first_with_key)` (§4.2.7).
	pub async fn find(&mut self, ctx: &OpContext, key: &K, first_with_key: bool) -> Result<bool, Error> {
		self.assert_controller_clear();
		self.clear_cursor();
		if self.descriptor.root_node_id.is_nil() {
			return Ok(false);
		}
		let found = self.find_recursive(ctx, self.descriptor.root_node_id, key, first_with_key).await?;
		if !found {
			self.position_nearest_neighbor(ctx, key).await?;
		}
		self.assert_controller_clear();
		Ok(found)
	}

	#[async_recursion]
	async fn find_recursive(
		&mut self,
		ctx: &OpContext,
		node_id: Identifier,
		key: &K,
		first_with_key: bool,
	) -> Result<bool, Error>
	where
		K: 'async_recursion,
		V: 'async_recursion,
	{
		let node = self.get_node(ctx, node_id).await?;
		match node.binary_search(key, &self.comparator) {
			Ok(idx) => {
				self.current = CurrentRef::set(node.id, idx);
				if first_with_key && !node.is_leaf() {
					let left_child = node.child_id(idx);
					if !left_child.is_nil() {
						// keep descending left while an equal key can still
						// be found further left; stop on NIL or a leaf.
						let _ = self.find_leftmost_duplicate(ctx, left_child, key).await?;
					}
				}
				Ok(true)
			}
			Err(idx) => {
				if node.is_leaf() {
					Ok(false)
				} else {
					let child = node.child_id(idx);
					if child.is_nil() {
						Ok(false)
					} else {
						self.find_recursive(ctx, child, key, first_with_key).await
					}
				}
			}
		}
	}

	/// Helper for the `first_with_key` bias: descend into the left child of
	/// an equality match looking for a still-earlier duplicate, terminating
	/// on `NIL` or a leaf (§4.2.7, §9 "Duplicates and 'first item with
	/// key'"). Updates `self.current` whenever a strictly-earlier-or-equal
	/// match is found further down.
	#[async_recursion]
	async fn find_leftmost_duplicate(&mut self, ctx: &OpContext, node_id: Identifier, key: &K) -> Result<(), Error>
	where
		K: 'async_recursion,
		V: 'async_recursion,
	{
		let node = self.get_node(ctx, node_id).await?;
		match node.binary_search(key, &self.comparator) {
			Ok(idx) => {
				self.current = CurrentRef::set(node.id, idx);
				if node.is_leaf() {
					return Ok(());
				}
				let left_child = node.child_id(idx);
				if left_child.is_nil() {
					return Ok(());
				}
				self.find_leftmost_duplicate(ctx, left_child, key).await
			}
			Err(_) => {
				// The rightmost slot of this subtree is already < key
				// everywhere below a miss here; nothing earlier to find.
				Ok(())
			}
		}
	}

	/// On a miss, position the cursor at the nearest key not less than
	/// `key`; if the computed index lands past `count`, fall back to
	/// `count - 1` and advance once via `move_to_next` (§4.2.7).
	async fn position_nearest_neighbor(&mut self, ctx: &OpContext, key: &K) -> Result<(), Error> {
		if self.descriptor.root_node_id.is_nil() {
			self.clear_cursor();
			return Ok(());
		}
		let mut node_id = self.descriptor.root_node_id;
		loop {
			let node = self.get_node(ctx, node_id).await?;
			match node.binary_search(key, &self.comparator) {
				Ok(idx) | Err(idx) => {
					if node.is_leaf() {
						if idx < node.count {
							self.current = CurrentRef::set(node.id, idx);
						} else if node.count > 0 {
							debug_assert!(idx <= node.count, "nearest-neighbor index must not exceed count");
							self.current = CurrentRef::set(node.id, node.count - 1);
							self.move_to_next(ctx).await?;
						} else {
							self.clear_cursor();
						}
						return Ok(());
					}
					let child = node.child_id(idx);
					if child.is_nil() {
						if idx < node.count {
							self.current = CurrentRef::set(node.id, idx);
						} else if node.count > 0 {
							self.current = CurrentRef::set(node.id, node.count - 1);
							self.move_to_next(ctx).await?;
						} else {
							self.clear_cursor();
						}
						return Ok(());
					}
					node_id = child;
				}
			}
		}
	}

	/// `find_with_id(key, id)`: true only if a duplicate with the given
	/// identity exists.
	pub async fn find_with_id(&mut self, ctx: &OpContext, key: &K, id: Identifier) -> Result<bool, Error> {
		self.assert_controller_clear();
		self.clear_cursor();
		if self.descriptor.root_node_id.is_nil() {
			return Ok(false);
		}
		let found = self.find_with_id_recursive(ctx, self.descriptor.root_node_id, key, id).await?;
		if !found {
			self.clear_cursor();
		}
		self.assert_controller_clear();
		Ok(found)
	}

	#[async_recursion]
	async fn find_with_id_recursive(
		&mut self,
		ctx: &OpContext,
		node_id: Identifier,
		key: &K,
		id: Identifier,
	) -> Result<bool, Error>
	where
		K: 'async_recursion,
		V: 'async_recursion,
	{
		let node = self.get_node(ctx, node_id).await?;
		match node.binary_search(key, &self.comparator) {
			Ok(idx) => {
				// Scan the equal-key run starting here for the given id,
				// walking right over the occupied prefix while keys stay
				// equal, and also trying the left subtree of the first
				// match (duplicates can live on either side of a separator).
				let mut i = idx;
				while i < node.count {
					let item = node.item(i).unwrap();
					if self.comparator.compare(&item.key, key) != std::cmp::Ordering::Equal {
						break;
					}
					if item.id == id {
						self.current = CurrentRef::set(node.id, i);
						return Ok(true);
					}
					i += 1;
				}
				if !node.is_leaf() {
					let left_child = node.child_id(idx);
					if !left_child.is_nil() && self.find_with_id_recursive(ctx, left_child, key, id).await? {
						return Ok(true);
					}
					let right_child = node.child_id(i);
					if !right_child.is_nil() {
						return self.find_with_id_recursive(ctx, right_child, key, id).await;
					}
				}
				Ok(false)
			}
			Err(idx) => {
				if node.is_leaf() {
					Ok(false)
				} else {
					let child = node.child_id(idx);
					if child.is_nil() {
						Ok(false)
					} else {
						self.find_with_id_recursive(ctx, child, key, id).await
					}
				}
			}
		}
	}

	/// `find_in_descending_order(key)` (§4.2.8): mirror of `find`, landing on
	/// the rightmost equal key.
	pub async fn find_in_descending_order(&mut self, ctx: &OpContext, key: &K) -> Result<bool, Error> {
		self.assert_controller_clear();
		self.clear_cursor();
		if self.descriptor.root_node_id.is_nil() {
			return Ok(false);
		}
		let found = self.find_descending_recursive(ctx, self.descriptor.root_node_id, key).await?;
		if !found {
			self.position_nearest_neighbor_descending(ctx, key).await?;
		}
		self.assert_controller_clear();
		Ok(found)
	}

	#[async_recursion]
	async fn find_descending_recursive(&mut self, ctx: &OpContext, node_id: Identifier, key: &K) -> Result<bool, Error>
	where
		K: 'async_recursion,
		V: 'async_recursion,
	{
		let node = self.get_node(ctx, node_id).await?;
		match node.binary_search_descending(key, &self.comparator) {
			Ok(idx) => {
				self.current = CurrentRef::set(node.id, idx);
				Ok(true)
			}
			Err(idx) => {
				if node.is_leaf() {
					Ok(false)
				} else {
					let child = node.child_id(idx);
					if child.is_nil() {
						Ok(false)
					} else {
						self.find_descending_recursive(ctx, child, key).await
					}
				}
			}
		}
	}

	async fn position_nearest_neighbor_descending(&mut self, ctx: &OpContext, key: &K) -> Result<(), Error> {
		if self.descriptor.root_node_id.is_nil() {
			self.clear_cursor();
			return Ok(());
		}
		let mut node_id = self.descriptor.root_node_id;
		loop {
			let node = self.get_node(ctx, node_id).await?;
			let idx = match node.binary_search_descending(key, &self.comparator) {
				Ok(idx) | Err(idx) => idx,
			};
			if node.is_leaf() {
				if idx > 0 {
					self.current = CurrentRef::set(node.id, idx - 1);
				} else {
					self.clear_cursor();
					self.move_to_previous(ctx).await?;
				}
				return Ok(());
			}
			let child = node.child_id(idx);
			if child.is_nil() {
				if idx > 0 {
					self.current = CurrentRef::set(node.id, idx - 1);
				} else {
					self.clear_cursor();
				}
				return Ok(());
			}
			node_id = child;
		}
	}

	// ---------------------------------------------------------------
	// §4.2.9 Cursor traversal
	// ---------------------------------------------------------------

	pub async fn first(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		self.assert_controller_clear();
		self.clear_cursor();
		if self.descriptor.root_node_id.is_nil() {
			return Ok(false);
		}
		let ok = self.move_to_first_from(ctx, self.descriptor.root_node_id).await?;
		self.assert_controller_clear();
		Ok(ok)
	}

	async fn move_to_first_from(&mut self, ctx: &OpContext, mut node_id: Identifier) -> Result<bool, Error> {
		loop {
			let node = self.get_node(ctx, node_id).await?;
			if node.is_leaf() {
				if node.count == 0 {
					self.clear_cursor();
					return Ok(false);
				}
				self.current = CurrentRef::set(node.id, 0);
				return Ok(true);
			}
			let first_child = node.child_id(0);
			if first_child.is_nil() {
				// no left subtree: this internal node's own slot 0 is the
				// leftmost remaining item.
				self.current = CurrentRef::set(node.id, 0);
				return Ok(true);
			}
			node_id = first_child;
		}
	}

	pub async fn last(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		self.assert_controller_clear();
		self.clear_cursor();
		if self.descriptor.root_node_id.is_nil() {
			return Ok(false);
		}
		let ok = self.move_to_last_from(ctx, self.descriptor.root_node_id).await?;
		self.assert_controller_clear();
		Ok(ok)
	}

	async fn move_to_last_from(&mut self, ctx: &OpContext, mut node_id: Identifier) -> Result<bool, Error> {
		loop {
			let node = self.get_node(ctx, node_id).await?;
			if node.is_leaf() {
				if node.count == 0 {
					self.clear_cursor();
					return Ok(false);
				}
				self.current = CurrentRef::set(node.id, node.count - 1);
				return Ok(true);
			}
			let last_child = node.child_id(node.count);
			if last_child.is_nil() {
				if node.count == 0 {
					self.clear_cursor();
					return Ok(false);
				}
				self.current = CurrentRef::set(node.id, node.count - 1);
				return Ok(true);
			}
			node_id = last_child;
		}
	}

	pub async fn next(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		self.assert_controller_clear();
		let ok = self.move_to_next(ctx).await?;
		self.assert_controller_clear();
		Ok(ok)
	}

	async fn move_to_next(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		if !self.current.is_set() {
			return Ok(false);
		}
		let node_id = self.current.node_id;
		let slot = self.current.slot_index as usize;
		let node = self.get_node(ctx, node_id).await?;
		if node.is_leaf() {
			if slot + 1 < node.count {
				self.current = CurrentRef::set(node.id, slot + 1);
				return Ok(true);
			}
			return self.climb_to_next(ctx, node).await;
		}
		let next_child = node.child_id(slot + 1);
		if next_child.is_nil() {
			if slot + 1 < node.count {
				self.current = CurrentRef::set(node.id, slot + 1);
				return Ok(true);
			}
			return self.climb_to_next(ctx, node).await;
		}
		self.move_to_first_from(ctx, next_child).await
	}

	#[async_recursion]
	async fn climb_to_next(&mut self, ctx: &OpContext, mut node: Node<K, V>) -> Result<bool, Error>
	where
		K: 'async_recursion,
		V: 'async_recursion,
	{
		loop {
			if node.is_root() {
				self.clear_cursor();
				return Ok(false);
			}
			let parent = self.get_node(ctx, node.parent_id).await?;
			let idx = Self::index_in_parent(&node, &parent)?;
			if idx < parent.count {
				self.current = CurrentRef::set(parent.id, idx);
				return Ok(true);
			}
			node = parent;
		}
	}

	pub async fn previous(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		self.assert_controller_clear();
		let ok = self.move_to_previous(ctx).await?;
		self.assert_controller_clear();
		Ok(ok)
	}

	async fn move_to_previous(&mut self, ctx: &OpContext) -> Result<bool, Error> {
		if !self.current.is_set() {
			return Ok(false);
		}
		let node_id = self.current.node_id;
		let slot = self.current.slot_index as usize;
		let node = self.get_node(ctx, node_id).await?;
		if !node.is_leaf() {
			let prev_child = node.child_id(slot);
			if !prev_child.is_nil() {
				return self.move_to_last_from(ctx, prev_child).await;
			}
		}
		if slot > 0 {
			self.current = CurrentRef::set(node.id, slot - 1);
			return Ok(true);
		}
		self.climb_to_previous(ctx, node).await
	}

	#[async_recursion]
	async fn climb_to_previous(&mut self, ctx: &OpContext, mut node: Node<K, V>) -> Result<bool, Error>
	where
		K: 'async_recursion,
		V: 'async_recursion,
	{
		loop {
			if node.is_root() {
				self.clear_cursor();
				return Ok(false);
			}
			let parent = self.get_node(ctx, node.parent_id).await?;
			let idx = Self::index_in_parent(&node, &parent)?;
			if idx > 0 {
				self.current = CurrentRef::set(parent.id, idx - 1);
				return Ok(true);
			}
			node = parent;
		}
	}

	// ---------------------------------------------------------------
	// Getters
	// ---------------------------------------------------------------

	pub async fn get_current_key(&self, ctx: &OpContext) -> Result<K, Error> {
		if !self.current.is_set() {
			return Err(Error::NoCurrentSelection);
		}
		let node = self.get_node(ctx, self.current.node_id).await?;
		let item =
			node.item(self.current.slot_index as usize).ok_or(Error::NoCurrentSelection)?;
		Ok(item.key.clone())
	}

	/// Returns the current value, triggering an `ItemActionTracker::get`
	/// fetch (and persisting the resulting item) if the item is externally
	/// stored and not yet fetched (§3 "Item", §6.2).
	pub async fn get_current_value(&mut self, ctx: &OpContext) -> Result<Option<V>, Error> {
		Ok(self.get_current_item(ctx).await?.value)
	}

	pub async fn get_current_item(&mut self, ctx: &OpContext) -> Result<Item<K, V>, Error> {
		if !self.current.is_set() {
			return Err(Error::NoCurrentSelection);
		}
		let mut node = self.get_node(ctx, self.current.node_id).await?;
		let idx = self.current.slot_index as usize;
		{
			let needs_fetch = node.item(idx).ok_or(Error::NoCurrentSelection)?.value_needs_fetch;
			if needs_fetch {
				let item = node.item_mut(idx).ok_or(Error::NoCurrentSelection)?;
				self.tracker.get(ctx, item).await?;
				item.value_needs_fetch = false;
				item.value_was_fetched = true;
				let node_clone = node.clone();
				self.save_node(ctx, &node_clone, false).await?;
			}
		}
		node.item(idx).cloned().ok_or(Error::NoCurrentSelection)
	}

	/// Releases a previously-fetched externalized value, bounding memory
	/// (§9 "Value externalization"). A no-op whenever values are stored
	/// inline (`is_value_data_in_node_segment`), matching the source
	/// (§9 Open Questions).
	pub async fn unfetch_current_value(&mut self, ctx: &OpContext) -> Result<(), Error> {
		if self.descriptor.is_value_data_in_node_segment || !self.descriptor.is_value_data_actively_persisted {
			return Ok(());
		}
		if !self.current.is_set() {
			return Ok(());
		}
		let mut node = self.get_node(ctx, self.current.node_id).await?;
		let idx = self.current.slot_index as usize;
		if let Some(item) = node.item_mut(idx) {
			if item.value_was_fetched {
				item.value = None;
				item.value_needs_fetch = true;
				item.value_was_fetched = false;
				let node_clone = node.clone();
				self.save_node(ctx, &node_clone, false).await?;
			}
		}
		Ok(())
	}

	// ---------------------------------------------------------------
	// §4.2.2-§4.2.6 insertion
	// ---------------------------------------------------------------

	pub async fn add(&mut self, ctx: &OpContext, key: K, value: V) -> Result<bool, Error> {
		self.add_item(ctx, Item::new(key, value)).await
	}

	/// Identical to `add` on unique stores; on non-unique stores, rejects
	/// regardless of uniqueness config if *any* duplicate key exists.
	pub async fn add_if_not_exist(&mut self, ctx: &OpContext, key: K, value: V) -> Result<bool, Error> {
		if self.find(ctx, &key, false).await? {
			return Ok(false);
		}
		self.add_item(ctx, Item::new(key, value)).await
	}

	/// Inserts or updates in place.
	pub async fn upsert(&mut self, ctx: &OpContext, key: K, value: V) -> Result<(), Error> {
		if self.find(ctx, &key, false).await? {
			self.update_current_value(ctx, value).await
		} else {
			self.add_item(ctx, Item::new(key, value)).await.map(|_| ())
		}
	}

	pub async fn add_item(&mut self, ctx: &OpContext, item: Item<K, V>) -> Result<bool, Error> {
		self.assert_controller_clear();
		self.clear_cursor();
		ctx.check()?;

		let inserted = if self.descriptor.root_node_id.is_nil() {
			let mut root = Node::new_leaf(Identifier::new(), Identifier::NIL, self.descriptor.slot_length);
			root.insert_slot_item(0, item.clone());
			self.save_node(ctx, &root, true).await?;
			self.descriptor.root_node_id = root.id;
			self.current = CurrentRef::set(root.id, 0);
			true
		} else {
			self.add_recursive(ctx, self.descriptor.root_node_id, item.clone()).await?
		};

		if inserted {
			self.drain_controller(ctx).await?;
			self.descriptor.count += 1;
			self.tracker.add(ctx, &item).await?;
		}
		self.assert_controller_clear();
		Ok(inserted)
	}

	#[async_recursion]
	async fn add_recursive(&mut self, ctx: &OpContext, node_id: Identifier, item: Item<K, V>) -> Result<bool, Error>
	where
		K: 'async_recursion,
		V: 'async_recursion,
	{
		let mut node = self.get_node(ctx, node_id).await?;
		let search = node.binary_search(&item.key, &self.comparator);
		if node.is_leaf() {
			match search {
				Ok(idx) if self.descriptor.is_unique => {
					self.current = CurrentRef::set(node.id, idx);
					Ok(false)
				}
				Ok(idx) | Err(idx) => {
					self.add_on_leaf(ctx, &mut node, idx, item).await?;
					Ok(true)
				}
			}
		} else {
			match search {
				Ok(idx) if self.descriptor.is_unique => {
					self.current = CurrentRef::set(node.id, idx);
					Ok(false)
				}
				Ok(idx) | Err(idx) => {
					let child = node.child_id(idx);
					if child.is_nil() {
						self.add_item_on_node_with_nil_child(ctx, &mut node, idx, item).await?;
						Ok(true)
					} else {
						self.add_recursive(ctx, child, item).await
					}
				}
			}
		}
	}

	/// §4.2.6 `add_item_on_node_with_nil_child`.
	async fn add_item_on_node_with_nil_child(
		&mut self,
		ctx: &OpContext,
		node: &mut Node<K, V>,
		index: usize,
		item: Item<K, V>,
	) -> Result<(), Error> {
		let mut child = Node::new_leaf(Identifier::new(), node.id, self.descriptor.slot_length);
		child.insert_slot_item(0, item.clone());
		self.save_node(ctx, &child, true).await?;
		node.set_child_id(index, child.id);
		self.save_node(ctx, node, false).await?;
		self.current = CurrentRef::set(child.id, 0);
		Ok(())
	}

	/// §4.2.3 `add_on_leaf`.
	async fn add_on_leaf(
		&mut self,
		ctx: &OpContext,
		node: &mut Node<K, V>,
		index: usize,
		item: Item<K, V>,
	) -> Result<(), Error> {
		let slot_length = self.descriptor.slot_length;
		if node.count < slot_length {
			node.insert_slot_item(index, item.clone());
			self.save_node(ctx, node, false).await?;
			self.current = CurrentRef::set(node.id, index);
			return Ok(());
		}

		// Leaf is full: stage the overflowed slots (`temp_slots`, length
		// slot_length + 1) with `item` inserted at `index`.
		let mut temp_slots: Vec<Item<K, V>> =
			node.slots[..node.count].iter().map(|s| s.clone().unwrap()).collect();
		temp_slots.insert(index, item);

		if node.is_root() {
			self.split_root_leaf(ctx, node, temp_slots).await?;
			return Ok(());
		}

		if self.descriptor.leaf_load_balancing {
			if let Some(outcome) = self.try_leaf_load_balance(ctx, node, &temp_slots).await? {
				return Ok(outcome);
			}
		}

		// All siblings full (or load balancing disabled / this level
		// unbalanced): split into `this` (left half) and a fresh right
		// sibling, promoting the median to the parent via a controller
		// action (§4.2.3 "Otherwise (all siblings full)").
		self.split_leaf_and_queue_promote(ctx, node, temp_slots).await
	}

	/// Splits an overflowed (`slot_length + 1`-item) staged vector into
	/// (left, median, right) halves.
	fn split_overflowed(&self, mut staged: Vec<Item<K, V>>) -> (Vec<Item<K, V>>, Item<K, V>, Vec<Item<K, V>>) {
		let mid = staged.len() / 2;
		let right = staged.split_off(mid + 1);
		let median = staged.pop().unwrap();
		(staged, median, right)
	}

	async fn split_root_leaf(
		&mut self,
		ctx: &OpContext,
		root: &mut Node<K, V>,
		staged: Vec<Item<K, V>>,
	) -> Result<(), Error> {
		let slot_length = self.descriptor.slot_length;
		let (left_items, median, right_items) = self.split_overflowed(staged);

		let mut left = Node::new_leaf(Identifier::new(), root.id, slot_length);
		for (i, it) in left_items.into_iter().enumerate() {
			left.insert_slot_item(i, it);
		}
		let mut right = Node::new_leaf(Identifier::new(), root.id, slot_length);
		for (i, it) in right_items.into_iter().enumerate() {
			right.insert_slot_item(i, it);
		}

		let mut children = vec![Identifier::NIL; slot_length + 1];
		children[0] = left.id;
		children[1] = right.id;
		root.children_ids = children;
		root.slots = vec![None; slot_length];
		root.count = 0;
		root.insert_slot_item(0, median);

		self.save_node(ctx, &left, true).await?;
		self.save_node(ctx, &right, true).await?;
		self.save_node(ctx, root, false).await?;
		self.current = CurrentRef::set(root.id, 0);
		debug!(root = %root.id, left = %left.id, right = %right.id, "split root leaf");
		Ok(())
	}

	/// Attempts the leaf-load-balancing redistribution (§4.2.3). Returns
	/// `Some(())` if the overflow was absorbed this way (nothing left to
	/// do); `None` if every sibling chain was full/unbalanced and the
	/// caller must fall through to a plain split.
	async fn try_leaf_load_balance(
		&mut self,
		ctx: &OpContext,
		node: &mut Node<K, V>,
		staged: &[Item<K, V>],
	) -> Result<Option<()>, Error> {
		let slot_length = self.descriptor.slot_length;
		let parent = self.get_node(ctx, node.parent_id).await?;
		let my_index = Self::index_in_parent(node, &parent)?;

		// Scan left for a sibling with a free slot, stopping (and flagging
		// "unbalanced") at the first internal sibling encountered.
		let mut unbalanced = false;
		let mut left_sibling_id = None;
		for i in (0..my_index).rev() {
			let sib_id = parent.child_id(i);
			if sib_id.is_nil() {
				break;
			}
			let sib = self.get_node(ctx, sib_id).await?;
			if !sib.is_leaf() {
				unbalanced = true;
				break;
			}
			if sib.count < slot_length {
				left_sibling_id = Some(sib.id);
			}
			break;
		}
		if let Some(sib_id) = left_sibling_id {
			// Keep the top `slot_length` staged items in `node` (dropping the
			// displaced leftmost), send the displaced leftmost left.
			let displaced = staged[0].clone();
			node.slots = vec![None; slot_length];
			node.count = 0;
			for (i, it) in staged[1..].iter().enumerate() {
				node.insert_slot_item(i, it.clone());
			}
			self.save_node(ctx, node, false).await?;
			self.current = CurrentRef::set(node.id, 0);
			trace!(node = %node.id, sibling = %sib_id, "leaf load balance: queued distribute to left sibling");
			self.distribute_action = Some(DistributeAction::Distribute {
				source: sib_id,
				item: displaced,
				to_left: true,
			});
			return Ok(Some(()));
		}

		let mut right_sibling = None;
		if !unbalanced {
			for i in (my_index + 1)..=parent.count {
				let sib_id = parent.child_id(i);
				if sib_id.is_nil() {
					break;
				}
				let sib = self.get_node(ctx, sib_id).await?;
				if !sib.is_leaf() {
					unbalanced = true;
					break;
				}
				if sib.count < slot_length {
					right_sibling = Some(sib.id);
				}
				break;
			}
		}
		if let Some(sib_id) = right_sibling {
			let displaced = staged[slot_length].clone();
			node.slots = vec![None; slot_length];
			node.count = 0;
			for (i, it) in staged[..slot_length].iter().enumerate() {
				node.insert_slot_item(i, it.clone());
			}
			self.save_node(ctx, node, false).await?;
			self.current = CurrentRef::set(node.id, slot_length - 1);
			trace!(node = %node.id, sibling = %sib_id, "leaf load balance: queued distribute to right sibling");
			self.distribute_action = Some(DistributeAction::Distribute {
				source: sib_id,
				item: displaced,
				to_left: false,
			});
			return Ok(Some(()));
		}

		if unbalanced {
			// Break this leaf into two fresh children; this node becomes a
			// sparse internal node with one slot (the median) and exactly
			// two real children (the rest of `children_ids` stays NIL).
			let (left_items, median, right_items) = self.split_overflowed(staged.to_vec());
			let mut left = Node::new_leaf(Identifier::new(), node.id, slot_length);
			for (i, it) in left_items.into_iter().enumerate() {
				left.insert_slot_item(i, it);
			}
			let mut right = Node::new_leaf(Identifier::new(), node.id, slot_length);
			for (i, it) in right_items.into_iter().enumerate() {
				right.insert_slot_item(i, it);
			}
			let mut children = vec![Identifier::NIL; slot_length + 1];
			children[0] = left.id;
			children[1] = right.id;
			node.children_ids = children;
			node.slots = vec![None; slot_length];
			node.count = 0;
			node.insert_slot_item(0, median);
			self.save_node(ctx, &left, true).await?;
			self.save_node(ctx, &right, true).await?;
			self.save_node(ctx, node, false).await?;
			self.current = CurrentRef::set(node.id, 0);
			debug!(node = %node.id, left = %left.id, right = %right.id, "unbalanced sibling chain, broke leaf into internal node");
			return Ok(Some(()));
		}

		Ok(None)
	}

	async fn split_leaf_and_queue_promote(
		&mut self,
		ctx: &OpContext,
		node: &mut Node<K, V>,
		staged: Vec<Item<K, V>>,
	) -> Result<(), Error> {
		let slot_length = self.descriptor.slot_length;
		let (left_items, median, right_items) = self.split_overflowed(staged);

		node.slots = vec![None; slot_length];
		node.count = 0;
		for (i, it) in left_items.into_iter().enumerate() {
			node.insert_slot_item(i, it);
		}
		let mut right = Node::new_leaf(Identifier::new(), node.parent_id, slot_length);
		for (i, it) in right_items.into_iter().enumerate() {
			right.insert_slot_item(i, it);
		}

		self.save_node(ctx, node, false).await?;
		self.save_node(ctx, &right, true).await?;
		self.current = CurrentRef::set(node.id, node.count.saturating_sub(1));

		let parent = self.get_node(ctx, node.parent_id).await?;
		let my_index = Self::index_in_parent(node, &parent)?;
		trace!(leaf = %node.id, right = %right.id, parent = %parent.id, index = my_index, "split full leaf, queued promote");
		self.promote_action = Some(PromoteAction::Promote {
			parent: parent.id,
			index: my_index,
			median,
			left_child: node.id,
			right_child: right.id,
		});
		Ok(())
	}

	// ---------------------------------------------------------------
	// §4.2.4 promote
	// ---------------------------------------------------------------

	/// Absorbs a staged split into its parent: inserts `median` at `index`
	/// and `right_child` at `index + 1` of `children_ids`. If the parent
	/// itself overflows, it is split the same way and another `Promote`
	/// action is queued for its own parent (possibly creating a new root),
	/// draining iteratively rather than recursing (§9 "Controller loop").
	async fn promote(
		&mut self,
		ctx: &OpContext,
		parent_id: Identifier,
		index: usize,
		median: Item<K, V>,
		left_child: Identifier,
		right_child: Identifier,
	) -> Result<(), Error> {
		let slot_length = self.descriptor.slot_length;
		let mut parent = self.get_node(ctx, parent_id).await?;
		debug_assert_eq!(parent.child_id(index), left_child);

		if parent.count < slot_length {
			parent.insert_slot_item(index, median);
			parent.insert_child_id(index + 1, right_child);
			self.save_node(ctx, &parent, false).await?;
			self.reparent(ctx, right_child, parent.id).await?;
			trace!(parent = %parent.id, index, "promoted median into parent");
			return Ok(());
		}

		// Parent is full: stage its overflowed slots and children with the
		// new entries inserted, then split (§4.2.4 "If the parent is also
		// full").
		let mut temp_slots: Vec<Item<K, V>> =
			parent.slots[..parent.count].iter().map(|s| s.clone().unwrap()).collect();
		temp_slots.insert(index, median);
		let mut temp_children = parent.children_ids.clone();
		temp_children.insert(index + 1, right_child);

		let (left_items, promoted_median, right_items) = self.split_overflowed(temp_slots);
		let mid = left_items.len() + 1;
		let right_children: Vec<Identifier> = temp_children.split_off(mid);
		let left_children = temp_children;

		if parent.is_root() {
			let mut new_left = Node::new_internal(Identifier::new(), parent.id, slot_length, {
				let mut c = left_children.clone();
				c.resize(slot_length + 1, Identifier::NIL);
				c
			});
			for (i, it) in left_items.into_iter().enumerate() {
				new_left.insert_slot_item(i, it);
			}
			let mut new_right = Node::new_internal(Identifier::new(), parent.id, slot_length, {
				let mut c = right_children.clone();
				c.resize(slot_length + 1, Identifier::NIL);
				c
			});
			for (i, it) in right_items.into_iter().enumerate() {
				new_right.insert_slot_item(i, it);
			}

			parent.children_ids = vec![Identifier::NIL; slot_length + 1];
			parent.children_ids[0] = new_left.id;
			parent.children_ids[1] = new_right.id;
			parent.slots = vec![None; slot_length];
			parent.count = 0;
			parent.insert_slot_item(0, promoted_median);

			self.save_node(ctx, &new_left, true).await?;
			self.save_node(ctx, &new_right, true).await?;
			self.save_node(ctx, &parent, false).await?;
			self.reparent_all(ctx, &left_children, new_left.id).await?;
			self.reparent_all(ctx, &right_children, new_right.id).await?;
			debug!(root = %parent.id, left = %new_left.id, right = %new_right.id, "split full root internal node");
			return Ok(());
		}

		let mut left_node_children = left_children;
		left_node_children.resize(slot_length + 1, Identifier::NIL);
		parent.children_ids = left_node_children.clone();
		parent.slots = vec![None; slot_length];
		parent.count = 0;
		for (i, it) in left_items.into_iter().enumerate() {
			parent.insert_slot_item(i, it);
		}

		let mut right_children_full = right_children.clone();
		right_children_full.resize(slot_length + 1, Identifier::NIL);
		let mut right_node = Node::new_internal(Identifier::new(), parent.parent_id, slot_length, right_children_full);
		for (i, it) in right_items.into_iter().enumerate() {
			right_node.insert_slot_item(i, it);
		}

		self.save_node(ctx, &parent, false).await?;
		self.save_node(ctx, &right_node, true).await?;
		self.reparent_all(ctx, &left_node_children, parent.id).await?;
		self.reparent_all(ctx, &right_children, right_node.id).await?;

		let grandparent = self.get_node(ctx, parent.parent_id).await?;
		let my_index = Self::index_in_parent(&parent, &grandparent)?;
		trace!(node = %parent.id, right = %right_node.id, grandparent = %grandparent.id, index = my_index, "split full internal node, queued promote");
		self.promote_action = Some(PromoteAction::Promote {
			parent: grandparent.id,
			index: my_index,
			median: promoted_median,
			left_child: parent.id,
			right_child: right_node.id,
		});
		Ok(())
	}

	async fn reparent(&mut self, ctx: &OpContext, child_id: Identifier, new_parent_id: Identifier) -> Result<(), Error> {
		if child_id.is_nil() {
			return Ok(());
		}
		let mut child = self.get_node(ctx, child_id).await?;
		if child.parent_id != new_parent_id {
			child.parent_id = new_parent_id;
			child.invalidate_index_cache();
			self.save_node(ctx, &child, false).await?;
		}
		Ok(())
	}

	async fn reparent_all(&mut self, ctx: &OpContext, children: &[Identifier], new_parent_id: Identifier) -> Result<(), Error> {
		for &c in children {
			self.reparent(ctx, c, new_parent_id).await?;
		}
		Ok(())
	}

	// ---------------------------------------------------------------
	// §4.2.3 distribute_to_left / distribute_to_right
	// ---------------------------------------------------------------

	/// Inserts `item` as the new last item of `sibling_id`, a left sibling
	/// receiving an item from its right (§4.2.3 load-balancing
	/// redistribution). If the sibling is itself full, the rotation
	/// continues through the parent separator instead of stopping (§4.2.5).
	async fn distribute_to_left(&mut self, ctx: &OpContext, sibling_id: Identifier, item: Item<K, V>) -> Result<(), Error> {
		let mut sibling = self.get_node(ctx, sibling_id).await?;

		if sibling.count < sibling.slot_length() {
			let at = sibling.count;
			sibling.insert_slot_item(at, item);
			self.save_node(ctx, &sibling, false).await?;
			trace!(sibling = %sibling_id, "distributed item to left sibling");
			return Ok(());
		}

		// Full: evict the sibling's own leftmost item up into the parent
		// separator to its left, shift the sibling's remaining slots to
		// make room, and place `item` at the freed last slot. The evicted
		// prior separator keeps traveling left as the next distribute.
		let mut parent = self.get_node(ctx, sibling.parent_id).await?;
		let my_index = Self::index_in_parent(&sibling, &parent)?;
		debug_assert!(my_index > 0, "left rotation reached the leftmost child with nowhere further to go");
		let next_sibling_id = parent.child_id(my_index - 1);

		let evicted = sibling.remove_slot_item(0);
		sibling.insert_slot_item(sibling.count, item);
		let prior_separator = std::mem::replace(parent.item_mut(my_index - 1).expect("separator slot occupied"), evicted);

		self.save_node(ctx, &sibling, false).await?;
		self.save_node(ctx, &parent, false).await?;
		trace!(sibling = %sibling_id, next = %next_sibling_id, "left sibling full, continuing rotation through parent separator");
		self.distribute_action = Some(DistributeAction::Distribute {
			source: next_sibling_id,
			item: prior_separator,
			to_left: true,
		});
		Ok(())
	}

	/// Inserts `item` as the new first item of `sibling_id`, a right sibling
	/// receiving an item from its left. Mirrors `distribute_to_left`'s
	/// full-sibling rotation continuation.
	async fn distribute_to_right(&mut self, ctx: &OpContext, sibling_id: Identifier, item: Item<K, V>) -> Result<(), Error> {
		let mut sibling = self.get_node(ctx, sibling_id).await?;

		if sibling.count < sibling.slot_length() {
			sibling.insert_slot_item(0, item);
			self.save_node(ctx, &sibling, false).await?;
			trace!(sibling = %sibling_id, "distributed item to right sibling");
			return Ok(());
		}

		let mut parent = self.get_node(ctx, sibling.parent_id).await?;
		let my_index = Self::index_in_parent(&sibling, &parent)?;
		debug_assert!(my_index < parent.count, "right rotation reached the rightmost child with nowhere further to go");
		let next_sibling_id = parent.child_id(my_index + 1);

		let evicted = sibling.remove_slot_item(sibling.count - 1);
		sibling.insert_slot_item(0, item);
		let prior_separator = std::mem::replace(parent.item_mut(my_index).expect("separator slot occupied"), evicted);

		self.save_node(ctx, &sibling, false).await?;
		self.save_node(ctx, &parent, false).await?;
		trace!(sibling = %sibling_id, next = %next_sibling_id, "right sibling full, continuing rotation through parent separator");
		self.distribute_action = Some(DistributeAction::Distribute {
			source: next_sibling_id,
			item: prior_separator,
			to_left: false,
		});
		Ok(())
	}

	// ---------------------------------------------------------------
	// Controller loop (§4.3, §9)
	// ---------------------------------------------------------------

	async fn drain_controller(&mut self, ctx: &OpContext) -> Result<(), Error> {
		loop {
			if let Some(action) = self.promote_action.take() {
				let PromoteAction::Promote { parent, index, median, left_child, right_child } = action;
				self.promote(ctx, parent, index, median, left_child, right_child).await?;
				continue;
			}
			if let Some(action) = self.distribute_action.take() {
				match action {
					DistributeAction::Distribute { source, item, to_left: true } => {
						self.distribute_to_left(ctx, source, item).await?;
					}
					DistributeAction::Distribute { source, item, to_left: false } => {
						self.distribute_to_right(ctx, source, item).await?;
					}
				}
				continue;
			}
			break;
		}
		Ok(())
	}

	// ---------------------------------------------------------------
	// §4.2.5 / §4.2.6 removal
	// ---------------------------------------------------------------

	/// Removes the item currently selected by the cursor (§4.3 `remove`
	/// dispatches here after locating the key).
	pub async fn remove_current_item(&mut self, ctx: &OpContext) -> Result<Option<Item<K, V>>, Error> {
		self.assert_controller_clear();
		if !self.current.is_set() {
			return Ok(None);
		}
		let node_id = self.current.node_id;
		let idx = self.current.slot_index as usize;
		let node = self.get_node(ctx, node_id).await?;

		let removed = if node.is_leaf() {
			let item = node.item(idx).cloned().expect("cursor slot occupied");
			self.fix_vacated_slot(ctx, node_id, idx).await?;
			item
		} else {
			let left_child = node.child_id(idx);
			let right_child = node.child_id(idx + 1);
			if left_child.is_nil() || right_child.is_nil() {
				self.remove_item_on_node_with_nil_child(ctx, node, idx, left_child.is_nil()).await?
			} else {
				// §4.2.11: promote the next in-order item (the successor,
				// leftmost of the right child's subtree) into this slot,
				// then remove it from the leaf it came from.
				let (succ_node_id, succ_slot) = self.leftmost_in_subtree(ctx, right_child).await?;
				let succ_node = self.get_node(ctx, succ_node_id).await?;
				let successor = succ_node.item(succ_slot).cloned().expect("leftmost slot occupied");
				let mut node = node;
				let removed_item = std::mem::replace(node.item_mut(idx).expect("slot occupied"), successor);
				self.save_node(ctx, &node, false).await?;
				self.fix_vacated_slot(ctx, succ_node_id, succ_slot).await?;
				removed_item
			}
		};

		self.clear_cursor();
		self.descriptor.count = self.descriptor.count.saturating_sub(1);
		self.tracker.remove(ctx, &removed).await?;
		self.assert_controller_clear();
		Ok(Some(removed))
	}

	/// §4.2.6 `remove_item_on_node_with_nil_child`: the slot at `idx` has no
	/// subtree on one side to draw a replacement from (`left_is_nil` says
	/// which), so the hole is compacted in place at this node: the slot and
	/// the adjacent `NIL` child entry are both dropped and the remainder
	/// shifts over them.
	async fn remove_item_on_node_with_nil_child(
		&mut self,
		ctx: &OpContext,
		mut node: Node<K, V>,
		idx: usize,
		left_is_nil: bool,
	) -> Result<Item<K, V>, Error> {
		let nil_child_position = if left_is_nil { idx } else { idx + 1 };
		let item = node.remove_slot_item(idx);
		node.remove_child_id(nil_child_position);
		self.save_node(ctx, &node, false).await?;
		Ok(item)
	}

	/// Descends the leftmost non-NIL child chain to find the in-order
	/// successor of an internal slot (§4.2.11): the leftmost item of the
	/// slot's right child subtree.
	async fn leftmost_in_subtree(&self, ctx: &OpContext, mut node_id: Identifier) -> Result<(Identifier, usize), Error> {
		loop {
			let node = self.get_node(ctx, node_id).await?;
			if node.is_leaf() {
				return Ok((node.id, 0));
			}
			let first_child = node.child_id(0);
			if first_child.is_nil() {
				return Ok((node.id, 0));
			}
			node_id = first_child;
		}
	}

	/// Removes the item at `idx` of `node_id` and restores invariants
	/// (§4.2.10). Shifts the remaining slots left; if that empties the node
	/// and it is the root, it is kept empty in place (§9 "Root deletion
	/// corner case"); otherwise the now-empty node is spliced out of the
	/// tree via single-child promotion or a plain unlink, so invariant 7
	/// ("an empty non-root leaf is unlinked") holds for every caller, not
	/// just leaves.
	async fn fix_vacated_slot(&mut self, ctx: &OpContext, node_id: Identifier, idx: usize) -> Result<(), Error> {
		let mut node = self.get_node(ctx, node_id).await?;
		node.remove_slot_item(idx);

		if node.count > 0 {
			self.save_node(ctx, &node, false).await?;
			return Ok(());
		}

		if node.is_root() {
			self.save_node(ctx, &node, false).await?;
			self.clear_cursor();
			return Ok(());
		}

		if self.unlink_node_with_nil_child(ctx, &mut node).await? {
			return Ok(());
		}
		self.unlink(ctx, &mut node).await?;
		Ok(())
	}

	/// Handles an emptied, non-root node (§4.2.10): if it has exactly one
	/// remaining real child, that child is spliced directly into the
	/// parent's place for this node rather than leaving a pointless
	/// childless hop. Returns `false` (no-op) for leaves and for internal
	/// nodes with zero or more than one real child, leaving plain `unlink`
	/// to handle those.
	async fn unlink_node_with_nil_child(&mut self, ctx: &OpContext, node: &mut Node<K, V>) -> Result<bool, Error> {
		debug_assert_eq!(node.count, 0);
		if node.is_leaf() {
			return Ok(false);
		}
		let mut real_children = node.children_ids.iter().copied().filter(|c| !c.is_nil());
		let only_child = match (real_children.next(), real_children.next()) {
			(Some(child), None) => child,
			_ => return Ok(false),
		};
		self.promote_single_child_as_parent_child(ctx, node, only_child).await?;
		Ok(true)
	}

	/// Splices `node` out of the tree, replacing it in its parent's
	/// `children_ids` with its sole remaining real child (§4.2.10
	/// `promote_single_child_as_parent_child`).
	async fn promote_single_child_as_parent_child(
		&mut self,
		ctx: &OpContext,
		node: &mut Node<K, V>,
		only_child: Identifier,
	) -> Result<(), Error> {
		let mut parent = self.get_node(ctx, node.parent_id).await?;
		let my_index = Self::index_in_parent(node, &parent)?;
		parent.set_child_id(my_index, only_child);
		self.save_node(ctx, &parent, false).await?;
		self.reparent(ctx, only_child, parent.id).await?;
		self.repository.remove(ctx, node.id).await?;
		debug!(node = %node.id, child = %only_child, parent = %parent.id, "collapsed single-child node, promoted child into parent");
		Ok(())
	}

	/// Unlinks an emptied, childless (or fully-NIL-children) node from its
	/// parent and removes it from the repository (§4.2.10 `unlink`). If the
	/// parent's children are now all `NIL`, the parent collapses to a leaf.
	async fn unlink(&mut self, ctx: &OpContext, node: &mut Node<K, V>) -> Result<(), Error> {
		let mut parent = self.get_node(ctx, node.parent_id).await?;
		let my_index = Self::index_in_parent(node, &parent)?;
		parent.set_child_id(my_index, Identifier::NIL);
		if parent.children_ids.iter().all(|c| c.is_nil()) {
			parent.children_ids.clear();
		}
		self.save_node(ctx, &parent, false).await?;
		self.repository.remove(ctx, node.id).await?;
		debug!(node = %node.id, parent = %parent.id, "unlinked emptied node from parent");
		Ok(())
	}

	pub async fn remove(&mut self, ctx: &OpContext, key: &K) -> Result<bool, Error> {
		if !self.find(ctx, key, false).await? {
			return Ok(false);
		}
		Ok(self.remove_current_item(ctx).await?.is_some())
	}

	// ---------------------------------------------------------------
	// §4.2 update operations
	// ---------------------------------------------------------------

	pub async fn update_current_value(&mut self, ctx: &OpContext, value: V) -> Result<(), Error> {
		if !self.current.is_set() {
			return Err(Error::NoCurrentSelection);
		}
		let mut node = self.get_node(ctx, self.current.node_id).await?;
		let idx = self.current.slot_index as usize;
		let item = node.item_mut(idx).ok_or(Error::NoCurrentSelection)?;
		item.value = Some(value);
		item.value_needs_fetch = false;
		item.value_was_fetched = true;
		item.version += 1;
		let updated = node.item(idx).cloned().unwrap();
		self.save_node(ctx, &node, false).await?;
		self.tracker.update(ctx, &updated).await?;
		Ok(())
	}

	/// Attempts to change the current item's key in place. Rejected (as a
	/// `false` boolean, no error — §7 kind 4 "Semantic rejection") whenever
	/// the new key would violate ordering relative to neighboring slots.
	pub async fn update_current_key(&mut self, ctx: &OpContext, new_key: K) -> Result<bool, Error> {
		if !self.current.is_set() {
			return Err(Error::NoCurrentSelection);
		}
		let node_id = self.current.node_id;
		let idx = self.current.slot_index as usize;
		let node = self.get_node(ctx, node_id).await?;
		if idx > 0 {
			let prev = &node.item(idx - 1).unwrap().key;
			if self.comparator.compare(prev, &new_key) != std::cmp::Ordering::Less {
				return Ok(false);
			}
		}
		if idx + 1 < node.count {
			let next = &node.item(idx + 1).unwrap().key;
			if self.comparator.compare(&new_key, next) != std::cmp::Ordering::Less {
				return Ok(false);
			}
		}
		let mut node = node;
		let item = node.item_mut(idx).unwrap();
		item.key = new_key;
		item.version += 1;
		let updated = node.item(idx).cloned().unwrap();
		self.save_node(ctx, &node, false).await?;
		self.tracker.update(ctx, &updated).await?;
		Ok(true)
	}

	/// Combines `update_current_key` and `update_current_value`: rejected (as
	/// `false`, no error) under the same ordering rule as `update_current_key`
	/// if `new_key` doesn't compare validly, in which case the value is left
	/// untouched.
	pub async fn update_current_item(&mut self, ctx: &OpContext, new_key: K, value: V) -> Result<bool, Error> {
		if !self.update_current_key(ctx, new_key).await? {
			return Ok(false);
		}
		self.update_current_value(ctx, value).await?;
		Ok(true)
	}

	/// Locates `old_key` and attempts `update_current_key(new_key)` on it.
	pub async fn update_key(&mut self, ctx: &OpContext, old_key: &K, new_key: K) -> Result<bool, Error> {
		if !self.find(ctx, old_key, false).await? {
			return Ok(false);
		}
		self.update_current_key(ctx, new_key).await
	}
}
