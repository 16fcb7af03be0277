use crate::comparator::KeyComparator;
use crate::id::Identifier;
use crate::item::Item;
use std::cmp::Ordering;

/// A fixed-capacity slot array connected to parent/children by identifier
/// (§3 "Node").
///
/// `slots` always has length `slot_length`; `children_ids` is either empty
/// (a leaf) or has length `slot_length + 1` (internal, possibly with `NIL`
/// holes — §4.2.6 "Nil-child helpers"). Nodes never hold pointers to other
/// nodes: every cross-reference is an [`Identifier`] resolved through the
/// `NodeRepository`, per §9 "Graph with back-references".
#[derive(Debug, Clone)]
pub struct Node<K, V> {
	pub id: Identifier,
	pub parent_id: Identifier,
	pub slots: Vec<Option<Item<K, V>>>,
	pub count: usize,
	pub children_ids: Vec<Identifier>,
	pub version: u32,
	/// Cache of this node's position in its parent's `children_ids`.
	/// Invalidated by checking the cached slot still points back at `id`
	/// (§3 "Node": "invalidated by checking equality") rather than by any
	/// proactive bookkeeping when siblings shift.
	pub index_of_node: Option<usize>,
}

impl<K, V> Node<K, V> {
	pub fn new_leaf(id: Identifier, parent_id: Identifier, slot_length: usize) -> Self {
		Self {
			id,
			parent_id,
			slots: vec![None; slot_length],
			count: 0,
			children_ids: Vec::new(),
			version: 0,
			index_of_node: None,
		}
	}

	pub fn new_internal(
		id: Identifier,
		parent_id: Identifier,
		slot_length: usize,
		children_ids: Vec<Identifier>,
	) -> Self {
		debug_assert_eq!(children_ids.len(), slot_length + 1);
		Self {
			id,
			parent_id,
			slots: vec![None; slot_length],
			count: 0,
			children_ids,
			version: 0,
			index_of_node: None,
		}
	}

	pub fn slot_length(&self) -> usize {
		self.slots.len()
	}

	pub fn is_leaf(&self) -> bool {
		self.children_ids.is_empty()
	}

	pub fn is_full(&self) -> bool {
		self.count == self.slot_length()
	}

	pub fn is_root(&self) -> bool {
		self.parent_id.is_nil()
	}

	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	pub fn child_id(&self, index: usize) -> Identifier {
		self.children_ids.get(index).copied().unwrap_or(Identifier::NIL)
	}

	pub fn set_child_id(&mut self, index: usize, id: Identifier) {
		self.children_ids[index] = id;
	}

	pub fn has_any_nil_child(&self) -> bool {
		!self.is_leaf() && self.children_ids[..=self.count].iter().any(|c| c.is_nil())
	}

	/// Invalidates (clears) the position cache. Call whenever this node's
	/// index within its parent may have shifted (a sibling split/merge).
	pub fn invalidate_index_cache(&mut self) {
		self.index_of_node = None;
	}

	/// Shifts slots `[position..count)` one step right, writes `item` at
	/// `position`, increments `count` (§4.2.1 `insert_slot_item`).
	///
	/// Precondition: `count < slot_length`.
	pub fn insert_slot_item(&mut self, position: usize, item: Item<K, V>) {
		debug_assert!(self.count < self.slot_length());
		debug_assert!(position <= self.count);
		self.slots[position..=self.count].rotate_right(1);
		self.slots[position] = Some(item);
		self.count += 1;
	}

	/// Removes and returns the item at `position`, shifting the remainder of
	/// the occupied range left over the hole, decrementing `count`.
	pub fn remove_slot_item(&mut self, position: usize) -> Item<K, V> {
		debug_assert!(position < self.count);
		self.slots[position..self.count].rotate_left(1);
		let item = self.slots[self.count - 1].take().expect("slot within count must be occupied");
		self.count -= 1;
		item
	}

	/// Inserts `child_id` at `position` in `children_ids`, shifting the rest
	/// right. Used alongside a slot insertion at an internal node (§4.2.4
	/// `promote`).
	pub fn insert_child_id(&mut self, position: usize, child_id: Identifier) {
		self.children_ids.insert(position, child_id);
		self.children_ids.truncate(self.slot_length() + 1);
	}

	pub fn remove_child_id(&mut self, position: usize) -> Identifier {
		let id = self.children_ids.remove(position);
		self.children_ids.push(Identifier::NIL);
		id
	}

	/// Binary search over the occupied prefix `[0, count)` for `key`, using
	/// lower-bound semantics: the returned index is always the leftmost
	/// slot comparing `>= key`. `Ok(index)` means that slot compares equal
	/// (the *leftmost* duplicate, matching §4.2.7's leftmost-biased descent);
	/// `Err(index)` is the insertion point that keeps the slots ordered, and
	/// doubles as the nearest-neighbor-not-less-than-key position (§4.2.7).
	pub fn binary_search<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Result<usize, usize> {
		let count = self.count;
		let idx = self.slots[..count].partition_point(|slot| {
			let slot_key = &slot.as_ref().expect("occupied prefix must have no holes").key;
			cmp.compare(slot_key, key) == Ordering::Less
		});
		if idx < count {
			let slot_key = &self.slots[idx].as_ref().unwrap().key;
			if cmp.compare(slot_key, key) == Ordering::Equal {
				return Ok(idx);
			}
		}
		Err(idx)
	}

	/// Mirror of [`binary_search`](Self::binary_search) using `>` instead of
	/// `>=`, landing on the rightmost equal key (§4.2.8
	/// `find_in_descending_order`).
	pub fn binary_search_descending<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Result<usize, usize> {
		// `partition_point` finds the first index where the predicate is
		// false; used here to land on the *last* slot comparing equal.
		let count = self.count;
		let idx = self.slots[..count].partition_point(|slot| {
			let slot_key = &slot.as_ref().expect("occupied prefix must have no holes").key;
			cmp.compare(slot_key, key) != Ordering::Greater
		});
		if idx > 0 {
			let slot_key = &self.slots[idx - 1].as_ref().unwrap().key;
			if cmp.compare(slot_key, key) == Ordering::Equal {
				return Ok(idx - 1);
			}
		}
		Err(idx)
	}

	pub fn item(&self, index: usize) -> Option<&Item<K, V>> {
		self.slots.get(index).and_then(|s| s.as_ref())
	}

	pub fn item_mut(&mut self, index: usize) -> Option<&mut Item<K, V>> {
		self.slots.get_mut(index).and_then(|s| s.as_mut())
	}
}
