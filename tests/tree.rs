mod support;

use std::sync::Arc;

use btree_index::{Cursor, Identifier, Item, NaturalOrder, OpContext, StoreDescriptor, Tree};
use support::{MemoryRepository, RecordingTracker};
use tokio::sync::Mutex;

type TestTree = Tree<i32, String, MemoryRepository<i32, String>, RecordingTracker<i32, String>, NaturalOrder<i32>>;

fn new_tree(slot_length: usize, unique: bool) -> TestTree {
	let descriptor = StoreDescriptor::builder().slot_length(slot_length).unique(unique).build().unwrap();
	Tree::new(descriptor, MemoryRepository::new(), RecordingTracker::new(), NaturalOrder::new())
}

async fn collect_forward(tree: &mut TestTree, ctx: &OpContext) -> Vec<i32> {
	let mut out = Vec::new();
	if !tree.first(ctx).await.unwrap() {
		return out;
	}
	loop {
		out.push(tree.get_current_key(ctx).await.unwrap());
		if !tree.next(ctx).await.unwrap() {
			break;
		}
	}
	out
}

// Scenario 1: ascending inserts split the root into an internal node; full
// in-order traversal recovers the sorted sequence.
#[tokio::test]
async fn inserting_ascending_keys_splits_root_and_preserves_order() {
	let ctx = OpContext::background();
	let mut tree = new_tree(4, true);
	for key in [10, 20, 30, 40, 50, 60] {
		assert!(tree.add(&ctx, key, key.to_string()).await.unwrap());
	}
	assert_eq!(tree.count(), 6);
	assert_eq!(collect_forward(&mut tree, &ctx).await, vec![10, 20, 30, 40, 50, 60]);
}

// Scenario 2: a unique store rejects a duplicate key and leaves the cursor
// on the pre-existing item rather than mutating the tree.
#[tokio::test]
async fn add_item_rejects_duplicate_on_unique_store() {
	let ctx = OpContext::background();
	let mut tree = new_tree(4, true);
	assert!(tree.add(&ctx, 7, "first".to_string()).await.unwrap());

	let duplicate = Item::new(7, "second".to_string());
	let inserted = tree.add_item(&ctx, duplicate).await.unwrap();
	assert!(!inserted);
	assert_eq!(tree.count(), 1);
	assert_eq!(tree.get_current_key(&ctx).await.unwrap(), 7);
	assert_eq!(tree.get_current_value(&ctx).await.unwrap(), Some("first".to_string()));
}

// Scenario 4: a miss on `find` positions the cursor at the nearest key not
// less than the probe.
#[tokio::test]
async fn find_miss_positions_on_nearest_neighbor() {
	let ctx = OpContext::background();
	let mut tree = new_tree(4, true);
	for key in [10, 20, 30, 40, 50, 60] {
		tree.add(&ctx, key, key.to_string()).await.unwrap();
	}
	assert!(!tree.find(&ctx, &5, true).await.unwrap());
	assert_eq!(tree.get_current_key(&ctx).await.unwrap(), 10);
}

// Scenario 6: value updates are tracked and visible through a fresh find.
#[tokio::test]
async fn update_current_value_is_observed_by_tracker_and_subsequent_find() {
	let ctx = OpContext::background();
	let mut tree = new_tree(4, true);
	assert!(tree.add(&ctx, 1, "initial".to_string()).await.unwrap());
	tree.update_current_value(&ctx, "updated_once".to_string()).await.unwrap();
	tree.update_current_value(&ctx, "updated".to_string()).await.unwrap();

	assert!(tree.find(&ctx, &1, false).await.unwrap());
	assert_eq!(tree.get_current_value(&ctx).await.unwrap(), Some("updated".to_string()));

	assert_eq!(tree.tracker().added.lock().unwrap().len(), 1);
	assert_eq!(tree.tracker().updated.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn remove_then_readd_preserves_count() {
	let ctx = OpContext::background();
	let mut tree = new_tree(4, true);
	for key in [1, 2, 3, 4, 5] {
		tree.add(&ctx, key, key.to_string()).await.unwrap();
	}
	assert!(tree.remove(&ctx, &3).await.unwrap());
	assert_eq!(tree.count(), 4);
	assert!(!tree.find(&ctx, &3, false).await.unwrap());

	assert!(tree.add(&ctx, 3, "3-again".to_string()).await.unwrap());
	assert_eq!(tree.count(), 5);
	assert_eq!(collect_forward(&mut tree, &ctx).await, vec![1, 2, 3, 4, 5]);
}

// Regression: removing the only item of a leaf must unlink that leaf
// (invariant 7) rather than leaving an emptied, still-linked node behind —
// otherwise `first()`/traversal descend into it and see an empty tree even
// though other keys remain.
#[tokio::test]
async fn removing_a_leafs_last_item_unlinks_it_and_leaves_traversal_intact() {
	let ctx = OpContext::background();
	let mut tree = new_tree(2, true);
	tree.add(&ctx, 1, "1".to_string()).await.unwrap();
	tree.add(&ctx, 2, "2".to_string()).await.unwrap();
	tree.add(&ctx, 3, "3".to_string()).await.unwrap();

	assert!(tree.remove(&ctx, &1).await.unwrap());
	assert_eq!(tree.count(), 2);
	assert!(!tree.is_empty());
	assert!(tree.first(&ctx).await.unwrap());
	assert_eq!(collect_forward(&mut tree, &ctx).await, vec![2, 3]);
}

#[tokio::test]
async fn remove_on_internal_slot_promotes_in_order_successor() {
	let ctx = OpContext::background();
	let mut tree = new_tree(2, true);
	for key in [1, 2, 3, 4, 5, 6, 7] {
		tree.add(&ctx, key, key.to_string()).await.unwrap();
	}
	let before = collect_forward(&mut tree, &ctx).await;
	assert_eq!(before.len(), 7);

	assert!(tree.remove(&ctx, &4).await.unwrap());
	assert_eq!(tree.count(), 6);
	assert_eq!(collect_forward(&mut tree, &ctx).await, vec![1, 2, 3, 5, 6, 7]);
	assert!(!tree.find(&ctx, &4, false).await.unwrap());
}

#[tokio::test]
async fn backward_traversal_matches_forward_traversal_reversed() {
	let ctx = OpContext::background();
	let mut tree = new_tree(3, true);
	for key in [5, 1, 9, 3, 7, 2, 8, 4, 6] {
		tree.add(&ctx, key, key.to_string()).await.unwrap();
	}
	let forward = collect_forward(&mut tree, &ctx).await;

	let mut backward = Vec::new();
	assert!(tree.last(&ctx).await.unwrap());
	loop {
		backward.push(tree.get_current_key(&ctx).await.unwrap());
		if !tree.previous(&ctx).await.unwrap() {
			break;
		}
	}
	backward.reverse();
	assert_eq!(forward, backward);
	assert_eq!(forward.len(), 9);
}

// Scenario 3, adapted to string values: duplicate keys on a non-unique
// store are visited from right to left starting at the rightmost match.
#[tokio::test]
async fn descending_find_and_previous_walk_duplicates_in_reverse_insertion_order() {
	let ctx = OpContext::background();
	let descriptor = StoreDescriptor::builder().slot_length(4).unique(false).build().unwrap();
	let mut tree: Tree<String, String, MemoryRepository<String, String>, RecordingTracker<String, String>, NaturalOrder<String>> =
		Tree::new(descriptor, MemoryRepository::new(), RecordingTracker::new(), NaturalOrder::new());

	for (key, value) in [("A", "val1"), ("A", "val2"), ("A", "val3"), ("B", "val4"), ("C", "val5")] {
		tree.add(&ctx, key.to_string(), value.to_string()).await.unwrap();
	}

	assert!(tree.find_in_descending_order(&ctx, &"A".to_string()).await.unwrap());
	assert_eq!(tree.get_current_value(&ctx).await.unwrap(), Some("val1".to_string()));
	assert!(tree.previous(&ctx).await.unwrap());
	assert_eq!(tree.get_current_value(&ctx).await.unwrap(), Some("val2".to_string()));
	assert!(tree.previous(&ctx).await.unwrap());
	assert_eq!(tree.get_current_value(&ctx).await.unwrap(), Some("val3".to_string()));
	assert!(!tree.previous(&ctx).await.unwrap());
}

#[tokio::test]
async fn update_current_key_rejects_reordering_key() {
	let ctx = OpContext::background();
	let mut tree = new_tree(4, true);
	for key in [10, 20, 30] {
		tree.add(&ctx, key, key.to_string()).await.unwrap();
	}
	assert!(tree.find(&ctx, &20, false).await.unwrap());
	assert!(!tree.update_current_key(&ctx, 30).await.unwrap());
	assert_eq!(tree.get_current_key(&ctx).await.unwrap(), 20);
}

#[tokio::test]
async fn upsert_inserts_then_updates_in_place() {
	let ctx = OpContext::background();
	let mut tree = new_tree(4, true);
	tree.upsert(&ctx, 1, "first".to_string()).await.unwrap();
	assert_eq!(tree.count(), 1);
	tree.upsert(&ctx, 1, "second".to_string()).await.unwrap();
	assert_eq!(tree.count(), 1);
	assert!(tree.find(&ctx, &1, false).await.unwrap());
	assert_eq!(tree.get_current_value(&ctx).await.unwrap(), Some("second".to_string()));
}

// Two independent cursors over one shared tree do not interfere with each
// other's position (§4.4).
#[tokio::test]
async fn independent_cursors_over_shared_tree_do_not_interfere() {
	let ctx = OpContext::background();
	let mut tree = new_tree(4, true);
	for key in [1, 2, 3, 4, 5] {
		tree.add(&ctx, key, key.to_string()).await.unwrap();
	}
	let shared = Arc::new(Mutex::new(tree));

	let mut cursor_a = Cursor::new(shared.clone());
	let mut cursor_b = Cursor::new(shared.clone());

	assert!(cursor_a.first(&ctx).await.unwrap());
	assert!(cursor_b.first(&ctx).await.unwrap());
	assert!(cursor_b.next(&ctx).await.unwrap());

	assert_eq!(cursor_a.get_current_key(&ctx).await.unwrap(), 1);
	assert_eq!(cursor_b.get_current_key(&ctx).await.unwrap(), 2);

	assert!(cursor_a.next(&ctx).await.unwrap());
	assert_eq!(cursor_a.get_current_key(&ctx).await.unwrap(), 2);
	assert_eq!(cursor_b.get_current_key(&ctx).await.unwrap(), 2);
}

// Property: ascending insert followed by a full forward scan always yields
// the sorted key sequence, for a handful of random-ish orders and slot
// lengths small enough to force repeated splits.
#[tokio::test]
async fn ordering_holds_under_varied_insertion_orders_and_slot_lengths() {
	let ctx = OpContext::background();
	let orders: [&[i32]; 3] =
		[&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10], &[10, 9, 8, 7, 6, 5, 4, 3, 2, 1], &[5, 1, 9, 2, 8, 3, 7, 4, 6, 10]];
	for slot_length in [2usize, 3, 4] {
		for order in &orders {
			let mut tree = new_tree(slot_length, true);
			for &key in *order {
				tree.add(&ctx, key, key.to_string()).await.unwrap();
			}
			let mut expected: Vec<i32> = order.to_vec();
			expected.sort_unstable();
			assert_eq!(collect_forward(&mut tree, &ctx).await, expected);
			assert_eq!(tree.count(), expected.len() as u64);
		}
	}
}

#[tokio::test]
async fn empty_tree_reports_is_empty_and_no_traversal() {
	let ctx = OpContext::background();
	let mut tree = new_tree(4, true);
	assert!(tree.is_empty());
	assert_eq!(tree.count(), 0);
	assert!(!tree.first(&ctx).await.unwrap());
	assert!(!tree.find(&ctx, &1, false).await.unwrap());
}

#[tokio::test]
async fn cancelled_context_surfaces_as_error_without_mutation() {
	let ctx = OpContext::background();
	let canceller = ctx.add_cancel();
	let mut tree = new_tree(4, true);
	canceller.cancel();
	let result = tree.add(&ctx, 1, "x".to_string()).await;
	assert!(matches!(result, Err(btree_index::Error::Cancelled)));
	assert_eq!(tree.count(), 0);
}

#[tokio::test]
async fn many_splits_still_yield_a_single_consistent_sorted_tree() {
	let ctx = OpContext::background();
	let mut tree = new_tree(2, true);
	for key in 0..20 {
		tree.add(&ctx, key, key.to_string()).await.unwrap();
	}
	assert_eq!(tree.count(), 20);
	assert_eq!(collect_forward(&mut tree, &ctx).await, (0..20).collect::<Vec<_>>());
	assert!(tree.repository().node_count() > 1);
}

#[test]
fn identifier_nil_is_default_and_displays_as_nil() {
	let id = Identifier::default();
	assert!(id.is_nil());
	assert_eq!(id.to_string(), "NIL");
}
