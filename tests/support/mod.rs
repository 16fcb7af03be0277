//! In-memory test doubles for the externalized collaborators, modeled on
//! `TreeWrite`'s in-memory `HashMap<NodeId, StoredNode<N>>` staging map in
//! this codebase's own tree store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use btree_index::{Error, Identifier, Item, ItemActionTracker, Node, NodeRepository, OpContext, TransactionMode, TwoPhaseCommitTransaction};

#[derive(Default)]
pub struct MemoryRepository<K, V> {
	nodes: Mutex<HashMap<Identifier, Node<K, V>>>,
}

impl<K, V> MemoryRepository<K, V> {
	pub fn new() -> Self {
		Self {
			nodes: Mutex::new(HashMap::new()),
		}
	}

	pub fn node_count(&self) -> usize {
		self.nodes.lock().unwrap().len()
	}
}

#[async_trait]
impl<K, V> NodeRepository<K, V> for MemoryRepository<K, V>
where
	K: Clone + Send + Sync + 'static,
	V: Clone + Send + Sync + 'static,
{
	async fn get(&self, _ctx: &OpContext, id: Identifier) -> Result<Option<Node<K, V>>, Error> {
		Ok(self.nodes.lock().unwrap().get(&id).cloned())
	}

	async fn add(&self, _ctx: &OpContext, node: Node<K, V>) -> Result<(), Error> {
		self.nodes.lock().unwrap().insert(node.id, node);
		Ok(())
	}

	async fn update(&self, _ctx: &OpContext, node: Node<K, V>) -> Result<(), Error> {
		self.nodes.lock().unwrap().insert(node.id, node);
		Ok(())
	}

	async fn remove(&self, _ctx: &OpContext, id: Identifier) -> Result<(), Error> {
		self.nodes.lock().unwrap().remove(&id);
		Ok(())
	}
}

/// Records every lifecycle notification it receives, so tests can assert on
/// add/update/remove/get call counts (§8 scenario 6).
#[derive(Default)]
pub struct RecordingTracker<K, V> {
	pub added: Mutex<Vec<Item<K, V>>>,
	pub updated: Mutex<Vec<Item<K, V>>>,
	pub removed: Mutex<Vec<Item<K, V>>>,
}

impl<K, V> RecordingTracker<K, V> {
	pub fn new() -> Self {
		Self {
			added: Mutex::new(Vec::new()),
			updated: Mutex::new(Vec::new()),
			removed: Mutex::new(Vec::new()),
		}
	}
}

#[async_trait]
impl<K, V> ItemActionTracker<K, V> for RecordingTracker<K, V>
where
	K: Clone + Send + Sync + 'static,
	V: Clone + Send + Sync + 'static,
{
	async fn add(&self, _ctx: &OpContext, item: &Item<K, V>) -> Result<(), Error> {
		self.added.lock().unwrap().push(item.clone());
		Ok(())
	}

	async fn update(&self, _ctx: &OpContext, item: &Item<K, V>) -> Result<(), Error> {
		self.updated.lock().unwrap().push(item.clone());
		Ok(())
	}

	async fn remove(&self, _ctx: &OpContext, item: &Item<K, V>) -> Result<(), Error> {
		self.removed.lock().unwrap().push(item.clone());
		Ok(())
	}

	async fn get(&self, _ctx: &OpContext, _item: &mut Item<K, V>) -> Result<(), Error> {
		Ok(())
	}
}

/// A trivial two-phase-commit double: tracks `begun`/`mode` and every
/// rollback cause it was asked to handle, but never actually fails.
pub struct MemoryTransaction {
	begun: Mutex<bool>,
	mode: Mutex<TransactionMode>,
	pub rollbacks: Mutex<Vec<Option<String>>>,
}

impl MemoryTransaction {
	pub fn new(mode: TransactionMode) -> Self {
		Self {
			begun: Mutex::new(false),
			mode: Mutex::new(mode),
			rollbacks: Mutex::new(Vec::new()),
		}
	}
}

#[async_trait]
impl TwoPhaseCommitTransaction for MemoryTransaction {
	fn get_id(&self) -> String {
		"memory-tx".to_string()
	}

	async fn begin(&self, _ctx: &OpContext, mode: TransactionMode) -> Result<(), Error> {
		*self.begun.lock().unwrap() = true;
		*self.mode.lock().unwrap() = mode;
		Ok(())
	}

	fn has_begun(&self) -> bool {
		*self.begun.lock().unwrap()
	}

	fn get_mode(&self) -> TransactionMode {
		*self.mode.lock().unwrap()
	}

	async fn phase1_commit(&self, _ctx: &OpContext) -> Result<(), Error> {
		Ok(())
	}

	async fn phase2_commit(&self, _ctx: &OpContext) -> Result<(), Error> {
		Ok(())
	}

	async fn rollback(&self, _ctx: &OpContext, cause: Option<&Error>) -> Result<(), Error> {
		self.rollbacks.lock().unwrap().push(cause.map(|e| e.to_string()));
		Ok(())
	}

	async fn close(&self, _ctx: &OpContext) -> Result<(), Error> {
		Ok(())
	}

	fn commit_max_duration(&self) -> Option<std::time::Duration> {
		None
	}

	fn get_stores(&self) -> Vec<String> {
		vec!["memory".to_string()]
	}
}
