use crate::id::Identifier;

/// The persistent, caller-configured descriptor of a store (§6.4).
///
/// Carries the tunables the Tree consults but never defines storage for:
/// slot capacity, uniqueness, the two value-externalization flags, the
/// leaf-load-balancing switch, and the mutable root pointer / item count.
/// No wire protocol or on-disk layout is implied — persisting this struct,
/// if a caller wants to, is entirely their concern.
#[derive(Debug, Clone)]
pub struct StoreDescriptor {
	pub slot_length: usize,
	pub is_unique: bool,
	pub is_value_data_in_node_segment: bool,
	pub is_value_data_actively_persisted: bool,
	pub leaf_load_balancing: bool,
	pub root_node_id: Identifier,
	pub count: u64,
}

impl StoreDescriptor {
	pub fn builder() -> StoreDescriptorBuilder {
		StoreDescriptorBuilder::default()
	}
}

/// A small, validated constructor for [`StoreDescriptor`], in the style of
/// this codebase's other narrow config builders (e.g. `idx::docids::State`
/// alongside its tree) — configuration plumbing, not a policy the core
/// imposes.
#[derive(Debug, Clone)]
pub struct StoreDescriptorBuilder {
	slot_length: usize,
	is_unique: bool,
	is_value_data_in_node_segment: bool,
	is_value_data_actively_persisted: bool,
	leaf_load_balancing: bool,
}

impl Default for StoreDescriptorBuilder {
	fn default() -> Self {
		Self {
			slot_length: 4,
			is_unique: true,
			is_value_data_in_node_segment: true,
			is_value_data_actively_persisted: false,
			leaf_load_balancing: false,
		}
	}
}

impl StoreDescriptorBuilder {
	pub fn slot_length(mut self, slot_length: usize) -> Self {
		self.slot_length = slot_length;
		self
	}

	pub fn unique(mut self, is_unique: bool) -> Self {
		self.is_unique = is_unique;
		self
	}

	pub fn value_data_in_node_segment(mut self, inline: bool) -> Self {
		self.is_value_data_in_node_segment = inline;
		self
	}

	pub fn value_data_actively_persisted(mut self, persisted: bool) -> Self {
		self.is_value_data_actively_persisted = persisted;
		self
	}

	pub fn leaf_load_balancing(mut self, enabled: bool) -> Self {
		self.leaf_load_balancing = enabled;
		self
	}

	/// Validates and builds the descriptor with an empty, rootless tree
	/// (`root_node_id = NIL`, `count = 0`); the Tree creates the root leaf
	/// lazily on first insert.
	pub fn build(self) -> Result<StoreDescriptor, &'static str> {
		if self.slot_length < 2 {
			return Err("slot_length must be at least 2");
		}
		Ok(StoreDescriptor {
			slot_length: self.slot_length,
			is_unique: self.is_unique,
			is_value_data_in_node_segment: self.is_value_data_in_node_segment,
			is_value_data_actively_persisted: self.is_value_data_actively_persisted,
			leaf_load_balancing: self.leaf_load_balancing,
			root_node_id: Identifier::NIL,
			count: 0,
		})
	}
}
