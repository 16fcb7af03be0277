use crate::id::Identifier;

/// A single key/value/identity/version record (§3 "Item").
///
/// One design models an empty slot as an `Item` with identity
/// [`Identifier::NIL`]. `Node::slots` instead represents an empty slot as
/// `None`, since requiring `K: Default` purely to manufacture a placeholder
/// key would leak into every caller's key type for no benefit — the NIL
/// encoding and the `Option` encoding are observationally identical from
/// every operation in §4, just not from direct field access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<K, V> {
	pub id: Identifier,
	pub key: K,
	pub value: Option<V>,
	pub version: u32,
	/// `true` when the value has not been loaded and a read must consult the
	/// `ItemActionTracker` before `value` can be trusted.
	pub value_needs_fetch: bool,
	/// `true` once a fetch has been performed. Internal bookkeeping: it lets
	/// `unfetch_current_value` (§9 "Value externalization") tell an item that
	/// was always inline from one that was fetched and could be released.
	pub value_was_fetched: bool,
}

impl<K, V> Item<K, V> {
	/// Builds a brand-new item with a fresh identifier and an inline value.
	pub fn new(key: K, value: V) -> Self {
		Self {
			id: Identifier::new(),
			key,
			value: Some(value),
			version: 0,
			value_needs_fetch: false,
			value_was_fetched: false,
		}
	}

	/// Builds an item with caller-supplied identity and version, e.g. for
	/// `add_item` where the caller controls identity (§4.3 `add_item`).
	pub fn with_id(id: Identifier, key: K, value: Option<V>, version: u32) -> Self {
		Self {
			id,
			key,
			value,
			version,
			value_needs_fetch: value.is_none(),
			value_was_fetched: false,
		}
	}
}
