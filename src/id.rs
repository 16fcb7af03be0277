use std::fmt;
use uuid::Uuid;

/// A 128-bit node/item identifier with an explicit `NIL` sentinel.
///
/// A value type with no identity beyond its bits (§3). Comparison is a plain
/// total order over the underlying bytes, which is all the tree ever needs
/// from an identifier — it never interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Identifier(Uuid);

impl Identifier {
	/// The sentinel identifier: "no node" / "no selection".
	pub const NIL: Identifier = Identifier(Uuid::nil());

	/// Produces a fresh identifier, unique with overwhelming probability.
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	pub const fn is_nil(&self) -> bool {
		self.0.is_nil()
	}

	pub const fn from_uuid(id: Uuid) -> Self {
		Self(id)
	}

	pub const fn as_uuid(&self) -> Uuid {
		self.0
	}
}

impl fmt::Display for Identifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_nil() {
			write!(f, "NIL")
		} else {
			write!(f, "{}", self.0)
		}
	}
}

impl From<Uuid> for Identifier {
	fn from(value: Uuid) -> Self {
		Self(value)
	}
}
