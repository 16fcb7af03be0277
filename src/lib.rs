#[macro_use]
extern crate tracing;

mod comparator;
mod context;
mod cursor;
mod descriptor;
mod error;
mod id;
mod item;
mod node;
mod repository;
mod transaction;
mod tree;
mod wrapper;

pub use comparator::{CanonicalStringOrder, FnComparator, KeyComparator, NaturalOrder};
pub use context::{Canceller, OpContext};
pub use cursor::Cursor;
pub use descriptor::{StoreDescriptor, StoreDescriptorBuilder};
pub use error::Error;
pub use id::Identifier;
pub use item::Item;
pub use node::Node;
pub use repository::{ItemActionTracker, NodeRepository};
pub use transaction::{TransactionMode, TwoPhaseCommitTransaction};
pub use tree::Tree;
pub use wrapper::TransactionWrapper;
