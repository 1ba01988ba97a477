//! The row database: an in-memory, ordered tree of string keys to string
//! values, with per-node reader/writer locking and hand-over-hand traversal.
//!
//! This crate is deliberately small: it is the data structure a command
//! interpreter runs queries against, not the interpreter itself.

mod lock;
mod node;
mod tree;

pub use lock::NodeLock;
pub use node::Node;
pub use tree::{AddOutcome, DeleteOutcome, QueryOutcome, Tree};
