use std::sync::{Arc, Mutex};

use crate::lock::NodeLock;

/// A single tree node: a unique `name`, a `value`, and up to two children.
///
/// `lock` is the reader/writer permit callers must hold before touching
/// `data`. `data` itself lives behind a small internal mutex purely so that
/// reading or mutating `name`/`value`/`left`/`right` is memory-safe; the
/// permit discipline in `lock`, not this mutex, is what gives callers the
/// reader/writer semantics described in the tree's module docs. `name` is
/// interior-mutable because in-order-successor deletion renames a node
/// in place rather than re-parenting it.
pub struct Node {
    pub(crate) lock: NodeLock,
    data: Mutex<NodeData>,
}

#[derive(Default)]
struct NodeData {
    name: String,
    value: String,
    left: Option<Arc<Node>>,
    right: Option<Arc<Node>>,
}

/// Which of a node's two child links a descent step is following.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Side {
    Left,
    Right,
}

impl Node {
    pub(crate) fn new_leaf(name: impl Into<String>, value: impl Into<String>) -> Self {
        Node {
            lock: NodeLock::new(),
            data: Mutex::new(NodeData {
                name: name.into(),
                value: value.into(),
                left: None,
                right: None,
            }),
        }
    }

    /// The sentinel root: its name sorts below every legal (non-empty) key,
    /// so every real traversal steps into its right child.
    pub(crate) fn new_root() -> Self {
        Node::new_leaf(String::new(), String::new())
    }

    pub(crate) fn name(&self) -> String {
        self.data.lock().expect("node data poisoned").name.clone()
    }

    pub(crate) fn value(&self) -> String {
        self.data.lock().expect("node data poisoned").value.clone()
    }

    pub(crate) fn child(&self, side: Side) -> Option<Arc<Node>> {
        let data = self.data.lock().expect("node data poisoned");
        match side {
            Side::Left => data.left.clone(),
            Side::Right => data.right.clone(),
        }
    }

    /// Link `child` under `side`. Caller must hold the write permit.
    pub(crate) fn set_child(&self, side: Side, child: Option<Arc<Node>>) {
        let mut data = self.data.lock().expect("node data poisoned");
        match side {
            Side::Left => data.left = child,
            Side::Right => data.right = child,
        }
    }

    /// Overwrite this node's value in place. Caller must hold the write permit.
    pub(crate) fn set_value(&self, value: impl Into<String>) {
        self.data.lock().expect("node data poisoned").value = value.into();
    }

    /// Overwrite this node's name and value in place, used when an
    /// in-order successor is copied into a two-child victim rather than
    /// re-parented. Caller must hold the write permit.
    pub(crate) fn set_name_and_value(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut data = self.data.lock().expect("node data poisoned");
        data.name = name.into();
        data.value = value.into();
    }
}

pub(crate) fn side_for(key: &str, node_name: &str) -> Side {
    if key < node_name {
        Side::Left
    } else {
        Side::Right
    }
}
