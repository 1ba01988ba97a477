use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::node::{side_for, Node, Side};

/// Outcome of a `query`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueryOutcome {
    Found(String),
    NotFound,
}

/// Outcome of an `add`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddOutcome {
    Ok,
    Exists,
}

/// Outcome of a `delete`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeleteOutcome {
    Ok,
    NotFound,
}

/// An ordered, concurrently-accessible binary search tree of string keys to
/// string values.
///
/// Every traversal is hand-over-hand: before stepping from a node to one of
/// its children, the thread already holds a permit on the node and takes one
/// on the child before releasing the node's permit. See [`crate::NodeLock`]
/// for why that's plain lock/unlock calls rather than RAII guards.
pub struct Tree {
    root: Arc<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Tree {
            root: Arc::new(Node::new_root()),
        }
    }

    pub fn query(&self, key: &str) -> QueryOutcome {
        let mut current = Arc::clone(&self.root);
        current.lock.lock_read();
        loop {
            let name = current.name();
            match key.cmp(name.as_str()) {
                Ordering::Equal => {
                    let value = current.value();
                    current.lock.unlock_read();
                    return QueryOutcome::Found(value);
                }
                _ => {
                    let side = side_for(key, &name);
                    match current.child(side) {
                        Some(next) => {
                            next.lock.lock_read();
                            current.lock.unlock_read();
                            current = next;
                        }
                        None => {
                            current.lock.unlock_read();
                            return QueryOutcome::NotFound;
                        }
                    }
                }
            }
        }
    }

    pub fn add(&self, key: &str, value: &str) -> AddOutcome {
        let mut current = Arc::clone(&self.root);
        current.lock.lock_read();
        loop {
            let name = current.name();
            if key == name {
                current.lock.unlock_read();
                debug!(target: "submerge-rowdb", key, "add: key already exists");
                return AddOutcome::Exists;
            }
            let side = side_for(key, &name);
            match current.child(side) {
                Some(next) => {
                    next.lock.lock_read();
                    current.lock.unlock_read();
                    current = next;
                }
                None => {
                    current.lock.unlock_read();
                    current.lock.lock_write();
                    if current.child(side).is_some() {
                        // Lost a race with a concurrent add: retry in place,
                        // no need to restart the whole descent from the root.
                        current.lock.unlock_write();
                        current.lock.lock_read();
                        continue;
                    }
                    let new_node = Arc::new(Node::new_leaf(key, value));
                    current.set_child(side, Some(new_node));
                    current.lock.unlock_write();
                    debug!(target: "submerge-rowdb", key, "add: inserted");
                    return AddOutcome::Ok;
                }
            }
        }
    }

    pub fn delete(&self, key: &str) -> DeleteOutcome {
        let mut current = Arc::clone(&self.root);
        current.lock.lock_read();
        loop {
            let name = current.name();
            let side = side_for(key, &name);
            match current.child(side) {
                None => {
                    current.lock.unlock_read();
                    return DeleteOutcome::NotFound;
                }
                Some(victim) => {
                    if victim.name() == key {
                        current.lock.unlock_read();
                        current.lock.lock_write();
                        let still_there = current
                            .child(side)
                            .map(|n| Arc::ptr_eq(&n, &victim))
                            .unwrap_or(false);
                        if !still_there {
                            // Raced with another delete/add at this slot: retry.
                            current.lock.unlock_write();
                            current.lock.lock_read();
                            continue;
                        }
                        victim.lock.lock_write();
                        self.unlink(&current, side, &victim);
                        debug!(target: "submerge-rowdb", key, "delete: removed");
                        return DeleteOutcome::Ok;
                    } else {
                        victim.lock.lock_read();
                        current.lock.unlock_read();
                        current = victim;
                    }
                }
            }
        }
    }

    /// Splice `victim` out of `parent`'s `side` slot. Caller holds the write
    /// permit on both `parent` and `victim`; both are released before return.
    fn unlink(&self, parent: &Arc<Node>, side: Side, victim: &Arc<Node>) {
        let left = victim.child(Side::Left);
        let right = victim.child(Side::Right);
        if left.is_none() || right.is_none() {
            parent.set_child(side, left.or(right));
            victim.lock.unlock_write();
            parent.lock.unlock_write();
        } else {
            // Two children: copy the in-order successor's key/value into
            // victim in place, then remove the successor (which has at most
            // one child) from its own, strictly simpler, position.
            let successor = self.remove_min(victim, Side::Right);
            victim.set_name_and_value(successor.name(), successor.value());
            victim.lock.unlock_write();
            parent.lock.unlock_write();
        }
    }

    /// Detach and return the minimum-keyed node reachable from
    /// `parent.child(side)`. `parent`'s write permit is held by the caller
    /// for the duration of this call; every intermediate ancestor visited
    /// along the way is read-locked, hand-over-hand, except for the final
    /// one, which is upgraded to a write lock before the splice.
    fn remove_min(&self, parent: &Arc<Node>, side: Side) -> Arc<Node> {
        let mut cur_parent = Arc::clone(parent);
        let mut cur_side = side;
        let mut cur_parent_is_outer = true;

        loop {
            let candidate = cur_parent
                .child(cur_side)
                .expect("remove_min called on an empty subtree");
            match candidate.child(Side::Left) {
                Some(_) => {
                    candidate.lock.lock_read();
                    if !cur_parent_is_outer {
                        cur_parent.lock.unlock_read();
                    }
                    cur_parent = candidate;
                    cur_side = Side::Left;
                    cur_parent_is_outer = false;
                }
                None => {
                    if !cur_parent_is_outer {
                        cur_parent.lock.unlock_read();
                        cur_parent.lock.lock_write();
                        let still_there = cur_parent
                            .child(cur_side)
                            .map(|n| Arc::ptr_eq(&n, &candidate))
                            .unwrap_or(false);
                        if !still_there {
                            cur_parent.lock.unlock_write();
                            cur_parent.lock.lock_read();
                            continue;
                        }
                    }
                    candidate.lock.lock_write();
                    let replacement = candidate.child(Side::Right);
                    cur_parent.set_child(cur_side, replacement);
                    candidate.lock.unlock_write();
                    if !cur_parent_is_outer {
                        cur_parent.lock.unlock_write();
                    }
                    return candidate;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use test_log::test;

    #[test]
    fn add_query_delete_roundtrip() {
        let tree = Tree::new();
        assert_eq!(tree.query("a"), QueryOutcome::NotFound);
        assert_eq!(tree.add("a", "1"), AddOutcome::Ok);
        assert_eq!(tree.query("a"), QueryOutcome::Found("1".to_string()));
        assert_eq!(tree.add("a", "2"), AddOutcome::Exists);
        assert_eq!(tree.delete("a"), DeleteOutcome::Ok);
        assert_eq!(tree.query("a"), QueryOutcome::NotFound);
        assert_eq!(tree.delete("a"), DeleteOutcome::NotFound);
    }

    #[test]
    fn ordering_invariant_holds_after_many_inserts() {
        let tree = Tree::new();
        let keys = ["m", "f", "t", "b", "h", "p", "z", "a", "g", "n"];
        for k in keys {
            assert_eq!(tree.add(k, k), AddOutcome::Ok);
        }
        for k in keys {
            assert_eq!(tree.query(k), QueryOutcome::Found(k.to_string()));
        }
    }

    #[test]
    fn delete_two_child_node_preserves_siblings() {
        let tree = Tree::new();
        for k in ["m", "f", "t", "b", "h", "g", "k", "s", "v"] {
            tree.add(k, k).ok_or_panic();
        }
        // "f" has two children ("b" and "h", with "h" itself having children).
        assert_eq!(tree.delete("f"), DeleteOutcome::Ok);
        assert_eq!(tree.query("f"), QueryOutcome::NotFound);
        for k in ["m", "t", "b", "h", "g", "k", "s", "v"] {
            assert_eq!(tree.query(k), QueryOutcome::Found(k.to_string()));
        }
    }

    trait OkOrPanic {
        fn ok_or_panic(&self);
    }
    impl OkOrPanic for AddOutcome {
        fn ok_or_panic(&self) {
            assert_eq!(*self, AddOutcome::Ok);
        }
    }

    #[test]
    fn concurrent_add_and_delete_never_corrupts_the_key() {
        // Testable property #1: concurrent add/delete on the same key leaves
        // it either present with the last-added value, or absent.
        let tree = Arc::new(Tree::new());
        let start = Arc::new(Barrier::new(2));

        let t1 = Arc::clone(&tree);
        let b1 = Arc::clone(&start);
        let adder = thread::spawn(move || {
            b1.wait();
            for _ in 0..50 {
                let _ = t1.add("contested", "v");
                let _ = t1.delete("contested");
            }
        });

        let t2 = Arc::clone(&tree);
        let b2 = Arc::clone(&start);
        let deleter = thread::spawn(move || {
            b2.wait();
            for _ in 0..50 {
                let _ = t2.delete("contested");
                let _ = t2.add("contested", "v");
            }
        });

        adder.join().unwrap();
        deleter.join().unwrap();

        match tree.query("contested") {
            QueryOutcome::Found(v) => assert_eq!(v, "v"),
            QueryOutcome::NotFound => {}
        }
    }

    #[test]
    fn reader_visibility_after_add_and_delete() {
        // Testable property #2.
        let tree = Tree::new();
        assert_eq!(tree.add("x", "first"), AddOutcome::Ok);
        assert_eq!(tree.query("x"), QueryOutcome::Found("first".to_string()));
        assert_eq!(tree.delete("x"), DeleteOutcome::Ok);
        assert_eq!(tree.query("x"), QueryOutcome::NotFound);
    }

    #[test]
    fn concurrent_inserts_on_disjoint_keys_all_land() {
        let tree = Arc::new(Tree::new());
        let start = Arc::new(Barrier::new(4));
        let mut handles = Vec::new();
        for worker in 0..4 {
            let tree = Arc::clone(&tree);
            let start = Arc::clone(&start);
            handles.push(thread::spawn(move || {
                start.wait();
                for i in 0..25 {
                    let key = format!("w{worker}-{i}");
                    assert_eq!(tree.add(&key, "v"), AddOutcome::Ok);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        for worker in 0..4 {
            for i in 0..25 {
                let key = format!("w{worker}-{i}");
                assert_eq!(tree.query(&key), QueryOutcome::Found("v".to_string()));
            }
        }
    }
}
