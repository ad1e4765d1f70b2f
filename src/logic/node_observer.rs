//! Node Observer
//!
//! Tracks external node references held by a processor and answers
//! whether all of them are still valid. Fan-out iterates over a snapshot,
//! like the stepable observer.

use std::rc::Rc;

use tracing::warn;

use crate::core::graph::ObservableNode;
use crate::core::same_target;

/// Shared node reference.
pub type NodeRef = Rc<dyn ObservableNode>;

/// Ordered, duplicate-free collection of node references.
#[derive(Default)]
pub struct NodeObserver {
    nodes: Vec<NodeRef>,
}

impl NodeObserver {
    /// Create an empty observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a node. Fails if it is already tracked.
    pub fn add(&mut self, node: NodeRef) -> bool {
        if self.nodes.iter().any(|n| same_target(n, &node)) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    /// Stop tracking a node without releasing it.
    pub fn remove(&mut self, node: &NodeRef) -> bool {
        match self.nodes.iter().position(|n| same_target(n, node)) {
            Some(index) => {
                self.nodes.remove(index);
                true
            }
            None => false,
        }
    }

    /// Stop tracking the node at `index` without releasing it.
    pub fn remove_at(&mut self, index: usize) -> bool {
        if index >= self.nodes.len() {
            return false;
        }
        self.nodes.remove(index);
        true
    }

    /// Release every reference and empty the observer.
    ///
    /// Returns false if any release failed; the observer is emptied anyway.
    pub fn remove_all(&mut self) -> bool {
        let mut ok = true;
        for node in std::mem::take(&mut self.nodes) {
            if !node.remove_reference() {
                warn!("failed to release node reference");
                ok = false;
            }
        }
        ok
    }

    /// True if empty or every reference is valid.
    pub fn are_valid(&self) -> bool {
        self.nodes.iter().all(|n| n.is_valid())
    }

    /// The node at `index`, if it exists and is still valid.
    pub fn get_node_if_valid(&self, index: usize) -> Option<NodeRef> {
        self.nodes.get(index).filter(|n| n.is_valid()).cloned()
    }

    /// Number of tracked references.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// No references tracked?
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for NodeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeObserver")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::MemoryNode;

    #[test]
    fn test_empty_observer_is_valid() {
        let observer = NodeObserver::new();
        assert!(observer.are_valid());
        assert!(observer.get_node_if_valid(0).is_none());
    }

    #[test]
    fn test_invalid_node_makes_observer_invalid() {
        let mut observer = NodeObserver::new();
        let good = Rc::new(MemoryNode::new("good"));
        let bad = Rc::new(MemoryNode::new("bad"));
        bad.invalidate();

        assert!(observer.add(good.clone()));
        assert!(observer.are_valid());
        assert!(observer.add(bad.clone()));
        assert!(!observer.are_valid());

        assert!(observer.get_node_if_valid(0).is_some());
        assert!(observer.get_node_if_valid(1).is_none());
    }

    #[test]
    fn test_duplicate_node_is_rejected() {
        let mut observer = NodeObserver::new();
        let node: NodeRef = Rc::new(MemoryNode::new("n"));
        assert!(observer.add(node.clone()));
        assert!(!observer.add(node.clone()));
        assert!(observer.remove(&node));
        assert!(!observer.remove_at(0));
    }

    #[test]
    fn test_remove_all_empties_even_on_failure() {
        let mut observer = NodeObserver::new();
        let a = Rc::new(MemoryNode::new("a"));
        let b = Rc::new(MemoryNode::new("b"));
        b.fail_removal(true);
        observer.add(a.clone());
        observer.add(b.clone());

        assert!(!observer.remove_all());
        assert!(observer.is_empty());
        assert_eq!(a.references(), 0);
        assert_eq!(b.references(), 1);
    }
}
