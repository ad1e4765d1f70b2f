//! In-Memory Graph
//!
//! A small in-process scene graph implementing the graph capabilities.
//! Used by the demo binary and by tests that need nodes whose validity
//! and timelines can be driven by hand.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::core::graph::{GraphNode, GraphRoot, NodePosition, ObservableNode};

/// Default timeline duration for nodes created without one (seconds).
pub const DEFAULT_NODE_DURATION: f64 = 1.0;

/// A node living in a [`MemoryGraph`].
#[derive(Debug)]
pub struct MemoryNode {
    id: String,
    valid: Cell<bool>,
    references: Cell<u32>,
    fail_remove: Cell<bool>,
    position: Cell<NodePosition>,
    depth_order: Cell<i32>,
    active: Cell<bool>,
    visible: Cell<bool>,
    running: Cell<bool>,
    paused: Cell<bool>,
    time: Cell<f64>,
    duration: Cell<f64>,
    range: Cell<(f64, f64)>,
    children: RefCell<Vec<String>>,
    selected: RefCell<Option<String>>,
}

impl MemoryNode {
    /// Create a valid, active, visible node.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            valid: Cell::new(true),
            references: Cell::new(1),
            fail_remove: Cell::new(false),
            position: Cell::new(NodePosition::default()),
            depth_order: Cell::new(0),
            active: Cell::new(true),
            visible: Cell::new(true),
            running: Cell::new(false),
            paused: Cell::new(false),
            time: Cell::new(0.0),
            duration: Cell::new(DEFAULT_NODE_DURATION),
            range: Cell::new((0.0, DEFAULT_NODE_DURATION)),
            children: RefCell::new(Vec::new()),
            selected: RefCell::new(None),
        }
    }

    /// Set the node's timeline duration.
    pub fn with_duration(self, duration: f64) -> Self {
        self.duration.set(duration);
        self.range.set((0.0, duration));
        self
    }

    /// Declare switch children.
    pub fn with_children<I, S>(self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children
            .borrow_mut()
            .extend(children.into_iter().map(Into::into));
        self
    }

    /// Make the node invalid, as if the graph tore it down.
    pub fn invalidate(&self) {
        self.valid.set(false);
        self.running.set(false);
    }

    /// Make subsequent `remove_reference` calls fail.
    pub fn fail_removal(&self, fail: bool) {
        self.fail_remove.set(fail);
    }

    /// Outstanding references held by logic.
    pub fn references(&self) -> u32 {
        self.references.get()
    }

    /// Currently selected switch child.
    pub fn selected_child(&self) -> Option<String> {
        self.selected.borrow().clone()
    }

    /// Is the node's timeline paused?
    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Advance the node's timeline by `dt` seconds.
    pub fn advance(&self, dt: f64) {
        if !self.running.get() || self.paused.get() {
            return;
        }
        let (_, end) = self.range.get();
        let time = self.time.get() + dt;
        if time >= end {
            self.time.set(end);
            self.running.set(false);
        } else {
            self.time.set(time);
        }
    }
}

impl ObservableNode for MemoryNode {
    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn remove_reference(&self) -> bool {
        if self.fail_remove.get() {
            return false;
        }
        self.references.set(self.references.get().saturating_sub(1));
        true
    }
}

impl GraphNode for MemoryNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> NodePosition {
        self.position.get()
    }

    fn set_position(&self, position: NodePosition) -> bool {
        if !self.is_valid() {
            return false;
        }
        self.position.set(position);
        true
    }

    fn depth_order(&self) -> i32 {
        self.depth_order.get()
    }

    fn set_depth_order(&self, order: i32) -> bool {
        if !self.is_valid() {
            return false;
        }
        self.depth_order.set(order);
        true
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn set_active(&self, active: bool) -> bool {
        if !self.is_valid() {
            return false;
        }
        self.active.set(active);
        true
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn set_visible(&self, visible: bool) -> bool {
        if !self.is_valid() {
            return false;
        }
        self.visible.set(visible);
        true
    }

    fn start(&self, range: Option<(f64, f64)>) -> bool {
        if !self.is_valid() {
            return false;
        }
        let range = range.unwrap_or((0.0, self.duration.get()));
        self.range.set(range);
        self.time.set(range.0);
        self.paused.set(false);
        self.running.set(range.1 > range.0);
        true
    }

    fn stop(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        self.running.set(false);
        self.paused.set(false);
        true
    }

    fn pause(&self) -> bool {
        if !self.is_valid() || !self.running.get() {
            return false;
        }
        self.paused.set(true);
        true
    }

    fn is_running(&self) -> bool {
        self.running.get()
    }

    fn current_time(&self) -> f64 {
        self.time.get()
    }

    fn set_current_time(&self, time: f64) -> bool {
        if !self.is_valid() {
            return false;
        }
        self.time.set(time);
        true
    }

    fn select_child(&self, child_id: &str) -> bool {
        if !self.is_valid() || !self.children.borrow().iter().any(|c| c == child_id) {
            return false;
        }
        *self.selected.borrow_mut() = Some(child_id.to_string());
        true
    }
}

/// An in-memory graph: a flat id -> node registry.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: RefCell<BTreeMap<String, Rc<MemoryNode>>>,
}

impl MemoryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing (and invalidating) any node with the same id.
    pub fn insert(&self, node: MemoryNode) -> Rc<MemoryNode> {
        let node = Rc::new(node);
        let previous = self
            .nodes
            .borrow_mut()
            .insert(node.id.clone(), node.clone());
        if let Some(previous) = previous {
            previous.invalidate();
        }
        node
    }

    /// Typed access to a node.
    pub fn node(&self, id: &str) -> Option<Rc<MemoryNode>> {
        self.nodes.borrow().get(id).cloned()
    }

    /// Tear a node down. Outstanding references become invalid.
    pub fn remove(&self, id: &str) -> bool {
        match self.nodes.borrow_mut().remove(id) {
            Some(node) => {
                debug!(node = id, "graph node removed");
                node.invalidate();
                true
            }
            None => false,
        }
    }

    /// Advance every node timeline.
    pub fn advance(&self, dt: f64) {
        for node in self.nodes.borrow().values() {
            node.advance(dt);
        }
    }
}

impl GraphRoot for MemoryGraph {
    fn find_node(&self, id: &str) -> Option<Rc<dyn GraphNode>> {
        let node = self.nodes.borrow().get(id).cloned()?;
        if !node.is_valid() {
            return None;
        }
        node.references.set(node.references.get() + 1);
        Some(node as Rc<dyn GraphNode>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_and_remove() {
        let graph = MemoryGraph::new();
        let node = graph.insert(MemoryNode::new("title"));

        let found = graph.find_node("title").unwrap();
        assert!(found.is_valid());
        assert_eq!(node.references(), 2);

        assert!(graph.remove("title"));
        assert!(!found.is_valid());
        assert!(graph.find_node("title").is_none());
        assert!(!graph.remove("title"));
    }

    #[test]
    fn test_node_timeline_runs_to_end() {
        let node = MemoryNode::new("fade").with_duration(1.0);
        assert!(node.start(None));
        assert!(node.is_running());

        node.advance(0.6);
        assert!(node.is_running());
        node.advance(0.6);
        assert!(!node.is_running());
        assert_eq!(node.current_time(), 1.0);
    }

    #[test]
    fn test_switch_selection() {
        let node = MemoryNode::new("switch").with_children(["menu", "game"]);
        assert!(node.select_child("game"));
        assert!(!node.select_child("credits"));
        assert_eq!(node.selected_child().as_deref(), Some("game"));
    }

    #[test]
    fn test_invalid_node_refuses_writes() {
        let node = MemoryNode::new("sprite");
        node.invalidate();
        assert!(!node.set_position(NodePosition::new(1.0, 2.0, 0.0)));
        assert!(!node.set_depth_order(3));
        assert!(!node.start(None));
    }
}
