//! Graph Capabilities
//!
//! The narrow surface through which logic touches scene-graph nodes.
//! Nodes may be torn down by the graph at any time, so every reference
//! is polled with `is_valid()` before use.

use std::rc::Rc;

/// Position of a graph node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodePosition {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
    /// Z coordinate
    pub z: f32,
}

impl NodePosition {
    /// Create a new position.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A reference to an external node whose target may disappear.
pub trait ObservableNode {
    /// Does the reference still point at a live node?
    fn is_valid(&self) -> bool;

    /// Release the reference. Returns false if releasing failed.
    fn remove_reference(&self) -> bool;
}

/// Scene-graph node capability.
///
/// Timeline-like operations are only meaningful on timeline nodes and
/// switch selection only on switch nodes; other node kinds report
/// failure through the boolean returns.
pub trait GraphNode: ObservableNode {
    /// Node identifier within its graph.
    fn id(&self) -> &str;

    /// Current position.
    fn position(&self) -> NodePosition;
    /// Move the node.
    fn set_position(&self, position: NodePosition) -> bool;

    /// Draw/depth order.
    fn depth_order(&self) -> i32;
    /// Change draw/depth order.
    fn set_depth_order(&self, order: i32) -> bool;

    /// Is the node active (processed by the graph)?
    fn is_active(&self) -> bool;
    /// Activate or deactivate.
    fn set_active(&self, active: bool) -> bool;
    /// Is the node visible?
    fn is_visible(&self) -> bool;
    /// Show or hide.
    fn set_visible(&self, visible: bool) -> bool;

    /// Start playing, optionally restricted to `[start, end]`.
    fn start(&self, range: Option<(f64, f64)>) -> bool;
    /// Stop playing.
    fn stop(&self) -> bool;
    /// Pause playing.
    fn pause(&self) -> bool;
    /// Is the node's timeline running?
    fn is_running(&self) -> bool;
    /// Current timeline time.
    fn current_time(&self) -> f64;
    /// Seek the node's timeline.
    fn set_current_time(&self, time: f64) -> bool;

    /// Select the active child of a switch node by child id.
    fn select_child(&self, _child_id: &str) -> bool {
        false
    }
}

/// Lookup access to the graph.
pub trait GraphRoot {
    /// Resolve a node by id.
    fn find_node(&self, id: &str) -> Option<Rc<dyn GraphNode>>;
}
