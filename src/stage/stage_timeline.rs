//! Stage Timelines
//!
//! What a stage plays during its intro and outro. The stage only asks two
//! things of it: start a phase, and report whether it is still running.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::graph::{GraphNode, GraphRoot};
use crate::logic::node_observer::NodeRef;
use crate::logic::stepable::{erase, StepableRef};
use crate::timeline::{Timeline, TimelineError, TimelineHandle, TimelineParams};

/// A closed time interval `[start, end]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Interval start
    pub start: f64,
    /// Interval end
    pub end: f64,
}

impl TimeRange {
    /// Create a range.
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// The timeline bound to a stage.
pub trait StageTimeline {
    /// Start the intro, over `range` if given.
    fn start_intro(&mut self, range: Option<TimeRange>) -> bool;

    /// Start the outro, over `range` if given.
    fn start_outro(&mut self, range: Option<TimeRange>) -> bool;

    /// Stop playing.
    fn stop(&mut self) -> bool;

    /// Still playing (pausing counts as playing)?
    fn is_running(&self) -> bool;

    /// Stepable the owning stage must tick.
    fn stepable(&self) -> Option<StepableRef> {
        None
    }

    /// Node reference the owning stage must track.
    fn node(&self) -> Option<NodeRef> {
        None
    }
}

// =============================================================================
// PHASE TIMELINE
// =============================================================================

/// Stage timeline backed by a [`Timeline`] phase engine.
///
/// The engine is ticked by the owning stage's stepable observer.
#[derive(Debug)]
pub struct PhaseStageTimeline {
    timeline: TimelineHandle,
    intro: TimeRange,
    outro: TimeRange,
}

impl PhaseStageTimeline {
    /// Create a timeline playing `intro` and `outro` inside `params`.
    ///
    /// Both ranges must be playable within the layout.
    pub fn new(params: TimelineParams, intro: TimeRange, outro: TimeRange) -> Result<Self, TimelineError> {
        params.validate()?;
        params.validate_range(intro.start, intro.end)?;
        params.validate_range(outro.start, outro.end)?;
        Ok(Self::from_handle(Timeline::shared(params)?, intro, outro))
    }

    /// Wrap an existing shared timeline.
    pub fn from_handle(timeline: TimelineHandle, intro: TimeRange, outro: TimeRange) -> Self {
        Self { timeline, intro, outro }
    }

    /// The shared timeline.
    pub fn handle(&self) -> &TimelineHandle {
        &self.timeline
    }

    /// Default intro range.
    pub fn intro(&self) -> TimeRange {
        self.intro
    }

    /// Default outro range.
    pub fn outro(&self) -> TimeRange {
        self.outro
    }

    fn play(&mut self, range: TimeRange) -> bool {
        self.timeline
            .borrow_mut()
            .logic_mut()
            .start_range(range.start, range.end)
    }
}

impl StageTimeline for PhaseStageTimeline {
    fn start_intro(&mut self, range: Option<TimeRange>) -> bool {
        self.play(range.unwrap_or(self.intro))
    }

    fn start_outro(&mut self, range: Option<TimeRange>) -> bool {
        self.play(range.unwrap_or(self.outro))
    }

    fn stop(&mut self) -> bool {
        self.timeline.borrow_mut().logic_mut().stop();
        true
    }

    fn is_running(&self) -> bool {
        let step = self.timeline.borrow();
        step.logic().is_running() || step.logic().is_paused()
    }

    fn stepable(&self) -> Option<StepableRef> {
        Some(erase(&self.timeline))
    }
}

// =============================================================================
// NODE TIMELINE
// =============================================================================

/// Stage timeline backed by a timeline node of the graph.
///
/// Operations on a node the graph has torn down are skipped.
pub struct NodeStageTimeline {
    node: Rc<dyn GraphNode>,
    intro: Option<TimeRange>,
    outro: Option<TimeRange>,
}

impl NodeStageTimeline {
    /// Wrap a resolved timeline node.
    pub fn new(node: Rc<dyn GraphNode>) -> Self {
        Self {
            node,
            intro: None,
            outro: None,
        }
    }

    /// Resolve a timeline node by id.
    pub fn resolve(graph: &dyn GraphRoot, id: &str) -> Option<Self> {
        graph.find_node(id).map(Self::new)
    }

    /// Default ranges; `None` plays the node's full timeline.
    pub fn with_ranges(mut self, intro: Option<TimeRange>, outro: Option<TimeRange>) -> Self {
        self.intro = intro;
        self.outro = outro;
        self
    }

    fn play(&self, range: Option<TimeRange>) -> bool {
        if !self.node.is_valid() {
            debug!(node = self.node.id(), "timeline node gone, skipping start");
            return false;
        }
        self.node.start(range.map(|r| (r.start, r.end)))
    }
}

impl StageTimeline for NodeStageTimeline {
    fn start_intro(&mut self, range: Option<TimeRange>) -> bool {
        self.play(range.or(self.intro))
    }

    fn start_outro(&mut self, range: Option<TimeRange>) -> bool {
        self.play(range.or(self.outro))
    }

    fn stop(&mut self) -> bool {
        self.node.is_valid() && self.node.stop()
    }

    fn is_running(&self) -> bool {
        self.node.is_valid() && self.node.is_running()
    }

    fn node(&self) -> Option<NodeRef> {
        Some(self.node.clone())
    }
}

impl std::fmt::Debug for NodeStageTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStageTimeline")
            .field("node", &self.node.id())
            .field("intro", &self.intro)
            .field("outro", &self.outro)
            .finish()
    }
}
