//! Stage
//!
//! A processor with an intro/run/outro run-state machine, optionally bound
//! to a stage timeline. Transitions are requested explicitly and processed
//! on the stage's next tick; intro and outro advance on their own once the
//! bound timeline stops running.
//!
//! ## Run-State Step
//!
//! ```text
//! BEGIN_INTRO: select switch child, start intro timeline, callback -> RUN_INTRO
//! RUN_INTRO:   callback, timeline done                            -> BEGIN_RUN
//! BEGIN_RUN:   callback                                           -> RUN
//! RUN:         callback
//! BEGIN_OUTRO: start outro timeline, callback                     -> RUN_OUTRO
//! RUN_OUTRO:   callback, timeline done                            -> STOP
//! ```
//!
//! An automatic advance only happens when no callback changed the run state
//! during the same step. Without a timeline, RUN_INTRO and RUN_OUTRO are
//! left by explicit transitions only.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::core::context::LogicContext;
use crate::core::graph::GraphNode;
use crate::logic::notice::{AppRunState, Package, PackageEvent};
use crate::logic::processor::{LogicNode, Pass, Processor};
use crate::logic::stepable::NoopLogic;
use crate::stage::run_state::{RunState, StageProcessing};
use crate::stage::stage_timeline::{StageTimeline, TimeRange};

/// Run-state changes processed per flush before the rest is dropped.
const MAX_CHAINED_TRANSITIONS: usize = 64;

/// Shared slot holding a stage processor's resolved switch node.
pub type SwitchSlot = Rc<RefCell<Option<Rc<dyn GraphNode>>>>;

// =============================================================================
// STAGE CONTROL
// =============================================================================

/// Run-state data of a stage, handed to its callbacks.
pub struct StageControl {
    stage_id: String,
    switch_id: Option<String>,
    run_state: RunState,
    processing: StageProcessing,
    timeline: Option<Box<dyn StageTimeline>>,
    changed: bool,
    intro_range: Option<TimeRange>,
    outro_range: Option<TimeRange>,
    switch: Weak<RefCell<Option<Rc<dyn GraphNode>>>>,
    transitions: VecDeque<(RunState, RunState)>,
}

impl StageControl {
    fn new(stage_id: String) -> Self {
        Self {
            stage_id,
            switch_id: None,
            run_state: RunState::Stop,
            processing: StageProcessing::default(),
            timeline: None,
            changed: false,
            intro_range: None,
            outro_range: None,
            switch: Weak::new(),
            transitions: VecDeque::new(),
        }
    }

    /// Stage id.
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    /// Child of the switch node selected on intro.
    pub fn switch_id(&self) -> Option<&str> {
        self.switch_id.as_deref()
    }

    /// Current run state.
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Placement of the run-state step.
    pub fn processing(&self) -> StageProcessing {
        self.processing
    }

    /// Has a timeline bound?
    pub fn has_timeline(&self) -> bool {
        self.timeline.is_some()
    }

    /// The bound timeline.
    pub fn timeline(&self) -> Option<&dyn StageTimeline> {
        self.timeline.as_deref()
    }

    /// The bound timeline, mutably.
    pub fn timeline_mut(&mut self) -> Option<&mut (dyn StageTimeline + 'static)> {
        self.timeline.as_deref_mut()
    }

    /// Is the bound timeline running? False without one.
    pub fn is_timeline_running(&self) -> bool {
        self.timeline.as_ref().is_some_and(|t| t.is_running())
    }

    /// The owning stage processor's switch node, if resolved.
    pub fn switch_node(&self) -> Option<Rc<dyn GraphNode>> {
        self.switch.upgrade().and_then(|slot| slot.borrow().clone())
    }

    /// Set the run state. Fails if unchanged.
    pub fn set_run_state(&mut self, state: RunState) -> bool {
        if state == self.run_state {
            return false;
        }
        let previous = self.run_state;
        self.run_state = state;
        self.changed = true;
        self.transitions.push_back((state, previous));
        debug!(stage = %self.stage_id, from = %previous, to = %state, "run state");
        true
    }

    /// Request the intro. Only allowed while stopped.
    pub fn start_stage_intro(&mut self, range: Option<TimeRange>) -> bool {
        if !self.run_state.is_stopped() {
            warn!(stage = %self.stage_id, state = %self.run_state, "intro refused");
            return false;
        }
        self.intro_range = range;
        self.set_run_state(RunState::BeginIntro)
    }

    /// Request the outro. Refused while stopped.
    pub fn start_stage_outro(&mut self, range: Option<TimeRange>) -> bool {
        if self.run_state.is_stopped() {
            warn!(stage = %self.stage_id, "outro refused, stage stopped");
            return false;
        }
        self.outro_range = range;
        self.set_run_state(RunState::BeginOutro)
    }

    /// Stop the stage and its timeline. Refused while stopped.
    pub fn stop_stage(&mut self) -> bool {
        if self.run_state.is_stopped() {
            return false;
        }
        if let Some(timeline) = self.timeline.as_mut() {
            timeline.stop();
        }
        self.set_run_state(RunState::Stop)
    }

    fn select_switch_child(&self) {
        let Some(child) = self.switch_id.as_deref() else {
            return;
        };
        match self.switch_node() {
            Some(switch) if switch.is_valid() => {
                if !switch.select_child(child) {
                    warn!(stage = %self.stage_id, child, "switch child not selectable");
                }
            }
            _ => debug!(stage = %self.stage_id, "no switch node to select on"),
        }
    }
}

impl std::fmt::Debug for StageControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageControl")
            .field("stage_id", &self.stage_id)
            .field("switch_id", &self.switch_id)
            .field("run_state", &self.run_state)
            .field("processing", &self.processing)
            .field("timeline", &self.timeline.is_some())
            .finish()
    }
}

// =============================================================================
// STAGE LOGIC
// =============================================================================

/// Stage callbacks, one per run state that does work. All default to no-ops.
#[allow(unused_variables)]
pub trait StageLogic {
    /// Entering the intro.
    fn on_process_stage_tick_begin_intro(&mut self, stage: &mut StageControl, ctx: &LogicContext) {}

    /// Every tick of the intro.
    fn on_process_stage_tick_run_intro(&mut self, stage: &mut StageControl, ctx: &LogicContext) {}

    /// Entering the main phase.
    fn on_process_stage_tick_begin_run(&mut self, stage: &mut StageControl, ctx: &LogicContext) {}

    /// Every tick of the main phase.
    fn on_process_stage_tick_run(&mut self, stage: &mut StageControl, ctx: &LogicContext) {}

    /// Entering the outro.
    fn on_process_stage_tick_begin_outro(&mut self, stage: &mut StageControl, ctx: &LogicContext) {}

    /// Every tick of the outro.
    fn on_process_stage_tick_run_outro(&mut self, stage: &mut StageControl, ctx: &LogicContext) {}

    /// The run state changed.
    fn on_run_state_changed(&mut self, stage: &mut StageControl, current: RunState, previous: RunState) {}
}

impl StageLogic for NoopLogic {}

// =============================================================================
// STAGE
// =============================================================================

/// A processor with a run-state machine.
pub struct Stage {
    processor: Processor,
    control: StageControl,
    logic: Box<dyn StageLogic>,
}

impl Stage {
    /// Create a stage without callbacks.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_logic(id, NoopLogic)
    }

    /// Create a stage driven by `logic`.
    pub fn with_logic(id: impl Into<String>, logic: impl StageLogic + 'static) -> Self {
        Self::from_parts(Processor::new(id), logic)
    }

    /// Create a stage around an existing processor; the processor name
    /// becomes the stage id.
    pub fn from_parts(processor: Processor, logic: impl StageLogic + 'static) -> Self {
        let control = StageControl::new(processor.name().to_string());
        Self {
            processor,
            control,
            logic: Box::new(logic),
        }
    }

    /// Select `switch_id` on the switch node when the intro begins.
    pub fn with_switch_id(mut self, switch_id: impl Into<String>) -> Self {
        self.control.switch_id = Some(switch_id.into());
        self
    }

    /// Place the run-state step within the walk.
    pub fn with_processing(mut self, processing: StageProcessing) -> Self {
        self.control.processing = processing;
        self
    }

    /// Bind a timeline.
    pub fn with_timeline(mut self, timeline: Box<dyn StageTimeline>) -> Self {
        self.set_timeline(Some(timeline));
        self
    }

    /// Bind, replace or unbind the timeline.
    ///
    /// The timeline's stepable and node are registered with the embedded
    /// processor; a replaced timeline's are unregistered.
    pub fn set_timeline(&mut self, timeline: Option<Box<dyn StageTimeline>>) -> Option<Box<dyn StageTimeline>> {
        let previous = self.control.timeline.take();
        if let Some(old) = previous.as_ref() {
            if let Some(stepable) = old.stepable() {
                self.processor.remove_stepable(&stepable);
            }
            if let Some(node) = old.node() {
                self.processor.nodes_mut().remove(&node);
            }
        }
        self.control.timeline = timeline;
        self.register_timeline();
        previous
    }

    /// Register the bound timeline's stepable and node. Already registered
    /// members are left alone.
    fn register_timeline(&mut self) {
        let Some(timeline) = self.control.timeline.as_ref() else {
            return;
        };
        if let Some(stepable) = timeline.stepable() {
            self.processor.add_stepable(stepable);
        }
        if let Some(node) = timeline.node() {
            self.processor.add_node(node);
        }
    }

    /// Stage id.
    pub fn id(&self) -> &str {
        self.control.stage_id()
    }

    /// Current run state.
    pub fn run_state(&self) -> RunState {
        self.control.run_state
    }

    /// Run-state data.
    pub fn control(&self) -> &StageControl {
        &self.control
    }

    /// The embedded processor.
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// The embedded processor, mutably.
    pub fn processor_mut(&mut self) -> &mut Processor {
        &mut self.processor
    }

    /// Is the bound timeline running?
    pub fn is_timeline_running(&self) -> bool {
        self.control.is_timeline_running()
    }

    /// Set the run state directly. Fails if unchanged.
    pub fn set_run_state(&mut self, state: RunState) -> bool {
        let ok = self.control.set_run_state(state);
        self.flush_transitions();
        ok
    }

    /// Request the intro. Only allowed while stopped.
    pub fn start_stage_intro(&mut self, range: Option<TimeRange>) -> bool {
        let ok = self.control.start_stage_intro(range);
        self.flush_transitions();
        ok
    }

    /// Request the outro. Refused while stopped.
    pub fn start_stage_outro(&mut self, range: Option<TimeRange>) -> bool {
        let ok = self.control.start_stage_outro(range);
        self.flush_transitions();
        ok
    }

    /// Stop the stage. Refused while stopped.
    pub fn stop_stage(&mut self) -> bool {
        let ok = self.control.stop_stage();
        self.flush_transitions();
        ok
    }

    pub(crate) fn attach_switch(&mut self, slot: &SwitchSlot) {
        self.control.switch = Rc::downgrade(slot);
    }

    fn flush_transitions(&mut self) {
        let mut delivered = 0;
        while let Some((current, previous)) = self.control.transitions.pop_front() {
            if delivered == MAX_CHAINED_TRANSITIONS {
                warn!(stage = %self.control.stage_id, "run state keeps changing, dropping notifications");
                self.control.transitions.clear();
                break;
            }
            self.logic.on_run_state_changed(&mut self.control, current, previous);
            delivered += 1;
        }
    }

    /// Advance to `next` unless a callback changed the state this step.
    fn advance_unless_changed(&mut self, next: RunState) {
        if !self.control.changed {
            self.control.set_run_state(next);
            self.flush_transitions();
        }
    }

    /// One step of the run-state machine.
    fn step_run_state(&mut self, ctx: &LogicContext) {
        self.control.changed = false;

        match self.control.run_state {
            RunState::Stop => {}
            RunState::BeginIntro => {
                self.control.select_switch_child();
                let range = self.control.intro_range.take();
                if let Some(timeline) = self.control.timeline.as_mut() {
                    if !timeline.start_intro(range) {
                        warn!(stage = %self.control.stage_id, "intro timeline did not start");
                    }
                }
                self.logic.on_process_stage_tick_begin_intro(&mut self.control, ctx);
                self.flush_transitions();
                self.advance_unless_changed(RunState::RunIntro);
            }
            RunState::RunIntro => {
                self.logic.on_process_stage_tick_run_intro(&mut self.control, ctx);
                self.flush_transitions();
                if self.control.has_timeline() && !self.control.is_timeline_running() {
                    self.advance_unless_changed(RunState::BeginRun);
                }
            }
            RunState::BeginRun => {
                self.logic.on_process_stage_tick_begin_run(&mut self.control, ctx);
                self.flush_transitions();
                self.advance_unless_changed(RunState::Run);
            }
            RunState::Run => {
                self.logic.on_process_stage_tick_run(&mut self.control, ctx);
                self.flush_transitions();
            }
            RunState::BeginOutro => {
                let range = self.control.outro_range.take();
                if let Some(timeline) = self.control.timeline.as_mut() {
                    if !timeline.start_outro(range) {
                        warn!(stage = %self.control.stage_id, "outro timeline did not start");
                    }
                }
                self.logic.on_process_stage_tick_begin_outro(&mut self.control, ctx);
                self.flush_transitions();
                self.advance_unless_changed(RunState::RunOutro);
            }
            RunState::RunOutro => {
                self.logic.on_process_stage_tick_run_outro(&mut self.control, ctx);
                self.flush_transitions();
                if self.control.has_timeline() && !self.control.is_timeline_running() {
                    self.advance_unless_changed(RunState::Stop);
                }
            }
        }
    }
}

impl LogicNode for Stage {
    fn name(&self) -> &str {
        self.processor.name()
    }

    fn init(&mut self, ctx: &LogicContext) -> bool {
        // A previous deinit released the timeline node.
        self.register_timeline();
        self.processor.init(ctx)
    }

    fn deinit(&mut self, ctx: &LogicContext) -> bool {
        if let Some(timeline) = self.control.timeline.as_mut() {
            timeline.stop();
        }
        self.control.set_run_state(RunState::Stop);
        self.flush_transitions();
        self.processor.deinit(ctx)
    }

    fn is_initialized(&self) -> bool {
        self.processor.is_initialized()
    }

    fn is_deinitialized(&self) -> bool {
        self.processor.is_deinitialized()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.processor.set_enabled(enabled);
    }

    fn is_enabled(&self) -> bool {
        self.processor.is_enabled()
    }

    fn process_tick(&mut self, ctx: &LogicContext) {
        if !self.processor.is_enabled() {
            return;
        }
        let pass = Pass::ProcessTick;
        match self.control.processing {
            StageProcessing::BeforeStep => {
                self.step_run_state(ctx);
                self.processor.pass_stepables(pass, ctx);
                self.processor.pass_self(pass, ctx);
                self.processor.pass_children(pass, ctx);
            }
            StageProcessing::BeforeChildren => {
                self.processor.pass_stepables(pass, ctx);
                self.processor.pass_self(pass, ctx);
                self.step_run_state(ctx);
                self.processor.pass_children(pass, ctx);
            }
            StageProcessing::AfterChildren => {
                self.processor.pass_stepables(pass, ctx);
                self.processor.pass_self(pass, ctx);
                self.processor.pass_children(pass, ctx);
                self.step_run_state(ctx);
            }
        }
        self.processor.pass_children_done(pass, ctx);
    }

    fn process_frame(&mut self, ctx: &LogicContext) {
        self.processor.run_pass(Pass::ProcessFrame, ctx);
    }

    fn finish_tick(&mut self, ctx: &LogicContext) {
        self.processor.run_pass(Pass::FinishTick, ctx);
    }

    fn finish_frame(&mut self, ctx: &LogicContext) {
        self.processor.run_pass(Pass::FinishFrame, ctx);
    }

    fn package_notice(&mut self, ctx: &LogicContext, event: PackageEvent, package: &Package) -> bool {
        self.processor.package_notice(ctx, event, package)
    }

    fn run_state_changed(&mut self, ctx: &LogicContext, current: AppRunState, previous: AppRunState) {
        self.processor.run_state_changed(ctx, current, previous);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("control", &self.control)
            .field("processor", &self.processor)
            .finish()
    }
}
