//! Stage Processor
//!
//! A processor owning a registry of stages keyed by id. Stages tick after
//! the processor's generic children. An optional switch node is resolved
//! from the graph once per init and shared with every stage, which selects
//! its own child of it when its intro begins.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::context::LogicContext;
use crate::core::graph::GraphNode;
use crate::logic::notice::{AppRunState, Package, PackageEvent};
use crate::logic::processor::{LogicNode, Pass, Processor, ProcessorLogic};
use crate::runtime::config::{ConfigError, StageProcessorSetup};
use crate::stage::run_state::RunState;
use crate::stage::stage::{Stage, SwitchSlot};
use crate::stage::stage_timeline::TimeRange;

/// Stage registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// A stage with this id is already registered.
    #[error("stage {0} already registered")]
    DuplicateStage(String),

    /// No stage with this id.
    #[error("unknown stage {0}")]
    UnknownStage(String),

    /// The stage failed to initialize and was unwound.
    #[error("stage {0} failed to initialize")]
    InitFailed(String),
}

/// A processor managing stages.
pub struct StageProcessor {
    processor: Processor,
    stages: Vec<Stage>,
    switch_node_id: Option<String>,
    switch: SwitchSlot,
}

impl StageProcessor {
    /// Create a stage processor without callbacks.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_processor(Processor::new(name))
    }

    /// Create a stage processor driven by `logic`.
    pub fn with_logic(name: impl Into<String>, logic: impl ProcessorLogic + 'static) -> Self {
        Self::from_processor(Processor::with_logic(name, logic))
    }

    /// Wrap an existing processor.
    pub fn from_processor(processor: Processor) -> Self {
        Self {
            processor,
            stages: Vec::new(),
            switch_node_id: None,
            switch: Rc::new(RefCell::new(None)),
        }
    }

    /// Resolve `id` as the switch node on init.
    pub fn with_switch_node(mut self, id: impl Into<String>) -> Self {
        self.switch_node_id = Some(id.into());
        self
    }

    /// Build a stage processor from a validated setup document.
    pub fn from_setup(setup: &StageProcessorSetup) -> Result<Self, ConfigError> {
        setup.validate()?;
        let mut processor = Self::new(setup.name.clone());
        processor.switch_node_id = setup.switch_node_id.clone();
        for stage in &setup.stages {
            processor.add_stage(stage.build()?)?;
        }
        info!(
            processor = %setup.name,
            stages = processor.stages.len(),
            "stage processor built from setup"
        );
        Ok(processor)
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Register a stage. Fails on a duplicate id.
    pub fn add_stage(&mut self, mut stage: Stage) -> Result<(), StageError> {
        if self.index_of(stage.id()).is_some() {
            return Err(StageError::DuplicateStage(stage.id().to_string()));
        }
        stage.attach_switch(&self.switch);
        self.stages.push(stage);
        Ok(())
    }

    /// Initialize a stage and register it (after this processor's init).
    pub fn init_add_stage(&mut self, mut stage: Stage, ctx: &LogicContext) -> Result<(), StageError> {
        if self.index_of(stage.id()).is_some() {
            return Err(StageError::DuplicateStage(stage.id().to_string()));
        }
        stage.attach_switch(&self.switch);
        if !stage.init(ctx) {
            stage.deinit(ctx);
            return Err(StageError::InitFailed(stage.id().to_string()));
        }
        self.stages.push(stage);
        Ok(())
    }

    /// Unregister a stage without deinitializing it.
    pub fn remove_stage(&mut self, id: &str) -> Result<Stage, StageError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| StageError::UnknownStage(id.to_string()))?;
        Ok(self.stages.remove(index))
    }

    /// Unregister a stage and deinitialize it.
    pub fn remove_deinit_stage(&mut self, id: &str, ctx: &LogicContext) -> Result<bool, StageError> {
        let mut stage = self.remove_stage(id)?;
        Ok(stage.deinit(ctx))
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id() == id)
    }

    /// Stage by id.
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id() == id)
    }

    /// Mutable stage by id.
    pub fn stage_mut(&mut self, id: &str) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.id() == id)
    }

    /// Stages in tick order.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    /// Number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// The embedded processor.
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// The embedded processor, mutably.
    pub fn processor_mut(&mut self) -> &mut Processor {
        &mut self.processor
    }

    /// The resolved switch node.
    pub fn switch_node(&self) -> Option<Rc<dyn GraphNode>> {
        self.switch.borrow().clone()
    }

    // =========================================================================
    // Run-state control
    // =========================================================================

    /// Set a stage's run state. Fails on unknown id or unchanged state.
    pub fn set_stage_run_state(&mut self, id: &str, state: RunState) -> bool {
        self.with_stage(id, |stage| stage.set_run_state(state))
    }

    /// Start a stage's intro, optionally over `range`.
    pub fn start_intro(&mut self, id: &str, range: Option<TimeRange>) -> bool {
        self.with_stage(id, |stage| stage.start_stage_intro(range))
    }

    /// Start a stage's outro, optionally over `range`.
    pub fn start_outro(&mut self, id: &str, range: Option<TimeRange>) -> bool {
        self.with_stage(id, |stage| stage.start_stage_outro(range))
    }

    /// Stop a stage.
    pub fn stop_stage(&mut self, id: &str) -> bool {
        self.with_stage(id, |stage| stage.stop_stage())
    }

    /// Is any stage's timeline running?
    pub fn is_any_timeline_running(&self) -> bool {
        self.stages.iter().any(|s| s.is_timeline_running())
    }

    fn with_stage(&mut self, id: &str, f: impl FnOnce(&mut Stage) -> bool) -> bool {
        match self.stage_mut(id) {
            Some(stage) => f(stage),
            None => {
                warn!(stage = id, "unknown stage");
                false
            }
        }
    }

    fn resolve_switch(&mut self, ctx: &LogicContext) -> bool {
        let Some(id) = self.switch_node_id.as_deref() else {
            return true;
        };
        let Some(node) = ctx.graph().and_then(|graph| graph.find_node(id)) else {
            warn!(switch = id, "switch node not found");
            return false;
        };
        self.processor.add_node(node.clone());
        *self.switch.borrow_mut() = Some(node);
        debug!(switch = id, "switch node resolved");
        true
    }

    fn run_stage_pass(&mut self, pass: Pass, ctx: &LogicContext) {
        if !self.processor.is_enabled() {
            return;
        }
        self.processor.pass_stepables(pass, ctx);
        self.processor.pass_self(pass, ctx);
        self.processor.pass_children(pass, ctx);
        for stage in self.stages.iter_mut() {
            match pass {
                Pass::ProcessTick => stage.process_tick(ctx),
                Pass::ProcessFrame => stage.process_frame(ctx),
                Pass::FinishTick => stage.finish_tick(ctx),
                Pass::FinishFrame => stage.finish_frame(ctx),
            }
        }
        self.processor.pass_children_done(pass, ctx);
    }
}

impl LogicNode for StageProcessor {
    fn name(&self) -> &str {
        self.processor.name()
    }

    fn init(&mut self, ctx: &LogicContext) -> bool {
        if self.processor.is_initialized() {
            warn!(processor = self.processor.name(), "already initialized");
            return false;
        }
        if !self.resolve_switch(ctx) || !self.processor.begin_init(ctx) {
            return false;
        }
        for stage in self.stages.iter_mut() {
            if !stage.init(ctx) {
                warn!(stage = stage.id(), "stage failed to initialize");
                return false;
            }
        }
        self.processor.complete_init()
    }

    fn deinit(&mut self, ctx: &LogicContext) -> bool {
        let mut ok = true;
        for stage in self.stages.iter_mut().rev() {
            ok &= stage.deinit(ctx);
        }
        ok &= self.processor.deinit(ctx);
        *self.switch.borrow_mut() = None;
        ok
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
        self.run_stage_pass(Pass::ProcessTick, ctx);
    }

    fn process_frame(&mut self, ctx: &LogicContext) {
        self.run_stage_pass(Pass::ProcessFrame, ctx);
    }

    fn finish_tick(&mut self, ctx: &LogicContext) {
        self.run_stage_pass(Pass::FinishTick, ctx);
    }

    fn finish_frame(&mut self, ctx: &LogicContext) {
        self.run_stage_pass(Pass::FinishFrame, ctx);
    }

    fn package_notice(&mut self, ctx: &LogicContext, event: PackageEvent, package: &Package) -> bool {
        let mut ok = self.processor.package_notice(ctx, event, package);
        for stage in self.stages.iter_mut() {
            ok &= stage.package_notice(ctx, event, package);
        }
        ok
    }

    fn run_state_changed(&mut self, ctx: &LogicContext, current: AppRunState, previous: AppRunState) {
        self.processor.run_state_changed(ctx, current, previous);
        for stage in self.stages.iter_mut() {
            stage.run_state_changed(ctx, current, previous);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl std::fmt::Debug for StageProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageProcessor")
            .field("processor", &self.processor)
            .field("stages", &self.stages)
            .field("switch_node_id", &self.switch_node_id)
            .finish()
    }
}
