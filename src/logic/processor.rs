//! Processor Tree
//!
//! The backbone of the logic system. A processor combines a stepable
//! observer, a node observer, child nodes and a set of callbacks, and walks
//! them in a fixed order on every entry point.
//!
//! ## Tick Order
//!
//! ```text
//! ProcessTick:  stepables -> on_process_tick -> children -> on_process_tick_children
//! ProcessFrame:              on_process_frame -> children -> on_process_frame_children
//! FinishTick:   stepables -> on_finish_tick  -> children -> on_finish_tick_children
//! FinishFrame:               on_finish_frame -> children -> on_finish_frame_children
//! ```
//!
//! The order is load-bearing: a stage's timeline stepable must advance before
//! the stage callbacks read it.
//!
//! ## Lifecycle
//!
//! `init` runs `on_init`, then every child in order, then resets the
//! stepables and checks node validity. If any step fails the processor is
//! left neither initialized nor deinitialized and the caller is expected to
//! call `deinit` to unwind. `deinit` walks children (last to first) before
//! the processor's own `on_deinit`.

use std::any::Any;

use tracing::{debug, warn};
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::core::context::LogicContext;
use crate::logic::node_observer::{NodeObserver, NodeRef};
use crate::logic::notice::{AppRunState, Package, PackageEvent};
use crate::logic::observer::StepableObserver;
use crate::logic::stepable::{NoopLogic, StepableRef};

// =============================================================================
// LOGIC NODE
// =============================================================================

/// The tick protocol every node of the logic tree speaks.
pub trait LogicNode: Any {
    /// Node name, unique among its siblings.
    fn name(&self) -> &str;

    /// Initialize the node and its subtree.
    fn init(&mut self, ctx: &LogicContext) -> bool;

    /// Deinitialize the node and its subtree.
    fn deinit(&mut self, ctx: &LogicContext) -> bool;

    /// Did `init` complete?
    fn is_initialized(&self) -> bool;

    /// Did `deinit` run?
    fn is_deinitialized(&self) -> bool;

    /// Enable or disable ticking. Always notifies, even if unchanged.
    fn set_enabled(&mut self, enabled: bool);

    /// Is the node enabled?
    fn is_enabled(&self) -> bool;

    /// Logic tick.
    fn process_tick(&mut self, ctx: &LogicContext);

    /// Render frame.
    fn process_frame(&mut self, ctx: &LogicContext);

    /// End of logic tick.
    fn finish_tick(&mut self, ctx: &LogicContext);

    /// End of render frame.
    fn finish_frame(&mut self, ctx: &LogicContext);

    /// Package lifecycle notification. Not gated by the enabled flag.
    fn package_notice(&mut self, ctx: &LogicContext, event: PackageEvent, package: &Package) -> bool;

    /// Application run-state change. Not gated by the enabled flag.
    fn run_state_changed(&mut self, ctx: &LogicContext, current: AppRunState, previous: AppRunState);

    /// Upcast for typed lookup.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed lookup.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// A package is about to be loaded.
    fn package_will_be_loaded(&mut self, ctx: &LogicContext, package: &Package) -> bool {
        self.package_notice(ctx, PackageEvent::WillBeLoaded, package)
    }

    /// A package was loaded.
    fn package_was_loaded(&mut self, ctx: &LogicContext, package: &Package) -> bool {
        self.package_notice(ctx, PackageEvent::WasLoaded, package)
    }

    /// A package failed to load.
    fn package_failed_loading(&mut self, ctx: &LogicContext, package: &Package) -> bool {
        self.package_notice(ctx, PackageEvent::FailedLoading, package)
    }

    /// A package is about to be unloaded.
    fn package_will_be_unloaded(&mut self, ctx: &LogicContext, package: &Package) -> bool {
        self.package_notice(ctx, PackageEvent::WillBeUnloaded, package)
    }

    /// A package was unloaded.
    fn package_was_unloaded(&mut self, ctx: &LogicContext, package: &Package) -> bool {
        self.package_notice(ctx, PackageEvent::WasUnloaded, package)
    }

    /// A package failed to unload.
    fn package_failed_unloading(&mut self, ctx: &LogicContext, package: &Package) -> bool {
        self.package_notice(ctx, PackageEvent::FailedUnloading, package)
    }
}

// =============================================================================
// CHILDREN
// =============================================================================

/// Ordered children of a processor, keyed by name.
#[derive(Default)]
pub struct Children {
    nodes: Vec<Box<dyn LogicNode>>,
}

impl Children {
    /// Append a child. Fails if a sibling has the same name.
    pub fn add(&mut self, child: Box<dyn LogicNode>) -> bool {
        if self.index_of(child.name()).is_some() {
            warn!(child = child.name(), "duplicate child name");
            return false;
        }
        self.nodes.push(child);
        true
    }

    /// Initialize a child and append it. On failure the child is unwound
    /// with `deinit` and dropped.
    pub fn init_add(&mut self, mut child: Box<dyn LogicNode>, ctx: &LogicContext) -> bool {
        if self.index_of(child.name()).is_some() {
            warn!(child = child.name(), "duplicate child name");
            return false;
        }
        if !child.init(ctx) {
            warn!(child = child.name(), "child failed to initialize");
            child.deinit(ctx);
            return false;
        }
        self.nodes.push(child);
        true
    }

    /// Detach a child by name.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn LogicNode>> {
        let index = self.index_of(name)?;
        Some(self.nodes.remove(index))
    }

    /// Detach the child at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<Box<dyn LogicNode>> {
        if index >= self.nodes.len() {
            return None;
        }
        Some(self.nodes.remove(index))
    }

    /// Detach a child by name and deinitialize it.
    pub fn remove_deinit(&mut self, name: &str, ctx: &LogicContext) -> bool {
        match self.remove(name) {
            Some(mut child) => child.deinit(ctx),
            None => false,
        }
    }

    /// Position of a child.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|c| c.name() == name)
    }

    /// Child by name.
    pub fn get(&self, name: &str) -> Option<&dyn LogicNode> {
        self.nodes.iter().find(|c| c.name() == name).map(|c| c.as_ref())
    }

    /// Mutable child by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn LogicNode + 'static)> {
        self.nodes
            .iter_mut()
            .find(|c| c.name() == name)
            .map(|c| c.as_mut())
    }

    /// Child by name, downcast to its concrete type.
    pub fn get_as<T: LogicNode>(&self, name: &str) -> Option<&T> {
        self.get(name)?.as_any().downcast_ref::<T>()
    }

    /// Mutable child by name, downcast to its concrete type.
    pub fn get_as_mut<T: LogicNode>(&mut self, name: &str) -> Option<&mut T> {
        self.get_mut(name)?.as_any_mut().downcast_mut::<T>()
    }

    /// Iterate in tick order.
    pub fn iter(&self) -> impl Iterator<Item = &Box<dyn LogicNode>> {
        self.nodes.iter()
    }

    /// Iterate mutably in tick order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn LogicNode>> {
        self.nodes.iter_mut()
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// No children?
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// =============================================================================
// PROCESSOR LOGIC
// =============================================================================

/// Mutable view of a processor's members handed to its callbacks.
///
/// Callbacks never run while the children are being walked, so they may
/// freely add, remove or reach into children.
pub struct ProcessorScope<'a> {
    /// The processor's stepables
    pub stepables: &'a mut StepableObserver,
    /// The processor's node references
    pub nodes: &'a mut NodeObserver,
    /// The processor's children
    pub children: &'a mut Children,
}

/// Processor callbacks. Every method defaults to a no-op that succeeds.
#[allow(unused_variables)]
pub trait ProcessorLogic {
    /// Called first during `init`. Returning false fails the init.
    fn on_init(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) -> bool {
        true
    }

    /// Called during `deinit`, after the children.
    fn on_deinit(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) -> bool {
        true
    }

    /// Called by every `set_enabled`.
    fn on_set_enabled(&mut self, scope: &mut ProcessorScope<'_>, enabled: bool) {}

    /// Tick, after the stepables and before the children.
    fn on_process_tick(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {}

    /// Tick, after the children.
    fn on_process_tick_children(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {}

    /// Frame, before the children.
    fn on_process_frame(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {}

    /// Frame, after the children.
    fn on_process_frame_children(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {}

    /// Finish tick, after the stepables and before the children.
    fn on_finish_tick(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {}

    /// Finish tick, after the children.
    fn on_finish_tick_children(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {}

    /// Finish frame, before the children.
    fn on_finish_frame(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {}

    /// Finish frame, after the children.
    fn on_finish_frame_children(&mut self, scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {}

    /// Package lifecycle notification, before the children see it.
    fn on_package_notice(
        &mut self,
        scope: &mut ProcessorScope<'_>,
        ctx: &LogicContext,
        event: PackageEvent,
        package: &Package,
    ) -> bool {
        true
    }

    /// Application run-state change, before the children see it.
    fn on_run_state_changed(
        &mut self,
        scope: &mut ProcessorScope<'_>,
        ctx: &LogicContext,
        current: AppRunState,
        previous: AppRunState,
    ) {
    }
}

impl ProcessorLogic for NoopLogic {}

// =============================================================================
// PROCESSOR
// =============================================================================

/// Which entry point a walk belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Pass {
    ProcessTick,
    ProcessFrame,
    FinishTick,
    FinishFrame,
}

/// A node of the logic tree.
pub struct Processor {
    name: String,
    enabled: bool,
    initialized: bool,
    deinitialized: bool,
    children: Children,
    stepables: StepableObserver,
    nodes: NodeObserver,
    logic: Box<dyn ProcessorLogic>,
}

impl Processor {
    /// Create a processor without callbacks.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_logic(name, NoopLogic)
    }

    /// Create a processor driven by `logic`.
    pub fn with_logic(name: impl Into<String>, logic: impl ProcessorLogic + 'static) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            initialized: false,
            deinitialized: false,
            children: Children::default(),
            stepables: StepableObserver::new(),
            nodes: NodeObserver::new(),
            logic: Box::new(logic),
        }
    }

    /// Register a stepable. Fails on duplicates.
    pub fn add_stepable(&mut self, stepable: StepableRef) -> bool {
        self.stepables.add(stepable)
    }

    /// Unregister a stepable. Fails if absent.
    pub fn remove_stepable(&mut self, stepable: &StepableRef) -> bool {
        self.stepables.remove(stepable)
    }

    /// Track a node reference. Fails on duplicates.
    pub fn add_node(&mut self, node: NodeRef) -> bool {
        self.nodes.add(node)
    }

    /// Append a child without initializing it.
    pub fn add_child(&mut self, child: Box<dyn LogicNode>) -> bool {
        self.children.add(child)
    }

    /// Detach a child without deinitializing it.
    pub fn remove_child(&mut self, name: &str) -> Option<Box<dyn LogicNode>> {
        self.children.remove(name)
    }

    /// Initialize a child and append it (after this processor's init).
    pub fn init_add_child(&mut self, child: Box<dyn LogicNode>, ctx: &LogicContext) -> bool {
        self.children.init_add(child, ctx)
    }

    /// Detach a child and deinitialize it (before this processor's deinit).
    pub fn remove_deinit_child(&mut self, name: &str, ctx: &LogicContext) -> bool {
        self.children.remove_deinit(name, ctx)
    }

    /// The stepables.
    pub fn stepables(&self) -> &StepableObserver {
        &self.stepables
    }

    /// The node references.
    pub fn nodes(&self) -> &NodeObserver {
        &self.nodes
    }

    /// The node references, mutably.
    pub fn nodes_mut(&mut self) -> &mut NodeObserver {
        &mut self.nodes
    }

    /// The children.
    pub fn children(&self) -> &Children {
        &self.children
    }

    /// The children, mutably.
    pub fn children_mut(&mut self) -> &mut Children {
        &mut self.children
    }

    fn split(&mut self) -> (&mut dyn ProcessorLogic, ProcessorScope<'_>) {
        (
            self.logic.as_mut(),
            ProcessorScope {
                stepables: &mut self.stepables,
                nodes: &mut self.nodes,
                children: &mut self.children,
            },
        )
    }

    /// First half of `init`: own callback, then children.
    pub(crate) fn begin_init(&mut self, ctx: &LogicContext) -> bool {
        if self.initialized {
            warn!(processor = %self.name, "already initialized");
            return false;
        }
        self.deinitialized = false;

        let (logic, mut scope) = self.split();
        if !logic.on_init(&mut scope, ctx) {
            warn!(processor = %self.name, "on_init failed");
            return false;
        }

        for child in self.children.iter_mut() {
            if !child.init(ctx) {
                warn!(processor = %self.name, child = child.name(), "child failed to initialize");
                return false;
            }
        }
        true
    }

    /// Second half of `init`: reset stepables, check node references.
    pub(crate) fn complete_init(&mut self) -> bool {
        self.stepables.reset();

        if !self.nodes.are_valid() {
            warn!(processor = %self.name, "node references invalid after init");
            return false;
        }

        self.initialized = true;
        debug!(processor = %self.name, "initialized");
        true
    }

    /// Stepable part of a walk.
    pub(crate) fn pass_stepables(&mut self, pass: Pass, ctx: &LogicContext) {
        match pass {
            Pass::ProcessTick => self.stepables.process_tick(ctx),
            Pass::FinishTick => self.stepables.finish_tick(ctx),
            Pass::ProcessFrame | Pass::FinishFrame => {}
        }
    }

    /// Own callback part of a walk.
    pub(crate) fn pass_self(&mut self, pass: Pass, ctx: &LogicContext) {
        let (logic, mut scope) = self.split();
        match pass {
            Pass::ProcessTick => logic.on_process_tick(&mut scope, ctx),
            Pass::ProcessFrame => logic.on_process_frame(&mut scope, ctx),
            Pass::FinishTick => logic.on_finish_tick(&mut scope, ctx),
            Pass::FinishFrame => logic.on_finish_frame(&mut scope, ctx),
        }
    }

    /// Children part of a walk.
    pub(crate) fn pass_children(&mut self, pass: Pass, ctx: &LogicContext) {
        for child in self.children.iter_mut() {
            match pass {
                Pass::ProcessTick => child.process_tick(ctx),
                Pass::ProcessFrame => child.process_frame(ctx),
                Pass::FinishTick => child.finish_tick(ctx),
                Pass::FinishFrame => child.finish_frame(ctx),
            }
        }
    }

    /// Own "children done" callback part of a walk.
    pub(crate) fn pass_children_done(&mut self, pass: Pass, ctx: &LogicContext) {
        let (logic, mut scope) = self.split();
        match pass {
            Pass::ProcessTick => logic.on_process_tick_children(&mut scope, ctx),
            Pass::ProcessFrame => logic.on_process_frame_children(&mut scope, ctx),
            Pass::FinishTick => logic.on_finish_tick_children(&mut scope, ctx),
            Pass::FinishFrame => logic.on_finish_frame_children(&mut scope, ctx),
        }
    }

    /// A complete walk.
    pub(crate) fn run_pass(&mut self, pass: Pass, ctx: &LogicContext) {
        if !self.enabled {
            return;
        }
        #[cfg(feature = "debug-tracing")]
        trace!(processor = %self.name, ?pass, tick = ctx.tick, "walk");

        self.pass_stepables(pass, ctx);
        self.pass_self(pass, ctx);
        self.pass_children(pass, ctx);
        self.pass_children_done(pass, ctx);
    }
}

impl LogicNode for Processor {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &LogicContext) -> bool {
        self.begin_init(ctx) && self.complete_init()
    }

    fn deinit(&mut self, ctx: &LogicContext) -> bool {
        let mut ok = true;

        // 1. Children, last to first
        for child in self.children.nodes.iter_mut().rev() {
            ok &= child.deinit(ctx);
        }

        // 2. Own callback
        let (logic, mut scope) = self.split();
        if !logic.on_deinit(&mut scope, ctx) {
            warn!(processor = %self.name, "on_deinit failed");
            ok = false;
        }

        // 3. Release node references
        ok &= self.nodes.remove_all();

        self.initialized = false;
        self.deinitialized = true;
        debug!(processor = %self.name, ok, "deinitialized");
        ok
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn is_deinitialized(&self) -> bool {
        self.deinitialized
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.stepables.set_enabled(enabled);
        let (logic, mut scope) = self.split();
        logic.on_set_enabled(&mut scope, enabled);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn process_tick(&mut self, ctx: &LogicContext) {
        self.run_pass(Pass::ProcessTick, ctx);
    }

    fn process_frame(&mut self, ctx: &LogicContext) {
        self.run_pass(Pass::ProcessFrame, ctx);
    }

    fn finish_tick(&mut self, ctx: &LogicContext) {
        self.run_pass(Pass::FinishTick, ctx);
    }

    fn finish_frame(&mut self, ctx: &LogicContext) {
        self.run_pass(Pass::FinishFrame, ctx);
    }

    fn package_notice(&mut self, ctx: &LogicContext, event: PackageEvent, package: &Package) -> bool {
        let (logic, mut scope) = self.split();
        let mut ok = logic.on_package_notice(&mut scope, ctx, event, package);
        for child in self.children.iter_mut() {
            ok &= child.package_notice(ctx, event, package);
        }
        ok
    }

    fn run_state_changed(&mut self, ctx: &LogicContext, current: AppRunState, previous: AppRunState) {
        let (logic, mut scope) = self.split();
        logic.on_run_state_changed(&mut scope, ctx, current, previous);
        for child in self.children.iter_mut() {
            child.run_state_changed(ctx, current, previous);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("initialized", &self.initialized)
            .field("deinitialized", &self.deinitialized)
            .field("children", &self.children.len())
            .field("stepables", &self.stepables)
            .field("nodes", &self.nodes)
            .finish()
    }
}
