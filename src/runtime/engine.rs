//! Logic Engine
//!
//! Fixed-step driver for a logic tree. Frame time is accumulated and
//! spent in whole ticks:
//!
//! ```text
//! advance(frame_delta):
//!     while accumulated >= tick_duration (at most max_ticks_per_frame):
//!         deliver queued package notices
//!         ProcessTick, FinishTick
//!     ProcessFrame, FinishFrame
//! ```
//!
//! Package notices from the loader are queued and delivered at the start
//! of the next tick, so the tree only ever sees them between ticks.

use std::any::Any;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::core::context::LogicContext;
use crate::core::graph::GraphRoot;
use crate::logic::notice::{AppRunState, PackageNotice};
use crate::logic::processor::LogicNode;
use crate::runtime::config::{ConfigError, EngineConfig};

/// Fixed-step driver owning the root of a logic tree.
pub struct LogicEngine {
    config: EngineConfig,
    root: Box<dyn LogicNode>,
    ctx: LogicContext,
    accumulator: f64,
    notices: VecDeque<PackageNotice>,
    run_state: AppRunState,
    initialized: bool,
}

impl LogicEngine {
    /// Create a driver for `root`.
    pub fn new(config: EngineConfig, root: Box<dyn LogicNode>) -> Result<Self, ConfigError> {
        config.validate()?;
        let ctx = LogicContext::new(config.tick_duration());
        Ok(Self {
            config,
            root,
            ctx,
            accumulator: 0.0,
            notices: VecDeque::new(),
            run_state: AppRunState::Undefined,
            initialized: false,
        })
    }

    /// Attach a graph root to the context.
    pub fn with_graph(mut self, graph: Rc<dyn GraphRoot>) -> Self {
        self.ctx = self.ctx.with_graph(graph);
        self
    }

    /// Attach a device handler to the context.
    pub fn with_devices(mut self, devices: Rc<dyn Any>) -> Self {
        self.ctx = self.ctx.with_devices(devices);
        self
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initialize the tree. A failed init is unwound with `deinit`.
    pub fn init(&mut self) -> bool {
        if self.initialized {
            warn!("engine already initialized");
            return false;
        }
        self.set_run_state(AppRunState::Initializing);
        if !self.root.init(&self.ctx) {
            warn!(root = self.root.name(), "logic tree failed to initialize, unwinding");
            self.root.deinit(&self.ctx);
            return false;
        }
        self.initialized = true;
        self.set_run_state(AppRunState::Running);
        info!(
            root = self.root.name(),
            tick_rate = self.config.tick_rate,
            "logic engine initialized"
        );
        true
    }

    /// Deinitialize the tree. Undelivered notices are dropped.
    pub fn deinit(&mut self) -> bool {
        if !self.initialized {
            return false;
        }
        self.set_run_state(AppRunState::Terminating);
        if !self.notices.is_empty() {
            debug!(dropped = self.notices.len(), "dropping undelivered package notices");
            self.notices.clear();
        }
        let ok = self.root.deinit(&self.ctx);
        self.initialized = false;
        info!(ok, ticks = self.ctx.tick, frames = self.ctx.frame, "logic engine deinitialized");
        ok
    }

    /// Is the tree initialized?
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // =========================================================================
    // Driving
    // =========================================================================

    /// Run the ticks `frame_delta` seconds pay for, then one frame.
    /// Returns the number of ticks run.
    pub fn advance(&mut self, frame_delta: f64) -> u32 {
        if !self.initialized {
            warn!("advance before init");
            return 0;
        }
        if frame_delta.is_finite() && frame_delta > 0.0 {
            self.accumulator += frame_delta;
        }

        let tick_duration = self.ctx.tick_duration;
        let mut ticks = 0;
        while self.accumulator >= tick_duration && ticks < self.config.max_ticks_per_frame {
            self.tick();
            self.accumulator -= tick_duration;
            ticks += 1;
        }
        if self.accumulator >= tick_duration {
            let dropped = (self.accumulator / tick_duration).floor();
            debug!(dropped, "tick budget exhausted, dropping time");
            self.accumulator %= tick_duration;
        }

        self.root.process_frame(&self.ctx);
        self.root.finish_frame(&self.ctx);
        self.ctx.frame += 1;
        ticks
    }

    /// Run exactly one tick, delivering queued notices first.
    pub fn tick(&mut self) {
        self.deliver_notices();
        self.root.process_tick(&self.ctx);
        self.root.finish_tick(&self.ctx);
        self.ctx.tick += 1;
        self.ctx.time += self.ctx.tick_duration;
    }

    fn deliver_notices(&mut self) {
        while let Some(notice) = self.notices.pop_front() {
            let ok = self
                .root
                .package_notice(&self.ctx, notice.event, &notice.package);
            if !ok {
                warn!(package = %notice.package.name, event = ?notice.event, "package notice not handled");
            }
        }
    }

    /// Queue a package notice for the next tick.
    pub fn queue_notice(&mut self, notice: PackageNotice) {
        debug!(package = %notice.package.name, event = ?notice.event, "package notice queued");
        self.notices.push_back(notice);
    }

    /// Notices waiting for the next tick.
    pub fn pending_notices(&self) -> usize {
        self.notices.len()
    }

    /// Change the application run state and notify the tree.
    /// Fails if unchanged.
    pub fn set_run_state(&mut self, state: AppRunState) -> bool {
        if state == self.run_state {
            return false;
        }
        let previous = self.run_state;
        self.run_state = state;
        debug!(from = %previous, to = %state, "application run state");
        self.root.run_state_changed(&self.ctx, state, previous);
        true
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current application run state.
    pub fn run_state(&self) -> AppRunState {
        self.run_state
    }

    /// The driver configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The context handed to the tree.
    pub fn context(&self) -> &LogicContext {
        &self.ctx
    }

    /// The root node.
    pub fn root(&self) -> &dyn LogicNode {
        self.root.as_ref()
    }

    /// The root node, mutably.
    pub fn root_mut(&mut self) -> &mut dyn LogicNode {
        self.root.as_mut()
    }

    /// The root node, downcast to its concrete type.
    pub fn root_as<T: LogicNode>(&self) -> Option<&T> {
        self.root.as_any().downcast_ref::<T>()
    }

    /// The root node, mutably downcast to its concrete type.
    pub fn root_as_mut<T: LogicNode>(&mut self) -> Option<&mut T> {
        self.root.as_any_mut().downcast_mut::<T>()
    }
}

impl std::fmt::Debug for LogicEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicEngine")
            .field("config", &self.config)
            .field("root", &self.root.name())
            .field("ctx", &self.ctx)
            .field("accumulator", &self.accumulator)
            .field("notices", &self.notices.len())
            .field("run_state", &self.run_state)
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::core::memory::MemoryNode;
    use crate::logic::notice::{Package, PackageEvent};
    use crate::logic::processor::{Processor, ProcessorLogic, ProcessorScope};

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        log: Log,
    }

    impl Recorder {
        fn push(&self, what: String) {
            self.log.borrow_mut().push(what);
        }
    }

    impl ProcessorLogic for Recorder {
        fn on_process_tick(&mut self, _scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {
            self.push(format!("tick {}", ctx.tick));
        }
        fn on_process_frame(&mut self, _scope: &mut ProcessorScope<'_>, ctx: &LogicContext) {
            self.push(format!("frame {}", ctx.frame));
        }
        fn on_package_notice(
            &mut self,
            _scope: &mut ProcessorScope<'_>,
            _ctx: &LogicContext,
            event: PackageEvent,
            package: &Package,
        ) -> bool {
            self.push(format!("{:?} {}", event, package.name));
            true
        }
        fn on_run_state_changed(
            &mut self,
            _scope: &mut ProcessorScope<'_>,
            _ctx: &LogicContext,
            current: AppRunState,
            previous: AppRunState,
        ) {
            self.push(format!("{previous}->{current}"));
        }
    }

    fn engine(tick_rate: u32, max_ticks_per_frame: u32) -> (LogicEngine, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let root = Processor::with_logic("root", Recorder { log: log.clone() });
        let config = EngineConfig {
            tick_rate,
            max_ticks_per_frame,
        };
        (LogicEngine::new(config, Box::new(root)).unwrap(), log)
    }

    #[test]
    fn test_fixed_step_accumulation() {
        let (mut engine, log) = engine(4, 8);
        assert!(engine.init());
        log.borrow_mut().clear();

        assert_eq!(engine.advance(0.5), 2);
        assert_eq!(engine.advance(0.125), 0);
        assert_eq!(engine.advance(0.125), 1);
        assert_eq!(engine.context().tick, 3);
        assert_eq!(engine.context().frame, 3);
        assert_eq!(engine.context().time, 0.75);

        assert_eq!(
            *log.borrow(),
            vec!["tick 0", "tick 1", "frame 0", "frame 1", "tick 2", "frame 2"]
        );
    }

    #[test]
    fn test_tick_budget_drops_surplus_time() {
        let (mut engine, _log) = engine(4, 2);
        engine.init();
        assert_eq!(engine.advance(2.0), 2);
        assert_eq!(engine.advance(0.0), 0);
    }

    #[test]
    fn test_notices_delivered_in_order_before_next_tick() {
        let (mut engine, log) = engine(4, 8);
        engine.init();
        log.borrow_mut().clear();

        engine.queue_notice(PackageNotice::new(PackageEvent::WillBeLoaded, Package::new("level")));
        engine.queue_notice(PackageNotice::new(PackageEvent::WasLoaded, Package::new("level")));
        assert_eq!(engine.pending_notices(), 2);
        assert!(log.borrow().is_empty());

        engine.advance(0.25);
        assert_eq!(engine.pending_notices(), 0);
        assert_eq!(
            *log.borrow(),
            vec!["WillBeLoaded level", "WasLoaded level", "tick 0", "frame 0"]
        );
    }

    #[test]
    fn test_run_state_fan_out() {
        let (mut engine, log) = engine(4, 8);
        assert!(engine.init());
        assert_eq!(engine.run_state(), AppRunState::Running);

        assert!(engine.set_run_state(AppRunState::Paused));
        assert!(!engine.set_run_state(AppRunState::Paused));
        assert!(engine.deinit());
        assert!(!engine.deinit());

        assert_eq!(
            *log.borrow(),
            vec![
                "undefined->initializing",
                "initializing->running",
                "running->paused",
                "paused->terminating",
            ]
        );
    }

    #[test]
    fn test_failed_init_is_unwound() {
        let node = Rc::new(MemoryNode::new("gone"));
        let mut root = Processor::new("root");
        root.add_node(node.clone());
        node.invalidate();

        let mut engine = LogicEngine::new(EngineConfig::default(), Box::new(root)).unwrap();
        assert!(!engine.init());
        assert!(!engine.is_initialized());
        assert!(engine.root().is_deinitialized());
        assert_eq!(engine.advance(1.0), 0);
    }

    #[test]
    fn test_typed_root_access() {
        let (mut engine, _log) = engine(60, 8);
        assert!(engine.root_as::<Processor>().is_some());
        assert!(engine.root_as_mut::<Processor>().is_some());
        assert_eq!(engine.root().name(), "root");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            tick_rate: 0,
            max_ticks_per_frame: 8,
        };
        assert!(LogicEngine::new(config, Box::new(Processor::new("root"))).is_err());
    }
}
