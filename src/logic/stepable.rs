//! Stepables
//!
//! The smallest schedulable unit: an enable flag plus reset/tick/finish
//! callbacks. Owners keep a typed handle; observers keep a type-erased
//! handle to the same cell.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::context::LogicContext;

/// Callbacks of a stepable. Every method defaults to a no-op.
pub trait StepLogic {
    /// The enabled flag was set (called even if unchanged).
    fn on_set_enabled(&mut self, _enabled: bool) {}

    /// Return to the initial state.
    fn on_reset(&mut self) {}

    /// Per-tick work. Only called while enabled.
    fn on_process_tick(&mut self, _ctx: &LogicContext) {}

    /// End-of-tick work. Only called while enabled.
    fn on_finish_tick(&mut self, _ctx: &LogicContext) {}
}

/// Type-erased stepable interface used by observers.
pub trait Stepable {
    /// Is the stepable enabled?
    fn is_enabled(&self) -> bool;

    /// Set the enabled flag and notify the callbacks.
    fn set_enabled(&mut self, enabled: bool);

    /// Reset, regardless of the enabled flag.
    fn reset(&mut self);

    /// Tick (no-op while disabled).
    fn process_tick(&mut self, ctx: &LogicContext);

    /// Finish the tick (no-op while disabled).
    fn finish_tick(&mut self, ctx: &LogicContext);
}

/// Shared, type-erased stepable handle.
pub type StepableRef = Rc<RefCell<dyn Stepable>>;

/// Shared, typed stepable handle.
pub type StepHandle<L> = Rc<RefCell<Step<L>>>;

/// A stepable built from a [`StepLogic`].
#[derive(Debug)]
pub struct Step<L> {
    enabled: bool,
    logic: L,
}

impl<L: StepLogic> Step<L> {
    /// Create an enabled stepable.
    pub fn new(logic: L) -> Self {
        Self {
            enabled: true,
            logic,
        }
    }

    /// Create an enabled stepable behind a shared handle.
    pub fn shared(logic: L) -> StepHandle<L> {
        Rc::new(RefCell::new(Self::new(logic)))
    }

    /// Borrow the logic.
    pub fn logic(&self) -> &L {
        &self.logic
    }

    /// Mutably borrow the logic.
    pub fn logic_mut(&mut self) -> &mut L {
        &mut self.logic
    }
}

impl<L: StepLogic> Stepable for Step<L> {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.logic.on_set_enabled(enabled);
    }

    fn reset(&mut self) {
        self.logic.on_reset();
    }

    fn process_tick(&mut self, ctx: &LogicContext) {
        if self.enabled {
            self.logic.on_process_tick(ctx);
        }
    }

    fn finish_tick(&mut self, ctx: &LogicContext) {
        if self.enabled {
            self.logic.on_finish_tick(ctx);
        }
    }
}

/// Erase a typed handle for registration with an observer.
pub fn erase<L: StepLogic + 'static>(handle: &StepHandle<L>) -> StepableRef {
    handle.clone()
}

/// Logic that does nothing. Stands in wherever a callback set is optional.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogic;

impl StepLogic for NoopLogic {}

/// Stepable logic from a per-tick closure.
pub struct TickFn<F>(pub F);

impl<F: FnMut(&LogicContext)> StepLogic for TickFn<F> {
    fn on_process_tick(&mut self, ctx: &LogicContext) {
        (self.0)(ctx)
    }
}
