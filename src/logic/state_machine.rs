//! Generic State Machine
//!
//! A stepable dispatching to per-state callbacks keyed by any ordered
//! state value. Transitions are deferred: `set_next_state` only records the
//! target, and the next tick resolves it as `leave(old)` then `enter(new)`.
//! Without a pending transition the tick runs `process(current)`. A state
//! without an `enter` callback uses its `process` callback instead.
//!
//! A `reset` requested from inside a callback cancels whatever transition
//! is in flight; the machine lands in its default state once the running
//! callback returns.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::core::context::LogicContext;
use crate::logic::stepable::StepLogic;

/// Callback attached to a state.
pub type StateCallback<S> = Box<dyn FnMut(&mut MachineControl<S>, &LogicContext)>;

/// The four optional callbacks of one state.
pub struct StateHandlers<S> {
    enter: Option<StateCallback<S>>,
    process: Option<StateCallback<S>>,
    leave: Option<StateCallback<S>>,
    finish: Option<StateCallback<S>>,
}

impl<S> Default for StateHandlers<S> {
    fn default() -> Self {
        Self {
            enter: None,
            process: None,
            leave: None,
            finish: None,
        }
    }
}

impl<S> StateHandlers<S> {
    /// No callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called on the tick the state is entered.
    pub fn on_enter(mut self, f: impl FnMut(&mut MachineControl<S>, &LogicContext) + 'static) -> Self {
        self.enter = Some(Box::new(f));
        self
    }

    /// Called on every tick without a pending transition.
    pub fn on_process(mut self, f: impl FnMut(&mut MachineControl<S>, &LogicContext) + 'static) -> Self {
        self.process = Some(Box::new(f));
        self
    }

    /// Called on the tick the state is left.
    pub fn on_leave(mut self, f: impl FnMut(&mut MachineControl<S>, &LogicContext) + 'static) -> Self {
        self.leave = Some(Box::new(f));
        self
    }

    /// Called on every finish-tick.
    pub fn on_finish(mut self, f: impl FnMut(&mut MachineControl<S>, &LogicContext) + 'static) -> Self {
        self.finish = Some(Box::new(f));
        self
    }
}

#[derive(Clone, Copy, Debug)]
enum Slot {
    Enter,
    Process,
    Leave,
    Finish,
}

/// Machine state visible to (and steerable from) callbacks.
#[derive(Debug)]
pub struct MachineControl<S> {
    default: S,
    current: S,
    previous: Option<S>,
    pending: Option<S>,
    ticks_in_state: u64,
    dispatching: bool,
    reset_requested: bool,
}

impl<S: Clone> MachineControl<S> {
    fn new(default: S) -> Self {
        Self {
            current: default.clone(),
            default,
            previous: None,
            pending: None,
            ticks_in_state: 0,
            dispatching: false,
            reset_requested: false,
        }
    }

    /// The current state.
    pub fn current(&self) -> &S {
        &self.current
    }

    /// The state left by the most recent transition.
    pub fn previous(&self) -> Option<&S> {
        self.previous.as_ref()
    }

    /// The transition target awaiting the next tick.
    pub fn pending(&self) -> Option<&S> {
        self.pending.as_ref()
    }

    /// Ticks processed since the current state was entered.
    pub fn ticks_in_state(&self) -> u64 {
        self.ticks_in_state
    }

    /// Schedule a transition for the next tick. Replaces any earlier target.
    pub fn set_next_state(&mut self, state: S) {
        self.pending = Some(state);
    }

    /// Return to the default state, cancelling any pending transition.
    ///
    /// From inside a callback the reset takes effect when the callback
    /// returns and short-circuits the transition being resolved.
    pub fn reset(&mut self) {
        self.pending = None;
        if self.dispatching {
            self.reset_requested = true;
        } else {
            self.apply_reset();
        }
    }

    fn apply_reset(&mut self) {
        self.current = self.default.clone();
        self.previous = None;
        self.pending = None;
        self.ticks_in_state = 0;
        self.reset_requested = false;
    }
}

/// A state machine driven as stepable logic.
pub struct StateMachine<S> {
    handlers: BTreeMap<S, StateHandlers<S>>,
    control: MachineControl<S>,
}

impl<S: Ord + Clone + fmt::Debug> StateMachine<S> {
    /// Create a machine resting in `default`.
    pub fn new(default: S) -> Self {
        Self {
            handlers: BTreeMap::new(),
            control: MachineControl::new(default),
        }
    }

    /// Attach callbacks to a state. Fails if the state already has some.
    pub fn register(&mut self, state: S, handlers: StateHandlers<S>) -> bool {
        if self.handlers.contains_key(&state) {
            return false;
        }
        self.handlers.insert(state, handlers);
        true
    }

    /// Detach the callbacks of a state.
    pub fn unregister(&mut self, state: &S) -> bool {
        self.handlers.remove(state).is_some()
    }

    /// Is the state registered?
    pub fn is_registered(&self, state: &S) -> bool {
        self.handlers.contains_key(state)
    }

    /// The current state.
    pub fn current_state(&self) -> &S {
        self.control.current()
    }

    /// The transition target awaiting the next tick.
    pub fn pending_state(&self) -> Option<&S> {
        self.control.pending()
    }

    /// Machine control, as seen by callbacks.
    pub fn control(&self) -> &MachineControl<S> {
        &self.control
    }

    /// Schedule a transition for the next tick.
    pub fn set_next_state(&mut self, state: S) {
        self.control.set_next_state(state);
    }

    /// Return to the default state and drop any pending transition.
    pub fn reset(&mut self) {
        self.control.reset();
    }

    fn invoke(&mut self, state: &S, slot: Slot, ctx: &LogicContext) -> bool {
        let Some(handlers) = self.handlers.get_mut(state) else {
            return false;
        };
        let callback = match slot {
            Slot::Enter => handlers.enter.as_mut(),
            Slot::Process => handlers.process.as_mut(),
            Slot::Leave => handlers.leave.as_mut(),
            Slot::Finish => handlers.finish.as_mut(),
        };
        match callback {
            Some(callback) => {
                callback(&mut self.control, ctx);
                true
            }
            None => false,
        }
    }

    fn resolve(&mut self, ctx: &LogicContext) {
        match self.control.pending.take() {
            Some(next) => {
                let old = self.control.current.clone();
                self.invoke(&old, Slot::Leave, ctx);
                if self.control.reset_requested {
                    return;
                }

                debug!(from = ?old, to = ?next, "state transition");
                self.control.previous = Some(old);
                self.control.current = next.clone();
                self.control.ticks_in_state = 0;
                if !self.invoke(&next, Slot::Enter, ctx) {
                    self.invoke(&next, Slot::Process, ctx);
                }
            }
            None => {
                let current = self.control.current.clone();
                self.invoke(&current, Slot::Process, ctx);
                self.control.ticks_in_state += 1;
            }
        }
    }
}

impl<S: Ord + Clone + fmt::Debug> StepLogic for StateMachine<S> {
    fn on_reset(&mut self) {
        self.reset();
    }

    fn on_process_tick(&mut self, ctx: &LogicContext) {
        self.control.dispatching = true;
        self.resolve(ctx);
        self.control.dispatching = false;
        if self.control.reset_requested {
            self.control.apply_reset();
        }
    }

    fn on_finish_tick(&mut self, ctx: &LogicContext) {
        self.control.dispatching = true;
        let current = self.control.current.clone();
        self.invoke(&current, Slot::Finish, ctx);
        self.control.dispatching = false;
        if self.control.reset_requested {
            self.control.apply_reset();
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("states", &self.handlers.keys().collect::<Vec<_>>())
            .field("control", &self.control)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::logic::stepable::{Step, Stepable};

    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
    enum Menu {
        Idle,
        Open,
        Closing,
    }

    type Log = Rc<RefCell<Vec<String>>>;

    fn logging(log: &Log, what: &'static str) -> impl FnMut(&mut MachineControl<Menu>, &LogicContext) + 'static {
        let log = log.clone();
        move |_control: &mut MachineControl<Menu>, _ctx: &LogicContext| {
            log.borrow_mut().push(what.to_string())
        }
    }

    fn machine(log: &Log) -> StateMachine<Menu> {
        let mut machine = StateMachine::new(Menu::Idle);
        machine.register(
            Menu::Idle,
            StateHandlers::new()
                .on_process(logging(log, "idle.process"))
                .on_leave(logging(log, "idle.leave")),
        );
        machine.register(
            Menu::Open,
            StateHandlers::new()
                .on_enter(logging(log, "open.enter"))
                .on_process(logging(log, "open.process"))
                .on_leave(logging(log, "open.leave"))
                .on_finish(logging(log, "open.finish")),
        );
        machine
    }

    #[test]
    fn test_transition_is_deferred_to_next_tick() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let ctx = LogicContext::new(0.1);
        let mut step = Step::new(machine(&log));

        step.logic_mut().set_next_state(Menu::Open);
        assert_eq!(*step.logic().current_state(), Menu::Idle);
        assert_eq!(step.logic().pending_state(), Some(&Menu::Open));

        step.process_tick(&ctx);
        assert_eq!(*step.logic().current_state(), Menu::Open);
        step.process_tick(&ctx);
        step.finish_tick(&ctx);

        assert_eq!(
            *log.borrow(),
            vec!["idle.leave", "open.enter", "open.process", "open.finish"]
        );
        assert_eq!(step.logic().control().previous(), Some(&Menu::Idle));
        assert_eq!(step.logic().control().ticks_in_state(), 1);
    }

    #[test]
    fn test_enter_falls_back_to_process() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let ctx = LogicContext::new(0.1);
        let mut machine = machine(&log);
        machine.set_next_state(Menu::Open);
        machine.on_process_tick(&ctx);
        machine.set_next_state(Menu::Idle);
        machine.on_process_tick(&ctx);

        assert_eq!(
            *log.borrow(),
            vec!["idle.leave", "open.enter", "open.leave", "idle.process"]
        );
    }

    #[test]
    fn test_reset_inside_leave_cancels_transition() {
        let ctx = LogicContext::new(0.1);
        let entered = Rc::new(RefCell::new(false));
        let mut machine = StateMachine::new(Menu::Idle);
        machine.register(
            Menu::Open,
            StateHandlers::new().on_leave(|control: &mut MachineControl<Menu>, _ctx: &LogicContext| {
                control.reset()
            }),
        );
        let flag = entered.clone();
        machine.register(
            Menu::Closing,
            StateHandlers::new().on_enter(move |_control: &mut MachineControl<Menu>, _ctx: &LogicContext| {
                *flag.borrow_mut() = true
            }),
        );

        machine.set_next_state(Menu::Open);
        machine.on_process_tick(&ctx);
        assert_eq!(*machine.current_state(), Menu::Open);

        machine.set_next_state(Menu::Closing);
        machine.on_process_tick(&ctx);

        assert_eq!(*machine.current_state(), Menu::Idle);
        assert!(machine.pending_state().is_none());
        assert!(!*entered.borrow());
    }

    #[test]
    fn test_reset_inside_enter_lands_in_default() {
        let ctx = LogicContext::new(0.1);
        let mut machine = StateMachine::new(Menu::Idle);
        machine.register(
            Menu::Open,
            StateHandlers::new().on_enter(|control: &mut MachineControl<Menu>, _ctx: &LogicContext| {
                control.set_next_state(Menu::Closing);
                control.reset();
            }),
        );

        machine.set_next_state(Menu::Open);
        machine.on_process_tick(&ctx);

        assert_eq!(*machine.current_state(), Menu::Idle);
        assert!(machine.pending_state().is_none());
    }

    #[test]
    fn test_callback_can_chain_transitions() {
        let ctx = LogicContext::new(0.1);
        let mut machine = StateMachine::new(Menu::Idle);
        machine.register(
            Menu::Open,
            StateHandlers::new().on_enter(|control: &mut MachineControl<Menu>, _ctx: &LogicContext| {
                control.set_next_state(Menu::Closing)
            }),
        );

        machine.set_next_state(Menu::Open);
        machine.on_process_tick(&ctx);
        assert_eq!(*machine.current_state(), Menu::Open);
        assert_eq!(machine.pending_state(), Some(&Menu::Closing));

        machine.on_process_tick(&ctx);
        assert_eq!(*machine.current_state(), Menu::Closing);
    }

    #[test]
    fn test_external_reset_drops_pending() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut step = Step::new(machine(&log));
        step.logic_mut().set_next_state(Menu::Open);
        step.reset();

        step.process_tick(&LogicContext::new(0.1));
        assert_eq!(*step.logic().current_state(), Menu::Idle);
        assert_eq!(*log.borrow(), vec!["idle.process"]);
    }

    #[test]
    fn test_register_twice_is_rejected() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut machine = machine(&log);
        assert!(!machine.register(Menu::Open, StateHandlers::new()));
        assert!(machine.unregister(&Menu::Open));
        assert!(!machine.is_registered(&Menu::Open));
    }
}
