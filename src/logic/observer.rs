//! Stepable Observer
//!
//! Ordered, duplicate-free collection of stepables with fan-out.
//!
//! Every fan-out iterates over a snapshot of the member list taken when the
//! pass starts: a member added during a pass is first visited by the next
//! pass, and a member removed during a pass is still visited by it.

use crate::core::context::LogicContext;
use crate::core::same_target;
use crate::logic::stepable::StepableRef;

/// Ordered set of stepables.
#[derive(Default)]
pub struct StepableObserver {
    stepables: Vec<StepableRef>,
}

impl StepableObserver {
    /// Create an empty observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stepable. Fails if it is already a member.
    pub fn add(&mut self, stepable: StepableRef) -> bool {
        if self.contains(&stepable) {
            return false;
        }
        self.stepables.push(stepable);
        true
    }

    /// Remove a stepable. Fails if it is not a member.
    pub fn remove(&mut self, stepable: &StepableRef) -> bool {
        match self.index_of(stepable) {
            Some(index) => {
                self.stepables.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove the stepable at `index`. Fails if out of range.
    pub fn remove_at(&mut self, index: usize) -> bool {
        if index >= self.stepables.len() {
            return false;
        }
        self.stepables.remove(index);
        true
    }

    /// Is the stepable a member?
    pub fn contains(&self, stepable: &StepableRef) -> bool {
        self.index_of(stepable).is_some()
    }

    /// Position of a member.
    pub fn index_of(&self, stepable: &StepableRef) -> Option<usize> {
        self.stepables.iter().position(|s| same_target(s, stepable))
    }

    /// Member at `index`.
    pub fn get(&self, index: usize) -> Option<&StepableRef> {
        self.stepables.get(index)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.stepables.len()
    }

    /// No members?
    pub fn is_empty(&self) -> bool {
        self.stepables.is_empty()
    }

    /// Set every member's enabled flag.
    pub fn set_enabled(&self, enabled: bool) {
        for stepable in self.snapshot() {
            stepable.borrow_mut().set_enabled(enabled);
        }
    }

    /// Reset every member.
    pub fn reset(&self) {
        for stepable in self.snapshot() {
            stepable.borrow_mut().reset();
        }
    }

    /// Tick every enabled member.
    pub fn process_tick(&self, ctx: &LogicContext) {
        for stepable in self.snapshot() {
            stepable.borrow_mut().process_tick(ctx);
        }
    }

    /// Finish the tick on every enabled member.
    pub fn finish_tick(&self, ctx: &LogicContext) {
        for stepable in self.snapshot() {
            stepable.borrow_mut().finish_tick(ctx);
        }
    }

    fn snapshot(&self) -> Vec<StepableRef> {
        self.stepables.clone()
    }
}

impl std::fmt::Debug for StepableObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepableObserver")
            .field("stepables", &self.stepables.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::logic::stepable::{erase, Step, StepLogic};

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl StepLogic for Recorder {
        fn on_reset(&mut self) {
            self.log.borrow_mut().push(format!("{}.reset", self.name));
        }
        fn on_process_tick(&mut self, _ctx: &LogicContext) {
            self.log.borrow_mut().push(format!("{}.tick", self.name));
        }
        fn on_finish_tick(&mut self, _ctx: &LogicContext) {
            self.log.borrow_mut().push(format!("{}.finish", self.name));
        }
    }

    fn recorder(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> StepableRef {
        erase(&Step::shared(Recorder {
            name,
            log: log.clone(),
        }))
    }

    #[test]
    fn test_add_twice_is_rejected() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut observer = StepableObserver::new();
        let a = recorder("a", &log);

        assert!(observer.add(a.clone()));
        assert!(!observer.add(a.clone()));
        assert_eq!(observer.len(), 1);
    }

    #[test]
    fn test_remove_absent_and_out_of_range() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut observer = StepableObserver::new();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        observer.add(a.clone());

        assert!(!observer.remove(&b));
        assert!(!observer.remove_at(1));
        assert!(observer.remove(&a));
        assert!(observer.is_empty());
        assert!(!observer.remove(&a));
    }

    #[test]
    fn test_fan_out_in_insertion_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut observer = StepableObserver::new();
        for name in ["c", "a", "b"] {
            observer.add(recorder(name, &log));
        }
        let ctx = LogicContext::new(0.1);

        observer.reset();
        observer.process_tick(&ctx);
        observer.finish_tick(&ctx);

        assert_eq!(
            *log.borrow(),
            vec![
                "c.reset", "a.reset", "b.reset",
                "c.tick", "a.tick", "b.tick",
                "c.finish", "a.finish", "b.finish",
            ]
        );
    }

    #[test]
    fn test_individually_disabled_member_is_skipped() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut observer = StepableObserver::new();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        observer.add(a.clone());
        observer.add(b);

        a.borrow_mut().set_enabled(false);
        observer.process_tick(&LogicContext::new(0.1));
        assert_eq!(*log.borrow(), vec!["b.tick"]);

        observer.set_enabled(true);
        assert!(a.borrow().is_enabled());
    }
}
