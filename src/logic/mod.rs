//! Logic Scheduling Module
//!
//! The processor tree and the units it schedules.
//!
//! ## Module Structure
//!
//! - `stepable`: Smallest schedulable unit and its callbacks
//! - `observer`: Ordered stepable collection with fan-out
//! - `node_observer`: External node references and their validity
//! - `notice`: Run-state and package lifecycle notifications
//! - `processor`: Tree nodes, tick protocol, lifecycle
//! - `state_machine`: Deferred per-state callback dispatch

pub mod stepable;
pub mod observer;
pub mod node_observer;
pub mod notice;
pub mod processor;
pub mod state_machine;

// Re-export key types
pub use stepable::{erase, NoopLogic, Step, StepHandle, StepLogic, Stepable, StepableRef, TickFn};
pub use observer::StepableObserver;
pub use node_observer::{NodeObserver, NodeRef};
pub use notice::{AppRunState, Package, PackageEvent, PackageNotice};
pub use processor::{Children, LogicNode, Processor, ProcessorLogic, ProcessorScope};
pub use state_machine::{MachineControl, StateHandlers, StateMachine};
