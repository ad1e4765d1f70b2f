//! # Stagecraft
//!
//! Per-frame logic scheduling: a tree of processors driven once per tick
//! and frame, stage run-state machines for scenes and panels, and a
//! timeline phase engine for timed behavior.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        STAGECRAFT                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Collaborator surfaces                     │
//! │  ├── context.rs  - Per-call context (tick, time, graph)      │
//! │  ├── graph.rs    - Graph node capabilities                   │
//! │  └── memory.rs   - In-memory graph                           │
//! │                                                              │
//! │  logic/          - Processor tree                            │
//! │  ├── stepable.rs - Schedulable units                         │
//! │  ├── observer.rs - Stepable fan-out                          │
//! │  ├── node_observer.rs - Node reference validity              │
//! │  ├── notice.rs   - Run-state and package notices             │
//! │  ├── processor.rs- Tick protocol and lifecycle               │
//! │  └── state_machine.rs - Deferred state machine               │
//! │                                                              │
//! │  timeline/       - Phase engine                              │
//! │  ├── params.rs   - Loop layout and validation                │
//! │  └── engine.rs   - Time/loop arithmetic                      │
//! │                                                              │
//! │  stage/          - Stage lifecycles                          │
//! │  ├── run_state.rs, stage_timeline.rs                         │
//! │  ├── stage.rs    - Intro/run/outro machine                   │
//! │  └── stage_processor.rs - Stage registry                     │
//! │                                                              │
//! │  runtime/        - Driving the tree                          │
//! │  ├── config.rs   - Setup documents                           │
//! │  └── engine.rs   - Fixed-step driver                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threading
//!
//! Everything here runs on the logic thread. Shared handles are
//! `Rc`/`RefCell`; nothing blocks and nothing is `Send`. Notices from
//! other subsystems are queued and delivered between ticks.
//!
//! ## Ordering Guarantee
//!
//! Within one tick a processor's stepables run before its own tick
//! callback, which runs before its children, which run before its
//! children-done callback. Stage timelines rely on this to advance before
//! their stage reads them.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod logic;
pub mod runtime;
pub mod stage;
pub mod timeline;

// Re-export commonly used types
pub use crate::core::{GraphNode, GraphRoot, LogicContext, MemoryGraph, MemoryNode, ObservableNode};
pub use logic::{
    AppRunState, LogicNode, NodeObserver, Package, PackageEvent, PackageNotice, Processor, ProcessorLogic,
    ProcessorScope, StateMachine, Step, StepLogic, Stepable, StepableObserver,
};
pub use runtime::{ConfigError, EngineConfig, LogicEngine, SetupDocument};
pub use stage::{RunState, Stage, StageControl, StageLogic, StageProcessing, StageProcessor, TimeRange};
pub use timeline::{PlaybackState, Timeline, TimelineParams};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default logic tick rate (Hz)
pub const DEFAULT_TICK_RATE: u32 = runtime::DEFAULT_TICK_RATE;
