//! Stages
//!
//! Scene/panel lifecycles on top of the processor tree:
//! - `run_state`: the intro/run/outro states and step placement
//! - `stage_timeline`: what a stage plays during intro and outro
//! - `stage`: the run-state machine
//! - `stage_processor`: the stage registry and switch node

pub mod run_state;
#[allow(clippy::module_inception)]
pub mod stage;
pub mod stage_processor;
pub mod stage_timeline;

pub use run_state::{RunState, StageProcessing};
pub use stage::{Stage, StageControl, StageLogic, SwitchSlot};
pub use stage_processor::{StageError, StageProcessor};
pub use stage_timeline::{NodeStageTimeline, PhaseStageTimeline, StageTimeline, TimeRange};
