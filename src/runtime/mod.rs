//! Runtime
//!
//! Driving a logic tree from the outside:
//! - `config`: setup documents
//! - `engine`: fixed-step driver and package notice queue

pub mod config;
pub mod engine;

pub use config::{
    ConfigError, EngineConfig, SetupDocument, StageProcessorSetup, StageSetup, StageTimelineSetup,
    DEFAULT_MAX_TICKS_PER_FRAME, DEFAULT_TICK_RATE,
};
pub use engine::LogicEngine;
