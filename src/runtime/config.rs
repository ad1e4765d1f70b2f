//! Setup Documents
//!
//! JSON documents describing the engine driver and stage processors.
//! Every document is validated before anything is built from it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::{PhaseStageTimeline, Stage, StageError, StageProcessing, TimeRange};
use crate::timeline::{TimelineError, TimelineParams};

/// Default logic tick rate (Hz).
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Default cap on logic ticks run for one frame.
pub const DEFAULT_MAX_TICKS_PER_FRAME: u32 = 8;

// =============================================================================
// ENGINE CONFIG
// =============================================================================

/// Fixed-step driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Logic ticks per second.
    pub tick_rate: u32,
    /// Ticks run at most per frame; surplus time is dropped.
    pub max_ticks_per_frame: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_ticks_per_frame: DEFAULT_MAX_TICKS_PER_FRAME,
        }
    }
}

impl EngineConfig {
    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Engine("tick_rate must be positive"));
        }
        if self.max_ticks_per_frame == 0 {
            return Err(ConfigError::Engine("max_ticks_per_frame must be positive"));
        }
        Ok(())
    }

    /// Duration of one tick in seconds.
    pub fn tick_duration(&self) -> f64 {
        1.0 / f64::from(self.tick_rate.max(1))
    }
}

// =============================================================================
// STAGE SETUPS
// =============================================================================

/// Timeline bound to a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTimelineSetup {
    /// Phase layout
    #[serde(default)]
    pub params: TimelineParams,
    /// Range played by the intro
    pub intro: TimeRange,
    /// Range played by the outro
    pub outro: TimeRange,
}

impl StageTimelineSetup {
    /// Check the layout and that both ranges play inside it.
    pub fn validate(&self) -> Result<(), TimelineError> {
        self.params.validate()?;
        self.params.validate_range(self.intro.start, self.intro.end)?;
        self.params.validate_range(self.outro.start, self.outro.end)
    }
}

/// One stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSetup {
    /// Stage id, unique within its processor
    pub id: String,
    /// Switch child selected on intro
    #[serde(default)]
    pub switch_id: Option<String>,
    /// Placement of the run-state step
    #[serde(default)]
    pub processing: StageProcessing,
    /// Bound timeline
    #[serde(default)]
    pub timeline: Option<StageTimelineSetup>,
}

impl StageSetup {
    /// Build the stage.
    pub fn build(&self) -> Result<Stage, ConfigError> {
        let mut stage = Stage::new(self.id.clone()).with_processing(self.processing);
        if let Some(switch_id) = &self.switch_id {
            stage = stage.with_switch_id(switch_id.clone());
        }
        if let Some(timeline) = &self.timeline {
            let timeline = PhaseStageTimeline::new(timeline.params, timeline.intro, timeline.outro)?;
            stage = stage.with_timeline(Box::new(timeline));
        }
        Ok(stage)
    }
}

fn default_processor_name() -> String {
    "stages".to_string()
}

/// A stage processor and its stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProcessorSetup {
    /// Processor name
    #[serde(default = "default_processor_name")]
    pub name: String,
    /// Switch node resolved on init
    #[serde(default)]
    pub switch_node_id: Option<String>,
    /// Stages in tick order
    #[serde(default)]
    pub stages: Vec<StageSetup>,
}

impl StageProcessorSetup {
    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let setup: Self = serde_json::from_str(json)?;
        setup.validate()?;
        Ok(setup)
    }

    /// Check for duplicate ids, invalid timelines and unplayable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.id.as_str()) {
                return Err(StageError::DuplicateStage(stage.id.clone()).into());
            }
            if let Some(timeline) = &stage.timeline {
                timeline.validate()?;
            }
        }
        Ok(())
    }
}

/// Complete demo/application setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupDocument {
    /// Driver configuration
    #[serde(default)]
    pub engine: EngineConfig,
    /// Stage processors, ticked in order
    #[serde(default)]
    pub processors: Vec<StageProcessorSetup>,
}

impl SetupDocument {
    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let document: Self = serde_json::from_str(json)?;
        document.engine.validate()?;
        for processor in &document.processors {
            processor.validate()?;
        }
        Ok(document)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Setup document errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed JSON or wrong shape.
    #[error("malformed setup document: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid timeline layout.
    #[error("invalid timeline: {0}")]
    Timeline(#[from] TimelineError),

    /// Invalid stage registry.
    #[error("invalid stages: {0}")]
    Stage(#[from] StageError),

    /// Invalid driver configuration.
    #[error("invalid engine config: {0}")]
    Engine(&'static str),
}
