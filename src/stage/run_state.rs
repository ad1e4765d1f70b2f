//! Stage Run States
//!
//! ```text
//! STOP -> BEGIN_INTRO -> RUN_INTRO -> BEGIN_RUN -> RUN -> BEGIN_OUTRO -> RUN_OUTRO -> STOP
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Inactive
    #[default]
    Stop,
    /// Intro requested, processed on the next tick
    BeginIntro,
    /// Intro playing
    RunIntro,
    /// Intro done, entering the main phase
    BeginRun,
    /// Main phase
    Run,
    /// Outro requested, processed on the next tick
    BeginOutro,
    /// Outro playing
    RunOutro,
}

impl RunState {
    /// Is the stage stopped?
    pub fn is_stopped(self) -> bool {
        self == RunState::Stop
    }

    /// Is the stage in its intro?
    pub fn is_intro(self) -> bool {
        matches!(self, RunState::BeginIntro | RunState::RunIntro)
    }

    /// Is the stage in its outro?
    pub fn is_outro(self) -> bool {
        matches!(self, RunState::BeginOutro | RunState::RunOutro)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Stop => "stop",
            RunState::BeginIntro => "begin_intro",
            RunState::RunIntro => "run_intro",
            RunState::BeginRun => "begin_run",
            RunState::Run => "run",
            RunState::BeginOutro => "begin_outro",
            RunState::RunOutro => "run_outro",
        };
        f.write_str(name)
    }
}

/// Where a stage's run-state step sits within its processor walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageProcessing {
    /// Before the stepables (the timeline has not advanced yet)
    BeforeStep,
    /// After the own tick callback, before the children
    #[default]
    BeforeChildren,
    /// After the children, before the children-done callback
    AfterChildren,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_groups() {
        assert!(RunState::default().is_stopped());
        assert!(RunState::RunIntro.is_intro());
        assert!(RunState::BeginOutro.is_outro());
        assert!(!RunState::Run.is_intro());
        assert_eq!(RunState::BeginRun.to_string(), "begin_run");
    }

    #[test]
    fn test_processing_serde_names() {
        let processing: StageProcessing = serde_json::from_str(r#""after_children""#).unwrap();
        assert_eq!(processing, StageProcessing::AfterChildren);
        assert_eq!(StageProcessing::default(), StageProcessing::BeforeChildren);
    }
}
