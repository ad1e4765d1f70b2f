//! Timeline
//!
//! Time and loop arithmetic behind timed behavior:
//! - `params`: phase layout and its validation
//! - `engine`: the phase engine and its stepable integration

pub mod engine;
pub mod params;

pub use engine::{LoopPhase, PlaybackState, Timeline, TimelineHandle};
pub use params::{TimelineError, TimelineParams};
