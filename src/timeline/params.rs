//! Timeline Parameters
//!
//! The static description of a timeline's time range and loop layout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phase layout of a timeline.
///
/// With `number_of_loops == 0` the timeline is one segment
/// `[start_time, end_time]`. Otherwise it is an intro
/// `[start_time, loop_start_time]`, a loop body
/// `[loop_start_time, loop_end_time]` repeated `number_of_loops` times
/// (forever when negative), and an outro `[loop_end_time, end_time]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineParams {
    /// First time of the timeline
    pub start_time: f64,
    /// Last time of the timeline
    pub end_time: f64,
    /// Start of the loop body
    pub loop_start_time: f64,
    /// End of the loop body
    pub loop_end_time: f64,
    /// Loop index the timeline rewinds to
    pub start_loop: i32,
    /// Loop body repetitions (negative = endless)
    pub number_of_loops: i32,
    /// Multiplier applied to every tick delta
    pub time_scale: f64,
    /// Rewind automatically when the end is reached
    pub auto_rewind: bool,
}

impl Default for TimelineParams {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: 0.0,
            loop_start_time: 0.0,
            loop_end_time: 0.0,
            start_loop: 0,
            number_of_loops: 0,
            time_scale: 1.0,
            auto_rewind: false,
        }
    }
}

impl TimelineParams {
    /// A single segment `[start, end]`.
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time,
            end_time,
            loop_start_time: start_time,
            loop_end_time: end_time,
            ..Self::default()
        }
    }

    /// Add a loop body repeated `number_of_loops` times.
    pub fn with_loop(mut self, loop_start_time: f64, loop_end_time: f64, number_of_loops: i32) -> Self {
        self.loop_start_time = loop_start_time;
        self.loop_end_time = loop_end_time;
        self.number_of_loops = number_of_loops;
        self
    }

    /// Set the time scale.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Enable or disable auto-rewind.
    pub fn with_auto_rewind(mut self, auto_rewind: bool) -> Self {
        self.auto_rewind = auto_rewind;
        self
    }

    /// Set the loop index used by rewind.
    pub fn with_start_loop(mut self, start_loop: i32) -> Self {
        self.start_loop = start_loop;
        self
    }

    /// Does the loop body repeat forever?
    pub fn is_endless(&self) -> bool {
        self.number_of_loops < 0
    }

    /// Loop index of the outro, if the layout has one.
    pub fn outro_loop(&self) -> Option<i32> {
        (self.number_of_loops > 0).then(|| self.number_of_loops.saturating_add(1))
    }

    /// Is `index` a loop index this layout can be in?
    pub fn is_valid_loop(&self, index: i32) -> bool {
        match self.number_of_loops {
            0 => index == 0,
            n if n < 0 => index >= 0,
            n => (0..=n.saturating_add(1)).contains(&index),
        }
    }

    /// Check the layout for consistency.
    pub fn validate(&self) -> Result<(), TimelineError> {
        let fields = [
            ("start_time", self.start_time),
            ("end_time", self.end_time),
            ("loop_start_time", self.loop_start_time),
            ("loop_end_time", self.loop_end_time),
            ("time_scale", self.time_scale),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(TimelineError::NonFinite(field));
            }
        }

        if self.end_time < self.start_time {
            return Err(TimelineError::InvertedRange {
                start: self.start_time,
                end: self.end_time,
            });
        }

        if self.number_of_loops != 0 {
            let ordered = self.start_time <= self.loop_start_time
                && self.loop_start_time <= self.loop_end_time
                && self.loop_end_time <= self.end_time;
            if !ordered {
                return Err(TimelineError::LoopOutOfRange {
                    loop_start: self.loop_start_time,
                    loop_end: self.loop_end_time,
                });
            }
            if self.is_endless() && self.loop_end_time <= self.loop_start_time {
                return Err(TimelineError::EmptyEndlessLoop);
            }
        }

        if !self.is_valid_loop(self.start_loop) {
            return Err(TimelineError::StartLoopOutOfRange(self.start_loop));
        }

        Ok(())
    }

    /// Check that `[start, end]` can be played forward inside this layout.
    ///
    /// Ranges of an endless layout must end inside the loop body.
    pub fn validate_range(&self, start: f64, end: f64) -> Result<(), TimelineError> {
        let inside = start.is_finite()
            && end.is_finite()
            && self.start_time <= start
            && start <= end
            && end <= self.end_time;
        if !inside || (self.is_endless() && end > self.loop_end_time) {
            return Err(TimelineError::RangeOutOfLayout { start, end });
        }
        Ok(())
    }
}

/// Timeline layout errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    /// A time value is NaN or infinite.
    #[error("{0} is not finite")]
    NonFinite(&'static str),

    /// End lies before start.
    #[error("end time {end} lies before start time {start}")]
    InvertedRange {
        /// Start time
        start: f64,
        /// End time
        end: f64,
    },

    /// Loop body not inside `[start, end]` or inverted.
    #[error("loop range [{loop_start}, {loop_end}] is not inside the timeline")]
    LoopOutOfRange {
        /// Loop start time
        loop_start: f64,
        /// Loop end time
        loop_end: f64,
    },

    /// An endless loop body must have a length.
    #[error("endless loop body has zero length")]
    EmptyEndlessLoop,

    /// Start loop is not a loop of this layout.
    #[error("start loop {0} is out of range")]
    StartLoopOutOfRange(i32),

    /// A playback range that cannot be reached inside the layout.
    #[error("range [{start}, {end}] cannot be played inside the timeline")]
    RangeOutOfLayout {
        /// Range start
        start: f64,
        /// Range end
        end: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_layouts() {
        assert!(TimelineParams::default().validate().is_ok());
        assert!(TimelineParams::new(0.0, 10.0).with_loop(2.0, 8.0, 2).validate().is_ok());
        assert!(TimelineParams::new(0.0, 10.0).with_loop(0.0, 10.0, -1).validate().is_ok());
    }

    #[test]
    fn test_invalid_layouts() {
        assert_eq!(
            TimelineParams::new(5.0, 1.0).validate(),
            Err(TimelineError::InvertedRange { start: 5.0, end: 1.0 })
        );
        assert!(matches!(
            TimelineParams::new(0.0, 10.0).with_loop(8.0, 2.0, 1).validate(),
            Err(TimelineError::LoopOutOfRange { .. })
        ));
        assert!(matches!(
            TimelineParams::new(0.0, 10.0).with_loop(2.0, 12.0, 1).validate(),
            Err(TimelineError::LoopOutOfRange { .. })
        ));
        assert_eq!(
            TimelineParams::new(0.0, 10.0).with_loop(4.0, 4.0, -1).validate(),
            Err(TimelineError::EmptyEndlessLoop)
        );
        assert_eq!(
            TimelineParams::new(0.0, f64::NAN).validate(),
            Err(TimelineError::NonFinite("end_time"))
        );
        assert_eq!(
            TimelineParams::new(0.0, 10.0).with_loop(2.0, 8.0, 2).with_start_loop(4).validate(),
            Err(TimelineError::StartLoopOutOfRange(4))
        );
    }

    #[test]
    fn test_loop_index_ranges() {
        let single = TimelineParams::new(0.0, 1.0);
        assert!(single.is_valid_loop(0));
        assert!(!single.is_valid_loop(1));
        assert_eq!(single.outro_loop(), None);

        let looped = TimelineParams::new(0.0, 10.0).with_loop(2.0, 8.0, 2);
        assert!(looped.is_valid_loop(3));
        assert!(!looped.is_valid_loop(4));
        assert!(!looped.is_valid_loop(-1));
        assert_eq!(looped.outro_loop(), Some(3));

        let endless = TimelineParams::new(0.0, 10.0).with_loop(2.0, 8.0, -1);
        assert!(endless.is_valid_loop(1000));
        assert_eq!(endless.outro_loop(), None);
    }

    #[test]
    fn test_playable_ranges() {
        let looped = TimelineParams::new(0.0, 10.0).with_loop(2.0, 8.0, 2);
        assert!(looped.validate_range(0.0, 1.0).is_ok());
        assert!(looped.validate_range(8.0, 10.0).is_ok());
        assert!(looped.validate_range(4.0, 4.0).is_ok());
        assert_eq!(
            looped.validate_range(3.0, 1.0),
            Err(TimelineError::RangeOutOfLayout { start: 3.0, end: 1.0 })
        );
        assert!(looped.validate_range(9.0, 11.0).is_err());
        assert!(looped.validate_range(-1.0, 1.0).is_err());

        let endless = TimelineParams::new(0.0, 10.0).with_loop(2.0, 8.0, -1);
        assert!(endless.validate_range(2.0, 8.0).is_ok());
        assert!(endless.validate_range(8.0, 10.0).is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let params: TimelineParams =
            serde_json::from_str(r#"{ "end_time": 4.0, "loop_end_time": 4.0, "auto_rewind": true }"#).unwrap();
        assert_eq!(params.time_scale, 1.0);
        assert_eq!(params.number_of_loops, 0);
        assert!(params.auto_rewind);
        assert!(params.validate().is_ok());
    }
}
