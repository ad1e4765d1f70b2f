//! Timeline Phase Engine
//!
//! Maps tick deltas onto a current time, loop index and playback state.
//! The engine knows nothing about what it animates.
//!
//! ## Loop Indices
//!
//! ```text
//! number_of_loops == 0:   0 = [start, end]
//! number_of_loops  > 0:   0 = intro, 1..=N = loop body, N+1 = outro
//! number_of_loops  < 0:   0 = intro, 1 = loop body, wrapping forever
//! ```
//!
//! Time is carried across boundaries: an overshoot past the loop end
//! re-enters the loop start plus the overshoot.

use tracing::debug;
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::core::context::LogicContext;
use crate::logic::stepable::{Step, StepHandle, StepLogic};
use crate::timeline::params::{TimelineError, TimelineParams};

/// Playback state of a timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Not playing
    #[default]
    Stopped,
    /// Started, first tick not processed yet
    Started,
    /// Playing toward the end
    Forward,
    /// Playing toward the start
    Backward,
    /// Paused, direction remembered
    Paused,
}

/// Phase the current loop index falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopPhase {
    /// The whole range of a timeline without loops
    Single,
    /// Before the loop body
    Intro,
    /// Loop body iteration (1-based)
    Loop(i32),
    /// After the last loop body iteration
    Outro,
}

/// Time interval traversed during the last processed tick.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Span {
    low: f64,
    high: f64,
    low_inclusive: bool,
    high_inclusive: bool,
}

impl Span {
    fn contains(&self, t: f64) -> bool {
        let above = self.low < t || (self.low_inclusive && self.low == t);
        let below = t < self.high || (self.high_inclusive && t == self.high);
        above && below
    }
}

/// What the last processed tick did, for edge queries.
#[derive(Clone, Debug, Default)]
struct TickRecord {
    spans: Vec<Span>,
    from_loop: i32,
    to_loop: i32,
    forward: bool,
    finished: bool,
    wraps: u64,
}

/// A timeline phase engine.
#[derive(Clone, Debug)]
pub struct Timeline {
    params: TimelineParams,
    current_time: f64,
    current_loop: i32,
    playback: PlaybackState,
    backward: bool,
    was_running: bool,
    completed_loops: u64,
    stop_at: Option<f64>,
    record: TickRecord,
}

/// Shared timeline handle, registrable with a stepable observer.
pub type TimelineHandle = StepHandle<Timeline>;

impl Default for Timeline {
    fn default() -> Self {
        Self::from_valid(TimelineParams::default())
    }
}

impl Timeline {
    /// Create a stopped, rewound timeline.
    pub fn new(params: TimelineParams) -> Result<Self, TimelineError> {
        params.validate()?;
        Ok(Self::from_valid(params))
    }

    /// Create a shared, enabled timeline stepable.
    pub fn shared(params: TimelineParams) -> Result<TimelineHandle, TimelineError> {
        Ok(Step::shared(Self::new(params)?))
    }

    fn from_valid(params: TimelineParams) -> Self {
        let mut timeline = Self {
            params,
            current_time: params.start_time,
            current_loop: params.start_loop,
            playback: PlaybackState::Stopped,
            backward: false,
            was_running: false,
            completed_loops: 0,
            stop_at: None,
            record: TickRecord::default(),
        };
        timeline.rewind();
        timeline
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The phase layout.
    pub fn params(&self) -> &TimelineParams {
        &self.params
    }

    /// Current time.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Current loop index.
    pub fn current_loop(&self) -> i32 {
        self.current_loop
    }

    /// Current playback state.
    pub fn playback_state(&self) -> PlaybackState {
        self.playback
    }

    /// Phase of the current loop index.
    pub fn phase(&self) -> LoopPhase {
        self.phase_of(self.current_loop)
    }

    fn phase_of(&self, index: i32) -> LoopPhase {
        let n = self.params.number_of_loops;
        if n == 0 {
            LoopPhase::Single
        } else if index <= 0 {
            LoopPhase::Intro
        } else if n > 0 && index > n {
            LoopPhase::Outro
        } else {
            LoopPhase::Loop(index)
        }
    }

    /// Started, playing forward or playing backward.
    pub fn is_running(&self) -> bool {
        matches!(
            self.playback,
            PlaybackState::Started | PlaybackState::Forward | PlaybackState::Backward
        )
    }

    /// Paused?
    pub fn is_paused(&self) -> bool {
        self.playback == PlaybackState::Paused
    }

    /// Stopped?
    pub fn is_stopped(&self) -> bool {
        self.playback == PlaybackState::Stopped
    }

    /// Did the timeline stop during the last processed tick?
    pub fn was_running(&self) -> bool {
        self.was_running
    }

    /// Loop body wraps of an endless timeline since the last rewind.
    pub fn completed_loops(&self) -> u64 {
        self.completed_loops
    }

    /// Loop body iterations still ahead: -1 when endless, 0 without loops.
    pub fn remaining_loops(&self) -> i32 {
        let n = self.params.number_of_loops;
        if n < 0 {
            return -1;
        }
        match self.phase() {
            LoopPhase::Single | LoopPhase::Outro => 0,
            LoopPhase::Intro => n,
            LoopPhase::Loop(k) => (n - k).max(0),
        }
    }

    /// Was time `t` traversed during the last processed tick?
    ///
    /// Covers `(before, after]`, plus `before` itself on the first tick
    /// after a start.
    pub fn has_passed_time(&self, t: f64) -> bool {
        self.record.spans.iter().any(|span| span.contains(t))
    }

    /// Was loop `index` left during the last processed tick?
    ///
    /// A negative index asks whether the loop index changed at all.
    pub fn has_passed_loop(&self, index: i32) -> bool {
        let TickRecord {
            from_loop,
            to_loop,
            forward,
            finished,
            wraps,
            ..
        } = self.record;

        if index < 0 {
            return from_loop != to_loop || wraps > 0;
        }
        if (finished || wraps > 0) && index == to_loop {
            return true;
        }
        if forward {
            from_loop <= index && index < to_loop
        } else {
            to_loop < index && index <= from_loop
        }
    }

    // =========================================================================
    // Playback control
    // =========================================================================

    /// Rewind and play forward.
    pub fn start(&mut self) {
        self.rewind();
        self.stop_at = None;
        self.play(false);
    }

    /// Seek to the end and play backward.
    pub fn start_backward(&mut self) {
        let p = self.params;
        let (time, index) = match p.number_of_loops {
            0 => (p.end_time, 0),
            n if n > 0 => (p.end_time, n.saturating_add(1)),
            _ => (p.loop_end_time, 1),
        };
        self.current_time = time;
        self.current_loop = index;
        self.stop_at = None;
        self.clear_record();
        self.play(true);
    }

    /// Play `[start, end]` forward inside the current layout and stop on
    /// first reaching `end`.
    ///
    /// A start inside the loop body enters the first iteration. Fails if
    /// the layout cannot play the range.
    pub fn start_range(&mut self, start: f64, end: f64) -> bool {
        if self.params.validate_range(start, end).is_err() {
            return false;
        }
        let (time, index) = (self.current_time, self.current_loop);
        self.current_loop = 0;
        if !self.set_current_time(start) {
            self.current_time = time;
            self.current_loop = index;
            return false;
        }
        self.completed_loops = 0;
        self.stop_at = Some(end);
        self.play(false);
        true
    }

    /// End of the range being played by `start_range`.
    pub fn stop_time(&self) -> Option<f64> {
        self.stop_at
    }

    fn play(&mut self, backward: bool) {
        self.backward = backward;
        self.playback = PlaybackState::Started;
        debug!(
            time = self.current_time,
            loop_index = self.current_loop,
            backward,
            "timeline started"
        );
    }

    /// Stop playback in place.
    pub fn stop(&mut self) {
        if self.is_running() {
            self.was_running = true;
        }
        self.playback = PlaybackState::Stopped;
    }

    /// Pause a running timeline.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.playback = PlaybackState::Paused;
        true
    }

    /// Resume a paused timeline in its previous direction.
    pub fn resume(&mut self) -> bool {
        if !self.is_paused() {
            return false;
        }
        self.playback = if self.backward {
            PlaybackState::Backward
        } else {
            PlaybackState::Forward
        };
        true
    }

    /// Jump to the start of the start loop.
    pub fn rewind(&mut self) {
        self.completed_loops = 0;
        self.current_loop = self.params.start_loop;
        self.current_time = self.phase_range(self.current_loop).0;
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Replace the phase layout. The timeline is stopped and rewound.
    pub fn set_params(&mut self, params: TimelineParams) -> Result<(), TimelineError> {
        params.validate()?;
        self.params = params;
        self.playback = PlaybackState::Stopped;
        self.stop_at = None;
        self.clear_record();
        self.rewind();
        Ok(())
    }

    /// Set the time scale. Fails if not finite.
    pub fn set_time_scale(&mut self, time_scale: f64) -> bool {
        if !time_scale.is_finite() {
            return false;
        }
        self.params.time_scale = time_scale;
        true
    }

    /// Enable or disable auto-rewind.
    pub fn set_auto_rewind(&mut self, auto_rewind: bool) {
        self.params.auto_rewind = auto_rewind;
    }

    /// Change the loop count, keeping position when still valid.
    pub fn set_number_of_loops(&mut self, number_of_loops: i32) -> bool {
        let params = TimelineParams {
            number_of_loops,
            ..self.params
        };
        self.reshape(params)
    }

    /// Change the overall range, keeping position when still valid.
    pub fn set_range(&mut self, start_time: f64, end_time: f64) -> bool {
        let params = TimelineParams {
            start_time,
            end_time,
            ..self.params
        };
        self.reshape(params)
    }

    /// Change the loop body range, keeping position when still valid.
    pub fn set_loop_range(&mut self, loop_start_time: f64, loop_end_time: f64) -> bool {
        let params = TimelineParams {
            loop_start_time,
            loop_end_time,
            ..self.params
        };
        self.reshape(params)
    }

    fn reshape(&mut self, params: TimelineParams) -> bool {
        if params.validate().is_err() {
            return false;
        }
        let time = self.current_time;
        self.params = params;
        if !self.set_current_time(time) {
            self.rewind();
            self.clear_record();
        }
        true
    }

    /// Seek to `time`, recomputing the loop index.
    ///
    /// Inside the loop body the current iteration is kept (or the first one
    /// entered). Fails outside the reachable range.
    pub fn set_current_time(&mut self, time: f64) -> bool {
        let p = self.params;
        if !time.is_finite() || time < p.start_time || time > p.end_time {
            return false;
        }

        let index = match p.number_of_loops {
            0 => 0,
            n => {
                if time < p.loop_start_time {
                    0
                } else if time < p.loop_end_time || (n < 0 && time == p.loop_end_time) {
                    match self.phase() {
                        LoopPhase::Loop(k) => k,
                        _ => 1,
                    }
                } else if n > 0 {
                    n.saturating_add(1)
                } else {
                    return false;
                }
            }
        };

        self.current_time = time;
        self.current_loop = index;
        self.clear_record();
        true
    }

    /// Seek to loop `index`, clamping the current time into its phase.
    pub fn set_current_loop(&mut self, index: i32) -> bool {
        if !self.params.is_valid_loop(index) {
            return false;
        }
        let (low, high) = self.phase_range(index);
        self.current_loop = index;
        self.current_time = self.current_time.clamp(low, high);
        self.clear_record();
        true
    }

    fn phase_range(&self, index: i32) -> (f64, f64) {
        let p = &self.params;
        match self.phase_of(index) {
            LoopPhase::Single => (p.start_time, p.end_time),
            LoopPhase::Intro => (p.start_time, p.loop_start_time),
            LoopPhase::Loop(_) => (p.loop_start_time, p.loop_end_time),
            LoopPhase::Outro => (p.loop_end_time, p.end_time),
        }
    }

    fn clear_record(&mut self) {
        self.record = TickRecord {
            spans: Vec::new(),
            from_loop: self.current_loop,
            to_loop: self.current_loop,
            forward: !self.backward,
            finished: false,
            wraps: 0,
        };
    }

    // =========================================================================
    // Processing
    // =========================================================================

    /// Advance by `delta_time` (scaled by the time scale).
    pub fn process(&mut self, delta_time: f64) {
        self.was_running = false;

        let first = match self.playback {
            PlaybackState::Started => {
                self.playback = if self.backward {
                    PlaybackState::Backward
                } else {
                    PlaybackState::Forward
                };
                true
            }
            PlaybackState::Forward | PlaybackState::Backward => false,
            PlaybackState::Stopped | PlaybackState::Paused => {
                self.clear_record();
                return;
            }
        };

        let delta = delta_time * self.params.time_scale;
        let forward = (self.playback == PlaybackState::Forward) == (delta >= 0.0);
        let amount = if delta.is_finite() { delta.abs() } else { 0.0 };

        self.record.spans.clear();
        self.record.from_loop = self.current_loop;
        self.record.forward = forward;
        self.record.finished = false;
        self.record.wraps = 0;

        let finished = if forward {
            self.advance_forward(amount, first)
        } else {
            self.advance_backward(amount, first)
        };
        self.record.to_loop = self.current_loop;

        #[cfg(feature = "debug-tracing")]
        trace!(time = self.current_time, loop_index = self.current_loop, "timeline tick");

        if finished {
            self.stop_at = None;
            self.record.finished = true;
            self.playback = PlaybackState::Stopped;
            self.was_running = true;
            debug!(time = self.current_time, loop_index = self.current_loop, "timeline finished");
            if self.params.auto_rewind {
                self.rewind();
            }
        }
    }

    fn push_span(&mut self, low: f64, high: f64, low_inclusive: bool, high_inclusive: bool) {
        if low < high || (low == high && (low_inclusive || high_inclusive)) {
            self.record.spans.push(Span {
                low,
                high,
                low_inclusive,
                high_inclusive,
            });
        }
    }

    /// Returns true when the end was reached.
    fn advance_forward(&mut self, amount: f64, mut inclusive: bool) -> bool {
        let p = self.params;
        let mut remaining = amount;
        let mut time = self.current_time;

        loop {
            let phase = self.phase();
            let phase_end = match phase {
                LoopPhase::Single | LoopPhase::Outro => p.end_time,
                LoopPhase::Intro => p.loop_start_time,
                LoopPhase::Loop(_) => p.loop_end_time,
            };
            // A range stop inside this phase ends playback there.
            let (boundary, bounded) = match self.stop_at {
                Some(stop) if time <= stop && stop <= phase_end => (stop, true),
                _ => (phase_end, false),
            };
            let room = (boundary - time).max(0.0);

            if remaining < room {
                self.push_span(time, time + remaining, inclusive, true);
                self.current_time = time + remaining;
                return false;
            }

            self.push_span(time, boundary, inclusive, true);
            remaining -= room;
            time = boundary;

            if bounded {
                self.current_time = boundary;
                return true;
            }

            match phase {
                LoopPhase::Single | LoopPhase::Outro => {
                    self.current_time = boundary;
                    return true;
                }
                LoopPhase::Intro => {
                    self.current_loop = 1;
                    inclusive = false;
                }
                LoopPhase::Loop(_) if p.is_endless() => {
                    remaining = self.wrap_endless(remaining);
                    time = p.loop_start_time;
                    inclusive = true;
                }
                LoopPhase::Loop(k) => {
                    let ahead = i64::from(p.number_of_loops) - i64::from(k);
                    if ahead <= 0 {
                        self.current_loop = p.number_of_loops.saturating_add(1);
                        inclusive = false;
                        continue;
                    }

                    let skipped = self.skip_whole_loops(remaining, ahead - 1);
                    if skipped > 0 {
                        self.push_span(p.loop_start_time, p.loop_end_time, true, true);
                        remaining = (remaining - skipped as f64 * (p.loop_end_time - p.loop_start_time)).max(0.0);
                    }
                    self.current_loop = saturating_loop(i64::from(k) + skipped + 1);
                    time = p.loop_start_time;
                    inclusive = true;
                }
            }
        }
    }

    /// Returns true when the start was reached.
    fn advance_backward(&mut self, amount: f64, mut inclusive: bool) -> bool {
        let p = self.params;
        let mut remaining = amount;
        let mut time = self.current_time;

        loop {
            let phase = self.phase();
            let boundary = match phase {
                LoopPhase::Single | LoopPhase::Intro => p.start_time,
                LoopPhase::Loop(_) => p.loop_start_time,
                LoopPhase::Outro => p.loop_end_time,
            };
            let room = (time - boundary).max(0.0);

            if remaining < room {
                self.push_span(time - remaining, time, true, inclusive);
                self.current_time = time - remaining;
                return false;
            }

            self.push_span(boundary, time, true, inclusive);
            remaining -= room;
            time = boundary;

            match phase {
                LoopPhase::Single | LoopPhase::Intro => {
                    self.current_time = boundary;
                    return true;
                }
                LoopPhase::Outro => {
                    self.current_loop = p.number_of_loops;
                    inclusive = false;
                }
                LoopPhase::Loop(_) if p.is_endless() => {
                    remaining = self.wrap_endless(remaining);
                    time = p.loop_end_time;
                    inclusive = true;
                }
                LoopPhase::Loop(k) => {
                    let ahead = i64::from(k) - 1;
                    if ahead <= 0 {
                        self.current_loop = 0;
                        inclusive = false;
                        continue;
                    }

                    let skipped = self.skip_whole_loops(remaining, ahead - 1);
                    if skipped > 0 {
                        self.push_span(p.loop_start_time, p.loop_end_time, true, true);
                        remaining = (remaining - skipped as f64 * (p.loop_end_time - p.loop_start_time)).max(0.0);
                    }
                    self.current_loop = saturating_loop(i64::from(k) - skipped - 1);
                    time = p.loop_end_time;
                    inclusive = true;
                }
            }
        }
    }

    /// Wrap an endless loop body at least once, consuming whole iterations.
    /// Returns the time left over.
    fn wrap_endless(&mut self, remaining: f64) -> f64 {
        let p = self.params;
        // Validation keeps endless loop bodies non-empty.
        let length = p.loop_end_time - p.loop_start_time;
        let whole = (remaining / length).floor();
        if whole >= 1.0 {
            self.push_span(p.loop_start_time, p.loop_end_time, true, true);
        }
        let wraps = (whole as u64).saturating_add(1);
        self.record.wraps = self.record.wraps.saturating_add(wraps);
        self.completed_loops = self.completed_loops.saturating_add(wraps);
        remaining % length
    }

    /// Whole loop body iterations `remaining` covers, at most `limit`.
    fn skip_whole_loops(&self, remaining: f64, limit: i64) -> i64 {
        if limit <= 0 {
            return 0;
        }
        let length = self.params.loop_end_time - self.params.loop_start_time;
        if length <= 0.0 {
            return limit;
        }
        let whole = (remaining / length).floor();
        if whole >= limit as f64 {
            limit
        } else {
            whole as i64
        }
    }
}

fn saturating_loop(index: i64) -> i32 {
    index.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl StepLogic for Timeline {
    fn on_reset(&mut self) {
        self.playback = PlaybackState::Stopped;
        self.was_running = false;
        self.rewind();
        self.clear_record();
    }

    fn on_process_tick(&mut self, ctx: &LogicContext) {
        self.process(ctx.tick_duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn looped(number_of_loops: i32) -> Timeline {
        Timeline::new(TimelineParams::new(0.0, 10.0).with_loop(2.0, 8.0, number_of_loops)).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_loop_boundary_scenario() {
        let mut timeline = looped(2);
        timeline.start();

        timeline.process(3.0);
        assert_eq!(timeline.current_loop(), 1);
        assert!(close(timeline.current_time(), 3.0));
        assert!(timeline.has_passed_time(0.0));
        assert!(timeline.has_passed_time(2.0));
        assert!(timeline.has_passed_loop(0));
        assert!(!timeline.has_passed_loop(1));

        timeline.process(3.0);
        assert!(close(timeline.current_time(), 6.0));
        assert!(!timeline.has_passed_time(2.0));
        assert!(!timeline.has_passed_loop(-1));

        // First overshoot past 8: carried into loop 2
        timeline.process(3.0);
        assert_eq!(timeline.current_loop(), 2);
        assert!(close(timeline.current_time(), 3.0));
        assert!(timeline.has_passed_loop(1));
        assert!(timeline.has_passed_loop(-1));

        timeline.process(3.0);
        assert!(close(timeline.current_time(), 6.0));

        // Second overshoot: outro
        timeline.process(3.0);
        assert_eq!(timeline.current_loop(), 3);
        assert_eq!(timeline.phase(), LoopPhase::Outro);
        assert!(close(timeline.current_time(), 9.0));
        assert!(timeline.has_passed_loop(2));
        assert!(!timeline.has_passed_loop(3));
        assert!(timeline.is_running());

        timeline.process(3.0);
        assert!(timeline.is_stopped());
        assert!(timeline.was_running());
        assert!(close(timeline.current_time(), 10.0));
        assert!(timeline.has_passed_loop(3));
    }

    #[test]
    fn test_endless_never_stops() {
        let mut timeline = looped(-1);
        timeline.start();
        for _ in 0..1000 {
            timeline.process(3.0);
            assert!(timeline.is_running());
            assert_ne!(timeline.current_loop(), 3);
            assert_eq!(timeline.remaining_loops(), -1);
            assert!(timeline.current_time() <= 8.0);
        }
        assert_eq!(timeline.current_loop(), 1);
        assert!(timeline.completed_loops() > 3);
    }

    #[test]
    fn test_auto_rewind_round_trip() {
        let params = TimelineParams::new(1.0, 4.0).with_auto_rewind(true);
        let mut timeline = Timeline::new(params).unwrap();
        timeline.start();

        timeline.process(2.0);
        assert!(!timeline.was_running());
        timeline.process(2.0);

        assert!(timeline.is_stopped());
        assert_eq!(timeline.current_time(), 1.0);
        assert_eq!(timeline.current_loop(), 0);
        assert!(timeline.was_running());
        assert!(timeline.has_passed_time(4.0));

        timeline.process(2.0);
        assert!(!timeline.was_running());
        assert!(!timeline.has_passed_time(4.0));
    }

    #[test]
    fn test_single_segment() {
        let mut timeline = Timeline::new(TimelineParams::new(0.0, 1.0)).unwrap();
        assert_eq!(timeline.phase(), LoopPhase::Single);
        assert_eq!(timeline.remaining_loops(), 0);

        timeline.start();
        timeline.process(0.5);
        assert_eq!(timeline.current_loop(), 0);
        timeline.process(0.5);
        assert!(timeline.is_stopped());
        assert_eq!(timeline.current_time(), 1.0);
    }

    #[test]
    fn test_stopped_timeline_does_not_move() {
        let mut timeline = looped(2);
        timeline.process(3.0);
        assert_eq!(timeline.current_time(), 0.0);
        assert!(!timeline.has_passed_time(0.0));
    }

    #[test]
    fn test_skipped_intro_and_outro() {
        let params = TimelineParams::new(0.0, 4.0).with_loop(0.0, 4.0, 2);
        let mut timeline = Timeline::new(params).unwrap();
        timeline.start();

        timeline.process(1.0);
        assert_eq!(timeline.current_loop(), 1);
        assert!(close(timeline.current_time(), 1.0));

        timeline.process(3.0);
        assert_eq!(timeline.current_loop(), 2);
        assert!(close(timeline.current_time(), 0.0));

        timeline.process(4.0);
        assert!(timeline.is_stopped());
        assert_eq!(timeline.current_loop(), 3);
        assert_eq!(timeline.current_time(), 4.0);
    }

    #[test]
    fn test_large_delta_skips_whole_loops() {
        let mut timeline = looped(-1);
        timeline.start();
        timeline.process(2.0 + 6.0 * 1000.0 + 1.5);
        assert_eq!(timeline.current_loop(), 1);
        assert_eq!(timeline.completed_loops(), 1000);
        assert!(close(timeline.current_time(), 3.5));
        assert!(timeline.has_passed_loop(1));
        assert!(timeline.has_passed_loop(-1));

        let mut finite = looped(5);
        finite.start();
        finite.process(1000.0);
        assert!(finite.is_stopped());
        assert_eq!(finite.current_loop(), 6);
        assert!(finite.has_passed_loop(3));
    }

    #[test]
    fn test_backward_playback() {
        let mut timeline = looped(2);
        timeline.start_backward();
        assert_eq!(timeline.current_loop(), 3);

        timeline.process(3.0);
        assert_eq!(timeline.current_loop(), 2);
        assert!(close(timeline.current_time(), 7.0));
        assert!(timeline.has_passed_time(10.0));
        assert!(timeline.has_passed_time(8.0));
        assert!(timeline.has_passed_loop(3));

        timeline.process(6.0);
        assert_eq!(timeline.current_loop(), 1);
        assert!(close(timeline.current_time(), 7.0));
        assert!(timeline.has_passed_loop(2));

        timeline.process(20.0);
        assert!(timeline.is_stopped());
        assert!(timeline.was_running());
        assert_eq!(timeline.current_time(), 0.0);
        assert_eq!(timeline.current_loop(), 0);
    }

    #[test]
    fn test_negative_time_scale_plays_backward() {
        let params = TimelineParams::new(0.0, 4.0).with_time_scale(-1.0);
        let mut timeline = Timeline::new(params).unwrap();
        timeline.start();
        assert!(timeline.set_current_time(3.0));

        timeline.process(1.0);
        assert!(close(timeline.current_time(), 2.0));
        timeline.process(5.0);
        assert!(timeline.is_stopped());
        assert_eq!(timeline.current_time(), 0.0);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut timeline = looped(2);
        assert!(!timeline.pause());
        timeline.start();
        timeline.process(1.0);

        assert!(timeline.pause());
        assert!(timeline.is_paused());
        assert!(!timeline.is_running());
        timeline.process(1.0);
        assert!(close(timeline.current_time(), 1.0));

        assert!(timeline.resume());
        assert!(!timeline.resume());
        assert_eq!(timeline.playback_state(), PlaybackState::Forward);
        timeline.process(1.0);
        assert!(close(timeline.current_time(), 2.0));
    }

    #[test]
    fn test_explicit_stop_reports_was_running() {
        let mut timeline = looped(2);
        timeline.start();
        timeline.stop();
        assert!(timeline.is_stopped());
        assert!(timeline.was_running());
        timeline.process(1.0);
        assert!(!timeline.was_running());
    }

    #[test]
    fn test_set_current_time_recomputes_loop() {
        let mut timeline = looped(2);
        assert!(timeline.set_current_time(1.0));
        assert_eq!(timeline.current_loop(), 0);
        assert!(timeline.set_current_time(5.0));
        assert_eq!(timeline.current_loop(), 1);
        assert!(timeline.set_current_loop(2));
        assert!(timeline.set_current_time(7.0));
        assert_eq!(timeline.current_loop(), 2);
        assert!(timeline.set_current_time(8.0));
        assert_eq!(timeline.current_loop(), 3);
        assert!(!timeline.set_current_time(11.0));
        assert!(!timeline.set_current_time(f64::NAN));

        let mut endless = looped(-1);
        assert!(endless.set_current_time(8.0));
        assert!(!endless.set_current_time(9.0));
    }

    #[test]
    fn test_set_current_loop_clamps_time() {
        let mut timeline = looped(2);
        assert!(timeline.set_current_time(9.0));
        assert!(timeline.set_current_loop(1));
        assert_eq!(timeline.current_time(), 8.0);
        assert!(timeline.set_current_loop(0));
        assert_eq!(timeline.current_time(), 2.0);
        assert!(!timeline.set_current_loop(4));
        assert!(!timeline.set_current_loop(-1));
        assert_eq!(timeline.remaining_loops(), 2);
    }

    #[test]
    fn test_seek_continues_consistently() {
        let mut timeline = looped(2);
        timeline.start();
        assert!(timeline.set_current_time(7.0));
        timeline.process(2.0);
        assert_eq!(timeline.current_loop(), 2);
        assert!(close(timeline.current_time(), 3.0));
    }

    #[test]
    fn test_start_range() {
        let mut timeline = looped(2);
        assert!(timeline.start_range(1.0, 2.0));
        assert_eq!(timeline.current_time(), 1.0);
        assert_eq!(timeline.phase(), LoopPhase::Intro);
        assert_eq!(timeline.stop_time(), Some(2.0));
        timeline.process(1.0);
        assert!(timeline.is_stopped());
        assert!(timeline.was_running());
        assert_eq!(timeline.current_time(), 2.0);
        assert_eq!(timeline.current_loop(), 0);
        assert_eq!(timeline.stop_time(), None);
        assert!(!timeline.start_range(3.0, 2.0));
        assert!(!timeline.start_range(9.0, 11.0));
        assert_eq!(timeline.current_time(), 2.0);
    }

    #[test]
    fn test_start_range_keeps_loop_layout() {
        let mut timeline = looped(2);

        // Spans the intro, both iterations and part of the outro.
        assert!(timeline.start_range(1.0, 9.0));
        timeline.process(3.0);
        assert_eq!(timeline.current_loop(), 1);
        assert!(close(timeline.current_time(), 4.0));
        timeline.process(10.0);
        assert_eq!(timeline.current_loop(), 3);
        assert!(close(timeline.current_time(), 8.0));
        assert!(timeline.is_running());
        timeline.process(5.0);
        assert!(timeline.is_stopped());
        assert_eq!(timeline.current_time(), 9.0);
        assert_eq!(timeline.params().number_of_loops, 2);
        assert_eq!(timeline.params().end_time, 10.0);

        // A body range stops in the first iteration.
        assert!(timeline.start_range(3.0, 5.0));
        assert_eq!(timeline.current_loop(), 1);
        timeline.process(4.0);
        assert!(timeline.is_stopped());
        assert_eq!(timeline.current_loop(), 1);
        assert_eq!(timeline.current_time(), 5.0);

        // A plain start plays the whole layout again.
        timeline.start();
        assert_eq!(timeline.stop_time(), None);
        timeline.process(100.0);
        assert_eq!(timeline.current_time(), 10.0);
        assert_eq!(timeline.current_loop(), 3);
    }

    #[test]
    fn test_setters_revalidate() {
        let mut timeline = looped(2);
        assert!(!timeline.set_time_scale(f64::INFINITY));
        assert!(timeline.set_time_scale(2.0));
        assert!(!timeline.set_loop_range(9.0, 12.0));
        assert!(timeline.set_number_of_loops(-1));
        assert_eq!(timeline.remaining_loops(), -1);
        assert!(!timeline.set_range(5.0, 1.0));
        assert!(timeline.set_range(0.0, 20.0));
        assert_eq!(timeline.params().end_time, 20.0);
    }

    #[test]
    fn test_step_integration() {
        let handle = Timeline::shared(TimelineParams::new(0.0, 1.0)).unwrap();
        let ctx = LogicContext::new(0.25);
        handle.borrow_mut().logic_mut().start();

        {
            use crate::logic::stepable::Stepable;
            let mut step = handle.borrow_mut();
            step.process_tick(&ctx);
            step.process_tick(&ctx);
            assert_eq!(step.logic().current_time(), 0.5);

            step.reset();
            assert!(step.logic().is_stopped());
            assert_eq!(step.logic().current_time(), 0.0);
        }
    }

    #[test]
    fn test_chunked_deltas_match_single_delta() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut chunked = looped(4);
            let mut whole = looped(4);
            chunked.start();
            whole.start();

            let mut total = 0.0;
            for _ in 0..rng.gen_range(1..20) {
                let delta: f64 = rng.gen_range(0.0..3.0);
                total += delta;
                chunked.process(delta);
            }
            whole.process(total);

            assert_eq!(chunked.current_loop(), whole.current_loop());
            assert!((chunked.current_time() - whole.current_time()).abs() < 1e-6);
            assert_eq!(chunked.is_stopped(), whole.is_stopped());
        }
    }

    proptest! {
        #[test]
        fn prop_loop_index_stays_in_range(
            loops in 0i32..6,
            deltas in prop::collection::vec(0.0f64..5.0, 1..100),
        ) {
            let mut timeline = looped(loops);
            timeline.start();
            for delta in deltas {
                timeline.process(delta);
                prop_assert!(timeline.current_loop() >= 0);
                prop_assert!(timeline.current_loop() <= loops + 1);
                prop_assert!(timeline.current_time() >= 0.0);
                prop_assert!(timeline.current_time() <= 10.0);
            }
        }

        #[test]
        fn prop_endless_never_reaches_outro(deltas in prop::collection::vec(0.0f64..50.0, 1..100)) {
            let mut timeline = looped(-1);
            timeline.start();
            for delta in deltas {
                timeline.process(delta);
                prop_assert!(!timeline.is_stopped());
                prop_assert!(timeline.phase() != LoopPhase::Outro);
                prop_assert_eq!(timeline.remaining_loops(), -1);
            }
        }

        #[test]
        fn prop_loop_index_never_decreases_forward(deltas in prop::collection::vec(0.0f64..4.0, 1..60)) {
            let mut timeline = looped(3);
            timeline.start();
            let mut last = timeline.current_loop();
            for delta in deltas {
                timeline.process(delta);
                prop_assert!(timeline.current_loop() >= last);
                last = timeline.current_loop();
            }
        }
    }
}
