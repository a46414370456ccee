// ============================================================================
// spark-sim - Session Options
// ============================================================================

use crate::primitives::clock::TimerCatchUp;

/// Knobs for one simulation session.
///
/// ```
/// use spark_sim::{SessionOptions, TimerCatchUp};
///
/// let options = SessionOptions::new()
///     .label("histogram")
///     .flush_on_start(true)
///     .timer_catch_up(TimerCatchUp::ResetToNow);
/// assert_eq!(options.label, "histogram");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Name recorded on the session's tracing span
    pub label: String,

    /// Run one flush after capture, before the test body
    pub flush_on_start: bool,

    /// Where timers land after firing
    pub timer_catch_up: TimerCatchUp,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            label: String::from("session"),
            flush_on_start: false,
            timer_catch_up: TimerCatchUp::default(),
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn flush_on_start(mut self, flush: bool) -> Self {
        self.flush_on_start = flush;
        self
    }

    pub fn timer_catch_up(mut self, catch_up: TimerCatchUp) -> Self {
        self.timer_catch_up = catch_up;
        self
    }
}
