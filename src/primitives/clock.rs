// ============================================================================
// spark-sim - Virtual Clock
// Logical time for timer-driven nodes, advanced only on request
// ============================================================================
//
// The clock starts at 0 and never moves on its own. elapse(d) advances it,
// then invalidates every timer whose interval was crossed at least once
// since it last fired, then flushes. A timer that crossed several interval
// boundaries in one call fires once; missed ticks are not replayed.
// ============================================================================

use tracing::debug;

use crate::core::constants::CLOCK_START_MS;
use crate::core::error::{ReactiveError, Result};
use crate::core::types::NodeId;
use crate::reactivity::graph::ReactiveGraph;
use crate::reactivity::scheduling::{flush, FlushReport};

// =============================================================================
// CATCH-UP POLICY
// =============================================================================

/// Where a timer's last-fired mark lands after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerCatchUp {
    /// On the latest interval boundary crossed (keeps the timer's phase)
    #[default]
    AlignToInterval,
    /// On the current clock value
    ResetToNow,
}

// =============================================================================
// VIRTUAL CLOCK
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    node: NodeId,
    interval_ms: u64,
    last_fired_ms: u64,
}

/// What one `elapse` call did.
#[derive(Debug, Clone, PartialEq)]
pub struct ElapseReport {
    /// Clock value after advancing
    pub now_ms: u64,

    /// Timers invalidated by this call, in registration order
    pub fired: Vec<NodeId>,

    /// The flush that followed, if any timer fired
    pub flush: Option<FlushReport>,
}

/// Monotonic logical clock driving Timer nodes.
#[derive(Debug)]
pub struct VirtualClock {
    now_ms: u64,
    timers: Vec<TimerEntry>,
    catch_up: TimerCatchUp,
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::with_catch_up(TimerCatchUp::default())
    }

    pub fn with_catch_up(catch_up: TimerCatchUp) -> Self {
        Self {
            now_ms: CLOCK_START_MS,
            timers: Vec::new(),
            catch_up,
        }
    }

    /// Current logical time in milliseconds
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn catch_up(&self) -> TimerCatchUp {
        self.catch_up
    }

    pub fn set_catch_up(&mut self, catch_up: TimerCatchUp) {
        self.catch_up = catch_up;
    }

    /// Start driving `node` every `interval_ms`, counting from now.
    pub fn register_timer(&mut self, node: NodeId, name: &str, interval_ms: u64) -> Result<()> {
        if interval_ms == 0 {
            return Err(ReactiveError::InvalidInterval { name: name.to_string() });
        }
        self.timers.push(TimerEntry {
            node,
            interval_ms,
            last_fired_ms: self.now_ms,
        });
        Ok(())
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Milliseconds until the next timer boundary, if any timer exists
    pub fn next_due_in(&self) -> Option<u64> {
        self.timers
            .iter()
            .map(|t| t.last_fired_ms.saturating_add(t.interval_ms).saturating_sub(self.now_ms))
            .min()
    }

    /// Advance the clock and fire every due timer once.
    ///
    /// Timers are processed in registration order. A flush runs only when
    /// at least one timer fired; its first failure is returned as `Err`,
    /// with the clock already advanced.
    pub fn elapse(&mut self, graph: &mut ReactiveGraph, duration_ms: u64) -> Result<ElapseReport> {
        self.now_ms = self.now_ms.saturating_add(duration_ms);

        let fired = self.collect_due();
        for &node in &fired {
            graph.mark_dirty(node)?;
        }
        debug!(now_ms = self.now_ms, fired = fired.len(), "clock advanced");

        let flush = if fired.is_empty() {
            None
        } else {
            Some(flush(graph)?)
        };

        Ok(ElapseReport {
            now_ms: self.now_ms,
            fired,
            flush,
        })
    }

    /// Mark every due timer as fired and return their nodes
    fn collect_due(&mut self) -> Vec<NodeId> {
        let now = self.now_ms;
        let catch_up = self.catch_up;
        let mut fired = Vec::new();

        for timer in &mut self.timers {
            let since = now - timer.last_fired_ms;
            if since < timer.interval_ms {
                continue;
            }
            timer.last_fired_ms = match catch_up {
                TimerCatchUp::AlignToInterval => {
                    timer.last_fired_ms + (since / timer.interval_ms) * timer.interval_ms
                }
                TimerCatchUp::ResetToNow => now,
            };
            fired.push(timer.node);
        }

        fired
    }
}

// =============================================================================
// TESTS
// =============================================================================
