// ============================================================================
// spark-sim - Flush Scheduling
// Bring every active sink up to date in one synchronous pass
// ============================================================================
//
// There is no event loop to wait on. "Let reactive updates settle" is a
// single call that pulls every dirty output and timer through the graph.
// Evaluation is pull-based, so a node is only recomputed after the nodes it
// reads are clean, and a node recomputed once in a flush is clean for the
// rest of that flush.
//
// Key functions:
// - flush_report: run a flush, collecting failures without aborting
// - flush: same, but surface the first fresh failure as Err
// ============================================================================

use tracing::{debug, debug_span};

use crate::core::error::{ReactiveError, Result};
use crate::core::types::NodeId;
use crate::reactivity::graph::ReactiveGraph;

// =============================================================================
// FLUSH REPORT
// =============================================================================

/// What one flush did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Flush pass number within the session (starts at 1)
    pub pass: u64,

    /// Compute functions run during this flush, across all nodes
    pub recomputed: u64,

    /// Sinks that were dirty and are now up to date
    pub refreshed: Vec<NodeId>,

    /// Sinks whose computation failed during this flush, in flush order
    pub failures: Vec<(NodeId, ReactiveError)>,
}

impl FlushReport {
    /// True when no sink failed
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Surface the first failure, if any.
    pub fn into_result(self) -> Result<FlushReport> {
        match self.failures.first() {
            Some((_, err)) => Err(err.clone()),
            None => Ok(self),
        }
    }
}

// =============================================================================
// FLUSH
// =============================================================================

/// Recompute every dirty node reachable from the active sinks.
///
/// Sinks are visited in registration order. A failing sink is recorded and
/// the flush carries on with the remaining sinks, so independent branches
/// still settle. Sinks that already failed and were not invalidated since
/// are skipped, which keeps a repeated flush free of recomputation.
pub fn flush_report(graph: &mut ReactiveGraph) -> FlushReport {
    let before = graph.total_computations();
    let pass = graph.context_mut().begin_flush();
    let span = debug_span!("flush", pass);
    let _enter = span.enter();

    let mut report = FlushReport {
        pass,
        ..FlushReport::default()
    };

    for sink in graph.active_sinks() {
        let due = matches!(
            (graph.is_dirty(sink), graph.is_failed(sink)),
            (Ok(true), Ok(false))
        );
        if !due {
            continue;
        }
        match graph.evaluate(sink) {
            Ok(_) => report.refreshed.push(sink),
            Err(err) => report.failures.push((sink, err)),
        }
    }

    report.recomputed = graph.total_computations() - before;

    debug!(
        recomputed = report.recomputed,
        refreshed = report.refreshed.len(),
        failures = report.failures.len(),
        "flush complete"
    );
    report
}

/// Flush, returning the first fresh sink failure as an error.
pub fn flush(graph: &mut ReactiveGraph) -> Result<FlushReport> {
    flush_report(graph).into_result()
}

// =============================================================================
// TESTS
// =============================================================================
