// ============================================================================
// spark-sim - Evaluation Context
// Per-graph state for tracking which computation is currently running
// ============================================================================
//
// A server function discovers its dependencies by whatever it happens to
// read at runtime. We record that with an explicit stack of "currently
// evaluating" nodes. The context is owned by the graph and handed down by
// &mut, never stored in a thread-local, so independent sessions on the
// same thread cannot observe each other.
// ============================================================================

use crate::core::types::NodeId;

// =============================================================================
// EVALUATION CONTEXT
// =============================================================================

/// Evaluation stack and pass counters for one graph.
#[derive(Debug, Default)]
pub struct EvaluationContext {
    /// Nodes whose compute function is running, outermost first
    stack: Vec<NodeId>,

    /// Number of flush passes started so far
    flush_passes: u64,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // STACK
    // =========================================================================

    /// Push a node whose compute function is about to run
    pub fn push(&mut self, node: NodeId) {
        self.stack.push(node);
    }

    /// Pop the innermost node
    pub fn pop(&mut self) -> Option<NodeId> {
        self.stack.pop()
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Slice of the stack starting at the first occurrence of `node`.
    ///
    /// Used to report the chain of a cyclic dependency.
    pub fn chain_from(&self, node: NodeId) -> Option<&[NodeId]> {
        let start = self.stack.iter().position(|&n| n == node)?;
        Some(&self.stack[start..])
    }

    // =========================================================================
    // FLUSH PASSES
    // =========================================================================

    /// Enter a flush, returning the pass number
    pub fn begin_flush(&mut self) -> u64 {
        self.flush_passes += 1;
        self.flush_passes
    }

    /// Number of flushes started so far
    pub fn flush_passes(&self) -> u64 {
        self.flush_passes
    }
}

// =============================================================================
// TESTS
// =============================================================================
