// ============================================================================
// spark-sim - Reactive Graph
// Arena of nodes with dynamically discovered dependency edges
// ============================================================================
//
// Nodes live in a Vec and refer to each other by NodeId only. A node's
// dependency set is rebuilt from scratch every time its compute function
// runs: stale edges are dropped first, then every read performed through
// the Scope adds a fresh edge (see tracking.rs).
//
// Contract:
// - register: add a node under a unique key
// - evaluate: clean -> cached value; dirty -> run compute, cache, mark clean
// - mark_dirty: flag a node and everything downstream, no recomputation
// ============================================================================

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::core::constants::*;
use crate::core::context::EvaluationContext;
use crate::core::error::{ReactiveError, Result};
use crate::core::types::{ComputeFn, Node, NodeId, NodeKey, NodeKind, Value};
use crate::reactivity::tracking::Scope;

// =============================================================================
// REACTIVE GRAPH
// =============================================================================

/// Arena-backed reactive graph for one simulation session.
#[derive(Debug, Default)]
pub struct ReactiveGraph {
    /// Node arena, indexed by NodeId
    nodes: Vec<Node>,

    /// Name index (inputs and declared nodes in separate namespaces)
    index: BTreeMap<NodeKey, NodeId>,

    /// Evaluation stack and flush counters
    context: EvaluationContext,
}

impl ReactiveGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Register a node under `key`.
    ///
    /// Input nodes take no compute function; every other kind needs one.
    pub fn register(
        &mut self,
        key: NodeKey,
        kind: NodeKind,
        compute: Option<ComputeFn>,
    ) -> Result<NodeId> {
        if self.index.contains_key(&key) {
            return Err(ReactiveError::DuplicateNode { name: key.label() });
        }
        let expected_compute = kind != NodeKind::Input;
        if compute.is_some() != expected_compute {
            return Err(ReactiveError::WrongKind {
                name: key.label(),
                actual: kind.as_str(),
                expected: if expected_compute { "a computed node" } else { "a source node" },
            });
        }

        let id = NodeId::from_index(self.nodes.len());
        trace!(node = %key.label(), kind = %kind, id = %id, "registered node");
        self.index.insert(key.clone(), id);
        self.nodes.push(Node::new(key, kind, compute));
        Ok(id)
    }

    /// Id of the input node `name`, creating it (unset) on first use.
    pub fn input_node(&mut self, name: &str) -> NodeId {
        let key = NodeKey::Input(name.to_string());
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = NodeId::from_index(self.nodes.len());
        trace!(node = %key.label(), id = %id, "created input node");
        self.index.insert(key.clone(), id);
        self.nodes.push(Node::new(key, NodeKind::Input, None));
        id
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    pub fn lookup(&self, key: &NodeKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Id of the declared (non-input) node `name`
    pub fn find(&self, name: &str) -> Result<NodeId> {
        self.lookup(&NodeKey::Named(name.to_string()))
            .ok_or_else(|| ReactiveError::UnknownNode { name: name.to_string() })
    }

    /// Id of `name`, checking it has the expected kind
    pub fn find_kind(&self, name: &str, expected: &[NodeKind]) -> Result<NodeId> {
        let id = self.find(name)?;
        let kind = self.node(id)?.kind();
        if expected.contains(&kind) {
            Ok(id)
        } else {
            Err(ReactiveError::WrongKind {
                name: name.to_string(),
                actual: kind.as_str(),
                expected: expected
                    .first()
                    .map(|k| k.as_str())
                    .unwrap_or("another kind"),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All registered keys in name order
    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.index.keys()
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| ReactiveError::UnknownNode { name: id.to_string() })
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| ReactiveError::UnknownNode { name: id.to_string() })
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.node(id)?.kind())
    }

    /// Label for errors and traces; falls back to the raw id
    pub fn label(&self, id: NodeId) -> String {
        self.node(id).map(Node::label).unwrap_or_else(|_| id.to_string())
    }

    pub fn is_dirty(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.is_dirty())
    }

    pub fn is_failed(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.is_failed())
    }

    pub fn is_evaluating(&self, id: NodeId) -> bool {
        self.node(id).map(Node::is_evaluating).unwrap_or(false)
    }

    /// How many times the node's compute function has run
    pub fn compute_count(&self, id: NodeId) -> Result<u64> {
        Ok(self.node(id)?.compute_count)
    }

    /// Sum of compute runs over the whole graph
    pub fn total_computations(&self) -> u64 {
        self.nodes.iter().map(|n| n.compute_count).sum()
    }

    /// Nodes read during the node's most recent evaluation
    pub fn dependencies(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.node(id)?.dependencies.iter().copied().collect())
    }

    /// Nodes whose most recent evaluation read this node
    pub fn dependents(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.node(id)?.dependents.iter().copied().collect())
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut EvaluationContext {
        &mut self.context
    }

    // =========================================================================
    // SINKS
    // =========================================================================

    /// Active outputs and timers, in registration order
    pub fn active_sinks(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind().is_sink() && n.is_active())
            .map(|(i, _)| NodeId::from_index(i))
            .collect()
    }

    /// Suspend or resume a sink as a flush root
    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<()> {
        let node = self.node_mut(id)?;
        if !node.kind().is_sink() {
            return Err(ReactiveError::WrongKind {
                name: node.label(),
                actual: node.kind().as_str(),
                expected: "output or timer",
            });
        }
        node.set_flag(ACTIVE, active);
        Ok(())
    }

    pub fn is_active(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.is_active())
    }

    // =========================================================================
    // SOURCES
    // =========================================================================

    /// Store a new value on a source node. Does not invalidate.
    pub fn write_source(&mut self, id: NodeId, value: Value) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.kind() != NodeKind::Input {
            return Err(ReactiveError::WrongKind {
                name: node.label(),
                actual: node.kind().as_str(),
                expected: "input",
            });
        }
        node.value = Some(value);
        Ok(())
    }

    /// Raw value of a source node (None while unset)
    pub fn source_value(&self, id: NodeId) -> Result<Option<Value>> {
        Ok(self.node(id)?.value.clone())
    }

    // =========================================================================
    // RENDERED VALUES
    // =========================================================================

    /// Value of a sink as of the last flush that covered it.
    ///
    /// Never evaluates: a cached failure is returned as is, and a sink no
    /// flush has produced yet reports `OutputNotRendered`.
    pub fn rendered(&self, id: NodeId) -> Result<Value> {
        let node = self.node(id)?;
        if node.is_failed() {
            if let Some(err) = &node.error {
                return Err(err.clone());
            }
        }
        node.value
            .clone()
            .ok_or_else(|| ReactiveError::OutputNotRendered { name: node.label() })
    }

    // =========================================================================
    // EVALUATE
    // =========================================================================

    /// Read a node's value, recomputing first if it is dirty.
    ///
    /// A clean node answers from cache with no side effects. A dirty node
    /// runs its compute function with a fresh Scope; reads performed there
    /// become the node's new dependency set. Re-entering a node already on
    /// the evaluation stack fails with `CyclicDependency` and caches nothing.
    pub fn evaluate(&mut self, id: NodeId) -> Result<Value> {
        let node = self.node(id)?;

        if node.is_evaluating() {
            return Err(self.cycle_error(id));
        }

        if node.kind() == NodeKind::Input {
            let value = node.value.clone();
            let input = node.key.name().to_string();
            self.node_mut(id)?.mark_clean();
            return value.ok_or(ReactiveError::UnsetInputAccessed { input });
        }

        if node.is_clean() {
            if let Some(value) = &node.value {
                return Ok(value.clone());
            }
        }

        // Not retried until something upstream invalidates it again.
        if node.is_failed() {
            if let Some(err) = &node.error {
                return Err(err.clone());
            }
        }

        let Some(compute) = node.compute.clone() else {
            return Err(ReactiveError::WrongKind {
                name: node.label(),
                actual: node.kind().as_str(),
                expected: "a computed node",
            });
        };

        self.recompute(id, compute)
    }

    fn recompute(&mut self, id: NodeId, compute: ComputeFn) -> Result<Value> {
        self.clear_dependencies(id);

        {
            let node = self.node_mut(id)?;
            node.set_flag(EVALUATING, true);
            node.compute_count += 1;
        }
        trace!(
            node = %self.label(id),
            depth = self.context.depth(),
            "recomputing"
        );

        self.context.push(id);
        let result = {
            let guard = EvaluationGuard { graph: &mut *self, id };
            let mut scope = Scope::new(&mut *guard.graph, id);
            compute(&mut scope)
        };

        let node = self.node_mut(id)?;
        match result {
            Ok(value) => {
                node.value = Some(value.clone());
                node.error = None;
                node.set_flag(FAILED, false);
                node.mark_clean();
                Ok(value)
            }
            Err(err) => {
                // Stays dirty; the previous value is kept only for previous().
                node.set_flag(FAILED, true);
                node.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Build the error for re-entering `id` while it is being evaluated
    pub(crate) fn cycle_error(&self, id: NodeId) -> ReactiveError {
        let mut chain: Vec<String> = self
            .context
            .chain_from(id)
            .unwrap_or(&[])
            .iter()
            .map(|&n| self.label(n))
            .collect();
        chain.push(self.label(id));
        ReactiveError::CyclicDependency { chain }
    }

    // =========================================================================
    // MARK DIRTY
    // =========================================================================

    /// Mark a node and all of its current dependents dirty.
    ///
    /// Each node is visited at most once per call, so cyclic edges left by
    /// a failed evaluation cannot loop. Returns how many nodes went from
    /// clean (or failed) to freshly dirty. Nothing is recomputed here.
    pub fn mark_dirty(&mut self, id: NodeId) -> Result<usize> {
        self.node(id)?;

        let mut visited: BTreeSet<NodeId> = BTreeSet::new();
        let mut stack = vec![id];
        let mut invalidated = 0;

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let node = self.node_mut(current)?;
            if !node.is_dirty() || node.is_failed() {
                invalidated += 1;
            }
            node.mark_dirty();
            stack.extend(node.dependents.iter().copied());
        }

        Ok(invalidated)
    }
}

// =============================================================================
// EVALUATION GUARD
// =============================================================================

/// Leaves the evaluation stack even if the compute function panics, so a
/// caught panic does not show up later as a cycle.
struct EvaluationGuard<'g> {
    graph: &'g mut ReactiveGraph,
    id: NodeId,
}

impl Drop for EvaluationGuard<'_> {
    fn drop(&mut self) {
        self.graph.context.pop();
        if let Ok(node) = self.graph.node_mut(self.id) {
            node.set_flag(EVALUATING, false);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
