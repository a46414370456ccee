// ============================================================================
// spark-sim - Type Definitions
// Node identity, kinds and the arena slot behind every reactive node
// ============================================================================

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use super::constants::*;
use super::error::{ReactiveError, Result};
use crate::reactivity::tracking::Scope;

// =============================================================================
// VALUES
// =============================================================================
//
// Graph operations (mark dirty, link deps, schedule) never need the value
// type. Only reads at the edges (Scope::get, session accessors) downcast.
// So the arena stores type-erased values and typed handles carry the T.
// =============================================================================

/// Type-erased node value.
pub type Value = Rc<dyn Any>;

/// Type-erased compute function of a Derived, Output or Timer node.
pub type ComputeFn = Rc<dyn Fn(&mut Scope<'_>) -> Result<Value>>;

/// Wrap a concrete value for storage in the graph.
pub fn erase<T: 'static>(value: T) -> Value {
    Rc::new(value)
}

/// Downcast a stored value, cloning it out.
pub(crate) fn downcast<T: Clone + 'static>(value: &Value, label: &str) -> Result<T> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| ReactiveError::TypeMismatch {
            node: label.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

// =============================================================================
// NODE ID
// =============================================================================

/// Stable identifier of a node within one session's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Arena index of this node
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// NODE KIND
// =============================================================================

/// What a node is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Settable source: a simulated UI input or a reactive value
    Input,
    /// Lazy cached computation
    Derived,
    /// Output binding, refreshed by flush
    Output,
    /// Computation re-run when the virtual clock crosses its interval
    Timer,
}

impl NodeKind {
    /// The kind bit for this kind
    pub fn flag(self) -> u32 {
        match self {
            Self::Input => INPUT,
            Self::Derived => DERIVED,
            Self::Output => OUTPUT,
            Self::Timer => TIMER,
        }
    }

    /// Recover the kind from a flags bitmask
    pub fn from_flags(flags: u32) -> Option<Self> {
        match flags & KIND_MASK {
            INPUT => Some(Self::Input),
            DERIVED => Some(Self::Derived),
            OUTPUT => Some(Self::Output),
            TIMER => Some(Self::Timer),
            _ => None,
        }
    }

    /// Sinks are the roots a flush pulls from
    pub fn is_sink(self) -> bool {
        matches!(self, Self::Output | Self::Timer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Derived => "derived",
            Self::Output => "output",
            Self::Timer => "timer",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// NODE KEY
// =============================================================================

/// Name under which a node is registered.
///
/// Simulated inputs live in their own namespace so an input `x` and a
/// reactive `x` can coexist, as `input$x` and `x` do in a server function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    /// Entry of the input proxy
    Input(String),
    /// Declared reactive, output, timer or reactive value
    Named(String),
}

impl NodeKey {
    /// Human readable label used in errors and traces
    pub fn label(&self) -> String {
        match self {
            Self::Input(name) => format!("input${name}"),
            Self::Named(name) => name.clone(),
        }
    }

    /// Bare name without namespace
    pub fn name(&self) -> &str {
        match self {
            Self::Input(name) | Self::Named(name) => name,
        }
    }
}

// =============================================================================
// NODE (arena slot)
// =============================================================================

/// The data behind one reactive node.
///
/// Nodes reference each other only by [`NodeId`]; the arena owns them all,
/// so dependency and dependent sets never form ownership cycles.
pub(crate) struct Node {
    /// Registered name
    pub(crate) key: NodeKey,

    /// Flags bitmask (kind + status)
    pub(crate) flags: u32,

    /// Computation (None for inputs)
    pub(crate) compute: Option<ComputeFn>,

    /// Last computed value. Readable by others only while CLEAN;
    /// kept across invalidation so the node can see its previous value.
    pub(crate) value: Option<Value>,

    /// Cached failure while FAILED is set
    pub(crate) error: Option<ReactiveError>,

    /// Nodes read during the most recent evaluation
    pub(crate) dependencies: BTreeSet<NodeId>,

    /// Back-references: nodes whose last evaluation read this one
    pub(crate) dependents: BTreeSet<NodeId>,

    /// Number of times the compute function ran
    pub(crate) compute_count: u64,
}

impl Node {
    pub(crate) fn new(key: NodeKey, kind: NodeKind, compute: Option<ComputeFn>) -> Self {
        // Computations start dirty (never run); inputs start clean and unset.
        let status = if compute.is_some() { DIRTY } else { CLEAN };
        let active = if kind.is_sink() { ACTIVE } else { 0 };
        Self {
            key,
            flags: kind.flag() | status | active,
            compute,
            value: None,
            error: None,
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            compute_count: 0,
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        // Every node is constructed with exactly one kind bit.
        NodeKind::from_flags(self.flags).unwrap_or(NodeKind::Derived)
    }

    pub(crate) fn label(&self) -> String {
        self.key.label()
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.flags & DIRTY != 0
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.flags & CLEAN != 0
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.flags & FAILED != 0
    }

    pub(crate) fn is_evaluating(&self) -> bool {
        self.flags & EVALUATING != 0
    }

    pub(crate) fn is_active(&self) -> bool {
        self.flags & ACTIVE != 0
    }

    /// Mark as dirty; a new invalidation also forgets a cached failure
    pub(crate) fn mark_dirty(&mut self) {
        self.flags = ((self.flags & STATUS_MASK) | DIRTY) & !FAILED;
        self.error = None;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.flags = (self.flags & STATUS_MASK) | CLEAN;
    }

    pub(crate) fn set_flag(&mut self, flag: u32, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("flags", &format_args!("{:#b}", self.flags))
            .field("has_value", &self.value.is_some())
            .field("error", &self.error)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("compute_count", &self.compute_count)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: i32) -> ComputeFn {
        Rc::new(move |_| Ok(erase(value)))
    }

    #[test]
    fn computations_start_dirty_inputs_start_clean() {
        let derived = Node::new(NodeKey::Named("d".into()), NodeKind::Derived, Some(constant(1)));
        assert!(derived.is_dirty());
        assert!(!derived.is_clean());

        let input = Node::new(NodeKey::Input("x".into()), NodeKind::Input, None);
        assert!(input.is_clean());
        assert!(input.value.is_none());
    }

    #[test]
    fn only_sinks_start_active() {
        let output = Node::new(NodeKey::Named("o".into()), NodeKind::Output, Some(constant(1)));
        let timer = Node::new(NodeKey::Named("t".into()), NodeKind::Timer, Some(constant(1)));
        let derived = Node::new(NodeKey::Named("d".into()), NodeKind::Derived, Some(constant(1)));

        assert!(output.is_active());
        assert!(timer.is_active());
        assert!(!derived.is_active());
    }

    #[test]
    fn mark_dirty_clears_failure() {
        let mut node = Node::new(NodeKey::Named("d".into()), NodeKind::Derived, Some(constant(1)));
        node.set_flag(FAILED, true);
        node.error = Some(ReactiveError::computation("d", "boom"));
        assert!(node.is_failed());

        node.mark_dirty();
        assert!(!node.is_failed());
        assert!(node.error.is_none());
        assert!(node.is_dirty());
    }

    #[test]
    fn kind_round_trips_through_flags() {
        for kind in [NodeKind::Input, NodeKind::Derived, NodeKind::Output, NodeKind::Timer] {
            assert_eq!(NodeKind::from_flags(kind.flag() | DIRTY | ACTIVE), Some(kind));
        }
        assert_eq!(NodeKind::from_flags(CLEAN), None);
    }

    #[test]
    fn input_keys_are_namespaced() {
        assert_eq!(NodeKey::Input("x".into()).label(), "input$x");
        assert_eq!(NodeKey::Named("x".into()).label(), "x");
        assert_ne!(NodeKey::Input("x".into()), NodeKey::Named("x".into()));
    }

    #[test]
    fn downcast_reports_mismatch() {
        let value = erase(42i64);
        assert_eq!(downcast::<i64>(&value, "n").unwrap(), 42);

        let err = downcast::<String>(&value, "n").unwrap_err();
        assert!(matches!(err, ReactiveError::TypeMismatch { ref node, .. } if node == "n"));
    }
}
