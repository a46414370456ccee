// ============================================================================
// spark-sim - Dependency Tracking
// The Scope handed to compute functions, and the edge bookkeeping behind it
// ============================================================================
//
// Every read a compute function performs goes through its Scope. The Scope
// records an edge (reader -> read node) before evaluating the read node, so
// a reader that fails on an unset input or a failing upstream still gets
// invalidated when that upstream changes later.
// ============================================================================

use crate::core::error::{ReactiveError, Result};
use crate::core::types::{downcast, NodeId, NodeKind, Value};
use crate::primitives::input::InputState;
use crate::primitives::reactive::Readable;
use crate::reactivity::graph::ReactiveGraph;

// =============================================================================
// SCOPE
// =============================================================================

/// Evaluation context passed to a node's compute function.
///
/// Reads through the scope register dependencies of the node being
/// computed. There is no ambient "current node": the scope is the context.
pub struct Scope<'g> {
    graph: &'g mut ReactiveGraph,
    node: NodeId,
}

impl<'g> Scope<'g> {
    pub(crate) fn new(graph: &'g mut ReactiveGraph, node: NodeId) -> Self {
        Self { graph, node }
    }

    /// The node being computed
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Label of the node being computed
    pub fn label(&self) -> String {
        self.graph.label(self.node)
    }

    /// Read a reactive, timer or reactive value, tracking the dependency.
    pub fn get<H: Readable>(&mut self, handle: &H) -> Result<H::Value> {
        let id = handle.id();
        let value = self.read(id)?;
        downcast(&value, &self.graph.label(id))
    }

    /// Type-erased read of any node, tracking the dependency.
    ///
    /// Failures of a computed dependency reach the reader as
    /// `UpstreamComputationFailed`; unset inputs and cycles pass through.
    pub fn read(&mut self, dep: NodeId) -> Result<Value> {
        if dep == self.node {
            return Err(self.graph.cycle_error(dep));
        }

        self.graph.link(self.node, dep);

        self.graph.evaluate(dep).map_err(|err| {
            match self.graph.kind(dep) {
                Ok(NodeKind::Input) => err,
                _ => ReactiveError::upstream(self.graph.label(dep), err),
            }
        })
    }

    /// Value of input `name`; fails with `UnsetInputAccessed` until set.
    pub fn input<T: Clone + 'static>(&mut self, name: &str) -> Result<T> {
        let id = self.graph.input_node(name);
        let value = self.read(id)?;
        downcast(&value, &self.graph.label(id))
    }

    /// Value of input `name`, or `None` if no simulated UI has set it.
    pub fn input_opt<T: Clone + 'static>(&mut self, name: &str) -> Result<Option<T>> {
        match self.input(name) {
            Ok(value) => Ok(Some(value)),
            Err(ReactiveError::UnsetInputAccessed { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Raw state of input `name` (tracked like any other read)
    pub fn input_state(&mut self, name: &str) -> InputState {
        let id = self.graph.input_node(name);
        match self.read(id) {
            Ok(value) => InputState::Set(value),
            Err(_) => InputState::Unset,
        }
    }

    /// This node's value from its previous successful run.
    ///
    /// Not a dependency read. Timers use it to accumulate across fires.
    pub fn previous<T: Clone + 'static>(&self) -> Option<T> {
        self.graph
            .node(self.node)
            .ok()
            .and_then(|n| n.value.as_ref())
            .and_then(|v| v.downcast_ref::<T>().cloned())
    }

    /// Domain error attributed to the node being computed
    pub fn fail(&self, message: impl Into<String>) -> ReactiveError {
        ReactiveError::computation(self.label(), message)
    }
}

// =============================================================================
// EDGE BOOKKEEPING
// =============================================================================

impl ReactiveGraph {
    /// Record that `reader` read `dep` during its current evaluation.
    pub(crate) fn link(&mut self, reader: NodeId, dep: NodeId) {
        if reader == dep {
            return;
        }
        if let Ok(node) = self.node_mut(reader) {
            node.dependencies.insert(dep);
        }
        if let Ok(node) = self.node_mut(dep) {
            node.dependents.insert(reader);
        }
    }

    /// Drop every edge recorded by `reader`'s previous evaluation.
    ///
    /// Collect-then-mutate: the dependency set is taken out first so the
    /// back-references can be removed without holding two borrows.
    pub(crate) fn clear_dependencies(&mut self, reader: NodeId) {
        let deps = match self.node_mut(reader) {
            Ok(node) => std::mem::take(&mut node.dependencies),
            Err(_) => return,
        };
        for dep in deps {
            if let Ok(node) = self.node_mut(dep) {
                node.dependents.remove(&reader);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{erase, ComputeFn, NodeKey};
    use crate::primitives::reactive::Reactive;
    use std::rc::Rc;

    fn named(name: &str) -> NodeKey {
        NodeKey::Named(name.to_string())
    }

    #[test]
    fn link_and_clear_are_symmetric() {
        let mut graph = ReactiveGraph::new();
        let a = graph.input_node("a");
        let b = graph.input_node("b");
        let c = graph.input_node("c");

        graph.link(c, a);
        graph.link(c, b);
        assert_eq!(graph.dependencies(c).unwrap(), vec![a, b]);
        assert_eq!(graph.dependents(a).unwrap(), vec![c]);

        graph.clear_dependencies(c);
        assert!(graph.dependencies(c).unwrap().is_empty());
        assert!(graph.dependents(a).unwrap().is_empty());
        assert!(graph.dependents(b).unwrap().is_empty());
    }

    #[test]
    fn self_link_is_ignored() {
        let mut graph = ReactiveGraph::new();
        let a = graph.input_node("a");
        graph.link(a, a);
        assert!(graph.dependencies(a).unwrap().is_empty());
    }

    #[test]
    fn typed_get_tracks_and_downcasts() {
        let mut graph = ReactiveGraph::new();
        let base: ComputeFn = Rc::new(|_| Ok(erase(20i64)));
        let base = graph.register(named("base"), NodeKind::Derived, Some(base)).unwrap();
        let handle: Reactive<i64> = Reactive::new(base);

        let plus: ComputeFn = Rc::new(move |cx| Ok(erase(cx.get(&handle)? + 1)));
        let plus = graph.register(named("plus"), NodeKind::Derived, Some(plus)).unwrap();

        let value = graph.evaluate(plus).unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&21));
        assert_eq!(graph.dependencies(plus).unwrap(), vec![base]);
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut graph = ReactiveGraph::new();
        let x = graph.input_node("x");
        graph.write_source(x, erase("text".to_string())).unwrap();

        let reader: ComputeFn = Rc::new(|cx| Ok(erase(cx.input::<i64>("x")?)));
        let reader = graph.register(named("reader"), NodeKind::Derived, Some(reader)).unwrap();

        let err = graph.evaluate(reader).unwrap_err();
        assert!(matches!(err, ReactiveError::TypeMismatch { ref node, .. } if node == "input$x"));
    }

    #[test]
    fn input_opt_distinguishes_unset_from_empty() {
        let mut graph = ReactiveGraph::new();
        let describe: ComputeFn = Rc::new(|cx| {
            Ok(erase(match cx.input_opt::<String>("name")? {
                None => "untouched".to_string(),
                Some(s) if s.is_empty() => "empty".to_string(),
                Some(s) => s,
            }))
        });
        let id = graph.register(named("describe"), NodeKind::Derived, Some(describe)).unwrap();

        assert_eq!(graph.evaluate(id).unwrap().downcast_ref::<String>().unwrap(), "untouched");

        let name = graph.input_node("name");
        graph.write_source(name, erase(String::new())).unwrap();
        graph.mark_dirty(name).unwrap();
        assert_eq!(graph.evaluate(id).unwrap().downcast_ref::<String>().unwrap(), "empty");
    }

    #[test]
    fn input_state_tracks_even_when_unset() {
        let mut graph = ReactiveGraph::new();
        let seen: ComputeFn = Rc::new(|cx| Ok(erase(cx.input_state("x").is_set())));
        let id = graph.register(named("seen"), NodeKind::Derived, Some(seen)).unwrap();

        assert_eq!(graph.evaluate(id).unwrap().downcast_ref::<bool>(), Some(&false));

        let x = graph.input_node("x");
        assert_eq!(graph.dependents(x).unwrap(), vec![id]);
    }

    #[test]
    fn failing_dependency_is_wrapped_once() {
        let mut graph = ReactiveGraph::new();
        let bad: ComputeFn = Rc::new(|cx| Err(cx.fail("bad data")));
        let bad = graph.register(named("bad"), NodeKind::Derived, Some(bad)).unwrap();
        let mid: ComputeFn = Rc::new(move |cx| cx.read(bad));
        let mid = graph.register(named("mid"), NodeKind::Derived, Some(mid)).unwrap();
        let top: ComputeFn = Rc::new(move |cx| cx.read(mid));
        let top = graph.register(named("top"), NodeKind::Derived, Some(top)).unwrap();

        let err = graph.evaluate(top).unwrap_err();
        assert_eq!(
            err,
            ReactiveError::UpstreamComputationFailed {
                node: "bad".into(),
                origin: Box::new(ReactiveError::computation("bad", "bad data")),
            }
        );
    }

    #[test]
    fn previous_sees_last_successful_value() {
        let mut graph = ReactiveGraph::new();
        let counter: ComputeFn = Rc::new(|cx| Ok(erase(cx.previous::<u32>().map_or(0, |n| n + 1))));
        let id = graph.register(named("counter"), NodeKind::Timer, Some(counter)).unwrap();

        for expected in 0..3u32 {
            graph.mark_dirty(id).unwrap();
            assert_eq!(graph.evaluate(id).unwrap().downcast_ref::<u32>(), Some(&expected));
        }
    }
}
