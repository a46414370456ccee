// ============================================================================
// spark-sim - Server Capture
// Run a server definition once, recording its declarations as graph nodes
// ============================================================================
//
// A server definition declares reactives, outputs and timers as a side
// effect of being called. Under capture nothing is executed: every
// declaration becomes a dirty node in the session's graph, and the
// definition's designated return value is remembered for get_returned().
// ============================================================================

use std::rc::Rc;

use crate::core::error::{ReactiveError, Result};
use crate::core::types::{erase, ComputeFn, NodeId, NodeKey, NodeKind, Value};
use crate::primitives::clock::VirtualClock;
use crate::primitives::reactive::{Output, Reactive, ReactiveVal, Readable, Timer};
use crate::reactivity::graph::ReactiveGraph;
use crate::reactivity::tracking::Scope;

// =============================================================================
// SERVER DEFINITION
// =============================================================================

/// Something that declares reactive bindings when invoked with `A`.
///
/// Implemented for every `Fn(&mut ServerBuilder, &A) -> Result<ServerReturn>`,
/// so plain functions work as server definitions.
pub trait ServerDefinition<A> {
    fn declare(&self, server: &mut ServerBuilder, args: &A) -> Result<ServerReturn>;
}

impl<A, F> ServerDefinition<A> for F
where
    F: Fn(&mut ServerBuilder, &A) -> Result<ServerReturn>,
{
    fn declare(&self, server: &mut ServerBuilder, args: &A) -> Result<ServerReturn> {
        self(server, args)
    }
}

/// Pin a closure's signature so it can be used as a server definition.
///
/// ```
/// use spark_sim::{server_fn, ServerReturn};
///
/// let server = server_fn(|server, prefix: &String| {
///     let prefix = prefix.clone();
///     server.output("greeting", move |cx| Ok(format!("{prefix}{}", cx.input::<String>("name")?)))?;
///     Ok(ServerReturn::nothing())
/// });
/// # let _ = server;
/// ```
pub fn server_fn<A, F>(f: F) -> F
where
    F: Fn(&mut ServerBuilder, &A) -> Result<ServerReturn>,
{
    f
}

// =============================================================================
// SERVER RETURN
// =============================================================================

/// What a server definition hands back to its caller.
#[derive(Debug, Clone, Default)]
pub enum ServerReturn {
    /// No return value
    #[default]
    Nothing,
    /// A plain value
    Value(Value),
    /// A reactive node, read through the usual dirty/clean contract
    Node(NodeId),
}

impl ServerReturn {
    pub fn nothing() -> Self {
        Self::Nothing
    }

    pub fn value<T: 'static>(value: T) -> Self {
        Self::Value(erase(value))
    }

    /// Return a reactive (or timer, or reactive value)
    pub fn reactive<H: Readable>(handle: &H) -> Self {
        Self::Node(handle.id())
    }
}

// =============================================================================
// SERVER BUILDER
// =============================================================================

/// Capture-mode recorder for one server definition.
///
/// Owns the session's graph and clock while the definition runs; the
/// session takes them back afterwards.
#[derive(Debug, Default)]
pub struct ServerBuilder {
    graph: ReactiveGraph,
    clock: VirtualClock,
}

impl ServerBuilder {
    pub(crate) fn new(graph: ReactiveGraph, clock: VirtualClock) -> Self {
        Self { graph, clock }
    }

    pub(crate) fn into_parts(self) -> (ReactiveGraph, VirtualClock) {
        (self.graph, self.clock)
    }

    /// Declare a lazy, cached reactive expression.
    pub fn reactive<T, F>(&mut self, name: &str, f: F) -> Result<Reactive<T>>
    where
        T: Clone + 'static,
        F: Fn(&mut Scope<'_>) -> Result<T> + 'static,
    {
        let id = self.declare(name, NodeKind::Derived, f)?;
        Ok(Reactive::new(id))
    }

    /// Declare an output binding, refreshed by every flush that finds it dirty.
    pub fn output<T, F>(&mut self, name: &str, f: F) -> Result<Output<T>>
    where
        T: Clone + 'static,
        F: Fn(&mut Scope<'_>) -> Result<T> + 'static,
    {
        let id = self.declare(name, NodeKind::Output, f)?;
        Ok(Output::new(id))
    }

    /// Declare a computation re-run every `interval_ms` of virtual time.
    ///
    /// Use `Scope::previous` inside `f` to build on the last value.
    pub fn timer<T, F>(&mut self, name: &str, interval_ms: u64, f: F) -> Result<Timer<T>>
    where
        T: Clone + 'static,
        F: Fn(&mut Scope<'_>) -> Result<T> + 'static,
    {
        // A bad interval must leave no node behind.
        if interval_ms == 0 {
            return Err(ReactiveError::InvalidInterval { name: name.to_string() });
        }
        let id = self.declare(name, NodeKind::Timer, f)?;
        self.clock.register_timer(id, name, interval_ms)?;
        Ok(Timer::new(id))
    }

    /// Declare a writable reactive value with an initial value.
    pub fn reactive_val<T: Clone + 'static>(&mut self, name: &str, initial: T) -> Result<ReactiveVal<T>> {
        let id = self
            .graph
            .register(NodeKey::Named(name.to_string()), NodeKind::Input, None)?;
        self.graph.write_source(id, erase(initial))?;
        Ok(ReactiveVal::new(id))
    }

    /// Logical time at declaration
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Number of nodes declared so far
    pub fn declared(&self) -> usize {
        self.graph.len()
    }

    fn declare<T, F>(&mut self, name: &str, kind: NodeKind, f: F) -> Result<NodeId>
    where
        T: 'static,
        F: Fn(&mut Scope<'_>) -> Result<T> + 'static,
    {
        let compute: ComputeFn = Rc::new(move |cx| f(cx).map(erase));
        self.graph
            .register(NodeKey::Named(name.to_string()), kind, Some(compute))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_are_captured_not_run() {
        let mut server = ServerBuilder::default();
        let xy = server
            .reactive("xy", |cx| Ok(cx.input::<i64>("x")? - cx.input::<i64>("y")?))
            .unwrap();
        server
            .output("out", move |cx| Ok(format!("xy = {}", cx.get(&xy)?)))
            .unwrap();

        assert_eq!(server.declared(), 2);
        let (graph, _) = server.into_parts();
        assert_eq!(graph.total_computations(), 0);
        assert!(graph.is_dirty(xy.id()).unwrap());
    }

    #[test]
    fn reactive_val_starts_with_initial_value() {
        let mut server = ServerBuilder::default();
        let var = server.reactive_val("var", vec![1, 2, 3]).unwrap();

        let (graph, _) = server.into_parts();
        let value = graph.source_value(var.id()).unwrap().unwrap();
        assert_eq!(value.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn bad_timer_interval_registers_nothing() {
        let mut server = ServerBuilder::default();
        let err = server.timer("t", 0, |_| Ok(0u32)).unwrap_err();
        assert_eq!(err, ReactiveError::InvalidInterval { name: "t".into() });
        assert_eq!(server.declared(), 0);
    }

    #[test]
    fn closures_and_functions_are_definitions() {
        fn declare_one(server: &mut ServerBuilder, _: &()) -> Result<ServerReturn> {
            server.reactive("one", |_| Ok(1))?;
            Ok(ServerReturn::nothing())
        }

        let mut server = ServerBuilder::default();
        declare_one.declare(&mut server, &()).unwrap();

        let closure = server_fn(|server, n: &i32| {
            let n = *n;
            let handle = server.reactive("n", move |_| Ok(n))?;
            Ok(ServerReturn::reactive(&handle))
        });
        let returned = closure.declare(&mut server, &7).unwrap();
        assert!(matches!(returned, ServerReturn::Node(_)));
        assert_eq!(server.declared(), 2);
    }
}
