// ============================================================================
// spark-sim - Simulation Session
// One isolated run of a server definition, driven synchronously by a test
// ============================================================================
//
// start() captures the server definition into a fresh graph, hands the
// test body a session handle, and tears everything down when the body
// returns, fails or panics. Handles cloned out of the body keep working
// only as long as the session lives; afterwards every accessor reports
// SessionAlreadyTornDown.
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info_span};

use crate::core::error::{ReactiveError, Result};
use crate::core::types::{downcast, erase, NodeId, NodeKey, NodeKind};
use crate::primitives::clock::{ElapseReport, VirtualClock};
use crate::primitives::input::{InputBatch, InputProxy, InputState};
use crate::primitives::reactive::{Output, ReactiveVal, Readable};
use crate::reactivity::graph::ReactiveGraph;
use crate::reactivity::scheduling::{flush, flush_report, FlushReport};
use crate::session::options::SessionOptions;
use crate::session::server::{ServerBuilder, ServerDefinition, ServerReturn};

// =============================================================================
// SESSION STATE
// =============================================================================

struct SessionState {
    graph: ReactiveGraph,
    clock: VirtualClock,
    returned: ServerReturn,
}

type SharedState = Rc<RefCell<Option<SessionState>>>;

/// Releases the graph and clock when the test body is done, however it ended.
struct TeardownGuard {
    state: SharedState,
    label: Rc<str>,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.state.try_borrow_mut() {
            if let Some(state) = slot.take() {
                debug!(
                    session = %self.label,
                    nodes = state.graph.len(),
                    computations = state.graph.total_computations(),
                    "session torn down"
                );
            }
        }
    }
}

// =============================================================================
// SIMULATION SESSION
// =============================================================================

/// Handle to a running simulation, passed to the test body.
///
/// Cheap to clone. All accessors are fallible: they fail with
/// `SessionAlreadyTornDown` once the body has returned.
#[derive(Clone)]
pub struct SimulationSession {
    state: SharedState,
    label: Rc<str>,
}

impl std::fmt::Debug for SimulationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationSession")
            .field("label", &self.label)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

/// Run `body` against `definition(args)` with default options.
///
/// ```
/// use spark_sim::{test_server, ServerBuilder, ServerReturn, Result};
///
/// fn server(server: &mut ServerBuilder, _: &()) -> Result<ServerReturn> {
///     server.output("double", |cx| Ok(cx.input::<i64>("n")? * 2))?;
///     Ok(ServerReturn::nothing())
/// }
///
/// test_server(server, (), |session| {
///     session.set_input("n", 21i64)?;
///     assert_eq!(session.output::<i64>("double")?, 42);
///     Ok(())
/// })
/// .unwrap();
/// ```
pub fn test_server<A, D, R, B>(definition: D, args: A, body: B) -> Result<R>
where
    D: ServerDefinition<A>,
    B: FnOnce(&SimulationSession) -> Result<R>,
{
    SimulationSession::start(definition, args, body)
}

impl SimulationSession {
    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Capture `definition(args)` and run `body` against it.
    ///
    /// Errors from capture or from the body propagate out of `start`; the
    /// session is torn down on every exit path, including panics.
    pub fn start<A, D, R, B>(definition: D, args: A, body: B) -> Result<R>
    where
        D: ServerDefinition<A>,
        B: FnOnce(&SimulationSession) -> Result<R>,
    {
        Self::start_with(SessionOptions::default(), definition, args, body)
    }

    /// `start` with explicit options.
    pub fn start_with<A, D, R, B>(options: SessionOptions, definition: D, args: A, body: B) -> Result<R>
    where
        D: ServerDefinition<A>,
        B: FnOnce(&SimulationSession) -> Result<R>,
    {
        let span = info_span!("session", label = %options.label);
        let _enter = span.enter();

        let mut server = ServerBuilder::new(
            ReactiveGraph::new(),
            VirtualClock::with_catch_up(options.timer_catch_up),
        );
        let returned = definition.declare(&mut server, &args)?;
        let (graph, clock) = server.into_parts();
        debug!(nodes = graph.len(), timers = clock.timer_count(), "server captured");

        let label: Rc<str> = Rc::from(options.label.as_str());
        let session = SimulationSession {
            state: Rc::new(RefCell::new(Some(SessionState { graph, clock, returned }))),
            label: label.clone(),
        };
        let _guard = TeardownGuard {
            state: session.state.clone(),
            label,
        };

        if options.flush_on_start {
            session.flush()?;
        }
        body(&session)
    }

    /// Name given in `SessionOptions::label`
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True once the body has returned and the graph was released
    pub fn is_torn_down(&self) -> bool {
        self.state.try_borrow().map(|slot| slot.is_none()).unwrap_or(false)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SessionState) -> Result<T>) -> Result<T> {
        let mut slot = self
            .state
            .try_borrow_mut()
            .map_err(|_| ReactiveError::SessionBusy)?;
        let state = slot.as_mut().ok_or(ReactiveError::SessionAlreadyTornDown)?;
        f(state)
    }

    // =========================================================================
    // INPUTS
    // =========================================================================

    /// Write every input in `batch`, then flush once.
    pub fn set_inputs(&self, batch: InputBatch) -> Result<FlushReport> {
        self.with_state(|s| InputProxy::new(&mut s.graph).set_inputs(batch))
    }

    /// Write one input, then flush.
    pub fn set_input<T: 'static>(&self, name: &str, value: T) -> Result<FlushReport> {
        self.with_state(|s| InputProxy::new(&mut s.graph).set(name, value))
    }

    /// State of input `name` as the simulated UI left it (untracked)
    pub fn input(&self, name: &str) -> Result<InputState> {
        self.with_state(|s| Ok(InputProxy::new(&mut s.graph).get(name)))
    }

    /// Typed value of input `name`, `None` while unset
    pub fn input_value<T: Clone + 'static>(&self, name: &str) -> Result<Option<T>> {
        self.with_state(|s| InputProxy::new(&mut s.graph).value(name))
    }

    pub fn input_names(&self) -> Result<Vec<String>> {
        self.with_state(|s| Ok(InputProxy::new(&mut s.graph).names()))
    }

    // =========================================================================
    // REACTIVE VALUES
    // =========================================================================

    /// Replace the reactive value `name`, invalidate its readers, flush once.
    pub fn set_value<T: 'static>(&self, name: &str, value: T) -> Result<FlushReport> {
        self.with_state(|s| {
            let id = s.graph.find_kind(name, &[NodeKind::Input])?;
            write_and_flush(&mut s.graph, id, value)
        })
    }

    /// Typed variant of `set_value`
    pub fn set<T: Clone + 'static>(&self, handle: &ReactiveVal<T>, value: T) -> Result<FlushReport> {
        self.with_state(|s| write_and_flush(&mut s.graph, handle.id(), value))
    }

    // =========================================================================
    // TIME
    // =========================================================================

    /// Advance the virtual clock, firing and flushing due timers.
    pub fn elapse(&self, duration_ms: u64) -> Result<ElapseReport> {
        self.with_state(|s| s.clock.elapse(&mut s.graph, duration_ms))
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> Result<u64> {
        self.with_state(|s| Ok(s.clock.now()))
    }

    // =========================================================================
    // FLUSH
    // =========================================================================

    /// Settle every dirty output and timer; the first failure is returned.
    pub fn flush(&self) -> Result<FlushReport> {
        self.with_state(|s| flush(&mut s.graph))
    }

    /// Settle without failing on sink errors; they are listed in the report.
    pub fn flush_report(&self) -> Result<FlushReport> {
        self.with_state(|s| Ok(flush_report(&mut s.graph)))
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Value of the reactive, timer or reactive value `name`.
    ///
    /// A dirty node is recomputed first. Outputs are read with `output`.
    pub fn get<T: Clone + 'static>(&self, name: &str) -> Result<T> {
        self.with_state(|s| {
            let id = s
                .graph
                .find_kind(name, &[NodeKind::Derived, NodeKind::Timer, NodeKind::Input])?;
            let value = s.graph.evaluate(id)?;
            downcast(&value, &s.graph.label(id))
        })
    }

    /// Typed read through a handle returned by the server definition
    pub fn read<H: Readable>(&self, handle: &H) -> Result<H::Value> {
        self.with_state(|s| {
            let value = s.graph.evaluate(handle.id())?;
            downcast(&value, &s.graph.label(handle.id()))
        })
    }

    /// Rendered value of output `name` as of the last flush.
    ///
    /// Never recomputes: an output changed since the last flush still shows
    /// its old value.
    pub fn output<T: Clone + 'static>(&self, name: &str) -> Result<T> {
        self.with_state(|s| {
            let id = s.graph.find_kind(name, &[NodeKind::Output])?;
            let value = s.graph.rendered(id)?;
            downcast(&value, &s.graph.label(id))
        })
    }

    /// Typed variant of `output`
    pub fn rendered<T: Clone + 'static>(&self, handle: &Output<T>) -> Result<T> {
        self.with_state(|s| {
            let value = s.graph.rendered(handle.id())?;
            downcast(&value, &s.graph.label(handle.id()))
        })
    }

    /// Whatever the server definition designated as its return value.
    ///
    /// A returned reactive is read like `get`, recomputing when dirty.
    pub fn get_returned<T: Clone + 'static>(&self) -> Result<T> {
        self.with_state(|s| match &s.returned {
            ServerReturn::Nothing => Err(ReactiveError::NothingReturned),
            ServerReturn::Value(value) => downcast(value, "returned value"),
            ServerReturn::Node(id) => {
                let id = *id;
                let value = s.graph.evaluate(id)?;
                downcast(&value, &s.graph.label(id))
            }
        })
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Suspend (`false`) or resume (`true`) output or timer `name` as a flush root
    pub fn set_active(&self, name: &str, active: bool) -> Result<()> {
        self.with_state(|s| {
            let id = s.graph.find_kind(name, &[NodeKind::Output, NodeKind::Timer])?;
            s.graph.set_active(id, active)
        })
    }

    pub fn is_dirty(&self, name: &str) -> Result<bool> {
        self.with_state(|s| {
            let id = s.graph.find(name)?;
            s.graph.is_dirty(id)
        })
    }

    /// How many times node `name` has run its compute function
    pub fn compute_count(&self, name: &str) -> Result<u64> {
        self.with_state(|s| {
            let id = s.graph.find(name)?;
            s.graph.compute_count(id)
        })
    }

    /// Labels of the nodes `name` read during its last evaluation
    pub fn dependencies(&self, name: &str) -> Result<Vec<String>> {
        self.with_state(|s| {
            let id = s.graph.find(name)?;
            Ok(s.graph
                .dependencies(id)?
                .into_iter()
                .map(|dep| s.graph.label(dep))
                .collect())
        })
    }

    /// Names of every declared node, sorted
    pub fn node_names(&self) -> Result<Vec<String>> {
        self.with_state(|s| {
            Ok(s.graph
                .keys()
                .filter_map(|key| match key {
                    NodeKey::Named(name) => Some(name.clone()),
                    NodeKey::Input(_) => None,
                })
                .collect())
        })
    }
}

fn write_and_flush<T: 'static>(graph: &mut ReactiveGraph, id: NodeId, value: T) -> Result<FlushReport> {
    graph.write_source(id, erase(value))?;
    let invalidated = graph.mark_dirty(id)?;
    debug!(node = %graph.label(id), invalidated, "reactive value set");
    flush(graph)
}

// =============================================================================
// TESTS
// =============================================================================
