// ============================================================================
// spark-sim - Reactive Server Simulation for Tests
// ============================================================================
//
// Run a reactive server definition outside any UI runtime: set simulated
// inputs, advance a virtual clock, and read reactives and rendered outputs
// synchronously. No event loop, no browser, no ambient global state.
//
// Layers (leaves first):
// - core:        flags, node storage, evaluation context, errors
// - reactivity:  the arena graph, dependency tracking, flush scheduling
// - primitives:  typed handles, input proxy, virtual clock
// - session:     server capture and the scoped simulation session
// ============================================================================

#[macro_use]
mod macros;

pub mod core;
pub mod primitives;
pub mod reactivity;
pub mod session;

// Re-export core items at crate root
pub use crate::core::constants;
pub use crate::core::context::EvaluationContext;
pub use crate::core::error::{ReactiveError, Result};
pub use crate::core::types::{erase, ComputeFn, NodeId, NodeKey, NodeKind, Value};

// Graph and scheduler
pub use reactivity::graph::ReactiveGraph;
pub use reactivity::scheduling::{flush, flush_report, FlushReport};
pub use reactivity::tracking::Scope;

// Primitives
pub use primitives::clock::{ElapseReport, TimerCatchUp, VirtualClock};
pub use primitives::input::{InputBatch, InputProxy, InputState};
pub use primitives::reactive::{NodeHandle, Output, Reactive, ReactiveVal, Readable, Timer};

// Session
pub use session::options::SessionOptions;
pub use session::server::{server_fn, ServerBuilder, ServerDefinition, ServerReturn};
pub use session::session::{test_server, SimulationSession};

// =============================================================================
// TESTS
// =============================================================================
