// ============================================================================
// spark-sim - Session Module
// ============================================================================

pub mod options;
pub mod server;
pub mod session;

pub use options::SessionOptions;
pub use server::{server_fn, ServerBuilder, ServerDefinition, ServerReturn};
pub use session::{test_server, SimulationSession};
