// ============================================================================
// spark-sim - Core Module
// Fundamental types, flags, errors and evaluation context
// ============================================================================

pub mod constants;
pub mod context;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use context::EvaluationContext;
pub use error::{ReactiveError, Result};
pub use types::{erase, ComputeFn, NodeId, NodeKey, NodeKind, Value};
