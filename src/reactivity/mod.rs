// ============================================================================
// spark-sim - Reactivity Module
// Graph evaluation, dependency tracking and flush scheduling
// ============================================================================

pub mod graph;
pub mod scheduling;
pub mod tracking;

pub use graph::ReactiveGraph;
pub use scheduling::{flush, flush_report, FlushReport};
pub use tracking::Scope;
