// ============================================================================
// spark-sim - Errors
// Every failure the harness can surface to a test body
// ============================================================================

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Errors surfaced by graph evaluation, scheduling and the session.
///
/// All of them propagate synchronously to the caller of the operation that
/// triggered them (`set_inputs`, `elapse`, `flush` or a direct read).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// Evaluation re-entered a node that was already being evaluated.
    #[error("cyclic dependency: {}", .chain.join(" -> "))]
    CyclicDependency {
        /// Node labels from the first re-entered node back to itself
        chain: Vec<String>,
    },

    /// A dependency's computation failed; `origin` is the original error.
    #[error("upstream computation failed in `{node}`: {origin}")]
    UpstreamComputationFailed {
        /// The node whose own computation failed
        node: String,
        #[source]
        origin: Box<ReactiveError>,
    },

    /// Domain logic required an input that no simulated UI has set yet.
    #[error("input `{input}` has not been set")]
    UnsetInputAccessed { input: String },

    /// A session accessor was used after the test body returned.
    #[error("simulation session already torn down")]
    SessionAlreadyTornDown,

    /// A compute function raised a domain error.
    #[error("computation of `{node}` failed: {message}")]
    Computation { node: String, message: String },

    #[error("no node named `{name}`")]
    UnknownNode { name: String },

    #[error("a node named `{name}` is already registered")]
    DuplicateNode { name: String },

    /// The node exists but is not of the kind the accessor works on.
    #[error("`{name}` is a {actual} node, expected {expected}")]
    WrongKind {
        name: String,
        actual: &'static str,
        expected: &'static str,
    },

    #[error("value of `{node}` is not a `{expected}`")]
    TypeMismatch { node: String, expected: &'static str },

    /// No flush has produced a value for this output yet.
    #[error("output `{name}` has not been rendered by a flush yet")]
    OutputNotRendered { name: String },

    /// The server definition did not designate a return value.
    #[error("server definition returned nothing")]
    NothingReturned,

    #[error("timer `{name}` needs a non-zero interval")]
    InvalidInterval { name: String },

    /// The session was used from inside one of its own computations.
    #[error("simulation session is busy (re-entrant access from a computation)")]
    SessionBusy,
}

impl ReactiveError {
    /// Creates a domain error for `node`.
    pub fn computation(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Computation {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Wraps the failure of `node` as seen by a node that read it.
    ///
    /// Failures that already name their origin (upstream failures and
    /// cycles) pass through unchanged so every reader sees the same error.
    pub fn upstream(node: impl Into<String>, origin: ReactiveError) -> Self {
        match origin {
            err @ (Self::UpstreamComputationFailed { .. } | Self::CyclicDependency { .. }) => err,
            other => Self::UpstreamComputationFailed {
                node: node.into(),
                origin: Box::new(other),
            },
        }
    }

    /// The innermost error, following upstream wrappers.
    pub fn root_cause(&self) -> &ReactiveError {
        match self {
            Self::UpstreamComputationFailed { origin, .. } => origin.root_cause(),
            other => other,
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CyclicDependency { .. })
    }
}

// =============================================================================
// TESTS
// =============================================================================
