// ============================================================================
// spark-sim - Node Handles
// Typed, copyable references to nodes declared by a server definition
// ============================================================================
//
// The arena stores values type-erased. A handle remembers the value type
// so reads through a Scope or the session come back as T without the test
// author spelling the type at every call site.
// ============================================================================

use std::fmt;
use std::marker::PhantomData;

use crate::core::types::{NodeId, NodeKind};

// =============================================================================
// HANDLE TRAITS
// =============================================================================

/// A typed reference to a node.
pub trait NodeHandle {
    /// Type of the node's value
    type Value: Clone + 'static;

    /// Kind of node this handle refers to
    const KIND: NodeKind;

    fn id(&self) -> NodeId;
}

/// Handles whose value other computations may read.
///
/// Outputs are deliberately excluded: like rendered outputs in a real
/// server, nothing downstream can depend on them.
pub trait Readable: NodeHandle {}

// =============================================================================
// HANDLE TYPES
// =============================================================================

macro_rules! node_handle {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        pub struct $name<T> {
            id: NodeId,
            _value: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            pub(crate) fn new(id: NodeId) -> Self {
                Self { id, _value: PhantomData }
            }

            /// Id of the underlying node
            pub fn id(&self) -> NodeId {
                self.id
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}<{}>({})", stringify!($name), std::any::type_name::<T>(), self.id)
            }
        }

        impl<T: Clone + 'static> NodeHandle for $name<T> {
            type Value = T;
            const KIND: NodeKind = $kind;

            fn id(&self) -> NodeId {
                self.id
            }
        }
    };
}

node_handle!(
    /// Handle to a lazily computed, cached reactive expression.
    Reactive,
    NodeKind::Derived
);

node_handle!(
    /// Handle to an output binding. Read it from the session after a flush.
    Output,
    NodeKind::Output
);

node_handle!(
    /// Handle to a computation re-run by the virtual clock.
    Timer,
    NodeKind::Timer
);

node_handle!(
    /// Handle to a writable reactive value (a source outside the input proxy).
    ReactiveVal,
    NodeKind::Input
);

impl<T: Clone + 'static> Readable for Reactive<T> {}
impl<T: Clone + 'static> Readable for Timer<T> {}
impl<T: Clone + 'static> Readable for ReactiveVal<T> {}

// =============================================================================
// TESTS
// =============================================================================
