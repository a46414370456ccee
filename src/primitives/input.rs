// ============================================================================
// spark-sim - Input Proxy
// A settable stand-in for the values a browser would send
// ============================================================================
//
// Every input starts unset: no simulated UI has supplied a value yet. That
// is a different state from "set to the empty string" or "set to zero" and
// tests must be able to tell the two apart.
//
// Writes are batched: all values of one set_inputs call land first, then
// every affected input is invalidated, then exactly one flush runs.
// ============================================================================

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::error::Result;
use crate::core::types::{downcast, erase, NodeKey, Value};
use crate::reactivity::graph::ReactiveGraph;
use crate::reactivity::scheduling::{flush, FlushReport};

// =============================================================================
// INPUT STATE
// =============================================================================

/// Current state of one simulated input.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// Never touched by the simulated UI
    #[default]
    Unset,
    /// Explicitly set (possibly to an empty or zero value)
    Set(Value),
}

impl InputState {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// The value as `T`, or None when unset or of another type
    pub fn value<T: Clone + 'static>(&self) -> Option<T> {
        match self {
            Self::Unset => None,
            Self::Set(value) => value.downcast_ref::<T>().cloned(),
        }
    }
}

// =============================================================================
// INPUT BATCH
// =============================================================================

/// Name-value pairs written together by one `set_inputs` call.
///
/// Later writes to the same name within a batch replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct InputBatch {
    entries: BTreeMap<String, Value>,
}

impl InputBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name = value`, builder style
    pub fn with<T: 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<T: 'static>(&mut self, name: impl Into<String>, value: T) {
        self.entries.insert(name.into(), erase(value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in the batch, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<K: Into<String>, T: 'static> FromIterator<(K, T)> for InputBatch {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut batch = Self::new();
        for (name, value) in iter {
            batch.insert(name, value);
        }
        batch
    }
}

// =============================================================================
// INPUT PROXY
// =============================================================================

/// Write/read view over the input nodes of a graph.
pub struct InputProxy<'g> {
    graph: &'g mut ReactiveGraph,
}

impl<'g> InputProxy<'g> {
    pub fn new(graph: &'g mut ReactiveGraph) -> Self {
        Self { graph }
    }

    /// Write every pair, invalidate every written input, flush once.
    ///
    /// No computation runs between the first write and the flush, so no
    /// observer can see a half-applied batch.
    pub fn set_inputs(&mut self, batch: InputBatch) -> Result<FlushReport> {
        let mut written = Vec::with_capacity(batch.len());
        for (name, value) in batch.entries {
            let id = self.graph.input_node(&name);
            self.graph.write_source(id, value)?;
            written.push(id);
        }

        let mut invalidated = 0;
        for id in &written {
            invalidated += self.graph.mark_dirty(*id)?;
        }
        debug!(inputs = written.len(), invalidated, "set inputs");

        flush(self.graph)
    }

    /// Set a single input (a batch of one)
    pub fn set<T: 'static>(&mut self, name: &str, value: T) -> Result<FlushReport> {
        self.set_inputs(InputBatch::new().with(name, value))
    }

    /// Current state of input `name`; untracked, never creates a node
    pub fn get(&self, name: &str) -> InputState {
        let Some(id) = self.graph.lookup(&NodeKey::Input(name.to_string())) else {
            return InputState::Unset;
        };
        match self.graph.source_value(id) {
            Ok(Some(value)) => InputState::Set(value),
            _ => InputState::Unset,
        }
    }

    /// Typed value of input `name`
    pub fn value<T: Clone + 'static>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            InputState::Unset => Ok(None),
            InputState::Set(value) => downcast(&value, &format!("input${name}")).map(Some),
        }
    }

    /// Names of every input known to the graph (read or written), sorted
    pub fn names(&self) -> Vec<String> {
        self.graph
            .keys()
            .filter_map(|key| match key {
                NodeKey::Input(name) => Some(name.clone()),
                NodeKey::Named(_) => None,
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
