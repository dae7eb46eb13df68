//! Context storage seam
//!
//! Platforms keep named, lifespan-scoped parameter bags ("contexts") alive
//! across turns. Embedding code adapts its platform object to `ContextStore`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A stored context: remaining lifespan in turns plus its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub lifespan: u32,
    pub parameters: Value,
}

/// Named context store of a platform turn
pub trait ContextStore: Send + Sync {
    fn get(&self, name: &str) -> Option<ContextEntry>;

    /// Store `parameters` under `name`. `None` or a zero lifespan deletes.
    fn set(&mut self, name: &str, lifespan: u32, parameters: Option<Value>);
}

/// Context store backed by a `HashMap`, used by mock turns
#[derive(Debug, Clone, Default)]
pub struct InMemoryContexts {
    entries: HashMap<String, ContextEntry>,
}

impl InMemoryContexts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry, e.g. a context carried over from a previous turn
    #[must_use]
    pub fn insert(mut self, name: impl Into<String>, lifespan: u32, parameters: Value) -> Self {
        self.entries.insert(
            name.into(),
            ContextEntry {
                lifespan,
                parameters,
            },
        );
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContextStore for InMemoryContexts {
    fn get(&self, name: &str) -> Option<ContextEntry> {
        self.entries.get(name).cloned()
    }

    fn set(&mut self, name: &str, lifespan: u32, parameters: Option<Value>) {
        match parameters {
            Some(parameters) if lifespan > 0 && !parameters.is_null() => {
                self.entries.insert(
                    name.to_string(),
                    ContextEntry {
                        lifespan,
                        parameters,
                    },
                );
            }
            _ => {
                self.entries.remove(name);
            }
        }
    }
}
