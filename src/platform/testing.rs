//! Mock responder for testing flushes against a "live" platform

use super::{Action, PlatformError, Responder};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Mutex;

/// Responder that records every payload it receives
#[allow(dead_code)]
pub struct RecordingResponder {
    handled: HashSet<Action>,
    fail_at: Option<usize>,
    /// Record of all (action, payload) calls in issue order
    pub calls: Mutex<Vec<(Action, Value)>>,
}

#[allow(dead_code)]
impl RecordingResponder {
    pub fn new() -> Self {
        Self {
            handled: [Action::Ask, Action::Close].into_iter().collect(),
            fail_at: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Only expose callables for the given actions
    pub fn handling(mut self, actions: &[Action]) -> Self {
        self.handled = actions.iter().copied().collect();
        self
    }

    /// Fail the call with this zero-based position
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn recorded_calls(&self) -> Vec<(Action, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for RecordingResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Responder for RecordingResponder {
    fn handles(&self, action: Action) -> bool {
        self.handled.contains(&action)
    }

    async fn respond(&self, action: Action, payload: Value) -> Result<Value, PlatformError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((action, payload));
            calls.len() - 1
        };
        if self.fail_at == Some(index) {
            return Err(PlatformError::new(format!("call {index} rejected")));
        }
        Ok(json!({ "ack": index }))
    }
}
