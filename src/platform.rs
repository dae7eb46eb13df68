//! The platform turn consumed by `Convo`
//!
//! A `Turn` is everything the voice-assistant platform hands an intent handler:
//! user storage, the context store, surface capabilities and, when running
//! against a live platform, a `Responder` that accepts payloads.

mod contexts;
#[cfg(test)]
pub(crate) mod testing;

pub use contexts::{ContextEntry, ContextStore, InMemoryContexts};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Platform action a flush is dispatched as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Reply and keep the microphone open
    Ask,
    /// Reply and end the conversation
    Close,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Ask => "ask",
            Action::Close => "close",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities of a surface (device class)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CapabilitySet {
    /// Every capability is present. The mock turn uses this.
    #[default]
    All,
    Only(HashSet<String>),
}

impl CapabilitySet {
    #[must_use]
    pub fn none() -> Self {
        Self::Only(HashSet::new())
    }

    #[must_use]
    pub fn of<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(capabilities.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn has(&self, capability: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(capability),
        }
    }

    /// Whether media gated on `capability` can be shown. Ungated media only
    /// counts as supported on an all-capable surface.
    #[must_use]
    pub fn supports(&self, capability: Option<&str>) -> bool {
        match capability {
            Some(capability) => self.has(capability),
            None => matches!(self, Self::All),
        }
    }
}

/// Per-user maps the platform persists across turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default)]
    pub storage: Map<String, Value>,
    #[serde(default)]
    pub access: Map<String, Value>,
}

/// Error returned by a platform responder
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PlatformError {
    pub message: String,
}

impl PlatformError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Live platform endpoint that accepts emitted payloads
#[async_trait]
pub trait Responder: Send + Sync {
    /// Whether this responder exposes a callable for `action`
    fn handles(&self, _action: Action) -> bool {
        true
    }

    /// Send one payload as `action`
    ///
    /// # Errors
    ///
    /// Returns `PlatformError` when the platform rejects the payload.
    async fn respond(&self, action: Action, payload: Value) -> Result<Value, PlatformError>;
}

#[async_trait]
impl<T: Responder + ?Sized> Responder for Arc<T> {
    fn handles(&self, action: Action) -> bool {
        (**self).handles(action)
    }

    async fn respond(&self, action: Action, payload: Value) -> Result<Value, PlatformError> {
        (**self).respond(action, payload).await
    }
}

/// One platform request/response cycle
pub struct Turn {
    pub user: UserData,
    pub contexts: Box<dyn ContextStore>,
    /// Capabilities of the surface the user is talking to now
    pub surface: CapabilitySet,
    /// Capabilities reachable on any of the user's other surfaces
    pub available_surfaces: CapabilitySet,
    /// `None` runs flushes headless, recording requests instead
    pub responder: Option<Arc<dyn Responder>>,
}

impl Turn {
    #[must_use]
    pub fn new(contexts: Box<dyn ContextStore>) -> Self {
        Self {
            user: UserData::default(),
            contexts,
            surface: CapabilitySet::All,
            available_surfaces: CapabilitySet::All,
            responder: None,
        }
    }

    /// Zero-config headless turn: every capability, empty maps, no responder
    #[must_use]
    pub fn mock() -> Self {
        Self::new(Box::new(InMemoryContexts::new()))
    }

    #[must_use]
    pub fn mock_with(configure: impl FnOnce(&mut Turn)) -> Self {
        let mut turn = Self::mock();
        configure(&mut turn);
        turn
    }

    #[must_use]
    pub fn with_surface(mut self, surface: CapabilitySet) -> Self {
        self.surface = surface;
        self
    }

    #[must_use]
    pub fn with_available_surfaces(mut self, available: CapabilitySet) -> Self {
        self.available_surfaces = available;
        self
    }

    #[must_use]
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: UserData) -> Self {
        self.user = user;
        self
    }
}

impl Default for Turn {
    fn default() -> Self {
        Self::mock()
    }
}

impl fmt::Debug for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Turn")
            .field("user", &self.user)
            .field("surface", &self.surface)
            .field("available_surfaces", &self.available_surfaces)
            .field("responder", &self.responder.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_set() {
        assert!(CapabilitySet::All.has("actions.capability.SCREEN_OUTPUT"));
        assert!(!CapabilitySet::none().has("actions.capability.SCREEN_OUTPUT"));

        let caps = CapabilitySet::of(["actions.capability.AUDIO_OUTPUT"]);
        assert!(caps.has("actions.capability.AUDIO_OUTPUT"));
        assert!(!caps.has("actions.capability.SCREEN_OUTPUT"));
        assert!(!caps.supports(None));
        assert!(CapabilitySet::All.supports(None));
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Action::Ask).unwrap(), "ask");
        assert_eq!(Action::Close.to_string(), "close");
    }

    #[test]
    fn test_mock_turn_is_headless() {
        let turn = Turn::mock();
        assert!(turn.responder.is_none());
        assert!(turn.user.storage.is_empty());
        assert!(turn.user.access.is_empty());
        assert!(turn.surface.has("anything"));
        assert!(turn.contexts.get("list").is_none());
    }

    #[test]
    fn test_mock_with_configures() {
        let turn = Turn::mock_with(|t| {
            t.surface = CapabilitySet::none();
            t.user.storage.insert("k".into(), Value::from(1));
        });
        assert!(!turn.surface.has("x"));
        assert_eq!(turn.user.storage["k"], 1);
    }
}
