//! Response payloads emitted by a flush
//!
//! Payload construction goes through a `PayloadFactory` so the embedding
//! platform adapter can map each `PayloadKind` onto its own response classes.
//! Without one, payloads are a plain `{ "type": kind, "data": data }` envelope.

use crate::platform::Action;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Closed set of payload kinds the engine knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    SignIn,
    SimpleResponse,
    NewSurface,
    Image,
    List,
    BasicCard,
    Button,
}

impl PayloadKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignIn => "SignIn",
            Self::SimpleResponse => "SimpleResponse",
            Self::NewSurface => "NewSurface",
            Self::Image => "Image",
            Self::List => "List",
            Self::BasicCard => "BasicCard",
            Self::Button => "Button",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds platform payloads from a kind and its data
pub trait PayloadFactory: Send + Sync {
    fn build(&self, kind: PayloadKind, data: Value) -> Value;
}

/// Default factory: `{ "type": kind, "data": data }`
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedPayloads;

impl PayloadFactory for TaggedPayloads {
    fn build(&self, kind: PayloadKind, data: Value) -> Value {
        json!({ "type": kind.as_str(), "data": data })
    }
}

type BuildFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Factory with per-kind overrides, falling back to the tagged envelope
#[derive(Clone, Default)]
pub struct MappedPayloads {
    mappings: HashMap<PayloadKind, BuildFn>,
}

impl MappedPayloads {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn map(
        mut self,
        kind: PayloadKind,
        build: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.mappings.insert(kind, Arc::new(build));
        self
    }
}

impl PayloadFactory for MappedPayloads {
    fn build(&self, kind: PayloadKind, data: Value) -> Value {
        match self.mappings.get(&kind) {
            Some(build) => build(data),
            None => TaggedPayloads.build(kind, data),
        }
    }
}

impl fmt::Debug for MappedPayloads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedPayloads")
            .field("kinds", &self.mappings.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Rich media handed to `Convo::present`
#[derive(Debug, Clone, PartialEq)]
pub enum Media {
    /// Plain text, emitted as a JSON string
    Text(String),
    /// A typed payload, built through the flush's factory
    Kind { kind: PayloadKind, data: Value },
    /// A prebuilt platform payload, emitted as is
    Raw(Value),
}

impl Media {
    #[must_use]
    pub fn kind(kind: PayloadKind, data: Value) -> Self {
        Self::Kind { kind, data }
    }

    #[must_use]
    pub fn list(data: Value) -> Self {
        Self::kind(PayloadKind::List, data)
    }

    #[must_use]
    pub fn basic_card(data: Value) -> Self {
        Self::kind(PayloadKind::BasicCard, data)
    }

    #[must_use]
    pub fn image(data: Value) -> Self {
        Self::kind(PayloadKind::Image, data)
    }

    #[must_use]
    pub fn button(data: Value) -> Self {
        Self::kind(PayloadKind::Button, data)
    }

    #[must_use]
    pub fn sign_in(data: Value) -> Self {
        Self::kind(PayloadKind::SignIn, data)
    }

    /// Empty media is never buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Kind { .. } => false,
            Self::Raw(value) => value.is_null(),
        }
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    #[must_use]
    pub fn to_payload(&self, factory: &dyn PayloadFactory) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Kind { kind, data } => factory.build(*kind, data.clone()),
            Self::Raw(value) => value.clone(),
        }
    }
}

impl From<&str> for Media {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Media {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for Media {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Raw(other),
        }
    }
}

/// Surface-transfer details attached to capability-gated media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSpec {
    /// Spoken/written when the media is shown or the user is asked to switch
    pub notification: String,
    /// Why the user should switch surfaces
    pub context: String,
}

impl SendSpec {
    #[must_use]
    pub fn new(notification: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            notification: notification.into(),
            context: context.into(),
        }
    }
}

/// One headless flush record, in emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: Action,
    pub payload: Value,
}

impl Request {
    /// The `type` tag of a tagged payload, if any
    #[must_use]
    pub fn payload_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.payload.get("data")
    }
}
