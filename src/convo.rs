//! Per-turn conversation state
//!
//! A `Convo` wraps one platform `Turn` and buffers everything an intent handler
//! wants to say or show. Mutations consume and return the value, so a turn is
//! never shared between two handlers. The buffers are drained exactly once by
//! `Convo::ask` / `Convo::close` (see `flush`).
//!
//! Context writes go through a staging layer so that a handler always reads
//! back what it wrote this turn, even if the platform store is write-only.

mod flush;
mod list;
#[cfg(test)]
mod proptests;
mod selection;

pub use flush::{Completion, FlushOptions, LogFn, PendingConvo, Reply};
pub use list::{
    ListContext, ListPage, ListSelection, Paging, PagingUpdate, LIST_CONTEXT, LIST_LIFESPAN,
};
pub use selection::{Selection, SELECTION_CONTEXT, SELECTION_LIFESPAN};

use crate::error::{ConvoError, ConvoResult};
use crate::payload::{Media, SendSpec};
use crate::platform::Turn;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Observer notified with the full storage map after each storage mutation
pub type StorageObserver = Arc<dyn Fn(&Map<String, Value>) + Send + Sync>;

/// A buffered rich-media entry
#[derive(Debug, Clone, PartialEq)]
pub struct RichEntry {
    /// Surface capability required to show `media`
    pub capability: Option<String>,
    /// How to hand off to another surface when the current one lacks `capability`
    pub send: Option<SendSpec>,
    pub media: Media,
}

pub struct Convo {
    turn: Turn,
    write: Vec<String>,
    speak: Vec<String>,
    rich: Vec<RichEntry>,
    /// Contexts set during this turn; `None` is a staged deletion
    pending_contexts: HashMap<String, Option<Value>>,
    on_storage_updated: Option<StorageObserver>,
}

impl Convo {
    /// Convo over a zero-config mock turn
    #[must_use]
    pub fn new() -> Self {
        Self::with_turn(Turn::mock())
    }

    #[must_use]
    pub fn with_turn(turn: Turn) -> Self {
        Self {
            turn,
            write: Vec::new(),
            speak: Vec::new(),
            rich: Vec::new(),
            pending_contexts: HashMap::new(),
            on_storage_updated: None,
        }
    }

    /// Start the next turn from a finished one.
    ///
    /// The turn and the storage observer carry over. Buffers and staged
    /// contexts do not; contexts are read from the live turn again.
    #[must_use]
    pub fn from_prior(prior: Convo) -> Self {
        let observer = prior.on_storage_updated;
        let mut convo = Self::with_turn(prior.turn);
        convo.on_storage_updated = observer;
        convo
    }

    // ========================================================================
    // Output buffers
    // ========================================================================

    /// Append written-only text. Empty messages are ignored.
    #[must_use]
    pub fn write(mut self, message: impl fmt::Display) -> Self {
        let message = message.to_string();
        if !message.is_empty() {
            self.write.push(message);
        }
        self
    }

    /// Append written text only when nothing has been written yet
    #[must_use]
    pub fn write_if_empty(self, message: impl fmt::Display) -> Self {
        if self.has_writing() {
            self
        } else {
            self.write(message)
        }
    }

    /// Append spoken text that is also written
    #[must_use]
    pub fn speak(self, message: impl fmt::Display) -> Self {
        let message = message.to_string();
        self.speak_only(&message).write(message)
    }

    /// Append spoken text without writing it
    #[must_use]
    pub fn speak_only(mut self, message: impl fmt::Display) -> Self {
        self.speak.push(message.to_string());
        self
    }

    /// Present media on any surface
    #[must_use]
    pub fn present(self, media: impl Into<Media>) -> Self {
        self.present_with(media, None, None)
    }

    /// Present media gated on a surface capability, optionally offering to
    /// continue on another surface that has it
    #[must_use]
    pub fn present_with(
        mut self,
        media: impl Into<Media>,
        capability: Option<&str>,
        send: Option<SendSpec>,
    ) -> Self {
        let media = media.into();
        if !media.is_empty() {
            self.rich.push(RichEntry {
                capability: capability.map(str::to_string),
                send,
                media,
            });
        }
        self
    }

    /// Empty all output buffers
    #[must_use]
    pub fn clear(mut self) -> Self {
        self.write.clear();
        self.speak.clear();
        self.rich.clear();
        self
    }

    #[must_use]
    pub fn has_writing(&self) -> bool {
        !self.write.is_empty()
    }

    #[must_use]
    pub fn written(&self) -> &[String] {
        &self.write
    }

    #[must_use]
    pub fn spoken(&self) -> &[String] {
        &self.speak
    }

    #[must_use]
    pub fn rich(&self) -> &[RichEntry] {
        &self.rich
    }

    #[must_use]
    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn turn_mut(&mut self) -> &mut Turn {
        &mut self.turn
    }

    #[must_use]
    pub fn into_turn(self) -> Turn {
        self.turn
    }

    /// Run `f` on this convo as a deferred computation.
    ///
    /// `f` may return a `Convo`, a `ConvoResult<Convo>` or another
    /// `PendingConvo`; nested pending values are resolved in turn.
    #[must_use]
    pub fn promise<F, R>(self, f: F) -> PendingConvo
    where
        F: FnOnce(Convo) -> R + Send + 'static,
        R: Into<Reply>,
    {
        PendingConvo::new(async move {
            tokio::task::yield_now().await;
            let reply: Reply = f(self).into();
            reply.resolve().await
        })
    }

    // ========================================================================
    // Contexts
    // ========================================================================

    /// Parameters of context `name`, preferring values staged this turn
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidArgument` for an empty name.
    pub fn get_context(&self, name: &str) -> ConvoResult<Option<Value>> {
        if name.is_empty() {
            return Err(ConvoError::invalid_argument("context name is required"));
        }
        if let Some(staged) = self.pending_contexts.get(name) {
            return Ok(staged.clone());
        }
        Ok(self
            .turn
            .contexts
            .get(name)
            .map(|entry| entry.parameters)
            .filter(truthy))
    }

    /// Set context `name` for `lifespan` turns. `None`, JSON null or a zero
    /// lifespan deletes it.
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidArgument` for an empty name.
    pub fn set_context(
        mut self,
        name: &str,
        lifespan: u32,
        parameters: Option<Value>,
    ) -> ConvoResult<Self> {
        self.put_context(name, lifespan, parameters)?;
        Ok(self)
    }

    pub(crate) fn put_context(
        &mut self,
        name: &str,
        lifespan: u32,
        parameters: Option<Value>,
    ) -> ConvoResult<()> {
        if name.is_empty() {
            return Err(ConvoError::invalid_argument("context name is required"));
        }
        let parameters = parameters.filter(|p| lifespan > 0 && truthy(p));
        tracing::debug!(
            context = %name,
            lifespan,
            deleted = parameters.is_none(),
            "Setting context"
        );
        self.turn.contexts.set(name, lifespan, parameters.clone());
        self.pending_contexts.insert(name.to_string(), parameters);
        Ok(())
    }

    // ========================================================================
    // User storage
    // ========================================================================

    #[must_use]
    pub fn storage(&self) -> &Map<String, Value> {
        &self.turn.user.storage
    }

    /// Replace the whole storage map. This is loading, so the storage
    /// observer is not notified.
    #[must_use]
    pub fn set_storage(mut self, data: Option<Map<String, Value>>) -> Self {
        self.turn.user.storage = data.unwrap_or_default();
        self
    }

    /// Store `value` under `key` (null removes it) and notify the observer
    #[must_use]
    pub fn set_to_storage(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if value.is_null() {
            self.turn.user.storage.remove(&key);
        } else {
            self.turn.user.storage.insert(key, value);
        }
        if let Some(observer) = &self.on_storage_updated {
            observer(&self.turn.user.storage);
        }
        self
    }

    #[must_use]
    pub fn get_from_storage(&self, key: &str) -> Option<&Value> {
        self.turn.user.storage.get(key)
    }

    /// Whether `key` holds a truthy value
    #[must_use]
    pub fn is_in_storage(&self, key: &str) -> bool {
        self.is_in_storage_where(key, |_| true)
    }

    /// Whether `key` holds a truthy value that also satisfies `predicate`
    #[must_use]
    pub fn is_in_storage_where(&self, key: &str, predicate: impl FnOnce(&Value) -> bool) -> bool {
        self.get_from_storage(key)
            .filter(|value| truthy(value))
            .is_some_and(predicate)
    }

    #[must_use]
    pub fn on_storage_updated(
        mut self,
        observer: impl Fn(&Map<String, Value>) + Send + Sync + 'static,
    ) -> Self {
        self.on_storage_updated = Some(Arc::new(observer));
        self
    }

    // ========================================================================
    // Access token
    // ========================================================================

    #[must_use]
    pub fn set_access_token(mut self, token: impl Into<String>) -> Self {
        self.turn
            .user
            .access
            .insert("token".to_string(), Value::String(token.into()));
        self
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.turn.user.access.get("token").and_then(Value::as_str)
    }

    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.access_token().is_some_and(|token| !token.is_empty())
    }
}

impl Default for Convo {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Turn> for Convo {
    fn from(turn: Turn) -> Self {
        Self::with_turn(turn)
    }
}

impl fmt::Debug for Convo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Convo")
            .field("turn", &self.turn)
            .field("write", &self.write)
            .field("speak", &self.speak)
            .field("rich", &self.rich)
            .field("pending_contexts", &self.pending_contexts)
            .field("on_storage_updated", &self.on_storage_updated.is_some())
            .finish()
    }
}

/// JSON truthiness: null, false, 0 and "" are falsy
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
