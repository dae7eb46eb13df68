//! Convo - conversational state for turn-based voice-assistant apps
//!
//! An intent handler receives a [`Convo`] wrapping the platform [`Turn`],
//! buffers text, speech and rich media on it, keeps a paged/selectable list
//! and a selection in platform contexts, and hands it to [`Convo::ask`] or
//! [`Convo::close`], which flush the buffers into platform payloads.

pub mod app;
pub mod config;
pub mod convo;
pub mod error;
pub mod payload;
pub mod platform;
pub mod say;
pub mod storage;
pub mod testing;

pub use app::{ConvoApp, DefaultResponses, HelpTopic, IntentArgs, IntentRegistrar, Responses};
pub use config::ConvoConfig;
pub use convo::{
    Completion, Convo, FlushOptions, ListContext, ListPage, ListSelection, Paging, PagingUpdate,
    PendingConvo, Reply, Selection,
};
pub use error::{ConvoError, ConvoResult};
pub use payload::{Media, PayloadFactory, PayloadKind, Request, SendSpec};
pub use platform::{Action, CapabilitySet, ContextStore, Responder, Turn};
pub use say::Say;
pub use storage::ConvoStorage;
