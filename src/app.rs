//! Intent registry and the stock list/help intents
//!
//! A `ConvoApp` maps intent names to async handlers. Application-specific
//! wording lives in a `Responses` implementation; the registered list intents
//! drive the list state machine and hand the result to those hooks.


use crate::convo::{
    Completion, Convo, FlushOptions, ListPage, ListSelection, Paging, PagingUpdate, Selection,
};
use crate::error::{ConvoError, ConvoResult};
use crate::payload::PayloadFactory;
use crate::platform::Turn;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// List type used by the help intent
pub const HELP_LIST: &str = "help";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpTip {
    pub text: String,
}

/// One entry of the help list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpTopic {
    pub description: String,
    pub tips: Vec<HelpTip>,
}

impl HelpTopic {
    #[must_use]
    pub fn new<I, S>(description: impl Into<String>, tips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            description: description.into(),
            tips: tips
                .into_iter()
                .map(|text| HelpTip { text: text.into() })
                .collect(),
        }
    }
}

/// Application hooks called by the stock intents
pub trait Responses: Send + Sync + 'static {
    /// Describe the visible page after a list change
    #[must_use]
    fn respond_for_list(&self, convo: Convo, _page: ListPage) -> Convo {
        convo
    }

    #[must_use]
    fn respond_for_list_selection(&self, convo: Convo, selection: ListSelection) -> Convo {
        self.respond_for_selection(
            convo,
            Selection {
                selection_type: selection.list_type,
                item: selection.item,
            },
        )
    }

    #[must_use]
    fn respond_for_selection(&self, convo: Convo, _selection: Selection) -> Convo {
        convo
    }

    /// Topics presented by the `help` intent
    #[must_use]
    fn prepare_help(&self) -> Vec<HelpTopic> {
        Vec::new()
    }

    /// Query test used by `list_find`: case-insensitive substring match on a
    /// string item or any string field of an object item
    #[must_use]
    fn matches_query(&self, _list_type: &str, item: &Value, query: &str) -> bool {
        let query = query.to_lowercase();
        let matches = |text: &str| text.to_lowercase().contains(&query);
        match item {
            Value::String(text) => matches(text),
            Value::Object(fields) => fields.values().filter_map(Value::as_str).any(matches),
            _ => false,
        }
    }
}

/// `Responses` with every hook left at its default
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponses;

impl Responses for DefaultResponses {}

/// Parameters and the selected UI option an intent was invoked with
#[derive(Debug, Clone, PartialEq)]
pub struct IntentArgs {
    pub params: Value,
    pub option: Value,
}

impl IntentArgs {
    #[must_use]
    pub fn new(params: Value) -> Self {
        Self {
            params,
            option: Value::Null,
        }
    }

    /// Args carrying only a UI option key such as `item_1`
    #[must_use]
    pub fn option(option: impl Into<String>) -> Self {
        Self {
            params: Value::Null,
            option: Value::String(option.into()),
        }
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

impl Default for IntentArgs {
    fn default() -> Self {
        Self::new(json!({}))
    }
}

/// Registered intent handler
pub type IntentHandler = Arc<
    dyn Fn(Convo, IntentArgs, FlushOptions) -> BoxFuture<'static, ConvoResult<Completion>>
        + Send
        + Sync,
>;

/// Intent handler bound to an app's flush options, taking a raw platform turn
pub type BoundIntent =
    Arc<dyn Fn(Turn, IntentArgs) -> BoxFuture<'static, ConvoResult<Completion>> + Send + Sync>;

/// Platform adapter that routes recognised intents to bound handlers
pub trait IntentRegistrar {
    fn register(&mut self, intent: &str, handler: BoundIntent);
}

pub struct ConvoApp<R: Responses> {
    responses: Arc<R>,
    intents: BTreeMap<String, IntentHandler>,
    options: FlushOptions,
    help: Arc<Vec<HelpTopic>>,
}

impl<R: Responses> ConvoApp<R> {
    #[must_use]
    pub fn new(responses: R) -> Self {
        let help = Arc::new(responses.prepare_help());
        Self {
            responses: Arc::new(responses),
            intents: BTreeMap::new(),
            options: FlushOptions::default(),
            help,
        }
    }

    #[must_use]
    pub fn with_flush_options(mut self, options: FlushOptions) -> Self {
        self.options = options;
        self
    }

    /// Build payloads through `factory` instead of the tagged envelope
    #[must_use]
    pub fn with_payload_factory(mut self, factory: Arc<dyn PayloadFactory>) -> Self {
        self.options = self.options.with_factory(factory);
        self
    }

    #[must_use]
    pub fn responses(&self) -> &R {
        &self.responses
    }

    #[must_use]
    pub fn help_topics(&self) -> &[HelpTopic] {
        &self.help
    }

    pub fn intent_names(&self) -> impl Iterator<Item = &str> {
        self.intents.keys().map(String::as_str)
    }

    #[must_use]
    pub fn has_intent(&self, name: &str) -> bool {
        self.intents.contains_key(name)
    }

    /// Register `handler` under `name`, replacing any earlier handler
    #[must_use]
    pub fn register_intent<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Convo, IntentArgs, FlushOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ConvoResult<Completion>> + Send + 'static,
    {
        let handler: IntentHandler =
            Arc::new(move |convo: Convo, args: IntentArgs, options: FlushOptions| {
                handler(convo, args, options).boxed()
            });
        self.intents.insert(name.into(), handler);
        self
    }

    /// Register a synchronous handler whose result is flushed with `ask`
    #[must_use]
    pub fn register_ask<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&R, Convo, &IntentArgs) -> ConvoResult<Convo> + Send + Sync + 'static,
    {
        let responses = Arc::clone(&self.responses);
        self.register_intent(name, move |convo, args, options| {
            let reply = handler(&responses, convo, &args);
            async move { Convo::ask(reply, &options).await }
        })
    }

    /// Run intent `name`. An unregistered intent flushes nothing and hands
    /// the convo back untouched.
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidArgument` for an empty name, otherwise whatever
    /// the handler returns.
    pub async fn intent(
        &self,
        convo: Convo,
        name: &str,
        args: IntentArgs,
    ) -> ConvoResult<Completion> {
        if name.is_empty() {
            return Err(ConvoError::invalid_argument("intent name is required"));
        }
        let Some(handler) = self.intents.get(name) else {
            tracing::debug!(intent = %name, "No handler registered for intent");
            return Ok(Completion::Recorded {
                convo,
                requests: Vec::new(),
            });
        };
        tracing::debug!(intent = %name, "Running intent");
        handler(convo, args, self.options.clone()).await
    }

    /// Hand every registered intent to a platform adapter
    pub fn bind<'a, T: IntentRegistrar>(&self, registrar: &'a mut T) -> &'a mut T {
        for (name, handler) in &self.intents {
            let handler = Arc::clone(handler);
            let options = self.options.clone();
            let bound: BoundIntent = Arc::new(move |turn: Turn, args: IntentArgs| {
                handler(Convo::with_turn(turn), args, options.clone())
            });
            registrar.register(name, bound);
        }
        registrar
    }

    /// Set `list` as the current list and describe its first page
    ///
    /// # Errors
    ///
    /// Returns the errors of `Convo::set_list`.
    pub fn present_list(
        &self,
        convo: Convo,
        list_type: &str,
        list: Vec<Value>,
        paging: Option<Paging>,
    ) -> ConvoResult<Convo> {
        present_list(self.responses.as_ref(), convo, list_type, list, paging)
    }

    /// Select `item` and describe it
    ///
    /// # Errors
    ///
    /// Returns the errors of `Convo::select`.
    pub fn present_selection(
        &self,
        convo: Convo,
        selection_type: &str,
        item: Value,
    ) -> ConvoResult<Convo> {
        Ok(convo
            .select(selection_type, item)?
            .for_selection(|convo, selection| {
                self.responses.respond_for_selection(convo, selection)
            }))
    }

    /// Register `list_clear`, `list_repeat`, `list_next`, `list_prev`,
    /// `list_all`, `list_select`, `list_select_ui`, `list_find`,
    /// `list_select_next` and `list_select_prev`
    #[must_use]
    pub fn register_list_intents(self) -> Self {
        self.register_ask("list_clear", |_, convo, _| convo.clear_list())
            .register_ask("list_repeat", |responses, convo, _| {
                Ok(respond_for_page(responses, convo))
            })
            .register_ask("list_next", |responses, convo, args| {
                let convo = convo.next_list_page(page_count(args))?;
                Ok(respond_for_page(responses, convo))
            })
            .register_ask("list_prev", |responses, convo, args| {
                let convo = convo.prev_list_page(page_count(args))?;
                Ok(respond_for_page(responses, convo))
            })
            .register_ask("list_all", |responses, convo, _| {
                let convo = convo.update_list_paging(Some(PagingUpdate::from(Paging::all())))?;
                Ok(respond_for_page(responses, convo))
            })
            .register_ask("list_select", |responses, convo, args| {
                let index = args
                    .param("index")
                    .and_then(ensure_number)
                    .ok_or_else(|| ConvoError::invalid_argument("index is required"))?;
                let convo = convo.select_from_list_page(correct_for_zero_index(index))?;
                Ok(respond_for_list_selection(responses, convo))
            })
            .register_ask("list_select_ui", |responses, convo, args| {
                let index = ui_option_index(&args.option).ok_or_else(|| {
                    ConvoError::invalid_argument(format!(
                        "option {} does not name a list item",
                        args.option
                    ))
                })?;
                let convo = convo.select_from_list_page(index)?;
                Ok(respond_for_list_selection(responses, convo))
            })
            .register_ask("list_find", |responses, convo, args| {
                let query = args
                    .param("query")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ConvoError::invalid_argument("query is required"))?;
                let convo = convo.select_from_list_by_query(query, |list_type, item, query| {
                    responses.matches_query(list_type, item, query)
                })?;
                Ok(respond_for_list_selection(responses, convo))
            })
            .register_ask("list_select_next", |responses, convo, _| {
                let convo = convo.select_next_from_list()?;
                Ok(respond_for_list_selection(responses, convo))
            })
            .register_ask("list_select_prev", |responses, convo, _| {
                let convo = convo.select_prev_from_list()?;
                Ok(respond_for_list_selection(responses, convo))
            })
    }

    /// Register `help`, which presents `Responses::prepare_help` as a list
    #[must_use]
    pub fn register_help_intent(self) -> Self {
        let topics = Arc::clone(&self.help);
        self.register_ask("help", move |responses, convo, _| {
            let list = topics
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            present_list(responses, convo, HELP_LIST, list, None)
        })
    }
}

fn present_list<R: Responses>(
    responses: &R,
    convo: Convo,
    list_type: &str,
    list: Vec<Value>,
    paging: Option<Paging>,
) -> ConvoResult<Convo> {
    let convo = convo.set_list(list_type, list, paging)?;
    Ok(respond_for_page(responses, convo))
}

fn respond_for_page<R: Responses>(responses: &R, convo: Convo) -> Convo {
    convo.for_list_page(|convo, page| responses.respond_for_list(convo, page))
}

fn respond_for_list_selection<R: Responses>(responses: &R, convo: Convo) -> Convo {
    convo.for_list_selection(|convo, selection| {
        responses.respond_for_list_selection(convo, selection)
    })
}

/// Page size requested by `list_next` / `list_prev`. Without params the rest
/// of the list is shown; params without `count` keep the page size.
fn page_count(args: &IntentArgs) -> i64 {
    if args.params.is_null() {
        return -1;
    }
    args.param("count").and_then(ensure_number).unwrap_or(0)
}

/// Page index from a UI option key such as `item_1`
fn ui_option_index(option: &Value) -> Option<i64> {
    let key = option.as_str()?;
    let (_, index) = key.rsplit_once('_')?;
    index.parse().ok()
}

/// Integer value of a JSON number or numeric string
#[must_use]
pub fn ensure_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Convert a spoken 1-based index to a 0-based one, never below 0
#[must_use]
pub fn correct_for_zero_index(index: i64) -> i64 {
    index.saturating_sub(1).max(0)
}
