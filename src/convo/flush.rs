//! Flush protocol: drain a turn's buffers into platform payloads
//!
//! Planning is pure (`plan_payloads`), dispatch is the only effect. With a
//! responder that handles the action, every payload is sent and the results
//! are awaited together. Without one, the payloads become an ordered request
//! record, which is what headless tests assert against.

use super::Convo;
use crate::config::ConvoConfig;
use crate::error::ConvoResult;
use crate::payload::{PayloadFactory, PayloadKind, Request, TaggedPayloads};
use crate::platform::Action;
use crate::say::Say;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Caller-supplied sink for headless request logging
pub type LogFn = Arc<dyn Fn(Action, &Value) + Send + Sync>;

/// A deferred `Convo`, produced by `Convo::promise`
pub struct PendingConvo(BoxFuture<'static, ConvoResult<Convo>>);

impl PendingConvo {
    #[must_use]
    pub fn new(future: impl Future<Output = ConvoResult<Convo>> + Send + 'static) -> Self {
        Self(future.boxed())
    }
}

impl Future for PendingConvo {
    type Output = ConvoResult<Convo>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

impl fmt::Debug for PendingConvo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingConvo")
    }
}

/// Anything an intent handler may hand to `ask` / `close`
#[derive(Debug)]
pub enum Reply {
    Ready(ConvoResult<Convo>),
    Pending(PendingConvo),
}

impl Reply {
    /// Resolve to a `Convo`, awaiting any chain of pending values
    ///
    /// # Errors
    ///
    /// Returns the first error produced while resolving.
    pub async fn resolve(self) -> ConvoResult<Convo> {
        match self {
            Reply::Ready(result) => result,
            Reply::Pending(pending) => pending.await,
        }
    }
}

impl From<Convo> for Reply {
    fn from(convo: Convo) -> Self {
        Reply::Ready(Ok(convo))
    }
}

impl From<ConvoResult<Convo>> for Reply {
    fn from(result: ConvoResult<Convo>) -> Self {
        Reply::Ready(result)
    }
}

impl From<PendingConvo> for Reply {
    fn from(pending: PendingConvo) -> Self {
        Reply::Pending(pending)
    }
}

/// Flush behaviour
#[derive(Clone)]
pub struct FlushOptions {
    /// Log headless requests as they are recorded
    pub log: bool,
    /// Sink for headless logging; `tracing` is used when unset
    pub log_fn: Option<LogFn>,
    pub factory: Arc<dyn PayloadFactory>,
}

impl FlushOptions {
    #[must_use]
    pub fn logged() -> Self {
        Self {
            log: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_config(config: &ConvoConfig) -> Self {
        Self {
            log: config.log_requests,
            ..Self::default()
        }
    }

    /// Route headless logging through `log_fn`. Enables logging.
    #[must_use]
    pub fn with_log_fn(mut self, log_fn: impl Fn(Action, &Value) + Send + Sync + 'static) -> Self {
        self.log = true;
        self.log_fn = Some(Arc::new(log_fn));
        self
    }

    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn PayloadFactory>) -> Self {
        self.factory = factory;
        self
    }
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self {
            log: false,
            log_fn: None,
            factory: Arc::new(TaggedPayloads),
        }
    }
}

impl fmt::Debug for FlushOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushOptions")
            .field("log", &self.log)
            .field("log_fn", &self.log_fn.is_some())
            .finish_non_exhaustive()
    }
}

/// Outcome of a flush
#[derive(Debug)]
pub enum Completion {
    /// Payloads were sent to the turn's responder; results in issue order
    Dispatched { convo: Convo, results: Vec<Value> },
    /// No responder handled the action; payloads recorded in emission order
    Recorded { convo: Convo, requests: Vec<Request> },
}

impl Completion {
    #[must_use]
    pub fn convo(&self) -> &Convo {
        match self {
            Self::Dispatched { convo, .. } | Self::Recorded { convo, .. } => convo,
        }
    }

    #[must_use]
    pub fn into_convo(self) -> Convo {
        match self {
            Self::Dispatched { convo, .. } | Self::Recorded { convo, .. } => convo,
        }
    }

    /// Recorded requests; empty when dispatched
    #[must_use]
    pub fn requests(&self) -> &[Request] {
        match self {
            Self::Recorded { requests, .. } => requests,
            Self::Dispatched { .. } => &[],
        }
    }

    /// Responder results; empty when recorded
    #[must_use]
    pub fn results(&self) -> &[Value] {
        match self {
            Self::Dispatched { results, .. } => results,
            Self::Recorded { .. } => &[],
        }
    }
}

fn join_sentences(fragments: &[String]) -> String {
    fragments
        .iter()
        .fold(Say::new(), |said, fragment| said.sentence(fragment))
        .to_string()
}

fn simple_response(factory: &dyn PayloadFactory, text: &str, speech: &str) -> Value {
    factory.build(
        PayloadKind::SimpleResponse,
        json!({ "text": text, "speech": speech }),
    )
}

/// Compute the payloads a flush emits, in order
pub(crate) fn plan_payloads(convo: &Convo, factory: &dyn PayloadFactory) -> Vec<Value> {
    let text = join_sentences(&convo.write);
    let speech = join_sentences(&convo.speak);
    let text_populated = !text.is_empty() || !speech.is_empty();
    let mut payloads = Vec::with_capacity(convo.rich.len() + 1);

    if text_populated {
        let shown = if text.is_empty() { &speech } else { &text };
        let spoken = if speech.is_empty() { &text } else { &speech };
        payloads.push(simple_response(factory, shown, spoken));
    }

    let turn = &convo.turn;
    for entry in &convo.rich {
        let capability = entry.capability.as_deref();
        if capability.is_none() && entry.send.is_none() {
            payloads.push(entry.media.to_payload(factory));
        } else if turn.surface.supports(capability) {
            if let Some(send) = entry.send.as_ref().filter(|_| !text_populated) {
                if !entry.media.is_text() {
                    payloads.push(simple_response(
                        factory,
                        &send.notification,
                        &send.notification,
                    ));
                }
            }
            payloads.push(entry.media.to_payload(factory));
        } else if let Some(send) = entry
            .send
            .as_ref()
            .filter(|_| turn.available_surfaces.supports(capability))
        {
            payloads.push(factory.build(
                PayloadKind::NewSurface,
                json!({
                    "context": send.context,
                    "notification": send.notification,
                    "capabilities": capability,
                }),
            ));
        } else {
            tracing::debug!(
                capability = ?capability,
                "Dropping rich media unavailable on any surface"
            );
        }
    }

    payloads
}

impl Convo {
    /// Flush `convo` as `action`
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::Platform` when the responder rejects a payload.
    pub async fn complete(
        convo: Convo,
        action: Action,
        options: &FlushOptions,
    ) -> ConvoResult<Completion> {
        let payloads = plan_payloads(&convo, options.factory.as_ref());

        let responder = convo
            .turn
            .responder
            .clone()
            .filter(|responder| responder.handles(action));

        if let Some(responder) = responder {
            tracing::debug!(action = %action, payloads = payloads.len(), "Dispatching turn");
            let results = try_join_all(
                payloads
                    .into_iter()
                    .map(|payload| responder.respond(action, payload)),
            )
            .await?;
            return Ok(Completion::Dispatched { convo, results });
        }

        let requests: Vec<Request> = payloads
            .into_iter()
            .map(|payload| Request { action, payload })
            .collect();

        if options.log {
            for request in &requests {
                match &options.log_fn {
                    Some(log_fn) => log_fn(action, &request.payload),
                    None => tracing::info!(
                        action = %action,
                        payload = %request.payload,
                        "Recorded request"
                    ),
                }
            }
        }

        Ok(Completion::Recorded { convo, requests })
    }

    /// Resolve `value` and flush it as an `ask`
    ///
    /// # Errors
    ///
    /// Returns an error if `value` resolves to one, or if dispatch fails.
    pub async fn ask(value: impl Into<Reply>, options: &FlushOptions) -> ConvoResult<Completion> {
        let reply: Reply = value.into();
        let convo = reply.resolve().await?;
        Self::complete(convo, Action::Ask, options).await
    }

    /// Resolve `value` and flush it as a `close`
    ///
    /// # Errors
    ///
    /// Returns an error if `value` resolves to one, or if dispatch fails.
    pub async fn close(value: impl Into<Reply>, options: &FlushOptions) -> ConvoResult<Completion> {
        let reply: Reply = value.into();
        let convo = reply.resolve().await?;
        Self::complete(convo, Action::Close, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvoError;
    use crate::payload::{Media, MappedPayloads, SendSpec};
    use crate::platform::testing::RecordingResponder;
    use crate::platform::{CapabilitySet, Turn};
    use std::sync::Mutex;

    const SCREEN: &str = "actions.capability.SCREEN_OUTPUT";

    fn headless(completion: &Completion) -> &[Request] {
        assert!(matches!(completion, Completion::Recorded { .. }));
        completion.requests()
    }

    // ========================================================================
    // Simple responses
    // ========================================================================

    #[tokio::test]
    async fn test_close_single_phrase() {
        let completion = Convo::close(Convo::new().speak("statement"), &FlushOptions::default())
            .await
            .unwrap();
        let requests = headless(&completion);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].action, Action::Close);
        assert_eq!(requests[0].payload_type(), Some("SimpleResponse"));
        let data = requests[0].data().unwrap();
        assert_eq!(data["text"], "statement");
        assert_eq!(data["speech"], "statement");
    }

    #[tokio::test]
    async fn test_multiple_phrases_join() {
        let convo = Convo::new().speak("test").speak("test").speak("test");
        let completion = Convo::ask(convo, &FlushOptions::default()).await.unwrap();
        let requests = headless(&completion);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].action, Action::Ask);
        assert_eq!(requests[0].data().unwrap()["speech"], "test test test");
        assert_eq!(requests[0].data().unwrap()["text"], "test test test");
    }

    #[tokio::test]
    async fn test_different_text_and_speech() {
        let convo = Convo::new().speak_only("spoken").write("written");
        let completion = Convo::close(convo, &FlushOptions::default()).await.unwrap();
        let data = headless(&completion)[0].data().unwrap().clone();
        assert_eq!(data["text"], "written");
        assert_eq!(data["speech"], "spoken");
    }

    #[tokio::test]
    async fn test_text_falls_back_to_speech() {
        let convo = Convo::new().speak_only("only spoken");
        let completion = Convo::close(convo, &FlushOptions::default()).await.unwrap();
        let data = headless(&completion)[0].data().unwrap().clone();
        assert_eq!(data["text"], "only spoken");
        assert_eq!(data["speech"], "only spoken");
    }

    #[tokio::test]
    async fn test_empty_flush_emits_nothing() {
        let completion = Convo::close(Convo::new(), &FlushOptions::default())
            .await
            .unwrap();
        assert!(headless(&completion).is_empty());
    }

    // ========================================================================
    // Rich media routing
    // ========================================================================

    #[tokio::test]
    async fn test_simple_response_always_first() {
        let convo = Convo::new().present(Media::list(json!({}))).speak("test");
        let completion = Convo::close(convo, &FlushOptions::default()).await.unwrap();
        let requests = headless(&completion);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].payload_type(), Some("SimpleResponse"));
        assert_eq!(requests[0].data().unwrap()["text"], "test");
        assert_eq!(requests[1].payload_type(), Some("List"));
    }

    #[test]
    fn test_ungated_media_ignores_surface() {
        let turn = Turn::mock()
            .with_surface(CapabilitySet::none())
            .with_available_surfaces(CapabilitySet::none());
        let convo = Convo::with_turn(turn).present(Media::image(json!({ "url": "u" })));
        let payloads = plan_payloads(&convo, &TaggedPayloads);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["type"], "Image");
    }

    #[test]
    fn test_gated_media_on_capable_surface() {
        let turn = Turn::mock().with_surface(CapabilitySet::of([SCREEN]));
        let convo = Convo::with_turn(turn)
            .speak("here")
            .present_with(Media::basic_card(json!({})), Some(SCREEN), None);
        let payloads = plan_payloads(&convo, &TaggedPayloads);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1]["type"], "BasicCard");
    }

    #[test]
    fn test_notification_synthesized_without_text() {
        let turn = Turn::mock().with_surface(CapabilitySet::of([SCREEN]));
        let convo = Convo::with_turn(turn).present_with(
            Media::basic_card(json!({})),
            Some(SCREEN),
            Some(SendSpec::new("Here is the card", "To show the card")),
        );
        let payloads = plan_payloads(&convo, &TaggedPayloads);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0]["type"], "SimpleResponse");
        assert_eq!(payloads[0]["data"]["speech"], "Here is the card");
        assert_eq!(payloads[1]["type"], "BasicCard");
    }

    #[test]
    fn test_no_notification_for_text_media() {
        let turn = Turn::mock().with_surface(CapabilitySet::of([SCREEN]));
        let convo = Convo::with_turn(turn).present_with(
            "plain",
            Some(SCREEN),
            Some(SendSpec::new("note", "ctx")),
        );
        let payloads = plan_payloads(&convo, &TaggedPayloads);
        assert_eq!(payloads, vec![json!("plain")]);
    }

    #[test]
    fn test_new_surface_redirect() {
        let turn = Turn::mock()
            .with_surface(CapabilitySet::none())
            .with_available_surfaces(CapabilitySet::of([SCREEN]));
        let convo = Convo::with_turn(turn).present_with(
            Media::list(json!({})),
            Some(SCREEN),
            Some(SendSpec::new("Check your phone", "To see the list")),
        );
        let payloads = plan_payloads(&convo, &TaggedPayloads);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["type"], "NewSurface");
        assert_eq!(payloads[0]["data"]["context"], "To see the list");
        assert_eq!(payloads[0]["data"]["notification"], "Check your phone");
        assert_eq!(payloads[0]["data"]["capabilities"], SCREEN);
    }

    #[test]
    fn test_unavailable_media_dropped() {
        let turn = Turn::mock()
            .with_surface(CapabilitySet::none())
            .with_available_surfaces(CapabilitySet::none());
        let convo = Convo::with_turn(turn)
            .present_with(
                Media::list(json!({})),
                Some(SCREEN),
                Some(SendSpec::new("n", "c")),
            )
            .present_with(Media::list(json!({})), Some(SCREEN), None);
        assert!(plan_payloads(&convo, &TaggedPayloads).is_empty());
    }

    #[test]
    fn test_mapped_factory_used() {
        let factory = MappedPayloads::new().map(PayloadKind::SimpleResponse, |data| {
            json!({ "mapped": data["text"] })
        });
        let convo = Convo::new().speak("hi");
        let payloads = plan_payloads(&convo, &factory);
        assert_eq!(payloads, vec![json!({ "mapped": "hi" })]);
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    #[tokio::test]
    async fn test_dispatch_to_responder() {
        let responder = Arc::new(RecordingResponder::new());
        let turn = Turn::mock().with_responder(responder.clone());
        let convo = Convo::with_turn(turn)
            .speak("hello")
            .present(Media::image(json!({})));

        let completion = Convo::ask(convo, &FlushOptions::default()).await.unwrap();
        assert!(completion.requests().is_empty());
        assert_eq!(completion.results().len(), 2);

        let calls = responder.recorded_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, Action::Ask);
        assert_eq!(calls[0].1["type"], "SimpleResponse");
        assert_eq!(calls[1].1["type"], "Image");
    }

    #[tokio::test]
    async fn test_dispatch_propagates_failure() {
        let responder = Arc::new(RecordingResponder::new().failing_at(1));
        let turn = Turn::mock().with_responder(responder);
        let convo = Convo::with_turn(turn)
            .speak("hello")
            .present(Media::image(json!({})));

        let err = Convo::close(convo, &FlushOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvoError::Platform(_)));
    }

    #[tokio::test]
    async fn test_unhandled_action_records() {
        let responder = Arc::new(RecordingResponder::new().handling(&[Action::Close]));
        let turn = Turn::mock().with_responder(responder.clone());
        let completion = Convo::ask(Convo::with_turn(turn).speak("x"), &FlushOptions::default())
            .await
            .unwrap();
        assert_eq!(completion.requests().len(), 1);
        assert!(responder.recorded_calls().is_empty());
    }

    // ========================================================================
    // Resolution and logging
    // ========================================================================

    #[tokio::test]
    async fn test_ask_resolves_pending() {
        let pending = Convo::new().promise(|convo| convo.speak("deferred"));
        let completion = Convo::ask(pending, &FlushOptions::default()).await.unwrap();
        assert_eq!(completion.requests()[0].data().unwrap()["speech"], "deferred");
    }

    #[tokio::test]
    async fn test_ask_propagates_handler_error() {
        let pending = Convo::new().promise(|_| -> ConvoResult<Convo> {
            Err(ConvoError::invalid_state("no list"))
        });
        let err = Convo::ask(pending, &FlushOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvoError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_log_fn_receives_requests() {
        let logged = Arc::new(Mutex::new(Vec::new()));
        let sink = logged.clone();
        let options = FlushOptions::default().with_log_fn(move |action, payload| {
            sink.lock().unwrap().push((action, payload.clone()));
        });

        Convo::close(Convo::new().speak("a").present(Media::list(json!({}))), &options)
            .await
            .unwrap();

        let logged = logged.lock().unwrap();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].0, Action::Close);
        assert_eq!(logged[1].1["type"], "List");
    }

    #[tokio::test]
    async fn test_completion_returns_convo() {
        let convo = Convo::new()
            .set_context("kept", 2, Some(json!({ "a": 1 })))
            .unwrap()
            .speak("x");
        let completion = Convo::close(convo, &FlushOptions::default()).await.unwrap();
        let next = Convo::from_prior(completion.into_convo());
        assert_eq!(next.get_context("kept").unwrap(), Some(json!({ "a": 1 })));
    }
}
