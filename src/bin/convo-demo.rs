//! Headless walk through a list conversation
//!
//! Presents a list of streamers three at a time, finds one by name and steps
//! through the selection, logging every recorded request. When
//! `CONVO_STORAGE_PATH` is set, a visit counter is kept in that file.

use convo::{
    Completion, Convo, ConvoApp, ConvoConfig, ConvoResult, ConvoStorage, FlushOptions,
    IntentArgs, ListPage, Paging, Responses, Say, Selection,
};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Streamers;

fn display_name(item: &Value) -> String {
    item["display_name"].as_str().unwrap_or_default().to_string()
}

impl Responses for Streamers {
    fn respond_for_list(&self, convo: Convo, page: ListPage) -> Convo {
        if page.list.is_empty() {
            return convo.speak("The list is empty.");
        }
        convo.speak(Say::list_page_response(
            &page.page,
            page.paging,
            &page.list,
            display_name,
        ))
    }

    fn respond_for_selection(&self, convo: Convo, selection: Selection) -> Convo {
        convo.speak(format!("Selected item: {}", display_name(&selection.item)))
    }
}

fn app(options: FlushOptions) -> ConvoApp<Streamers> {
    ConvoApp::new(Streamers)
        .with_flush_options(options)
        .register_list_intents()
        .register_ask("welcome", |responses, convo, _| {
            let list = vec![
                json!({ "display_name": "KingGothalion" }),
                json!({ "display_name": "Ninja" }),
                json!({ "display_name": "professorbroman" }),
                json!({ "display_name": "tmtek" }),
            ];
            let convo = convo
                .speak("Here's your list:")
                .set_list("general", list, Some(Paging::new(0, 3)))?;
            Ok(convo.for_list_page(|convo, page| responses.respond_for_list(convo, page)))
        })
}

fn log_turn(intent: &str, completion: &Completion) {
    for request in completion.requests() {
        tracing::info!(intent, action = %request.action, payload = %request.payload, "Turn output");
    }
}

async fn run(config: &ConvoConfig) -> ConvoResult<()> {
    let app = app(FlushOptions::from_config(config));

    let first = match &config.storage_path {
        Some(_) => {
            let storage = ConvoStorage::from_config(config)?;
            storage
                .load(|convo| {
                    let visits = convo
                        .get_from_storage("visits")
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    tracing::info!(visits, "Loaded storage");
                    convo.set_to_storage("visits", json!(visits + 1))
                })
                .await
        }
        None => Convo::new(),
    };

    let turns = [
        ("welcome", IntentArgs::default()),
        ("list_find", IntentArgs::new(json!({ "query": "bro" }))),
        ("list_select_next", IntentArgs::default()),
        ("list_select_next", IntentArgs::default()),
        ("list_select_next", IntentArgs::default()),
    ];

    let mut convo = first;
    for (intent, args) in turns {
        let completion = app.intent(convo, intent, args).await?;
        log_turn(intent, &completion);
        convo = Convo::from_prior(completion.into_convo());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convo=info,convo_demo=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ConvoConfig::from_env();
    tracing::info!(
        log_requests = config.log_requests,
        storage = ?config.storage_path,
        "Starting demo"
    );

    run(&config).await?;
    Ok(())
}
