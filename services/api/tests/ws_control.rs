use std::sync::Arc;
use std::time::Duration;

use api_lib::config::Config;
use api_lib::web::protocol::shared_sender;
use api_lib::web::state::{AppState, ConnectionState};
use api_lib::web::ws_handler::handle_text_message;
use axum::extract::ws::Message;
use bbq_core::{InMemoryStore, NewReading};
use chrono::Utc;
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;

struct Client {
    state: Arc<AppState>,
    connection: ConnectionState,
    sender: api_lib::web::protocol::WsSender,
    outbox: UnboundedReceiver<Message>,
}

impl Client {
    fn new() -> Self {
        let config = Config::from_lookup(|_| None).expect("defaults are valid");
        let state = Arc::new(AppState {
            store: Arc::new(InMemoryStore::new()),
            config: Arc::new(config),
        });
        let (tx, outbox) = unbounded::<Message>();
        Self {
            state,
            connection: ConnectionState::default(),
            sender: shared_sender(tx.sink_map_err(|e| axum::Error::new(e))),
            outbox,
        }
    }

    async fn send(&mut self, msg: Value) {
        handle_text_message(&msg.to_string(), &self.state, &mut self.connection, &self.sender).await;
    }

    async fn append(&self, session_id: &str, food: f64) {
        let reading = NewReading {
            ambient_temp_f: 230.0,
            food_temp_f: food,
            duty_pct: 50.0,
        };
        self.state
            .store
            .append_reading(session_id, reading, Utc::now())
            .await
            .unwrap();
    }

    /// Next server message of the given `type`. Every message skipped on the
    /// way must satisfy `skipped`.
    async fn next_checked<F>(&mut self, kind: &str, skipped: F) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        timeout(Duration::from_secs(2), async {
            loop {
                let msg = self.outbox.next().await.expect("sender dropped");
                let text = match msg {
                    Message::Text(text) => text,
                    other => panic!("expected a text frame, got {:?}", other),
                };
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if value["type"] == kind {
                    return value;
                }
                assert!(skipped(&value), "unexpected message before {}: {}", kind, value);
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for a {} message", kind))
    }

    async fn next_of(&mut self, kind: &str) -> Value {
        self.next_checked(kind, |_| true).await
    }
}

#[tokio::test]
async fn subscribe_is_confirmed_before_views() {
    let mut client = Client::new();
    client.append("1", 120.0).await;

    client.send(json!({"type": "subscribe", "session_id": "1"})).await;
    let confirmed = client.next_checked("subscribed", |_| false).await;
    assert_eq!(confirmed["session_id"], "1");

    let view = client.next_checked("view", |_| false).await;
    assert_eq!(view["view"]["session_id"], "1");
    assert_eq!(view["view"]["chart"]["time"].as_array().unwrap().len(), 1);

    client.append("1", 121.0).await;
    let view = loop {
        let view = client.next_of("view").await;
        if view["view"]["chart"]["time"].as_array().unwrap().len() == 2 {
            break view;
        }
    };
    assert_eq!(view["view"]["summary_lines"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn set_target_before_subscribe_is_an_error() {
    let mut client = Client::new();
    client.append("1", 120.0).await;

    client.send(json!({"type": "set_target", "food_target": 203.0})).await;
    let error = client.next_checked("error", |_| false).await;
    assert!(error["message"].as_str().unwrap().contains("Subscribe"));
    assert_eq!(client.connection.session_id, None);

    // The connection keeps serving.
    client.send(json!({"type": "subscribe", "session_id": "1"})).await;
    client.next_checked("subscribed", |_| false).await;
}

#[tokio::test]
async fn unrecognized_messages_are_reported() {
    let mut client = Client::new();
    client.send(json!({"type": "reset"})).await;
    let error = client.next_checked("error", |_| false).await;
    assert!(error["message"].as_str().unwrap().starts_with("Unrecognized message"));
}

#[tokio::test]
async fn target_updates_reach_the_live_view() {
    let mut client = Client::new();
    client.append("1", 120.0).await;
    client.send(json!({"type": "subscribe", "session_id": "1"})).await;
    client.next_of("view").await;

    client.send(json!({"type": "set_target", "food_target": 203.0})).await;
    let updated = client.next_of("target_updated").await;
    assert_eq!(updated, json!({"type": "target_updated", "session_id": "1", "food_target": 203.0}));

    let view = loop {
        let view = client.next_of("view").await;
        if view["view"]["food_target"] == 203.0 {
            break view;
        }
    };
    assert_eq!(view["view"]["session_id"], "1");
}

#[tokio::test]
async fn failed_target_write_is_an_error() {
    let mut client = Client::new();
    client.send(json!({"type": "subscribe", "session_id": "missing"})).await;
    client.next_of("subscribed").await;

    client.send(json!({"type": "set_target", "food_target": 203.0})).await;
    let error = client.next_checked("error", |v| v["type"] == "view").await;
    assert!(error["message"].as_str().unwrap().contains("not found"));
    assert_eq!(client.connection.session_id.as_deref(), Some("missing"));
}

#[tokio::test]
async fn resubscribing_replaces_the_dashboard_task() {
    let mut client = Client::new();
    client.append("1", 120.0).await;
    client.append("2", 40.0).await;

    client.send(json!({"type": "subscribe", "session_id": "1"})).await;
    client.next_of("subscribed").await;
    let first_token = client.connection.cancellation_token.clone();

    client.send(json!({"type": "subscribe", "session_id": "2"})).await;
    assert!(first_token.is_cancelled());
    assert!(!client.connection.cancellation_token.is_cancelled());
    assert_eq!(client.connection.session_id.as_deref(), Some("2"));
    let confirmed = client.next_checked("subscribed", |v| v["type"] == "view").await;
    assert_eq!(confirmed["session_id"], "2");

    // Only the new session streams from here on.
    client.append("1", 121.0).await;
    client.append("2", 41.0).await;
    let view = loop {
        let view = client.next_checked("view", |_| false).await;
        assert_eq!(view["view"]["session_id"], "2");
        if view["view"]["chart"]["time"].as_array().unwrap().len() == 2 {
            break view;
        }
    };
    assert_eq!(view["view"]["stale"], Value::Null);
}
