// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordering guarantees across join, async resolution, and render cycles:
//! the join ack always precedes the first patch, and an `assign_async`
//! producer's result only ever lands by way of its own render cycle.

use ld_core::error::LiveDataError;
use ld_core::render_tree::RenderTree;
use ld_core::route::{RouteHandler, RouteTable};
use ld_core::socket::{Socket, Transport};
use ld_core::view::View;
use ld_runtime::telemetry::SessionMetrics;
use ld_runtime::{session, SessionHandle};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct RecordingTransport {
    sent: Mutex<Vec<Value>>,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    fn messages(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, message: Value) {
        self.sent.lock().unwrap().push(message);
    }
    fn close(&self) {}
}

struct AsyncProfileView;

impl View for AsyncProfileView {
    fn mount(&self, _params: &Value, socket: &mut Socket) -> Result<(), LiveDataError> {
        socket.assign_async(&["profile"], || {
            Box::pin(async {
                let mut result = serde_json::Map::new();
                result.insert("name".to_string(), Value::from("ada"));
                Ok(result)
            })
        })
    }

    fn has_mount(&self) -> bool {
        true
    }

    fn render(&self, assigns: &BTreeMap<String, Value>) -> RenderTree {
        RenderTree::object([(
            "profile",
            RenderTree::Value(assigns.get("profile").cloned().unwrap_or(Value::Null)),
        )])
    }
}

fn spawn_with(topic: &str, view: Arc<dyn View>, transport: Arc<RecordingTransport>) -> SessionHandle {
    let mut table = RouteTable::new();
    table.register(RouteHandler::new(topic, view)).unwrap();
    session::spawn(Arc::new(table), "dv:c:test", transport, Arc::new(SessionMetrics::new()))
}

fn patch_count(messages: &[Value]) -> usize {
    messages
        .iter()
        .filter(|m| m.get("event").and_then(Value::as_str) == Some("o"))
        .count()
}

#[tokio::test]
async fn join_ack_precedes_the_first_patch() {
    let transport = RecordingTransport::new();
    let handle = spawn_with("room:profile", Arc::new(AsyncProfileView), transport.clone());

    handle.join("room:profile", Value::Null).await.unwrap();

    let messages = transport.messages();
    assert!(messages[0].get("event").is_none(), "first message must be the bare join reply");
    assert_eq!(messages[1]["event"], "o", "second message is the first patch");
}

#[tokio::test]
async fn assign_async_resolves_in_a_render_cycle_of_its_own() {
    let transport = RecordingTransport::new();
    let handle = spawn_with("room:profile", Arc::new(AsyncProfileView), transport.clone());

    handle.join("room:profile", Value::Null).await.unwrap();
    // mount's assign_async producer is immediately ready, so it resolves
    // on the mailbox shortly after join; poll until its own render cycle
    // has landed rather than racing a single `ping`.
    let resolved = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            handle.ping().await.unwrap();
            let messages = transport.messages();
            if patch_count(&messages) >= 2 {
                break messages;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("assign_async producer never resolved");

    let patches: Vec<&Value> = resolved
        .iter()
        .filter(|m| m.get("event").and_then(Value::as_str) == Some("o"))
        .collect();
    // First patch is the mount's Loading placeholder; the second carries
    // the resolved result, as its own render cycle with its own render_count.
    assert_eq!(patches[0]["payload"]["c"], 0);
    assert_eq!(patches[1]["payload"]["c"], 1);
}
