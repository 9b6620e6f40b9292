// SPDX-License-Identifier: MIT OR Apache-2.0
//! The session actor: the per-subscription process that resolves a join
//! topic to a mounted view's socket, dispatches inbound envelopes, and
//! drives the render pipeline.
//!
//! One actor per subscription, its mailbox served single-threaded and
//! FIFO — a long-lived per-session loop built on the same
//! cooperative-scheduling shape as a single backend-execution task.

use crate::async_task::{AsyncOutcome, AsyncResolved, AsyncTaskSupervisor};
use crate::differ;
use crate::hooks::run_mount_chain;
use crate::renderer;
use crate::telemetry::SessionMetrics;
use ld_core::error::{ErrorCode, LiveDataError};
use ld_core::route::{RouteHandler, RouteTable};
use ld_core::socket::{
    AsyncProducerFuture, AsyncSpawner, PendingReply, QueuedEvent, Redirect, Socket, Transport,
};
use ld_core::view::View;
use ld_protocol::envelope::{Envelope, Reply};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Why a session terminated.
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    /// The transport disappeared or the client left cleanly.
    Closed,
    /// `socket.redirected()` was set; the session redirects before closing.
    Redirect(Redirect),
    /// No route matched the join topic (or it fell under the reserved
    /// `dv:` namespace). Not a crash — the join reply already told the
    /// client why.
    NoRoute,
    /// A user callback (`mount`/`handle_event`/`handle_info`) errored.
    Crash(String),
}

/// A message delivered to the session's mailbox.
pub enum SessionMessage {
    /// Resolve `topic` to a route and mount its view; `reply` carries the
    /// join outcome.
    Join {
        /// The route topic to resolve.
        topic: String,
        /// Join-time parameters.
        params: Value,
        /// Resolved to `Ok(())` once mounted and READY, or an error.
        reply: oneshot::Sender<Result<(), LiveDataError>>,
    },
    /// A client-originated event.
    ClientEvent {
        /// Event name.
        name: String,
        /// Event payload.
        payload: Value,
        /// Present when the client expects a reply.
        ref_id: Option<String>,
    },
    /// An arbitrary internal message routed to `handle_info`.
    Info(Value),
    /// An `assign_async` producer resolved.
    AsyncResolved(AsyncResolved),
    /// The client left cleanly.
    Leave,
    /// The transport monitor fired.
    TransportDown,
    /// Test-harness barrier: round-trip the mailbox.
    Ping(oneshot::Sender<()>),
    /// Test-harness barrier: block until the in-flight render (if any)
    /// has flushed.
    RenderSync(oneshot::Sender<()>),
    /// Test-harness barrier: drain events flushed by the last render cycle.
    GetEvents(oneshot::Sender<Vec<QueuedEvent>>),
    /// Test-harness barrier: drain the flash delta from the last render cycle.
    GetFlash(oneshot::Sender<BTreeMap<String, Value>>),
}

/// A handle to a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    mailbox: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    /// Send a message without waiting for any response.
    ///
    /// Silently drops the message if the session has already terminated —
    /// mirrors the fire-and-forget semantics a `handle_info` caller expects.
    pub fn tell(&self, message: SessionMessage) {
        let _ = self.mailbox.send(message);
    }

    /// Join the session at `topic`, awaiting the mount outcome.
    pub async fn join(
        &self,
        topic: impl Into<String>,
        params: Value,
    ) -> Result<(), LiveDataError> {
        let (tx, rx) = oneshot::channel();
        self.tell(SessionMessage::Join {
            topic: topic.into(),
            params,
            reply: tx,
        });
        rx.await.map_err(|_| mailbox_closed())?
    }

    /// Dispatch a client event.
    pub fn client_event(&self, name: impl Into<String>, payload: Value, ref_id: Option<String>) {
        self.tell(SessionMessage::ClientEvent {
            name: name.into(),
            payload,
            ref_id,
        });
    }

    /// Test-harness `ping` barrier: resolves once the mailbox has drained
    /// every message enqueued before this call.
    pub async fn ping(&self) -> Result<(), LiveDataError> {
        let (tx, rx) = oneshot::channel();
        self.tell(SessionMessage::Ping(tx));
        rx.await.map_err(|_| mailbox_closed())
    }

    /// Test-harness barrier: drain events flushed by the most recent
    /// render cycle. Returns them exactly once per render cycle.
    pub async fn get_events(&self) -> Result<Vec<QueuedEvent>, LiveDataError> {
        let (tx, rx) = oneshot::channel();
        self.tell(SessionMessage::GetEvents(tx));
        rx.await.map_err(|_| mailbox_closed())
    }

    /// Test-harness barrier: drain the flash delta from the most recent
    /// render cycle.
    pub async fn get_flash(&self) -> Result<BTreeMap<String, Value>, LiveDataError> {
        let (tx, rx) = oneshot::channel();
        self.tell(SessionMessage::GetFlash(tx));
        rx.await.map_err(|_| mailbox_closed())
    }

    /// Test-harness `render-sync` barrier: resolves once any render cycle
    /// already enqueued ahead of this call has flushed.
    pub async fn render_sync(&self) -> Result<(), LiveDataError> {
        let (tx, rx) = oneshot::channel();
        self.tell(SessionMessage::RenderSync(tx));
        rx.await.map_err(|_| mailbox_closed())
    }
}

fn mailbox_closed() -> LiveDataError {
    LiveDataError::new(ErrorCode::TransportClosed, "session mailbox closed")
}

struct SessionState {
    session_id: uuid::Uuid,
    socket: Socket,
    /// The joined topic and its resolved route/view — `None` until a join
    /// has successfully resolved a route, at which point both stay `Some`
    /// for the rest of the session's lifetime (there is no rejoin).
    topic: Option<String>,
    view: Option<Arc<dyn View>>,
    route: Option<Arc<RouteHandler>>,
    routes: Arc<RouteTable>,
    render_count: i64,
    last_rendered: Value,
    supervisor: Arc<AsyncTaskSupervisor>,
    metrics: Arc<SessionMetrics>,
    last_flushed_events: Vec<QueuedEvent>,
    last_flushed_flash: BTreeMap<String, Value>,
    pending_ref_id: Option<String>,
}

/// Bridges `Socket::assign_async` (in `ld-core`, which has no scheduler of
/// its own) to this session's [`AsyncTaskSupervisor`] and mailbox.
struct MailboxAsyncSpawner {
    supervisor: Arc<AsyncTaskSupervisor>,
    async_tx: mpsc::UnboundedSender<AsyncResolved>,
    metrics: Arc<SessionMetrics>,
}

impl AsyncSpawner for MailboxAsyncSpawner {
    fn spawn(&self, keys: &[String], producer: Box<dyn FnOnce() -> AsyncProducerFuture + Send>) {
        self.metrics.record_async_spawned();
        self.supervisor
            .spawn(keys, self.async_tx.clone(), move || producer());
    }
}

/// Spawn a session actor bound to `routes`, with `render_count` starting
/// at −1 and `last_rendered` starting at `∅` (here, `Value::Null`) per
/// the session-actor state described for the data model. Nothing is
/// mounted until the first [`SessionMessage::Join`] resolves a topic
/// against `routes`.
#[must_use]
pub fn spawn(
    routes: Arc<RouteTable>,
    endpoint: impl Into<String>,
    transport: Arc<dyn Transport>,
    metrics: Arc<SessionMetrics>,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let (async_tx, async_rx) = mpsc::unbounded_channel();
    let handle = SessionHandle { mailbox: tx };

    let supervisor = Arc::new(AsyncTaskSupervisor::new());
    let spawner = Arc::new(MailboxAsyncSpawner {
        supervisor: Arc::clone(&supervisor),
        async_tx,
        metrics: Arc::clone(&metrics),
    });
    let socket = Socket::new(endpoint, transport).with_async_spawner(spawner);
    let session_id = uuid::Uuid::new_v4();

    let state = SessionState {
        session_id,
        socket,
        topic: None,
        view: None,
        route: None,
        routes,
        render_count: -1,
        last_rendered: Value::Null,
        supervisor,
        metrics,
        last_flushed_events: Vec::new(),
        last_flushed_flash: BTreeMap::new(),
        pending_ref_id: None,
    };

    tracing::info!(target: "livedata.session", session_id = %session_id, "session starting");
    tokio::spawn(run(state, rx, async_rx));
    handle
}

async fn run(
    mut state: SessionState,
    mut mailbox: mpsc::UnboundedReceiver<SessionMessage>,
    mut async_rx: mpsc::UnboundedReceiver<AsyncResolved>,
) {
    loop {
        let message = tokio::select! {
            biased;
            msg = mailbox.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            Some(resolved) = async_rx.recv() => SessionMessage::AsyncResolved(resolved),
        };

        match handle_message(&mut state, message).await {
            Ok(ControlFlow::Continue) => continue,
            Ok(ControlFlow::Stop(reason)) => {
                shut_down(&mut state, reason);
                break;
            }
            Err(err) => {
                shut_down(&mut state, ShutdownReason::Crash(err.to_string()));
                break;
            }
        }
    }
}

enum ControlFlow {
    Continue,
    Stop(ShutdownReason),
}

async fn handle_message(
    state: &mut SessionState,
    message: SessionMessage,
) -> Result<ControlFlow, LiveDataError> {
    match message {
        SessionMessage::Join {
            topic,
            params,
            reply,
        } => Ok(handle_join(state, topic, &params, reply)),
        SessionMessage::ClientEvent {
            name,
            payload,
            ref_id,
        } => {
            let view = require_view(state)?;
            state.pending_ref_id = ref_id;
            if view.has_handle_event() {
                view.handle_event(&name, &payload, &mut state.socket)?;
            }
            render_cycle(state);
            Ok(after_redirect_check(state))
        }
        SessionMessage::Info(msg) => {
            let view = require_view(state)?;
            if view.has_handle_info() {
                view.handle_info(&msg, &mut state.socket)?;
            }
            render_cycle(state);
            Ok(after_redirect_check(state))
        }
        SessionMessage::AsyncResolved(resolved) => {
            require_view(state)?;
            fold_async_result(state, resolved);
            render_cycle(state);
            Ok(after_redirect_check(state))
        }
        SessionMessage::Leave => Ok(ControlFlow::Stop(ShutdownReason::Closed)),
        SessionMessage::TransportDown => Ok(ControlFlow::Stop(ShutdownReason::Closed)),
        SessionMessage::Ping(reply) => {
            let _ = reply.send(());
            Ok(ControlFlow::Continue)
        }
        SessionMessage::RenderSync(reply) => {
            let _ = reply.send(());
            Ok(ControlFlow::Continue)
        }
        SessionMessage::GetEvents(reply) => {
            let _ = reply.send(std::mem::take(&mut state.last_flushed_events));
            Ok(ControlFlow::Continue)
        }
        SessionMessage::GetFlash(reply) => {
            let _ = reply.send(std::mem::take(&mut state.last_flushed_flash));
            Ok(ControlFlow::Continue)
        }
    }
}

/// `view` is `None` only before a join has resolved a route (or after a
/// join that failed to). Any message that needs a mounted view arriving in
/// that window is a protocol violation on the caller's part.
fn require_view(state: &SessionState) -> Result<Arc<dyn View>, LiveDataError> {
    state.view.clone().ok_or_else(|| {
        LiveDataError::new(
            ErrorCode::SessionNotMounted,
            "message arrived before the session's join resolved a view",
        )
    })
}

fn after_redirect_check(state: &SessionState) -> ControlFlow {
    match state.socket.redirected() {
        Some(redirect) => ControlFlow::Stop(ShutdownReason::Redirect(redirect.clone())),
        None => ControlFlow::Continue,
    }
}

/// `join(params, reply_to, phx_socket)`: resolve `topic` via the route
/// table; if nothing matches, reply `{error, no_route}` over the wire and
/// stop. Otherwise run the mount hook chain plus `view.mount`, reply
/// `{ok, {}}` over the wire (and to the internal oneshot caller), enter
/// READY, then render.
fn handle_join(
    state: &mut SessionState,
    topic: String,
    params: &Value,
    reply: oneshot::Sender<Result<(), LiveDataError>>,
) -> ControlFlow {
    let route = ld_protocol::url::reject_reserved_topic(&topic)
        .map_err(|_| no_route_error(&topic))
        .and_then(|()| state.routes.resolve(&topic));

    let route = match route {
        Ok(route) => route,
        Err(err) => {
            send_reply(state, &topic, "error", serde_json::json!({"reason": "no_route"}));
            let _ = reply.send(Err(clone_error(&err)));
            return ControlFlow::Stop(ShutdownReason::NoRoute);
        }
    };

    state.view = Some(Arc::clone(route.view()));
    state.route = Some(Arc::clone(&route));
    state.topic = Some(topic.clone());

    if let Err(err) = mount(state, &route, params) {
        let _ = reply.send(Err(clone_error(&err)));
        return ControlFlow::Stop(ShutdownReason::Crash(err.to_string()));
    }

    send_reply(state, &topic, "ok", serde_json::json!({}));
    let _ = reply.send(Ok(()));

    render_cycle(state);
    after_redirect_check(state)
}

fn mount(
    state: &mut SessionState,
    route: &Arc<RouteHandler>,
    params: &Value,
) -> Result<(), LiveDataError> {
    let should_mount = run_mount_chain(route, params, &mut state.socket)?;
    if should_mount {
        let view = state.view.clone().expect("set immediately before mount is called");
        if view.has_mount() {
            view.mount(params, &mut state.socket)?;
        }
    }
    Ok(())
}

fn no_route_error(topic: &str) -> LiveDataError {
    LiveDataError::new(ErrorCode::NoRoute, "no route matches join topic").with_context("topic", topic)
}

fn send_reply(state: &SessionState, topic: &str, status: &str, payload: Value) {
    state.socket.transport().send(
        serde_json::to_value(Reply {
            ref_id: None,
            join_ref: None,
            topic: topic.to_string(),
            status: status.to_string(),
            payload,
        })
        .unwrap_or(Value::Null),
    );
}

fn render_cycle(state: &mut SessionState) {
    let start = Instant::now();

    let view = state.view.clone().expect("render_cycle only runs after a successful join");
    let tree = view.render(state.socket.assigns());
    let new_doc = renderer::render(&tree);
    let ops = differ::diff(&state.last_rendered, &new_doc);
    state.last_rendered = new_doc;
    state.render_count += 1;

    let flash_delta = state.socket.get_flash();
    state.last_flushed_flash = flash_delta.clone();
    let flash_value = if flash_delta.is_empty() {
        None
    } else {
        serde_json::to_value(&flash_delta).ok()
    };

    state
        .metrics
        .record_render(ops.len() as u64, start.elapsed().as_micros() as u64);

    state.socket.transport().send(
        serde_json::to_value(Envelope::Patch {
            ops,
            render_count: state.render_count,
            flash: flash_value,
        })
        .unwrap_or(Value::Null),
    );

    let events = state.socket.get_push_events().to_vec();
    for event in &events {
        state.socket.transport().send(
            serde_json::to_value(Envelope::PushEvent {
                name: event.name.clone(),
                payload: event.payload.clone(),
            })
            .unwrap_or(Value::Null),
        );
    }
    state.last_flushed_events = events;

    // A redirect set during this cycle (by `mount`/`handle_event`/
    // `handle_info`) folds into a pending reply rather than going out as
    // its own push, if one is pending this cycle; otherwise it's emitted
    // standalone. Either way this is a per-cycle decision — the render
    // cycle is the only place both facts (redirect just set, reply
    // pending) are known together.
    let redirect = state.socket.redirected().cloned();
    let pending = state.socket.get_reply().cloned();
    let topic = state.topic.clone().unwrap_or_default();

    match (pending, redirect) {
        (Some(PendingReply { status, payload: _ }), Some(redirect)) => {
            let _ = status;
            state.socket.transport().send(
                serde_json::to_value(Reply {
                    ref_id: state.pending_ref_id.take(),
                    join_ref: None,
                    topic,
                    status: "ok".to_string(),
                    payload: serde_json::json!({ "redirect": redirect_to_value(&redirect) }),
                })
                .unwrap_or(Value::Null),
            );
        }
        (Some(PendingReply { status, payload }), None) => {
            state.socket.transport().send(
                serde_json::to_value(Reply {
                    ref_id: state.pending_ref_id.take(),
                    join_ref: None,
                    topic,
                    status: status.to_string(),
                    payload,
                })
                .unwrap_or(Value::Null),
            );
        }
        (None, Some(redirect)) => {
            let envelope = match redirect {
                Redirect::Local(to) => Envelope::Redirect {
                    to: Some(to),
                    external: None,
                },
                Redirect::External(url) => Envelope::Redirect {
                    to: None,
                    external: Some(url),
                },
            };
            state
                .socket
                .transport()
                .send(serde_json::to_value(envelope).unwrap_or(Value::Null));
        }
        (None, None) => {}
    }

    state.pending_ref_id = None;
    state.socket.reset_scratch();
    state.socket.reset_changed();
}

fn redirect_to_value(redirect: &Redirect) -> Value {
    match redirect {
        Redirect::Local(to) => serde_json::json!({ "to": to }),
        Redirect::External(url) => serde_json::json!({ "external": url }),
    }
}

fn fold_async_result(state: &mut SessionState, resolved: AsyncResolved) {
    if !state.supervisor.is_current(&resolved) {
        return;
    }
    match resolved.outcome {
        Some(AsyncOutcome::Ok(mut results)) => {
            for key in &resolved.keys {
                let value = results.remove(key).unwrap_or(Value::Null);
                let doc = serde_json::json!({
                    "loading": false, "ok": true, "failed": null, "result": value,
                });
                let _ = state.socket.force_assign(key, doc);
            }
            state.metrics.record_async_resolved(false);
        }
        Some(AsyncOutcome::Failed(error)) => {
            for key in &resolved.keys {
                let doc = serde_json::json!({
                    "loading": false, "ok": false, "failed": error.clone(), "result": error.clone(),
                });
                let _ = state.socket.force_assign(key, doc);
            }
            state.metrics.record_async_resolved(true);
        }
        None => {}
    }
}

fn shut_down(state: &mut SessionState, reason: ShutdownReason) {
    tracing::info!(
        target: "livedata.session",
        session_id = %state.session_id,
        ?reason,
        "session stopping"
    );
    state.socket.transport().close();
}

fn clone_error(err: &LiveDataError) -> LiveDataError {
    LiveDataError::new(err.code, err.message.clone())
}
