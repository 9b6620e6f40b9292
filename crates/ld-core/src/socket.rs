// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-session [`Socket`]: assigns, change hints, and the per-render-cycle
//! scratch area (queued push-events, pending reply, flash delta).

use crate::error::{ErrorCode, LiveDataError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Collaborator interface the session actor uses to deliver outbound
/// messages and to signal the transport that the socket is closing.
///
/// The transport itself (sockets, multiplexing, reconnect) is out of scope
/// for this crate; only the interface the core consumes is specified here.
pub trait Transport: Send + Sync {
    /// Push one already-framed outbound message (see `ld-protocol::Envelope`)
    /// to the client, serialized to its wire JSON shape.
    fn send(&self, message: Value);

    /// Notify the transport that this session is closing (redirect or
    /// explicit shutdown) so it can tear down the underlying connection.
    fn close(&self);
}

/// An `assign_async` producer, boxed so `Socket` (which has no scheduler of
/// its own) can hand it to whatever spawns tasks.
pub type AsyncProducerFuture =
    Pin<Box<dyn Future<Output = Result<serde_json::Map<String, Value>, Value>> + Send>>;

/// Collaborator interface that actually spawns and supervises
/// `assign_async` producers. Kept separate from [`Transport`] because the
/// scheduling/cancellation machinery (task spawning, generation counters)
/// belongs to the runtime crate, not this data-model crate.
pub trait AsyncSpawner: Send + Sync {
    /// Spawn `producer` for `keys`, superseding any producer already
    /// running for that exact key set.
    fn spawn(&self, keys: &[String], producer: Box<dyn FnOnce() -> AsyncProducerFuture + Send>);
}

/// A validated assign key: a symbol/atom-like identifier.
///
/// `assign` rejects non-identifier keys. Valid keys start with an ASCII
/// letter or underscore and contain only ASCII alphanumerics and
/// underscores.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssignKey(String);

impl AssignKey {
    /// Validate and wrap a key.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidAssignKey`] if `key` is empty, starts
    /// with a digit, or contains characters other than ASCII alphanumerics
    /// and underscores.
    pub fn new(key: impl Into<String>) -> Result<Self, LiveDataError> {
        let key = key.into();
        let mut chars = key.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if !valid {
            return Err(
                LiveDataError::new(ErrorCode::InvalidAssignKey, "assign key must be a symbol")
                    .with_context("key", &key),
            );
        }
        Ok(Self(key))
    }

    /// Borrow the key as a plain string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssignKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A queued push-event: `push_event(socket, name, payload)`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    /// Opaque event name the client dispatches on.
    pub name: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
}

/// A pending reply to the inbound event currently being handled.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReply {
    /// `"ok"` or `"error"`.
    pub status: &'static str,
    /// Reply payload.
    pub payload: Value,
}

/// Per-render-cycle scratch area, reset to empty after every flush.
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    events: Vec<QueuedEvent>,
    reply: Option<PendingReply>,
    flash_delta: BTreeMap<String, Value>,
}

impl Scratch {
    fn reset(&mut self) {
        self.events.clear();
        self.reply = None;
        self.flash_delta.clear();
    }
}

/// A one-shot redirect instruction: local path or external URL.
#[derive(Debug, Clone, PartialEq)]
pub enum Redirect {
    /// Redirect to a local path (must start with a single `/`).
    Local(String),
    /// Redirect to an external URL (scheme must be allow-listed, or
    /// explicitly tagged as `External`).
    External(String),
}

/// The per-session socket: assigns, change hints, scratch, and redirect.
///
/// Ownership: the session actor exclusively owns its `Socket`; nothing
/// outside the actor mutates it.
pub struct Socket {
    endpoint: String,
    transport: Arc<dyn Transport>,
    redirect: Option<Redirect>,
    assigns: BTreeMap<String, Value>,
    changed: BTreeMap<String, Value>,
    scratch: Scratch,
    async_spawner: Option<Arc<dyn AsyncSpawner>>,
}

impl Socket {
    /// Create a fresh socket bound to the given opaque endpoint descriptor
    /// and transport handle.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
            redirect: None,
            assigns: BTreeMap::new(),
            changed: BTreeMap::new(),
            scratch: Scratch::default(),
            async_spawner: None,
        }
    }

    /// Attach the collaborator that actually spawns `assign_async`
    /// producers. Builder-style so `session::spawn` can wire it in at
    /// construction time.
    #[must_use]
    pub fn with_async_spawner(mut self, spawner: Arc<dyn AsyncSpawner>) -> Self {
        self.async_spawner = Some(spawner);
        self
    }

    /// The opaque endpoint descriptor this socket was created with.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The transport handle for outbound sends.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    // -- assigns -----------------------------------------------------------

    /// Read an assign by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.assigns.get(key)
    }

    /// All current assigns, as a plain map (used by the Renderer).
    #[must_use]
    pub fn assigns(&self) -> &BTreeMap<String, Value> {
        &self.assigns
    }

    /// Keys changed since the last render, mapped to their change hint:
    /// the previous value if it was a map (enabling nested diff hints),
    /// otherwise `true`.
    #[must_use]
    pub fn changed(&self) -> &BTreeMap<String, Value> {
        &self.changed
    }

    /// `assign(socket, key, value)`.
    ///
    /// No-ops (returns `self` unchanged) if `assigns[key]` already
    /// structurally equals `value`. Otherwise assigns the new value and
    /// records a change hint.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidAssignKey`] if `key` is not a valid
    /// identifier.
    pub fn assign(&mut self, key: &str, value: impl Into<Value>) -> Result<(), LiveDataError> {
        let key = AssignKey::new(key)?;
        self.assign_checked(key, value.into(), false);
        Ok(())
    }

    /// `force_assign(socket, key, value)` — skips the equality check.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidAssignKey`] if `key` is not a valid
    /// identifier.
    pub fn force_assign(&mut self, key: &str, value: impl Into<Value>) -> Result<(), LiveDataError> {
        let key = AssignKey::new(key)?;
        self.assign_checked(key, value.into(), true);
        Ok(())
    }

    /// `assign(socket, map_or_kvlist)` — fold the scalar form over entries.
    ///
    /// # Errors
    ///
    /// Returns the first [`ErrorCode::InvalidAssignKey`] encountered.
    pub fn assign_many<I, K, V>(&mut self, entries: I) -> Result<(), LiveDataError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (k, v) in entries {
            self.assign(k.as_ref(), v.into())?;
        }
        Ok(())
    }

    /// `assign_new(socket, key, fn)` — assign only if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidAssignKey`] if `key` is not a valid
    /// identifier.
    pub fn assign_new(
        &mut self,
        key: &str,
        compute: impl FnOnce() -> Value,
    ) -> Result<(), LiveDataError> {
        if self.assigns.contains_key(key) {
            // Still validate the key so a bad identifier fails loudly even
            // when it happens to already be present — matches `assign`'s
            // synchronous-validation contract.
            AssignKey::new(key)?;
            return Ok(());
        }
        let key = AssignKey::new(key)?;
        let value = compute();
        self.assign_checked(key, value, true);
        Ok(())
    }

    fn assign_checked(&mut self, key: AssignKey, value: Value, force: bool) {
        let key = key.as_str().to_string();
        if !force {
            if let Some(existing) = self.assigns.get(&key) {
                if *existing == value {
                    return;
                }
            }
        }
        let hint = match self.assigns.get(&key) {
            Some(Value::Object(_)) => self.assigns[&key].clone(),
            _ => Value::Bool(true),
        };
        self.assigns.insert(key.clone(), value);
        self.changed.insert(key, hint);
    }

    /// `assign_async(socket, keys, producer)`.
    ///
    /// Immediately force-assigns a `Loading` [`crate::async_result::AsyncResult`]
    /// document to every key in `keys`, then hands `producer` to the
    /// attached [`AsyncSpawner`] (if any) to run off the actor's mailbox.
    /// Calling this again for the same key set supersedes the prior
    /// producer; its eventual result is discarded on arrival.
    ///
    /// A socket with no attached spawner (e.g. one built directly in a
    /// unit test) still records the `Loading` state but runs nothing —
    /// there is no scheduler to hand the producer to.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidAssignKey`] if any key is not a valid
    /// identifier.
    pub fn assign_async(
        &mut self,
        keys: &[&str],
        producer: impl FnOnce() -> AsyncProducerFuture + Send + 'static,
    ) -> Result<(), LiveDataError> {
        let mut validated = Vec::with_capacity(keys.len());
        for key in keys {
            validated.push(AssignKey::new(*key)?);
        }
        for key in &validated {
            let loading = serde_json::json!({
                "loading": true, "ok": false, "failed": null, "result": null,
            });
            self.assign_checked(key.clone(), loading, true);
        }
        if let Some(spawner) = &self.async_spawner {
            let keys_owned: Vec<String> = validated.iter().map(|k| k.as_str().to_string()).collect();
            spawner.spawn(&keys_owned, Box::new(producer));
        }
        Ok(())
    }

    // -- redirect ------------------------------------------------------------

    /// Set a one-shot redirect. Re-setting an already-set redirect is an
    /// error — a socket may only redirect once per lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidRedirectUrl`] if a redirect has already
    /// been set.
    pub fn put_redirect(&mut self, redirect: Redirect) -> Result<(), LiveDataError> {
        if self.redirect.is_some() {
            return Err(LiveDataError::new(
                ErrorCode::InvalidRedirectUrl,
                "socket has already redirected",
            ));
        }
        self.redirect = Some(redirect);
        Ok(())
    }

    /// The pending redirect, if any has been set this session.
    #[must_use]
    pub fn redirected(&self) -> Option<&Redirect> {
        self.redirect.as_ref()
    }

    // -- push events / reply / flash -----------------------------------------

    /// `push_event(socket, name, payload)`.
    pub fn push_event(&mut self, name: impl Into<String>, payload: Value) {
        self.scratch.events.push(QueuedEvent {
            name: name.into(),
            payload,
        });
    }

    /// `put_reply(socket, payload)` — overwrites any prior reply this cycle.
    pub fn put_reply(&mut self, status: &'static str, payload: Value) {
        self.scratch.reply = Some(PendingReply { status, payload });
    }

    /// `put_flash(socket, key, msg)` — writes to both the `:flash` assign
    /// and the scratch flash delta.
    pub fn put_flash(&mut self, key: impl Into<String>, msg: impl Into<Value>) {
        let key = key.into();
        let msg = msg.into();
        self.scratch.flash_delta.insert(key.clone(), msg.clone());
        self.merge_flash_assign(key, Some(msg));
    }

    /// `clear_flash(socket)` — clears every flash key.
    pub fn clear_flash(&mut self) {
        let keys: Vec<String> = self.flash_map().keys().cloned().collect();
        for key in keys {
            self.clear_flash_key(&key);
        }
    }

    /// `clear_flash(socket, key)` — clears a single flash key.
    pub fn clear_flash_key(&mut self, key: &str) {
        self.scratch.flash_delta.remove(key);
        self.merge_flash_assign(key.to_string(), None);
    }

    fn merge_flash_assign(&mut self, key: String, value: Option<Value>) {
        let mut flash = self.flash_map();
        match value {
            Some(v) => {
                flash.insert(key, v);
            }
            None => {
                flash.remove(&key);
            }
        }
        // `force_assign` because flash may legitimately toggle back to an
        // equal value across two put/clear calls in the same cycle.
        let _ = self.force_assign("flash", Value::Object(flash.into_iter().collect()));
    }

    fn flash_map(&self) -> serde_json::Map<String, Value> {
        match self.assigns.get("flash") {
            Some(Value::Object(m)) => m.clone(),
            _ => serde_json::Map::new(),
        }
    }

    /// `get_flash(socket)` — the flash delta written so far this cycle.
    #[must_use]
    pub fn get_flash(&self) -> BTreeMap<String, Value> {
        self.scratch.flash_delta.clone()
    }

    /// `get_push_events(socket)` — events queued so far this cycle, in
    /// insertion order.
    #[must_use]
    pub fn get_push_events(&self) -> &[QueuedEvent] {
        &self.scratch.events
    }

    /// `get_reply(socket)` — the pending reply, if any.
    #[must_use]
    pub fn get_reply(&self) -> Option<&PendingReply> {
        self.scratch.reply.as_ref()
    }

    /// Reset the scratch area. Called after every render-cycle flush.
    /// Assigns and the `flash` assign itself persist.
    pub fn reset_scratch(&mut self) {
        self.scratch.reset();
    }

    /// Clear the per-render `changed` hints. Called after every render.
    pub fn reset_changed(&mut self) {
        self.changed.clear();
    }
}
