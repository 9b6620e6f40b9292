// SPDX-License-Identifier: MIT OR Apache-2.0
//! Synchronous barriers test drivers use to observe a session between
//! render cycles without racing the actor's mailbox.
//!
//! These exist because the actor's effects (sends to the transport) are
//! asynchronous from the caller's perspective — a test that calls
//! `handle.client_event(...)` and immediately inspects the transport mock
//! would be racing the actor. Routing a barrier message through the same
//! mailbox guarantees everything enqueued ahead of it has been processed.

use crate::session::SessionHandle;
use ld_core::error::LiveDataError;
use ld_core::socket::QueuedEvent;
use serde_json::Value;
use std::collections::BTreeMap;

/// A thin wrapper around a [`SessionHandle`] exposing the four barrier
/// operations test drivers need.
pub struct TestHarness {
    handle: SessionHandle,
}

impl TestHarness {
    /// Wrap a running session handle.
    #[must_use]
    pub fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }

    /// Round-trip the mailbox: resolves once every message enqueued ahead
    /// of this call has been processed.
    pub async fn ping(&self) -> Result<(), LiveDataError> {
        self.handle.ping().await
    }

    /// Resolves once any render cycle already enqueued has flushed.
    pub async fn render_sync(&self) -> Result<(), LiveDataError> {
        self.handle.render_sync().await
    }

    /// Drain the push-events flushed by the most recent render cycle.
    /// Returns them exactly once; a second call before the next render
    /// cycle returns an empty list.
    pub async fn get_events(&self) -> Result<Vec<QueuedEvent>, LiveDataError> {
        self.handle.get_events().await
    }

    /// Drain the flash delta written during the most recent render cycle.
    /// Returns it exactly once.
    pub async fn get_flash(&self) -> Result<BTreeMap<String, Value>, LiveDataError> {
        self.handle.get_flash().await
    }
}
