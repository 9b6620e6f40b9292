// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`View`] contract: the polymorphic descriptor every mounted view
//! implements.
//!
//! Every callback but `render` is optional. A view that skips `mount`
//! starts with an empty assign map; one that skips `handle_event` simply
//! never receives client events bound to it; one that skips `handle_info`
//! drops any message sent to its session. The session actor checks
//! `has_mount`/`has_handle_event`/`has_handle_info` before invoking the
//! corresponding callback, mirroring the "exported?" capability check the
//! design notes call for rather than relying on every view to hand-roll a
//! no-op body.

use crate::error::LiveDataError;
use crate::render_tree::RenderTree;
use crate::socket::Socket;
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of a `handle_event` callback.
///
/// A view signals a reply by calling [`Socket::put_reply`] directly during
/// the callback; the return value only communicates whether the callback
/// ran to completion. The session actor reads the reply back off the
/// socket's scratch area, so no separate reply-carrying variant is needed
/// here.
pub type HandleEventResult = Result<(), LiveDataError>;

/// A mounted view.
///
/// Implementors are shared across concurrently-running sessions (the
/// session actor holds an `Arc<dyn View>`), so `render` in particular must
/// not assume exclusive access to any state beyond what the socket passes
/// in.
pub trait View: Send + Sync {
    /// Called once, before the first render, to set up initial assigns.
    ///
    /// `params` are the join-time parameters the client supplied. The
    /// default implementation leaves the socket untouched.
    fn mount(&self, _params: &Value, _socket: &mut Socket) -> Result<(), LiveDataError> {
        Ok(())
    }

    /// Whether this view overrides `mount`. The session actor only invokes
    /// `mount` when this returns `true`, so a view that never overrides it
    /// pays no per-join dispatch cost.
    fn has_mount(&self) -> bool {
        false
    }

    /// Called for each client-originated event bound to this view.
    fn handle_event(
        &self,
        _name: &str,
        _payload: &Value,
        _socket: &mut Socket,
    ) -> HandleEventResult {
        Ok(())
    }

    /// Whether this view overrides `handle_event`.
    fn has_handle_event(&self) -> bool {
        false
    }

    /// Called for each internal message delivered to this session (for
    /// example, the completion of an `assign_async` producer that a view
    /// chooses to also route through its own mailbox).
    fn handle_info(&self, _message: &Value, _socket: &mut Socket) -> Result<(), LiveDataError> {
        Ok(())
    }

    /// Whether this view overrides `handle_info`.
    fn has_handle_info(&self) -> bool {
        false
    }

    /// Render a set of assigns to a tree. The only callback every view must
    /// implement. Takes a plain assign map (rather than the socket) so the
    /// same method serves both top-level render cycles and sub-component
    /// expansion, which only ever has the component's own assigns in hand.
    fn render(&self, assigns: &BTreeMap<String, Value>) -> RenderTree;
}
