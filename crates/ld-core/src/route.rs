// SPDX-License-Identifier: MIT OR Apache-2.0
//! Route resolution: mapping a join topic to a view module plus the
//! session-wide options that govern it.

use crate::error::{ErrorCode, LiveDataError};
use crate::view::View;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Serde helper for `Option<Duration>` as optional milliseconds, used by
/// [`SessionOptions::hibernate_after`].
mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match val {
            Some(d) => ser.serialize_some(&(d.as_millis() as u64)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        let ms: Option<u64> = Option::deserialize(de)?;
        Ok(ms.map(Duration::from_millis))
    }
}

/// Outcome of a lifecycle hook: continue mounting, or halt the join
/// (typically pairing a halt with a redirect or an error reply).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Proceed to the next hook, or to `view.mount` if this was the last one.
    Continue,
    /// Abort the join here; no further hooks or `view.mount` run.
    Halt,
}

/// An `on_mount` lifecycle hook, run in registration order before
/// `view.mount`. The first hook to return `Halt` stops the chain.
pub trait MountHook: Send + Sync {
    /// Inspect or mutate the socket ahead of `view.mount`.
    fn call(
        &self,
        params: &serde_json::Value,
        socket: &mut crate::socket::Socket,
    ) -> Result<HookOutcome, LiveDataError>;
}

/// Per-session tuning, set at route-registration time and inherited by
/// every session mounted through that route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Arbitrary options passed through to `view.mount` as part of the
    /// join context (distinct from join params, which come from the
    /// client).
    #[serde(default)]
    pub view_opts: serde_json::Value,
    /// How long an idle session may hibernate before the runtime tears it
    /// down. `None` disables hibernation entirely for this route.
    #[serde(default, with = "option_duration_millis")]
    pub hibernate_after: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            view_opts: serde_json::Value::Null,
            hibernate_after: Some(Duration::from_secs(15)),
        }
    }
}

/// A resolved route: the view module bound to a topic, its mount hooks,
/// and its session options.
pub struct RouteHandler {
    topic: String,
    view: Arc<dyn View>,
    hooks: Vec<Arc<dyn MountHook>>,
    options: SessionOptions,
}

impl RouteHandler {
    /// Register a route for `topic`, with default session options and no
    /// mount hooks.
    #[must_use]
    pub fn new(topic: impl Into<String>, view: Arc<dyn View>) -> Self {
        Self {
            topic: topic.into(),
            view,
            hooks: Vec::new(),
            options: SessionOptions::default(),
        }
    }

    /// Append a mount hook, run after any hooks already registered.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn MountHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Override the default session options.
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// The topic this route was registered under.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The bound view module.
    #[must_use]
    pub fn view(&self) -> &Arc<dyn View> {
        &self.view
    }

    /// The mount hook chain, in run order.
    #[must_use]
    pub fn hooks(&self) -> &[Arc<dyn MountHook>] {
        &self.hooks
    }

    /// The session options for this route.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

/// Topics under this prefix are reserved for the runtime's own
/// test-harness barriers (component 9) and may not be registered by user
/// routes.
const RESERVED_PREFIX: &str = "dv:";

/// Whether `topic` falls under the reserved `dv:` namespace.
///
/// Shared by [`RouteTable::register`] and `ld-protocol`'s inbound topic
/// validation so the reserved-namespace rule has exactly one definition;
/// `ld-protocol` depends on `ld-core`, not the other way around, so this is
/// where the shared predicate has to live.
#[must_use]
pub fn is_reserved_topic(topic: &str) -> bool {
    topic.starts_with(RESERVED_PREFIX)
}

/// A topic-keyed route table.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Arc<RouteHandler>>,
}

impl RouteTable {
    /// An empty route table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ReservedNamespace`] if `route.topic()` starts
    /// with the reserved `dv:` prefix.
    pub fn register(&mut self, route: RouteHandler) -> Result<(), LiveDataError> {
        if is_reserved_topic(route.topic()) {
            return Err(LiveDataError::new(
                ErrorCode::ReservedNamespace,
                "route topics may not use the reserved dv: namespace",
            )
            .with_context("topic", route.topic()));
        }
        self.routes.push(Arc::new(route));
        Ok(())
    }

    /// Resolve a join topic to its route.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NoRoute`] if no registered route matches.
    pub fn resolve(&self, topic: &str) -> Result<Arc<RouteHandler>, LiveDataError> {
        self.routes
            .iter()
            .find(|r| r.topic() == topic)
            .cloned()
            .ok_or_else(|| {
                LiveDataError::new(ErrorCode::NoRoute, "no route matches join topic")
                    .with_context("topic", topic)
            })
    }
}
