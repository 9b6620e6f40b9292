// SPDX-License-Identifier: MIT OR Apache-2.0
//! The render tree IR a [`crate::view::View::render`] produces.
//!
//! This is richer than a plain `serde_json::Value` because it can embed
//! [`ComponentRef`] nodes — sub-component references of shape
//! `{id, module, assigns}` — which the Renderer expands before the tree
//! reaches the Differ. No `ComponentRef` may survive expansion.

use crate::view::View;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A sub-component reference: `{id, module, assigns}`.
///
/// The Renderer replaces each occurrence with the result of invoking
/// `module.render(assigns)`, recursively.
#[derive(Clone)]
pub struct ComponentRef {
    /// Stable identifier for this component instance (used for future
    /// per-component diff stability; not required by the core today).
    pub id: String,
    /// The sub-component's view module.
    pub module: Arc<dyn View>,
    /// Assigns to render the sub-component with.
    pub assigns: BTreeMap<String, Value>,
}

/// The tree a view's `render` returns, before sub-component expansion.
#[derive(Clone)]
pub enum RenderTree {
    /// A plain JSON scalar/array/object with no embedded components.
    Value(Value),
    /// A map whose values may themselves contain component references.
    Map(BTreeMap<String, RenderTree>),
    /// A list whose elements may themselves contain component references.
    List(Vec<RenderTree>),
    /// A sub-component reference, expanded by the Renderer.
    Component(ComponentRef),
}

impl RenderTree {
    /// Build a `RenderTree::Map` from an iterator of key/tree pairs.
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, RenderTree)>,
        K: Into<String>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a `RenderTree::List`.
    #[must_use]
    pub fn list(items: Vec<RenderTree>) -> Self {
        Self::List(items)
    }

    /// Build a component reference node.
    #[must_use]
    pub fn component(
        id: impl Into<String>,
        module: Arc<dyn View>,
        assigns: BTreeMap<String, Value>,
    ) -> Self {
        Self::Component(ComponentRef {
            id: id.into(),
            module,
            assigns,
        })
    }

    /// Flatten a serializable struct to its field map: serialize, then
    /// wrap the resulting JSON value.
    pub fn from_serializable<T: Serialize>(value: &T) -> Self {
        Self::Value(serde_json::to_value(value).unwrap_or(Value::Null))
    }
}

impl From<Value> for RenderTree {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}
