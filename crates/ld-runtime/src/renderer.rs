// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expand a [`RenderTree`] into a plain JSON document, recursively
//! rendering sub-component references and dropping null-valued keys and
//! list entries along the way.
//!
//! The output never contains a [`ComponentRef`](ld_core::render_tree::ComponentRef) —
//! every occurrence has been replaced by the result of rendering that
//! component's own assigns.

use ld_core::render_tree::RenderTree;
use serde_json::Value;

/// Expand `tree` to a plain JSON value.
#[must_use]
pub fn render(tree: &RenderTree) -> Value {
    match tree {
        RenderTree::Value(v) => strip_nulls(v),
        RenderTree::Map(fields) => {
            let mut obj = serde_json::Map::new();
            for (key, field) in fields {
                let rendered = render(field);
                if !rendered.is_null() {
                    obj.insert(key.clone(), rendered);
                }
            }
            Value::Object(obj)
        }
        RenderTree::List(items) => {
            let rendered: Vec<Value> = items
                .iter()
                .map(render)
                .filter(|v| !v.is_null())
                .collect();
            Value::Array(rendered)
        }
        RenderTree::Component(component) => {
            let inner = component.module.render(&component.assigns);
            render(&inner)
        }
    }
}

/// Recursively drop null-valued object keys and null list entries from an
/// already-plain JSON value (the `RenderTree::Value` leaf case — a
/// serialized struct may itself contain nulls the walk above wouldn't
/// otherwise see).
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                if v.is_null() {
                    continue;
                }
                obj.insert(k.clone(), strip_nulls(v));
            }
            Value::Object(obj)
        }
        Value::Array(items) => {
            Value::Array(items.iter().filter(|v| !v.is_null()).map(strip_nulls).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ld_core::view::View;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn drops_null_valued_keys() {
        let tree = RenderTree::Value(json!({"a": 1, "b": null}));
        assert_eq!(render(&tree), json!({"a": 1}));
    }

    #[test]
    fn drops_null_list_entries() {
        let tree = RenderTree::List(vec![
            RenderTree::Value(Value::from(1)),
            RenderTree::Value(Value::Null),
            RenderTree::Value(Value::from(2)),
        ]);
        assert_eq!(render(&tree), json!([1, 2]));
    }

    #[test]
    fn map_entry_rendering_to_null_drops_the_key() {
        let tree = RenderTree::object([
            ("present", RenderTree::Value(Value::from(1))),
            ("absent", RenderTree::Value(Value::Null)),
        ]);
        assert_eq!(render(&tree), json!({"present": 1}));
    }

    struct Badge;
    impl View for Badge {
        fn render(&self, assigns: &BTreeMap<String, Value>) -> RenderTree {
            RenderTree::object([(
                "label",
                RenderTree::Value(assigns.get("label").cloned().unwrap_or(Value::Null)),
            )])
        }
    }

    #[test]
    fn expands_sub_component_references_recursively() {
        let mut assigns = BTreeMap::new();
        assigns.insert("label".to_string(), Value::from("new"));

        let tree = RenderTree::object([
            ("title", RenderTree::Value(Value::from("Inbox"))),
            ("badge", RenderTree::component("badge-1", Arc::new(Badge), assigns)),
        ]);

        assert_eq!(
            render(&tree),
            json!({"title": "Inbox", "badge": {"label": "new"}})
        );
    }
}
