// SPDX-License-Identifier: MIT OR Apache-2.0
//! Diff two rendered documents and compress the result to the wire shape.
//!
//! Both documents are wrapped as `{"r": doc}` before diffing so that a
//! wholesale replacement of the root (e.g. the very first render, diffed
//! against `null`) still produces a patch rooted at `/r` rather than the
//! document root `""`, which `json-patch` does not accept as an add/replace
//! target.

use ld_protocol::serializer;
use serde_json::{json, Value};

/// Diff `old` against `new`, returning the wire-compressed patch.
///
/// An unchanged document produces an empty patch.
#[must_use]
pub fn diff(old: &Value, new: &Value) -> Vec<Value> {
    let wrapped_old = json!({ "r": old });
    let wrapped_new = json!({ "r": new });
    let patch = json_patch::diff(&wrapped_old, &wrapped_new);
    serializer::compress(&patch)
}
