// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tagged `AsyncResult` state and the `async_result` view-side helper.
//!
//! Modeled as a tagged variant (`Loading | Ok(v) | Failed(e)`) per the
//! design notes, rather than ambient struct fields — dispatch is a totality
//! check over the three variants instead of three independent booleans.

use crate::error::{ErrorCode, LiveDataError};
use serde::Serialize;
use serde_json::Value;

/// Deferred value held as an assign while an `assign_async` producer runs.
///
/// Invariant: exactly one of loading/ok/failed is true at any time — this
/// is structural here, not merely conventional, since the three states are
/// separate enum variants.
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncResult<T> {
    /// The producer is still running.
    Loading,
    /// The producer completed successfully.
    Ok(T),
    /// The producer failed; carries the error value.
    Failed(Value),
}

impl<T> AsyncResult<T> {
    /// `true` while the producer is still running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// `true` once the producer has completed successfully.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// `true` once the producer has failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl<T: Serialize> AsyncResult<T> {
    /// Render the `{loading, failed, ok, result}` document shape, for
    /// assigns that serialize directly into the document without going
    /// through `async_result`.
    #[must_use]
    pub fn to_document(&self) -> Value {
        match self {
            Self::Loading => serde_json::json!({
                "loading": true, "failed": null, "ok": false, "result": null,
            }),
            Self::Ok(v) => serde_json::json!({
                "loading": false, "failed": null, "ok": true,
                "result": serde_json::to_value(v).unwrap_or(Value::Null),
            }),
            Self::Failed(e) => serde_json::json!({
                "loading": false, "failed": e, "ok": false, "result": e,
            }),
        }
    }
}

/// Clauses passed to [`async_result`], keyed `ok` / `loading` / `failed`.
///
/// Built with the typed `.ok()`/`.loading()`/`.failed()` methods for normal
/// use; [`AsyncClauses::validate_keys`] additionally checks a raw key list
/// against the allowed set, so an unknown clause key is a fatal argument
/// error for callers that assemble clauses dynamically.
pub struct AsyncClauses<'a, T> {
    ok: Option<Box<dyn Fn(&T) -> Value + 'a>>,
    loading: Option<Box<dyn Fn() -> Value + 'a>>,
    failed: Option<Box<dyn Fn(&Value) -> Value + 'a>>,
}

const ALLOWED_CLAUSE_KEYS: [&str; 3] = ["ok", "loading", "failed"];

impl<'a, T> Default for AsyncClauses<'a, T> {
    fn default() -> Self {
        Self {
            ok: None,
            loading: None,
            failed: None,
        }
    }
}

impl<'a, T> AsyncClauses<'a, T> {
    /// An empty clause set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `ok` clause.
    #[must_use]
    pub fn ok(mut self, f: impl Fn(&T) -> Value + 'a) -> Self {
        self.ok = Some(Box::new(f));
        self
    }

    /// Register the `loading` clause.
    #[must_use]
    pub fn loading(mut self, f: impl Fn() -> Value + 'a) -> Self {
        self.loading = Some(Box::new(f));
        self
    }

    /// Register the `failed` clause.
    #[must_use]
    pub fn failed(mut self, f: impl Fn(&Value) -> Value + 'a) -> Self {
        self.failed = Some(Box::new(f));
        self
    }

    /// Validate a raw list of clause keys (e.g. from a dynamically built
    /// clause map) against the allowed set `{ok, loading, failed}`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidAsyncResultClause`] on the first
    /// unrecognized key.
    pub fn validate_keys(keys: &[&str]) -> Result<(), LiveDataError> {
        for key in keys {
            if !ALLOWED_CLAUSE_KEYS.contains(key) {
                return Err(LiveDataError::new(
                    ErrorCode::InvalidAsyncResultClause,
                    "unknown async_result clause key",
                )
                .with_context("key", *key));
            }
        }
        Ok(())
    }
}

/// `async_result(asyncAssign, clauses)` — select and invoke the clause
/// matching the current state. A missing clause for the current state
/// renders as `Value::Null`.
pub fn async_result<T>(state: &AsyncResult<T>, clauses: &AsyncClauses<'_, T>) -> Value {
    match state {
        AsyncResult::Loading => clauses.loading.as_ref().map_or(Value::Null, |f| f()),
        AsyncResult::Ok(v) => clauses.ok.as_ref().map_or(Value::Null, |f| f(v)),
        AsyncResult::Failed(e) => clauses.failed.as_ref().map_or(Value::Null, |f| f(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_state_flag_is_true() {
        let loading: AsyncResult<i64> = AsyncResult::Loading;
        let ok: AsyncResult<i64> = AsyncResult::Ok(3);
        let failed: AsyncResult<i64> = AsyncResult::Failed(Value::from("boom"));

        assert!(loading.is_loading() && !loading.is_ok() && !loading.is_failed());
        assert!(!ok.is_loading() && ok.is_ok() && !ok.is_failed());
        assert!(!failed.is_loading() && !failed.is_ok() && failed.is_failed());
    }

    #[test]
    fn to_document_matches_wire_shape() {
        let ok: AsyncResult<i64> = AsyncResult::Ok(3);
        let doc = ok.to_document();
        assert_eq!(doc["ok"], Value::Bool(true));
        assert_eq!(doc["result"], Value::from(3));
        assert_eq!(doc["loading"], Value::Bool(false));
        assert_eq!(doc["failed"], Value::Null);
    }

    #[test]
    fn async_result_dispatches_loading_clause() {
        let state: AsyncResult<i64> = AsyncResult::Loading;
        let clauses = AsyncClauses::new()
            .loading(|| Value::from("Loading..."))
            .ok(|v| Value::from(*v));
        assert_eq!(async_result(&state, &clauses), Value::from("Loading..."));
    }

    #[test]
    fn async_result_dispatches_ok_clause() {
        let state: AsyncResult<i64> = AsyncResult::Ok(42);
        let clauses = AsyncClauses::new()
            .loading(|| Value::from("Loading..."))
            .ok(|v| Value::from(*v));
        assert_eq!(async_result(&state, &clauses), Value::from(42));
    }

    #[test]
    fn validate_keys_rejects_unknown_clause() {
        assert!(AsyncClauses::<i64>::validate_keys(&["ok", "loading"]).is_ok());
        assert!(AsyncClauses::<i64>::validate_keys(&["ok", "bogus"]).is_err());
    }
}
