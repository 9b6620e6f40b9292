// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy for LiveData sessions.
//!
//! Every error a session can raise carries a stable [`ErrorCode`], a
//! human-readable message, an optional cause, and arbitrary key-value
//! context. The taxonomy groups codes into the six kinds from the design's
//! error-handling policy: configuration, validation, protocol, user
//! callback failure, async producer failure, and transport-down.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Broad family an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Route resolution / session option errors, raised at join time.
    Configuration,
    /// Programmer errors (bad assign key, bad redirect URL, bad clause map).
    Validation,
    /// Wire-format violations: unknown opcode, truncated patch.
    Protocol,
    /// A view's `mount`/`handle_event`/`handle_info` panicked or returned an error.
    UserCallbackFailure,
    /// An `assign_async` producer failed.
    AsyncProducerFailure,
    /// The transport disappeared out from under the session.
    TransportDown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::Protocol => "protocol",
            Self::UserCallbackFailure => "user_callback_failure",
            Self::AsyncProducerFailure => "async_producer_failure",
            Self::TransportDown => "transport_down",
        };
        f.write_str(s)
    }
}

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string guaranteed
/// not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No route matched the join topic.
    NoRoute,
    /// A channel was registered under the reserved `dv:*` namespace.
    ReservedNamespace,
    /// Session options failed to parse/validate.
    MalformedSessionOptions,

    /// An assign key was not a valid symbol/atom-like identifier.
    InvalidAssignKey,
    /// A redirect target failed URL validation.
    InvalidRedirectUrl,
    /// `assign_async` was called with an invalid key list.
    InvalidAsyncKeys,
    /// `async_result` was called with an unknown clause key.
    InvalidAsyncResultClause,

    /// The Serializer encountered an opcode it does not recognize.
    UnknownOpcode,
    /// The compressed patch array ended before an op was fully read.
    TruncatedPatch,
    /// A message arrived for a session whose join has not yet resolved a
    /// route (or whose join failed), so it has no mounted view to dispatch to.
    SessionNotMounted,

    /// A view callback (`mount`/`handle_event`/`handle_info`) failed.
    ViewCallbackPanicked,

    /// An `assign_async` producer returned a failure.
    AsyncProducerFailed,

    /// The transport channel closed or the socket monitor fired.
    TransportClosed,
}

impl ErrorCode {
    /// Return the broad [`ErrorKind`] this code belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoRoute | Self::ReservedNamespace | Self::MalformedSessionOptions => {
                ErrorKind::Configuration
            }
            Self::InvalidAssignKey
            | Self::InvalidRedirectUrl
            | Self::InvalidAsyncKeys
            | Self::InvalidAsyncResultClause => ErrorKind::Validation,
            Self::UnknownOpcode | Self::TruncatedPatch | Self::SessionNotMounted => {
                ErrorKind::Protocol
            }
            Self::ViewCallbackPanicked => ErrorKind::UserCallbackFailure,
            Self::AsyncProducerFailed => ErrorKind::AsyncProducerFailure,
            Self::TransportClosed => ErrorKind::TransportDown,
        }
    }

    /// Stable string representation (e.g. `"NO_ROUTE"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRoute => "NO_ROUTE",
            Self::ReservedNamespace => "RESERVED_NAMESPACE",
            Self::MalformedSessionOptions => "MALFORMED_SESSION_OPTIONS",
            Self::InvalidAssignKey => "INVALID_ASSIGN_KEY",
            Self::InvalidRedirectUrl => "INVALID_REDIRECT_URL",
            Self::InvalidAsyncKeys => "INVALID_ASYNC_KEYS",
            Self::InvalidAsyncResultClause => "INVALID_ASYNC_RESULT_CLAUSE",
            Self::UnknownOpcode => "UNKNOWN_OPCODE",
            Self::TruncatedPatch => "TRUNCATED_PATCH",
            Self::SessionNotMounted => "SESSION_NOT_MOUNTED",
            Self::ViewCallbackPanicked => "VIEW_CALLBACK_PANICKED",
            Self::AsyncProducerFailed => "ASYNC_PRODUCER_FAILED",
            Self::TransportClosed => "TRANSPORT_CLOSED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified LiveData error.
///
/// ```
/// use ld_core::error::{ErrorCode, LiveDataError};
///
/// let err = LiveDataError::new(ErrorCode::InvalidAssignKey, "key must be an identifier")
///     .with_context("key", "123abc");
/// assert_eq!(err.code, ErrorCode::InvalidAssignKey);
/// ```
pub struct LiveDataError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl LiveDataError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// Skips the entry if serialization fails instead of panicking.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.kind()`.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}

impl fmt::Debug for LiveDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("LiveDataError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for LiveDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for LiveDataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
