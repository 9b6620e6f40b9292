// SPDX-License-Identifier: MIT OR Apache-2.0
//! Redirect URL validation.
//!
//! A local redirect must be a single absolute path: one leading `/`, no
//! `//` (protocol-relative URLs are rejected outright), and no backslash
//! (a common browser-normalization trick for smuggling a host). An
//! external redirect must use an allow-listed scheme.

use ld_core::error::{ErrorCode, LiveDataError};
use ld_core::socket::Redirect;

const ALLOWED_EXTERNAL_SCHEMES: [&str; 17] = [
    "http", "https", "ftp", "ftps", "mailto", "news", "irc", "gopher", "nntp", "feed", "telnet",
    "mms", "rtsp", "svn", "tel", "fax", "xmpp",
];

/// Validate a local redirect path.
///
/// # Errors
///
/// Returns [`ErrorCode::InvalidRedirectUrl`] if `path` doesn't start with
/// exactly one `/`, contains `//`, or contains a backslash.
pub fn validate_local(path: &str) -> Result<Redirect, LiveDataError> {
    let starts_single_slash = path.starts_with('/') && !path.starts_with("//");
    if !starts_single_slash || path.contains('\\') {
        return Err(
            LiveDataError::new(ErrorCode::InvalidRedirectUrl, "invalid local redirect path")
                .with_context("path", path),
        );
    }
    Ok(Redirect::Local(path.to_string()))
}

/// Validate an external redirect URL against the allow-listed schemes.
///
/// Not every allow-listed scheme uses a `//` authority (`mailto:`, `tel:`,
/// `fax:` don't), so the scheme is taken as everything before the first
/// `:` rather than requiring a `://` separator.
///
/// # Errors
///
/// Returns [`ErrorCode::InvalidRedirectUrl`] if `url` has no recognizable
/// `scheme:` prefix or its scheme isn't allow-listed.
pub fn validate_external(url: &str) -> Result<Redirect, LiveDataError> {
    let scheme = url.split_once(':').map(|(scheme, _)| scheme.to_ascii_lowercase());
    match scheme {
        Some(scheme) if ALLOWED_EXTERNAL_SCHEMES.contains(&scheme.as_str()) => {
            Ok(Redirect::External(url.to_string()))
        }
        _ => Err(
            LiveDataError::new(ErrorCode::InvalidRedirectUrl, "redirect scheme not allow-listed")
                .with_context("url", url),
        ),
    }
}

/// Reject a route topic registered under the reserved `dv:` namespace,
/// used by join-time topic resolution ahead of `ld_core::route::RouteTable`.
///
/// Delegates to [`ld_core::route::is_reserved_topic`] rather than
/// re-checking the prefix itself — `RouteTable::register` enforces the same
/// rule, and the two must never drift apart.
///
/// # Errors
///
/// Returns [`ErrorCode::ReservedNamespace`] if `topic` starts with `dv:`.
pub fn reject_reserved_topic(topic: &str) -> Result<(), LiveDataError> {
    if ld_core::route::is_reserved_topic(topic) {
        return Err(LiveDataError::new(
            ErrorCode::ReservedNamespace,
            "dv: topics are reserved for the test-harness barriers",
        )
        .with_context("topic", topic));
    }
    Ok(())
}
