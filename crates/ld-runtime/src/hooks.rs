// SPDX-License-Identifier: MIT OR Apache-2.0
//! Running a route's `on_mount` hook chain.

use ld_core::error::LiveDataError;
use ld_core::route::{HookOutcome, MountHook, RouteHandler};
use ld_core::socket::Socket;
use serde_json::Value;

/// Run `route`'s mount hooks in registration order.
///
/// Returns `Ok(true)` if every hook continued (so `view.mount` should run
/// next), `Ok(false)` if a hook halted the chain, or the first hook error
/// encountered.
pub fn run_mount_chain(
    route: &RouteHandler,
    params: &Value,
    socket: &mut Socket,
) -> Result<bool, LiveDataError> {
    for hook in route.hooks() {
        match hook.call(params, socket)? {
            HookOutcome::Continue => continue,
            HookOutcome::Halt => {
                tracing::debug!(target: "livedata.hooks", topic = route.topic(), "mount chain halted");
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Built-in hook that logs every mount attempt via `tracing`.
pub struct LoggingMountHook;

impl MountHook for LoggingMountHook {
    fn call(&self, params: &Value, _socket: &mut Socket) -> Result<HookOutcome, LiveDataError> {
        tracing::info!(target: "livedata.hooks", ?params, "mounting session");
        Ok(HookOutcome::Continue)
    }
}
