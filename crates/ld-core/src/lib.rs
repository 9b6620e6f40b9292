//! Data model shared by every LiveData session: the error taxonomy, the
//! per-session [`socket::Socket`], the tagged [`async_result::AsyncResult`],
//! the [`view::View`] contract, and route resolution.
//!
//! This crate has no opinion on transport, wire framing, or scheduling —
//! those live in `ld-protocol` and `ld-runtime` respectively.

pub mod async_result;
pub mod error;
pub mod render_tree;
pub mod route;
pub mod socket;
pub mod view;

pub use async_result::{async_result, AsyncClauses, AsyncResult};
pub use error::{ErrorCode, ErrorKind, LiveDataError};
pub use render_tree::{ComponentRef, RenderTree};
pub use route::{HookOutcome, MountHook, RouteHandler, RouteTable, SessionOptions};
pub use socket::{
    AssignKey, AsyncProducerFuture, AsyncSpawner, PendingReply, QueuedEvent, Redirect, Socket,
    Transport,
};
pub use view::{HandleEventResult, View};
