//! The LiveData runtime: the tokio-backed session actor and the
//! collaborators it drives — the render/diff pipeline, async-task
//! supervision, lifecycle hooks, telemetry, and the test-harness barriers.
//!
//! `ld-core` describes the session's data model (sockets, views, routes)
//! without depending on an executor; this crate is what actually runs it.

pub mod async_task;
pub mod cancel;
pub mod differ;
pub mod hooks;
pub mod renderer;
pub mod session;
pub mod telemetry;
pub mod test_harness;

pub use cancel::CancellationToken;
pub use hooks::{run_mount_chain, LoggingMountHook};
pub use session::{spawn, SessionHandle, SessionMessage, ShutdownReason};
pub use telemetry::{MetricsSnapshot, SessionMetrics};
pub use test_harness::TestHarness;
