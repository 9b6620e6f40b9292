//! Wire protocol: compressed JSON-Patch framing, the tagged message
//! envelope, and redirect URL validation.
//!
//! This crate has no runtime or scheduling logic — it only defines the
//! shapes and validation rules `ld-runtime` sends and receives over
//! whatever transport the host provides.

pub mod envelope;
pub mod serializer;
pub mod url;

pub use envelope::{ClientEnvelope, ClientEventPayload, Envelope, Reply};
pub use serializer::{compress, decompress};
