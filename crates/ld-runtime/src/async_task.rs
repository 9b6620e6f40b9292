// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scheduling for `assign_async` producers.
//!
//! Each assign key owns a generation counter and a [`CancellationToken`].
//! Calling `assign_async` again for a key already in flight bumps the
//! generation and cancels the superseded producer's token; the producer
//! task keeps running until it next yields (cooperative, not preemptive),
//! but its result is dropped on arrival if its generation no longer
//! matches the key's current generation.

use crate::cancel::CancellationToken;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// The terminal outcome of an `assign_async` producer.
#[derive(Debug, Clone)]
pub enum AsyncOutcome {
    /// The producer completed successfully, with one entry per requested key.
    Ok(serde_json::Map<String, Value>),
    /// The producer failed; the same error value is folded into every key.
    Failed(Value),
}

/// Delivered to a session's mailbox when a producer resolves.
#[derive(Debug, Clone)]
pub struct AsyncResolved {
    /// The assign keys this producer was running for.
    pub keys: Vec<String>,
    /// The generation this producer was spawned at.
    pub generation: u64,
    /// `None` if the producer was cancelled before it could resolve.
    pub outcome: Option<AsyncOutcome>,
}

struct Slot {
    generation: u64,
    token: CancellationToken,
}

/// Tracks the in-flight generation and cancellation token per key-set slot
/// for one session. A producer spawned over `["a", "b"]` occupies one slot
/// keyed by the joined key set, so a single `assign_async` call resolves
/// atomically as a set.
#[derive(Default)]
pub struct AsyncTaskSupervisor {
    slots: Mutex<HashMap<String, Slot>>,
}

impl AsyncTaskSupervisor {
    /// An empty supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `producer` for `keys`, cancelling and superseding any producer
    /// already running for that exact key set. `mailbox` receives an
    /// [`AsyncResolved`] once the new generation resolves (successfully,
    /// with a failure, or because it observed cancellation and gave up
    /// early).
    pub fn spawn<Fut>(
        &self,
        keys: &[String],
        mailbox: mpsc::UnboundedSender<AsyncResolved>,
        producer: impl FnOnce() -> Fut + Send + 'static,
    ) where
        Fut: Future<Output = Result<serde_json::Map<String, Value>, Value>> + Send + 'static,
    {
        let slot_key = keys.join(",");
        let generation = {
            let mut slots = self.slots.lock().unwrap();
            if let Some(existing) = slots.get(&slot_key) {
                existing.token.cancel();
            }
            let next_generation = slots.get(&slot_key).map_or(0, |s| s.generation + 1);
            let token = CancellationToken::new();
            slots.insert(
                slot_key.clone(),
                Slot {
                    generation: next_generation,
                    token: token.clone(),
                },
            );
            next_generation
        };

        let token = self.token_for(&slot_key).expect("slot just inserted");
        let keys = keys.to_vec();

        tokio::spawn(async move {
            let cancel_signal = token.clone();
            let outcome = tokio::select! {
                biased;
                () = cancel_signal.cancelled() => None,
                result = producer() => Some(match result {
                    Ok(v) => AsyncOutcome::Ok(v),
                    Err(e) => AsyncOutcome::Failed(e),
                }),
            };
            let _ = mailbox.send(AsyncResolved {
                keys,
                generation,
                outcome,
            });
        });
    }

    fn token_for(&self, slot_key: &str) -> Option<CancellationToken> {
        self.slots.lock().unwrap().get(slot_key).map(|s| s.token.clone())
    }

    /// Whether `resolved` still belongs to the current generation for its
    /// key set — a stale resolution from a superseded producer must be
    /// discarded instead of overwriting a newer assign.
    #[must_use]
    pub fn is_current(&self, resolved: &AsyncResolved) -> bool {
        let slot_key = resolved.keys.join(",");
        self.slots
            .lock()
            .unwrap()
            .get(&slot_key)
            .is_some_and(|slot| slot.generation == resolved.generation)
    }
}
