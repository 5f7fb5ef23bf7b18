//! Durable record of finished sessions.

use crate::store::DurableStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const KEY_PREFIX: &str = "game_over:";

/// Per-session game-over flags kept in a [`DurableStore`].
///
/// There is no delete: a session id that is never reused never recurs as a key.
#[derive(Clone)]
pub struct GameOverStore {
    store: Arc<dyn DurableStore>,
}

impl std::fmt::Debug for GameOverStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameOverStore").finish_non_exhaustive()
    }
}

impl GameOverStore {
    /// Creates a store over the given backend.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    fn key(session_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, session_id)
    }

    /// Marks a session as finished (or not).
    ///
    /// Storage failures are logged; the in-memory coordinator state still
    /// reflects the outcome.
    #[instrument(skip(self))]
    pub fn set(&self, session_id: &str, over: bool) {
        match self.store.set(&Self::key(session_id), Value::Bool(over)) {
            Ok(()) => info!("Recorded game-over flag"),
            Err(e) => warn!(error = %e, "Failed to persist game-over flag"),
        }
    }

    /// Whether the session has ended. Absent or unreadable flags mean `false`.
    #[instrument(skip(self))]
    pub fn get(&self, session_id: &str) -> bool {
        match self.store.get(&Self::key(session_id)) {
            Ok(value) => value.and_then(|v| v.as_bool()).unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "Failed to read game-over flag");
                false
            }
        }
    }
}
