//! Strictly RPG library - session and turn lifecycle for a multi-agent RPG engine
//!
//! The engine runs a pipeline of agents (narrator, scene planner, NPCs,
//! validators) for every player command. This crate is the client side of
//! that exchange.
//!
//! # Architecture
//!
//! - **Engine**: [`GameEngine`] boundary and its HTTP implementation
//! - **Store**: durable key/value storage for the session id and game-over flags
//! - **Session**: current session lifecycle (create, load, clear, delete)
//! - **Poller**: cancellable progress polling while a turn is in flight
//! - **Outcome**: win/lose/continue classification of turn results
//! - **Coordinator**: the single-flight turn state machine tying it together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_rpg::{HttpEngine, MemoryStore, TurnCoordinator};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (events_tx, mut events_rx) = mpsc::unbounded_channel();
//! let (progress_tx, _progress_rx) = mpsc::unbounded_channel();
//! let coordinator = TurnCoordinator::new(
//!     Arc::new(HttpEngine::new("http://127.0.0.1:8000")),
//!     Arc::new(MemoryStore::new()),
//!     events_tx,
//!     progress_tx,
//! );
//!
//! coordinator.create_session("").await?;
//! coordinator.submit("open the door").await?;
//! while let Ok(event) = events_rx.try_recv() {
//!     println!("{}", strictly_rpg::render_event(&event));
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod coordinator;
mod display;
mod engine;
mod game_over;
mod outcome;
mod poller;
mod render;
mod session;
mod store;

// Crate-level exports - Configuration
pub use config::{ClientConfig, ConfigError, ConfigErrorKind, SERVER_URL_ENV};

// Crate-level exports - Turn coordination
pub use coordinator::{
    MAX_COMMAND_CHARS, SkipReason, Submission, TurnCoordinator, TurnError, TurnState,
    ValidationError, validate_command,
};

// Crate-level exports - Display events
pub use display::{Banner, DisplayEvent, GAME_OVER_NOTICE, NO_RESPONSE_MARKER, outcome_events};
pub use render::{render_event, render_progress};

// Crate-level exports - Engine boundary
pub use engine::{
    AgentOutput, DeleteAck, EngineError, EngineErrorKind, GameEngine, HttpEngine,
    NewSessionRequest, NewSessionResponse, ProgressSnapshot, SessionState, TurnRequest,
    TurnResult, ValidationResult,
};

// Crate-level exports - Outcome classification
pub use outcome::{
    Correction, DEFAULT_AGENT_NAME, NARRATOR_NAME, Outcome, classify, resolve_agent_name,
};

// Crate-level exports - Polling
pub use poller::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, PollerHandle, ProgressPoller};

// Crate-level exports - Sessions and storage
pub use game_over::GameOverStore;
pub use session::{
    CURRENT_SESSION_KEY, LoadedSession, NewSession, Session, SessionError, SessionId,
    SessionManager,
};
pub use store::{DurableStore, JsonFileStore, MemoryStore, StoreError, StoreErrorKind};
