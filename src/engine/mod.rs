//! Remote multi-agent engine boundary.

mod client;
mod error;
mod types;

pub use client::HttpEngine;
pub use error::{EngineError, EngineErrorKind};
pub use types::{
    AgentOutput, DeleteAck, NewSessionRequest, NewSessionResponse, ProgressSnapshot,
    SessionState, TurnRequest, TurnResult, ValidationResult,
};

/// Operations the coordinator consumes from the game engine.
#[async_trait::async_trait]
pub trait GameEngine: Send + Sync {
    /// Starts a new session with optional starting context.
    async fn create_session(
        &self,
        initial_context: Option<String>,
    ) -> Result<NewSessionResponse, EngineError>;

    /// Fetches the state of an existing session.
    async fn get_session_state(&self, session_id: &str) -> Result<SessionState, EngineError>;

    /// Runs one player turn through the agent pipeline.
    ///
    /// May take a long time; no timeout is applied.
    async fn submit_turn(&self, request: TurnRequest) -> Result<TurnResult, EngineError>;

    /// Reports progress of the turn currently being processed.
    async fn get_progress(&self, session_id: &str) -> Result<ProgressSnapshot, EngineError>;

    /// Deletes a session on the engine.
    async fn delete_session(&self, session_id: &str) -> Result<DeleteAck, EngineError>;
}
