//! Turn lifecycle state machine.
//!
//! A [`TurnCoordinator`] runs one turn at a time for the current session:
//! it echoes the command, submits it, polls progress while the engine works,
//! classifies the result and records finished games. Everything it wants
//! shown goes out, in order, on the display event channel.

use crate::display::{DisplayEvent, outcome_events};
use crate::engine::{EngineError, GameEngine, ProgressSnapshot, TurnRequest};
use crate::game_over::GameOverStore;
use crate::outcome::{Outcome, classify};
use crate::poller::{DEFAULT_POLL_INTERVAL, PollerHandle, ProgressPoller};
use crate::session::{LoadedSession, NewSession, Session, SessionError, SessionManager};
use crate::store::DurableStore;
use derive_more::{Display, Error};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Longest accepted command, in characters after trimming.
pub const MAX_COMMAND_CHARS: usize = 2000;

/// Where the coordinator is in the turn lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TurnState {
    /// Ready for a command.
    Idle,
    /// A turn is being processed by the engine.
    Submitting,
    /// The last turn finished and play continues.
    Completed,
    /// The last turn failed; the player may retry.
    Failed,
    /// The session has ended.
    GameOver,
}

impl TurnState {
    /// Whether a new command may be submitted from this state.
    pub fn accepts_submissions(self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Failed)
    }
}

/// A command rejected before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ValidationError {
    /// Nothing but whitespace.
    #[display("Please enter a command")]
    EmptyCommand,
    /// Longer than [`MAX_COMMAND_CHARS`].
    #[display("Command is {} characters long; the limit is {}", len, max)]
    CommandTooLong {
        /// Trimmed length in characters.
        len: usize,
        /// Limit in characters.
        max: usize,
    },
}

/// Checks a trimmed command against the length rules.
pub fn validate_command(command: &str) -> Result<(), ValidationError> {
    let len = command.chars().count();
    if len == 0 {
        Err(ValidationError::EmptyCommand)
    } else if len > MAX_COMMAND_CHARS {
        Err(ValidationError::CommandTooLong {
            len,
            max: MAX_COMMAND_CHARS,
        })
    } else {
        Ok(())
    }
}

/// Why a well-formed command was not submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SkipReason {
    /// No session is installed.
    #[strum(to_string = "no active session")]
    NoSession,
    /// The session has ended.
    #[strum(to_string = "the game is over")]
    GameOver,
    /// Another turn is still being processed.
    #[strum(to_string = "a turn is already in flight")]
    InFlight,
    /// A session change is in progress.
    #[strum(to_string = "the session is changing")]
    SessionChanging,
}

/// What happened to a submitted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Nothing was sent and no state changed.
    Skipped(SkipReason),
    /// The engine processed the turn.
    Resolved(Outcome),
}

/// Turn submission error.
#[derive(Debug, Clone, Display, Error)]
pub enum TurnError {
    /// The command was rejected locally.
    #[display("{}", _0)]
    Validation(ValidationError),
    /// The engine call failed.
    #[display("Turn failed: {}", _0)]
    Transport(EngineError),
}

impl From<ValidationError> for TurnError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<EngineError> for TurnError {
    fn from(err: EngineError) -> Self {
        Self::Transport(err)
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: TurnState,
    session_change: bool,
}

/// Orchestrates sessions and turns for a single player.
pub struct TurnCoordinator {
    engine: Arc<dyn GameEngine>,
    sessions: SessionManager,
    game_over: GameOverStore,
    poller: ProgressPoller,
    lifecycle: Mutex<Lifecycle>,
    events: mpsc::UnboundedSender<DisplayEvent>,
    progress: mpsc::UnboundedSender<ProgressSnapshot>,
}

impl std::fmt::Debug for TurnCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("state", &self.state())
            .field("sessions", &self.sessions)
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

impl TurnCoordinator {
    /// Creates a coordinator with no session, polling every 500 ms.
    ///
    /// Display events go to `events`; progress snapshots go to `progress`.
    #[instrument(skip_all)]
    pub fn new(
        engine: Arc<dyn GameEngine>,
        store: Arc<dyn DurableStore>,
        events: mpsc::UnboundedSender<DisplayEvent>,
        progress: mpsc::UnboundedSender<ProgressSnapshot>,
    ) -> Self {
        info!("Creating turn coordinator");
        let game_over = GameOverStore::new(Arc::clone(&store));
        let sessions = SessionManager::new(Arc::clone(&engine), store, game_over.clone());
        Self {
            poller: ProgressPoller::new(Arc::clone(&engine), DEFAULT_POLL_INTERVAL),
            engine,
            sessions,
            game_over,
            lifecycle: Mutex::new(Lifecycle {
                state: TurnState::Idle,
                session_change: false,
            }),
            events,
            progress,
        }
    }

    /// Replaces the progress polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poller = ProgressPoller::new(Arc::clone(&self.engine), interval);
        self
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: TurnState) {
        let mut lifecycle = self.lifecycle();
        debug!(from = %lifecycle.state, to = %state, "Turn state transition");
        lifecycle.state = state;
    }

    fn emit(&self, event: DisplayEvent) {
        debug!(kind = event.kind(), "Display event");
        if self.events.send(event).is_err() {
            debug!("Display receiver dropped");
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TurnState {
        self.lifecycle().state
    }

    /// True once the current session has ended.
    pub fn is_game_over(&self) -> bool {
        self.state() == TurnState::GameOver
    }

    /// The installed session, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.sessions.current_session()
    }

    /// Session lifecycle manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Whether a progress poll is running.
    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// Reserves the coordinator for a session change.
    fn begin_session_change(&self) -> Result<SessionChangeGuard<'_>, SessionError> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state == TurnState::Submitting || lifecycle.session_change {
            warn!(state = %lifecycle.state, "Session change refused while busy");
            return Err(SessionError::Busy);
        }
        lifecycle.session_change = true;
        Ok(SessionChangeGuard { coordinator: self })
    }

    /// Starts a new game session and makes it current.
    ///
    /// The new session starts fresh regardless of how the previous one ended.
    ///
    /// # Errors
    ///
    /// [`SessionError::Busy`] while a turn is in flight, or the engine error.
    #[instrument(skip(self, initial_context))]
    pub async fn create_session(&self, initial_context: &str) -> Result<NewSession, SessionError> {
        let _guard = self.begin_session_change()?;
        let created = self.sessions.create_session(initial_context).await?;

        self.set_state(TurnState::Idle);
        if !created.message().trim().is_empty() {
            self.emit(DisplayEvent::System {
                content: created.message().clone(),
            });
        }
        if let Some(scene) = created.initial_scene().as_ref().filter(|s| !s.trim().is_empty()) {
            self.emit(DisplayEvent::System {
                content: scene.clone(),
            });
        }
        Ok(created)
    }

    /// Loads an existing session and makes it current.
    ///
    /// A session recorded as finished is restored straight into
    /// [`TurnState::GameOver`].
    ///
    /// # Errors
    ///
    /// [`SessionError::Busy`] while a turn is in flight. Engine failures clear
    /// the current session before being returned.
    #[instrument(skip(self))]
    pub async fn load_session(&self, session_id: &str) -> Result<LoadedSession, SessionError> {
        let _guard = self.begin_session_change()?;
        match self.sessions.load_session(session_id).await {
            Ok(loaded) => {
                self.after_load(&loaded);
                Ok(loaded)
            }
            Err(e) => {
                self.set_state(TurnState::Idle);
                Err(e)
            }
        }
    }

    /// Loads the session persisted by a previous run, if any.
    ///
    /// # Errors
    ///
    /// Same as [`TurnCoordinator::load_session`].
    #[instrument(skip(self))]
    pub async fn restore_saved(&self) -> Result<Option<LoadedSession>, SessionError> {
        let _guard = self.begin_session_change()?;
        match self.sessions.restore_saved().await {
            Ok(Some(loaded)) => {
                self.after_load(&loaded);
                Ok(Some(loaded))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.set_state(TurnState::Idle);
                Err(e)
            }
        }
    }

    fn after_load(&self, loaded: &LoadedSession) {
        let session = loaded.session();
        self.emit(DisplayEvent::System {
            content: format!(
                "Loaded session: {}\nTurn count: {}",
                session.id(),
                session.turn_count()
            ),
        });
        if *loaded.game_over() {
            info!(session_id = %session.id(), "Restored a finished session");
            self.set_state(TurnState::GameOver);
            self.emit(DisplayEvent::game_over());
        } else {
            self.set_state(TurnState::Idle);
        }
    }

    /// Drops the current session.
    ///
    /// # Errors
    ///
    /// [`SessionError::Busy`] while a turn is in flight.
    #[instrument(skip(self))]
    pub fn clear_session(&self) -> Result<(), SessionError> {
        let _guard = self.begin_session_change()?;
        self.sessions.clear_session();
        self.set_state(TurnState::Idle);
        Ok(())
    }

    /// Deletes the current session on the engine and drops it locally.
    ///
    /// # Errors
    ///
    /// [`SessionError::Busy`], [`SessionError::NoSession`] or the engine error.
    #[instrument(skip(self))]
    pub async fn delete_session(&self) -> Result<(), SessionError> {
        let _guard = self.begin_session_change()?;
        let result = self.sessions.delete_session().await;
        if self.sessions.current_id().is_none() {
            self.set_state(TurnState::Idle);
        }
        let id = result?;
        self.emit(DisplayEvent::System {
            content: format!("Session {} deleted", id),
        });
        Ok(())
    }

    /// Runs one turn end to end.
    ///
    /// Well-formed commands that cannot be submitted right now (no session,
    /// game over, another turn in flight) return [`Submission::Skipped`]
    /// without any remote call or state change.
    ///
    /// # Errors
    ///
    /// [`TurnError::Validation`] for empty or overlong commands, with no side
    /// effects. [`TurnError::Transport`] when the engine call fails; the
    /// coordinator is then in [`TurnState::Failed`] and accepts a retry.
    #[instrument(skip(self, command), fields(command_len = command.len()))]
    pub async fn submit(&self, command: &str) -> Result<Submission, TurnError> {
        let command = command.trim();
        validate_command(command)?;

        let session_id = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state == TurnState::Submitting {
                debug!("Turn already in flight");
                return Ok(Submission::Skipped(SkipReason::InFlight));
            }
            if lifecycle.session_change {
                return Ok(Submission::Skipped(SkipReason::SessionChanging));
            }
            let Some(session_id) = self.sessions.current_id() else {
                debug!("No session installed");
                return Ok(Submission::Skipped(SkipReason::NoSession));
            };
            if lifecycle.state == TurnState::GameOver || self.game_over.get(&session_id) {
                debug!(session_id = %session_id, "Session already over");
                return Ok(Submission::Skipped(SkipReason::GameOver));
            }
            lifecycle.state = TurnState::Submitting;
            session_id
        };
        info!(session_id = %session_id, "Turn submitted");

        self.emit(DisplayEvent::PlayerEcho {
            command: command.to_string(),
        });
        let handle = self.poller.start(&session_id, self.progress.clone());
        let mut flight = InFlightGuard {
            coordinator: self,
            handle,
            armed: true,
        };

        let result = self
            .engine
            .submit_turn(TurnRequest {
                session_id: session_id.clone(),
                player_command: command.to_string(),
            })
            .await;

        self.poller.stop().await;
        flight.armed = false;

        match result {
            Ok(result) => {
                self.emit(DisplayEvent::TurnSeparator {
                    turn_number: result.turn_number,
                });
                let outcome = classify(&result);
                for event in outcome_events(&result, &outcome, command) {
                    self.emit(event);
                }

                if outcome.is_terminal() {
                    self.game_over.set(&session_id, true);
                    self.set_state(TurnState::GameOver);
                    info!(session_id = %session_id, outcome = ?outcome, "Game over");
                } else {
                    self.set_state(TurnState::Completed);
                    debug!(turn_number = result.turn_number, "Turn completed");
                }
                Ok(Submission::Resolved(outcome))
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Turn failed");
                self.emit(DisplayEvent::Error {
                    message: format!("Error: {}", e.message),
                });
                self.set_state(TurnState::Failed);
                Err(e.into())
            }
        }
    }
}

/// Releases a session-change reservation on every exit path.
struct SessionChangeGuard<'a> {
    coordinator: &'a TurnCoordinator,
}

impl Drop for SessionChangeGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.lifecycle().session_change = false;
    }
}

/// Cleans up after a turn whose future was dropped mid-flight.
struct InFlightGuard<'a> {
    coordinator: &'a TurnCoordinator,
    handle: PollerHandle,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(session_id = %self.handle.session_id(), "Turn abandoned mid-flight");
            self.handle.cancel();
            self.coordinator.set_state(TurnState::Failed);
        }
    }
}
