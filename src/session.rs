//! Client-held game session lifecycle.

use crate::engine::{EngineError, GameEngine, NewSessionResponse, SessionState};
use crate::game_over::GameOverStore;
use crate::store::DurableStore;
use chrono::{DateTime, NaiveDateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use derive_more::{Display, Error};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Storage key holding the current session id.
pub const CURRENT_SESSION_KEY: &str = "current_session_id";

/// Unique identifier for a game session.
pub type SessionId = String;

/// A server-assigned game context.
///
/// Replaced wholesale on create or load, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct Session {
    id: SessionId,
    turn_count: u32,
    created_at: DateTime<Utc>,
}

impl Session {
    fn from_created(response: &NewSessionResponse) -> Self {
        Self::new(
            response.session_id.clone(),
            0,
            parse_timestamp(response.created_at.as_deref()),
        )
    }

    fn from_state(id: &str, state: &SessionState) -> Self {
        Self::new(
            id.to_string(),
            state.turn_count,
            parse_timestamp(state.created_at.as_deref()),
        )
    }
}

/// Accepts RFC 3339 or naive ISO-8601 (read as UTC); anything else becomes now.
fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Utc::now();
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive.and_utc(),
        Err(e) => {
            debug!(raw, error = %e, "Unparseable session timestamp");
            Utc::now()
        }
    }
}

/// Result of a successful session creation.
#[derive(Debug, Clone, Getters)]
pub struct NewSession {
    session: Session,
    message: String,
    initial_scene: Option<String>,
}

/// Result of a successful session load.
#[derive(Debug, Clone, Getters)]
pub struct LoadedSession {
    session: Session,
    game_over: bool,
}

/// Session lifecycle error.
#[derive(Debug, Clone, Display, Error)]
pub enum SessionError {
    /// The engine call failed or rejected the session id.
    #[display("{}", _0)]
    Engine(EngineError),
    /// Session changes are refused while a turn or another change is running.
    #[display("A turn is in flight; wait for it to finish before changing sessions")]
    Busy,
    /// There is no current session to act on.
    #[display("No active session")]
    NoSession,
}

impl SessionError {
    /// True if the engine does not know the session id.
    pub fn is_unknown_session(&self) -> bool {
        matches!(self, Self::Engine(e) if e.is_unknown_session())
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

/// Owns the current session id and keeps it in durable storage.
#[derive(Clone)]
pub struct SessionManager {
    engine: Arc<dyn GameEngine>,
    store: Arc<dyn DurableStore>,
    game_over: GameOverStore,
    current: Arc<Mutex<Option<Session>>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("current", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a session manager with no current session.
    #[instrument(skip_all)]
    pub fn new(
        engine: Arc<dyn GameEngine>,
        store: Arc<dyn DurableStore>,
        game_over: GameOverStore,
    ) -> Self {
        info!("Creating session manager");
        Self {
            engine,
            store,
            game_over,
            current: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The installed session, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.lock().clone()
    }

    /// Id of the installed session, if any.
    pub fn current_id(&self) -> Option<SessionId> {
        self.lock().as_ref().map(|s| s.id.clone())
    }

    /// Session id persisted by a previous run, if any.
    #[instrument(skip(self))]
    pub fn saved_id(&self) -> Option<SessionId> {
        match self.store.get(CURRENT_SESSION_KEY) {
            Ok(value) => value
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|id| !id.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read saved session id");
                None
            }
        }
    }

    fn install(&self, session: Session) {
        if let Err(e) = self
            .store
            .set(CURRENT_SESSION_KEY, Value::String(session.id.clone()))
        {
            warn!(session_id = %session.id, error = %e, "Failed to persist session id");
        }
        *self.lock() = Some(session);
    }

    /// Starts a new engine session and makes it current.
    ///
    /// Blank context is sent as absent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Engine`] if the engine call fails; the current
    /// session is left untouched.
    #[instrument(skip(self, initial_context))]
    pub async fn create_session(&self, initial_context: &str) -> Result<NewSession, SessionError> {
        let context = Some(initial_context.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        debug!(has_context = context.is_some(), "Creating session");

        let response = self.engine.create_session(context).await?;
        let session = Session::from_created(&response);
        info!(session_id = %session.id, "Session created");

        self.install(session.clone());
        Ok(NewSession {
            session,
            message: response.message,
            initial_scene: response.initial_scene,
        })
    }

    /// Fetches an existing session and makes it current.
    ///
    /// # Errors
    ///
    /// On any failure the current and persisted session id are cleared and
    /// the engine error is returned. A reply for a different session id counts
    /// as an unknown session.
    #[instrument(skip(self))]
    pub async fn load_session(&self, session_id: &str) -> Result<LoadedSession, SessionError> {
        let session_id = session_id.trim();
        debug!("Loading session");

        let fetched = self.engine.get_session_state(session_id).await.and_then(|state| {
            if state.session_id == session_id {
                Ok(state)
            } else {
                Err(EngineError::unknown_session(format!(
                    "Engine answered for session {} instead of {}",
                    state.session_id, session_id
                )))
            }
        });

        match fetched {
            Ok(state) => {
                let session = Session::from_state(session_id, &state);
                self.install(session.clone());
                let game_over = self.game_over.get(session_id);
                info!(turn_count = session.turn_count, game_over, "Session loaded");
                Ok(LoadedSession { session, game_over })
            }
            Err(e) => {
                warn!(error = %e, "Failed to load session");
                self.clear_session();
                Err(e.into())
            }
        }
    }

    /// Loads the session persisted by a previous run, if there is one.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::load_session`].
    #[instrument(skip(self))]
    pub async fn restore_saved(&self) -> Result<Option<LoadedSession>, SessionError> {
        match self.saved_id() {
            Some(id) => {
                info!(session_id = %id, "Restoring saved session");
                self.load_session(&id).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Drops the current session locally and from durable storage.
    #[instrument(skip(self))]
    pub fn clear_session(&self) {
        if let Err(e) = self.store.remove(CURRENT_SESSION_KEY) {
            warn!(error = %e, "Failed to remove persisted session id");
        }
        if let Some(old) = self.lock().take() {
            info!(session_id = %old.id, "Session cleared");
        }
    }

    /// Deletes the current session on the engine, then clears it locally.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSession`] without a current session, or the
    /// engine error. An unknown-session reply still clears local state.
    #[instrument(skip(self))]
    pub async fn delete_session(&self) -> Result<SessionId, SessionError> {
        let id = self.current_id().ok_or(SessionError::NoSession)?;
        match self.engine.delete_session(&id).await {
            Ok(ack) => {
                debug!(message = %ack.message, "Engine acknowledged delete");
                self.clear_session();
                Ok(id)
            }
            Err(e) if e.is_unknown_session() => {
                self.clear_session();
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
