//! Shared test doubles for coordinator, session and poller tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use strictly_rpg::{
    AgentOutput, DeleteAck, DisplayEvent, DurableStore, EngineError, GameEngine,
    NewSessionResponse, ProgressSnapshot, SessionState, TurnCoordinator, TurnRequest, TurnResult,
    ValidationResult,
};
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;

/// In-process engine with scripted replies and call counters.
#[derive(Default)]
pub struct ScriptedEngine {
    next_session: AtomicUsize,
    known: Mutex<HashMap<String, u32>>,
    turns: Mutex<VecDeque<Result<TurnResult, EngineError>>>,
    submitted: Mutex<Vec<TurnRequest>>,
    gate: Option<Arc<Notify>>,
    progress_delay: Option<Duration>,
    progress_failures: AtomicUsize,
    progress_times: Mutex<Vec<Instant>>,
    progress_completed: AtomicUsize,
    fail_create: bool,
    pub create_calls: AtomicUsize,
    pub state_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub progress_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds every `submit_turn` until [`ScriptedEngine::release_turn`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    /// Delays every progress reply.
    pub fn with_progress_delay(mut self, delay: Duration) -> Self {
        self.progress_delay = Some(delay);
        self
    }

    /// Fails the first `n` progress queries.
    pub fn with_progress_failures(self, n: usize) -> Self {
        self.progress_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Rejects every `create_session`.
    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Registers a session the engine already knows.
    pub fn with_session(self, id: &str, turn_count: u32) -> Self {
        self.known
            .lock()
            .unwrap()
            .insert(id.to_string(), turn_count);
        self
    }

    /// Queues the reply for the next submitted turn.
    pub fn push_turn(&self, result: Result<TurnResult, EngineError>) {
        self.turns.lock().unwrap().push_back(result);
    }

    pub fn release_turn(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn submitted(&self) -> Vec<TurnRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn progress_times(&self) -> Vec<Instant> {
        self.progress_times.lock().unwrap().clone()
    }

    pub fn progress_completed(&self) -> usize {
        self.progress_completed.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn remote_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
            + self.state_calls.load(Ordering::SeqCst)
            + self.submit_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GameEngine for ScriptedEngine {
    async fn create_session(
        &self,
        initial_context: Option<String>,
    ) -> Result<NewSessionResponse, EngineError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(EngineError::transport("engine not initialized"));
        }
        let id = format!("S{}", self.next_session.fetch_add(1, Ordering::SeqCst) + 1);
        self.known.lock().unwrap().insert(id.clone(), 0);
        Ok(NewSessionResponse {
            session_id: id,
            message: match initial_context {
                Some(ctx) => format!("Welcome! Starting in: {}", ctx),
                None => "Welcome, adventurer!".to_string(),
            },
            created_at: Some("2026-10-18T09:30:00.123456".to_string()),
            initial_scene: None,
        })
    }

    async fn get_session_state(&self, session_id: &str) -> Result<SessionState, EngineError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        match self.known.lock().unwrap().get(session_id) {
            Some(turns) => Ok(SessionState {
                session_id: session_id.to_string(),
                turn_count: *turns,
                created_at: Some("2026-10-17T20:00:00Z".to_string()),
                current_scene: None,
            }),
            None => Err(EngineError::unknown_session(format!(
                "Session {} not found",
                session_id
            ))),
        }
    }

    async fn submit_turn(&self, request: TurnRequest) -> Result<TurnResult, EngineError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let scripted = self.turns.lock().unwrap().pop_front();
        let result = scripted.unwrap_or_else(|| Ok(narrated(1, "Nothing happens.")));
        if result.is_ok() {
            if let Some(turns) = self.known.lock().unwrap().get_mut(&request.session_id) {
                *turns += 1;
            }
        }
        result
    }

    async fn get_progress(&self, _session_id: &str) -> Result<ProgressSnapshot, EngineError> {
        let call = self.progress_calls.fetch_add(1, Ordering::SeqCst);
        self.progress_times.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.progress_delay {
            tokio::time::sleep(delay).await;
        }
        self.progress_completed.fetch_add(1, Ordering::SeqCst);
        if call < self.progress_failures.load(Ordering::SeqCst) {
            return Err(EngineError::transport("progress unavailable"));
        }
        Ok(ProgressSnapshot {
            progress: ((call + 1) as f64 * 0.25).min(1.0),
            current_phase: Some("agents".to_string()),
            current_agent: Some("narrator".to_string()),
            message: None,
        })
    }

    async fn delete_session(&self, session_id: &str) -> Result<DeleteAck, EngineError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        match self.known.lock().unwrap().remove(session_id) {
            Some(_) => Ok(DeleteAck {
                message: format!("Session {} deleted successfully", session_id),
                session_id: Some(session_id.to_string()),
            }),
            None => Err(EngineError::unknown_session(format!(
                "Session {} not found",
                session_id
            ))),
        }
    }
}

/// Coordinator plus the receiving ends of its channels.
pub struct Harness {
    pub coordinator: Arc<TurnCoordinator>,
    pub events: mpsc::UnboundedReceiver<DisplayEvent>,
    pub progress: mpsc::UnboundedReceiver<ProgressSnapshot>,
}

impl Harness {
    pub fn new(engine: Arc<ScriptedEngine>, store: Arc<dyn DurableStore>) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (progress_tx, progress) = mpsc::unbounded_channel();
        let coordinator = TurnCoordinator::new(engine, store, events_tx, progress_tx);
        Self {
            coordinator: Arc::new(coordinator),
            events,
            progress,
        }
    }

    /// Everything emitted so far.
    pub fn drain_events(&mut self) -> Vec<DisplayEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

/// Kinds of a sequence of events.
pub fn kinds(events: &[DisplayEvent]) -> Vec<&'static str> {
    events.iter().map(DisplayEvent::kind).collect()
}

/// Yields until `cond` holds.
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

/// A continuing turn with only narrator output.
pub fn narrated(turn_number: u32, content: &str) -> TurnResult {
    TurnResult {
        turn_number,
        narrator_output: Some(AgentOutput::from_content(content)),
        ..TurnResult::default()
    }
}

/// A turn where the player's command was disqualified.
pub fn lost(turn_number: u32, reason: &str) -> TurnResult {
    TurnResult {
        turn_number,
        player_loses: true,
        user_validation: Some(ValidationResult {
            approved: false,
            reason: Some(reason.to_string()),
            suggestions: vec!["Ask the guard about the gate".to_string()],
        }),
        ..TurnResult::default()
    }
}

/// A turn where an NPC's response was disqualified.
pub fn won(turn_number: u32, npc_name: &str, reason: &str) -> TurnResult {
    let mut npc = AgentOutput::from_content("I have a laser sword.");
    npc.metadata.insert("npc_name".to_string(), json!(npc_name));
    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "original_agent_response".to_string(),
        json!("I have a laser sword."),
    );
    TurnResult {
        turn_number,
        player_wins: true,
        npc_output: Some(npc),
        narrator_output: Some(AgentOutput::from_content(
            "The guard carries an iron spear, nothing more.",
        )),
        agent_validation: Some(ValidationResult {
            approved: false,
            reason: Some(reason.to_string()),
            suggestions: Vec::new(),
        }),
        metadata: Some(metadata),
        ..TurnResult::default()
    }
}
