//! Wire types exchanged with the remote multi-agent engine.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Body of a `create_session` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSessionRequest {
    /// Optional free-text starting context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_context: Option<String>,
}

/// Engine reply to `create_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionResponse {
    /// Server-assigned session id.
    pub session_id: String,
    /// Welcome message.
    #[serde(default)]
    pub message: String,
    /// Creation timestamp as sent by the engine.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Opening scene, when the engine generated one.
    #[serde(default)]
    pub initial_scene: Option<String>,
}

/// Engine reply to `get_session_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Session id.
    pub session_id: String,
    /// Number of turns played so far.
    #[serde(default)]
    pub turn_count: u32,
    /// Creation timestamp as sent by the engine.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Current scene, if any.
    #[serde(default)]
    pub current_scene: Option<String>,
}

/// Body of a `submit_turn` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Target session.
    pub session_id: String,
    /// Trimmed player command.
    pub player_command: String,
}

/// Engine reply to `delete_session`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteAck {
    /// Confirmation text.
    #[serde(default)]
    pub message: String,
    /// Deleted session id.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Output of a single agent for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Generated text.
    #[serde(default)]
    pub content: String,
    /// Ids of corpus passages the agent cited.
    #[serde(default, deserialize_with = "null_as_default")]
    pub citations: Vec<String>,
    /// Agent failure, if any. The engine sends either a message or a flag.
    #[serde(default, deserialize_with = "lenient_error")]
    pub error: Option<String>,
    /// Detailed failure message accompanying a boolean `error` flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Free-form agent metadata.
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
}

impl AgentOutput {
    /// Creates an output carrying only content.
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// True when there is something to display.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Best available error text.
    pub fn error_text(&self) -> Option<&str> {
        self.error_message.as_deref().or(self.error.as_deref())
    }

    /// NPC name reported in the agent metadata.
    pub fn npc_name(&self) -> Option<&str> {
        self.metadata
            .get("npc_name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
    }
}

/// Verdict of a prompt or response validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the validated text passed.
    #[serde(default = "default_approved")]
    pub approved: bool,
    /// Explanation for the verdict.
    #[serde(default)]
    pub reason: Option<String>,
    /// Alternatives the player could try instead.
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggestions: Vec<String>,
}

fn default_approved() -> bool {
    true
}

/// Full multi-agent response to a submitted turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    /// Turn number within the session.
    #[serde(default)]
    pub turn_number: u32,
    /// Command the engine processed.
    #[serde(default)]
    pub player_command: Option<String>,
    /// Narrator agent output.
    #[serde(default)]
    pub narrator_output: Option<AgentOutput>,
    /// Scene planner agent output.
    #[serde(default)]
    pub scene_planner_output: Option<AgentOutput>,
    /// NPC manager agent output.
    #[serde(default)]
    pub npc_output: Option<AgentOutput>,
    /// Legacy rules referee output.
    #[serde(default)]
    pub rules_validation: Option<AgentOutput>,
    /// Validation of the player's prompt.
    #[serde(default)]
    pub user_validation: Option<ValidationResult>,
    /// Validation of the agents' response.
    #[serde(default)]
    pub agent_validation: Option<ValidationResult>,
    /// The player caught an agent breaking the rules.
    #[serde(default, deserialize_with = "null_as_default")]
    pub player_wins: bool,
    /// The player broke the rules.
    #[serde(default, deserialize_with = "null_as_default")]
    pub player_loses: bool,
    /// Turn-level metadata.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl TurnResult {
    /// Looks up a string entry in the turn metadata.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Point-in-time estimate of turn processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Completion fraction. Advisory and not monotonic.
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    /// Pipeline phase currently running.
    #[serde(default, alias = "phase")]
    pub current_phase: Option<String>,
    /// Agent currently running.
    #[serde(default)]
    pub current_agent: Option<String>,
    /// Human-readable status line.
    #[serde(default)]
    pub message: Option<String>,
}

impl ProgressSnapshot {
    /// Completion as a whole percentage in `0..=100`.
    pub fn percent(&self) -> u8 {
        let clamped = if self.progress.is_finite() {
            self.progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        (clamped * 100.0).round() as u8
    }

    /// Status text in the form `phase - agent`.
    pub fn status_line(&self) -> String {
        match (self.current_phase.as_deref(), self.current_agent.as_deref()) {
            (Some(phase), Some(agent)) => format!("{} - {}", phase, agent),
            (Some(phase), None) => phase.to_string(),
            _ => "Processing...".to_string(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_error<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(message)) if !message.is_empty() => Some(message),
        Some(Value::Bool(true)) => Some("agent error".to_string()),
        _ => None,
    })
}
