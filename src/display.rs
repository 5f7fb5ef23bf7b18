//! Display events handed to the output renderer.

use crate::engine::{AgentOutput, TurnResult, ValidationResult};
use crate::outcome::{Correction, Outcome};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

/// Notice shown once a game has ended.
pub const GAME_OVER_NOTICE: &str = "Game Over! Start a new game if you'd like to play again.";

/// Marker used when a win carries no agent response at all.
pub const NO_RESPONSE_MARKER: &str = "No response found in turn result";

/// Big end-of-game banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Banner {
    /// The player broke the rules.
    #[strum(to_string = "Player Loses")]
    PlayerLoses,
    /// An agent broke the rules.
    #[strum(to_string = "Player Wins")]
    PlayerWins,
}

/// One item in the ordered output stream.
///
/// `Into<&'static str>` yields the event kind, e.g. `"player_echo"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisplayEvent {
    /// Session-level message.
    System {
        /// Message text.
        content: String,
    },
    /// The command the player just submitted.
    PlayerEcho {
        /// Trimmed command.
        command: String,
    },
    /// Output of one agent.
    AgentOutput {
        /// Display name of the agent.
        agent: String,
        /// Generated text.
        content: String,
        /// Cited passage ids.
        citations: Vec<String>,
        /// Agent failure text.
        error: Option<String>,
    },
    /// End-of-game banner.
    OutcomeBanner {
        /// Which banner.
        banner: Banner,
    },
    /// Why the game ended.
    Disqualification {
        /// Explanation text.
        content: String,
        /// Alternatives for the player, if any.
        suggestions: Vec<String>,
    },
    /// Corrected narration after an agent was disqualified.
    Correction {
        /// Correction text.
        content: String,
        /// Cited passage ids.
        citations: Vec<String>,
    },
    /// Game has ended.
    GameOver {
        /// Notice text.
        content: String,
    },
    /// Verdict of a validator on a continuing turn.
    ValidationInfo {
        /// Which validator.
        title: String,
        /// Whether the text passed.
        approved: bool,
        /// Validator explanation.
        reason: Option<String>,
    },
    /// Start of a turn's results.
    TurnSeparator {
        /// Turn number reported by the engine.
        turn_number: u32,
    },
    /// A failed turn.
    Error {
        /// Error text.
        message: String,
    },
}

impl DisplayEvent {
    /// Event kind name.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Game-over notice.
    pub fn game_over() -> Self {
        Self::GameOver {
            content: GAME_OVER_NOTICE.to_string(),
        }
    }

    fn agent(agent: &str, output: &AgentOutput) -> Self {
        Self::AgentOutput {
            agent: agent.to_string(),
            content: output.content.clone(),
            citations: output.citations.clone(),
            error: output.error_text().map(str::to_string),
        }
    }

    fn validation(title: &str, validation: &ValidationResult) -> Self {
        Self::ValidationInfo {
            title: title.to_string(),
            approved: validation.approved,
            reason: validation.reason.clone(),
        }
    }
}

/// Events for a classified turn, excluding the echo and separator.
///
/// `command` is the command as submitted; it is used when the engine does not
/// echo it back.
pub fn outcome_events(result: &TurnResult, outcome: &Outcome, command: &str) -> Vec<DisplayEvent> {
    match outcome {
        Outcome::Continue => continue_events(result),
        Outcome::Lose {
            reason,
            suggestions,
        } => {
            let command = result.player_command.as_deref().unwrap_or(command);
            let mut content = format!("You're disqualified!\n\nDisqualifying Response: {}\n", command);
            if let Some(reason) = reason {
                content.push_str(&format!("Reason: {}", reason));
            }
            vec![
                DisplayEvent::OutcomeBanner {
                    banner: Banner::PlayerLoses,
                },
                DisplayEvent::Disqualification {
                    content,
                    suggestions: suggestions.clone(),
                },
                DisplayEvent::game_over(),
            ]
        }
        Outcome::Win {
            reason,
            agent_name,
            correction,
        } => {
            let mut events = vec![
                DisplayEvent::OutcomeBanner {
                    banner: Banner::PlayerWins,
                },
                DisplayEvent::Disqualification {
                    content: win_disqualification(result, agent_name, reason.as_deref()),
                    suggestions: Vec::new(),
                },
            ];
            if let Some(Correction { content, citations }) = correction {
                events.push(DisplayEvent::Correction {
                    content: content.clone(),
                    citations: citations.clone(),
                });
            }
            events.push(DisplayEvent::game_over());
            events
        }
    }
}

fn win_disqualification(result: &TurnResult, agent_name: &str, reason: Option<&str>) -> String {
    let mut content = format!("{} is disqualified!\n\n", agent_name);
    let mut found = false;
    if let Some(original) = result.metadata_str("original_agent_response") {
        content.push_str(&format!("Original Agent Response: {}\n\n", original));
        found = true;
    }
    if let Some(narrator) = result.narrator_output.as_ref().filter(|o| o.has_content()) {
        content.push_str(&format!("Narrator Response: {}\n\n", narrator.content));
        found = true;
    }
    if !found {
        content.push_str(NO_RESPONSE_MARKER);
        content.push('\n');
    }
    if let Some(reason) = reason {
        content.push_str(&format!("Reason: {}", reason));
    }
    content
}

/// Agent outputs in fixed priority order, then validator verdicts.
fn continue_events(result: &TurnResult) -> Vec<DisplayEvent> {
    let npc_name = result
        .npc_output
        .as_ref()
        .and_then(AgentOutput::npc_name)
        .unwrap_or("NPC");

    let agents = [
        ("Narrator", result.narrator_output.as_ref()),
        ("Scene Planner", result.scene_planner_output.as_ref()),
        (npc_name, result.npc_output.as_ref()),
        ("Rules Referee", result.rules_validation.as_ref()),
    ];

    let mut events: Vec<DisplayEvent> = agents
        .into_iter()
        .filter_map(|(name, output)| {
            output
                .filter(|o| o.has_content())
                .map(|o| DisplayEvent::agent(name, o))
        })
        .collect();

    if let Some(v) = &result.user_validation {
        events.push(DisplayEvent::validation("User Prompt Validation", v));
    }
    if let Some(v) = &result.agent_validation {
        events.push(DisplayEvent::validation("Agent Response Validation", v));
    }
    events
}
