//! Terminal/non-terminal classification of turn results.
//!
//! The engine reports two independent flags. A turn where the player broke the
//! rules is a loss; a turn where an agent broke the rules is a win for the
//! player. Both flags set is treated as a loss.

use crate::engine::{AgentOutput, TurnResult};
use serde::{Deserialize, Serialize};

/// Agent name used when nothing better is known.
pub const DEFAULT_AGENT_NAME: &str = "Agent";

/// Agent name used when only the narrator responded.
pub const NARRATOR_NAME: &str = "Narrator";

/// Corrective text shown after a win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// Correction text.
    pub content: String,
    /// Passages cited by the correction.
    pub citations: Vec<String>,
}

/// Classification of one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Play continues.
    Continue,
    /// The player's command was disqualified.
    Lose {
        /// Validator explanation.
        reason: Option<String>,
        /// Commands the player could have tried instead.
        suggestions: Vec<String>,
    },
    /// An agent's response was disqualified.
    Win {
        /// Validator explanation.
        reason: Option<String>,
        /// Agent held responsible.
        agent_name: String,
        /// Corrective text, if the engine produced any.
        correction: Option<Correction>,
    },
}

impl Outcome {
    /// Builds a loss.
    pub fn lose(reason: Option<String>, suggestions: Vec<String>) -> Self {
        Self::Lose {
            reason,
            suggestions,
        }
    }

    /// Builds a win.
    pub fn win(
        reason: Option<String>,
        agent_name: impl Into<String>,
        correction: Option<Correction>,
    ) -> Self {
        Self::Win {
            reason,
            agent_name: agent_name.into(),
            correction,
        }
    }

    /// True for `Win` and `Lose`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue)
    }
}

/// Classifies a turn result.
pub fn classify(result: &TurnResult) -> Outcome {
    if result.player_loses {
        let (reason, suggestions) = match &result.user_validation {
            Some(v) => (non_blank(v.reason.as_deref()), v.suggestions.clone()),
            None => (None, Vec::new()),
        };
        Outcome::lose(reason, suggestions)
    } else if result.player_wins {
        let reason = result
            .agent_validation
            .as_ref()
            .and_then(|v| non_blank(v.reason.as_deref()));
        Outcome::win(reason, resolve_agent_name(result), correction_for(result))
    } else {
        Outcome::Continue
    }
}

/// NPC metadata name, then the narrator, then the generic default.
pub fn resolve_agent_name(result: &TurnResult) -> String {
    if let Some(name) = result.npc_output.as_ref().and_then(AgentOutput::npc_name) {
        name.to_string()
    } else if result.narrator_output.is_some() {
        NARRATOR_NAME.to_string()
    } else {
        DEFAULT_AGENT_NAME.to_string()
    }
}

/// Narrator content with its citations, else the metadata disqualification
/// reason, else nothing.
fn correction_for(result: &TurnResult) -> Option<Correction> {
    if let Some(narrator) = result.narrator_output.as_ref().filter(|o| o.has_content()) {
        return Some(Correction {
            content: narrator.content.clone(),
            citations: narrator.citations.clone(),
        });
    }
    result
        .metadata_str("disqualification_reason")
        .map(|reason| Correction {
            content: reason.to_string(),
            citations: Vec::new(),
        })
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
