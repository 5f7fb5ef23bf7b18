//! Plain-text rendering of display events for terminals.

use crate::display::DisplayEvent;
use crate::engine::ProgressSnapshot;

/// Formats one display event as terminal text.
pub fn render_event(event: &DisplayEvent) -> String {
    match event {
        DisplayEvent::System { content } => format!("[system] {}", content),
        DisplayEvent::PlayerEcho { command } => format!("> {}", command),
        DisplayEvent::AgentOutput {
            agent,
            content,
            citations,
            error,
        } => {
            let mut out = format!("{}:\n{}{}", agent, content, sources(citations));
            if let Some(error) = error {
                out.push_str(&format!("\n  (agent error: {})", error));
            }
            out
        }
        DisplayEvent::OutcomeBanner { banner } => format!("*** {}! ***", banner),
        DisplayEvent::Disqualification {
            content,
            suggestions,
        } => {
            let mut out = content.clone();
            if !suggestions.is_empty() {
                out.push_str("\nTry instead:");
                for s in suggestions {
                    out.push_str(&format!("\n  - {}", s));
                }
            }
            out
        }
        DisplayEvent::Correction { content, citations } => {
            format!("Correction:\n{}{}", content, sources(citations))
        }
        DisplayEvent::GameOver { content } => content.clone(),
        DisplayEvent::ValidationInfo {
            title,
            approved,
            reason,
        } => {
            let verdict = if *approved { "Approved" } else { "Rejected" };
            match reason {
                Some(reason) => format!("[{}] {}: {}", title, verdict, reason),
                None => format!("[{}] {}", title, verdict),
            }
        }
        DisplayEvent::TurnSeparator { turn_number } => format!("---- Turn {} ----", turn_number),
        DisplayEvent::Error { message } => format!("[error] {}", message),
    }
}

fn sources(citations: &[String]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let cited: Vec<String> = citations.iter().map(|c| format!("passage_{}", c)).collect();
    format!("\n  (sources: {})", cited.join(", "))
}

/// One-line progress indicator, e.g. `[ 40%] retrieval - narrator`.
pub fn render_progress(snapshot: &ProgressSnapshot) -> String {
    format!("[{:>3}%] {}", snapshot.percent(), snapshot.status_line())
}
