use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::json;

use super::events::Event;
use super::frame::Frame;
use super::knowledge::{Knowledge, MechanicsEntry};
use super::wire::{PLAN_TOOL, STRATEGY_TOOL};

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub strategy_system: String,
    pub plan_system: String,
    pub strategy_contract: String,
    pub plan_contract: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            strategy_system: "You are a detective analyzing the mechanics of an unknown grid game. Based on what the agent has learned, identify patterns and propose one strategic goal. Do NOT repeat failed strategies.".to_string(),
            plan_system: "You are a grandmaster tactician. Given a strategic goal and the known action mechanics, produce a short, concrete sequence of actions to achieve it.".to_string(),
            strategy_contract: format!(
                "Return exactly one <tool_call> JSON block and nothing else.\n\nFormat:\n<tool_call>\n{{\"name\":\"{STRATEGY_TOOL}\",\"arguments\":{{\"hypotheses\":[\"...\"],\"goal\":\"...\"}}}}\n</tool_call>"
            ),
            plan_contract: format!(
                "Return exactly one <tool_call> JSON block and nothing else.\n\nFormat:\n<tool_call>\n{{\"name\":\"{PLAN_TOOL}\",\"arguments\":{{\"action_sequence\":[\"ACTION1\",\"ACTION3\"]}}}}\n</tool_call>"
            ),
        }
    }
}

/// Renders a grid as one line of hex digits per row (colours above 15 are written as `+`).
pub fn render_grid(frame: &Frame) -> String {
    let mut out = String::with_capacity(frame.height() * (frame.width() + 1));
    for row in &frame.grid {
        for &cell in row {
            let ch = char::from_digit(u32::from(cell), 16).unwrap_or('+');
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

pub fn build_strategy_prompt(
    cfg: &PromptConfig,
    knowledge: &Knowledge,
    recent_events: &[Event],
    frame: &Frame,
    last_failed_goal: Option<&str>,
) -> String {
    let state = json!({
        "knowledge": knowledge,
        "recent_events": recent_events,
        "score": frame.score,
        "state": frame.state.as_str(),
    });
    let state_json = serde_json::to_string_pretty(&state).unwrap_or_else(|_| "{}".to_string());

    let mut prompt = format!(
        "{}\n\n[STATE_JSON]\n{state_json}\n\n[FRAME {}x{}]\n{}",
        cfg.strategy_system,
        frame.width(),
        frame.height(),
        render_grid(frame)
    );
    if let Some(goal) = last_failed_goal {
        let _ = write!(
            prompt,
            "\n[FAILED_GOAL]\nThe previous strategic goal '{goal}' failed. Propose a DIFFERENT and more creative goal. Prioritize actions that have worked before.\n"
        );
    }
    let _ = write!(prompt, "\n[CONTRACT]\n{}\n", cfg.strategy_contract);
    prompt
}

pub fn build_plan_prompt(
    cfg: &PromptConfig,
    goal: &str,
    mechanics: &BTreeMap<String, MechanicsEntry>,
    valid_actions: &[&str],
) -> String {
    let mechanics_json =
        serde_json::to_string_pretty(mechanics).unwrap_or_else(|_| "{}".to_string());

    format!(
        "{}\n\n[GOAL]\n{goal}\n\n[MECHANICS_JSON]\n{mechanics_json}\n\n[ALLOWED_ACTIONS]\nYou can ONLY use actions from this list: {}\n\n[CONTRACT]\n{}\n",
        cfg.plan_system,
        valid_actions.join(", "),
        cfg.plan_contract
    )
}
