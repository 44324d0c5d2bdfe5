use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOOL_CALL_START: &str = "<tool_call>";
pub const TOOL_CALL_END: &str = "</tool_call>";

pub const STRATEGY_TOOL: &str = "submit_goal_and_hypotheses";
pub const PLAN_TOOL: &str = "submit_plan";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolCallWire {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyParseError {
    #[error("missing <tool_call> block")]
    MissingToolCallBlock,
    #[error("multiple <tool_call> blocks")]
    MultipleToolCallBlocks,
    #[error("invalid tool call json")]
    InvalidJson,
    #[error("unexpected tool name: {0}")]
    UnexpectedToolName(String),
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StrategyArgs {
    #[serde(default)]
    pub hypotheses: Vec<String>,
    pub goal: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlanArgs {
    pub action_sequence: Vec<String>,
}

/// Extracts the JSON inside the single `<tool_call>...</tool_call>` block of a reply.
pub fn extract_tool_call_json(reply: &str) -> Result<String, ReplyParseError> {
    let start = reply
        .find(TOOL_CALL_START)
        .ok_or(ReplyParseError::MissingToolCallBlock)?
        + TOOL_CALL_START.len();
    let rest = &reply[start..];
    let end = start
        + rest
            .find(TOOL_CALL_END)
            .ok_or(ReplyParseError::MissingToolCallBlock)?;

    // More than one block is ambiguous; reject it rather than guess.
    if reply[end + TOOL_CALL_END.len()..].contains(TOOL_CALL_START) {
        return Err(ReplyParseError::MultipleToolCallBlocks);
    }

    Ok(reply[start..end].trim().to_string())
}

fn parse_tool_args<T: for<'de> Deserialize<'de>>(
    reply: &str,
    expected_tool: &'static str,
) -> Result<T, ReplyParseError> {
    let json_str = extract_tool_call_json(reply)?;
    let wire: ToolCallWire =
        serde_json::from_str(&json_str).map_err(|_| ReplyParseError::InvalidJson)?;

    let name = wire.name.trim().to_ascii_lowercase();
    if name != expected_tool {
        return Err(ReplyParseError::UnexpectedToolName(name));
    }

    serde_json::from_value::<T>(wire.arguments)
        .map_err(|e| ReplyParseError::InvalidArguments(format!("{expected_tool}: {e}")))
}

/// Parses a strategy reply. Blank goals are rejected; blank hypotheses are dropped.
pub fn parse_strategy_reply(reply: &str) -> Result<StrategyArgs, ReplyParseError> {
    let mut args = parse_tool_args::<StrategyArgs>(reply, STRATEGY_TOOL)?;
    args.goal = args.goal.trim().to_string();
    if args.goal.is_empty() {
        return Err(ReplyParseError::InvalidArguments(format!(
            "{STRATEGY_TOOL}: goal must be non-empty"
        )));
    }
    args.hypotheses = args
        .hypotheses
        .into_iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();
    Ok(args)
}

/// Parses a plan reply into raw action identifiers. Validation against the action set is
/// the caller's job.
pub fn parse_plan_reply(reply: &str) -> Result<Vec<String>, ReplyParseError> {
    let args = parse_tool_args::<PlanArgs>(reply, PLAN_TOOL)?;
    Ok(args
        .action_sequence
        .into_iter()
        .map(|a| a.trim().to_string())
        .collect())
}
