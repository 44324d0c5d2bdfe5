use anyhow::Context;
use tracing::{info, warn};

use super::frame::{Frame, GameState};
use super::game_api::GameApi;
use super::r#loop::AgentLoop;
use super::reasoning::Reasoner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub actions: u32,
    pub final_state: GameState,
    pub final_score: i64,
    pub events: usize,
}

/// One turn: ask the agent for an action and submit it. Returns the resulting frame.
pub async fn tick(
    agent: &mut AgentLoop,
    api: &dyn GameApi,
    reasoner: &dyn Reasoner,
    latest: &Frame,
) -> anyhow::Result<Frame> {
    let turn = agent.choose_action(reasoner, latest).await;
    let action = turn.action;
    api.submit(turn)
        .await
        .with_context(|| format!("submit {action} (turn {})", agent.action_counter()))
}

/// Drives one game until the agent reports it is done.
///
/// Knowledge is persisted exactly once, whether the session ends normally or the game API
/// fails mid-way.
pub async fn run_session(
    agent: &mut AgentLoop,
    api: &dyn GameApi,
    reasoner: &dyn Reasoner,
) -> anyhow::Result<SessionReport> {
    let result = drive(agent, api, reasoner).await;
    if let Err(err) = &result {
        warn!(game_id = %agent.game_id(), "session aborted: {err:#}");
    }
    agent.cleanup();
    result
}

async fn drive(
    agent: &mut AgentLoop,
    api: &dyn GameApi,
    reasoner: &dyn Reasoner,
) -> anyhow::Result<SessionReport> {
    let mut frame = api.observe().await.context("initial observe")?;
    info!(game_id = %agent.game_id(), state = frame.state.as_str(), "session started");

    while !agent.is_done(&frame) {
        frame = tick(agent, api, reasoner, &frame).await?;
    }

    let report = SessionReport {
        actions: agent.action_counter(),
        final_state: frame.state,
        final_score: frame.score,
        events: agent.events().len(),
    };
    info!(
        game_id = %agent.game_id(),
        actions = report.actions,
        state = report.final_state.as_str(),
        score = report.final_score,
        "session finished"
    );
    Ok(report)
}
