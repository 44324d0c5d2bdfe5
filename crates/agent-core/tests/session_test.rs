use std::sync::Mutex;

use grid_agent_core::agent::reasoning::{BoxFuture, LlmClient};
use grid_agent_core::agent::{
    AgentLoop, FileBrainStore, Frame, GameAction, GameApi, GameState, LlmReasoner, Phase,
    ReasonerConfig, TurnAction, run_session,
};
use grid_agent_core::config::AgentConfig;

/// Tiny game: ACTION1 paints the next cell of the top row and scores a point.
/// Three points win. Every other action does nothing.
struct PaintGame {
    state: Mutex<Frame>,
    submitted: Mutex<Vec<GameAction>>,
}

impl PaintGame {
    fn new() -> Self {
        Self {
            state: Mutex::new(Frame::default()),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

impl GameApi for PaintGame {
    fn observe<'a>(&'a self) -> BoxFuture<'a, anyhow::Result<Frame>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().clone()) })
    }

    fn submit<'a>(&'a self, action: TurnAction) -> BoxFuture<'a, anyhow::Result<Frame>> {
        Box::pin(async move {
            self.submitted.lock().unwrap().push(action.action);
            let mut frame = self.state.lock().unwrap();
            match action.action {
                GameAction::Reset => {
                    frame.grid = vec![vec![0; 8]; 8];
                    frame.score = 0;
                    frame.state = GameState::NotFinished;
                }
                GameAction::Action1 => {
                    let col = frame.score as usize;
                    frame.grid[0][col] = 4;
                    frame.score += 1;
                    if frame.score >= 3 {
                        frame.state = GameState::Win;
                    }
                }
                _ => {}
            }
            Ok(frame.clone())
        })
    }
}

/// Answers strategy prompts with a fixed goal and plan prompts with three paints.
#[derive(Default)]
struct ScriptedLlm {
    prompts: Mutex<Vec<String>>,
}

impl LlmClient for ScriptedLlm {
    fn complete<'a>(&'a self, prompt: String) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            let reply = if prompt.contains("[ALLOWED_ACTIONS]") {
                "<tool_call>{\"name\":\"submit_plan\",\"arguments\":{\"action_sequence\":[\"ACTION1\",\"ACTION1\",\"ACTION1\"]}}</tool_call>"
            } else {
                "Thinking...\n<tool_call>{\"name\":\"submit_goal_and_hypotheses\",\"arguments\":{\"hypotheses\":[\"ACTION1 paints the top row\"],\"goal\":\"paint the top row\"}}</tool_call>"
            };
            self.prompts.lock().unwrap().push(prompt);
            Ok(reply.to_string())
        })
    }
}

fn config() -> AgentConfig {
    AgentConfig {
        rng_seed: Some(42),
        ..AgentConfig::default()
    }
}

#[tokio::test]
async fn agent_wins_paint_game_and_remembers_it() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let game = PaintGame::new();
    let reasoner = LlmReasoner::new(ScriptedLlm::default(), ReasonerConfig::default());

    let mut agent = AgentLoop::new(
        "paint-1",
        config(),
        Box::new(FileBrainStore::new(dir.path())),
    );
    let report = run_session(&mut agent, &game, &reasoner).await?;

    assert_eq!(report.final_state, GameState::Win);
    assert_eq!(report.final_score, 3);
    assert_eq!(report.actions, 4);
    assert_eq!(
        *game.submitted.lock().unwrap(),
        vec![
            GameAction::Reset,
            GameAction::Action1,
            GameAction::Action1,
            GameAction::Action1,
        ]
    );
    assert_eq!(agent.phase(), Phase::Execution);

    // Reopen the same game: mechanics and strategy come back from disk.
    let resumed = AgentLoop::new(
        "paint-1",
        config(),
        Box::new(FileBrainStore::new(dir.path())),
    );
    let knowledge = resumed.knowledge();
    assert_eq!(knowledge.tries("ACTION1"), 2);
    assert_eq!(knowledge.mechanics["ACTION1"].successes, 2);
    assert_eq!(knowledge.strategy.current_goal, "paint the top row");
    assert_eq!(resumed.phase(), Phase::Starting);
    assert!(resumed.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn resumed_agent_still_resets_first() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = FileBrainStore::new(dir.path());
    {
        let mut agent = AgentLoop::new("paint-2", config(), Box::new(store.clone()));
        let game = PaintGame::new();
        let reasoner = LlmReasoner::new(ScriptedLlm::default(), ReasonerConfig::default());
        run_session(&mut agent, &game, &reasoner).await?;
    }

    let mut agent = AgentLoop::new("paint-2", config(), Box::new(store));
    let reasoner = LlmReasoner::new(ScriptedLlm::default(), ReasonerConfig::default());
    let out = agent.choose_action(&reasoner, &Frame::default()).await;
    assert_eq!(out.action, GameAction::Reset);
    assert_eq!(agent.phase(), Phase::Exploration);
    Ok(())
}
