//! Seam to the external reasoning collaborator.
//!
//! The control loop only sees [`Reasoner`]. Every failure (transport, timeout, malformed
//! reply) comes back as a [`ReasoningError`] which the loop turns into its fallback; nothing
//! here is allowed to abort a turn.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use super::events::Event;
use super::frame::Frame;
use super::knowledge::{Knowledge, MechanicsEntry};
use super::prompt::{PromptConfig, build_plan_prompt, build_strategy_prompt};
use super::wire::{ReplyParseError, parse_plan_reply, parse_strategy_reply};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Goal used when no strategy could be obtained.
pub const FALLBACK_GOAL: &str = "explore randomly";

pub trait LlmClient: Send + Sync {
    fn complete<'a>(&'a self, prompt: String) -> BoxFuture<'a, anyhow::Result<String>>;
}

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("reasoning call timed out after {0:?}")]
    Timeout(Duration),
    #[error("llm call failed: {0:#}")]
    Llm(anyhow::Error),
    #[error("malformed reply: {0}")]
    Reply(#[from] ReplyParseError),
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyRequest<'a> {
    pub knowledge: &'a Knowledge,
    /// Bounded window of the latest events.
    pub recent_events: &'a [Event],
    pub frame: &'a Frame,
    /// Goal that was abandoned after repeated no-op actions, if any.
    pub last_failed_goal: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyProposal {
    pub hypotheses: Vec<String>,
    pub goal: String,
}

impl StrategyProposal {
    pub fn fallback() -> Self {
        Self {
            hypotheses: Vec::new(),
            goal: FALLBACK_GOAL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub goal: &'a str,
    pub mechanics: &'a BTreeMap<String, MechanicsEntry>,
    pub valid_actions: &'a [&'a str],
}

pub trait Reasoner: Send + Sync {
    fn propose_strategy<'a>(
        &'a self,
        req: StrategyRequest<'a>,
    ) -> BoxFuture<'a, Result<StrategyProposal, ReasoningError>>;

    fn synthesize_plan<'a>(
        &'a self,
        req: PlanRequest<'a>,
    ) -> BoxFuture<'a, Result<Vec<String>, ReasoningError>>;
}

/// Human-readable summary of the current strategy, attached to the emitted action for replays.
pub fn format_reasoning(goal: &str, hypotheses: &[String]) -> String {
    let v = json!({
        "Strategic Goal": goal,
        "Supporting Hypotheses": hypotheses,
    });
    serde_json::to_string_pretty(&v).unwrap_or_else(|_| goal.to_string())
}

#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    pub prompts: PromptConfig,
    /// Upper bound for one LLM round-trip. A stuck call would otherwise block the turn.
    pub timeout: Duration,
    /// Re-prompt once with a repair instruction when the reply can't be parsed.
    pub enable_repair: bool,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            prompts: PromptConfig::default(),
            timeout: Duration::from_secs(30),
            enable_repair: true,
        }
    }
}

const REPAIR_INSTRUCTION: &str = "Your previous response was invalid.\nReturn exactly one <tool_call>...</tool_call> block and nothing else.\nThe JSON must be an object with keys: name, arguments.\n";

/// [`Reasoner`] backed by a text-completion LLM speaking the `<tool_call>` contract.
pub struct LlmReasoner<C> {
    client: C,
    cfg: ReasonerConfig,
}

impl<C: LlmClient> LlmReasoner<C> {
    pub fn new(client: C, cfg: ReasonerConfig) -> Self {
        Self { client, cfg }
    }

    async fn complete(&self, prompt: String) -> Result<String, ReasoningError> {
        match tokio::time::timeout(self.cfg.timeout, self.client.complete(prompt)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(err)) => Err(ReasoningError::Llm(err)),
            Err(_) => Err(ReasoningError::Timeout(self.cfg.timeout)),
        }
    }

    /// Sends `prompt` and parses the reply, repairing once if allowed.
    async fn ask<T>(
        &self,
        prompt: String,
        parse: fn(&str) -> Result<T, ReplyParseError>,
    ) -> Result<T, ReasoningError> {
        let raw = self.complete(prompt.clone()).await?;
        let err = match parse(&raw) {
            Ok(parsed) => return Ok(parsed),
            Err(err) => err,
        };
        if !self.cfg.enable_repair {
            return Err(err.into());
        }

        warn!("reply unparseable ({err}), sending repair prompt");
        let repair_prompt =
            format!("{prompt}\n\n[REPAIR]\n{REPAIR_INSTRUCTION}\n[INVALID_OUTPUT]\n{raw}\n");
        let repaired = self.complete(repair_prompt).await?;
        Ok(parse(&repaired)?)
    }
}

impl<C: LlmClient> Reasoner for LlmReasoner<C> {
    fn propose_strategy<'a>(
        &'a self,
        req: StrategyRequest<'a>,
    ) -> BoxFuture<'a, Result<StrategyProposal, ReasoningError>> {
        Box::pin(async move {
            let prompt = build_strategy_prompt(
                &self.cfg.prompts,
                req.knowledge,
                req.recent_events,
                req.frame,
                req.last_failed_goal,
            );
            let args = self.ask(prompt, parse_strategy_reply).await?;
            info!(goal = %args.goal, hypotheses = args.hypotheses.len(), "strategy proposed");
            Ok(StrategyProposal {
                hypotheses: args.hypotheses,
                goal: args.goal,
            })
        })
    }

    fn synthesize_plan<'a>(
        &'a self,
        req: PlanRequest<'a>,
    ) -> BoxFuture<'a, Result<Vec<String>, ReasoningError>> {
        Box::pin(async move {
            let prompt =
                build_plan_prompt(&self.cfg.prompts, req.goal, req.mechanics, req.valid_actions);
            let plan = self.ask(prompt, parse_plan_reply).await?;
            info!(?plan, "plan synthesized");
            Ok(plan)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::agent::frame::GameState;

    #[derive(Default)]
    struct FakeLlm {
        responses: Mutex<VecDeque<anyhow::Result<String>>>,
        prompts: Mutex<Vec<String>>,
        hang: bool,
    }

    impl FakeLlm {
        fn push_response(&self, raw: impl Into<String>) {
            self.responses.lock().unwrap().push_back(Ok(raw.into()));
        }

        fn push_error(&self, msg: &'static str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(anyhow::anyhow!(msg)));
        }

        fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl LlmClient for FakeLlm {
        fn complete<'a>(&'a self, prompt: String) -> BoxFuture<'a, anyhow::Result<String>> {
            Box::pin(async move {
                self.prompts.lock().unwrap().push(prompt);
                if self.hang {
                    std::future::pending::<()>().await;
                }
                self.responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| anyhow::bail!("no llm response queued"))
            })
        }
    }

    fn frame() -> Frame {
        Frame {
            guid: "f".into(),
            grid: vec![vec![0; 4]; 4],
            score: 0,
            state: GameState::NotFinished,
        }
    }

    const STRATEGY_OK: &str = "<tool_call>{\"name\":\"submit_goal_and_hypotheses\",\"arguments\":{\"hypotheses\":[\"ACTION1 moves the cursor\"],\"goal\":\"move cursor to the red cell\"}}</tool_call>";

    #[tokio::test]
    async fn strategy_is_parsed_from_tool_call() {
        let llm = FakeLlm::default();
        llm.push_response(STRATEGY_OK);
        let reasoner = LlmReasoner::new(llm, ReasonerConfig::default());
        let k = Knowledge::default();
        let f = frame();

        let got = reasoner
            .propose_strategy(StrategyRequest {
                knowledge: &k,
                recent_events: &[],
                frame: &f,
                last_failed_goal: None,
            })
            .await
            .unwrap();
        assert_eq!(got.goal, "move cursor to the red cell");
        assert_eq!(got.hypotheses.len(), 1);
    }

    #[tokio::test]
    async fn repair_is_one_shot() {
        let llm = FakeLlm::default();
        llm.push_response("sure, here is my plan: ACTION1");
        llm.push_response(
            "<tool_call>{\"name\":\"submit_plan\",\"arguments\":{\"action_sequence\":[\"ACTION1\"]}}</tool_call>",
        );
        let reasoner = LlmReasoner::new(llm, ReasonerConfig::default());
        let mechanics = BTreeMap::new();

        let plan = reasoner
            .synthesize_plan(PlanRequest {
                goal: "g",
                mechanics: &mechanics,
                valid_actions: &["ACTION1"],
            })
            .await
            .unwrap();
        assert_eq!(plan, vec!["ACTION1".to_string()]);
        assert_eq!(reasoner.client.prompt_count(), 2);
        assert!(reasoner.client.prompts.lock().unwrap()[1].contains("[REPAIR]"));
    }

    #[tokio::test]
    async fn malformed_reply_without_repair_is_reply_error() {
        let llm = FakeLlm::default();
        llm.push_response("nope");
        let cfg = ReasonerConfig {
            enable_repair: false,
            ..ReasonerConfig::default()
        };
        let reasoner = LlmReasoner::new(llm, cfg);
        let mechanics = BTreeMap::new();

        let err = reasoner
            .synthesize_plan(PlanRequest {
                goal: "g",
                mechanics: &mechanics,
                valid_actions: &["ACTION1"],
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReasoningError::Reply(ReplyParseError::MissingToolCallBlock)
        ));
        assert_eq!(reasoner.client.prompt_count(), 1);
    }

    #[tokio::test]
    async fn transport_errors_surface_as_llm_errors() {
        let llm = FakeLlm::default();
        llm.push_error("connection refused");
        let reasoner = LlmReasoner::new(llm, ReasonerConfig::default());
        let k = Knowledge::default();
        let f = frame();

        let err = reasoner
            .propose_strategy(StrategyRequest {
                knowledge: &k,
                recent_events: &[],
                frame: &f,
                last_failed_goal: Some("old goal"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReasoningError::Llm(_)));
        assert!(reasoner.client.prompts.lock().unwrap()[0].contains("'old goal' failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_calls_time_out() {
        let llm = FakeLlm {
            hang: true,
            ..FakeLlm::default()
        };
        let cfg = ReasonerConfig {
            timeout: Duration::from_millis(250),
            ..ReasonerConfig::default()
        };
        let reasoner = LlmReasoner::new(llm, cfg);
        let mechanics = BTreeMap::new();

        let err = reasoner
            .synthesize_plan(PlanRequest {
                goal: "g",
                mechanics: &mechanics,
                valid_actions: &["ACTION1"],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReasoningError::Timeout(_)));
    }

    #[test]
    fn reasoning_annotation_is_pretty_json() {
        let s = format_reasoning("find the key", &["walls block movement".to_string()]);
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["Strategic Goal"], "find the key");
        assert_eq!(v["Supporting Hypotheses"][0], "walls block movement");
        assert!(s.contains('\n'));
    }
}
