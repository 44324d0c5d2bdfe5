use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::action::{GameAction, TurnAction};
use super::events::{Event, EventLog};
use super::explore::Explorer;
use super::frame::{Frame, GameState};
use super::knowledge::{Knowledge, KnowledgeStore};
use super::perception::detect_delta;
use super::persist::BrainStore;
use super::reasoning::{
    PlanRequest, Reasoner, StrategyProposal, StrategyRequest, format_reasoning,
};
use crate::config::AgentConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Optional one-shot reasoning pass over the first screen.
    VisualAnalysis,
    /// Next action is a RESET.
    Starting,
    /// No working theory yet; try actions one by one.
    Exploration,
    /// Something reacted; ask for a strategy and a plan.
    Investigation,
    /// Working through (or re-planning after) a plan.
    Execution,
}

impl Phase {
    fn wants_strategy(self) -> bool {
        matches!(self, Phase::Investigation | Phase::Execution)
    }
}

/// Per-game control loop. Owns all session state: knowledge, events, phase and plan.
///
/// The harness calls [`AgentLoop::choose_action`] once per turn and [`AgentLoop::cleanup`]
/// when [`AgentLoop::is_done`] says the session is over.
pub struct AgentLoop {
    game_id: String,
    cfg: AgentConfig,
    store: Box<dyn BrainStore>,
    knowledge: KnowledgeStore,
    events: EventLog,
    explorer: Explorer,
    phase: Phase,
    plan: VecDeque<GameAction>,
    goal_history: VecDeque<String>,
    last_frame: Option<Frame>,
    last_action: Option<GameAction>,
    action_counter: u32,
    frustration: u32,
    last_failed_goal: Option<String>,
    cleaned_up: bool,
}

impl AgentLoop {
    /// Creates the loop for `game_id`, rehydrating whatever knowledge `store` holds for it.
    pub fn new(game_id: impl Into<String>, cfg: AgentConfig, store: Box<dyn BrainStore>) -> Self {
        let game_id = game_id.into();
        let knowledge = KnowledgeStore::from_knowledge(store.load(&game_id));
        if !knowledge.summary().is_empty() {
            info!(
                game_id = %game_id,
                known_actions = knowledge.summary().mechanics.len(),
                goal = %knowledge.current_goal(),
                "resuming with prior knowledge"
            );
        }
        let explorer = Explorer::new(cfg.grid_size, cfg.rng_seed);
        let phase = if cfg.visual_analysis {
            Phase::VisualAnalysis
        } else {
            Phase::Starting
        };

        Self {
            game_id,
            cfg,
            store,
            knowledge,
            events: EventLog::default(),
            explorer,
            phase,
            plan: VecDeque::new(),
            goal_history: VecDeque::new(),
            last_frame: None,
            last_action: None,
            action_counter: 0,
            frustration: 0,
            last_failed_goal: None,
            cleaned_up: false,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn knowledge(&self) -> &Knowledge {
        self.knowledge.summary()
    }

    pub fn events(&self) -> &[Event] {
        self.events.full_history()
    }

    pub fn plan_len(&self) -> usize {
        self.plan.len()
    }

    pub fn action_counter(&self) -> u32 {
        self.action_counter
    }

    pub fn frustration(&self) -> u32 {
        self.frustration
    }

    pub fn goal_history(&self) -> impl Iterator<Item = &str> {
        self.goal_history.iter().map(String::as_str)
    }

    pub fn is_done(&self, latest: &Frame) -> bool {
        latest.state == GameState::Win || self.action_counter >= self.cfg.max_actions
    }

    /// Picks this turn's action. Always returns exactly one action; collaborator failures
    /// degrade to exploration.
    pub async fn choose_action(&mut self, reasoner: &dyn Reasoner, latest: &Frame) -> TurnAction {
        self.action_counter = self.action_counter.saturating_add(1);

        if !latest.has_grid() {
            warn!(game_id = %self.game_id, "empty frame received, re-syncing with RESET");
            self.phase = Phase::Starting;
        }

        let mut reasoning = None;
        if self.phase == Phase::VisualAnalysis {
            reasoning = self.analyze_initial_screen(reasoner, latest).await;
            self.phase = Phase::Starting;
        }

        if self.phase == Phase::Starting {
            info!(game_id = %self.game_id, "STARTING: sending RESET");
            self.phase = Phase::Exploration;
            return self.emit(latest, GameAction::Reset, reasoning);
        }

        self.observe(latest);

        if self.plan.is_empty() {
            reasoning = self.replan(reasoner, latest).await;
        }

        let action = match self.plan.pop_front() {
            Some(action) => {
                if self.plan.is_empty() {
                    // Come back through replanning next time the loop has no plan.
                    self.phase = if self.knowledge.has_goal() {
                        Phase::Execution
                    } else {
                        Phase::Investigation
                    };
                    debug!(phase = ?self.phase, "plan exhausted");
                }
                action
            }
            None => self.explorer.next_action(self.knowledge.summary()),
        };

        self.emit(latest, action, reasoning)
    }

    /// Persists knowledge and the raw event log. Only the first call writes.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        info!(
            game_id = %self.game_id,
            events = self.events.len(),
            actions = self.action_counter,
            clicks = self.explorer.click_attempts(),
            "session over, saving brain"
        );
        self.store.save(
            &self.game_id,
            self.knowledge.summary(),
            self.events.full_history(),
        );
    }

    /// Records the effect of last turn's action against `latest`.
    fn observe(&mut self, latest: &Frame) {
        let (Some(prev), Some(action)) = (self.last_frame.as_ref(), self.last_action) else {
            return;
        };
        if !prev.has_grid() {
            return;
        }

        let event = self.events.record(&action, detect_delta(prev, latest));
        self.knowledge.update_mechanics_from_event(event);
        let success = event.success;
        debug!(
            turn = event.turn,
            action = %event.action.name,
            pixels = event.effect_delta.pixels_changed,
            score = event.effect_delta.score_change,
            success,
            "event recorded"
        );

        if !success && self.phase == Phase::Execution {
            self.frustration = self.frustration.saturating_add(1);
            self.last_failed_goal = Some(self.knowledge.current_goal().to_string());
            self.plan.clear();
            warn!(frustration = self.frustration, "action had no effect, plan invalidated");
        } else {
            self.frustration = 0;
            self.last_failed_goal = None;
        }

        if success && self.phase == Phase::Exploration {
            info!(action = %action, "exploration found an effect, investigating");
            self.phase = Phase::Investigation;
            self.plan.clear();
        }
    }

    /// Runs the no-plan branch of a turn. Returns the reasoning annotation when a strategy
    /// was adopted.
    async fn replan(&mut self, reasoner: &dyn Reasoner, latest: &Frame) -> Option<String> {
        if self.frustration >= self.cfg.frustration_threshold {
            warn!(game_id = %self.game_id, "agent frustrated, forcing re-exploration");
            self.phase = Phase::Exploration;
            self.frustration = 0;
        }

        if self.phase.wants_strategy() && self.is_bored() {
            warn!(
                goal = %self.knowledge.current_goal(),
                "same goal proposed {} times in a row, back to exploration",
                self.goal_history.len()
            );
            self.phase = Phase::Exploration;
            self.goal_history.clear();
        }

        if !self.phase.wants_strategy() {
            return None;
        }

        info!(phase = ?self.phase, "requesting strategy");
        let reasoning = self.adopt_strategy(reasoner, latest, true).await;
        self.plan = self.request_plan(reasoner).await;
        self.phase = if self.plan.is_empty() {
            info!("no usable plan, falling back to exploration");
            Phase::Exploration
        } else {
            info!(steps = self.plan.len(), "executing plan");
            Phase::Execution
        };
        Some(reasoning)
    }

    async fn analyze_initial_screen(
        &mut self,
        reasoner: &dyn Reasoner,
        frame: &Frame,
    ) -> Option<String> {
        info!(game_id = %self.game_id, "VISUAL_ANALYSIS: reasoning over the initial screen");
        let reasoning = self.adopt_strategy(reasoner, frame, false).await;
        self.plan = self.request_plan(reasoner).await;
        Some(reasoning)
    }

    /// Asks for a strategy and replaces the strategic model with it. A failed call adopts
    /// [`StrategyProposal::fallback`] instead, so repeated failures still count towards boredom.
    async fn adopt_strategy(
        &mut self,
        reasoner: &dyn Reasoner,
        frame: &Frame,
        with_history: bool,
    ) -> String {
        let recent_events: &[Event] = if with_history {
            self.events.recent_history(self.cfg.recent_window)
        } else {
            &[]
        };
        let req = StrategyRequest {
            knowledge: self.knowledge.summary(),
            recent_events,
            frame,
            last_failed_goal: self.last_failed_goal.as_deref(),
        };

        let proposal = match reasoner.propose_strategy(req).await {
            Ok(proposal) => proposal,
            Err(err) => {
                warn!(game_id = %self.game_id, "strategy call failed, using fallback goal: {err}");
                StrategyProposal::fallback()
            }
        };

        let reasoning = format_reasoning(&proposal.goal, &proposal.hypotheses);
        self.remember_goal(proposal.goal.clone());
        self.knowledge
            .update_strategic_model(proposal.hypotheses, proposal.goal);
        reasoning
    }

    /// Requests a plan for the current goal, keeping only recognised discrete actions.
    async fn request_plan(&self, reasoner: &dyn Reasoner) -> VecDeque<GameAction> {
        let valid_actions = GameAction::discrete_names();
        let req = PlanRequest {
            goal: self.knowledge.current_goal(),
            mechanics: &self.knowledge.summary().mechanics,
            valid_actions: &valid_actions,
        };

        let raw = match reasoner.synthesize_plan(req).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(game_id = %self.game_id, "plan call failed: {err}");
                Vec::new()
            }
        };

        let plan: VecDeque<GameAction> = raw
            .iter()
            .filter_map(|name| GameAction::from_name(name))
            .collect();
        if plan.len() < raw.len() {
            debug!(dropped = raw.len() - plan.len(), "dropped invalid plan entries");
        }
        plan
    }

    fn remember_goal(&mut self, goal: String) {
        let cap = self.cfg.boredom_threshold.max(1);
        self.goal_history.push_back(goal);
        while self.goal_history.len() > cap {
            self.goal_history.pop_front();
        }
    }

    fn is_bored(&self) -> bool {
        let threshold = self.cfg.boredom_threshold;
        if threshold == 0 || self.goal_history.len() < threshold {
            return false;
        }
        let mut recent = self.goal_history.iter().rev().take(threshold);
        let Some(first) = recent.next() else {
            return false;
        };
        recent.all(|g| g == first)
    }

    fn emit(&mut self, frame: &Frame, action: GameAction, reasoning: Option<String>) -> TurnAction {
        debug!(
            turn = self.action_counter,
            phase = ?self.phase,
            %action,
            "action chosen"
        );
        self.last_frame = Some(frame.clone());
        self.last_action = Some(action);
        TurnAction { action, reasoning }
    }
}
