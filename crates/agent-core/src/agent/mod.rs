//! Grid-game agent: perception, event log, knowledge, exploration and the phase-driven
//! control loop.
//!
//! The loop talks to the outside world through two seams: [`GameApi`] for frames and
//! actions, and [`Reasoner`] for strategy and plan proposals. Everything else is owned by
//! one [`AgentLoop`] per game.

pub mod action;
pub mod events;
pub mod explore;
pub mod frame;
pub mod game_api;
pub mod harness;
pub mod knowledge;
pub mod r#loop;
pub mod perception;
pub mod persist;
pub mod prompt;
pub mod reasoning;
pub mod wire;

pub use action::{ActionRecord, ClickData, GameAction, TurnAction};
pub use events::{Event, EventLog};
pub use frame::{Frame, GameState, Grid};
pub use game_api::GameApi;
pub use harness::{SessionReport, run_session};
pub use knowledge::{Knowledge, KnowledgeStore};
pub use r#loop::{AgentLoop, Phase};
pub use perception::{Delta, detect_delta};
pub use persist::{BrainStore, FileBrainStore};
pub use reasoning::{LlmClient, LlmReasoner, Reasoner, ReasonerConfig, ReasoningError};
