use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::events::Event;

/// Goal value of a strategic model that has never been updated.
pub const UNKNOWN_GOAL: &str = "Unknown";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct MechanicsEntry {
    pub tries: u32,
    pub successes: u32,
    #[serde(default)]
    pub effect_fingerprints: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StrategicModel {
    pub current_goal: String,
    #[serde(default)]
    pub hypotheses: Vec<String>,
}

impl Default for StrategicModel {
    fn default() -> Self {
        Self {
            current_goal: UNKNOWN_GOAL.to_string(),
            hypotheses: Vec::new(),
        }
    }
}

/// Everything the agent believes about one game. This is the exact payload handed to the
/// reasoning collaborator and written to the brain file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct Knowledge {
    #[serde(default)]
    pub mechanics: BTreeMap<String, MechanicsEntry>,
    #[serde(default)]
    pub strategy: StrategicModel,
}

impl Knowledge {
    pub fn is_empty(&self) -> bool {
        self.mechanics.is_empty() && self.strategy == StrategicModel::default()
    }

    pub fn tries(&self, action_name: &str) -> u32 {
        self.mechanics.get(action_name).map(|e| e.tries).unwrap_or(0)
    }
}

/// Owner of [`Knowledge`]. All mutation goes through the two update operations below, which
/// keeps `successes <= tries` and never lowers a counter.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    knowledge: Knowledge,
}

impl KnowledgeStore {
    /// Rehydrates persisted knowledge. Counters from disk are clamped back into the invariant.
    pub fn from_knowledge(mut knowledge: Knowledge) -> Self {
        for entry in knowledge.mechanics.values_mut() {
            entry.successes = entry.successes.min(entry.tries);
        }
        Self { knowledge }
    }

    pub fn update_mechanics_from_event(&mut self, event: &Event) {
        let entry = self
            .knowledge
            .mechanics
            .entry(event.action.name.clone())
            .or_default();
        entry.tries = entry.tries.saturating_add(1);
        if event.success {
            entry.successes = entry.successes.saturating_add(1).min(entry.tries);
            let fingerprint = format!("{} pixels changed.", event.effect_delta.pixels_changed);
            if entry.effect_fingerprints.insert(fingerprint) {
                debug!(action = %event.action.name, "new effect fingerprint");
            }
        }
    }

    /// Replaces goal and hypotheses wholesale. Old hypotheses are dropped, not merged.
    pub fn update_strategic_model(&mut self, hypotheses: Vec<String>, goal: impl Into<String>) {
        self.knowledge.strategy = StrategicModel {
            current_goal: goal.into(),
            hypotheses,
        };
    }

    pub fn summary(&self) -> &Knowledge {
        &self.knowledge
    }

    pub fn current_goal(&self) -> &str {
        &self.knowledge.strategy.current_goal
    }

    pub fn has_goal(&self) -> bool {
        self.knowledge.strategy.current_goal != UNKNOWN_GOAL
    }
}
