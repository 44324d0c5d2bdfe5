use serde::{Deserialize, Serialize};

use super::action::{ActionRecord, GameAction};
use super::perception::Delta;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Event {
    pub turn: u64,
    pub action: ActionRecord,
    pub effect_delta: Delta,
    pub success: bool,
}

/// Append-only cause/effect history for one session.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn record(&mut self, action: &GameAction, delta: Delta) -> &Event {
        let success = delta.had_effect();
        self.events.push(Event {
            turn: self.events.len() as u64 + 1,
            action: action.record(),
            effect_delta: delta,
            success,
        });
        &self.events[self.events.len() - 1]
    }

    pub fn full_history(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_history(&self, n: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
