use serde::{Deserialize, Serialize};

/// Payload of the coordinate action. Coordinates index the frame grid (`x` = column, `y` = row).
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ClickData {
    pub x: u8,
    pub y: u8,
}

/// One of the seven actions the game accepts.
///
/// Values are `Copy`, so every turn hands the harness its own instance; the click payload
/// lives inside the variant instead of being attached to a shared action afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameAction {
    Reset,
    Action1,
    Action2,
    Action3,
    Action4,
    Action5,
    Action6(ClickData),
}

impl GameAction {
    /// Discrete actions in the fixed order exploration walks them.
    pub const DISCRETE: [GameAction; 5] = [
        GameAction::Action1,
        GameAction::Action2,
        GameAction::Action3,
        GameAction::Action4,
        GameAction::Action5,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GameAction::Reset => "RESET",
            GameAction::Action1 => "ACTION1",
            GameAction::Action2 => "ACTION2",
            GameAction::Action3 => "ACTION3",
            GameAction::Action4 => "ACTION4",
            GameAction::Action5 => "ACTION5",
            GameAction::Action6(_) => "ACTION6",
        }
    }

    pub fn data(&self) -> Option<ClickData> {
        match self {
            GameAction::Action6(data) => Some(*data),
            _ => None,
        }
    }

    /// Parses a discrete action identifier (`ACTION1`..`ACTION5`).
    ///
    /// `ACTION6` and `RESET` are rejected: the first needs a payload a bare name cannot carry,
    /// and a plan step must never restart the game.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_uppercase();
        Self::DISCRETE.into_iter().find(|a| a.name() == name)
    }

    pub fn discrete_names() -> Vec<&'static str> {
        Self::DISCRETE.iter().map(|a| a.name()).collect()
    }

    pub fn record(&self) -> ActionRecord {
        ActionRecord {
            name: self.name().to_string(),
            data: self.data(),
        }
    }
}

impl std::fmt::Display for GameAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameAction::Action6(ClickData { x, y }) => write!(f, "ACTION6(x={x}, y={y})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Serializable trace of an action as stored in events and brain files.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActionRecord {
    pub name: String,
    #[serde(default)]
    pub data: Option<ClickData>,
}

/// What one turn emits: the action plus the reasoning produced during that turn, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnAction {
    pub action: GameAction,
    pub reasoning: Option<String>,
}

impl TurnAction {
    pub fn new(action: GameAction) -> Self {
        Self {
            action,
            reasoning: None,
        }
    }
}
