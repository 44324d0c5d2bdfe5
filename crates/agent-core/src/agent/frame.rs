use serde::{Deserialize, Serialize};

/// Grid of cell colours, indexed `grid[y][x]`.
pub type Grid = Vec<Vec<u8>>;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    #[default]
    NotPlayed,
    NotFinished,
    Win,
    GameOver,
}

impl GameState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::NotPlayed => "NOT_PLAYED",
            GameState::NotFinished => "NOT_FINISHED",
            GameState::Win => "WIN",
            GameState::GameOver => "GAME_OVER",
        }
    }
}

/// One snapshot delivered by the harness. Treated as immutable once received.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Frame {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub grid: Grid,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub state: GameState,
}

impl Frame {
    /// False when the harness sent no usable grid (typically after a server-side error).
    pub fn has_grid(&self) -> bool {
        self.grid.iter().any(|row| !row.is_empty())
    }

    pub fn width(&self) -> usize {
        self.grid.first().map(Vec::len).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.grid.len()
    }
}
