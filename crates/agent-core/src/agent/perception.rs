use serde::{Deserialize, Serialize};

use super::frame::Frame;

/// Hard cap on listed cell changes to keep prompts and brain files small.
pub const MAX_SPECIFIC_CHANGES: usize = 20;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct CellChange {
    /// `(x, y)` of the cell.
    pub pos: (usize, usize),
    pub before: u8,
    pub after: u8,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct Delta {
    pub pixels_changed: usize,
    /// First changed cells in row-major order, capped at [`MAX_SPECIFIC_CHANGES`].
    #[serde(default)]
    pub specific_changes: Vec<CellChange>,
    pub score_change: i64,
    #[serde(default)]
    pub game_state_change: Option<String>,
}

impl Delta {
    /// An action "worked" if anything on screen or on the scoreboard moved.
    pub fn had_effect(&self) -> bool {
        self.pixels_changed > 0 || self.score_change != 0
    }
}

/// Compares two consecutive frames.
///
/// Grids are expected to share a shape. If they don't, only the overlapping region is compared.
pub fn detect_delta(prev: &Frame, curr: &Frame) -> Delta {
    let mut pixels_changed = 0;
    let mut specific_changes = Vec::new();

    for (y, (row_before, row_after)) in prev.grid.iter().zip(curr.grid.iter()).enumerate() {
        for (x, (&before, &after)) in row_before.iter().zip(row_after.iter()).enumerate() {
            if before == after {
                continue;
            }
            pixels_changed += 1;
            if specific_changes.len() < MAX_SPECIFIC_CHANGES {
                specific_changes.push(CellChange {
                    pos: (x, y),
                    before,
                    after,
                });
            }
        }
    }

    let game_state_change = (prev.state != curr.state).then(|| curr.state.as_str().to_string());

    Delta {
        pixels_changed,
        specific_changes,
        score_change: curr.score - prev.score,
        game_state_change,
    }
}
