use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::action::{ClickData, GameAction};
use super::knowledge::Knowledge;

/// Picks an action when no plan is queued: untried keys first, then random clicks.
#[derive(Debug)]
pub struct Explorer {
    rng: StdRng,
    grid_size: u8,
    click_attempts: u32,
}

impl Explorer {
    /// `grid_size` bounds click coordinates to `0..grid_size`. `seed` makes clicks reproducible.
    pub fn new(grid_size: u8, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            grid_size: grid_size.max(1),
            click_attempts: 0,
        }
    }

    pub fn next_action(&mut self, knowledge: &Knowledge) -> GameAction {
        if let Some(untried) = GameAction::DISCRETE
            .into_iter()
            .find(|a| knowledge.tries(a.name()) == 0)
        {
            return untried;
        }

        self.click_attempts = self.click_attempts.saturating_add(1);
        let data = ClickData {
            x: self.rng.gen_range(0..self.grid_size),
            y: self.rng.gen_range(0..self.grid_size),
        };
        debug!(attempt = self.click_attempts, x = data.x, y = data.y, "probing click");
        GameAction::Action6(data)
    }

    pub fn click_attempts(&self) -> u32 {
        self.click_attempts
    }
}
