//! Room configuration models.

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::game::GameError;
use crate::game::entities::{MAX_PLAYERS, MIN_PLAYERS, PlayerId};

/// Default delay between confrontation reveals, matching the pace clients
/// animate at.
pub const DEFAULT_REVEAL_PACING_MS: u64 = 1500;

/// Room configuration supplied at match creation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RoomConfig {
    /// Room owner; the only participant allowed to start the match.
    pub owner: PlayerId,

    /// Player cap (3 to 5).
    pub max_players: usize,

    /// Delay between confrontation reveals, in milliseconds. Realized as a
    /// scheduled timer in the room actor, never a blocking sleep.
    pub reveal_pacing_ms: u64,
}

impl RoomConfig {
    #[must_use]
    pub fn new(owner: PlayerId) -> Self {
        Self {
            owner,
            max_players: 4,
            reveal_pacing_ms: DEFAULT_REVEAL_PACING_MS,
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), GameError> {
        if self.max_players < MIN_PLAYERS || self.max_players > MAX_PLAYERS {
            return Err(GameError::InvalidConfig(format!(
                "player cap must be between {MIN_PLAYERS} and {MAX_PLAYERS}"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn reveal_pacing(&self) -> Duration {
        Duration::from_millis(self.reveal_pacing_ms)
    }
}
