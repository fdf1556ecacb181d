//! Statistics storage boundary.
//!
//! The engine reports finished matches through [`StatsRepository`]; durable
//! storage lives behind this trait in the embedding process. The in-memory
//! implementation is enough for tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::game::entities::{PlayerId, RoomId};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("stats backend unavailable: {0}")]
    Unavailable(String),
}

/// Result of a finished match, delivered exactly once per match.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchOutcome {
    pub room_id: RoomId,
    pub winner: PlayerId,
    pub participants: Vec<PlayerId>,
    pub rounds: u32,
    pub finished_at: DateTime<Utc>,
}

/// Lifetime record for one player.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerRecord {
    pub games: u64,
    pub wins: u64,
}

/// Repository for match statistics.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Record a finished match: the winner gains a game and a win, every
    /// other participant gains a game.
    async fn record_match_result(&self, outcome: &MatchOutcome) -> Result<(), StatsError>;

    /// Fetch one player's record.
    async fn player_record(&self, player: PlayerId) -> Result<PlayerRecord, StatsError>;
}

/// In-memory stats store.
#[derive(Default)]
pub struct InMemoryStats {
    records: RwLock<HashMap<PlayerId, PlayerRecord>>,
}

impl InMemoryStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsRepository for InMemoryStats {
    async fn record_match_result(&self, outcome: &MatchOutcome) -> Result<(), StatsError> {
        let mut records = self.records.write().await;
        for &player in &outcome.participants {
            let record = records.entry(player).or_default();
            record.games += 1;
            if player == outcome.winner {
                record.wins += 1;
            }
        }
        log::debug!(
            "stats: recorded match in room {} won by player {}",
            outcome.room_id,
            outcome.winner
        );
        Ok(())
    }

    async fn player_record(&self, player: PlayerId) -> Result<PlayerRecord, StatsError> {
        let records = self.records.read().await;
        Ok(records.get(&player).copied().unwrap_or_default())
    }
}
