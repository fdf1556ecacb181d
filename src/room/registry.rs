//! Match registry: process-wide table of live rooms.
//!
//! Replaces the ambient "room id to game state" global of a naive design
//! with an owned object whose lifecycle is explicit: `create` spawns a room
//! actor, `destroy` closes it. Destruction is safe to race against in-flight
//! commands; once the actor's inbox is gone, every subsequent command fails
//! with [`GameError::MatchUnavailable`] instead of touching stale state.

use super::{
    actor::{RoomActor, RoomHandle},
    config::RoomConfig,
    messages::{DeploymentGrid, RoomBroadcast, RoomMessage, RoomResponse},
};
use crate::game::{
    GameError,
    entities::{Action, MatchView, PlayerId, RoomId},
};
use crate::stats::StatsRepository;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc, oneshot};

/// Registry of live matches, keyed by room identifier.
pub struct MatchRegistry {
    rooms: Arc<RwLock<HashMap<RoomId, RoomHandle>>>,
    stats: Arc<dyn StatsRepository>,
}

impl MatchRegistry {
    pub fn new(stats: Arc<dyn StatsRepository>) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            stats,
        }
    }

    /// Create a match for a room and spawn its actor.
    ///
    /// Fails if the room already has a live match, the configuration is
    /// invalid, or fewer than three participants are given.
    pub async fn create(
        &self,
        room_id: RoomId,
        config: RoomConfig,
        participants: Vec<(PlayerId, String)>,
    ) -> Result<RoomHandle, GameError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room_id) {
            return Err(GameError::InvalidConfig(format!(
                "room {room_id} already has a live match"
            )));
        }
        let (actor, handle) =
            RoomActor::new(room_id.clone(), config, participants, self.stats.clone())?;
        rooms.insert(room_id.clone(), handle.clone());
        drop(rooms);

        tokio::spawn(actor.run());
        log::info!("registry: created match for room {room_id}");
        Ok(handle)
    }

    /// Get the live handle for a room.
    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned()
    }

    /// Destroy a room's match (room teardown). Commands already queued keep
    /// their ordering; anything sent afterwards fails cleanly.
    pub async fn destroy(&self, room_id: &str) -> Result<(), GameError> {
        let handle = {
            let mut rooms = self.rooms.write().await;
            rooms.remove(room_id)
        }
        .ok_or(GameError::MatchUnavailable)?;

        let (tx, rx) = oneshot::channel();
        // The actor may already be gone; removal from the table is what
        // matters for callers.
        if handle.send(RoomMessage::Close { response: tx }).await.is_ok() {
            let _ = rx.await;
        }
        log::info!("registry: destroyed match for room {room_id}");
        Ok(())
    }

    pub async fn live_match_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }

    /// Start a room's match. Only the room owner is accepted.
    pub async fn start_match(
        &self,
        room_id: &str,
        caller: PlayerId,
    ) -> Result<RoomResponse, GameError> {
        let handle = self.handle_for(room_id).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::StartMatch {
                caller,
                response: tx,
            })
            .await?;
        rx.await.map_err(|_| GameError::MatchUnavailable)
    }

    /// Submit a player's deployed board.
    pub async fn deploy(
        &self,
        room_id: &str,
        caller: PlayerId,
        grid: DeploymentGrid,
    ) -> Result<RoomResponse, GameError> {
        let handle = self.handle_for(room_id).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Deploy {
                caller,
                grid: Box::new(grid),
                response: tx,
            })
            .await?;
        rx.await.map_err(|_| GameError::MatchUnavailable)
    }

    /// Apply a player action.
    pub async fn take_action(
        &self,
        room_id: &str,
        caller: PlayerId,
        action: Action,
    ) -> Result<RoomResponse, GameError> {
        let handle = self.handle_for(room_id).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::TakeAction {
                caller,
                action,
                response: tx,
            })
            .await?;
        rx.await.map_err(|_| GameError::MatchUnavailable)
    }

    /// Fetch a snapshot redacted for the caller.
    pub async fn view(
        &self,
        room_id: &str,
        caller: Option<PlayerId>,
    ) -> Result<MatchView, GameError> {
        let handle = self.handle_for(room_id).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::GetView {
                caller,
                response: tx,
            })
            .await?;
        rx.await.map_err(|_| GameError::MatchUnavailable)
    }

    /// Subscribe a participant to room broadcasts.
    pub async fn subscribe(
        &self,
        room_id: &str,
        player: PlayerId,
        sender: mpsc::Sender<RoomBroadcast>,
    ) -> Result<(), GameError> {
        let handle = self.handle_for(room_id).await?;
        handle
            .send(RoomMessage::Subscribe { player, sender })
            .await
    }

    async fn handle_for(&self, room_id: &str) -> Result<RoomHandle, GameError> {
        self.get(room_id).await.ok_or(GameError::MatchUnavailable)
    }
}
