//! Room actor: the per-room serialization point.
//!
//! Every command for a room flows through one mpsc inbox consumed by one
//! tokio task, so match state is never mutated concurrently. The settlement
//! reveal delay is a timer branch in the same `select!` loop; while a room
//! is pacing its reveals, other rooms' actors keep running untouched.

use super::{
    config::RoomConfig,
    messages::{RoomBroadcast, RoomMessage, RoomResponse},
};
use crate::game::{
    ActionOutcome, GameError, Match, MatchEvent, SettleProgress,
    entities::{PlayerId, RoomId},
};
use crate::stats::{MatchOutcome, StatsRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};

/// Handle for sending commands to a room actor.
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    room_id: RoomId,
}

impl RoomHandle {
    pub fn new(sender: mpsc::Sender<RoomMessage>, room_id: RoomId) -> Self {
        Self { sender, room_id }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Send a message to the room. Fails with [`GameError::MatchUnavailable`]
    /// once the room has been destroyed.
    pub async fn send(&self, message: RoomMessage) -> Result<(), GameError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| GameError::MatchUnavailable)
    }
}

/// Actor owning a single room's match.
pub struct RoomActor {
    room_id: RoomId,
    config: RoomConfig,
    game: Match,
    inbox: mpsc::Receiver<RoomMessage>,
    stats: Arc<dyn StatsRepository>,
    subscribers: HashMap<PlayerId, mpsc::Sender<RoomBroadcast>>,
    /// When the next settlement step is due, if a settlement is pacing.
    next_reveal: Option<Instant>,
    outcome_recorded: bool,
    is_closed: bool,
}

impl RoomActor {
    /// Create a room actor and its handle. The match starts in the waiting
    /// phase with the given participants.
    pub fn new(
        room_id: RoomId,
        config: RoomConfig,
        participants: Vec<(PlayerId, String)>,
        stats: Arc<dyn StatsRepository>,
    ) -> Result<(Self, RoomHandle), GameError> {
        config.validate()?;
        if participants.len() > config.max_players {
            return Err(GameError::InvalidConfig(format!(
                "room holds at most {} players",
                config.max_players
            )));
        }
        let game = Match::new(room_id.clone(), participants)?;
        let (sender, inbox) = mpsc::channel(100);
        let handle = RoomHandle::new(sender, room_id.clone());
        let actor = Self {
            room_id,
            config,
            game,
            inbox,
            stats,
            subscribers: HashMap::new(),
            next_reveal: None,
            outcome_recorded: false,
            is_closed: false,
        };
        Ok((actor, handle))
    }

    /// Run the room actor event loop until closed.
    pub async fn run(mut self) {
        log::info!("room {}: actor starting", self.room_id);

        loop {
            let reveal_at = self.next_reveal;
            tokio::select! {
                maybe_message = self.inbox.recv() => {
                    match maybe_message {
                        Some(message) => self.handle_message(message).await,
                        None => break,
                    }
                    if self.is_closed {
                        break;
                    }
                }

                () = Self::wait_for(reveal_at), if reveal_at.is_some() => {
                    self.next_reveal = None;
                    self.advance_settlement().await;
                }
            }
        }

        log::info!("room {}: actor stopped", self.room_id);
    }

    async fn wait_for(deadline: Option<Instant>) {
        if let Some(at) = deadline {
            sleep_until(at).await;
        }
    }

    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::StartMatch { caller, response } => {
                let result = if caller == self.config.owner {
                    self.game.start()
                } else {
                    Err(GameError::NotRoomOwner)
                };
                let _ = response.send(to_response(&result, &self.room_id, caller));
                if result.is_ok() {
                    self.flush_events().await;
                }
            }

            RoomMessage::Deploy {
                caller,
                grid,
                response,
            } => {
                let result = self.game.deploy(caller, *grid);
                let _ = response.send(to_response(&result, &self.room_id, caller));
                if result.is_ok() {
                    self.flush_events().await;
                }
            }

            RoomMessage::TakeAction {
                caller,
                action,
                response,
            } => match self.game.take_action(caller, action) {
                Ok(outcome) => {
                    let _ = response.send(RoomResponse::Accepted);
                    self.flush_events().await;
                    match outcome {
                        ActionOutcome::SettlementStarted | ActionOutcome::SettlementResumed => {
                            self.advance_settlement().await;
                        }
                        ActionOutcome::TurnPassed | ActionOutcome::RoundClosed => {}
                    }
                }
                Err(error) => {
                    log::debug!(
                        "room {}: rejected {action} from player {caller}: {error}",
                        self.room_id
                    );
                    let _ = response.send(RoomResponse::Rejected(error));
                }
            },

            RoomMessage::GetView { caller, response } => {
                let _ = response.send(self.game.view_for(caller));
            }

            RoomMessage::Subscribe { player, sender } => {
                self.subscribers.insert(player, sender);
                log::debug!("room {}: player {player} subscribed", self.room_id);
            }

            RoomMessage::Unsubscribe { player } => {
                self.subscribers.remove(&player);
                log::debug!("room {}: player {player} unsubscribed", self.room_id);
            }

            RoomMessage::Close { response } => {
                // Close the inbox before acknowledging so that once the
                // registry's destroy returns, any further send fails instead
                // of landing in a buffer nobody will drain.
                self.inbox.close();
                self.is_closed = true;
                let _ = response.send(RoomResponse::Accepted);
            }
        }
    }

    /// Run one settlement step and, if more confrontations are pending,
    /// schedule the next step after the reveal delay.
    async fn advance_settlement(&mut self) {
        match self.game.settle_step() {
            Ok(SettleProgress::Fought) => {
                self.flush_events().await;
                self.next_reveal = Some(Instant::now() + self.config.reveal_pacing());
            }
            Ok(
                SettleProgress::AwaitingBonus(_)
                | SettleProgress::RoundClosed
                | SettleProgress::Finished(_),
            ) => {
                self.flush_events().await;
            }
            Err(error) => {
                log::error!("room {}: settlement step failed: {error}", self.room_id);
            }
        }
    }

    /// Drain engine events, record the outcome if the match just ended, and
    /// broadcast each event with per-subscriber redacted snapshots.
    async fn flush_events(&mut self) {
        let events = self.game.drain_events();
        for event in events {
            log::debug!("room {}: {event}", self.room_id);
            if let MatchEvent::MatchEnded { winner } = event {
                self.record_outcome(winner).await;
            }
            self.broadcast(&event);
        }
    }

    fn broadcast(&mut self, event: &MatchEvent) {
        let game = &self.game;
        let room_id = &self.room_id;
        self.subscribers.retain(|player, sender| {
            let payload = RoomBroadcast {
                event: event.clone(),
                view: game.view_for(Some(*player)),
            };
            match sender.try_send(payload) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("room {room_id}: subscriber {player} full, dropping broadcast");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("room {room_id}: subscriber {player} disconnected, removing");
                    false
                }
            }
        });
    }

    async fn record_outcome(&mut self, winner: PlayerId) {
        if self.outcome_recorded {
            return;
        }
        self.outcome_recorded = true;
        let outcome = MatchOutcome {
            room_id: self.room_id.clone(),
            winner,
            participants: self.game.participants(),
            rounds: self.game.round(),
            finished_at: chrono::Utc::now(),
        };
        if let Err(error) = self.stats.record_match_result(&outcome).await {
            log::error!(
                "room {}: failed to record match result: {error}",
                self.room_id
            );
        }
    }
}

fn to_response<T>(result: &Result<T, GameError>, room_id: &RoomId, caller: PlayerId) -> RoomResponse {
    match result {
        Ok(_) => RoomResponse::Accepted,
        Err(error) => {
            log::debug!("room {room_id}: rejected command from player {caller}: {error}");
            RoomResponse::Rejected(error.clone())
        }
    }
}
