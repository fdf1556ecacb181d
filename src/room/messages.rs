//! Room actor message types.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::game::entities::{Action, BOARD_COLS, BOARD_ROWS, Digit, MatchView, PlayerId};
use crate::game::{GameError, MatchEvent};

/// Grid payload as delivered by the transport adapter.
pub type DeploymentGrid = [[Option<Digit>; BOARD_COLS]; BOARD_ROWS];

/// Messages that can be sent to a `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Start the match (room owner only).
    StartMatch {
        caller: PlayerId,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Submit a deployed board.
    Deploy {
        caller: PlayerId,
        grid: Box<DeploymentGrid>,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Take an action (advance, challenge, recover, skip).
    TakeAction {
        caller: PlayerId,
        action: Action,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Get a snapshot redacted for the caller.
    GetView {
        caller: Option<PlayerId>,
        response: oneshot::Sender<MatchView>,
    },

    /// Subscribe to room broadcasts.
    Subscribe {
        player: PlayerId,
        sender: mpsc::Sender<RoomBroadcast>,
    },

    /// Unsubscribe from room broadcasts.
    Unsubscribe { player: PlayerId },

    /// Close the room actor (registry teardown).
    Close {
        response: oneshot::Sender<RoomResponse>,
    },
}

/// Response to a room command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RoomResponse {
    /// Command applied.
    Accepted,
    /// Command rejected; the match state is unchanged.
    Rejected(GameError),
}

impl RoomResponse {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    #[must_use]
    pub fn error(&self) -> Option<&GameError> {
        match self {
            Self::Accepted => None,
            Self::Rejected(error) => Some(error),
        }
    }
}

/// One broadcast to a subscriber: the event plus a snapshot redacted for
/// that subscriber.
#[derive(Clone, Debug, Serialize)]
pub struct RoomBroadcast {
    pub event: MatchEvent,
    pub view: MatchView,
}
