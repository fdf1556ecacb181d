//! Match state machine: phases, turn rotation, and settlement resolution.
//!
//! A [`Match`] owns everything for one room: players and their boards, the
//! contested-area queue, the turn pointer, and the phase. All mutation goes
//! through [`Match::start`], [`Match::deploy`], [`Match::take_action`], and
//! [`Match::settle_step`]; on any error the state is left untouched.
//!
//! Settlement is deliberately re-entrant: each [`Match::settle_step`] call
//! resolves at most one pairwise confrontation, so the caller can interleave
//! a scheduled reveal delay between steps without ever blocking.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

use super::entities::{
    Action, BOARD_COLS, BOARD_ROWS, Board, ContestedPiece, Digit, MIN_PLAYERS, MatchView, Phase,
    Player, PlayerId, PlayerView, RoomId,
};
use super::rules::{self, AdvanceTarget, ConfrontationResult};

/// Errors reported to the issuing participant. All are recoverable and
/// leave the match state unchanged.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("command not valid in the current phase")]
    InvalidPhase,
    #[error("not your turn")]
    NotYourTurn,
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("invalid deployment: {0}")]
    InvalidDeployment(String),
    #[error("unknown target")]
    UnknownTarget,
    #[error("need at least 3 players")]
    NotEnoughPlayers,
    #[error("only the room owner can do that")]
    NotRoomOwner,
    #[error("invalid room configuration: {0}")]
    InvalidConfig(String),
    #[error("match unavailable")]
    MatchUnavailable,
}

/// Notable state changes, drained by the room actor and turned into
/// broadcasts.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum MatchEvent {
    MatchStarted,
    PlayerDeployed(PlayerId),
    DeploymentComplete,
    TurnChanged(PlayerId),
    SettlementStarted,
    BonusOffered { player: PlayerId, digit: Digit },
    Confrontation {
        first: ContestedPiece,
        second: ContestedPiece,
        winner: Option<Digit>,
        loser: Option<Digit>,
    },
    PieceReturned {
        player: PlayerId,
        digit: Digit,
        row: usize,
        col: usize,
    },
    PlayerEliminated(PlayerId),
    RoundStarted(u32),
    MatchEnded { winner: PlayerId },
}

impl fmt::Display for MatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatchStarted => write!(f, "match started, deployment open"),
            Self::PlayerDeployed(player) => write!(f, "player {player} deployed"),
            Self::DeploymentComplete => write!(f, "all boards deployed"),
            Self::TurnChanged(player) => write!(f, "player {player} to act"),
            Self::SettlementStarted => write!(f, "settlement started"),
            Self::BonusOffered { player, digit } => {
                write!(f, "player {player} offered a bonus action for digit {digit}")
            }
            Self::Confrontation {
                first,
                second,
                winner,
                ..
            } => match winner {
                Some(digit) => write!(
                    f,
                    "digit {} fought digit {}, {digit} won",
                    first.digit, second.digit
                ),
                None => write!(
                    f,
                    "digit {} and digit {} destroyed each other",
                    first.digit, second.digit
                ),
            },
            Self::PieceReturned { player, digit, .. } => {
                write!(f, "digit {digit} returned to player {player}")
            }
            Self::PlayerEliminated(player) => write!(f, "player {player} eliminated"),
            Self::RoundStarted(round) => write!(f, "round {round} started"),
            Self::MatchEnded { winner } => write!(f, "match ended, player {winner} won"),
        }
    }
}

/// What a successful action did to the round, so the caller knows whether
/// settlement needs driving.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionOutcome {
    /// The turn passed to the next active player.
    TurnPassed,
    /// The round's actions are exhausted (or a challenge short-circuited
    /// them); the match is now in settlement.
    SettlementStarted,
    /// A bonus challenge re-armed the queue; settlement resumes.
    SettlementResumed,
    /// A bonus recover/skip closed the round.
    RoundClosed,
}

/// Result of one settlement step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SettleProgress {
    /// One confrontation was resolved; call again (after the reveal delay).
    Fought,
    /// A lone contested piece paused settlement; its owner must respond
    /// with challenge, recover, or skip.
    AwaitingBonus(PlayerId),
    /// The round closed and the next action round began.
    RoundClosed,
    /// The match ended with this winner.
    Finished(PlayerId),
}

/// Aggregate state for one room's match.
#[derive(Clone, Debug)]
pub struct Match {
    room_id: RoomId,
    players: Vec<Player>,
    turn_order: Vec<PlayerId>,
    current_turn: usize,
    contested: VecDeque<ContestedPiece>,
    next_seq: u32,
    phase: Phase,
    round: u32,
    actions_taken: usize,
    bonus_holder: Option<PlayerId>,
    fresh_settlement: bool,
    winner: Option<PlayerId>,
    events: VecDeque<MatchEvent>,
}

impl Match {
    /// Create a match in the waiting phase from room membership.
    pub fn new(
        room_id: RoomId,
        participants: Vec<(PlayerId, String)>,
    ) -> Result<Self, GameError> {
        if participants.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        let mut seen = Vec::with_capacity(participants.len());
        for (id, _) in &participants {
            if seen.contains(id) {
                return Err(GameError::InvalidConfig(format!(
                    "duplicate player id {id}"
                )));
            }
            seen.push(*id);
        }
        let players = participants
            .into_iter()
            .map(|(id, name)| Player::new(id, name))
            .collect();
        Ok(Self {
            room_id,
            players,
            turn_order: Vec::new(),
            current_turn: 0,
            contested: VecDeque::new(),
            next_seq: 0,
            phase: Phase::Waiting,
            round: 0,
            actions_taken: 0,
            bonus_holder: None,
            fresh_settlement: false,
            winner: None,
            events: VecDeque::new(),
        })
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn bonus_holder(&self) -> Option<PlayerId> {
        self.bonus_holder
    }

    /// The player whose turn it is, if the match is in the action phase.
    pub fn current_player(&self) -> Option<PlayerId> {
        if self.phase != Phase::Action {
            return None;
        }
        self.turn_order.get(self.current_turn).copied()
    }

    pub fn participants(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    /// Drain queued events since the last call.
    pub fn drain_events(&mut self) -> VecDeque<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Snapshot redacted for one viewer: only the viewer's own board is
    /// revealed with digit values, opponents show occupancy only.
    #[must_use]
    pub fn view_for(&self, viewer: Option<PlayerId>) -> MatchView {
        MatchView {
            room_id: self.room_id.clone(),
            phase: self.phase,
            round: self.round,
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id,
                    display_name: p.display_name.clone(),
                    eliminated: p.eliminated,
                    lost_digits: p.lost_digits.clone(),
                    occupancy: p.board.occupancy(),
                    board: (viewer == Some(p.id)).then_some(p.board),
                })
                .collect(),
            turn_order: self.turn_order.clone(),
            current_turn: self.current_player(),
            bonus_holder: self.bonus_holder,
            contested: self.contested.iter().copied().collect(),
            winner: self.winner,
        }
    }

    /// Start the match: assign a uniform random turn order and open
    /// deployment.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.phase != Phase::Waiting {
            return Err(GameError::InvalidPhase);
        }
        let mut order: Vec<PlayerId> = self.players.iter().map(|p| p.id).collect();
        order.shuffle(&mut rand::rng());
        self.turn_order = order;
        self.current_turn = 0;
        self.phase = Phase::Deployment;
        self.events.push_back(MatchEvent::MatchStarted);
        log::info!("room {}: match started, deployment open", self.room_id);
        Ok(())
    }

    /// Store a player's deployed board. Validation counts filled cells and
    /// range-checks digit values; it does not reject duplicate digits.
    /// Redeploying before everyone has finished replaces the prior board.
    pub fn deploy(
        &mut self,
        player: PlayerId,
        cells: [[Option<Digit>; BOARD_COLS]; BOARD_ROWS],
    ) -> Result<(), GameError> {
        if self.phase != Phase::Deployment {
            return Err(GameError::InvalidPhase);
        }
        let idx = self.player_index(player).ok_or(GameError::UnknownTarget)?;
        let board = Board::from_cells(cells);
        if let Some(bad) = board.digits().find(|d| *d > 9) {
            return Err(GameError::InvalidDeployment(format!(
                "digit {bad} is out of range"
            )));
        }
        if !rules::validate_deployment(&board) {
            return Err(GameError::InvalidDeployment(format!(
                "must place exactly 10 digits, found {}",
                board.filled_count()
            )));
        }
        self.players[idx].board = board;
        self.events.push_back(MatchEvent::PlayerDeployed(player));

        let all_deployed = self
            .players
            .iter()
            .all(|p| rules::validate_deployment(&p.board));
        if all_deployed {
            self.phase = Phase::Action;
            self.round = 1;
            self.actions_taken = 0;
            self.next_seq = 0;
            self.current_turn = 0;
            self.events.push_back(MatchEvent::DeploymentComplete);
            log::info!("room {}: deployment complete, round 1 begins", self.room_id);
        }
        Ok(())
    }

    /// Apply one action for `player`.
    ///
    /// In the action phase the caller must be the current player. In the
    /// settlement phase the caller must be the bonus holder, and only
    /// challenge, recover, and skip are accepted.
    pub fn take_action(
        &mut self,
        player: PlayerId,
        action: Action,
    ) -> Result<ActionOutcome, GameError> {
        match self.phase {
            Phase::Action => {
                let current = self
                    .turn_order
                    .get(self.current_turn)
                    .copied()
                    .ok_or(GameError::InvalidPhase)?;
                if current != player {
                    return Err(GameError::NotYourTurn);
                }
                match action {
                    Action::Advance { row, col } => {
                        self.apply_advance(player, row, col)?;
                        Ok(self.finish_regular_action())
                    }
                    Action::Recover { piece, row, col } => {
                        self.apply_recover(player, piece, row, col)?;
                        Ok(self.finish_regular_action())
                    }
                    Action::Skip => Ok(self.finish_regular_action()),
                    Action::Challenge { target, row, col } => {
                        self.apply_challenge(target, row, col)?;
                        // A challenge does not count toward the round's
                        // action tally; it forces settlement on the spot.
                        self.begin_settlement();
                        Ok(ActionOutcome::SettlementStarted)
                    }
                }
            }
            Phase::Settlement => {
                let holder = self.bonus_holder.ok_or(GameError::InvalidPhase)?;
                if holder != player {
                    return Err(GameError::NotYourTurn);
                }
                match action {
                    Action::Challenge { target, row, col } => {
                        self.apply_challenge(target, row, col)?;
                        self.bonus_holder = None;
                        Ok(ActionOutcome::SettlementResumed)
                    }
                    Action::Recover { piece, row, col } => {
                        self.apply_recover(player, piece, row, col)?;
                        self.bonus_holder = None;
                        self.end_round();
                        Ok(ActionOutcome::RoundClosed)
                    }
                    Action::Skip => {
                        self.bonus_holder = None;
                        self.end_round();
                        Ok(ActionOutcome::RoundClosed)
                    }
                    Action::Advance { .. } => Err(GameError::InvalidPhase),
                }
            }
            _ => Err(GameError::InvalidPhase),
        }
    }

    /// Run one settlement step. See [`SettleProgress`] for what the caller
    /// should do next.
    pub fn settle_step(&mut self) -> Result<SettleProgress, GameError> {
        if self.phase != Phase::Settlement {
            return Err(GameError::InvalidPhase);
        }
        if let Some(holder) = self.bonus_holder {
            return Ok(SettleProgress::AwaitingBonus(holder));
        }
        if self.fresh_settlement {
            self.fresh_settlement = false;
            match self.contested.len() {
                0 => return Ok(self.end_round()),
                1 => {
                    let piece = self.contested[0];
                    self.bonus_holder = Some(piece.owner);
                    self.events.push_back(MatchEvent::BonusOffered {
                        player: piece.owner,
                        digit: piece.digit,
                    });
                    return Ok(SettleProgress::AwaitingBonus(piece.owner));
                }
                _ => {}
            }
        }
        if self.contested.len() < 2 {
            return Ok(self.end_round());
        }

        // Pair the two oldest pieces. The queue is kept in insertion order,
        // so these are the lowest sequence numbers still unresolved.
        let first = self.contested[0];
        let second = self.contested[1];
        match rules::resolve_confrontation(first.digit, second.digit) {
            ConfrontationResult::MutualLoss => {
                self.events.push_back(MatchEvent::Confrontation {
                    first,
                    second,
                    winner: None,
                    loser: None,
                });
                self.contested.remove(1);
                self.contested.remove(0);
                self.record_loss(first.owner, first.digit);
                self.record_loss(second.owner, second.digit);
                self.check_elimination(first.owner);
                self.check_elimination(second.owner);
            }
            ConfrontationResult::Beats { winner, loser } => {
                self.events.push_back(MatchEvent::Confrontation {
                    first,
                    second,
                    winner: Some(winner),
                    loser: Some(loser),
                });
                // The winning piece stays queued and fights the next piece.
                let losing_idx = if first.digit == winner { 1 } else { 0 };
                let losing = self.contested[losing_idx];
                self.contested.remove(losing_idx);
                self.record_loss(losing.owner, losing.digit);
                self.check_elimination(losing.owner);
            }
        }

        if let Some(winner) = self.check_game_end() {
            return Ok(SettleProgress::Finished(winner));
        }
        Ok(SettleProgress::Fought)
    }

    fn player_index(&self, player: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == player)
    }

    fn active_count(&self) -> usize {
        self.players.iter().filter(|p| !p.eliminated).count()
    }

    fn apply_advance(&mut self, player: PlayerId, row: usize, col: usize) -> Result<(), GameError> {
        let idx = self.player_index(player).ok_or(GameError::UnknownTarget)?;
        let target = rules::can_advance(&self.players[idx].board, row, col)?;
        let Some(digit) = self.players[idx].board.take(row, col) else {
            return Err(GameError::IllegalMove(
                "no piece at the source cell".to_string(),
            ));
        };
        match target {
            AdvanceTarget::ContestedArea => self.expose(player, digit),
            AdvanceTarget::Cell { row, col } => self.players[idx].board.place(row, col, digit),
        }
        Ok(())
    }

    fn apply_challenge(
        &mut self,
        target: PlayerId,
        row: usize,
        col: usize,
    ) -> Result<(), GameError> {
        let idx = self.player_index(target).ok_or(GameError::UnknownTarget)?;
        if self.players[idx].eliminated {
            return Err(GameError::UnknownTarget);
        }
        if !Board::in_bounds(row, col) {
            return Err(GameError::IllegalMove(format!(
                "cell ({row}, {col}) is out of range"
            )));
        }
        let Some(digit) = self.players[idx].board.take(row, col) else {
            return Err(GameError::IllegalMove(
                "no piece at the target cell".to_string(),
            ));
        };
        self.expose(target, digit);
        Ok(())
    }

    fn apply_recover(
        &mut self,
        player: PlayerId,
        piece: usize,
        row: usize,
        col: usize,
    ) -> Result<(), GameError> {
        if piece >= self.contested.len() {
            return Err(GameError::UnknownTarget);
        }
        if self.contested[piece].owner != player {
            return Err(GameError::IllegalMove(
                "can only recover your own piece".to_string(),
            ));
        }
        if !Board::in_bounds(row, col) {
            return Err(GameError::IllegalMove(format!(
                "cell ({row}, {col}) is out of range"
            )));
        }
        let idx = self.player_index(player).ok_or(GameError::UnknownTarget)?;
        if self.players[idx].board.get(row, col).is_some() {
            return Err(GameError::IllegalMove(
                "the target cell is occupied".to_string(),
            ));
        }
        let Some(recovered) = self.contested.remove(piece) else {
            return Err(GameError::UnknownTarget);
        };
        self.players[idx].board.place(row, col, recovered.digit);
        Ok(())
    }

    fn expose(&mut self, owner: PlayerId, digit: Digit) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.contested.push_back(ContestedPiece { owner, digit, seq });
    }

    fn finish_regular_action(&mut self) -> ActionOutcome {
        self.actions_taken += 1;
        if self.actions_taken >= self.active_count() {
            self.begin_settlement();
            ActionOutcome::SettlementStarted
        } else {
            self.advance_turn();
            if let Some(next) = self.current_player() {
                self.events.push_back(MatchEvent::TurnChanged(next));
            }
            ActionOutcome::TurnPassed
        }
    }

    fn advance_turn(&mut self) {
        if self.turn_order.is_empty() {
            return;
        }
        self.current_turn = (self.current_turn + 1) % self.turn_order.len();
        let mut hops = 0;
        while self.entry_is_eliminated(self.current_turn) && hops < self.turn_order.len() {
            self.current_turn = (self.current_turn + 1) % self.turn_order.len();
            hops += 1;
        }
    }

    fn entry_is_eliminated(&self, turn_idx: usize) -> bool {
        self.turn_order
            .get(turn_idx)
            .and_then(|id| self.players.iter().find(|p| p.id == *id))
            .is_some_and(|p| p.eliminated)
    }

    fn begin_settlement(&mut self) {
        self.phase = Phase::Settlement;
        self.fresh_settlement = true;
        self.events.push_back(MatchEvent::SettlementStarted);
        log::debug!(
            "room {}: round {} settling {} contested pieces",
            self.room_id,
            self.round,
            self.contested.len()
        );
    }

    fn record_loss(&mut self, player: PlayerId, digit: Digit) {
        if let Some(idx) = self.player_index(player) {
            self.players[idx].lost_digits.push(digit);
        }
    }

    /// A player with no board pieces and no contested pieces is out.
    fn check_elimination(&mut self, player: PlayerId) {
        let Some(idx) = self.player_index(player) else {
            return;
        };
        if self.players[idx].eliminated {
            return;
        }
        let has_board_pieces = !self.players[idx].board.is_empty();
        let has_contested_pieces = self.contested.iter().any(|piece| piece.owner == player);
        if !has_board_pieces && !has_contested_pieces {
            self.players[idx].eliminated = true;
            self.turn_order.retain(|id| *id != player);
            self.events.push_back(MatchEvent::PlayerEliminated(player));
            log::info!("room {}: player {player} eliminated", self.room_id);
        }
    }

    fn check_game_end(&mut self) -> Option<PlayerId> {
        if let Some(winner) = self.winner {
            return Some(winner);
        }
        let mut active = self.players.iter().filter(|p| !p.eliminated);
        let (first, rest) = (active.next(), active.next());
        if let (Some(last), None) = (first, rest) {
            let winner = last.id;
            self.winner = Some(winner);
            self.phase = Phase::Ended;
            self.events.push_back(MatchEvent::MatchEnded { winner });
            log::info!("room {}: match ended, winner {winner}", self.room_id);
            return Some(winner);
        }
        None
    }

    /// Close the round: return any leftover contested pieces to their
    /// owners' boards, reset the counters, and restart the action phase
    /// from the head of the turn order.
    fn end_round(&mut self) -> SettleProgress {
        while let Some(piece) = self.contested.pop_front() {
            let Some(idx) = self.player_index(piece.owner) else {
                continue;
            };
            if self.players[idx].eliminated {
                continue;
            }
            if let Some((row, col)) = self.players[idx].board.first_empty_cell() {
                self.players[idx].board.place(row, col, piece.digit);
                self.events.push_back(MatchEvent::PieceReturned {
                    player: piece.owner,
                    digit: piece.digit,
                    row,
                    col,
                });
            }
        }

        if let Some(winner) = self.check_game_end() {
            return SettleProgress::Finished(winner);
        }

        self.round += 1;
        self.actions_taken = 0;
        self.next_seq = 0;
        self.bonus_holder = None;
        self.fresh_settlement = false;
        self.phase = Phase::Action;
        // Turn pointer restarts from the head of the (possibly shrunk)
        // order each round, then skips anyone eliminated.
        self.current_turn = 0;
        let mut hops = 0;
        while self.entry_is_eliminated(self.current_turn) && hops < self.turn_order.len() {
            self.current_turn = (self.current_turn + 1) % self.turn_order.len().max(1);
            hops += 1;
        }
        self.events.push_back(MatchEvent::RoundStarted(self.round));
        log::debug!("room {}: round {} started", self.room_id, self.round);
        SettleProgress::RoundClosed
    }
}
