//! # Digit Duel
//!
//! Server-authoritative engine for a turn-based elimination game played by
//! 3 to 5 networked participants. Each player secretly arranges ten digits
//! on a private 3x6 grid; players alternately expose pieces to a shared
//! contested area, where exposed pieces are resolved pairwise by a fixed
//! digit-comparison rule until a single winner remains.
//!
//! ## Architecture
//!
//! - [`game`]: the in-memory core - pure rules, the match phase state
//!   machine (waiting, deployment, action, settlement, ended), turn
//!   rotation, and the re-entrant settlement resolution loop.
//! - [`room`]: one tokio actor per room serializing that room's commands,
//!   plus the process-wide [`room::MatchRegistry`]. The settlement reveal
//!   delay is a scheduled timer inside the actor, never a blocking sleep,
//!   so concurrent rooms never stall each other.
//! - [`stats`]: the storage collaborator boundary - an async repository
//!   trait the actor reports finished matches to.
//!
//! The transport layer (authentication, room membership, client delivery)
//! is external; it talks to this crate through [`room::MatchRegistry`] and
//! the broadcast subscription channels. Every broadcast snapshot is
//! redacted per recipient: opponents' boards reveal occupancy, not digits.
//!
//! ## Example
//!
//! ```no_run
//! use digit_duel::{InMemoryStats, MatchRegistry, RoomConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = MatchRegistry::new(Arc::new(InMemoryStats::new()));
//!     let players = vec![
//!         (1, "ada".to_string()),
//!         (2, "grace".to_string()),
//!         (3, "edsger".to_string()),
//!     ];
//!     registry
//!         .create("ab12".to_string(), RoomConfig::new(1), players)
//!         .await
//!         .expect("room creation");
//! }
//! ```

/// Core game logic: rules, entities, and the match state machine.
pub mod game;
pub use game::{
    ActionOutcome, GameError, Match, MatchEvent, SettleProgress,
    entities::{
        Action, BOARD_COLS, BOARD_ROWS, Board, ContestedPiece, Digit, MatchView, Phase, PlayerId,
        PlayerView, RoomId,
    },
    rules,
};

/// Per-room actors and the match registry.
pub mod room;
pub use room::{
    DeploymentGrid, MatchRegistry, RoomBroadcast, RoomConfig, RoomHandle, RoomMessage,
    RoomResponse,
};

/// Statistics storage boundary.
pub mod stats;
pub use stats::{InMemoryStats, MatchOutcome, PlayerRecord, StatsRepository};
