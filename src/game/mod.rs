//! Digit-duel game engine: rules, match state, and settlement resolution.
//!
//! This module provides the in-memory core:
//! - Pure legality and confrontation rules ([`rules`])
//! - The match aggregate and its phase state machine ([`state_machine`])
//! - Data model and redacted view types ([`entities`])

pub mod entities;
pub mod rules;
pub mod state_machine;

pub use state_machine::{ActionOutcome, GameError, Match, MatchEvent, SettleProgress};
