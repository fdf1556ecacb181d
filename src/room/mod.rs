//! Room module: per-room actors and the process-wide match registry.
//!
//! Each room's match runs inside its own tokio task with an mpsc inbox, so
//! commands for one room are serialized while rooms stay independent of
//! each other. The [`MatchRegistry`] spawns and tears down actors and maps
//! a room identifier to the live [`RoomHandle`].

pub mod actor;
pub mod config;
pub mod messages;
pub mod registry;

pub use actor::{RoomActor, RoomHandle};
pub use config::RoomConfig;
pub use messages::{DeploymentGrid, RoomBroadcast, RoomMessage, RoomResponse};
pub use registry::MatchRegistry;
