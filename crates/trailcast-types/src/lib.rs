//! Shared type definitions for Trailcast.
//!
//! This crate is the single source of truth for everything that crosses
//! a connection boundary: the producer update message, the stats
//! envelope pushed to consumers, and the identity types both sides use
//! to name connections and animated agents.
//!
//! # Modules
//!
//! - [`ids`] -- Connection and session identifiers, stack ids, and the
//!   structured [`AgentKey`] composite key
//! - [`enums`] -- Small closed enumerations (connection role)
//! - [`wire`] -- JSON wire messages and their codec

pub mod enums;
pub mod ids;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use enums::Role;
pub use ids::{AgentKey, ConnectionId, SessionId, StackId};
pub use wire::{
    CodecError, ConsumerMessage, Coord, Metadata, StatsEnvelope, StatsSnapshot, UpdateMessage,
    ValidationError,
};
