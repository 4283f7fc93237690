//! Enumeration types shared across the relay and its clients.

use serde::{Deserialize, Serialize};

/// Which side of the relay a connection belongs to.
///
/// Producers push [`UpdateMessage`](crate::UpdateMessage)s in; consumers
/// receive the forwarded updates plus periodic stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A connection that supplies position updates.
    Producer,
    /// A connection that receives forwarded updates and stats.
    Consumer,
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Producer => f.write_str("producer"),
            Self::Consumer => f.write_str("consumer"),
        }
    }
}
