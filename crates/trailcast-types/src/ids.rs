//! Identifiers for connections, sessions, and animated agents.
//!
//! Connection and session ids are UUID v7 newtypes so they sort by
//! creation time. Agents are named by a structured [`AgentKey`] rather
//! than a formatted string; the `"{user}@{stack}"` rendering exists only
//! for display and filter matching.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wire::Metadata;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Unique identifier for a live relay connection (producer or consumer).
    ConnectionId
}

define_id! {
    /// Identity of an anonymous playback session.
    ///
    /// Minted for every update that carries no stack or env id (or when
    /// stacking is disabled), so each such update animates on its own.
    SessionId
}

/// The second half of an [`AgentKey`]: which stream of one user's
/// updates an agent animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackId {
    /// A producer-supplied `stack_id` merging several envs under one agent.
    Explicit(i64),
    /// The producer's `env_id`.
    Env(i64),
    /// No usable id; one agent per update.
    Anonymous(SessionId),
}

impl StackId {
    /// Resolve the stack id for an incoming update.
    ///
    /// With stacking enabled an explicit `stack_id` wins over `env_id`.
    /// Without stacking, or when neither id is present, a fresh
    /// anonymous session is minted.
    pub fn resolve(metadata: &Metadata, stacking: bool) -> Self {
        if !stacking {
            return Self::Anonymous(SessionId::new());
        }
        match (metadata.stack_id, metadata.env_id) {
            (Some(stack), _) => Self::Explicit(stack),
            (None, Some(env)) => Self::Env(env),
            (None, None) => Self::Anonymous(SessionId::new()),
        }
    }

    /// Whether this id was minted for a single anonymous update.
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous(_))
    }
}

impl core::fmt::Display for StackId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Explicit(id) | Self::Env(id) => write!(f, "{id}"),
            Self::Anonymous(session) => write!(f, "anon-{session}"),
        }
    }
}

/// Structured identity of one animated agent: `(user, stack)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentKey {
    /// The producing user's name (never empty).
    pub user: String,
    /// Which of the user's streams this agent animates.
    pub stack: StackId,
}

impl AgentKey {
    /// Build a key from its parts.
    pub fn new(user: impl Into<String>, stack: StackId) -> Self {
        Self {
            user: user.into(),
            stack,
        }
    }

    /// Build the key for an incoming update's metadata.
    pub fn for_metadata(metadata: &Metadata, stacking: bool) -> Self {
        Self::new(metadata.user.clone(), StackId::resolve(metadata, stacking))
    }
}

impl core::fmt::Display for AgentKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.user, self.stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(env_id: Option<i64>, stack_id: Option<i64>) -> Metadata {
        Metadata {
            user: String::from("alice"),
            env_id,
            stack_id,
            ..Metadata::default()
        }
    }

    #[test]
    fn stacking_prefers_explicit_stack_id() {
        let stack = StackId::resolve(&metadata(Some(3), Some(9)), true);
        assert_eq!(stack, StackId::Explicit(9));
    }

    #[test]
    fn stacking_falls_back_to_env_id() {
        let stack = StackId::resolve(&metadata(Some(3), None), true);
        assert_eq!(stack, StackId::Env(3));
    }

    #[test]
    fn missing_ids_mint_distinct_sessions() {
        let a = StackId::resolve(&metadata(None, None), true);
        let b = StackId::resolve(&metadata(None, None), true);
        assert!(a.is_anonymous());
        assert_ne!(a, b);
    }

    #[test]
    fn stacking_disabled_is_always_anonymous() {
        let stack = StackId::resolve(&metadata(Some(3), Some(9)), false);
        assert!(stack.is_anonymous());
    }

    #[test]
    fn agent_key_display_is_user_at_stack() {
        let key = AgentKey::new("alice", StackId::Env(42));
        assert_eq!(key.to_string(), "alice@42");

        let anon = AgentKey::new("bob", StackId::Anonymous(SessionId::new()));
        assert!(anon.to_string().starts_with("bob@anon-"));
    }

    #[test]
    fn agent_keys_order_by_user_then_stack() {
        let a = AgentKey::new("alice", StackId::Env(2));
        let b = AgentKey::new("alice", StackId::Env(10));
        let c = AgentKey::new("bob", StackId::Env(1));
        assert!(a < b);
        assert!(b < c);
    }
}
