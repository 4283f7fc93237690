//! Facing and sprite selection.

use std::fmt;

/// Which way an agent faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Facing the viewer.
    #[default]
    Down,
    /// Facing away.
    Up,
    /// Facing left.
    Left,
    /// Facing right.
    Right,
}

impl Direction {
    /// Decode a facing value as sent by producers (0 down, 4 up, 8 left,
    /// 12 right). Other values are unknown.
    pub const fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Down),
            4 => Some(Self::Up),
            8 => Some(Self::Left),
            12 => Some(Self::Right),
            _ => None,
        }
    }

    /// Derive a facing from a movement delta. The dominant axis wins;
    /// no movement yields `None`.
    pub fn from_delta(dx: f64, dy: f64) -> Option<Self> {
        if dx.abs() > dy.abs() {
            Some(if dx > 0.0 { Self::Right } else { Self::Left })
        } else if dy.abs() > 0.0 {
            Some(if dy > 0.0 { Self::Down } else { Self::Up })
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::Left => "left",
            Self::Right => "right",
        };
        f.write_str(s)
    }
}

/// Everything a renderer needs to pick a sprite frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteState {
    /// Sprite sheet selector from the update metadata (0 when absent).
    pub sprite_id: i64,
    /// Current facing.
    pub direction: Direction,
    /// Whether the agent moved between the two straddled path points.
    pub walking: bool,
    /// Producer-chosen tint as `0xRRGGBB`, when one was sent and parses.
    pub tint: Option<u32>,
}

/// Parse a producer colour (`#rrggbb` or `rrggbb`) into `0xRRGGBB`.
/// Anything else yields `None` and the sprite is drawn untinted.
pub fn parse_tint(color: &str) -> Option<u32> {
    let hex = color.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}
