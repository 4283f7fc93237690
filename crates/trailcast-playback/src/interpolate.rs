//! Per-frame position sampling.
//!
//! A batch plays linearly over its animation window: progress `p` in
//! `[0, 1]` selects the pair of path points straddling `p * (len - 1)`
//! and lerps between them. If those two points are more than the
//! teleport threshold apart on either axis (a warp, a map change) the
//! frame is hidden instead of drawn sliding across the map.

use trailcast_types::Coord;

use crate::map::{MapResolver, Position};
use crate::sprite::Direction;

/// One sampled frame for an agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Interpolated global position.
    pub position: Position,
    /// The straddled points are too far apart to animate between.
    pub hidden: bool,
    /// Facing, when the path says or implies one.
    pub direction: Option<Direction>,
    /// Whether the straddled points differ.
    pub walking: bool,
}

/// Fraction of the animation window elapsed, clamped to `[0, 1]`. A
/// non-positive or non-finite window counts as already finished.
pub fn progress(elapsed_ms: f64, duration_ms: f64) -> f64 {
    if !(duration_ms.is_finite() && duration_ms > 0.0) {
        return 1.0;
    }
    let p = elapsed_ms / duration_ms;
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Sample `path` at `progress`. Returns `None` for an empty path.
pub fn sample(
    path: &[Coord],
    progress: f64,
    resolver: &dyn MapResolver,
    teleport_threshold: f64,
) -> Option<Sample> {
    let last = path.len().checked_sub(1)?;
    if last == 0 {
        let only = path.first()?;
        return Some(Sample {
            position: resolver.to_global(only),
            hidden: false,
            direction: only.direction.and_then(Direction::from_wire),
            walking: false,
        });
    }

    let (index, t) = segment(last, progress);
    let from = path.get(index)?;
    let to = path.get(index.checked_add(1)?)?;
    let a = resolver.to_global(from);
    let b = resolver.to_global(to);
    let (dx, dy) = (b.x - a.x, b.y - a.y);

    Some(Sample {
        position: a.lerp(b, t),
        hidden: dx.abs() > teleport_threshold || dy.abs() > teleport_threshold,
        direction: to
            .direction
            .and_then(Direction::from_wire)
            .or_else(|| Direction::from_delta(dx, dy)),
        walking: from != to,
    })
}

/// Split progress over `last` segments into a segment index and the
/// fraction within it. Progress 1.0 lands at the end of the final
/// segment.
fn segment(last: usize, progress: f64) -> (usize, f64) {
    let segments = f64::from(u32::try_from(last).unwrap_or(u32::MAX));
    let scaled = progress.clamp(0.0, 1.0) * segments;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let index = (scaled.floor() as usize).min(last.saturating_sub(1));
    let base = f64::from(u32::try_from(index).unwrap_or(u32::MAX));
    (index, (scaled - base).clamp(0.0, 1.0))
}
