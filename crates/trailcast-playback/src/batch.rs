//! One queued chunk of path points.

use trailcast_types::{Coord, UpdateMessage};

/// A path to animate along, plus the presentation metadata it arrived
/// with. `start_time` is set the first frame the batch plays.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    path: Vec<Coord>,
    extra: Option<String>,
    color: Option<String>,
    sprite_id: Option<i64>,
    start_time: Option<f64>,
}

impl Batch {
    /// Build a batch from an update, keeping at most `max_points` of the
    /// most recent points.
    pub fn from_update(update: &UpdateMessage, max_points: usize) -> Self {
        let skip = update.coords.len().saturating_sub(max_points);
        Self {
            path: update.coords.iter().skip(skip).copied().collect(),
            extra: update.metadata.extra.clone(),
            color: update.metadata.color.clone(),
            sprite_id: update.metadata.sprite_id,
            start_time: None,
        }
    }

    /// The points to animate through, oldest first.
    pub fn path(&self) -> &[Coord] {
        &self.path
    }

    /// Number of points in the path.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// Whether the path is empty.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// The final point of the path.
    pub fn last_point(&self) -> Option<Coord> {
        self.path.last().copied()
    }

    /// Free-form label text from the producer.
    pub fn extra(&self) -> Option<&str> {
        self.extra.as_deref()
    }

    /// Tint from the producer.
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Sprite selector from the producer.
    pub const fn sprite_id(&self) -> Option<i64> {
        self.sprite_id
    }

    /// When this batch started playing, if it has.
    pub const fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// Record the playback start on first call; later calls keep the
    /// original start. Returns the start time.
    pub fn start_at(&mut self, now: f64) -> f64 {
        *self.start_time.get_or_insert(now)
    }

    /// Prepend the point the previous batch ended on, so playback picks
    /// up exactly where it left off. The spliced point is kept; if the
    /// path grows past `max_points`, the oldest original points go.
    pub fn splice_front(&mut self, point: Coord, max_points: usize) {
        self.path.insert(0, point);
        let excess = self.path.len().saturating_sub(max_points.max(1));
        if excess > 0 {
            self.path.drain(1..=excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use trailcast_types::Metadata;

    use super::*;

    fn update(points: i64) -> UpdateMessage {
        UpdateMessage {
            metadata: Metadata {
                user: "alice".to_owned(),
                extra: Some("route 1".to_owned()),
                ..Metadata::default()
            },
            coords: (0..points).map(|i| Coord::new(i, 0, 0)).collect(),
        }
    }

    #[test]
    fn long_paths_keep_most_recent_points() {
        let batch = Batch::from_update(&update(2100), 2048);
        assert_eq!(batch.len(), 2048);
        assert_eq!(batch.path().first().map(|c| c.x), Some(52));
        assert_eq!(batch.last_point().map(|c| c.x), Some(2099));
    }

    #[test]
    fn metadata_is_carried() {
        let batch = Batch::from_update(&update(3), 2048);
        assert_eq!(batch.extra(), Some("route 1"));
        assert_eq!(batch.start_time(), None);
    }

    #[test]
    fn start_is_recorded_once() {
        let mut batch = Batch::from_update(&update(3), 2048);
        assert_eq!(batch.start_at(10.0).to_bits(), 10.0_f64.to_bits());
        assert_eq!(batch.start_at(50.0).to_bits(), 10.0_f64.to_bits());
    }

    #[test]
    fn splice_keeps_the_joined_point() {
        let mut batch = Batch::from_update(&update(3), 2048);
        batch.splice_front(Coord::new(-1, 0, 0), 2048);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.path().first().map(|c| c.x), Some(-1));

        let mut full = Batch::from_update(&update(2048), 2048);
        full.splice_front(Coord::new(-1, 0, 0), 2048);
        assert_eq!(full.len(), 2048);
        assert_eq!(full.path().first().map(|c| c.x), Some(-1));
        assert_eq!(full.path().get(1).map(|c| c.x), Some(1));
        assert_eq!(full.last_point().map(|c| c.x), Some(2047));
    }
}
