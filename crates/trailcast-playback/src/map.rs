//! Map-coordinate resolution.
//!
//! Producers report positions as `(x, y)` local to a numbered map. The
//! viewer lays every map out on one global plane, so each map id resolves
//! to a [`MapRegion`] giving its offset and (optionally) its size.
//!
//! An unresolvable map id is not an error: the point lands at the global
//! origin and a warning is logged the first time the id is seen.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

use serde::Deserialize;
use tracing::warn;
use trailcast_types::Coord;

/// Errors that can occur when loading map data.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Failed to read the map data file.
    #[error("failed to read map data: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The file is not valid map JSON.
    #[error("failed to parse map data: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// A region id is not an integer.
    #[error("invalid map id {id:?}: {reason}")]
    InvalidId {
        /// The offending id as written.
        id: String,
        /// Why it failed to parse.
        reason: String,
    },
}

/// A point on the global plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// The global origin.
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Construct a position.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation toward `other` by `t` in `[0, 1]`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            x: (other.x - self.x).mul_add(t, self.x),
            y: (other.y - self.y).mul_add(t, self.y),
        }
    }
}

/// Placement of one map on the global plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapRegion {
    /// Global position of the map's local origin.
    pub offset: Position,
    /// Map width and height; local coordinates are clamped into it.
    pub bounds: Option<(f64, f64)>,
}

impl MapRegion {
    /// Place a local coordinate on the global plane.
    pub fn place(&self, coord: &Coord) -> Position {
        let (mut x, mut y) = (int_to_f64(coord.x), int_to_f64(coord.y));
        if let Some((width, height)) = self.bounds {
            x = x.clamp(0.0, width.max(0.0));
            y = y.clamp(0.0, height.max(0.0));
        }
        Position::new(self.offset.x + x, self.offset.y + y)
    }
}

/// Resolves map ids to their global placement.
pub trait MapResolver {
    /// Look up the region for `map_id`.
    fn resolve(&self, map_id: i64) -> Option<MapRegion>;

    /// Convert a map-local coordinate to a global position. Unknown maps
    /// yield the origin.
    fn to_global(&self, coord: &Coord) -> Position {
        self.resolve(coord.map_id)
            .map_or(Position::ORIGIN, |region| region.place(coord))
    }
}

/// Resolver that puts every map at the origin with no bounds. Used when
/// no map data is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatResolver;

impl MapResolver for FlatResolver {
    fn resolve(&self, _map_id: i64) -> Option<MapRegion> {
        Some(MapRegion::default())
    }
}

/// On-disk shape of the map data file.
#[derive(Debug, Deserialize)]
struct MapFile {
    regions: Vec<RegionEntry>,
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    id: RegionId,
    coordinates: (f64, f64),
    #[serde(default)]
    bounds: Option<(f64, f64)>,
}

/// Region ids are written as strings in published map data; plain
/// integers are accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegionId {
    Number(i64),
    Text(String),
}

impl RegionId {
    fn parse(self) -> Result<i64, MapError> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s.trim().parse().map_err(|e: std::num::ParseIntError| {
                MapError::InvalidId {
                    reason: e.to_string(),
                    id: s,
                }
            }),
        }
    }
}

/// Map table loaded from JSON.
#[derive(Debug, Default)]
pub struct MapTable {
    regions: BTreeMap<i64, MapRegion>,
    warned: Mutex<BTreeSet<i64>>,
}

impl MapTable {
    /// Load a map table from a JSON file.
    pub fn load(path: &Path) -> Result<Self, MapError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a map table from JSON of the form
    /// `{"regions":[{"id":"12","coordinates":[x,y],"bounds":[w,h]}]}`.
    pub fn from_json(json: &str) -> Result<Self, MapError> {
        let file: MapFile = serde_json::from_str(json)?;
        let mut regions = BTreeMap::new();
        for entry in file.regions {
            let id = entry.id.parse()?;
            let (x, y) = entry.coordinates;
            regions.insert(
                id,
                MapRegion {
                    offset: Position::new(x, y),
                    bounds: entry.bounds,
                },
            );
        }
        Ok(Self::from_regions(regions))
    }

    /// Build a table from already-placed regions.
    pub fn from_regions(regions: BTreeMap<i64, MapRegion>) -> Self {
        Self {
            regions,
            warned: Mutex::new(BTreeSet::new()),
        }
    }

    /// Number of known maps.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the table has no maps.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl MapResolver for MapTable {
    fn resolve(&self, map_id: i64) -> Option<MapRegion> {
        let region = self.regions.get(&map_id).copied();
        if region.is_none() {
            let first_miss = self
                .warned
                .lock()
                .map(|mut warned| warned.insert(map_id))
                .unwrap_or(false);
            if first_miss {
                warn!(map_id, "Unknown map id, placing at origin");
            }
        }
        region
    }
}

/// Map coordinates are small; anything beyond `i32` saturates.
fn int_to_f64(value: i64) -> f64 {
    let clamped = i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX });
    f64::from(clamped)
}
