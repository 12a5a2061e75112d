use geo::geometry::Coord;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Direction of travel of a satellite ground track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Returns the direction implied by a change in latitude, if any.
    pub fn from_latitude_rate(dlat: f64) -> Option<Self> {
        if dlat > 0.0 {
            Some(Self::Ascending)
        } else if dlat < 0.0 {
            Some(Self::Descending)
        } else {
            None
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// A single altimetry observation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// Degrees, either [-180, 180] or [0, 360] but consistently so.
    pub lon: f64,

    /// Degrees, [-90, 90].
    pub lat: f64,

    /// Observation time, any monotonic unit (decimal years, seconds).
    pub time: f64,

    /// Corrected height or other quantity of interest.
    pub value: f64,

    /// Orbit or pass number.
    pub track_id: u64,

    /// Orbit direction, when the source provides one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub direction: Option<Direction>,

    /// Source mission or input file.
    #[cfg_attr(feature = "serde", serde(default))]
    pub mission_id: u32,
}

impl Point {
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }

    /// (mission, track) identifying the pass this point belongs to.
    pub fn track_key(&self) -> TrackKey {
        TrackKey {
            mission_id: self.mission_id,
            track_id: self.track_id,
        }
    }
}

/// Identifies a pass across all missions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackKey {
    pub mission_id: u32,
    pub track_id: u64,
}
