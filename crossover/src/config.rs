use crate::ConfigError;
use geotile::Projection;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How a track segment's orbit direction is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DirectionRule {
    /// Use each point's direction field, deriving it from the latitude
    /// rate where the field is absent.
    #[default]
    Provided,

    /// Ignore the direction field and use the sign of the latitude
    /// change between consecutive points.
    LatitudeRate,
}

impl FromStr for DirectionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "provided" => Ok(Self::Provided),
            "latitude-rate" => Ok(Self::LatitudeRate),
            other => Err(format!("unknown direction rule '{other}'")),
        }
    }
}

impl fmt::Display for DirectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provided => write!(f, "provided"),
            Self::LatitudeRate => write!(f, "latitude-rate"),
        }
    }
}

/// How value and time are interpolated at a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Interpolation {
    /// Between the two vertices of the crossing edge.
    #[default]
    Linear,

    /// Cubic through the four vertices around the crossing edge, over
    /// along-track distance. Segments with fewer than four vertices
    /// fall back to linear.
    Cubic,
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "linear" => Ok(Self::Linear),
            "cubic" => Ok(Self::Cubic),
            other => Err(format!("unknown interpolation '{other}'")),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Cubic => write!(f, "cubic"),
        }
    }
}

/// Which missions may be crossed with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pairing {
    #[default]
    All,

    /// Only pair segments from different missions (bias and rate
    /// estimation between missions).
    InterMission,

    /// Only pair segments from the same mission.
    IntraMission,
}

impl Pairing {
    pub fn allows(self, mission_a: u32, mission_b: u32) -> bool {
        match self {
            Self::All => true,
            Self::InterMission => mission_a != mission_b,
            Self::IntraMission => mission_a == mission_b,
        }
    }
}

impl FromStr for Pairing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "all" => Ok(Self::All),
            "inter" | "inter-mission" => Ok(Self::InterMission),
            "intra" | "intra-mission" => Ok(Self::IntraMission),
            other => Err(format!("unknown pairing '{other}'")),
        }
    }
}

impl fmt::Display for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::InterMission => write!(f, "inter-mission"),
            Self::IntraMission => write!(f, "intra-mission"),
        }
    }
}

/// Validated run configuration.
///
/// Distances (`cell_size`, `buffer_size`, `search_radius`,
/// `intersection_epsilon`) are in projected units: degrees for
/// EPSG:4326, meters for the polar stereographic projections.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Config {
    cell_size: f64,
    buffer_size: f64,
    time_gap_threshold: f64,
    intersection_epsilon: f64,
    projection: Projection,
    search_radius: Option<f64>,
    direction_rule: DirectionRule,
    pairing: Pairing,
    interpolation: Interpolation,
    subsample: usize,
    time_span: Option<(f64, f64)>,
    imbalance_factor: f64,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            cell_size: None,
            buffer_size: None,
            time_gap_threshold: None,
            intersection_epsilon: 1e-6,
            projection: Projection::PlateCarree,
            search_radius: None,
            direction_rule: DirectionRule::Provided,
            pairing: Pairing::All,
            interpolation: Interpolation::Linear,
            subsample: 1,
            time_span: None,
            imbalance_factor: 10.0,
        }
    }

    /// Tile width and height.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Halo width around each tile.
    pub fn buffer_size(&self) -> f64 {
        self.buffer_size
    }

    /// Largest time step allowed between consecutive points of one
    /// segment.
    pub fn time_gap_threshold(&self) -> f64 {
        self.time_gap_threshold
    }

    /// Distance under which two crossovers of the same track pair are
    /// considered one.
    pub fn intersection_epsilon(&self) -> f64 {
        self.intersection_epsilon
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Maximum distance from a crossover to its bracketing points.
    pub fn search_radius(&self) -> Option<f64> {
        self.search_radius
    }

    pub fn direction_rule(&self) -> DirectionRule {
        self.direction_rule
    }

    pub fn pairing(&self) -> Pairing {
        self.pairing
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Every n:th point is used to locate crossings before refining.
    pub fn subsample(&self) -> usize {
        self.subsample
    }

    /// Inclusive window of observation times to keep.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        self.time_span
    }

    pub fn imbalance_factor(&self) -> f64 {
        self.imbalance_factor
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    /// Tile size (required).
    cell_size: Option<f64>,

    /// Tile buffer (required, may be 0).
    buffer_size: Option<f64>,

    /// Segment split threshold (required).
    time_gap_threshold: Option<f64>,

    /// Dedup tolerance (defaults to 1e-6).
    intersection_epsilon: f64,

    /// Defaults to EPSG:4326.
    projection: Projection,

    /// Defaults to unlimited.
    search_radius: Option<f64>,

    direction_rule: DirectionRule,

    pairing: Pairing,

    /// Defaults to linear.
    interpolation: Interpolation,

    /// Defaults to 1, every point.
    subsample: usize,

    /// Defaults to all times.
    time_span: Option<(f64, f64)>,

    /// Defaults to 10.
    imbalance_factor: f64,
}

impl ConfigBuilder {
    #[must_use]
    pub fn cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = Some(cell_size);
        self
    }

    #[must_use]
    pub fn buffer_size(mut self, buffer_size: f64) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    #[must_use]
    pub fn time_gap_threshold(mut self, threshold: f64) -> Self {
        self.time_gap_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn intersection_epsilon(mut self, epsilon: f64) -> Self {
        self.intersection_epsilon = epsilon;
        self
    }

    #[must_use]
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    #[must_use]
    pub fn search_radius(mut self, radius: f64) -> Self {
        self.search_radius = Some(radius);
        self
    }

    #[must_use]
    pub fn direction_rule(mut self, rule: DirectionRule) -> Self {
        self.direction_rule = rule;
        self
    }

    #[must_use]
    pub fn pairing(mut self, pairing: Pairing) -> Self {
        self.pairing = pairing;
        self
    }

    #[must_use]
    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    #[must_use]
    pub fn subsample(mut self, every: usize) -> Self {
        self.subsample = every;
        self
    }

    #[must_use]
    pub fn time_span(mut self, start: f64, end: f64) -> Self {
        self.time_span = Some((start, end));
        self
    }

    #[must_use]
    pub fn imbalance_factor(mut self, factor: f64) -> Self {
        self.imbalance_factor = factor;
        self
    }

    pub fn build(&self) -> Result<Config, ConfigError> {
        let cell_size = self.cell_size.ok_or(ConfigError::Missing("cell_size"))?;
        let buffer_size = self.buffer_size.ok_or(ConfigError::Missing("buffer_size"))?;
        let time_gap_threshold = self
            .time_gap_threshold
            .ok_or(ConfigError::Missing("time_gap_threshold"))?;

        check("cell_size", cell_size, "positive and finite", |v| {
            v.is_finite() && v > 0.0
        })?;
        check("buffer_size", buffer_size, "non-negative and finite", |v| {
            v.is_finite() && v >= 0.0
        })?;
        check("time_gap_threshold", time_gap_threshold, "positive", |v| v > 0.0)?;
        check(
            "intersection_epsilon",
            self.intersection_epsilon,
            "non-negative and finite",
            |v| v.is_finite() && v >= 0.0,
        )?;
        check("imbalance_factor", self.imbalance_factor, "positive", |v| {
            v > 0.0
        })?;
        if self.subsample == 0 {
            return Err(ConfigError::Subsample);
        }
        if let Some((start, end)) = self.time_span {
            if start.is_nan() || end.is_nan() || start > end {
                return Err(ConfigError::TimeSpan(start, end));
            }
        }
        if let Some(search_radius) = self.search_radius {
            check("search_radius", search_radius, "positive and finite", |v| {
                v.is_finite() && v > 0.0
            })?;
            // Bracketing points of a crossover near a tile edge must
            // land in that tile's halo.
            if buffer_size < search_radius {
                return Err(ConfigError::BufferTooSmall {
                    buffer_size,
                    search_radius,
                });
            }
        }

        Ok(Config {
            cell_size,
            buffer_size,
            time_gap_threshold,
            intersection_epsilon: self.intersection_epsilon,
            projection: self.projection,
            search_radius: self.search_radius,
            direction_rule: self.direction_rule,
            pairing: self.pairing,
            interpolation: self.interpolation,
            subsample: self.subsample,
            time_span: self.time_span,
            imbalance_factor: self.imbalance_factor,
        })
    }
}

fn check(
    name: &'static str,
    value: f64,
    requirement: &'static str,
    valid: impl Fn(f64) -> bool,
) -> Result<(), ConfigError> {
    if valid(value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            requirement,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, DirectionRule, Interpolation, Pairing};
    use geotile::Projection;

    fn builder() -> super::ConfigBuilder {
        Config::builder()
            .cell_size(1.0)
            .buffer_size(0.1)
            .time_gap_threshold(10.0)
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();
        assert_eq!(config.projection(), Projection::PlateCarree);
        assert_eq!(config.direction_rule(), DirectionRule::Provided);
        assert_eq!(config.pairing(), Pairing::All);
        assert_eq!(config.interpolation(), Interpolation::Linear);
        assert_eq!(config.subsample(), 1);
        assert_eq!(config.search_radius(), None);
        assert_eq!(config.time_span(), None);
    }

    #[test]
    fn test_missing() {
        assert_eq!(
            Config::builder().buffer_size(0.0).time_gap_threshold(1.0).build(),
            Err(ConfigError::Missing("cell_size"))
        );
        assert_eq!(
            Config::builder().cell_size(1.0).time_gap_threshold(1.0).build(),
            Err(ConfigError::Missing("buffer_size"))
        );
        assert_eq!(
            Config::builder().cell_size(1.0).buffer_size(0.0).build(),
            Err(ConfigError::Missing("time_gap_threshold"))
        );
    }

    #[test]
    fn test_buffer_must_cover_search_radius() {
        assert_eq!(
            builder().search_radius(0.5).build(),
            Err(ConfigError::BufferTooSmall {
                buffer_size: 0.1,
                search_radius: 0.5
            })
        );
        assert!(builder().search_radius(0.1).build().is_ok());
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            builder().cell_size(0.0).build(),
            Err(ConfigError::OutOfRange { name: "cell_size", .. })
        ));
        assert!(matches!(
            builder().buffer_size(-1.0).build(),
            Err(ConfigError::OutOfRange { name: "buffer_size", .. })
        ));
        assert!(matches!(
            builder().time_gap_threshold(0.0).build(),
            Err(ConfigError::OutOfRange { name: "time_gap_threshold", .. })
        ));
        assert!(matches!(
            builder().intersection_epsilon(f64::NAN).build(),
            Err(ConfigError::OutOfRange { name: "intersection_epsilon", .. })
        ));
        assert_eq!(builder().subsample(0).build(), Err(ConfigError::Subsample));
        assert_eq!(
            builder().time_span(2.0, 1.0).build(),
            Err(ConfigError::TimeSpan(2.0, 1.0))
        );
        // Disabling gap splitting is allowed.
        assert!(builder().time_gap_threshold(f64::INFINITY).build().is_ok());
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("latitude-rate".parse(), Ok(DirectionRule::LatitudeRate));
        assert_eq!("inter".parse(), Ok(Pairing::InterMission));
        assert_eq!("cubic".parse(), Ok(Interpolation::Cubic));
        assert_eq!(Interpolation::Cubic.to_string(), "cubic");
        assert!("spline".parse::<Interpolation>().is_err());
        assert!("sideways".parse::<Pairing>().is_err());
        assert!(Pairing::InterMission.allows(0, 1));
        assert!(!Pairing::InterMission.allows(1, 1));
        assert!(Pairing::IntraMission.allows(1, 1));
    }
}
