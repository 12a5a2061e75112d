//! Map projections used to turn geographic coordinates into the plane
//! where tiling and intersection tests happen.
//!
//! # References
//!
//! 1. Snyder, J. P. (1987), _Map Projections: A Working Manual_,
//!    USGS Professional Paper 1395, pp. 154-163 (polar stereographic,
//!    ellipsoidal form with a latitude of true scale).
//! 1. [EPSG:3031](https://epsg.io/3031) and [EPSG:3413](https://epsg.io/3413)

use crate::GridError;
use geo::geometry::Coord;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::{
    f64::consts::{FRAC_PI_2, FRAC_PI_4},
    fmt,
    str::FromStr,
};

/// WGS84 semi-major axis in meters.
const WGS84_A: f64 = 6_378_137.0;

/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;

const MAX_INVERSE_ITERATIONS: usize = 15;

/// A forward/inverse coordinate transform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Projection {
    /// Longitude and latitude used directly as planar x and y
    /// (EPSG:4326). Units are degrees.
    PlateCarree,

    /// Polar stereographic on the WGS84 ellipsoid. Units are meters.
    PolarStereographic(PolarStereographic),
}

impl Default for Projection {
    fn default() -> Self {
        Self::PlateCarree
    }
}

impl Projection {
    /// Returns the projection registered under `code`.
    pub fn from_epsg(code: u32) -> Result<Self, GridError> {
        match code {
            4326 => Ok(Self::PlateCarree),
            3031 => Ok(Self::PolarStereographic(PolarStereographic::south())),
            3413 => Ok(Self::PolarStereographic(PolarStereographic::north())),
            other => Err(GridError::Projection(format!("EPSG:{other}"))),
        }
    }

    /// Returns the EPSG code of this projection, if it has one.
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Self::PlateCarree => Some(4326),
            Self::PolarStereographic(ps) if *ps == PolarStereographic::south() => Some(3031),
            Self::PolarStereographic(ps) if *ps == PolarStereographic::north() => Some(3413),
            Self::PolarStereographic(_) => None,
        }
    }

    /// Projects a (lon, lat) coordinate in degrees.
    pub fn forward(&self, coord: Coord<f64>) -> Result<Coord<f64>, GridError> {
        validate_geographic(coord)?;
        match self {
            Self::PlateCarree => Ok(coord),
            Self::PolarStereographic(ps) => ps.forward(coord),
        }
    }

    /// Returns the (lon, lat) coordinate in degrees of a projected
    /// coordinate, with lon in (-180, 180].
    pub fn inverse(&self, coord: Coord<f64>) -> Coord<f64> {
        match self {
            Self::PlateCarree => Coord {
                x: wrap_longitude(coord.x),
                y: coord.y,
            },
            Self::PolarStereographic(ps) => ps.inverse(coord),
        }
    }
}

impl FromStr for Projection {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, GridError> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "plate-carree" | "geographic" => Ok(Self::PlateCarree),
            "south-polar" | "antarctic" => Self::from_epsg(3031),
            "north-polar" | "arctic" => Self::from_epsg(3413),
            code => {
                let code = code.strip_prefix("epsg:").unwrap_or(code);
                let code = code
                    .parse::<u32>()
                    .map_err(|_| GridError::Projection(s.to_string()))?;
                Self::from_epsg(code)
            }
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.epsg(), self) {
            (Some(code), _) => write!(f, "EPSG:{code}"),
            (None, Self::PolarStereographic(ps)) => write!(
                f,
                "polar stereographic ({:?}, lat_ts {}, lon0 {})",
                ps.hemisphere, ps.lat_ts, ps.lon0
            ),
            (None, Self::PlateCarree) => write!(f, "plate carree"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    fn sign(self) -> f64 {
        match self {
            Self::North => 1.0,
            Self::South => -1.0,
        }
    }
}

/// Polar stereographic projection (Snyder's variant with latitude of
/// true scale).
///
/// The southern aspect is computed through the northern formulas with
/// every angle and output coordinate negated.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolarStereographic {
    hemisphere: Hemisphere,

    /// Absolute latitude of true scale in degrees.
    lat_ts: f64,

    /// Central meridian in degrees.
    lon0: f64,
}

impl PolarStereographic {
    /// Antarctic Polar Stereographic, EPSG:3031.
    pub fn south() -> Self {
        Self {
            hemisphere: Hemisphere::South,
            lat_ts: 71.0,
            lon0: 0.0,
        }
    }

    /// NSIDC Sea Ice Polar Stereographic North, EPSG:3413.
    pub fn north() -> Self {
        Self {
            hemisphere: Hemisphere::North,
            lat_ts: 70.0,
            lon0: -45.0,
        }
    }

    /// `lat_ts` is the absolute latitude of true scale, which must lie
    /// strictly between the equator and the pole.
    pub fn new(hemisphere: Hemisphere, lat_ts: f64, lon0: f64) -> Result<Self, GridError> {
        let lat_ts = lat_ts.abs();
        if lat_ts > 0.0 && lat_ts < 90.0 && lon0.is_finite() {
            Ok(Self {
                hemisphere,
                lat_ts,
                lon0,
            })
        } else {
            Err(GridError::Projection(format!(
                "polar stereographic lat_ts {lat_ts}, lon0 {lon0}"
            )))
        }
    }

    fn forward(&self, Coord { x: lon, y: lat }: Coord<f64>) -> Result<Coord<f64>, GridError> {
        let s = self.hemisphere.sign();
        let phi = s * lat.to_radians();
        // The opposite pole maps to infinity.
        if (phi + FRAC_PI_2).abs() < 1e-12 {
            return Err(GridError::OutOfDomain { lon, lat });
        }
        let dlam = s * lon.to_radians() - s * self.lon0.to_radians();
        let rho = WGS84_A * self.mc() * tsfn(phi) / self.tc();
        Ok(Coord {
            x: s * rho * dlam.sin(),
            y: s * -rho * dlam.cos(),
        })
    }

    fn inverse(&self, Coord { x, y }: Coord<f64>) -> Coord<f64> {
        let s = self.hemisphere.sign();
        let (x, y) = (s * x, s * y);
        let e = eccentricity();
        let t = x.hypot(y) * self.tc() / (WGS84_A * self.mc());

        let mut phi = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..MAX_INVERSE_ITERATIONS {
            let esin = e * phi.sin();
            let next = FRAC_PI_2 - 2.0 * (t * ((1.0 - esin) / (1.0 + esin)).powf(e / 2.0)).atan();
            let done = (next - phi).abs() < 1e-12;
            phi = next;
            if done {
                break;
            }
        }

        let lam = s * self.lon0.to_radians() + x.atan2(-y);
        Coord {
            x: wrap_longitude(s * lam.to_degrees()),
            y: s * phi.to_degrees(),
        }
    }

    fn mc(&self) -> f64 {
        let e = eccentricity();
        let phi_c = self.lat_ts.to_radians();
        phi_c.cos() / (1.0 - (e * phi_c.sin()).powi(2)).sqrt()
    }

    fn tc(&self) -> f64 {
        tsfn(self.lat_ts.to_radians())
    }
}

fn eccentricity() -> f64 {
    (WGS84_F * (2.0 - WGS84_F)).sqrt()
}

/// Snyder eq. 15-9.
fn tsfn(phi: f64) -> f64 {
    let e = eccentricity();
    let esin = e * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - esin) / (1.0 + esin)).powf(e / 2.0)
}

/// Wraps degrees into (-180, 180].
fn wrap_longitude(lon: f64) -> f64 {
    let lon = lon % 360.0;
    if lon <= -180.0 {
        lon + 360.0
    } else if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

fn validate_geographic(coord: Coord<f64>) -> Result<(), GridError> {
    let Coord { x: lon, y: lat } = coord;
    if lon.is_finite()
        && lat.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=360.0).contains(&lon)
    {
        Ok(())
    } else {
        Err(GridError::OutOfDomain { lon, lat })
    }
}

#[cfg(test)]
mod tests {
    use super::{eccentricity, wrap_longitude, Coord, PolarStereographic, Projection, WGS84_A};
    use crate::GridError;
    use approx::assert_relative_eq;

    #[test]
    fn test_epsg_lookup() {
        assert_eq!(Projection::from_epsg(4326).unwrap(), Projection::PlateCarree);
        assert_eq!("EPSG:3031".parse::<Projection>().unwrap().epsg(), Some(3031));
        assert_eq!("3413".parse::<Projection>().unwrap().epsg(), Some(3413));
        assert!(matches!(
            "32633".parse::<Projection>(),
            Err(GridError::Projection(_))
        ));
        assert_eq!(Projection::from_epsg(3031).unwrap().to_string(), "EPSG:3031");
    }

    #[test]
    fn test_out_of_domain() {
        let proj = Projection::PlateCarree;
        for (x, y) in [(0.0, 90.5), (0.0, -91.0), (361.0, 0.0), (-181.0, 0.0), (f64::NAN, 0.0)] {
            assert!(matches!(
                proj.forward(Coord { x, y }),
                Err(GridError::OutOfDomain { .. })
            ));
        }
        let south = Projection::from_epsg(3031).unwrap();
        assert!(south.forward(Coord { x: 10.0, y: 90.0 }).is_err());
        assert!(south.forward(Coord { x: 10.0, y: -90.0 }).is_ok());
    }

    #[test]
    fn test_south_polar_axes() {
        let south = Projection::from_epsg(3031).unwrap();
        // Greenwich points up the map, 90E points right.
        let up = south.forward(Coord { x: 0.0, y: -80.0 }).unwrap();
        assert_relative_eq!(up.x, 0.0, epsilon = 1e-6);
        assert!(up.y > 0.0);
        let right = south.forward(Coord { x: 90.0, y: -80.0 }).unwrap();
        assert!(right.x > 0.0);
        assert_relative_eq!(right.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_true_scale_radius() {
        // At the latitude of true scale rho equals a * m_c.
        let ps = PolarStereographic::south();
        let xy = ps.forward(Coord { x: 0.0, y: -71.0 }).unwrap();
        let e = eccentricity();
        let phi_c = 71.0_f64.to_radians();
        let mc = phi_c.cos() / (1.0 - (e * phi_c.sin()).powi(2)).sqrt();
        assert_relative_eq!(xy.y, WGS84_A * mc, max_relative = 1e-12);
    }

    #[test]
    fn test_round_trip() {
        for proj in [
            Projection::PlateCarree,
            Projection::from_epsg(3031).unwrap(),
            Projection::from_epsg(3413).unwrap(),
        ] {
            let lats: &[f64] = match proj.epsg() {
                Some(3031) => &[-89.9, -80.0, -71.0, -60.5, -10.0],
                Some(3413) => &[89.9, 80.0, 70.0, 60.5, 10.0],
                _ => &[-60.0, 0.0, 45.0],
            };
            for &lat in lats {
                for lon in [-179.5, -45.0, 0.0, 12.25, 135.0, 170.0] {
                    let xy = proj.forward(Coord { x: lon, y: lat }).unwrap();
                    let back = proj.inverse(xy);
                    assert_relative_eq!(back.y, lat, epsilon = 1e-9);
                    assert_relative_eq!(wrap_longitude(back.x), wrap_longitude(lon), epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_wrap_longitude() {
        assert_relative_eq!(wrap_longitude(190.0), -170.0);
        assert_relative_eq!(wrap_longitude(-180.0), 180.0);
        assert_relative_eq!(wrap_longitude(359.0), -1.0);
        assert_relative_eq!(wrap_longitude(45.0), 45.0);
    }
}
