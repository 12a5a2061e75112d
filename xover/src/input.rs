use anyhow::{anyhow, bail, Context, Result};
use geotile::{Direction, Point};
use log::info;
use rayon::prelude::*;
use std::{
    ffi::OsStr,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

/// Reads the points of one mission.
pub trait PointReader: Sync {
    fn read(&self, rdr: &mut dyn BufRead, mission_id: u32) -> Result<Vec<Point>>;
}

/// Column layout of an ASCII table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub orbit: usize,
    pub lon: usize,
    pub lat: usize,
    pub time: usize,
    pub value: usize,
    pub direction: Option<usize>,
}

impl Columns {
    /// `columns` holds the orbit, lon, lat, time and value indices in
    /// that order.
    pub fn new(columns: &[usize], direction: Option<usize>) -> Result<Self> {
        match *columns {
            [orbit, lon, lat, time, value] => Ok(Self {
                orbit,
                lon,
                lat,
                time,
                value,
                direction,
            }),
            _ => bail!("expected 5 column indices, got {}", columns.len()),
        }
    }
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            orbit: 0,
            lon: 2,
            lat: 1,
            time: 3,
            value: 4,
            direction: None,
        }
    }
}

/// Whitespace or comma separated tables, `#` starts a comment line.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiReader {
    columns: Columns,
}

impl AsciiReader {
    pub fn new(columns: Columns) -> Self {
        Self { columns }
    }

    fn parse_line(&self, line: &str, mission_id: u32) -> Result<Point> {
        let fields: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|f| !f.is_empty())
            .collect();
        let field = |idx: usize| {
            fields
                .get(idx)
                .copied()
                .ok_or_else(|| anyhow!("missing column {idx}"))
        };
        let number = |idx: usize| -> Result<f64> {
            let f = field(idx)?;
            f.parse().with_context(|| format!("column {idx}: '{f}'"))
        };
        let Columns {
            orbit,
            lon,
            lat,
            time,
            value,
            direction,
        } = self.columns;
        Ok(Point {
            lon: number(lon)?,
            lat: number(lat)?,
            time: number(time)?,
            value: number(value)?,
            track_id: parse_orbit(field(orbit)?)?,
            direction: direction.map(|idx| field(idx).and_then(parse_direction)).transpose()?.flatten(),
            mission_id,
        })
    }
}

impl PointReader for AsciiReader {
    fn read(&self, rdr: &mut dyn BufRead, mission_id: u32) -> Result<Vec<Point>> {
        let mut points = Vec::new();
        for (lineno, line) in rdr.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            points.push(
                self.parse_line(line, mission_id)
                    .with_context(|| format!("line {}", lineno + 1))?,
            );
        }
        Ok(points)
    }
}

/// A JSON array of points.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReader;

impl PointReader for JsonReader {
    fn read(&self, rdr: &mut dyn BufRead, mission_id: u32) -> Result<Vec<Point>> {
        let mut points: Vec<Point> = serde_json::from_reader(rdr)?;
        for p in &mut points {
            p.mission_id = mission_id;
        }
        Ok(points)
    }
}

/// Reads every file in parallel, numbering missions by position.
pub fn read_all(paths: &[PathBuf], ascii: &AsciiReader) -> Result<Vec<Point>> {
    let per_file = paths
        .par_iter()
        .enumerate()
        .map(|(idx, path)| {
            let mission_id = u32::try_from(idx)?;
            let reader: &dyn PointReader = if path.extension() == Some(OsStr::new("json")) {
                &JsonReader
            } else {
                ascii
            };
            read_file(path, reader, mission_id)
        })
        .collect::<Result<Vec<Vec<Point>>>>()?;
    let points: Vec<Point> = per_file.into_iter().flatten().collect();
    info!("read {} points from {} files", points.len(), paths.len());
    Ok(points)
}

fn read_file(path: &Path, reader: &dyn PointReader, mission_id: u32) -> Result<Vec<Point>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rdr = BufReader::new(file);
    reader
        .read(&mut rdr, mission_id)
        .with_context(|| format!("reading {}", path.display()))
}

/// Orbit numbers are sometimes stored as floats.
fn parse_orbit(field: &str) -> Result<u64> {
    if let Ok(id) = field.parse::<u64>() {
        return Ok(id);
    }
    let id: f64 = field
        .parse()
        .with_context(|| format!("orbit '{field}'"))?;
    if id.fract() != 0.0 || id < 0.0 || id > u64::MAX as f64 {
        bail!("orbit '{field}' is not a non-negative integer");
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let id = id as u64;
    Ok(id)
}

fn parse_direction(field: &str) -> Result<Option<Direction>> {
    match field {
        "a" | "A" | "1" => Ok(Some(Direction::Ascending)),
        "d" | "D" | "-1" => Ok(Some(Direction::Descending)),
        "0" => Ok(None),
        other => bail!("invalid direction '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::{AsciiReader, Columns, JsonReader, PointReader};
    use geotile::Direction;

    #[test]
    fn test_ascii_default_columns() {
        let table = "# orbit lat lon time height\n\
                     12  -75.5  100.25  2003.5  1520.7\n\
                     \n\
                     12.0,-75.6,100.30,2003.6,1521.0\n";
        let points = AsciiReader::default().read(&mut table.as_bytes(), 3).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].track_id, 12);
        assert_eq!(points[0].lon, 100.25);
        assert_eq!(points[0].lat, -75.5);
        assert_eq!(points[0].time, 2003.5);
        assert_eq!(points[0].value, 1520.7);
        assert_eq!(points[0].mission_id, 3);
        assert_eq!(points[1].track_id, 12);
        assert_eq!(points[1].direction, None);
    }

    #[test]
    fn test_ascii_direction_column() {
        let columns = Columns::new(&[0, 1, 2, 3, 4], Some(5)).unwrap();
        let table = "1 10 20 0 5 a\n1 10 21 1 5 -1\n1 10 22 2 5 0\n";
        let points = AsciiReader::new(columns).read(&mut table.as_bytes(), 0).unwrap();
        let directions: Vec<_> = points.iter().map(|p| p.direction).collect();
        assert_eq!(
            directions,
            vec![Some(Direction::Ascending), Some(Direction::Descending), None]
        );
        assert_eq!(points[0].lon, 10.0);
    }

    #[test]
    fn test_ascii_errors() {
        let reader = AsciiReader::default();
        assert!(reader.read(&mut "1 2 3\n".as_bytes(), 0).is_err());
        assert!(reader.read(&mut "1 2 x 4 5\n".as_bytes(), 0).is_err());
        assert!(reader.read(&mut "1.5 2 3 4 5\n".as_bytes(), 0).is_err());
        assert!(Columns::new(&[0, 1, 2], None).is_err());
    }

    #[test]
    fn test_json_sets_mission() {
        let json = r#"[
            {"lon": 1.0, "lat": 2.0, "time": 3.0, "value": 4.0, "track_id": 5, "direction": "descending"},
            {"lon": 1.5, "lat": 2.5, "time": 3.5, "value": 4.5, "track_id": 5, "mission_id": 9}
        ]"#;
        let points = JsonReader.read(&mut json.as_bytes(), 2).unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.mission_id == 2));
        assert_eq!(points[0].direction, Some(Direction::Descending));
        assert_eq!(points[1].direction, None);
    }
}
