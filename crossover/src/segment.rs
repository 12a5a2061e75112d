//! Splitting orbit streams into direction-consistent track segments.

use crate::DirectionRule;
use geo::geometry::{Coord, Rect};
use geotile::{Direction, Point, Projection, TrackKey};
use itertools::Itertools;
use log::debug;
use std::collections::BTreeMap;

/// A point together with its projected position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub xy: Coord<f64>,
    pub point: Point,
}

/// Time-ordered run of one pass travelling in a single direction.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSegment {
    key: TrackKey,
    direction: Direction,
    vertices: Vec<Vertex>,
    bounds: Rect<f64>,
}

impl TrackSegment {
    /// Returns `None` if fewer than two vertices are given.
    pub fn new(key: TrackKey, direction: Direction, vertices: Vec<Vertex>) -> Option<Self> {
        if vertices.len() < 2 {
            return None;
        }
        let (mut min, mut max) = (vertices[0].xy, vertices[0].xy);
        for Vertex { xy, .. } in &vertices[1..] {
            min.x = min.x.min(xy.x);
            min.y = min.y.min(xy.y);
            max.x = max.x.max(xy.x);
            max.y = max.y.max(xy.y);
        }
        Some(Self {
            key,
            direction,
            vertices,
            bounds: Rect::new(min, max),
        })
    }

    pub fn key(&self) -> TrackKey {
        self.key
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Projected bounding box of all vertices.
    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    pub fn start_time(&self) -> f64 {
        self.vertices[0].point.time
    }
}

/// The output of [`TrackSegmenter::segment`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    /// Ordered by (mission, track, start time).
    pub segments: Vec<TrackSegment>,

    /// Runs too short to form an edge.
    pub dropped: usize,

    /// Points the projection could not handle.
    pub unprojectable: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackSegmenter {
    time_gap_threshold: f64,
    direction_rule: DirectionRule,
    projection: Projection,
}

impl TrackSegmenter {
    pub fn new(time_gap_threshold: f64, direction_rule: DirectionRule, projection: Projection) -> Self {
        Self {
            time_gap_threshold,
            direction_rule,
            projection,
        }
    }

    /// Groups `points` by pass and splits each pass wherever the time
    /// step exceeds the gap threshold or the direction changes.
    pub fn segment<'a>(&self, points: impl IntoIterator<Item = &'a Point>) -> Segmentation {
        let mut out = Segmentation::default();
        let mut passes = self.group(points.into_iter().map(|p| (0, p)), &mut out);
        for vertices in passes.values_mut() {
            vertices.sort_by(|a, b| a.1.point.time.total_cmp(&b.1.point.time));
            for (seq, (n, _)) in vertices.iter_mut().enumerate() {
                *n = seq;
            }
        }
        self.split(passes, out)
    }

    /// Like [`TrackSegmenter::segment`] for a subset of a larger point
    /// set, such as one tile.
    ///
    /// Each point carries its position in the full set, which must be
    /// ordered by pass and then time. Two points are only joined by an
    /// edge when their positions are consecutive, so a pass leaving the
    /// subset and coming back is split rather than bridged.
    pub fn segment_sequenced<'a>(&self, points: impl IntoIterator<Item = (usize, &'a Point)>) -> Segmentation {
        let mut out = Segmentation::default();
        let mut passes = self.group(points, &mut out);
        for vertices in passes.values_mut() {
            vertices.sort_by_key(|(seq, _)| *seq);
        }
        self.split(passes, out)
    }
}

/// Private API.
impl TrackSegmenter {
    fn group<'a>(
        &self,
        points: impl IntoIterator<Item = (usize, &'a Point)>,
        out: &mut Segmentation,
    ) -> BTreeMap<TrackKey, Vec<(usize, Vertex)>> {
        let mut passes: BTreeMap<TrackKey, Vec<(usize, Vertex)>> = BTreeMap::new();
        for (seq, point) in points {
            match self.projection.forward(point.coord()) {
                Ok(xy) => passes
                    .entry(point.track_key())
                    .or_default()
                    .push((seq, Vertex { xy, point: *point })),
                Err(e) => {
                    debug!("{e}");
                    out.unprojectable += 1;
                }
            }
        }
        passes
    }

    fn split(&self, passes: BTreeMap<TrackKey, Vec<(usize, Vertex)>>, mut out: Segmentation) -> Segmentation {
        for (key, vertices) in passes {
            for run in split_where(vertices, |(sa, a), (sb, b)| {
                *sb != sa + 1 || b.point.time - a.point.time > self.time_gap_threshold
            }) {
                let run: Vec<Vertex> = run.into_iter().map(|(_, v)| v).collect();
                self.split_by_direction(key, run, &mut out);
            }
        }
        if out.dropped > 0 {
            debug!("dropped {} single point runs", out.dropped);
        }
        out
    }

    /// The vertex where the direction turns ends one run and starts the
    /// next, so the turning edge is searched too.
    fn split_by_direction(&self, key: TrackKey, run: Vec<Vertex>, out: &mut Segmentation) {
        let directions = self.directions(&run);
        let mut current: Vec<Vertex> = Vec::new();
        let mut direction = directions[0];
        for (vertex, d) in run.into_iter().zip(directions) {
            if d != direction {
                if current.len() > 1 {
                    let turn = current[current.len() - 1];
                    self.close(key, direction, std::mem::replace(&mut current, vec![turn]), out);
                }
                direction = d;
            }
            current.push(vertex);
        }
        self.close(key, direction, current, out);
    }

    fn close(&self, key: TrackKey, direction: Direction, vertices: Vec<Vertex>, out: &mut Segmentation) {
        match TrackSegment::new(key, direction, vertices) {
            Some(segment) => out.segments.push(segment),
            None => out.dropped += 1,
        }
    }

    /// Returns the direction of every vertex in `run`.
    fn directions(&self, run: &[Vertex]) -> Vec<Direction> {
        let derived = derived_directions(run);
        match self.direction_rule {
            DirectionRule::LatitudeRate => derived,
            DirectionRule::Provided => run
                .iter()
                .zip(derived)
                .map(|(v, d)| v.point.direction.unwrap_or(d))
                .collect(),
        }
    }
}

/// Direction of each vertex from the latitude change of the edge that
/// reaches it (the first vertex takes its outgoing edge). Flat edges
/// inherit the previous direction; leading flat edges take the first
/// sloped one, and a pass with no latitude change is ascending.
fn derived_directions(run: &[Vertex]) -> Vec<Direction> {
    let rates: Vec<Option<Direction>> = run
        .iter()
        .tuple_windows()
        .map(|(a, b)| Direction::from_latitude_rate(b.point.lat - a.point.lat))
        .collect();
    let first = rates
        .iter()
        .find_map(|d| *d)
        .unwrap_or(Direction::Ascending);

    let mut edges = Vec::with_capacity(rates.len());
    let mut last = first;
    for rate in rates {
        last = rate.unwrap_or(last);
        edges.push(last);
    }

    let mut directions = Vec::with_capacity(run.len());
    directions.push(edges.first().copied().unwrap_or(first));
    directions.extend(edges);
    directions
}

/// Splits `items` between every consecutive pair for which `split`
/// returns true.
fn split_where<T: Copy>(items: Vec<T>, split: impl Fn(&T, &T) -> bool) -> Vec<Vec<T>> {
    let mut runs = Vec::new();
    let mut current: Vec<T> = Vec::new();
    for item in items {
        if let Some(prev) = current.last() {
            if split(prev, &item) {
                runs.push(std::mem::take(&mut current));
            }
        }
        current.push(item);
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::{DirectionRule, TrackSegmenter};
    use geotile::{Direction, Point, Projection};

    fn point(track_id: u64, time: f64, lon: f64, lat: f64) -> Point {
        Point {
            lon,
            lat,
            time,
            value: 0.0,
            track_id,
            direction: None,
            mission_id: 0,
        }
    }

    fn segmenter(gap: f64, rule: DirectionRule) -> TrackSegmenter {
        TrackSegmenter::new(gap, rule, Projection::PlateCarree)
    }

    #[test]
    fn test_time_gap_split() {
        let points: Vec<Point> = [0.0, 1.0, 2.0, 10.0, 11.0, 12.0]
            .iter()
            .map(|&t| point(1, t, 0.0, t))
            .collect();
        let seg = segmenter(5.0, DirectionRule::LatitudeRate).segment(&points);
        assert_eq!(seg.segments.len(), 2);
        assert_eq!(seg.segments[0].vertices().len(), 3);
        assert_eq!(seg.segments[1].start_time(), 10.0);
        assert_eq!(seg.dropped, 0);

        // A gap equal to the threshold does not split.
        let seg = segmenter(8.0, DirectionRule::LatitudeRate).segment(&points);
        assert_eq!(seg.segments.len(), 1);
    }

    #[test]
    fn test_sorts_by_time_and_groups_by_track() {
        let points = vec![
            point(2, 1.0, 0.0, 1.0),
            point(1, 2.0, 0.0, 2.0),
            point(1, 0.0, 0.0, 0.0),
            point(2, 0.0, 0.0, 0.0),
            point(1, 1.0, 0.0, 1.0),
        ];
        let seg = segmenter(10.0, DirectionRule::LatitudeRate).segment(&points);
        assert_eq!(seg.segments.len(), 2);
        assert_eq!(seg.segments[0].key().track_id, 1);
        let times: Vec<f64> = seg.segments[0]
            .vertices()
            .iter()
            .map(|v| v.point.time)
            .collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
        assert_eq!(seg.segments[1].key().track_id, 2);
    }

    #[test]
    fn test_direction_change_split() {
        // Up to the turning latitude, then back down.
        let lats = [0.0, 1.0, 2.0, 3.0, 2.0, 1.0];
        let points: Vec<Point> = lats
            .iter()
            .enumerate()
            .map(|(i, &lat)| point(7, i as f64, i as f64, lat))
            .collect();
        let seg = segmenter(10.0, DirectionRule::LatitudeRate).segment(&points);
        assert_eq!(seg.segments.len(), 2);
        assert_eq!(seg.segments[0].direction(), Direction::Ascending);
        assert_eq!(seg.segments[0].vertices().len(), 4);
        assert_eq!(seg.segments[1].direction(), Direction::Descending);
        // The turning vertex also starts the descending run.
        assert_eq!(seg.segments[1].vertices().len(), 3);
        assert_eq!(seg.segments[1].vertices()[0], seg.segments[0].vertices()[3]);
        assert_eq!(seg.dropped, 0);
    }

    #[test]
    fn test_alternating_directions_share_vertices() {
        let mut points: Vec<Point> = (0..4).map(|i| point(1, f64::from(i), f64::from(i), 0.0)).collect();
        for (p, d) in points.iter_mut().zip([
            Direction::Ascending,
            Direction::Descending,
            Direction::Ascending,
            Direction::Ascending,
        ]) {
            p.direction = Some(d);
        }
        let seg = segmenter(10.0, DirectionRule::Provided).segment(&points);
        let spans: Vec<(Direction, Vec<f64>)> = seg
            .segments
            .iter()
            .map(|s| (s.direction(), s.vertices().iter().map(|v| v.point.time).collect()))
            .collect();
        assert_eq!(
            spans,
            vec![
                (Direction::Descending, vec![0.0, 1.0]),
                (Direction::Ascending, vec![1.0, 2.0, 3.0]),
            ]
        );
        assert_eq!(seg.dropped, 0);
    }

    #[test]
    fn test_sequence_gap_split() {
        // A pass leaving the subset after index 1 and returning at 4.
        let points: Vec<Point> = (0..6).map(|i| point(1, f64::from(i), 0.0, f64::from(i))).collect();
        let subset = [0, 1, 4, 5].map(|i| (i, &points[i]));
        let seg = segmenter(10.0, DirectionRule::LatitudeRate).segment_sequenced(subset);
        assert_eq!(seg.segments.len(), 2);
        assert_eq!(seg.segments[0].vertices().len(), 2);
        assert_eq!(seg.segments[1].start_time(), 4.0);

        let all = points.iter().enumerate();
        let seg = segmenter(10.0, DirectionRule::LatitudeRate).segment_sequenced(all);
        assert_eq!(seg.segments.len(), 1);
    }

    #[test]
    fn test_flat_latitude_inherits() {
        let lats = [0.0, 0.0, -1.0, -1.0, -2.0];
        let points: Vec<Point> = lats
            .iter()
            .enumerate()
            .map(|(i, &lat)| point(3, i as f64, i as f64, lat))
            .collect();
        let seg = segmenter(10.0, DirectionRule::LatitudeRate).segment(&points);
        assert_eq!(seg.segments.len(), 1);
        assert_eq!(seg.segments[0].direction(), Direction::Descending);

        let flat: Vec<Point> = (0..3).map(|i| point(4, f64::from(i), f64::from(i), 5.0)).collect();
        let seg = segmenter(10.0, DirectionRule::LatitudeRate).segment(&flat);
        assert_eq!(seg.segments[0].direction(), Direction::Ascending);
    }

    #[test]
    fn test_provided_direction() {
        let mut points: Vec<Point> = (0..4).map(|i| point(1, f64::from(i), 0.0, f64::from(i))).collect();
        for p in &mut points[2..] {
            p.direction = Some(Direction::Descending);
        }
        let seg = segmenter(10.0, DirectionRule::Provided).segment(&points);
        assert_eq!(seg.segments.len(), 2);
        assert_eq!(seg.segments[1].direction(), Direction::Descending);

        // The rate rule ignores the field.
        let seg = segmenter(10.0, DirectionRule::LatitudeRate).segment(&points);
        assert_eq!(seg.segments.len(), 1);
    }

    #[test]
    fn test_short_runs_dropped() {
        let points = vec![
            point(1, 0.0, 0.0, 0.0),
            point(1, 100.0, 0.0, 1.0),
            point(1, 101.0, 0.0, 2.0),
            point(2, 0.0, 0.0, 0.0),
        ];
        let seg = segmenter(10.0, DirectionRule::LatitudeRate).segment(&points);
        assert_eq!(seg.segments.len(), 1);
        assert_eq!(seg.dropped, 2);
    }

    #[test]
    fn test_bounds() {
        let points = vec![point(1, 0.0, 3.0, -1.0), point(1, 1.0, -2.0, 4.0)];
        let seg = segmenter(10.0, DirectionRule::LatitudeRate).segment(&points);
        let bounds = seg.segments[0].bounds();
        assert_eq!((bounds.min().x, bounds.min().y), (-2.0, -1.0));
        assert_eq!((bounds.max().x, bounds.max().y), (3.0, 4.0));
    }
}
