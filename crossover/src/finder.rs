//! Intersections between ascending and descending track segments.

use crate::{CrossoverError, Interpolation, Pairing, TrackSegment, Vertex};
use geo::{
    geometry::{Coord, Rect},
    Intersects,
};
use geotile::{Direction, TrackKey};
use itertools::Itertools;
use std::collections::BTreeSet;

/// Relative tolerance under which two edges are treated as parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

/// One track's contribution to a crossover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Side {
    pub key: TrackKey,

    /// Value interpolated at the intersection.
    pub value: f64,

    /// Time interpolated at the intersection.
    pub time: f64,
}

/// An intersection in the projected plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossover {
    pub xy: Coord<f64>,
    pub ascending: Side,
    pub descending: Side,
}

/// The result of scanning one segment pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scan {
    pub crossovers: Vec<Crossover>,

    /// Parallel, coincident or zero-length edge pairs skipped.
    pub degenerate: usize,

    /// Intersections dropped by the search radius.
    pub out_of_radius: usize,
}

impl Scan {
    pub fn extend(&mut self, other: Scan) {
        self.crossovers.extend(other.crossovers);
        self.degenerate += other.degenerate;
        self.out_of_radius += other.out_of_radius;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossoverFinder {
    search_radius: Option<f64>,
    subsample: usize,
    interpolation: Interpolation,
}

impl Default for CrossoverFinder {
    fn default() -> Self {
        Self {
            search_radius: None,
            subsample: 1,
            interpolation: Interpolation::Linear,
        }
    }
}

impl CrossoverFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject intersections farther than `radius` from any of their
    /// bracketing vertices.
    #[must_use]
    pub fn with_search_radius(mut self, radius: Option<f64>) -> Self {
        self.search_radius = radius;
        self
    }

    /// Locate crossings on every `every`:th vertex before refining on
    /// full resolution. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_subsample(mut self, every: usize) -> Self {
        self.subsample = every.max(1);
        self
    }

    #[must_use]
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn search_radius(&self) -> Option<f64> {
        self.search_radius
    }

    pub fn subsample(&self) -> usize {
        self.subsample
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Returns every intersection between `a` and `b`.
    ///
    /// The pair may be given in either order but must consist of one
    /// ascending and one descending segment. Both may belong to the same
    /// pass, in which case edges meeting at a shared vertex are not
    /// intersected.
    pub fn find(&self, a: &TrackSegment, b: &TrackSegment) -> Result<Scan, CrossoverError> {
        if a.direction() == b.direction() {
            return Err(CrossoverError::SameDirection(a.direction()));
        }
        let (asc, desc) = if a.direction() == Direction::Ascending {
            (a, b)
        } else {
            (b, a)
        };

        let mut scan = Scan::default();
        if !asc.bounds().intersects(&desc.bounds()) {
            return Ok(scan);
        }

        let (av, dv) = (asc.vertices(), desc.vertices());
        if self.subsample == 1 || (av.len() <= self.subsample + 1 && dv.len() <= self.subsample + 1) {
            for i in 0..av.len() - 1 {
                for j in 0..dv.len() - 1 {
                    self.edge_pair(asc, desc, i, j, &mut scan);
                }
            }
        } else {
            for (i, j) in self.refined_edges(av, dv) {
                self.edge_pair(asc, desc, i, j, &mut scan);
            }
        }
        Ok(scan)
    }
}

/// Private API.
impl CrossoverFinder {
    fn edge_pair(&self, asc: &TrackSegment, desc: &TrackSegment, i: usize, j: usize, scan: &mut Scan) {
        let (a, b) = (&asc.vertices()[i], &asc.vertices()[i + 1]);
        let (c, d) = (&desc.vertices()[j], &desc.vertices()[j + 1]);
        if !boxes_overlap(a.xy, b.xy, c.xy, d.xy) {
            return;
        }
        if asc.key() == desc.key() && [a, b].iter().any(|u| same_vertex(u, c) || same_vertex(u, d)) {
            return;
        }
        let (t1, t2) = match intersect(a.xy, b.xy, c.xy, d.xy) {
            Intersection::Degenerate => {
                scan.degenerate += 1;
                return;
            }
            Intersection::Disjoint => return,
            Intersection::At(t1, t2) => (t1, t2),
        };

        let xy = Coord {
            x: a.xy.x + t1 * (b.xy.x - a.xy.x),
            y: a.xy.y + t1 * (b.xy.y - a.xy.y),
        };
        if let Some(radius) = self.search_radius {
            if [a, b, c, d].iter().any(|v| distance(v.xy, xy) > radius) {
                scan.out_of_radius += 1;
                return;
            }
        }
        scan.crossovers.push(Crossover {
            xy,
            ascending: self.side(asc, i, t1),
            descending: self.side(desc, j, t2),
        });
    }

    /// Value and time of `segment` a fraction `t` along edge `i`.
    fn side(&self, segment: &TrackSegment, i: usize, t: f64) -> Side {
        let vertices = segment.vertices();
        let cubic = match self.interpolation {
            Interpolation::Linear => None,
            Interpolation::Cubic => cubic_weights(vertices, i, t),
        };
        let (value, time) = match cubic {
            Some((start, weights)) => vertices[start..]
                .iter()
                .zip(weights)
                .fold((0.0, 0.0), |(value, time), (v, w)| {
                    (value + w * v.point.value, time + w * v.point.time)
                }),
            None => {
                let (from, to) = (&vertices[i].point, &vertices[i + 1].point);
                (
                    from.value + t * (to.value - from.value),
                    from.time + t * (to.time - from.time),
                )
            }
        };
        Side {
            key: segment.key(),
            value,
            time,
        }
    }

    /// Full resolution edge pairs around every crossing found between
    /// the subsampled polylines, including one coarse edge either side.
    fn refined_edges(&self, av: &[Vertex], dv: &[Vertex]) -> BTreeSet<(usize, usize)> {
        let (ai, di) = (coarse(av.len(), self.subsample), coarse(dv.len(), self.subsample));
        let mut edges = BTreeSet::new();
        for i in 0..ai.len() - 1 {
            for j in 0..di.len() - 1 {
                let (a, b) = (av[ai[i]].xy, av[ai[i + 1]].xy);
                let (c, d) = (dv[di[j]].xy, dv[di[j + 1]].xy);
                if !matches!(intersect(a, b, c, d), Intersection::At(..)) {
                    continue;
                }
                let a_span = ai[i.saturating_sub(1)]..ai[(i + 2).min(ai.len() - 1)];
                let d_span = di[j.saturating_sub(1)]..di[(j + 2).min(di.len() - 1)];
                for fi in a_span {
                    for fj in d_span.clone() {
                        edges.insert((fi, fj));
                    }
                }
            }
        }
        edges
    }
}

/// Returns the (ascending, descending) pairs among `segments` whose
/// bounding boxes overlap.
///
/// Pieces of the same pass are paired too, so a track looping back
/// over itself yields its own crossovers.
pub fn candidate_pairs(segments: &[TrackSegment], pairing: Pairing) -> Vec<(&TrackSegment, &TrackSegment)> {
    let (asc, desc): (Vec<&TrackSegment>, Vec<&TrackSegment>) = segments
        .iter()
        .partition(|s| s.direction() == Direction::Ascending);
    let mut pairs = Vec::new();
    for a in &asc {
        for d in &desc {
            if pairing.allows(a.key().mission_id, d.key().mission_id) && a.bounds().intersects(&d.bounds()) {
                pairs.push((*a, *d));
            }
        }
    }
    pairs
}

enum Intersection {
    At(f64, f64),
    Disjoint,
    Degenerate,
}

/// Solves `a + t1 (b - a) = c + t2 (d - c)`.
fn intersect(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>, d: Coord<f64>) -> Intersection {
    let r = b - a;
    let s = d - c;
    let denom = cross(r, s);
    let scale = norm(r) * norm(s);
    if scale == 0.0 || denom.abs() <= PARALLEL_EPSILON * scale {
        return Intersection::Degenerate;
    }
    let ac = c - a;
    let t1 = cross(ac, s) / denom;
    let t2 = cross(ac, r) / denom;
    if (0.0..=1.0).contains(&t1) && (0.0..=1.0).contains(&t2) {
        Intersection::At(t1, t2)
    } else {
        Intersection::Disjoint
    }
}

/// Lagrange weights of the four vertices around edge `i` at a fraction
/// `t` along it, using along-track distance as the abscissa. Returns the
/// index of the first of the four, or `None` when the segment is too
/// short or has repeated positions.
fn cubic_weights(vertices: &[Vertex], i: usize, t: f64) -> Option<(usize, [f64; 4])> {
    if vertices.len() < 4 {
        return None;
    }
    let start = i.saturating_sub(1).min(vertices.len() - 4);
    let mut s = [0.0; 4];
    for (k, (a, b)) in vertices[start..start + 4].iter().tuple_windows().enumerate() {
        let step = distance(a.xy, b.xy);
        if step <= 0.0 {
            return None;
        }
        s[k + 1] = s[k] + step;
    }
    let at = s[i - start] + t * (s[i - start + 1] - s[i - start]);

    let mut weights = [1.0; 4];
    for (k, w) in weights.iter_mut().enumerate() {
        for (m, sm) in s.iter().enumerate() {
            if m != k {
                *w *= (at - sm) / (s[k] - sm);
            }
        }
    }
    Some((start, weights))
}

/// Indices of every `every`:th vertex, always including the last one.
fn coarse(len: usize, every: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..len).step_by(every).collect();
    if idx.last() != Some(&(len - 1)) {
        idx.push(len - 1);
    }
    idx
}

/// Whether two vertices of one pass are the same observation.
fn same_vertex(u: &Vertex, v: &Vertex) -> bool {
    u.xy == v.xy && u.point.time == v.point.time
}

fn boxes_overlap(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>, d: Coord<f64>) -> bool {
    Rect::new(a, b).intersects(&Rect::new(c, d))
}

fn cross(u: Coord<f64>, v: Coord<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

fn norm(u: Coord<f64>) -> f64 {
    u.x.hypot(u.y)
}

fn distance(u: Coord<f64>, v: Coord<f64>) -> f64 {
    norm(u - v)
}
