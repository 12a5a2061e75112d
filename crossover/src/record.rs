//! Turning raw intersections into deduplicated crossover records.

use crate::{Crossover, CrossoverError, CrossoverFinder, Scan, TrackSegment};
use geotile::{Projection, TrackKey};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::HashMap};

/// A crossover in geographic coordinates.
///
/// Side 1 is always the ascending track, and both deltas are side 1
/// minus side 2.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CrossoverRecord {
    pub lon: f64,
    pub lat: f64,
    pub value1: f64,
    pub value2: f64,
    pub time1: f64,
    pub time2: f64,
    pub delta_value: f64,
    pub delta_time: f64,
    pub track_id1: u64,
    pub track_id2: u64,
    pub mission_id1: u32,
    pub mission_id2: u32,
}

impl CrossoverRecord {
    /// Time between the two observations.
    pub fn elapsed(&self) -> f64 {
        self.delta_time.abs()
    }
}

/// The output of [`RecordBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Built {
    pub records: Vec<CrossoverRecord>,
    pub degenerate: usize,
    pub out_of_radius: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder {
    finder: CrossoverFinder,
    projection: Projection,

    /// Per axis tolerance for duplicate intersections.
    epsilon: f64,
}

impl RecordBuilder {
    pub fn new(finder: CrossoverFinder, projection: Projection, epsilon: f64) -> Self {
        Self {
            finder,
            projection,
            epsilon,
        }
    }

    pub fn finder(&self) -> &CrossoverFinder {
        &self.finder
    }

    /// Runs the finder over every pair.
    pub fn scan<'a>(
        &self,
        pairs: impl IntoIterator<Item = (&'a TrackSegment, &'a TrackSegment)>,
    ) -> Result<Scan, CrossoverError> {
        let mut scan = Scan::default();
        for (a, b) in pairs {
            scan.extend(self.finder.find(a, b)?);
        }
        Ok(scan)
    }

    pub fn build<'a>(
        &self,
        pairs: impl IntoIterator<Item = (&'a TrackSegment, &'a TrackSegment)>,
    ) -> Result<Built, CrossoverError> {
        let scan = self.scan(pairs)?;
        let found = scan.crossovers.len();
        let kept = self.dedup(scan.crossovers);
        Ok(Built {
            duplicates: found - kept.len(),
            records: self.finish(&kept),
            degenerate: scan.degenerate,
            out_of_radius: scan.out_of_radius,
        })
    }

    /// Removes crossovers of the same track pair lying within epsilon
    /// of each other on both axes.
    ///
    /// Output is sorted, and of every group of duplicates the first in
    /// that order is kept, so the result does not depend on input
    /// order.
    pub fn dedup(&self, mut crossovers: Vec<Crossover>) -> Vec<Crossover> {
        crossovers.sort_by(canonical_order);

        let mut buckets: HashMap<(TrackKey, TrackKey, i64, i64), Vec<usize>> = HashMap::new();
        let mut kept: Vec<Crossover> = Vec::with_capacity(crossovers.len());
        for crossover in crossovers {
            let (bx, by) = (self.bucket(crossover.xy.x), self.bucket(crossover.xy.y));
            let (ka, kd) = (crossover.ascending.key, crossover.descending.key);
            let duplicate = (-1..=1).any(|dx| {
                (-1..=1).any(|dy| {
                    buckets
                        .get(&(ka, kd, bx.saturating_add(dx), by.saturating_add(dy)))
                        .map_or(false, |ids| {
                            ids.iter().any(|&i| {
                                (kept[i].xy.x - crossover.xy.x).abs() <= self.epsilon
                                    && (kept[i].xy.y - crossover.xy.y).abs() <= self.epsilon
                            })
                        })
                })
            });
            if !duplicate {
                buckets.entry((ka, kd, bx, by)).or_default().push(kept.len());
                kept.push(crossover);
            }
        }
        kept
    }

    /// Converts crossovers to geographic records.
    pub fn finish(&self, crossovers: &[Crossover]) -> Vec<CrossoverRecord> {
        crossovers
            .iter()
            .map(|c| {
                let geo = self.projection.inverse(c.xy);
                let (a, d) = (c.ascending, c.descending);
                CrossoverRecord {
                    lon: geo.x,
                    lat: geo.y,
                    value1: a.value,
                    value2: d.value,
                    time1: a.time,
                    time2: d.time,
                    delta_value: a.value - d.value,
                    delta_time: a.time - d.time,
                    track_id1: a.key.track_id,
                    track_id2: d.key.track_id,
                    mission_id1: a.key.mission_id,
                    mission_id2: d.key.mission_id,
                }
            })
            .collect()
    }
}

/// Private API.
impl RecordBuilder {
    fn bucket(&self, v: f64) -> i64 {
        if self.epsilon > 0.0 {
            #[allow(clippy::cast_possible_truncation)]
            let b = (v / self.epsilon).floor() as i64;
            b
        } else {
            // Exact matching only; neighbouring buckets never share a
            // value.
            #[allow(clippy::cast_possible_wrap)]
            let b = v.to_bits() as i64;
            b
        }
    }
}

fn canonical_order(a: &Crossover, b: &Crossover) -> Ordering {
    a.ascending
        .key
        .cmp(&b.ascending.key)
        .then(a.descending.key.cmp(&b.descending.key))
        .then(a.xy.x.total_cmp(&b.xy.x))
        .then(a.xy.y.total_cmp(&b.xy.y))
        .then(a.ascending.time.total_cmp(&b.ascending.time))
        .then(a.descending.time.total_cmp(&b.descending.time))
}
