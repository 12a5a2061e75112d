//! Tiled, parallel crossover detection.

use crate::{
    candidate_pairs, Config, Crossover, CrossoverError, CrossoverFinder, CrossoverRecord, RecordBuilder,
    TrackSegmenter,
};
use geotile::{Cell, Imbalance, Partition, Point, SpatialGrid, Tile, Tiler};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Points surviving [`Pipeline::prepare`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prepared {
    /// Ordered by pass, then time.
    pub points: Vec<Point>,

    /// Points outside the time span or with non-finite time/value.
    pub filtered: usize,
}

/// Crossovers found in one tile, before the global merge.
#[derive(Debug, Clone, PartialEq)]
pub struct TileOutput {
    pub cell: Cell,
    pub crossovers: Vec<Crossover>,
    pub segments: usize,
    pub dropped_segments: usize,
    pub degenerate: usize,
    pub out_of_radius: usize,
    pub duplicates: usize,
}

/// Counters describing a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub input_points: usize,
    pub filtered: usize,
    pub rejected: usize,
    pub tiles: usize,
    pub segments: usize,
    pub dropped_segments: usize,
    pub degenerate: usize,
    pub out_of_radius: usize,

    /// Crossovers removed by both the per-tile and the final dedup.
    pub duplicates: usize,
    pub imbalanced: Vec<Imbalance>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    pub records: Vec<CrossoverRecord>,
    pub diagnostics: Diagnostics,
}

/// Observes a [`Pipeline::run_with`] call.
pub trait Progress: Sync {
    /// Called once the points are tiled.
    fn start(&self, _tiles: usize) {}

    /// Called from worker threads as each tile finishes.
    fn tile_done(&self, _output: &TileOutput) {}
}

impl Progress for () {}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    tiler: Tiler,
    segmenter: TrackSegmenter,
    builder: RecordBuilder,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, CrossoverError> {
        let grid = SpatialGrid::new(config.projection(), config.cell_size())?;
        let tiler = Tiler::new(grid, config.buffer_size())?;
        let segmenter = TrackSegmenter::new(
            config.time_gap_threshold(),
            config.direction_rule(),
            config.projection(),
        );
        let finder = CrossoverFinder::new()
            .with_search_radius(config.search_radius())
            .with_subsample(config.subsample())
            .with_interpolation(config.interpolation());
        let builder = RecordBuilder::new(finder, config.projection(), config.intersection_epsilon());
        if config.search_radius().is_none() {
            warn!("no search radius, crossovers bridging data gaps near tile edges may be missed");
        }
        Ok(Self {
            config,
            tiler,
            segmenter,
            builder,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tiler(&self) -> &Tiler {
        &self.tiler
    }

    /// Drops points outside the configured time span (inclusive) and
    /// points with non-finite time or value, and orders the rest by
    /// pass and time.
    pub fn prepare(&self, points: &[Point]) -> Prepared {
        let span = self.config.time_span();
        let mut kept: Vec<Point> = points
            .iter()
            .filter(|p| p.time.is_finite() && p.value.is_finite())
            .filter(|p| span.map_or(true, |(start, end)| start <= p.time && p.time <= end))
            .copied()
            .collect();
        kept.sort_by(|a, b| {
            a.track_key()
                .cmp(&b.track_key())
                .then(a.time.total_cmp(&b.time))
        });
        Prepared {
            filtered: points.len() - kept.len(),
            points: kept,
        }
    }

    /// Tiles `points`, which should be [`Prepared::points`] so that
    /// [`Pipeline::process_tile`] can tell neighbouring observations of
    /// a pass apart.
    pub fn partition(&self, points: &[Point]) -> Partition {
        let partition = self.tiler.partition(points);
        for Imbalance { cell, points, mean } in partition.imbalanced(self.config.imbalance_factor()) {
            warn!("tile {cell} holds {points} points, mean is {mean:.1}");
        }
        partition
    }

    /// Finds the crossovers visible in one tile of a partition of
    /// [`Prepared::points`].
    pub fn process_tile(&self, tile: &Tile) -> Result<TileOutput, CrossoverError> {
        let segmentation = self.segmenter.segment_sequenced(tile.indexed_points());
        let pairs = candidate_pairs(&segmentation.segments, self.config.pairing());
        let scan = self.builder.scan(pairs)?;
        let found = scan.crossovers.len();
        let crossovers = self.builder.dedup(scan.crossovers);
        debug!(
            "tile {}: {} points, {} segments, {} crossovers",
            tile.cell(),
            tile.len(),
            segmentation.segments.len(),
            crossovers.len()
        );
        Ok(TileOutput {
            cell: tile.cell(),
            duplicates: found - crossovers.len(),
            crossovers,
            segments: segmentation.segments.len(),
            dropped_segments: segmentation.dropped,
            degenerate: scan.degenerate,
            out_of_radius: scan.out_of_radius,
        })
    }

    /// Combines tile outputs into deduplicated records.
    pub fn merge(&self, outputs: Vec<TileOutput>) -> Output {
        let mut diagnostics = Diagnostics {
            tiles: outputs.len(),
            ..Diagnostics::default()
        };
        let mut crossovers = Vec::new();
        for output in outputs {
            diagnostics.segments += output.segments;
            diagnostics.dropped_segments += output.dropped_segments;
            diagnostics.degenerate += output.degenerate;
            diagnostics.out_of_radius += output.out_of_radius;
            diagnostics.duplicates += output.duplicates;
            crossovers.extend(output.crossovers);
        }
        let found = crossovers.len();
        let kept = self.builder.dedup(crossovers);
        diagnostics.duplicates += found - kept.len();
        Output {
            records: self.builder.finish(&kept),
            diagnostics,
        }
    }

    pub fn run(&self, points: &[Point]) -> Result<Output, CrossoverError> {
        self.run_until(points, &AtomicBool::new(false))
    }

    /// Like [`Pipeline::run`], but gives up with
    /// [`CrossoverError::Cancelled`] once `cancel` is set.
    pub fn run_until(&self, points: &[Point], cancel: &AtomicBool) -> Result<Output, CrossoverError> {
        self.run_with(points, cancel, &())
    }

    /// Like [`Pipeline::run_until`], reporting to `progress` as tiles
    /// finish.
    pub fn run_with(
        &self,
        points: &[Point],
        cancel: &AtomicBool,
        progress: &dyn Progress,
    ) -> Result<Output, CrossoverError> {
        let prepared = self.prepare(points);
        let partition = self.partition(&prepared.points);
        let tiles: Vec<&Tile> = partition.tiles().collect();
        progress.start(tiles.len());

        let outputs = tiles
            .par_iter()
            .map(|tile| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(CrossoverError::Cancelled);
                }
                let output = self.process_tile(tile)?;
                progress.tile_done(&output);
                Ok(output)
            })
            .collect::<Result<Vec<TileOutput>, CrossoverError>>()?;
        if cancel.load(Ordering::Relaxed) {
            return Err(CrossoverError::Cancelled);
        }

        let mut output = self.merge(outputs);
        let diagnostics = &mut output.diagnostics;
        diagnostics.input_points = points.len();
        diagnostics.filtered = prepared.filtered;
        diagnostics.rejected = partition.rejected().len();
        diagnostics.imbalanced = partition.imbalanced(self.config.imbalance_factor());
        info!(
            "{} crossovers from {} points in {} tiles",
            output.records.len(),
            points.len(),
            diagnostics.tiles
        );
        Ok(output)
    }
}
