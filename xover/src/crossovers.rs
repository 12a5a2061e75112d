use crate::{options::Crossovers, output, progress::TileProgress};
use anyhow::Result;
use crossover::{Diagnostics, Pipeline};
use log::{info, warn};
use std::sync::atomic::AtomicBool;

impl Crossovers {
    pub fn run(&self) -> Result<()> {
        let mut builder = self
            .source
            .config_builder()
            .time_gap_threshold(self.time_gap)
            .intersection_epsilon(self.epsilon)
            .subsample(self.subsample)
            .direction_rule(self.direction)
            .pairing(self.pairing)
            .interpolation(self.mode);
        if let Some(radius) = self.radius {
            builder = builder.search_radius(radius);
        }
        let pipeline = Pipeline::new(builder.build()?)?;

        let points = self.source.read_points()?;
        let progress = TileProgress::new("Finding crossovers");
        let output = pipeline.run_with(&points, &AtomicBool::new(false), &progress)?;
        progress.finish();
        log_diagnostics(&output.diagnostics);

        let mut out = output::open(self.out.as_deref())?;
        output::write_records(&output.records, self.format, &mut out)
    }
}

fn log_diagnostics(d: &Diagnostics) {
    info!(
        "points: {} read, {} filtered, {} outside the projection domain",
        d.input_points, d.filtered, d.rejected
    );
    info!(
        "tiles: {}, segments: {} ({} too short)",
        d.tiles, d.segments, d.dropped_segments
    );
    info!(
        "crossings: {} degenerate edge pairs, {} beyond search radius, {} duplicates",
        d.degenerate, d.out_of_radius, d.duplicates
    );
    if !d.imbalanced.is_empty() {
        warn!("{} of {} tiles are unbalanced", d.imbalanced.len(), d.tiles);
    }
}
