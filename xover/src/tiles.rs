use crate::{options::Tiles, output};
use anyhow::Result;
use crossover::Pipeline;
use geotile::Cell;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct TileSummary {
    cell: Cell,
    min: [f64; 2],
    max: [f64; 2],
    core: usize,
    halo: usize,
}

#[derive(Serialize)]
struct Report {
    points: usize,
    filtered: usize,
    rejected: usize,
    tiles: Vec<TileSummary>,
    imbalanced: Vec<Cell>,
}

impl Tiles {
    pub fn run(&self) -> Result<()> {
        // Segmentation is not run, so any gap will do.
        let config = self
            .source
            .config_builder()
            .time_gap_threshold(f64::INFINITY)
            .build()?;
        let pipeline = Pipeline::new(config)?;

        let points = self.source.read_points()?;
        let prepared = pipeline.prepare(&points);
        let partition = pipeline.partition(&prepared.points);

        let report = Report {
            points: points.len(),
            filtered: prepared.filtered,
            rejected: partition.rejected().len(),
            tiles: partition
                .tiles()
                .map(|tile| TileSummary {
                    cell: tile.cell(),
                    min: [tile.bounds().min().x, tile.bounds().min().y],
                    max: [tile.bounds().max().x, tile.bounds().max().y],
                    core: tile.core().len(),
                    halo: tile.halo().len(),
                })
                .collect(),
            imbalanced: partition
                .imbalanced(pipeline.config().imbalance_factor())
                .into_iter()
                .map(|imbalance| imbalance.cell)
                .collect(),
        };

        let mut out = output::open(self.out.as_deref())?;
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}
