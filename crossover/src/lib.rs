//! Orbit crossover detection for satellite altimetry.
//!
//! Points are tiled with [`geotile`], each tile's passes are cut into
//! [`TrackSegment`]s, and every ascending/descending segment pair is
//! intersected by the [`CrossoverFinder`]. A [`RecordBuilder`] removes
//! crossovers found more than once and produces [`CrossoverRecord`]s.
//! [`Pipeline`] runs all of it over the tiles in parallel.
//!
//! ```no_run
//! # fn run(points: &[crossover::geotile::Point]) -> Result<(), crossover::CrossoverError> {
//! use crossover::{Config, Pipeline};
//!
//! let config = Config::builder()
//!     .cell_size(1.0)
//!     .buffer_size(0.2)
//!     .time_gap_threshold(10.0)
//!     .search_radius(0.2)
//!     .build()?;
//! let output = Pipeline::new(config)?.run(points)?;
//! for record in output.records {
//!     println!("{} {} {}", record.lon, record.lat, record.delta_value);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod finder;
pub mod pipeline;
pub mod record;
pub mod segment;

pub use crate::{
    config::{Config, ConfigBuilder, DirectionRule, Interpolation, Pairing},
    error::{ConfigError, CrossoverError},
    finder::{candidate_pairs, Crossover, CrossoverFinder, Scan, Side},
    pipeline::{Diagnostics, Output, Pipeline, Prepared, Progress, TileOutput},
    record::{Built, CrossoverRecord, RecordBuilder},
    segment::{Segmentation, TrackSegment, TrackSegmenter, Vertex},
};
pub use geotile;
