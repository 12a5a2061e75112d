use crate::{
    input::{self, AsciiReader, Columns},
    output::Format,
};
use anyhow::Result;
use clap::{Args, Parser};
use crossover::{Config, ConfigBuilder, DirectionRule, Interpolation, Pairing};
use geotile::{Point, Projection};
use std::path::PathBuf;

/// Find orbit crossovers in satellite altimetry tracks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub enum Cli {
    /// Write one record per crossover between ascending and
    /// descending tracks of the input files.
    Crossovers(Crossovers),

    /// Report how the input points would be tiled.
    Tiles(Tiles),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct Source {
    /// Map projection, as an EPSG code (4326, 3031, 3413) or name.
    #[arg(short, long, default_value_t = Projection::PlateCarree)]
    pub projection: Projection,

    /// Tile size in projected units (degrees or meters).
    #[arg(short = 'd', long)]
    pub cell_size: f64,

    /// Tile buffer in projected units.
    #[arg(short, long)]
    pub buffer: f64,

    /// Only use points within this time span, inclusive.
    #[arg(short = 't', long, num_args = 2, value_names = ["START", "END"])]
    pub tspan: Option<Vec<f64>>,

    /// Zero based column indices of orbit, lon, lat, time and value in
    /// ASCII inputs.
    #[arg(short, long, value_delimiter = ',', default_value = "0,2,1,3,4")]
    pub columns: Vec<usize>,

    /// Column holding the orbit direction (a/d, 1/-1, or 0 for
    /// unknown) in ASCII inputs.
    #[arg(long)]
    pub direction_col: Option<usize>,

    /// Warn about tiles holding more than this many times the mean
    /// number of points.
    #[arg(long, default_value_t = 10.0)]
    pub imbalance: f64,

    /// Input ASCII tables, or JSON arrays of points for files ending
    /// in `.json`. Each file is its own mission.
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

impl Source {
    pub fn columns(&self) -> Result<Columns> {
        Columns::new(&self.columns, self.direction_col)
    }

    /// Run configuration common to every subcommand.
    pub fn config_builder(&self) -> ConfigBuilder {
        let builder = Config::builder()
            .projection(self.projection)
            .cell_size(self.cell_size)
            .buffer_size(self.buffer)
            .imbalance_factor(self.imbalance);
        match self.tspan.as_deref() {
            Some(&[start, end]) => builder.time_span(start, end),
            _ => builder,
        }
    }

    pub fn read_points(&self) -> Result<Vec<Point>> {
        input::read_all(&self.input, &AsciiReader::new(self.columns()?))
    }
}

#[derive(Debug, Clone, Args)]
pub struct Crossovers {
    #[command(flatten)]
    pub source: Source,

    /// Output file, stdout if absent.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Format::Tsv)]
    pub format: Format,

    /// Largest distance from a crossover to its bracketing points.
    #[arg(short, long)]
    pub radius: Option<f64>,

    /// Split tracks where consecutive points are further apart in
    /// time than this.
    #[arg(short = 'g', long)]
    pub time_gap: f64,

    /// Crossovers of the same tracks closer than this are merged.
    #[arg(short, long, default_value_t = 1e-6)]
    pub epsilon: f64,

    /// Locate crossings on every k:th point before refining.
    #[arg(short = 'k', long, default_value_t = 1)]
    pub subsample: usize,

    /// How track direction is decided: `provided` or `latitude-rate`.
    #[arg(long, default_value_t = DirectionRule::Provided)]
    pub direction: DirectionRule,

    /// Which missions to cross: `all`, `inter` or `intra`.
    #[arg(long, default_value_t = Pairing::All)]
    pub pairing: Pairing,

    /// Interpolation at the crossing: `linear` between the two
    /// bracketing points, or `cubic` through the four nearest.
    #[arg(short, long, default_value_t = Interpolation::Linear)]
    pub mode: Interpolation,
}

#[derive(Debug, Clone, Args)]
pub struct Tiles {
    #[command(flatten)]
    pub source: Source,

    /// Output file, stdout if absent.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}
