use geotile::{Direction, GridError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrossoverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Grid(#[from] GridError),

    #[error("both segments are {0:?}")]
    SameDirection(Direction),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required parameter '{0}'")]
    Missing(&'static str),

    #[error("'{name}' must be {requirement}, got {value}")]
    OutOfRange {
        name: &'static str,
        requirement: &'static str,
        value: f64,
    },

    #[error("buffer size {buffer_size} is smaller than search radius {search_radius}")]
    BufferTooSmall {
        buffer_size: f64,
        search_radius: f64,
    },

    #[error("time span start {0} is after its end {1}")]
    TimeSpan(f64, f64),

    #[error("subsample must be at least 1")]
    Subsample,
}
