use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("coordinate ({lon}, {lat}) is outside the valid domain")]
    OutOfDomain { lon: f64, lat: f64 },

    #[error("invalid cell size {0}")]
    CellSize(f64),

    #[error("invalid buffer size {0}")]
    Buffer(f64),

    #[error("unsupported projection {0}")]
    Projection(String),
}
