//! Projected spatial grids and halo tiling of altimetry point clouds.
//!
//! A [`SpatialGrid`] maps geographic coordinates to [`Cell`]s under a
//! [`Projection`]. A [`Tiler`] groups points by owning cell and copies
//! points near cell edges into neighbouring tiles so per-tile work sees
//! everything within the buffer. [`join`] undoes a partition.

mod error;
pub mod grid;
mod point;
pub mod projection;
pub mod tiler;

pub use crate::{
    error::GridError,
    grid::{Cell, SpatialGrid},
    point::{Direction, Point, TrackKey},
    projection::{Hemisphere, PolarStereographic, Projection},
    tiler::{join, Imbalance, Partition, Rejected, Tile, Tiler},
};
pub use geo;
