//! Read and write 5D images (x, y, channel, z, time) as chunked, compressed
//! Zarr v3 datasets whose dimensions may be stored in any axis order.
//!
//! ```no_run
//! use hyperstack::prelude::*;
//!
//! let image = read_dataset("cells.zarr", "exported_data", Some("tzyxc"))?;
//! println!("{} at {} bits", image.dims(), image.bit_depth());
//! write_dataset("copy.zarr", "data", &image, &WriteOptions::new().compression_level(4))?;
//! # Ok::<(), hyperstack::Error>(())
//! ```
use smallvec::SmallVec;

pub mod axes;
pub mod chunk_grid;
pub mod chunk_key_encoding;
pub mod codecs;
pub mod data_type;
pub mod dataset;
mod error;
pub mod image;
pub mod node;
pub mod prelude;
pub mod reshape;
pub mod store;
mod util;

pub use error::{Error, Result};
pub use util::DimensionMismatch;

const COORD_SMALLVEC_SIZE: usize = 6;
pub const ZARR_FORMAT: usize = 3;

pub type CoordVec<T> = SmallVec<[T; COORD_SMALLVEC_SIZE]>;
pub type GridCoord = CoordVec<u64>;

pub trait Ndim {
    fn ndim(&self) -> usize;
}
