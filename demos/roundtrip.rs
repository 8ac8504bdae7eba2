//! Write a synthetic two-channel time series, list the container, and read it back
//! in a different axis order.
//!
//! `cargo run --example roundtrip -- /tmp/demo.zarr`
use std::env;

use anyhow::{bail, Result};
use hyperstack::prelude::*;

fn main() -> Result<()> {
    env_logger::init();
    let Some(path) = env::args().nth(1) else {
        bail!("usage: roundtrip <container path>");
    };

    let dims = Dimensions::new(64, 48, 2, 1, 5);
    let image = CanonicalImage::UInt16(Hyperstack::from_fn(dims, |x, y, c, _, t| {
        ((x * y + 1000 * c + 50 * t) % 4096) as u16
    }));

    let options = WriteOptions::new()
        .axis_order("tcyx".parse()?)
        .compression_level(5);
    write_dataset(&path, "series/raw", &image, &options)?;

    for info in list_datasets(&path)? {
        println!(
            "{}: {} {:?} (axes {})",
            info.name,
            info.data_type,
            info.shape,
            info.axis_order.as_deref().unwrap_or("unknown")
        );
    }

    let back = read_dataset(&path, "series/raw", None)?;
    let range = back.display_range();
    println!(
        "read {} as {} ({} bit, display {}..{})",
        back.dims(),
        back.kind(),
        back.bit_depth(),
        range.low,
        range.high
    );
    if back != image {
        bail!("image changed on the way through storage");
    }
    Ok(())
}
