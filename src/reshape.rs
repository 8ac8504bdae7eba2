//! Remapping between flat dataset buffers and per-plane image buffers.
//!
//! A flat buffer is in C order over the dataset's axis order:
//! the last axis of the order varies fastest.
//! The plane layout holds one buffer per (channel, z, time),
//! indexed by [Dimensions::plane_index], each row-major (`y * dim_x + x`).
use rayon::prelude::*;

use crate::{
    axes::{Axis, AxisOrder, Dimensions},
    error::Error,
};

/// Element offset per unit step along each axis of a flat buffer.
///
/// Axes absent from the order have stride 0; their extent is always 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strides {
    pub x: usize,
    pub y: usize,
    pub channel: usize,
    pub z: usize,
    pub time: usize,
}

impl Strides {
    pub fn get(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Channel => self.channel,
            Axis::Z => self.z,
            Axis::Time => self.time,
        }
    }

    fn set(&mut self, axis: Axis, stride: usize) {
        match axis {
            Axis::X => self.x = stride,
            Axis::Y => self.y = stride,
            Axis::Channel => self.channel = stride,
            Axis::Z => self.z = stride,
            Axis::Time => self.time = stride,
        }
    }

    /// Flat offset of a pixel.
    pub fn offset(&self, x: usize, y: usize, c: usize, z: usize, t: usize) -> usize {
        x * self.x + y * self.y + c * self.channel + z * self.z + t * self.time
    }

    /// Flat offset of the first pixel of a plane.
    fn plane_offset(&self, c: usize, z: usize, t: usize) -> usize {
        self.offset(0, 0, c, z, t)
    }
}

/// The stride of an axis is the product of the extents of every axis after it in the order.
pub fn strides(dims: &Dimensions, order: &AxisOrder) -> Strides {
    let mut out = Strides::default();
    let mut acc = 1;
    for axis in order.axes().iter().rev() {
        out.set(*axis, acc);
        acc *= dims.get(*axis);
    }
    out
}

/// Split a flat buffer in the given order into image planes.
pub fn scatter<T>(source: &[T], dims: &Dimensions, order: &AxisOrder) -> Result<Vec<Vec<T>>, Error>
where
    T: Copy + Send + Sync,
{
    dims.shape_for(order)?;
    if source.len() != dims.numel() {
        return Err(Error::shape_mismatch(dims.numel(), source.len()));
    }
    let s = strides(dims, order);
    let (dim_x, dim_y) = (dims.x, dims.y);

    let planes = (0..dims.num_planes())
        .into_par_iter()
        .map(|idx| {
            let (c, z, t) = dims.plane_coords(idx);
            let base = s.plane_offset(c, z, t);
            let mut plane = Vec::with_capacity(dim_x * dim_y);
            for y in 0..dim_y {
                let row = base + y * s.y;
                plane.extend((0..dim_x).map(|x| source[row + x * s.x]));
            }
            plane
        })
        .collect();
    Ok(planes)
}

/// Interleave image planes into a flat buffer in the given order.
///
/// Exact inverse of [scatter].
pub fn gather<T>(planes: &[Vec<T>], dims: &Dimensions, order: &AxisOrder) -> Result<Vec<T>, Error>
where
    T: Copy + Default + Send + Sync,
{
    let shape = dims.shape_for(order)?;
    let total: usize = planes.iter().map(|p| p.len()).sum();
    if planes.len() != dims.num_planes() || total != dims.numel() {
        return Err(Error::shape_mismatch(dims.numel(), total));
    }
    if let Some(p) = planes.iter().find(|p| p.len() != dims.plane_len()) {
        return Err(Error::shape_mismatch(dims.plane_len(), p.len()));
    }
    let axes = order.axes();

    let mut out = vec![T::default(); dims.numel()];
    out.par_iter_mut().enumerate().for_each(|(flat, value)| {
        let mut coord = [0usize; 5];
        let mut rem = flat;
        for (axis, extent) in axes.iter().zip(shape.iter()).rev() {
            let extent = *extent as usize;
            coord[axis_slot(*axis)] = rem % extent;
            rem /= extent;
        }
        let [x, y, c, z, t] = coord;
        *value = planes[dims.plane_index(c, z, t)][y * dims.x + x];
    });
    Ok(out)
}

fn axis_slot(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Channel => 2,
        Axis::Z => 3,
        Axis::Time => 4,
    }
}
