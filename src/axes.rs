//! Axis labels, axis orders and the 5D extents they resolve to.
//!
//! An axis order string lists one character per dataset dimension,
//! from the slowest- to the fastest-varying (C order),
//! e.g. `"tzyxc"` for a dataset whose last dimension holds channels.
use std::{fmt::Display, str::FromStr};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{error::Error, CoordVec};

/// The order used by the host image representation, and the default for writing.
pub const DEFAULT_AXIS_ORDER: &str = "tzyxc";

/// Semantic meaning of a dataset dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Channel,
    Z,
    Time,
}

impl Axis {
    pub const ALL: [Axis; 5] = [Axis::X, Axis::Y, Axis::Channel, Axis::Z, Axis::Time];

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'x' => Some(Self::X),
            'y' => Some(Self::Y),
            'c' => Some(Self::Channel),
            'z' => Some(Self::Z),
            't' => Some(Self::Time),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Channel => 'c',
            Self::Z => 'z',
            Self::Time => 't',
        }
    }

    /// Whether a dataset must contain this axis.
    ///
    /// Channel, Z and Time collapse to a singleton when absent.
    pub fn is_required(&self) -> bool {
        matches!(self, Self::X | Self::Y)
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A validated axis order: recognised labels, no duplicates.
///
/// Does not know the dataset rank; see [parse] for the full check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisOrder(CoordVec<Axis>);

impl AxisOrder {
    pub fn new(axes: &[Axis]) -> Result<Self, Error> {
        let mut seen = CoordVec::<Axis>::with_capacity(axes.len());
        for a in axes.iter() {
            if seen.contains(a) {
                let s: String = axes.iter().map(|a| a.as_char()).collect();
                return Err(Error::invalid_axis_order(s, format!("axis `{a}` is repeated")));
            }
            seen.push(*a);
        }
        Ok(Self(seen))
    }

    pub fn axes(&self) -> &[Axis] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of the axis in this order, if present.
    pub fn position(&self, axis: Axis) -> Option<usize> {
        self.0.iter().position(|a| *a == axis)
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.position(axis).is_some()
    }

    /// Ensure X and Y are both present.
    pub fn check_required(&self) -> Result<(), Error> {
        for axis in Axis::ALL.iter().filter(|a| a.is_required()) {
            if !self.contains(*axis) {
                return Err(Error::MissingRequiredAxis {
                    order: self.to_string(),
                    axis: *axis,
                });
            }
        }
        Ok(())
    }
}

impl Default for AxisOrder {
    fn default() -> Self {
        DEFAULT_AXIS_ORDER
            .parse()
            .expect("default axis order is valid")
    }
}

impl FromStr for AxisOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut axes = CoordVec::with_capacity(s.len());
        for c in s.chars() {
            match Axis::from_char(c) {
                Some(a) => axes.push(a),
                None => {
                    return Err(Error::invalid_axis_order(
                        s,
                        format!("unrecognised axis `{c}`"),
                    ))
                }
            }
        }
        Self::new(&axes).map_err(|_| {
            Error::invalid_axis_order(s, "axis order contains a repeated axis")
        })
    }
}

impl Display for AxisOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for a in self.0.iter() {
            write!(f, "{a}")?;
        }
        Ok(())
    }
}

/// Extent of each of the five axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub x: usize,
    pub y: usize,
    pub channels: usize,
    pub z: usize,
    pub time: usize,
}

impl Dimensions {
    pub fn new(x: usize, y: usize, channels: usize, z: usize, time: usize) -> Self {
        Self {
            x,
            y,
            channels,
            z,
            time,
        }
    }

    pub fn get(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Channel => self.channels,
            Axis::Z => self.z,
            Axis::Time => self.time,
        }
    }

    pub fn set(&mut self, axis: Axis, extent: usize) {
        match axis {
            Axis::X => self.x = extent,
            Axis::Y => self.y = extent,
            Axis::Channel => self.channels = extent,
            Axis::Z => self.z = extent,
            Axis::Time => self.time = extent,
        }
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.x * self.y * self.channels * self.z * self.time
    }

    /// Number of pixels in one plane.
    pub fn plane_len(&self) -> usize {
        self.x * self.y
    }

    /// Number of (channel, z, time) planes.
    pub fn num_planes(&self) -> usize {
        self.channels * self.z * self.time
    }

    /// Index of a plane in host stack order: channel fastest, then z, then time.
    pub fn plane_index(&self, c: usize, z: usize, t: usize) -> usize {
        c + self.channels * (z + self.z * t)
    }

    /// Inverse of [Dimensions::plane_index].
    pub fn plane_coords(&self, idx: usize) -> (usize, usize, usize) {
        let c = idx % self.channels;
        let rest = idx / self.channels;
        (c, rest % self.z, rest / self.z)
    }

    /// Dataset shape for storing with the given order.
    ///
    /// Fails if an axis absent from the order has an extent other than 1.
    pub fn shape_for(&self, order: &AxisOrder) -> Result<CoordVec<u64>, Error> {
        order.check_required()?;
        for axis in Axis::ALL.iter() {
            if !order.contains(*axis) && self.get(*axis) != 1 {
                return Err(Error::invalid_axis_order(
                    order.to_string(),
                    format!("axis `{axis}` has extent {} but is not listed", self.get(*axis)),
                ));
            }
        }
        Ok(order.axes().iter().map(|a| self.get(*a) as u64).collect())
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(1, 1, 1, 1, 1)
    }
}

impl Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x={} y={} c={} z={} t={}",
            self.x, self.y, self.channels, self.z, self.time
        )
    }
}

/// Bind each dimension of a dataset shape to the axis at the same position in the order string.
pub fn parse(shape: &[u64], axis_order: &str) -> Result<Dimensions, Error> {
    let order: AxisOrder = axis_order.parse()?;
    resolve(shape, &order)
}

/// As [parse], for an already-validated order.
pub fn resolve(shape: &[u64], order: &AxisOrder) -> Result<Dimensions, Error> {
    if order.len() != shape.len() {
        return Err(Error::invalid_axis_order(
            order.to_string(),
            format!(
                "has {} axes but the dataset has {} dimensions",
                order.len(),
                shape.len()
            ),
        ));
    }
    order.check_required()?;

    let mut dims = Dimensions::default();
    for (axis, extent) in order.axes().iter().zip(shape.iter()) {
        dims.set(*axis, *extent as usize);
    }
    debug!("Resolved shape {shape:?} with order `{order}` to {dims}");
    Ok(dims)
}
