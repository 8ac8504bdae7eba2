//! The canonical in-memory image: one 2D plane per (channel, z, time).
use std::fmt::Display;

use num_traits::AsPrimitive;
use rayon::prelude::*;

use crate::{
    axes::Dimensions,
    data_type::{DataType, FloatSize, IntSize, NBytes, ReflectedType},
    error::{Error, Result},
};

/// Element types an image can be made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    UInt8,
    UInt16,
    UInt32,
    Float32,
    /// Packed `0xAARRGGBB` colour, stored as four `uint8` channels.
    Argb32,
}

impl ElementKind {
    /// Bits per stored sample.
    pub fn bit_depth(&self) -> u32 {
        match self {
            Self::UInt8 | Self::Argb32 => 8,
            Self::UInt16 => 16,
            Self::UInt32 | Self::Float32 => 32,
        }
    }

    /// Data type of the stored dataset.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::UInt8 | Self::Argb32 => DataType::UInt(IntSize::b8),
            Self::UInt16 => DataType::UInt(IntSize::b16),
            Self::UInt32 => DataType::UInt(IntSize::b32),
            Self::Float32 => DataType::Float(FloatSize::b32),
        }
    }

    /// Element kind to read a stored dataset as.
    ///
    /// Colour is never inferred: `uint8` data is always [ElementKind::UInt8].
    pub fn from_data_type(data_type: DataType) -> Result<Self> {
        match data_type {
            DataType::UInt(IntSize::b8) => Ok(Self::UInt8),
            DataType::UInt(IntSize::b16) => Ok(Self::UInt16),
            DataType::UInt(IntSize::b32) => Ok(Self::UInt32),
            DataType::Float(FloatSize::b32) => Ok(Self::Float32),
            other => Err(Error::UnsupportedElementType(other.to_string())),
        }
    }
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Argb32 => write!(f, "argb32"),
            other => write!(f, "{}", other.data_type()),
        }
    }
}

/// Element types which can fill image planes.
pub trait Pixel: ReflectedType + AsPrimitive<f64> {}

impl<T: ReflectedType + AsPrimitive<f64>> Pixel for T {}

/// Intensity window a viewer maps to displayed brightness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRange {
    pub low: f64,
    pub high: f64,
}

impl DisplayRange {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// From 0 to the largest value in the planes, with the upper bound at least 1.
    pub fn from_planes<T: Pixel>(planes: &[Vec<T>]) -> Self {
        let max = planes
            .par_iter()
            .flat_map(|p| p.par_iter())
            .map(|v| AsPrimitive::<f64>::as_(*v))
            .reduce(|| f64::NEG_INFINITY, f64::max);
        Self::new(0.0, max.max(1.0))
    }
}

impl Default for DisplayRange {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// A 5D image held as planes in host stack order.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperstack<T> {
    dims: Dimensions,
    planes: Vec<Vec<T>>,
    bit_depth: u32,
    display_range: DisplayRange,
}

impl<T: Pixel> Hyperstack<T> {
    /// Bit depth is the width of `T`; the display range is computed from the data.
    ///
    /// Fails if the number or size of the planes disagrees with `dims`.
    pub fn new(dims: Dimensions, planes: Vec<Vec<T>>) -> Result<Self> {
        if planes.len() != dims.num_planes() {
            return Err(Error::shape_mismatch(
                dims.numel(),
                planes.iter().map(|p| p.len()).sum(),
            ));
        }
        if let Some(p) = planes.iter().find(|p| p.len() != dims.plane_len()) {
            return Err(Error::shape_mismatch(dims.plane_len(), p.len()));
        }
        let display_range = DisplayRange::from_planes(&planes);
        Ok(Self {
            dims,
            planes,
            bit_depth: T::ZARR_TYPE.nbits() as u32,
            display_range,
        })
    }

    /// An image of the default value.
    pub fn zeros(dims: Dimensions) -> Self {
        let planes = vec![vec![T::default(); dims.plane_len()]; dims.num_planes()];
        Self {
            dims,
            planes,
            bit_depth: T::ZARR_TYPE.nbits() as u32,
            display_range: DisplayRange::default(),
        }
    }

    /// Build an image by evaluating `f(x, y, c, z, t)` at every pixel.
    pub fn from_fn<F>(dims: Dimensions, f: F) -> Self
    where
        F: Fn(usize, usize, usize, usize, usize) -> T + Sync,
    {
        let planes: Vec<Vec<T>> = (0..dims.num_planes())
            .into_par_iter()
            .map(|idx| {
                let (c, z, t) = dims.plane_coords(idx);
                (0..dims.plane_len())
                    .map(|i| f(i % dims.x, i / dims.x, c, z, t))
                    .collect()
            })
            .collect();
        let display_range = DisplayRange::from_planes(&planes);
        Self {
            dims,
            planes,
            bit_depth: T::ZARR_TYPE.nbits() as u32,
            display_range,
        }
    }

    /// Recompute the display range from the current pixel values.
    pub fn reset_display_range(&mut self) {
        self.display_range = DisplayRange::from_planes(&self.planes);
    }
}

impl<T: Copy> Hyperstack<T> {
    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    pub fn planes(&self) -> &[Vec<T>] {
        &self.planes
    }

    pub fn into_planes(self) -> Vec<Vec<T>> {
        self.planes
    }

    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    pub fn display_range(&self) -> DisplayRange {
        self.display_range
    }

    pub fn set_display_range(&mut self, range: DisplayRange) {
        self.display_range = range;
    }

    fn in_stack(&self, c: usize, z: usize, t: usize) -> bool {
        c < self.dims.channels && z < self.dims.z && t < self.dims.time
    }

    /// The `y`-major plane at (channel, z, time).
    pub fn plane(&self, c: usize, z: usize, t: usize) -> Option<&[T]> {
        if !self.in_stack(c, z, t) {
            return None;
        }
        Some(&self.planes[self.dims.plane_index(c, z, t)])
    }

    pub fn plane_mut(&mut self, c: usize, z: usize, t: usize) -> Option<&mut [T]> {
        if !self.in_stack(c, z, t) {
            return None;
        }
        let idx = self.dims.plane_index(c, z, t);
        Some(&mut self.planes[idx])
    }

    pub fn pixel(&self, x: usize, y: usize, c: usize, z: usize, t: usize) -> Option<T> {
        if x >= self.dims.x || y >= self.dims.y {
            return None;
        }
        self.plane(c, z, t).map(|p| p[y * self.dims.x + x])
    }
}

/// Split packed ARGB pixels into four `uint8` channels per source channel,
/// in the order alpha, red, green, blue.
///
/// Alpha is always written fully opaque.
pub fn expand_argb(image: &Hyperstack<u32>) -> Hyperstack<u8> {
    let src = image.dims();
    let mut dims = *src;
    dims.channels = src.channels * 4;

    let planes: Vec<Vec<u8>> = (0..dims.num_planes())
        .into_par_iter()
        .map(|idx| {
            let (c, z, t) = dims.plane_coords(idx);
            let source = &image.planes[src.plane_index(c / 4, z, t)];
            match c % 4 {
                0 => vec![u8::MAX; source.len()],
                component => {
                    let shift = 8 * (3 - component);
                    source.iter().map(|p| (p >> shift) as u8).collect()
                }
            }
        })
        .collect();

    let display_range = DisplayRange::from_planes(&planes);
    Hyperstack {
        dims,
        planes,
        bit_depth: ElementKind::Argb32.bit_depth(),
        display_range,
    }
}

/// An image of any supported element kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalImage {
    UInt8(Hyperstack<u8>),
    UInt16(Hyperstack<u16>),
    UInt32(Hyperstack<u32>),
    Float32(Hyperstack<f32>),
    Argb32(Hyperstack<u32>),
}

macro_rules! each_kind {
    ($self:expr, $h:ident => $body:expr) => {
        match $self {
            CanonicalImage::UInt8($h) => $body,
            CanonicalImage::UInt16($h) => $body,
            CanonicalImage::UInt32($h) => $body,
            CanonicalImage::Float32($h) => $body,
            CanonicalImage::Argb32($h) => $body,
        }
    };
}

impl CanonicalImage {
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::UInt8(_) => ElementKind::UInt8,
            Self::UInt16(_) => ElementKind::UInt16,
            Self::UInt32(_) => ElementKind::UInt32,
            Self::Float32(_) => ElementKind::Float32,
            Self::Argb32(_) => ElementKind::Argb32,
        }
    }

    pub fn dims(&self) -> &Dimensions {
        each_kind!(self, h => h.dims())
    }

    pub fn bit_depth(&self) -> u32 {
        each_kind!(self, h => h.bit_depth())
    }

    pub fn display_range(&self) -> DisplayRange {
        each_kind!(self, h => h.display_range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> Dimensions {
        Dimensions::new(4, 3, 2, 2, 1)
    }

    #[test]
    fn new_checks_planes() {
        let d = dims();
        assert!(Hyperstack::new(d, vec![vec![0u8; 12]; 4]).is_ok());
        assert!(matches!(
            Hyperstack::new(d, vec![vec![0u8; 12]; 3]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Hyperstack::new(d, vec![vec![0u8; 11]; 4]),
            Err(Error::ShapeMismatch {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn pixel_access() {
        let h = Hyperstack::<u16>::from_fn(dims(), |x, y, c, z, t| {
            (x + 10 * y + 100 * c + 1000 * z + 10000 * t) as u16
        });
        assert_eq!(h.pixel(3, 2, 1, 1, 0), Some(1123));
        assert_eq!(h.plane(1, 0, 0).unwrap()[1], 101);
        assert_eq!(h.plane(1, 0, 0).unwrap()[4], 110);
        assert_eq!(h.pixel(4, 0, 0, 0, 0), None);
        assert!(h.plane(0, 2, 0).is_none());
        assert_eq!(h.bit_depth(), 16);
        assert_eq!(h.display_range(), DisplayRange::new(0.0, 1123.0));
    }

    #[test]
    fn plane_mut_and_reset() {
        let mut h = Hyperstack::<f32>::zeros(dims());
        h.plane_mut(1, 1, 0).unwrap()[0] = 7.5;
        h.reset_display_range();
        assert_eq!(h.display_range().high, 7.5);
        assert_eq!(h.pixel(0, 0, 1, 1, 0), Some(7.5));
    }

    #[test]
    fn display_range_floor() {
        let h = Hyperstack::new(dims(), vec![vec![0u32; 12]; 4]).unwrap();
        assert_eq!(h.display_range(), DisplayRange::new(0.0, 1.0));
        let h = Hyperstack::new(dims(), vec![vec![0.25f32; 12]; 4]).unwrap();
        assert_eq!(h.display_range().high, 1.0);
    }

    #[test]
    fn argb_expansion() {
        let src = Hyperstack::<u32>::from_fn(Dimensions::new(2, 2, 1, 1, 1), |x, y, _, _, _| {
            0x00_10_20_30 + (x + 2 * y) as u32
        });
        let out = expand_argb(&src);
        assert_eq!(out.dims().channels, 4);
        assert_eq!(out.plane(0, 0, 0).unwrap(), &[255, 255, 255, 255]);
        assert_eq!(out.plane(1, 0, 0).unwrap(), &[0x10; 4]);
        assert_eq!(out.plane(2, 0, 0).unwrap(), &[0x20; 4]);
        assert_eq!(out.plane(3, 0, 0).unwrap(), &[0x30, 0x31, 0x32, 0x33]);
        assert_eq!(out.bit_depth(), 8);
    }

    #[test]
    fn argb_expansion_multichannel() {
        let d = Dimensions::new(1, 1, 2, 1, 2);
        let src = Hyperstack::<u32>::from_fn(d, |_, _, c, _, t| {
            0x7f_00_00_00 | ((c as u32) << 16) | (t as u32)
        });
        let out = expand_argb(&src);
        assert_eq!(out.dims(), &Dimensions::new(1, 1, 8, 1, 2));
        assert_eq!(out.pixel(0, 0, 4, 0, 1), Some(255));
        assert_eq!(out.pixel(0, 0, 5, 0, 1), Some(1));
        assert_eq!(out.pixel(0, 0, 7, 0, 1), Some(1));
        assert_eq!(out.pixel(0, 0, 1, 0, 0), Some(0));
    }

    #[test]
    fn kinds() {
        assert_eq!(
            ElementKind::from_data_type(DataType::UInt(IntSize::b16)).unwrap(),
            ElementKind::UInt16
        );
        assert!(matches!(
            ElementKind::from_data_type(DataType::Int(IntSize::b16)),
            Err(Error::UnsupportedElementType(s)) if s == "int16"
        ));
        assert!(ElementKind::from_data_type(DataType::Float(FloatSize::b64)).is_err());
        assert_eq!(ElementKind::Argb32.to_string(), "argb32");
        assert_eq!(ElementKind::Float32.to_string(), "float32");
        let img = CanonicalImage::Argb32(Hyperstack::zeros(dims()));
        assert_eq!(img.kind(), ElementKind::Argb32);
        assert_eq!(img.dims(), &dims());
    }
}
