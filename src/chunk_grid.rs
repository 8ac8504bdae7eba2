use itertools::Itertools;
use ndarray::{IxDyn, SliceInfo, SliceInfoElem};
use serde::{Deserialize, Serialize};

use crate::{util::DimensionMismatch, CoordVec, GridCoord, Ndim};

/// A half-open interval along one axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ArraySlice {
    pub offset: u64,
    pub shape: u64,
}

impl ArraySlice {
    pub fn new(offset: u64, shape: u64) -> Self {
        Self { offset, shape }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.shape
    }

    /// Truncate the slice so that it ends before `max`.
    ///
    /// None if the slice starts after `max`.
    pub fn limit_extent(&self, max: u64) -> Option<Self> {
        let end = max.min(self.end());
        if self.offset > end {
            None
        } else {
            Some(Self::new(self.offset, end - self.offset))
        }
    }
}

/// A hyper-rectangular region of an array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayRegion(CoordVec<ArraySlice>);

impl FromIterator<ArraySlice> for ArrayRegion {
    fn from_iter<T: IntoIterator<Item = ArraySlice>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Ndim for ArrayRegion {
    fn ndim(&self) -> usize {
        self.0.len()
    }
}

impl ArrayRegion {
    pub fn from_offset_shape(offset: &[u64], shape: &[u64]) -> Result<Self, DimensionMismatch> {
        DimensionMismatch::check_coords(offset.len(), shape.len())?;
        Ok(offset
            .iter()
            .zip(shape.iter())
            .map(|(o, s)| ArraySlice::new(*o, *s))
            .collect())
    }

    /// Same region, translated to start at the origin.
    pub fn at_origin(&self) -> Self {
        self.0
            .iter()
            .map(|sl| ArraySlice::new(0, sl.shape))
            .collect()
    }

    pub fn is_whole(&self, shape: &[u64]) -> bool {
        self.ndim() == shape.len()
            && self
                .0
                .iter()
                .zip(shape.iter())
                .all(|(sl, sh)| sl.offset == 0 && &sl.shape == sh)
    }

    pub fn offset(&self) -> GridCoord {
        self.0.iter().map(|s| s.offset).collect()
    }

    pub fn shape(&self) -> GridCoord {
        self.0.iter().map(|s| s.shape).collect()
    }

    pub fn numel(&self) -> u64 {
        self.0.iter().map(|s| s.shape).product()
    }

    pub fn limit_extent(&self, max: &[u64]) -> Result<Option<Self>, DimensionMismatch> {
        DimensionMismatch::check_coords(max.len(), self.ndim())?;
        Ok(self
            .0
            .iter()
            .zip(max.iter())
            .map(|(sl, mx)| sl.limit_extent(*mx))
            .collect::<Option<CoordVec<_>>>()
            .map(Self))
    }

    pub fn slice_info(&self) -> SliceInfo<Vec<SliceInfoElem>, IxDyn, IxDyn> {
        let indices: Vec<_> = self
            .0
            .iter()
            .map(|sl| SliceInfoElem::Slice {
                start: sl.offset as isize,
                end: Some(sl.end() as isize),
                step: 1,
            })
            .collect();
        // dynamic-dimensional slice infos with only Slice elements are always valid
        SliceInfo::try_from(indices).expect("slice info for IxDyn")
    }
}

/// A chunk of the grid, and the part of the array it covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridChunk {
    pub chunk_idx: GridCoord,
    pub array_region: ArrayRegion,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RegularChunkGrid {
    chunk_shape: GridCoord,
}

impl RegularChunkGrid {
    pub fn new<T: Into<GridCoord>>(chunk_shape: T) -> Self {
        Self {
            chunk_shape: chunk_shape.into(),
        }
    }

    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Number of chunks along each dimension needed to cover the array.
    pub fn grid_shape(&self, array_shape: &[u64]) -> Result<GridCoord, DimensionMismatch> {
        DimensionMismatch::check_coords(array_shape.len(), self.ndim())?;
        Ok(array_shape
            .iter()
            .zip(self.chunk_shape.iter())
            .map(|(a, c)| (a + c - 1) / c)
            .collect())
    }

    /// Every chunk covering the array, with its region clipped to the array extent.
    ///
    /// Chunks are visited in C order of their grid index.
    pub fn chunks(
        &self,
        array_shape: &[u64],
    ) -> Result<impl Iterator<Item = GridChunk> + '_, DimensionMismatch> {
        let grid_shape = self.grid_shape(array_shape)?;
        let max: GridCoord = array_shape.iter().cloned().collect();
        let indices = grid_shape
            .into_iter()
            .map(|n| 0..n)
            .multi_cartesian_product();

        Ok(indices.filter_map(move |idx| {
            let region: ArrayRegion = idx
                .iter()
                .zip(self.chunk_shape.iter())
                .map(|(i, c)| ArraySlice::new(i * c, *c))
                .collect();
            let array_region = region.limit_extent(&max).ok().flatten()?;
            Some(GridChunk {
                chunk_idx: idx.into_iter().collect(),
                array_region,
            })
        }))
    }
}

impl Ndim for RegularChunkGrid {
    fn ndim(&self) -> usize {
        self.chunk_shape.len()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "name", content = "configuration", rename_all = "lowercase")]
pub enum ChunkGridType {
    Regular(RegularChunkGrid),
}

impl ChunkGridType {
    pub fn chunk_shape(&self) -> &[u64] {
        match self {
            Self::Regular(g) => g.chunk_shape(),
        }
    }

    pub fn chunks(
        &self,
        array_shape: &[u64],
    ) -> Result<impl Iterator<Item = GridChunk> + '_, DimensionMismatch> {
        match self {
            Self::Regular(g) => g.chunks(array_shape),
        }
    }
}

impl Ndim for ChunkGridType {
    fn ndim(&self) -> usize {
        match self {
            Self::Regular(g) => g.ndim(),
        }
    }
}

impl From<&[u64]> for ChunkGridType {
    fn from(value: &[u64]) -> Self {
        let cs: GridCoord = value.iter().cloned().collect();
        Self::Regular(RegularChunkGrid::new(cs))
    }
}
