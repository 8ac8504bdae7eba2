use std::io::{self, ErrorKind};

use log::debug;
use ndarray::{ArrayD, ArrayViewD};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    chunk_grid::{ChunkGridType, GridChunk},
    chunk_key_encoding::ChunkKeyEncoding,
    codecs::{ab::bytes_codec::BytesCodec, bb::BBCodecType, CodecChain},
    data_type::{DataType, ReflectedType},
    store::{NodeKey, ReadableStore, WriteableStore},
    util::DimensionMismatch,
    CoordVec, GridCoord, Ndim, ZARR_FORMAT,
};

use super::{
    group::create_parent_groups, invalid_data, read_metadata, write_metadata, JsonObject,
    Metadata, MetadataRef, ReadableMetadata, WriteableMetadata,
};

/// Use the [ArrayMetadataBuilder] to construct this in a convenient way.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ArrayMetadata {
    zarr_format: usize,
    shape: GridCoord,
    data_type: DataType,
    chunk_grid: ChunkGridType,
    #[serde(default)]
    chunk_key_encoding: ChunkKeyEncoding,
    fill_value: serde_json::Value,
    codecs: CodecChain,
    #[serde(default)]
    attributes: JsonObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimension_names: Option<CoordVec<Option<String>>>,
}

impl Ndim for ArrayMetadata {
    fn ndim(&self) -> usize {
        self.shape.len()
    }
}

impl ReadableMetadata for ArrayMetadata {
    fn get_attributes(&self) -> &JsonObject {
        &self.attributes
    }

    fn get_zarr_format(&self) -> usize {
        self.zarr_format
    }

    fn is_array(&self) -> bool {
        true
    }
}

impl WriteableMetadata for ArrayMetadata {
    fn mutate_attributes<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut JsonObject) -> R,
    {
        f(&mut self.attributes)
    }
}

impl ArrayMetadata {
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn chunk_grid(&self) -> &ChunkGridType {
        &self.chunk_grid
    }

    pub fn codecs(&self) -> &CodecChain {
        &self.codecs
    }

    pub fn dimension_names(&self) -> Option<&[Option<String>]> {
        self.dimension_names.as_deref()
    }

    pub fn numel(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Ensure that all dimensioned metadata is consistent.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.zarr_format != ZARR_FORMAT {
            return Err("Unsupported zarr_format");
        }
        if self.chunk_grid.ndim() != self.ndim() {
            return Err("Chunk grid dimensionality does not match array shape");
        }
        if self.chunk_grid.chunk_shape().iter().any(|c| *c == 0) {
            return Err("Chunk shape has a zero-length dimension");
        }
        if let Some(d) = &self.dimension_names {
            if d.len() != self.ndim() {
                return Err("Dimension names do not match array shape");
            }
        }
        Ok(())
    }

    pub fn get_effective_fill_value<T: ReflectedType>(&self) -> Result<T, &'static str> {
        if T::ZARR_TYPE != self.data_type {
            return Err("Reflected type mismatches array data type");
        }
        T::from_fill_value(&self.fill_value).ok_or("Could not interpret fill value")
    }
}

pub struct ArrayMetadataBuilder<T: ReflectedType> {
    shape: GridCoord,
    chunk_grid: Option<ChunkGridType>,
    chunk_key_encoding: ChunkKeyEncoding,
    fill_value: T,
    codecs: CodecChain,
    attributes: JsonObject,
    dimension_names: Option<CoordVec<Option<String>>>,
}

impl<T: ReflectedType> ArrayMetadataBuilder<T> {
    /// Prepare metadata for a basic array with a shape and data type.
    ///
    /// The default is a single chunk for the entire array,
    /// stored little-endian without compression.
    pub fn new(shape: &[u64]) -> Self {
        Self {
            shape: shape.iter().cloned().collect(),
            chunk_grid: None,
            chunk_key_encoding: ChunkKeyEncoding::default(),
            fill_value: T::default(),
            codecs: CodecChain::default(),
            attributes: JsonObject::default(),
            dimension_names: None,
        }
    }

    /// Set a regular chunk grid.
    ///
    /// Fails if the chunk shape is incompatible with the array's dimensionality,
    /// or has a zero-length dimension.
    pub fn chunk_grid(mut self, chunk_shape: &[u64]) -> Result<Self, &'static str> {
        if chunk_shape.len() != self.shape.len() {
            return Err("Chunk grid dimensionality does not match array shape");
        }
        if chunk_shape.iter().any(|c| *c == 0) {
            return Err("Chunk shape has a zero-length dimension");
        }
        self.chunk_grid = Some(chunk_shape.into());
        Ok(self)
    }

    pub fn chunk_key_encoding<E: Into<ChunkKeyEncoding>>(mut self, chunk_key_encoding: E) -> Self {
        self.chunk_key_encoding = chunk_key_encoding.into();
        self
    }

    /// Set the fill value.
    ///
    /// By default, uses the data type's default value, which is generally `false` or `0`.
    pub fn fill_value(mut self, fill_value: T) -> Self {
        self.fill_value = fill_value;
        self
    }

    /// Replace the array->bytes codec.
    pub fn ab_codec(mut self, codec: BytesCodec) -> Self {
        self.codecs.replace_ab_codec(codec);
        self
    }

    /// Append a bytes->bytes codec.
    ///
    /// This will be the last BB encoder, or first BB decoder.
    pub fn push_bb_codec<C: Into<BBCodecType>>(mut self, codec: C) -> Self {
        self.codecs.bb_codecs_mut().push(codec.into());
        self
    }

    pub fn set_attribute<S: Serialize>(mut self, key: &str, value: S) -> Result<Self, &'static str> {
        let v = serde_json::to_value(value).map_err(|_| "Could not serialize value")?;
        self.attributes.insert(key.to_owned(), v);
        Ok(self)
    }

    /// Set the dimension names.
    ///
    /// Fails if the number of dimension names do not match the array's dimensionality.
    pub fn dimension_names(mut self, names: CoordVec<Option<String>>) -> Result<Self, &'static str> {
        if names.len() != self.shape.len() {
            return Err("Dimension names has wrong length");
        }
        self.dimension_names = Some(names);
        Ok(self)
    }

    /// Build the [ArrayMetadata].
    pub fn build(self) -> ArrayMetadata {
        let chunk_grid = self.chunk_grid.unwrap_or_else(|| {
            // a zero-length dimension still needs a valid chunk extent
            let whole: GridCoord = self.shape.iter().map(|s| (*s).max(1)).collect();
            ChunkGridType::from(whole.as_slice())
        });
        let fill_value =
            serde_json::to_value(self.fill_value).unwrap_or_else(|_| T::ZARR_TYPE.default_fill_value());

        ArrayMetadata {
            zarr_format: ZARR_FORMAT,
            shape: self.shape,
            data_type: T::ZARR_TYPE,
            chunk_grid,
            chunk_key_encoding: self.chunk_key_encoding,
            fill_value,
            codecs: self.codecs,
            attributes: self.attributes,
            dimension_names: self.dimension_names,
        }
    }
}

fn to_usize(coords: &[u64]) -> Vec<usize> {
    coords.iter().map(|c| *c as usize).collect()
}

/// A chunked N-dimensional array node with element type `T`.
pub struct Array<'s, S, T: ReflectedType> {
    store: &'s S,
    key: NodeKey,
    metadata: ArrayMetadata,
    fill_value: T,
}

impl<'s, S, T: ReflectedType> Ndim for Array<'s, S, T> {
    fn ndim(&self) -> usize {
        self.metadata.ndim()
    }
}

impl<'s, S, T: ReflectedType> ReadableMetadata for Array<'s, S, T> {
    fn get_zarr_format(&self) -> usize {
        self.metadata.get_zarr_format()
    }

    fn is_array(&self) -> bool {
        true
    }

    fn get_attributes(&self) -> &JsonObject {
        self.metadata.get_attributes()
    }
}

impl<'s, S, T: ReflectedType> WriteableMetadata for Array<'s, S, T> {
    fn mutate_attributes<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut JsonObject) -> R,
    {
        self.metadata.mutate_attributes(f)
    }
}

impl<'s, S, T: ReflectedType> Array<'s, S, T> {
    /// Does not touch the store.
    pub fn new(store: &'s S, key: NodeKey, metadata: ArrayMetadata) -> io::Result<Self> {
        let invalid = |e: &'static str| io::Error::new(ErrorKind::InvalidInput, e);
        metadata.validate().map_err(invalid)?;
        let fill_value = metadata.get_effective_fill_value().map_err(invalid)?;
        Ok(Self {
            store,
            key,
            metadata,
            fill_value,
        })
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    pub fn shape(&self) -> &[u64] {
        self.metadata.shape()
    }

    fn chunk_key(&self, idx: &[u64]) -> NodeKey {
        self.metadata.chunk_key_encoding.chunk_key(&self.key, idx)
    }

    fn chunk_numel(&self) -> usize {
        self.metadata
            .chunk_grid
            .chunk_shape()
            .iter()
            .product::<u64>() as usize
    }

    fn chunks(&self) -> io::Result<Vec<GridChunk>> {
        Ok(self.metadata.chunk_grid.chunks(&self.metadata.shape)?.collect())
    }
}

impl<'s, S: ReadableStore, T: ReflectedType> Array<'s, S, T> {
    pub fn from_store(store: &'s S, key: NodeKey) -> io::Result<Self> {
        match read_metadata(store, &key)? {
            Some(Metadata::Array(m)) => {
                if m.data_type != T::ZARR_TYPE {
                    return Err(io::Error::new(
                        ErrorKind::InvalidInput,
                        format!("Array at {key} has data type {}, not {}", m.data_type, T::ZARR_TYPE),
                    ));
                }
                Self::new(store, key, m).map_err(|e| invalid_data(e.to_string()))
            }
            Some(Metadata::Group(_)) => Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("Node at {key} is a group, not an array"),
            )),
            None => Err(io::Error::new(
                ErrorKind::NotFound,
                format!("Array metadata not found at {key}"),
            )),
        }
    }

    /// Read a whole chunk (including any overhang past the array edge) in C order.
    ///
    /// `Ok(None)` if the chunk is not stored.
    pub fn read_chunk(&self, idx: &[u64]) -> io::Result<Option<Vec<T>>> {
        DimensionMismatch::check_coords(idx.len(), self.ndim())?;
        match self.store.get_bytes(&self.chunk_key(idx))? {
            Some(b) => Ok(Some(self.metadata.codecs.decode(&b, self.chunk_numel())?)),
            None => Ok(None),
        }
    }

    /// Read the entire array into one C-order buffer.
    ///
    /// Chunks which are not stored are filled with the fill value.
    pub fn read_all(&self) -> io::Result<Vec<T>> {
        let shape = to_usize(&self.metadata.shape);
        let chunk_shape = to_usize(self.metadata.chunk_grid.chunk_shape());
        let mut out = ArrayD::from_elem(shape, self.fill_value);

        let mut encoded = Vec::default();
        for c in self.chunks()? {
            if let Some(b) = self.store.get_bytes(&self.chunk_key(&c.chunk_idx))? {
                encoded.push((c, b));
            }
        }
        debug!("Decoding {} stored chunks of {}", encoded.len(), self.key);

        let codecs = &self.metadata.codecs;
        let numel = self.chunk_numel();
        let decoded = encoded
            .into_par_iter()
            .map(|(c, b)| -> io::Result<_> {
                let values = codecs.decode::<T>(&b, numel)?;
                let arr = ArrayD::from_shape_vec(chunk_shape.clone(), values).map_err(invalid_data)?;
                Ok((c, arr))
            })
            .collect::<io::Result<Vec<_>>>()?;

        for (c, arr) in decoded {
            let within = arr.slice(c.array_region.at_origin().slice_info());
            out.slice_mut(c.array_region.slice_info()).assign(&within);
        }
        Ok(out.into_raw_vec())
    }
}

impl<'s, S: WriteableStore, T: ReflectedType> Array<'s, S, T> {
    /// Erase anything at this array's key, and create implicit parent groups.
    ///
    /// Metadata is not written: call [Array::write_meta] once the data is in place.
    pub fn create(store: &'s S, key: NodeKey, metadata: ArrayMetadata) -> io::Result<Self> {
        let arr = Self::new(store, key, metadata)?;
        if store.erase_prefix(&arr.key)? {
            debug!("Replaced existing node at {}", arr.key);
        }
        create_parent_groups(store, &arr.key)?;
        Ok(arr)
    }

    pub fn write_meta(&self) -> io::Result<()> {
        write_metadata(self.store, &self.key, MetadataRef::Array(&self.metadata))
    }

    /// Write a whole chunk given in C order.
    ///
    /// A chunk made only of the fill value is erased rather than stored.
    pub fn write_chunk(&self, idx: &[u64], chunk: &[T]) -> io::Result<()> {
        DimensionMismatch::check_coords(idx.len(), self.ndim())?;
        if chunk.len() != self.chunk_numel() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("Chunk has {} elements, expected {}", chunk.len(), self.chunk_numel()),
            ));
        }
        let key = self.chunk_key(idx);
        if chunk.iter().all(|v| v == &self.fill_value) {
            self.store.erase(&key)?;
            return Ok(());
        }
        let encoded = self.metadata.codecs.encode(chunk)?;
        self.store.set_bytes(&key, &encoded)
    }

    /// Write the entire array from one C-order buffer.
    pub fn write_all(&self, data: &[T]) -> io::Result<()> {
        let shape = to_usize(&self.metadata.shape);
        let view = ArrayViewD::from_shape(shape, data).map_err(|e| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("Buffer does not match array shape: {e}"),
            )
        })?;
        let chunk_shape = to_usize(self.metadata.chunk_grid.chunk_shape());
        let codecs = &self.metadata.codecs;
        let fill_value = self.fill_value;

        let encoded = self
            .chunks()?
            .into_par_iter()
            .map(|c| -> io::Result<_> {
                let mut chunk = ArrayD::from_elem(chunk_shape.clone(), fill_value);
                chunk
                    .slice_mut(c.array_region.at_origin().slice_info())
                    .assign(&view.slice(c.array_region.slice_info()));
                let values = chunk.into_raw_vec();
                if values.iter().all(|v| v == &fill_value) {
                    Ok((c, None))
                } else {
                    Ok((c, Some(codecs.encode(&values)?)))
                }
            })
            .collect::<io::Result<Vec<_>>>()?;

        let mut n_stored = 0;
        for (c, maybe_bytes) in encoded {
            let key = self.chunk_key(&c.chunk_idx);
            match maybe_bytes {
                Some(b) => {
                    self.store.set_bytes(&key, &b)?;
                    n_stored += 1;
                }
                None => {
                    self.store.erase(&key)?;
                }
            }
        }
        debug!("Stored {n_stored} non-empty chunks of {}", self.key);
        Ok(())
    }

    pub fn erase(self) -> io::Result<bool> {
        self.store.erase_prefix(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codecs::bb::gzip_codec::GzipCodec,
        node::Group,
        store::{HashMapStore, ListableStore},
    };
    use smallvec::smallvec;

    fn key(s: &str) -> NodeKey {
        s.parse().unwrap()
    }

    #[test]
    fn build_arraymeta() {
        let meta = ArrayMetadataBuilder::<f32>::new(&[100, 200, 300])
            .chunk_grid(&[10, 10, 10])
            .unwrap()
            .fill_value(1.0)
            .ab_codec(BytesCodec::new_big())
            .push_bb_codec(GzipCodec::default())
            .dimension_names(smallvec![Some("z".to_string()), None, Some("x".to_string())])
            .unwrap()
            .set_attribute("axis_order", "zyx")
            .unwrap()
            .build();
        assert!(meta.validate().is_ok());
        assert_eq!(meta.get_effective_fill_value::<f32>(), Ok(1.0));
        assert!(meta.get_effective_fill_value::<u8>().is_err());
        assert_eq!(meta.numel(), 6_000_000);
    }

    #[test]
    fn builder_rejects_bad_chunks() {
        assert!(ArrayMetadataBuilder::<u8>::new(&[4, 4]).chunk_grid(&[2]).is_err());
        assert!(ArrayMetadataBuilder::<u8>::new(&[4, 4]).chunk_grid(&[2, 0]).is_err());
        assert!(ArrayMetadataBuilder::<u8>::new(&[4, 4])
            .dimension_names(smallvec![None])
            .is_err());
    }

    #[test]
    fn write_read_all() {
        let store = HashMapStore::new();
        let meta = ArrayMetadataBuilder::<u16>::new(&[5, 7])
            .chunk_grid(&[2, 3])
            .unwrap()
            .push_bb_codec(GzipCodec::fastest())
            .build();
        let arr = Array::<_, u16>::create(&store, key("g/arr"), meta).unwrap();
        let data: Vec<u16> = (0..35).collect();
        arr.write_all(&data).unwrap();
        arr.write_meta().unwrap();

        let again = Array::<_, u16>::from_store(&store, key("g/arr")).unwrap();
        assert_eq!(again.read_all().unwrap(), data);
        assert_eq!(again.read_chunk(&[2, 2]).unwrap().unwrap().len(), 6);
        assert!(Group::from_store(&store, key("g")).is_ok());
    }

    #[test]
    fn fill_chunks_not_stored() {
        let store = HashMapStore::new();
        let meta = ArrayMetadataBuilder::<u8>::new(&[4, 4])
            .chunk_grid(&[2, 2])
            .unwrap()
            .build();
        let arr = Array::<_, u8>::create(&store, key("arr"), meta).unwrap();
        #[rustfmt::skip]
        let data: Vec<u8> = vec![
            1, 1, 0, 0,
            1, 1, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ];
        arr.write_all(&data).unwrap();
        assert_eq!(arr.read_chunk(&[0, 0]).unwrap(), Some(vec![1, 1, 1, 1]));
        assert_eq!(arr.read_chunk(&[1, 1]).unwrap(), None);
        assert_eq!(arr.read_all().unwrap(), data);
        // root group and one chunk, no metadata yet
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn create_replaces_existing() {
        let store = HashMapStore::new();
        let meta = ArrayMetadataBuilder::<u8>::new(&[2, 2]).build();
        let arr = Array::<_, u8>::create(&store, key("arr"), meta.clone()).unwrap();
        arr.write_all(&[1, 2, 3, 4]).unwrap();
        arr.write_meta().unwrap();

        let arr = Array::<_, u8>::create(&store, key("arr"), meta).unwrap();
        assert!(Array::<_, u8>::from_store(&store, key("arr")).is_err());
        assert_eq!(arr.read_all().unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn wrong_type_or_shape() {
        let store = HashMapStore::new();
        let meta = ArrayMetadataBuilder::<u8>::new(&[2, 2]).build();
        let arr = Array::<_, u8>::create(&store, key("arr"), meta).unwrap();
        assert_eq!(
            arr.write_all(&[1, 2, 3]).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        arr.write_meta().unwrap();
        assert!(Array::<_, u16>::from_store(&store, key("arr")).is_err());
        assert_eq!(
            Array::<_, u8>::from_store(&store, key("nothing"))
                .err()
                .map(|e| e.kind()),
            Some(ErrorKind::NotFound)
        );
    }

    #[test]
    fn zero_extent() {
        let store = HashMapStore::new();
        let meta = ArrayMetadataBuilder::<u8>::new(&[0, 3]).build();
        let arr = Array::<_, u8>::create(&store, key("empty"), meta).unwrap();
        arr.write_all(&[]).unwrap();
        assert!(arr.read_all().unwrap().is_empty());
    }
}
