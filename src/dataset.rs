//! Reading and writing whole images as stored datasets.
//!
//! A dataset is an array node whose dimensions are labelled by an axis order.
//! Every write records that order in the `axis_order` attribute
//! (and as `dimension_names`), so it can be read back without one.
#[cfg(feature = "filesystem")]
use std::path::Path;
use std::io::{self, ErrorKind};

use log::{debug, info};

use crate::{
    axes::{self, Axis, AxisOrder, Dimensions},
    codecs::{
        ab::bytes_codec::{BytesCodec, Endian},
        bb::gzip_codec::GzipCodec,
    },
    data_type::DataType,
    error::{Error, Result},
    image::{expand_argb, CanonicalImage, ElementKind, Hyperstack, Pixel},
    node::{
        list_arrays, read_metadata, Array, ArrayMetadata, ArrayMetadataBuilder, Metadata,
        ReadableMetadata,
    },
    reshape,
    store::{ListableStore, NodeKey, ReadableStore, WriteableStore},
    GridCoord,
};

#[cfg(feature = "filesystem")]
use crate::store::filesystem::FileSystemStore;

/// Attribute holding the axis order a dataset was written with.
pub const AXIS_ORDER_ATTRIBUTE: &str = "axis_order";

/// How to lay out and encode a written dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    axis_order: AxisOrder,
    compression_level: u32,
    endian: Endian,
    chunk_shape: Option<GridCoord>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            axis_order: AxisOrder::default(),
            compression_level: 0,
            endian: Endian::Little,
            chunk_shape: None,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Order of the stored dimensions, slowest-varying first.
    pub fn axis_order(mut self, axis_order: AxisOrder) -> Self {
        self.axis_order = axis_order;
        self
    }

    /// Gzip level, 0 (store) to 9 (smallest).
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Explicit chunk shape, one entry per axis of the axis order.
    ///
    /// By default, chunks span all of x and y, up to 4 channels, and a single z and time.
    pub fn chunk_shape(mut self, chunk_shape: &[u64]) -> Self {
        self.chunk_shape = Some(chunk_shape.iter().cloned().collect());
        self
    }

    pub fn get_axis_order(&self) -> &AxisOrder {
        &self.axis_order
    }

    /// Check everything which does not depend on the image.
    pub fn validate(&self) -> Result<GzipCodec> {
        self.axis_order.check_required()?;
        Ok(GzipCodec::from_level(self.compression_level)?)
    }

    fn resolve_chunk_shape(&self, shape: &[u64]) -> Result<GridCoord> {
        let Some(chunks) = &self.chunk_shape else {
            return Ok(default_chunk_shape(&self.axis_order, shape));
        };
        if chunks.len() != shape.len() {
            return Err(Error::shape_mismatch(shape.len(), chunks.len()));
        }
        for (c, s) in chunks.iter().zip(shape.iter()) {
            if *c == 0 || *c > (*s).max(1) {
                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("Chunk shape {chunks:?} does not fit dataset shape {shape:?}"),
                )
                .into());
            }
        }
        Ok(chunks.clone())
    }
}

/// Whole planes, up to 4 channels, one z and one time point per chunk.
pub fn default_chunk_shape(order: &AxisOrder, shape: &[u64]) -> GridCoord {
    order
        .axes()
        .iter()
        .zip(shape.iter())
        .map(|(axis, extent)| {
            let c = match axis {
                Axis::X | Axis::Y => *extent,
                Axis::Channel => (*extent).min(4),
                Axis::Z | Axis::Time => 1,
            };
            c.max(1)
        })
        .collect()
}

/// Summary of a stored dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub name: String,
    pub shape: Vec<u64>,
    pub data_type: DataType,
    pub axis_order: Option<String>,
}

impl DatasetInfo {
    fn new(key: &NodeKey, meta: &ArrayMetadata) -> Self {
        let axis_order = meta
            .get_attribute::<String>(AXIS_ORDER_ATTRIBUTE)
            .and_then(|r| r.ok());
        Self {
            name: key.to_string().trim_start_matches('/').to_owned(),
            shape: meta.shape().to_vec(),
            data_type: meta.data_type(),
            axis_order,
        }
    }

    /// Whether the data type can be read as an image.
    pub fn is_supported(&self) -> bool {
        ElementKind::from_data_type(self.data_type).is_ok()
    }
}

/// Datasets are never at the root: replacing one there would erase the whole container.
fn node_key(name: &str) -> Result<NodeKey> {
    let key: NodeKey = name
        .parse()
        .map_err(|e: crate::store::InvalidNodeName| Error::Io(e.into()))?;
    if key.is_root() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("Dataset name `{name}` refers to the container root"),
        )
        .into());
    }
    Ok(key)
}

fn read_order(meta: &ArrayMetadata, axis_order: Option<&str>) -> Result<AxisOrder> {
    if let Some(o) = axis_order {
        return o.parse();
    }
    match meta.get_attribute::<String>(AXIS_ORDER_ATTRIBUTE) {
        Some(Ok(o)) => o.parse(),
        Some(Err(e)) => Err(Error::invalid_axis_order(
            "",
            format!("`{AXIS_ORDER_ATTRIBUTE}` attribute is not a string: {e}"),
        )),
        None => Err(Error::invalid_axis_order(
            "",
            format!("none given and the dataset has no `{AXIS_ORDER_ATTRIBUTE}` attribute"),
        )),
    }
}

fn read_typed<S, T>(
    store: &S,
    key: NodeKey,
    meta: ArrayMetadata,
    dims: &Dimensions,
    order: &AxisOrder,
) -> Result<Hyperstack<T>>
where
    S: ReadableStore,
    T: Pixel,
{
    let flat = Array::<S, T>::new(store, key, meta)?.read_all()?;
    let planes = reshape::scatter(&flat, dims, order)?;
    Hyperstack::new(*dims, planes)
}

/// Read the dataset `name` from a store into a canonical image.
///
/// Without an `axis_order`, the order recorded when the dataset was written is used.
pub fn read_from_store<S: ReadableStore>(
    store: &S,
    name: &str,
    axis_order: Option<&str>,
) -> Result<CanonicalImage> {
    let key = node_key(name)?;
    let meta = match read_metadata(store, &key)? {
        Some(Metadata::Array(m)) => m,
        Some(Metadata::Group(_)) => {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{key} is a group, not a dataset"),
            )
            .into())
        }
        None => {
            return Err(
                io::Error::new(ErrorKind::NotFound, format!("No dataset at {key}")).into(),
            )
        }
    };

    let order = read_order(&meta, axis_order)?;
    let dims = axes::resolve(meta.shape(), &order)?;
    let kind = ElementKind::from_data_type(meta.data_type())?;
    debug!("Reading {key} as {kind}");

    let k = key.clone();
    let image = match kind {
        ElementKind::UInt8 => CanonicalImage::UInt8(read_typed(store, k, meta, &dims, &order)?),
        ElementKind::UInt16 => CanonicalImage::UInt16(read_typed(store, k, meta, &dims, &order)?),
        ElementKind::UInt32 => CanonicalImage::UInt32(read_typed(store, k, meta, &dims, &order)?),
        ElementKind::Float32 => {
            CanonicalImage::Float32(read_typed(store, k, meta, &dims, &order)?)
        }
        // from_data_type never yields colour
        ElementKind::Argb32 => return Err(Error::UnsupportedElementType(kind.to_string())),
    };
    info!("Read {key} ({dims}, {kind}) with axis order `{order}`");
    Ok(image)
}

fn write_typed<S, T>(
    store: &S,
    key: &NodeKey,
    image: &Hyperstack<T>,
    options: &WriteOptions,
    gzip: GzipCodec,
) -> Result<()>
where
    S: WriteableStore,
    T: Pixel,
{
    let order = &options.axis_order;
    let dims = image.dims();
    let shape = dims.shape_for(order)?;
    let chunk_shape = options.resolve_chunk_shape(&shape)?;
    let flat = reshape::gather(image.planes(), dims, order)?;
    debug!("Writing {key} with shape {shape:?} in chunks of {chunk_shape:?}");

    let invalid = |e: &'static str| Error::Io(io::Error::new(ErrorKind::InvalidInput, e));
    let dimension_names = order
        .axes()
        .iter()
        .map(|a| Some(a.as_char().to_string()))
        .collect();
    let meta = ArrayMetadataBuilder::<T>::new(&shape)
        .chunk_grid(&chunk_shape)
        .map_err(invalid)?
        .ab_codec(BytesCodec::new(Some(options.endian)))
        .push_bb_codec(gzip)
        .set_attribute(AXIS_ORDER_ATTRIBUTE, order.to_string())
        .map_err(invalid)?
        .dimension_names(dimension_names)
        .map_err(invalid)?
        .build();

    let arr = Array::<S, T>::create(store, key.clone(), meta)?;
    arr.write_all(&flat)?;
    // only now does the dataset become readable
    arr.write_meta()?;
    Ok(())
}

/// Write an image to the dataset `name` in a store, replacing anything already there.
///
/// Colour images are stored as 4 `uint8` channels (alpha, red, green, blue) per source channel.
pub fn write_to_store<S: WriteableStore>(
    store: &S,
    name: &str,
    image: &CanonicalImage,
    options: &WriteOptions,
) -> Result<()> {
    let gzip = options.validate()?;
    let key = node_key(name)?;
    match image {
        CanonicalImage::UInt8(h) => write_typed(store, &key, h, options, gzip)?,
        CanonicalImage::UInt16(h) => write_typed(store, &key, h, options, gzip)?,
        CanonicalImage::UInt32(h) => write_typed(store, &key, h, options, gzip)?,
        CanonicalImage::Float32(h) => write_typed(store, &key, h, options, gzip)?,
        CanonicalImage::Argb32(h) => write_typed(store, &key, &expand_argb(h), options, gzip)?,
    }
    info!(
        "Wrote {key} ({}, {}) with axis order `{}`",
        image.dims(),
        image.kind(),
        options.axis_order
    );
    Ok(())
}

/// Every dataset in a store, sorted by name.
pub fn list_store_datasets<S>(store: &S) -> Result<Vec<DatasetInfo>>
where
    S: ReadableStore + ListableStore,
{
    Ok(list_arrays(store)?
        .iter()
        .map(|(k, m)| DatasetInfo::new(k, m))
        .collect())
}

/// Read the dataset `name` from the container at `path`.
#[cfg(feature = "filesystem")]
pub fn read_dataset<P: AsRef<Path>>(
    path: P,
    name: &str,
    axis_order: Option<&str>,
) -> Result<CanonicalImage> {
    let store = FileSystemStore::open(path)?;
    read_from_store(&store, name, axis_order)
}

/// Write an image to the dataset `name` in the container at `path`,
/// creating the container if needed.
#[cfg(feature = "filesystem")]
pub fn write_dataset<P: AsRef<Path>>(
    path: P,
    name: &str,
    image: &CanonicalImage,
    options: &WriteOptions,
) -> Result<()> {
    options.validate()?;
    node_key(name)?;
    image.dims().shape_for(options.get_axis_order())?;
    let store = FileSystemStore::open_or_create(path, true)?;
    write_to_store(&store, name, image, options)
}

/// Every dataset in the container at `path`.
#[cfg(feature = "filesystem")]
pub fn list_datasets<P: AsRef<Path>>(path: P) -> Result<Vec<DatasetInfo>> {
    let store = FileSystemStore::open(path)?;
    list_store_datasets(&store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HashMapStore;

    fn order(s: &str) -> AxisOrder {
        s.parse().unwrap()
    }

    #[test]
    fn default_chunks() {
        let o = order("tzyxc");
        assert_eq!(
            default_chunk_shape(&o, &[7, 6, 5, 4, 9]).as_slice(),
            &[1, 1, 5, 4, 4]
        );
        assert_eq!(
            default_chunk_shape(&o, &[7, 6, 5, 4, 3]).as_slice(),
            &[1, 1, 5, 4, 3]
        );
        assert_eq!(default_chunk_shape(&order("yx"), &[0, 3]).as_slice(), &[1, 3]);
    }

    #[test]
    fn explicit_chunks_validated() {
        let opts = WriteOptions::new().axis_order(order("yx")).chunk_shape(&[2, 2]);
        assert_eq!(opts.resolve_chunk_shape(&[4, 4]).unwrap().as_slice(), &[2, 2]);
        assert!(matches!(
            opts.resolve_chunk_shape(&[4, 4, 1]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(opts.resolve_chunk_shape(&[1, 4]), Err(Error::Io(_))));
    }

    #[test]
    fn compression_level_checked_before_writing() {
        let store = HashMapStore::new();
        let img = CanonicalImage::UInt8(Hyperstack::zeros(Dimensions::new(2, 2, 1, 1, 1)));
        let opts = WriteOptions::new().compression_level(10);
        assert!(matches!(
            write_to_store(&store, "img", &img, &opts),
            Err(Error::InvalidCompressionLevel(10))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn records_axis_order() {
        let store = HashMapStore::new();
        let img = CanonicalImage::UInt16(Hyperstack::from_fn(
            Dimensions::new(3, 2, 1, 4, 1),
            |x, y, _, z, _| (x + y + z) as u16,
        ));
        let opts = WriteOptions::new().axis_order(order("zyx")).compression_level(3);
        write_to_store(&store, "a/img", &img, &opts).unwrap();

        let datasets = list_store_datasets(&store).unwrap();
        assert_eq!(
            datasets,
            vec![DatasetInfo {
                name: "a/img".to_owned(),
                shape: vec![4, 2, 3],
                data_type: DataType::UInt(crate::data_type::IntSize::b16),
                axis_order: Some("zyx".to_owned()),
            }]
        );
        assert!(datasets[0].is_supported());

        let Some(Metadata::Array(meta)) = read_metadata(&store, &node_key("a/img").unwrap()).unwrap()
        else {
            panic!("Expected array metadata");
        };
        assert_eq!(
            meta.dimension_names().unwrap(),
            &[Some("z".to_owned()), Some("y".to_owned()), Some("x".to_owned())]
        );
        assert_eq!(read_from_store(&store, "a/img", None).unwrap(), img);
    }

    #[test]
    fn unlisted_axis_must_be_singleton() {
        let store = HashMapStore::new();
        let img = CanonicalImage::UInt8(Hyperstack::zeros(Dimensions::new(2, 2, 3, 1, 1)));
        let opts = WriteOptions::new().axis_order(order("yx"));
        assert!(matches!(
            write_to_store(&store, "img", &img, &opts),
            Err(Error::InvalidAxisOrder { .. })
        ));
    }

    #[test]
    fn missing_order_without_attribute() {
        let store = HashMapStore::new();
        let arr = Array::<_, u8>::create(
            &store,
            node_key("raw").unwrap(),
            ArrayMetadataBuilder::<u8>::new(&[2, 2]).build(),
        )
        .unwrap();
        arr.write_all(&[1, 2, 3, 4]).unwrap();
        arr.write_meta().unwrap();

        assert!(matches!(
            read_from_store(&store, "raw", None),
            Err(Error::InvalidAxisOrder { .. })
        ));
        let img = read_from_store(&store, "raw", Some("YX")).unwrap();
        assert_eq!(img.dims(), &Dimensions::new(2, 2, 1, 1, 1));
    }

    #[test]
    fn root_is_not_a_dataset() {
        let store = HashMapStore::new();
        let img = CanonicalImage::UInt8(Hyperstack::from_fn(
            Dimensions::new(2, 2, 1, 1, 1),
            |x, y, _, _, _| (x + 2 * y) as u8,
        ));
        let opts = WriteOptions::new().axis_order(order("yx"));
        write_to_store(&store, "keep", &img, &opts).unwrap();

        for name in ["/", "", "//"] {
            assert!(matches!(
                write_to_store(&store, name, &img, &opts),
                Err(Error::Io(e)) if e.kind() == ErrorKind::InvalidInput
            ));
            assert!(matches!(
                read_from_store(&store, name, Some("yx")),
                Err(Error::Io(e)) if e.kind() == ErrorKind::InvalidInput
            ));
        }
        assert_eq!(read_from_store(&store, "keep", None).unwrap(), img);
    }

    #[test]
    fn zero_extent_roundtrip() {
        let store = HashMapStore::new();
        let o = order("tyxc");
        assert_eq!(default_chunk_shape(&o, &[3, 0, 4, 2]).as_slice(), &[1, 1, 4, 2]);

        let img = CanonicalImage::UInt16(Hyperstack::zeros(Dimensions::new(4, 0, 2, 1, 3)));
        let opts = WriteOptions::new().axis_order(o);
        write_to_store(&store, "empty", &img, &opts).unwrap();
        assert_eq!(list_store_datasets(&store).unwrap()[0].shape, vec![3, 0, 4, 2]);

        let back = read_from_store(&store, "empty", None).unwrap();
        assert_eq!(back.dims(), &Dimensions::new(4, 0, 2, 1, 3));
        assert_eq!(back, img);
    }

    #[test]
    fn not_a_dataset() {
        let store = HashMapStore::new();
        assert!(matches!(
            read_from_store(&store, "nothing", Some("yx")),
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound
        ));
        assert!(matches!(
            read_from_store(&store, "__bad", Some("yx")),
            Err(Error::Io(e)) if e.kind() == ErrorKind::InvalidInput
        ));
    }
}
