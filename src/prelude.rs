pub use crate::axes::{parse as parse_dimensions, Axis, AxisOrder, Dimensions, DEFAULT_AXIS_ORDER};
pub use crate::codecs::ab::bytes_codec::Endian;
pub use crate::dataset::{
    list_store_datasets, read_from_store, write_to_store, DatasetInfo, WriteOptions,
};
#[cfg(feature = "filesystem")]
pub use crate::dataset::{list_datasets, read_dataset, write_dataset};
pub use crate::error::{Error, Result};
pub use crate::image::{CanonicalImage, DisplayRange, ElementKind, Hyperstack};
#[cfg(feature = "filesystem")]
pub use crate::store::filesystem::FileSystemStore;
pub use crate::store::{HashMapStore, ListableStore, ReadableStore, WriteableStore};
