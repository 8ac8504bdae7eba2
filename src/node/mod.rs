use std::{
    collections::HashMap,
    io::{self, ErrorKind},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

mod array;
pub use array::{Array, ArrayMetadata, ArrayMetadataBuilder};
mod group;
pub use group::{Group, GroupMetadata};

use crate::{
    store::{ListableStore, NodeKey, ReadableStore, WriteableStore},
    variant_from_data,
};

pub type JsonObject = HashMap<String, serde_json::Value>;

pub trait ReadableMetadata {
    fn get_zarr_format(&self) -> usize;

    fn is_array(&self) -> bool;

    fn get_attributes(&self) -> &JsonObject;

    fn has_attribute(&self, key: &str) -> bool {
        self.get_attributes().contains_key(key)
    }

    fn get_attribute<D: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<Result<D, serde_json::Error>> {
        self.get_attributes()
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
    }
}

pub trait WriteableMetadata {
    fn mutate_attributes<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut JsonObject) -> R;

    /// Returns the replaced attribute, if any (without deserialising).
    fn set_attribute<S: Serialize>(
        &mut self,
        key: &str,
        value: S,
    ) -> Result<Option<serde_json::Value>, serde_json::Error> {
        let v = serde_json::to_value(value)?;
        let k = key.to_string();
        Ok(self.mutate_attributes(|a| a.insert(k, v)))
    }

    /// Returns the previous attribute value, if it existed
    fn remove_attribute(&mut self, key: &str) -> Option<serde_json::Value> {
        self.mutate_attributes(|a| a.remove(key))
    }
}

/// Contents of a `zarr.json` document.
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "node_type", rename_all = "lowercase")]
pub enum Metadata {
    Array(ArrayMetadata),
    Group(GroupMetadata),
}

// serialising through references avoids cloning metadata on every write
#[derive(Serialize)]
#[serde(tag = "node_type", rename_all = "lowercase")]
enum MetadataRef<'a> {
    Array(&'a ArrayMetadata),
    Group(&'a GroupMetadata),
}

impl Serialize for Metadata {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Array(m) => MetadataRef::Array(m),
            Self::Group(m) => MetadataRef::Group(m),
        }
        .serialize(serializer)
    }
}

impl ReadableMetadata for Metadata {
    fn get_zarr_format(&self) -> usize {
        match self {
            Metadata::Array(m) => m.get_zarr_format(),
            Metadata::Group(m) => m.get_zarr_format(),
        }
    }

    fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    fn get_attributes(&self) -> &JsonObject {
        match self {
            Metadata::Array(m) => m.get_attributes(),
            Metadata::Group(m) => m.get_attributes(),
        }
    }
}

impl WriteableMetadata for Metadata {
    fn mutate_attributes<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut JsonObject) -> R,
    {
        match self {
            Metadata::Array(m) => m.mutate_attributes(f),
            Metadata::Group(m) => m.mutate_attributes(f),
        }
    }
}

variant_from_data!(Metadata, Array, ArrayMetadata);
variant_from_data!(Metadata, Group, GroupMetadata);

pub(crate) fn invalid_data<E>(error: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(ErrorKind::InvalidData, error)
}

fn meta_key_for(key: &NodeKey) -> NodeKey {
    let mut meta_key = key.clone();
    meta_key.with_metadata();
    meta_key
}

/// Read the metadata document of the node at `key`.
///
/// `Ok(None)` if there is no node there.
pub fn read_metadata<S: ReadableStore>(store: &S, key: &NodeKey) -> io::Result<Option<Metadata>> {
    match store.get_bytes(&meta_key_for(key))? {
        Some(b) => Ok(Some(serde_json::from_slice(&b).map_err(invalid_data)?)),
        None => Ok(None),
    }
}

fn write_metadata<S: WriteableStore>(
    store: &S,
    key: &NodeKey,
    metadata: MetadataRef,
) -> io::Result<()> {
    let meta_key = meta_key_for(key);
    store.set(&meta_key, |w| {
        serde_json::to_writer_pretty(w, &metadata).map_err(io::Error::from)
    })
}

/// Every array node in the store, sorted by key.
pub fn list_arrays<S>(store: &S) -> io::Result<Vec<(NodeKey, ArrayMetadata)>>
where
    S: ReadableStore + ListableStore,
{
    let mut out = Vec::default();
    for mut key in store.list()?.into_iter().filter(|k| k.is_metadata()) {
        key.pop();
        if let Some(Metadata::Array(m)) = read_metadata(store, &key)? {
            out.push((key, m));
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HashMapStore;

    const EXAMPLE_ARRAY_META: &str = r#"
        {
            "zarr_format": 3,
            "node_type": "array",
            "shape": [3, 289, 400],
            "dimension_names": ["c", "y", "x"],
            "data_type": "uint16",
            "chunk_grid": {
                "name": "regular",
                "configuration": {
                    "chunk_shape": [1, 289, 400]
                }
            },
            "chunk_key_encoding": {
                "name": "default",
                "configuration": {
                    "separator": "/"
                }
            },
            "codecs": [
                {"name": "bytes", "configuration": {"endian": "little"}},
                {"name": "gzip", "configuration": {"level": 1}}
            ],
            "fill_value": 0,
            "attributes": {
                "axis_order": "cyx"
            }
        }
    "#;

    const EXAMPLE_GROUP_META: &str = r#"
        {
            "zarr_format": 3,
            "node_type": "group",
            "attributes": {
                "foo": 42
            }
        }
    "#;

    #[test]
    fn array_meta_roundtrip() {
        let meta: Metadata = serde_json::from_str(EXAMPLE_ARRAY_META).unwrap();
        assert!(meta.is_array());
        assert_eq!(
            meta.get_attribute::<String>("axis_order").unwrap().unwrap(),
            "cyx"
        );
        let s = serde_json::to_string(&meta).unwrap();
        assert!(s.contains(r#""node_type":"array""#));
        let again: Metadata = serde_json::from_str(&s).unwrap();
        match (meta, again) {
            (Metadata::Array(a), Metadata::Array(b)) => assert_eq!(a, b),
            _ => panic!("Expected array metadata"),
        }
    }

    #[test]
    fn group_meta_roundtrip() {
        let mut meta: Metadata = serde_json::from_str(EXAMPLE_GROUP_META).unwrap();
        assert!(!meta.is_array());
        assert!(meta.has_attribute("foo"));
        meta.set_attribute("bar", "apples").unwrap();
        assert_eq!(meta.remove_attribute("foo"), Some(serde_json::json!(42)));
        let s = serde_json::to_string(&meta).unwrap();
        assert!(s.contains(r#""node_type":"group""#));
    }

    #[test]
    fn malformed_metadata_is_invalid_data() {
        let store = HashMapStore::new();
        let key: NodeKey = "broken".parse().unwrap();
        store
            .set_bytes(&meta_key_for(&key), b"{\"node_type\": \"array\"}")
            .unwrap();
        let err = read_metadata(&store, &key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(read_metadata(&store, &"missing".parse().unwrap())
            .unwrap()
            .is_none());
    }
}
