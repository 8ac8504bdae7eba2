use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind};

use log::debug;

use crate::{
    store::{NodeKey, ReadableStore, WriteableStore},
    ZARR_FORMAT,
};

use super::{
    read_metadata, write_metadata, JsonObject, Metadata, MetadataRef, ReadableMetadata,
    WriteableMetadata,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GroupMetadata {
    zarr_format: usize,
    #[serde(default)]
    attributes: JsonObject,
}

impl ReadableMetadata for GroupMetadata {
    fn get_attributes(&self) -> &JsonObject {
        &self.attributes
    }

    fn get_zarr_format(&self) -> usize {
        self.zarr_format
    }

    fn is_array(&self) -> bool {
        false
    }
}

impl WriteableMetadata for GroupMetadata {
    fn mutate_attributes<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut JsonObject) -> R,
    {
        f(&mut self.attributes)
    }
}

// For implicit groups
impl Default for GroupMetadata {
    fn default() -> Self {
        Self {
            zarr_format: ZARR_FORMAT,
            attributes: JsonObject::default(),
        }
    }
}

/// A node which holds other nodes.
pub struct Group<'s, S> {
    store: &'s S,
    key: NodeKey,
    metadata: GroupMetadata,
}

impl<'s, S> Group<'s, S> {
    /// Does not write metadata.
    pub fn new(store: &'s S, key: NodeKey, metadata: GroupMetadata) -> Self {
        Self {
            store,
            key,
            metadata,
        }
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn metadata(&self) -> &GroupMetadata {
        &self.metadata
    }
}

impl<'s, S> ReadableMetadata for Group<'s, S> {
    fn get_zarr_format(&self) -> usize {
        self.metadata.get_zarr_format()
    }

    fn is_array(&self) -> bool {
        false
    }

    fn get_attributes(&self) -> &JsonObject {
        self.metadata.get_attributes()
    }
}

impl<'s, S> WriteableMetadata for Group<'s, S> {
    fn mutate_attributes<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut JsonObject) -> R,
    {
        self.metadata.mutate_attributes(f)
    }
}

impl<'s, S: ReadableStore> Group<'s, S> {
    pub fn from_store(store: &'s S, key: NodeKey) -> io::Result<Self> {
        match read_metadata(store, &key)? {
            Some(Metadata::Group(m)) => Ok(Self::new(store, key, m)),
            Some(Metadata::Array(_)) => Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("Node at {key} is an array, not a group"),
            )),
            None => Err(io::Error::new(
                ErrorKind::NotFound,
                format!("Group metadata not found at {key}"),
            )),
        }
    }
}

impl<'s, S: WriteableStore> Group<'s, S> {
    pub fn write_meta(&self) -> io::Result<()> {
        write_metadata(self.store, &self.key, MetadataRef::Group(&self.metadata))
    }
}

/// Write default group metadata for every ancestor of `key` which has none.
///
/// Fails if an ancestor is an array.
pub(crate) fn create_parent_groups<S: WriteableStore>(store: &S, key: &NodeKey) -> io::Result<()> {
    let mut parent = key.parent();
    while let Some(p) = parent {
        match read_metadata(store, &p)? {
            Some(Metadata::Group(_)) => (),
            Some(Metadata::Array(_)) => {
                return Err(io::Error::new(
                    ErrorKind::AlreadyExists,
                    format!("Cannot create a node inside array {p}"),
                ))
            }
            None => {
                debug!("Creating implicit group at {p}");
                Group::new(store, p.clone(), GroupMetadata::default()).write_meta()?;
            }
        }
        parent = p.parent();
    }
    Ok(())
}
