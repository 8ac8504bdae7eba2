use std::{cell::RefCell, collections::HashMap, io};

use bytes::{
    buf::{Reader, Writer},
    Buf, BufMut, Bytes, BytesMut,
};

use super::{
    list_dir_from_all_keys_ref, list_prefix_from_all_keys_ref, ListableStore, NodeKey,
    ReadableStore, WriteableStore,
};

/// In-memory store, mainly useful for tests and scratch datasets.
#[derive(Debug, Default)]
pub struct HashMapStore {
    // this locks whole map for read of single key
    map: RefCell<HashMap<NodeKey, Bytes>>,
}

impl HashMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }
}

impl ReadableStore for HashMapStore {
    type Readable = Reader<Bytes>;

    fn get(&self, key: &NodeKey) -> io::Result<Option<Self::Readable>> {
        let map = self.map.borrow();
        // Bytes clones are refcounted
        Ok(map.get(key).map(|b| b.clone().reader()))
    }

    fn has_key(&self, key: &NodeKey) -> io::Result<bool> {
        Ok(self.map.borrow().contains_key(key))
    }
}

impl ListableStore for HashMapStore {
    fn list(&self) -> io::Result<Vec<NodeKey>> {
        let map = self.map.borrow();
        Ok(map.keys().cloned().collect())
    }

    fn list_prefix(&self, prefix: &NodeKey) -> io::Result<Vec<NodeKey>> {
        let map = self.map.borrow();
        Ok(list_prefix_from_all_keys_ref(map.keys(), prefix))
    }

    fn list_dir(&self, prefix: &NodeKey) -> io::Result<(Vec<NodeKey>, Vec<NodeKey>)> {
        let map = self.map.borrow();
        Ok(list_dir_from_all_keys_ref(map.keys(), prefix))
    }
}

impl WriteableStore for HashMapStore {
    type Writeable = Writer<BytesMut>;

    fn set<F>(&self, key: &NodeKey, value: F) -> io::Result<()>
    where
        F: FnOnce(&mut Self::Writeable) -> io::Result<()>,
    {
        let mut w = BytesMut::new().writer();
        value(&mut w)?;
        self.map
            .borrow_mut()
            .insert(key.clone(), w.into_inner().freeze());
        Ok(())
    }

    fn erase(&self, key: &NodeKey) -> io::Result<bool> {
        Ok(self.map.borrow_mut().remove(key).is_some())
    }

    fn erase_prefix(&self, key_prefix: &NodeKey) -> io::Result<bool> {
        let mut map = self.map.borrow_mut();
        let before = map.len();
        map.retain(|k, _v| !k.starts_with(key_prefix));
        Ok(map.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> NodeKey {
        s.parse().unwrap()
    }

    #[test]
    fn set_get_erase() {
        let store = HashMapStore::new();
        assert!(store.get_bytes(&key("a/b")).unwrap().is_none());
        store.set_bytes(&key("a/b"), b"hello").unwrap();
        assert_eq!(store.get_bytes(&key("a/b")).unwrap().unwrap(), b"hello");
        assert!(store.has_key(&key("a/b")).unwrap());
        assert!(store.erase(&key("a/b")).unwrap());
        assert!(!store.erase(&key("a/b")).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn prefixes() {
        let store = HashMapStore::new();
        for k in ["img/zarr.json", "img/c/0/0", "img/c/0/1", "other/zarr.json"] {
            store.set_bytes(&key(k), b"x").unwrap();
        }
        let mut listed = store.list_prefix(&key("img")).unwrap();
        listed.sort();
        assert_eq!(listed.len(), 3);
        assert!(store.erase_prefix(&key("img")).unwrap());
        assert_eq!(store.list().unwrap(), vec![key("other/zarr.json")]);
        assert!(!store.erase_prefix(&key("img")).unwrap());
    }
}
