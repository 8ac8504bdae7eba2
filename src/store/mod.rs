use log::warn;
use smallvec::SmallVec;
use std::{
    collections::HashSet,
    fmt::Display,
    io::{self, Read, Write},
    str::FromStr,
};

mod hashmap;
pub use hashmap::HashMapStore;

#[cfg(feature = "filesystem")]
pub mod filesystem;

const NODE_KEY_SIZE: usize = 10;
pub(crate) const METADATA_NAME: &str = "zarr.json";
pub(crate) const KEY_SEP: &str = "/";

/// A single validated component of a [NodeKey].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeName(String);

impl NodeName {
    pub fn new(s: String) -> Result<Self, InvalidNodeName> {
        Self::validate(&s)?;
        Ok(Self(s))
    }

    fn validate(s: &str) -> Result<(), InvalidNodeName> {
        if s.is_empty() {
            return Err(InvalidNodeName::Empty);
        }
        if s.contains('/') {
            return Err(InvalidNodeName::HasSlash);
        }
        if s.chars().all(|c| c == '.') {
            return Err(InvalidNodeName::IsPeriods);
        }
        if s.starts_with("__") {
            return Err(InvalidNodeName::ReservedPrefix);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.'))
        {
            warn!("Node name has non-recommended character `{}`; prefer `a-z`, `A-Z`, `0-9`, `-`, `_`, `.`", c);
        }
        Ok(())
    }
}

impl Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for NodeName {
    type Err = InvalidNodeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InvalidNodeName {
    #[error("Node name is empty string")]
    Empty,
    #[error("Node name contains '/'")]
    HasSlash,
    #[error("Node name is comprised only of periods")]
    IsPeriods,
    #[error("Node name starts with reserved prefix '__'")]
    ReservedPrefix,
}

impl From<InvalidNodeName> for io::Error {
    fn from(value: InvalidNodeName) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, value)
    }
}

/// Path to a node or object in a store; the root is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodeKey(SmallVec<[NodeName; NODE_KEY_SIZE]>);

impl FromIterator<NodeName> for NodeKey {
    fn from_iter<T: IntoIterator<Item = NodeName>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parses `/`-separated paths; leading, trailing and repeated separators are ignored.
impl FromStr for NodeKey {
    type Err = InvalidNodeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(KEY_SEP)
            .filter(|c| !c.is_empty())
            .map(|c| c.parse())
            .collect()
    }
}

impl Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", KEY_SEP)?;
        let parts: Vec<&str> = self.0.iter().map(|n| n.as_ref()).collect();
        f.write_str(&parts.join(KEY_SEP))
    }
}

impl NodeKey {
    /// Adds a new key component in-place, returning the new number of components.
    pub fn push(&mut self, name: NodeName) -> usize {
        self.0.push(name);
        self.0.len()
    }

    /// Adds a component which is known to be valid, such as an encoded chunk coordinate.
    pub(crate) fn push_unchecked(&mut self, name: &str) -> usize {
        self.0.push(NodeName(name.to_owned()));
        self.0.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pop the last key component.
    ///
    /// None if we are at the root.
    pub fn pop(&mut self) -> Option<NodeName> {
        self.0.pop()
    }

    pub fn last(&self) -> Option<&NodeName> {
        self.0.last()
    }

    pub fn parent(&self) -> Option<NodeKey> {
        let mut p = self.clone();
        p.pop().map(|_| p)
    }

    pub fn starts_with(&self, other: &NodeKey) -> bool {
        self.len() >= other.len()
            && self
                .as_slice()
                .iter()
                .zip(other.as_slice().iter())
                .all(|(a, b)| a == b)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn with_metadata(&mut self) -> usize {
        self.push_unchecked(METADATA_NAME)
    }

    /// Whether the final component is the metadata document.
    pub fn is_metadata(&self) -> bool {
        self.last().map(|n| n.as_ref() == METADATA_NAME).unwrap_or(false)
    }

    pub fn as_slice(&self) -> &[NodeName] {
        self.0.as_slice()
    }
}

pub trait ReadableStore {
    type Readable: Read;

    /// `Ok(None)` if the key does not exist.
    fn get(&self, key: &NodeKey) -> io::Result<Option<Self::Readable>>;

    fn has_key(&self, key: &NodeKey) -> io::Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Read a whole object into memory.
    fn get_bytes(&self, key: &NodeKey) -> io::Result<Option<Vec<u8>>> {
        match self.get(key)? {
            Some(mut r) => {
                let mut buf = Vec::default();
                r.read_to_end(&mut buf)?;
                Ok(Some(buf))
            }
            None => Ok(None),
        }
    }
}

pub trait ListableStore {
    /// Retrieve all keys in the store.
    fn list(&self) -> io::Result<Vec<NodeKey>> {
        self.list_prefix(&NodeKey::default())
    }

    /// Retrieve all keys with a given prefix.
    fn list_prefix(&self, key: &NodeKey) -> io::Result<Vec<NodeKey>> {
        let mut to_visit = vec![key.clone()];
        let mut result = vec![];

        while let Some(next) = to_visit.pop() {
            let (keys, prefixes) = self.list_dir(&next)?;
            result.extend(keys);
            to_visit.extend(prefixes);
        }

        Ok(result)
    }

    /// Retrieve all keys and prefixes with a given prefix and which do not
    /// contain the character “/” after the given prefix.
    fn list_dir(&self, prefix: &NodeKey) -> io::Result<(Vec<NodeKey>, Vec<NodeKey>)>;
}

// Readable constraint needed for partial writes
pub trait WriteableStore: ReadableStore {
    type Writeable: Write;

    /// Replace the object at the key with whatever the closure writes.
    fn set<F>(&self, key: &NodeKey, value: F) -> io::Result<()>
    where
        F: FnOnce(&mut Self::Writeable) -> io::Result<()>;

    fn set_bytes(&self, key: &NodeKey, value: &[u8]) -> io::Result<()> {
        self.set(key, |w| w.write_all(value))
    }

    /// Returns whether the key existed.
    fn erase(&self, key: &NodeKey) -> io::Result<bool>;

    /// Returns whether anything existed under the prefix.
    fn erase_prefix(&self, key_prefix: &NodeKey) -> io::Result<bool>;
}

pub(crate) fn list_prefix_from_all_keys_ref<'a, I>(keys: I, prefix: &NodeKey) -> Vec<NodeKey>
where
    I: Iterator<Item = &'a NodeKey>,
{
    keys.filter(|k| k.starts_with(prefix)).cloned().collect()
}

pub(crate) fn list_dir_from_all_keys_ref<'a, I>(
    keys: I,
    prefix: &NodeKey,
) -> (Vec<NodeKey>, Vec<NodeKey>)
where
    I: Iterator<Item = &'a NodeKey>,
{
    let mut out_keys = Vec::default();
    let mut prefixes: HashSet<NodeKey> = HashSet::new();
    for k in keys.filter(|k| k.starts_with(prefix) && k.len() > prefix.len()) {
        if k.len() == prefix.len() + 1 {
            out_keys.push(k.clone());
        } else {
            prefixes.insert(k.as_slice()[..=prefix.len()].iter().cloned().collect());
        }
    }
    let mut prefixes: Vec<NodeKey> = prefixes.into_iter().collect();
    out_keys.sort();
    prefixes.sort();
    (out_keys, prefixes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_names() {
        assert!("exported_data".parse::<NodeName>().is_ok());
        assert!(matches!("".parse::<NodeName>(), Err(InvalidNodeName::Empty)));
        assert!(matches!("..".parse::<NodeName>(), Err(InvalidNodeName::IsPeriods)));
        assert!(matches!(
            "__meta".parse::<NodeName>(),
            Err(InvalidNodeName::ReservedPrefix)
        ));
        assert!(matches!(
            NodeName::new("a/b".to_owned()),
            Err(InvalidNodeName::HasSlash)
        ));
    }

    #[test]
    fn node_key_parse() {
        let k: NodeKey = "/group//data/".parse().unwrap();
        assert_eq!(k.len(), 2);
        assert_eq!(k.to_string(), "/group/data");
        assert_eq!(k.parent().unwrap().to_string(), "/group");
        assert!(k.starts_with(&"group".parse().unwrap()));
        assert!("/".parse::<NodeKey>().unwrap().is_root());
        assert!(NodeKey::default().parent().is_none());
    }

    #[test]
    fn metadata_key() {
        let mut k: NodeKey = "data".parse().unwrap();
        assert!(!k.is_metadata());
        k.with_metadata();
        assert!(k.is_metadata());
        assert_eq!(k.to_string(), "/data/zarr.json");
    }

    #[test]
    fn list_dir_from_keys() {
        let keys: Vec<NodeKey> = ["a/zarr.json", "a/c/0/0", "a/c/0/1", "b/zarr.json", "zarr.json"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let (k, p) = list_dir_from_all_keys_ref(keys.iter(), &NodeKey::default());
        assert_eq!(k, vec!["zarr.json".parse::<NodeKey>().unwrap()]);
        assert_eq!(p.len(), 2);
        let (k, p) = list_dir_from_all_keys_ref(keys.iter(), &"a".parse().unwrap());
        assert_eq!(k.len(), 1);
        assert_eq!(p, vec!["a/c".parse::<NodeKey>().unwrap()]);
    }
}
