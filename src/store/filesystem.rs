use std::{
    fs::{self, File},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use fs4::FileExt;
use log::warn;
use walkdir::WalkDir;

use super::{ListableStore, NodeKey, NodeName, ReadableStore, WriteableStore};

/// Store backed by a directory, one file per key.
///
/// Files are locked (shared for reads, exclusive for writes) while in use.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    base_path: PathBuf,
}

fn not_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        ErrorKind::Other,
        format!("Path exists, but it is a file: {}", path.display()),
    )
}

impl FileSystemStore {
    /// Open an existing directory.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let base_path = path.as_ref().canonicalize()?;
        if fs::metadata(&base_path)?.is_file() {
            return Err(not_a_directory(&base_path));
        }
        Ok(Self { base_path })
    }

    /// Create a new directory; fails if anything already exists at the path.
    pub fn create<P: AsRef<Path>>(path: P, parents: bool) -> io::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("Already exists: {}", path.display()),
            ));
        } else if parents {
            fs::create_dir_all(path)?;
        } else {
            fs::create_dir(path)?;
        }
        Ok(Self {
            base_path: path.canonicalize()?,
        })
    }

    pub fn open_or_create<P: AsRef<Path>>(path: P, parents: bool) -> io::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path, parents)
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn get_path(&self, key: &NodeKey) -> PathBuf {
        let mut p = self.base_path.clone();
        for k in key.as_slice().iter() {
            p.push(k.as_ref());
        }
        p
    }

    fn file_reader(&self, key: &NodeKey) -> io::Result<Option<File>> {
        let target = self.get_path(key);
        match File::open(&target) {
            Ok(f) => {
                if f.metadata()?.is_dir() {
                    return Ok(None);
                }
                f.lock_shared()?;
                Ok(Some(f))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl ReadableStore for FileSystemStore {
    type Readable = File;

    fn get(&self, key: &NodeKey) -> io::Result<Option<Self::Readable>> {
        self.file_reader(key)
    }

    fn has_key(&self, key: &NodeKey) -> io::Result<bool> {
        Ok(self.get_path(key).is_file())
    }
}

impl ListableStore for FileSystemStore {
    fn list_dir(&self, prefix: &NodeKey) -> io::Result<(Vec<NodeKey>, Vec<NodeKey>)> {
        let mut keys = Vec::default();
        let mut prefixes = Vec::default();

        let target = self.get_path(prefix);
        let entries = match fs::read_dir(&target) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok((keys, prefixes)),
            Err(e) => return Err(e),
        };

        for maybe_entry in entries {
            let entry = maybe_entry?;
            let fname = entry.file_name();
            let Some(name) = fname.to_str() else {
                warn!("Skipping file with non-UTF8 name in {}", target.display());
                continue;
            };
            let Ok(node_name) = name.parse::<NodeName>() else {
                continue;
            };
            let mut key = prefix.clone();
            key.push(node_name);

            if entry.file_type()?.is_dir() {
                prefixes.push(key);
            } else {
                keys.push(key);
            }
        }

        keys.sort();
        prefixes.sort();
        Ok((keys, prefixes))
    }
}

impl WriteableStore for FileSystemStore {
    type Writeable = File;

    fn set<F>(&self, key: &NodeKey, value: F) -> io::Result<()>
    where
        F: FnOnce(&mut Self::Writeable) -> io::Result<()>,
    {
        let path = self.get_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut f = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        f.lock_exclusive()?;
        // truncate only once we hold the lock
        f.set_len(0)?;
        value(&mut f)
    }

    fn erase(&self, key: &NodeKey) -> io::Result<bool> {
        let path = self.get_path(key);

        match File::open(&path) {
            Ok(f) => {
                if f.metadata()?.is_dir() {
                    return Ok(false);
                }
                f.lock_exclusive()?;
                fs::remove_file(&path)?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn erase_prefix(&self, key_prefix: &NodeKey) -> io::Result<bool> {
        let path = self.get_path(key_prefix);
        if !path.exists() {
            return Ok(false);
        }

        for entry in WalkDir::new(&path).contents_first(true) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                // the base directory of the store itself survives
                if entry.path() != self.base_path {
                    fs::remove_dir(entry.path())?;
                }
            } else {
                let file = File::open(entry.path())?;
                file.lock_exclusive()?;
                fs::remove_file(entry.path())?;
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn key(s: &str) -> NodeKey {
        s.parse().unwrap()
    }

    #[test]
    fn open_or_create_missing_dir() {
        let tmp = TempDir::new("fs-store").unwrap();
        let path = tmp.path().join("nested").join("container");
        assert!(FileSystemStore::open(&path).is_err());
        let store = FileSystemStore::open_or_create(&path, true).unwrap();
        assert!(store.base_path().is_dir());
        assert!(FileSystemStore::open_or_create(&path, false).is_ok());
        assert!(FileSystemStore::create(&path, false).is_err());
    }

    #[test]
    fn file_is_not_a_store() {
        let tmp = TempDir::new("fs-store").unwrap();
        let path = tmp.path().join("file");
        fs::write(&path, b"x").unwrap();
        assert!(FileSystemStore::open(&path).is_err());
    }

    #[test]
    fn set_get_list_erase() {
        let tmp = TempDir::new("fs-store").unwrap();
        let store = FileSystemStore::open(tmp.path()).unwrap();

        store.set_bytes(&key("img/c/0/0"), b"chunk").unwrap();
        store.set_bytes(&key("img/zarr.json"), b"{}").unwrap();
        store.set_bytes(&key("img/zarr.json"), b"[]").unwrap();
        assert_eq!(store.get_bytes(&key("img/zarr.json")).unwrap().unwrap(), b"[]");
        assert!(store.get(&key("img/c")).unwrap().is_none());
        assert!(!store.has_key(&key("img")).unwrap());

        let (keys, prefixes) = store.list_dir(&key("img")).unwrap();
        assert_eq!(keys, vec![key("img/zarr.json")]);
        assert_eq!(prefixes, vec![key("img/c")]);
        let mut all = store.list().unwrap();
        all.sort();
        assert_eq!(all, vec![key("img/c/0/0"), key("img/zarr.json")]);

        assert!(store.erase(&key("img/zarr.json")).unwrap());
        assert!(!store.erase(&key("img/zarr.json")).unwrap());
        assert!(store.erase_prefix(&key("img")).unwrap());
        assert!(store.list().unwrap().is_empty());
        assert!(tmp.path().is_dir());
    }
}
