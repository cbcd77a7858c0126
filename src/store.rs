use std::fs;
use std::io::{self, Write};
use std::sync::RwLock;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::{CollectionId, Listing};
use crate::error::CatalogError;

pub const DEFAULT_CACHE_DIR: &str = ".cache/archive_metadata";

static CACHE_LOCK: RwLock<()> = RwLock::new(());

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: Utf8PathBuf,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_DIR)
    }
}

impl CacheStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn cache_path(&self, collection: &CollectionId) -> Utf8PathBuf {
        self.root.join(format!("cache_{collection}.json"))
    }

    pub fn load(&self, collection: &CollectionId) -> Result<Listing, CatalogError> {
        Ok(self.lookup(collection)?.unwrap_or_default())
    }

    /// Like [`CacheStore::load`], but tells a missing cache file apart from a
    /// cached collection with no files.
    pub fn lookup(&self, collection: &CollectionId) -> Result<Option<Listing>, CatalogError> {
        let path = self.cache_path(collection);
        let _guard = CACHE_LOCK.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let content = match fs::read(path.as_std_path()) {
            Ok(content) => content,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                return Ok(None);
            }
            Err(err) => {
                return Err(CatalogError::Filesystem(format!(
                    "open cache file {path}: {err}"
                )));
            }
        };
        let listing = serde_json::from_slice(&content)
            .map_err(|err| CatalogError::Decode(format!("cache file {path}: {err}")))?;
        Ok(Some(listing))
    }

    pub fn save(&self, collection: &CollectionId, listing: &Listing) -> Result<(), CatalogError> {
        let path = self.cache_path(collection);
        let content = serde_json::to_vec_pretty(listing)
            .map_err(|err| CatalogError::Filesystem(format!("encode cache {path}: {err}")))?;

        let _guard = CACHE_LOCK.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        Self::write_atomic(&path, &content)
    }

    fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), CatalogError> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path()).map_err(|err| {
            CatalogError::Filesystem(format!("create cache directory {parent}: {err}"))
        })?;
        let mut temp = Builder::new()
            .prefix("cache")
            .suffix(".tmp")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| CatalogError::Filesystem(format!("create temp file in {parent}: {err}")))?;
        temp.write_all(content)
            .map_err(|err| CatalogError::Filesystem(format!("write cache file {path}: {err}")))?;
        temp.persist(path.as_std_path())
            .map_err(|err| CatalogError::Filesystem(format!("replace cache file {path}: {err}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn store_in(temp: &tempfile::TempDir) -> CacheStore {
        let root = Utf8PathBuf::from_path_buf(temp.path().join("archive_metadata")).unwrap();
        CacheStore::new(root)
    }

    #[test]
    fn missing_cache_loads_empty() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_in(&temp);
        let id: CollectionId = "doom".parse().unwrap();
        assert!(store.load(&id).unwrap().is_empty());
        assert_eq!(store.lookup(&id).unwrap(), None);
    }

    #[test]
    fn garbled_cache_is_a_decode_error() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_in(&temp);
        let id: CollectionId = "doom".parse().unwrap();
        let path = store.cache_path(&id);
        fs::create_dir_all(path.parent().unwrap().as_std_path()).unwrap();
        fs::write(path.as_std_path(), b"{not json").unwrap();
        assert_matches!(store.load(&id), Err(CatalogError::Decode(_)));
    }

    #[test]
    fn cache_path_is_derived_from_collection() {
        let store = CacheStore::default();
        let id: CollectionId = "doom".parse().unwrap();
        assert_eq!(
            store.cache_path(&id).as_str(),
            ".cache/archive_metadata/cache_doom.json"
        );
    }
}
