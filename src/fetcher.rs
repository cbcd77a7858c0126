use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::catalog::CatalogClient;
use crate::domain::{CollectionId, CollectionListing, Listing};
use crate::error::CatalogError;
use crate::store::CacheStore;

#[derive(Debug, Clone)]
pub struct MetadataFetcher<C: CatalogClient> {
    store: CacheStore,
    catalog: C,
}

impl<C: CatalogClient> MetadataFetcher<C> {
    pub fn new(store: CacheStore, catalog: C) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn fetch(&self, collection: &CollectionId) -> Result<Listing, CatalogError> {
        if let Some(cached) = self.store.lookup(collection)? {
            debug!(%collection, files = cached.len(), "metadata cache hit");
            return Ok(cached);
        }

        debug!(%collection, "metadata cache miss");
        let start = Instant::now();
        let names = self.catalog.list_files(collection)?;
        let mut listing = Listing::new();
        for name in names {
            let url = self.catalog.download_url(collection, &name)?;
            listing.insert(name, url);
        }
        info!(
            %collection,
            files = listing.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "fetched remote listing"
        );

        if let Err(err) = self.store.save(collection, &listing) {
            warn!(%collection, error = %err, "failed to persist metadata cache");
        }
        Ok(listing)
    }

    /// Any failure fails the whole batch. Results come back in completion order.
    pub fn fetch_all(
        &self,
        collections: &[CollectionId],
    ) -> Result<Vec<CollectionListing>, CatalogError> {
        if collections.is_empty() {
            return Ok(Vec::new());
        }

        let (tx, rx) = mpsc::sync_channel(collections.len());
        thread::scope(|scope| {
            for collection in collections {
                let tx = tx.clone();
                scope.spawn(move || {
                    let result = self.fetch(collection).map(|listing| CollectionListing {
                        collection: collection.clone(),
                        listing,
                    });
                    let _ = tx.send(result);
                });
            }
        });
        drop(tx);

        let mut listings = Vec::with_capacity(collections.len());
        let mut first_error = None;
        for result in rx {
            match result {
                Ok(listing) => listings.push(listing),
                Err(err) => {
                    warn!(error = %err, "collection fetch failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(listings),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use camino::Utf8PathBuf;

    use super::*;
    use crate::catalog::RemoteFile;

    struct MockCatalog {
        calls: Mutex<usize>,
        names: Vec<String>,
    }

    impl CatalogClient for MockCatalog {
        fn list_files(&self, _collection: &CollectionId) -> Result<Vec<String>, CatalogError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.names.clone())
        }

        fn download_url(
            &self,
            collection: &CollectionId,
            name: &str,
        ) -> Result<String, CatalogError> {
            Ok(format!("mock://{collection}/{name}"))
        }

        fn open(&self, url: &str) -> Result<RemoteFile, CatalogError> {
            Err(CatalogError::Http(format!("not implemented: {url}")))
        }
    }

    #[test]
    fn unwritable_cache_does_not_fail_fetch() {
        let temp = tempfile::tempdir().unwrap();
        // A regular file where the cache directory should be.
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let root = Utf8PathBuf::from_path_buf(blocker.join("cache")).unwrap();

        let fetcher = MetadataFetcher::new(
            CacheStore::new(root),
            MockCatalog {
                calls: Mutex::new(0),
                names: vec!["doom.zip".to_string()],
            },
        );
        let id: CollectionId = "doom".parse().unwrap();
        let listing = fetcher.fetch(&id).unwrap();
        assert_eq!(listing.get("doom.zip"), Some("mock://doom/doom.zip"));
        assert_eq!(*fetcher.catalog().calls.lock().unwrap(), 1);
    }

    #[test]
    fn fetch_all_of_nothing_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let fetcher = MetadataFetcher::new(
            CacheStore::new(root),
            MockCatalog {
                calls: Mutex::new(0),
                names: Vec::new(),
            },
        );
        assert!(fetcher.fetch_all(&[]).unwrap().is_empty());
        assert_eq!(*fetcher.catalog().calls.lock().unwrap(), 0);
    }
}
