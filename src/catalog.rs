use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::domain::CollectionId;
use crate::error::CatalogError;
use crate::listing::parse_listing;

pub const DEFAULT_CATALOG_URL: &str = "https://archive.org";

pub struct RemoteFile {
    /// Declared content length; `None` when absent or zero.
    pub total: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

pub trait CatalogClient: Send + Sync {
    fn list_files(&self, collection: &CollectionId) -> Result<Vec<String>, CatalogError>;
    /// Fails for names with `.` or `..` segments, which a URL cannot carry
    /// without leaving the collection.
    fn download_url(&self, collection: &CollectionId, name: &str) -> Result<String, CatalogError>;
    fn open(&self, url: &str) -> Result<RemoteFile, CatalogError>;
}

#[derive(Clone)]
pub struct HttpCatalogClient {
    client: Client,
    base_url: Url,
}

impl HttpCatalogClient {
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_base_url(DEFAULT_CATALOG_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, CatalogError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| CatalogError::Http(format!("invalid catalog url {base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::Http(format!(
                "catalog url cannot be a base: {base_url}"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("handheld-catalog/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CatalogError::Http(err.to_string()))?,
        );
        // No total timeout: only explicit cancellation stops a transfer.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| CatalogError::Http(err.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn listing_url(&self, collection: &CollectionId) -> String {
        let file = format!("{collection}_files.xml");
        self.collection_url(collection, [file.as_str()])
    }

    fn collection_url<'a>(
        &self,
        collection: &CollectionId,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push("download")
                .push(collection.as_str())
                .extend(segments);
        }
        url.to_string()
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, CatalogError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| CatalogError::Http(format!("GET {url}: {err}")))?;
        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

impl CatalogClient for HttpCatalogClient {
    fn list_files(&self, collection: &CollectionId) -> Result<Vec<String>, CatalogError> {
        let url = self.listing_url(collection);
        let body = self
            .get(&url)?
            .text()
            .map_err(|err| CatalogError::Http(format!("read listing {url}: {err}")))?;
        parse_listing(&body).map_err(|err| match err {
            CatalogError::Decode(message) => {
                CatalogError::Decode(format!("listing of {collection}: {message}"))
            }
            other => other,
        })
    }

    fn download_url(&self, collection: &CollectionId, name: &str) -> Result<String, CatalogError> {
        if name.split('/').any(is_dot_segment) {
            return Err(CatalogError::InvalidFileName(format!(
                "{name} (in collection {collection})"
            )));
        }
        Ok(self.collection_url(collection, name.split('/')))
    }

    fn open(&self, url: &str) -> Result<RemoteFile, CatalogError> {
        let response = self.get(url)?;
        let total = response.content_length().filter(|len| *len > 0);
        Ok(RemoteFile {
            total,
            body: Box::new(response),
        })
    }
}

pub(crate) fn is_dot_segment(segment: &str) -> bool {
    matches!(segment, "." | "..")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn download_url_escapes_each_segment() {
        let client = HttpCatalogClient::new().unwrap();
        let id: CollectionId = "gba-set".parse().unwrap();
        assert_eq!(
            client
                .download_url(&id, "USA/Metroid Fusion (E).zip")
                .unwrap(),
            "https://archive.org/download/gba-set/USA/Metroid%20Fusion%20(E).zip"
        );
        assert_eq!(
            client.listing_url(&id),
            "https://archive.org/download/gba-set/gba-set_files.xml"
        );
    }

    #[test]
    fn base_url_with_path_is_kept() {
        let client = HttpCatalogClient::with_base_url("http://127.0.0.1:9000/mirror/").unwrap();
        let id: CollectionId = "doom".parse().unwrap();
        assert_eq!(
            client.download_url(&id, "doom.zip").unwrap(),
            "http://127.0.0.1:9000/mirror/download/doom/doom.zip"
        );
    }

    #[test]
    fn dot_segments_cannot_leave_the_collection() {
        let client = HttpCatalogClient::new().unwrap();
        let id: CollectionId = "doom".parse().unwrap();
        for name in ["../other/x.zip", "a/./b.zip", "..", "roms/.."] {
            assert_matches!(
                client.download_url(&id, name),
                Err(CatalogError::InvalidFileName(_)),
                "{name}"
            );
        }
        assert_eq!(
            client.download_url(&id, "a/..b.zip").unwrap(),
            "https://archive.org/download/doom/a/..b.zip"
        );
    }
}
