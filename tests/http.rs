use std::io::Read;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use handheld_catalog::catalog::{CatalogClient, HttpCatalogClient};
use handheld_catalog::domain::CollectionId;
use handheld_catalog::error::{CatalogError, ErrorKind};
use handheld_catalog::fetcher::MetadataFetcher;
use handheld_catalog::store::CacheStore;

const DOOM_FILES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<files>
  <file name="doom.zip" source="original">
    <format>ZIP</format>
  </file>
  <file name="doom_meta.xml" source="metadata"/>
</files>"#;

fn id(value: &str) -> CollectionId {
    value.parse().unwrap()
}

#[test]
fn list_files_reads_xml_listing() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/download/doom/doom_files.xml")
        .with_status(200)
        .with_header("content-type", "application/xml")
        .with_body(DOOM_FILES)
        .create();

    let client = HttpCatalogClient::with_base_url(&server.url()).unwrap();
    let names = client.list_files(&id("doom")).unwrap();

    mock.assert();
    assert_eq!(names, vec!["doom.zip", "doom_meta.xml"]);
}

#[test]
fn list_files_accepts_json_listing() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/download/gba-set/gba-set_files.xml")
        .with_status(200)
        .with_body(r#"{"files": [{"name": "b.zip"}, {"name": "a.zip"}]}"#)
        .create();

    let client = HttpCatalogClient::with_base_url(&server.url()).unwrap();
    assert_eq!(
        client.list_files(&id("gba-set")).unwrap(),
        vec!["b.zip", "a.zip"]
    );
}

#[test]
fn missing_collection_is_http_status() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/download/nope/nope_files.xml")
        .with_status(404)
        .create();

    let client = HttpCatalogClient::with_base_url(&server.url()).unwrap();
    let err = client.list_files(&id("nope")).unwrap_err();
    assert_matches!(err, CatalogError::HttpStatus { status: 404, .. });
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[test]
fn file_without_name_is_decode_error() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/download/bad/bad_files.xml")
        .with_status(200)
        .with_body("<files><file source=\"original\"/></files>")
        .create();

    let client = HttpCatalogClient::with_base_url(&server.url()).unwrap();
    assert_matches!(
        client.list_files(&id("bad")),
        Err(CatalogError::Decode(_))
    );
}

#[test]
fn open_streams_body_with_length() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/download/doom/doom.zip")
        .with_status(200)
        .with_body(vec![5u8; 4096])
        .create();

    let client = HttpCatalogClient::with_base_url(&server.url()).unwrap();
    let url = client.download_url(&id("doom"), "doom.zip").unwrap();
    let mut remote = client.open(&url).unwrap();
    assert_eq!(remote.total, Some(4096));

    let mut body = Vec::new();
    remote.body.read_to_end(&mut body).unwrap();
    assert_eq!(body.len(), 4096);
}

#[test]
fn fetch_through_http_writes_cache_once() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/download/doom/doom_files.xml")
        .with_status(200)
        .with_body(DOOM_FILES)
        .expect(1)
        .create();

    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let client = HttpCatalogClient::with_base_url(&server.url()).unwrap();
    let fetcher = MetadataFetcher::new(CacheStore::new(root), client);

    let first = fetcher.fetch(&id("doom")).unwrap();
    let second = fetcher.fetch(&id("doom")).unwrap();

    mock.assert();
    assert_eq!(first, second);
    assert_eq!(
        first.get("doom.zip"),
        Some(format!("{}/download/doom/doom.zip", server.url()).as_str())
    );
}

#[test]
fn listing_entry_outside_the_collection_fails() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/download/doom/doom_files.xml")
        .with_status(200)
        .with_body(r#"<files><file name="../other/x.zip"/></files>"#)
        .create();

    let client = HttpCatalogClient::with_base_url(&server.url()).unwrap();
    assert_matches!(
        client.list_files(&id("doom")),
        Err(CatalogError::Decode(_))
    );
    assert_matches!(
        client.download_url(&id("doom"), "../other/x.zip"),
        Err(CatalogError::InvalidFileName(_))
    );
}
