use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use handheld_catalog::domain::{CollectionId, Listing};
use handheld_catalog::error::CatalogError;
use handheld_catalog::store::CacheStore;

fn temp_store() -> (tempfile::TempDir, CacheStore) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("archive_metadata")).unwrap();
    (temp, CacheStore::new(root))
}

#[test]
fn round_trip() {
    let (_temp, store) = temp_store();
    let id: CollectionId = "gba-set".parse().unwrap();

    let mut listing = Listing::new();
    listing.insert("b.zip", "https://archive.org/download/gba-set/b.zip");
    listing.insert("a.zip", "https://archive.org/download/gba-set/a.zip");
    store.save(&id, &listing).unwrap();

    assert_eq!(store.load(&id).unwrap(), listing);
    assert_eq!(store.lookup(&id).unwrap(), Some(listing));
}

#[test]
fn missing_file_is_empty_not_error() {
    let (_temp, store) = temp_store();
    let id: CollectionId = "nothing".parse().unwrap();
    assert!(store.load(&id).unwrap().is_empty());
    assert_eq!(store.lookup(&id).unwrap(), None);
}

#[test]
fn empty_listing_is_a_known_collection() {
    let (_temp, store) = temp_store();
    let id: CollectionId = "empty".parse().unwrap();
    store.save(&id, &Listing::new()).unwrap();
    assert_eq!(store.lookup(&id).unwrap(), Some(Listing::new()));
}

#[test]
fn persisted_object_keeps_sorted_keys() {
    let (_temp, store) = temp_store();
    let id: CollectionId = "mixed".parse().unwrap();

    let mut listing = Listing::new();
    listing.insert("zelda.zip", "u3");
    listing.insert("Metroid.zip", "u1");
    listing.insert("advance.zip", "u2");
    store.save(&id, &listing).unwrap();

    let raw = std::fs::read_to_string(store.cache_path(&id)).unwrap();
    let metroid = raw.find("Metroid.zip").unwrap();
    let advance = raw.find("advance.zip").unwrap();
    let zelda = raw.find("zelda.zip").unwrap();
    assert!(metroid < advance && advance < zelda);
}

#[test]
fn save_overwrites_previous_cache() {
    let (_temp, store) = temp_store();
    let id: CollectionId = "gba-set".parse().unwrap();

    let mut first = Listing::new();
    first.insert("old.zip", "u-old");
    store.save(&id, &first).unwrap();

    let mut second = Listing::new();
    second.insert("new.zip", "u-new");
    store.save(&id, &second).unwrap();

    let loaded = store.load(&id).unwrap();
    assert_eq!(loaded.get("old.zip"), None);
    assert_eq!(loaded.get("new.zip"), Some("u-new"));
}

#[test]
fn garbled_cache_is_decode_error() {
    let (_temp, store) = temp_store();
    let id: CollectionId = "broken".parse().unwrap();
    let path = store.cache_path(&id);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{not json").unwrap();

    assert_matches!(store.load(&id), Err(CatalogError::Decode(_)));
}

#[test]
fn save_under_a_file_is_filesystem_error() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let store = CacheStore::new(Utf8PathBuf::from_path_buf(blocker.join("cache")).unwrap());
    let id: CollectionId = "doom".parse().unwrap();

    assert_matches!(
        store.save(&id, &Listing::new()),
        Err(CatalogError::Filesystem(_))
    );
}
