use assert_matches::assert_matches;

use handheld_catalog::browse::find_item;
use handheld_catalog::domain::{CacheEntry, CollectionId, Item, Listing, Progress};
use handheld_catalog::download::sanitize_file_name;
use handheld_catalog::error::CatalogError;

#[test]
fn collection_ids_are_validated() {
    for valid in ["doom", "gba-set", "No-Intro_2024.01", " padded "] {
        assert!(valid.parse::<CollectionId>().is_ok(), "{valid}");
    }
    for invalid in ["", "../etc", "a/b", "a\\b", "-leading", "space inside", "a..b"] {
        assert_matches!(
            invalid.parse::<CollectionId>(),
            Err(CatalogError::InvalidCollection(_)),
            "{invalid}"
        );
    }
}

#[test]
fn collection_id_deserialization_validates() {
    let ok: CollectionId = serde_json::from_str("\"gba-set\"").unwrap();
    assert_eq!(ok.as_str(), "gba-set");
    assert!(serde_json::from_str::<CollectionId>("\"../x\"").is_err());
}

#[test]
fn listing_from_entries_keeps_last_duplicate() {
    let listing: Listing = vec![
        CacheEntry {
            name: "b.zip".to_string(),
            url: "u1".to_string(),
        },
        CacheEntry {
            name: "a.zip".to_string(),
            url: "u2".to_string(),
        },
        CacheEntry {
            name: "b.zip".to_string(),
            url: "u3".to_string(),
        },
    ]
    .into_iter()
    .collect();

    assert_eq!(listing.len(), 2);
    assert_eq!(listing.get("b.zip"), Some("u3"));
    let names: Vec<&str> = listing.names().collect();
    assert_eq!(names, vec!["a.zip", "b.zip"]);
}

#[test]
fn item_file_name_is_last_segment() {
    let item = Item {
        name: "USA/Doom (E).zip".to_string(),
        url: "u".to_string(),
        unzip: false,
    };
    assert_eq!(item.file_name(), "Doom (E).zip");
}

#[test]
fn progress_percent() {
    let half = Progress {
        downloaded: 50,
        total: Some(100),
    };
    assert_eq!(half.percent(), Some(50));
    let unknown = Progress {
        downloaded: 50,
        total: None,
    };
    assert_eq!(unknown.fraction(), None);
}

#[test]
fn item_file_name_matches_the_written_file() {
    let items = vec![Item {
        name: "Europe\\ Tetris (E).gb ".to_string(),
        url: "u".to_string(),
        unzip: false,
    }];
    let item = &items[0];
    assert_eq!(item.file_name(), "Tetris (E).gb");
    assert_eq!(sanitize_file_name(&item.name).unwrap(), item.file_name());
    assert!(find_item(&items, "Tetris (E).gb").is_some());
}
