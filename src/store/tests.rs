//! Tests for RawStore

use super::*;
use serde_json::json;
use tempfile::tempdir;

fn store_in(dir: &std::path::Path) -> RawStore {
    RawStore::new(dir, "gastos_pagina_").unwrap()
}

// ============================================================================
// Paths
// ============================================================================

#[test]
fn test_path_for_is_deterministic() {
    let store = store_in(std::path::Path::new("/data/raw"));
    assert_eq!(
        store.path_for(42),
        std::path::PathBuf::from("/data/raw/gastos_pagina_42.json")
    );
    assert_eq!(store.path_for(42), store.path_for(42));
}

#[test]
fn test_page_of_parses_own_names_only() {
    let store = store_in(std::path::Path::new("/data/raw"));
    assert_eq!(store.page_of("gastos_pagina_7.json"), Some(7));
    assert_eq!(store.page_of("gastos_pagina_.json"), None);
    assert_eq!(store.page_of("other_7.json"), None);
    assert_eq!(store.page_of("gastos_pagina_7.json.tmp"), None);
}

#[test]
fn test_prefix_is_escaped() {
    let store = RawStore::new("/data", "page.v1+").unwrap();
    assert_eq!(store.page_of("page.v1+3.json"), Some(3));
    assert_eq!(store.page_of("pageXv1+3.json"), None);
}

// ============================================================================
// Write / Exists
// ============================================================================

#[tokio::test]
async fn test_write_then_exists() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    assert!(!store.exists(1).await);
    let path = store.write(1, &json!({"results": []})).await.unwrap();
    assert!(store.exists(1).await);
    assert_eq!(path, store.path_for(1));
    assert!(!store.exists(2).await);
}

#[tokio::test]
async fn test_write_is_pretty_and_keeps_unicode() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    let payload = json!({"results": [{"nome_orgao": "Ministério da Saúde", "ano": 2020}]});
    let path = store.write(3, &payload).await.unwrap();

    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.contains("Ministério da Saúde"));
    assert!(!text.contains("\\u00"));
    assert!(text.contains("\n    \"results\""));

    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, payload);
}

#[tokio::test]
async fn test_write_preserves_key_order() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    let payload: serde_json::Value =
        serde_json::from_str(r#"{"count": 1, "next": null, "results": [{"z": 1, "a": 2}]}"#)
            .unwrap();
    let path = store.write(1, &payload).await.unwrap();
    let text = std::fs::read_to_string(path).unwrap();

    let count = text.find("\"count\"").unwrap();
    let results = text.find("\"results\"").unwrap();
    assert!(count < results);
    assert!(text.find("\"z\"").unwrap() < text.find("\"a\"").unwrap());
}

#[tokio::test]
async fn test_write_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    store.write(5, &json!({"results": [1]})).await.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["gastos_pagina_5.json".to_string()]);
}

#[tokio::test]
async fn test_write_into_missing_dir_fails_cleanly() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir.path().join("does/not/exist"));

    let err = store.write(1, &json!({})).await.unwrap_err();
    assert!(matches!(err, crate::Error::Store { .. }));
    assert!(!store.exists(1).await);
}

#[tokio::test]
async fn test_ensure_dir_creates_tree() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir.path().join("dataset/raw"));

    store.ensure_dir().await.unwrap();
    store.write(1, &json!({})).await.unwrap();
    assert!(store.exists(1).await);
}

// ============================================================================
// Listing / Reading
// ============================================================================

#[tokio::test]
async fn test_list_all_orders_by_page_number() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    for page in [10, 2, 1] {
        store.write(page, &json!({"results": []})).await.unwrap();
    }
    std::fs::write(dir.path().join("extra.json"), "{}").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    std::fs::create_dir(dir.path().join("nested.json")).unwrap();

    let docs = store.list_all().await.unwrap();
    let names: Vec<String> = docs.iter().map(StoredDocument::name).collect();
    assert_eq!(
        names,
        vec![
            "gastos_pagina_1.json",
            "gastos_pagina_2.json",
            "gastos_pagina_10.json",
            "extra.json"
        ]
    );
    assert_eq!(docs[2].page, Some(10));
    assert_eq!(docs[3].page, None);
}

#[tokio::test]
async fn test_list_all_missing_dir_is_empty() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir.path().join("nothing-here"));
    assert!(store.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_returns_raw_text() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    std::fs::write(store.path_for(4), "not json").unwrap();

    let docs = store.list_all().await.unwrap();
    assert_eq!(store.read(&docs[0]).await.unwrap(), "not json");
}
