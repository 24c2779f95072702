//! End-to-end tests through the line protocol with the embedded index.

use serde_json::{json, Value};
use tempfile::TempDir;

use shuttle_core::config::Config;
use shuttle_core::protocol::handle;
use shuttle_core::state::CoreState;

// ==================== Test Helpers ====================

fn open_state(dir: &TempDir) -> CoreState {
    let config = Config {
        store_path: dir.path().join("store.json"),
        ..Config::default()
    };
    CoreState::open(config).expect("state should open")
}

fn call(state: &mut CoreState, cmd: &str, payload: Value) -> Value {
    let line = json!({ "id": cmd, "cmd": cmd, "payload": payload }).to_string();
    let resp: Value = serde_json::from_str(&handle(state, &line)).expect("response is json");
    assert_eq!(resp["status"], "ok", "{cmd} failed: {resp}");
    resp["payload"].clone()
}

fn translation(id: u64, key_id: u64, source: &str, copy: &str, locale: &str, approved: bool) -> Value {
    json!({
        "id": id,
        "key_id": key_id,
        "source_copy": source,
        "copy": copy,
        "source_rfc5646_locale": "en-US",
        "rfc5646_locale": locale,
        "translated": true,
        "approved": approved,
        "created_at": format!("2024-01-01T00:{:02}:00Z", id),
        "updated_at": format!("2024-01-01T00:{:02}:00Z", id),
    })
}

fn seed(state: &mut CoreState) {
    for (id, hidden) in [(1, false), (2, false), (3, true)] {
        call(
            state,
            "key.put",
            json!({ "key": { "id": id, "project_id": 1, "key": format!("k{id}"), "hidden_in_search": hidden } }),
        );
    }
    call(
        state,
        "translation.put",
        json!({ "translations": [
            translation(1, 1, "Save file", "Enregistrer le fichier", "fr", true),
            translation(2, 1, "Save file", "Datei speichern", "de", true),
            translation(3, 2, "Open recent files", "Ouvrir les fichiers récents", "fr", true),
            translation(4, 2, "Open recent files", "Zuletzt geöffnete Dateien", "de", false),
            translation(5, 3, "Debug menu", "Menu de débogage", "fr", true),
        ] }),
    );
}

fn ids(page: &Value) -> Vec<u64> {
    page["translations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_u64().unwrap())
        .collect()
}

// ==================== Search ====================

#[test]
fn search_without_filters_returns_visible_translations() {
    let dir = TempDir::new().unwrap();
    let mut state = open_state(&dir);
    seed(&mut state);

    let page = call(&mut state, "search", json!({}));
    assert_eq!(page["total_count"], 4);
    assert_eq!(ids(&page), vec![4, 3, 2, 1]);
}

#[test]
fn search_filters_compose() {
    let dir = TempDir::new().unwrap();
    let mut state = open_state(&dir);
    seed(&mut state);

    let page = call(&mut state, "search", json!({ "target_locales": "fr" }));
    assert_eq!(ids(&page), vec![3, 1]);

    let page = call(&mut state, "search", json!({ "hidden_keys": "true" }));
    assert_eq!(ids(&page), vec![5]);

    let page = call(
        &mut state,
        "search",
        json!({ "target_locales": "de", "query": "datei", "project_id": 1 }),
    );
    assert_eq!(ids(&page), vec![2]);
}

#[test]
fn hiding_a_key_changes_search_visibility() {
    let dir = TempDir::new().unwrap();
    let mut state = open_state(&dir);
    seed(&mut state);

    let resp = call(
        &mut state,
        "key.put",
        json!({ "key": { "id": 1, "project_id": 1, "hidden_in_search": true } }),
    );
    assert_eq!(resp["reindexed"], 2);

    let page = call(&mut state, "search", json!({}));
    assert_eq!(ids(&page), vec![4, 3]);
    let page = call(&mut state, "search", json!({ "hidden_keys": true }));
    assert_eq!(ids(&page), vec![5, 2, 1]);
}

// ==================== Fuzzy matching ====================

#[test]
fn fuzzy_match_scores() {
    let dir = TempDir::new().unwrap();
    let mut state = open_state(&dir);
    seed(&mut state);

    let exact = call(&mut state, "fuzzy.top", json!({ "query": "Save file", "locale": "fr" }));
    assert_eq!(exact["match_percentage"], 100.0);

    // Translation 4 is the only German candidate for this source and it is not approved.
    let none = call(&mut state, "fuzzy.top", json!({ "query": "Open recent files", "locale": "de" }));
    assert_eq!(none["match_percentage"], 0.0);

    let weak = call(&mut state, "fuzzy.top", json!({ "query": "save changes now", "locale": "fr" }));
    assert_eq!(weak["match_percentage"], 0.0);

    let matches = call(
        &mut state,
        "fuzzy.matches",
        json!({ "query": "Open recent file", "locale": "fr" }),
    );
    let matches = matches["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["translation"]["id"], 3);
    assert!(matches[0]["match_percentage"].as_f64().unwrap() > 90.0);
}

// ==================== Persistence ====================

#[test]
fn store_round_trip_restores_index() {
    let dir = TempDir::new().unwrap();
    {
        let mut state = open_state(&dir);
        seed(&mut state);
        call(&mut state, "translation.delete", json!({ "id": 2 }));
        call(&mut state, "store.save", json!({}));
    }

    let mut state = open_state(&dir);
    let stats = call(&mut state, "index.stats", json!({}));
    assert_eq!(stats["backend"], "memory");
    assert_eq!(stats["keys"], 3);
    assert_eq!(stats["translations"], 4);
    assert_eq!(stats["indexed"], 4);

    let page = call(&mut state, "search", json!({ "target_locales": "de" }));
    assert_eq!(ids(&page), vec![4]);
}

#[test]
fn import_replaces_catalog() {
    let dir = TempDir::new().unwrap();
    let export = dir.path().join("export.json");
    let snapshot = json!({
        "keys": [{ "id": 9, "project_id": 4 }],
        "translations": [translation(1, 9, "Quit", "Quitter", "fr", true)],
    });
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend(snapshot.to_string().into_bytes());
    std::fs::write(&export, bytes).unwrap();

    let mut state = open_state(&dir);
    seed(&mut state);
    let resp = call(&mut state, "store.import", json!({ "path": export.to_string_lossy() }));
    assert_eq!(resp["keys"], 1);
    assert_eq!(resp["indexed"], 1);

    let page = call(&mut state, "search", json!({ "project_id": 4 }));
    assert_eq!(ids(&page), vec![1]);
}
