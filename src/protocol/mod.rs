//! Line protocol: one JSON request per line in, one JSON response per line out.
//!
//! Request: `{"id": .., "cmd": "search", "payload": {..}}`.
//! Response: `{"id": .., "status": "ok", "payload": {..}}` or
//! `{"id": .., "status": "error", "message": ".."}`.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::model::{Key, Locale, Translation};
use crate::services::fuzzy_finder::FuzzyMatchTranslationsFinder;
use crate::services::search_finder::{SearchForm, SearchTranslationsFinder};
use crate::services::translation_memory::store;
use crate::services::encoding;
use crate::state::CoreState;

mod command;
use command::Command;

fn get_cmd(req: &Value) -> &str {
    req.get("cmd").and_then(|v| v.as_str()).unwrap_or("")
}

fn get_id(req: &Value) -> Value {
    req.get("id").cloned().unwrap_or(Value::Null)
}

fn get_payload(req: &Value) -> &Value {
    static EMPTY: Value = Value::Null;
    req.get("payload").unwrap_or(&EMPTY)
}

fn ok(id: Value, payload: Value) -> String {
    json!({
        "id": id,
        "status": "ok",
        "payload": payload
    })
    .to_string()
}

fn err(id: Value, message: impl Into<String>) -> String {
    json!({
        "id": id,
        "status": "error",
        "message": message.into()
    })
    .to_string()
}

fn field<T: DeserializeOwned>(payload: &Value, name: &str) -> Result<T, String> {
    let v = payload
        .get(name)
        .filter(|v| !v.is_null())
        .ok_or_else(|| format!("payload.{name} is required"))?;
    serde_json::from_value(v.clone()).map_err(|e| format!("invalid payload.{name}: {e}"))
}

fn path_or_default(payload: &Value, state: &CoreState) -> PathBuf {
    payload
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.store_path.clone())
}

/// Target locale for a fuzzy lookup: an explicit `locale`, or the locale of
/// the stored translation named by `translation_id`.
fn fuzzy_finder(state: &CoreState, payload: &Value) -> Result<FuzzyMatchTranslationsFinder, String> {
    let query: String = field(payload, "query")?;
    let settings = state.config.fuzzy_settings();

    if payload.get("locale").is_some_and(|v| !v.is_null()) {
        let locale: Locale = field(payload, "locale")?;
        return Ok(FuzzyMatchTranslationsFinder::new(query, locale, settings));
    }

    let translation_id: u64 = field(payload, "translation_id")
        .map_err(|_| "payload.locale or payload.translation_id is required".to_string())?;
    let translation = state
        .catalog
        .translation(translation_id)
        .ok_or_else(|| format!("unknown translation {translation_id}"))?;

    Ok(FuzzyMatchTranslationsFinder::for_translation(query, translation, settings))
}

fn translations_from_payload(payload: &Value) -> Result<Vec<Translation>, String> {
    if payload.get("translations").is_some() {
        return field(payload, "translations");
    }
    Ok(vec![field(payload, "translation")?])
}

pub fn handle(state: &mut CoreState, input: &str) -> String {
    let req: Value = match serde_json::from_str(input) {
        Ok(v) => v,
        Err(_) => {
            return json!({
                "status": "error",
                "message": "invalid json"
            })
            .to_string();
        }
    };

    let id = get_id(&req);
    let cmd_str = get_cmd(&req);
    let payload = get_payload(&req);

    debug!(cmd = cmd_str, "request");

    let command = Command::from(cmd_str);
    match command {
        Command::Ping => ok(id, json!({ "message": "shuttle-core alive" })),

        Command::KeyPut => {
            let key: Key = match field(payload, "key") {
                Ok(k) => k,
                Err(e) => return err(id, e),
            };
            match state.catalog.put_key(key) {
                Ok(reindexed) => ok(id, json!({ "reindexed": reindexed })),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::KeyDelete => {
            let key_id: u64 = match field(payload, "id") {
                Ok(v) => v,
                Err(e) => return err(id, e),
            };
            match state.catalog.delete_key(key_id) {
                Ok(removed) => ok(id, json!({ "removed_translations": removed })),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::TranslationPut => {
            let translations = match translations_from_payload(payload) {
                Ok(v) => v,
                Err(e) => return err(id, e),
            };
            if let Some(orphan) = translations.iter().find(|t| state.catalog.key(t.key_id).is_none()) {
                return err(id, format!("translation {}: unknown key {}", orphan.id, orphan.key_id));
            }
            match state.catalog.put_translations(translations) {
                Ok(indexed) => ok(id, json!({ "indexed": indexed })),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::TranslationDelete => {
            let tid: u64 = match field(payload, "id") {
                Ok(v) => v,
                Err(e) => return err(id, e),
            };
            match state.catalog.delete_translation(tid) {
                Ok(()) => ok(id, json!({ "deleted": tid })),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::Search => {
            let form = SearchForm::from_payload(payload);
            let finder = SearchTranslationsFinder::new(form, state.config.search_settings());
            match finder.find_translations(state.catalog.index()) {
                Ok(page) => ok(id, serde_json::to_value(page).unwrap_or(json!({}))),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::FuzzyTop => {
            let finder = match fuzzy_finder(state, payload) {
                Ok(f) => f,
                Err(e) => return err(id, e),
            };
            match finder.top_fuzzy_match_percentage(state.catalog.index()) {
                Ok(pct) => ok(id, json!({ "match_percentage": pct })),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::FuzzyMatches => {
            let finder = match fuzzy_finder(state, payload) {
                Ok(f) => f,
                Err(e) => return err(id, e),
            };
            match finder.find_fuzzy_matches(state.catalog.index()) {
                Ok(matches) => ok(id, json!({ "matches": matches })),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::IndexStats => match state.catalog.index().count() {
            Ok(indexed) => ok(
                id,
                json!({
                    "backend": state.catalog.index().backend_name(),
                    "indexed": indexed,
                    "keys": state.catalog.key_count(),
                    "translations": state.catalog.translation_count(),
                }),
            ),
            Err(e) => err(id, e.to_string()),
        },

        Command::IndexRebuild => match state.catalog.rebuild_index() {
            Ok(indexed) => ok(id, json!({ "indexed": indexed })),
            Err(e) => err(id, e.to_string()),
        },

        Command::StoreSave => {
            let path = path_or_default(payload, state);
            match store::save(&path, &state.catalog.snapshot()) {
                Ok(()) => ok(id, json!({ "path": path.to_string_lossy() })),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::StoreLoad | Command::StoreImport => {
            let snapshot = if command == Command::StoreImport {
                let path: String = match field(payload, "path") {
                    Ok(p) => p,
                    Err(e) => return err(id, e),
                };
                store::import(&PathBuf::from(path))
            } else {
                store::load(&path_or_default(payload, state))
            };

            let snapshot = match snapshot {
                Ok(s) => s,
                Err(e) => return err(id, e.to_string()),
            };
            match state.catalog.restore(snapshot) {
                Ok(indexed) => ok(
                    id,
                    json!({ "keys": state.catalog.key_count(), "indexed": indexed }),
                ),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::DetectEncoding => {
            let path_str = payload.get("path").and_then(|v| v.as_str()).unwrap_or("");
            if path_str.is_empty() {
                return err(id, "payload.path is required");
            }
            match encoding::detect_from_file(&PathBuf::from(path_str)) {
                Ok(result) => ok(id, serde_json::to_value(result).unwrap_or(json!({}))),
                Err(e) => err(id, e.to_string()),
            }
        }

        Command::Unknown => err(id, "unknown command"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::index::MemoryIndex;

    fn state() -> CoreState {
        CoreState::new(Config::default(), Box::new(MemoryIndex::new()))
    }

    fn call(state: &mut CoreState, req: Value) -> Value {
        serde_json::from_str(&handle(state, &req.to_string())).unwrap()
    }

    #[test]
    fn ping_and_unknown() {
        let mut s = state();
        let resp = call(&mut s, json!({ "id": 1, "cmd": "ping" }));
        assert_eq!(resp["status"], "ok");
        assert_eq!(resp["id"], 1);

        let resp = call(&mut s, json!({ "id": 2, "cmd": "nope" }));
        assert_eq!(resp["status"], "error");
        assert_eq!(resp["message"], "unknown command");

        let raw: Value = serde_json::from_str(&handle(&mut s, "{oops")).unwrap();
        assert_eq!(raw["message"], "invalid json");
    }

    #[test]
    fn missing_fields_are_reported() {
        let mut s = state();
        let resp = call(&mut s, json!({ "id": 1, "cmd": "key.put", "payload": {} }));
        assert_eq!(resp["message"], "payload.key is required");

        let resp = call(
            &mut s,
            json!({ "id": 2, "cmd": "fuzzy.top", "payload": { "query": "Save" } }),
        );
        assert_eq!(resp["message"], "payload.locale or payload.translation_id is required");
    }

    #[test]
    fn translation_with_unknown_key_is_rejected() {
        let mut s = state();
        let resp = call(
            &mut s,
            json!({ "id": 1, "cmd": "translation.put", "payload": { "translation": {
                "id": 1, "key_id": 5, "source_copy": "Save",
                "source_rfc5646_locale": "en", "rfc5646_locale": "fr"
            } } }),
        );
        assert_eq!(resp["status"], "error");
        assert_eq!(resp["message"], "translation 1: unknown key 5");
    }

    #[test]
    fn fuzzy_by_translation_id_uses_its_locale() {
        let mut s = state();
        call(
            &mut s,
            json!({ "cmd": "key.put", "payload": { "key": { "id": 1, "project_id": 1 } } }),
        );
        call(
            &mut s,
            json!({ "cmd": "translation.put", "payload": { "translations": [
                { "id": 1, "key_id": 1, "source_copy": "Save file", "copy": "Enregistrer",
                  "source_rfc5646_locale": "en", "rfc5646_locale": "fr", "approved": true },
                { "id": 2, "key_id": 1, "source_copy": "Save file",
                  "source_rfc5646_locale": "en", "rfc5646_locale": "fr" }
            ] } }),
        );

        let resp = call(
            &mut s,
            json!({ "cmd": "fuzzy.top", "payload": { "query": "Save file", "translation_id": 2 } }),
        );
        assert_eq!(resp["status"], "ok");
        assert_eq!(resp["payload"]["match_percentage"], 100.0);
    }

    fn seed_key(s: &mut CoreState) {
        call(
            s,
            json!({ "cmd": "key.put", "payload": { "key": { "id": 1, "project_id": 1 } } }),
        );
        call(
            s,
            json!({ "cmd": "translation.put", "payload": { "translation": {
                "id": 1, "key_id": 1, "source_copy": "Save", "copy": "Enregistrer",
                "source_rfc5646_locale": "en", "rfc5646_locale": "fr"
            } } }),
        );
    }

    #[test]
    fn search_without_payload_lists_everything() {
        let mut s = state();
        seed_key(&mut s);

        let raw: Value = serde_json::from_str(&handle(&mut s, r#"{"id":1,"cmd":"search"}"#)).unwrap();
        assert_eq!(raw["status"], "ok");
        assert_eq!(raw["payload"]["total_count"], 1);

        let resp = call(
            &mut s,
            json!({ "cmd": "search", "payload": { "project_id": "1", "hidden_keys": 1, "start_date": 20240101 } }),
        );
        assert_eq!(resp["status"], "ok");
        assert_eq!(resp["payload"]["total_count"], 1);
    }

    #[test]
    fn rejected_batch_leaves_nothing_behind() {
        let mut s = state();
        seed_key(&mut s);

        let resp = call(
            &mut s,
            json!({ "cmd": "translation.put", "payload": { "translations": [
                { "id": 20, "key_id": 1, "source_copy": "Open",
                  "source_rfc5646_locale": "en", "rfc5646_locale": "fr" },
                { "id": 21, "key_id": 99, "source_copy": "Quit",
                  "source_rfc5646_locale": "en", "rfc5646_locale": "fr" }
            ] } }),
        );
        assert_eq!(resp["message"], "translation 21: unknown key 99");

        let stats = call(&mut s, json!({ "cmd": "index.stats" }));
        assert_eq!(stats["payload"]["translations"], 1);
        assert_eq!(stats["payload"]["indexed"], 1);
    }
}
