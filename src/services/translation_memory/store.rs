//! JSON snapshot persistence for the catalog.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::error::Result;
use crate::model::{Key, Translation};
use crate::services::catalog::Snapshot;
use crate::services::encoding;

/// Reads a snapshot; a missing file is an empty snapshot.
pub fn load(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        info!(path = %path.display(), "no snapshot yet, starting empty");
        return Ok(Snapshot::default());
    }

    let data = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&data)?;

    let (snapshot, removed) = dedup(snapshot);
    if removed > 0 {
        warn!(path = %path.display(), removed, "snapshot contained duplicate records");
    }

    Ok(snapshot)
}

/// Reads a snapshot exported elsewhere, whatever its text encoding.
pub fn import(path: &Path) -> Result<Snapshot> {
    let text = encoding::decode_file(path)?;
    let snapshot: Snapshot = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
    let (snapshot, removed) = dedup(snapshot);
    info!(
        path = %path.display(),
        keys = snapshot.keys.len(),
        translations = snapshot.translations.len(),
        removed,
        "imported snapshot"
    );
    Ok(snapshot)
}

pub fn save(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let (snapshot, _removed) = dedup(snapshot.clone());
    let json = serde_json::to_string_pretty(&snapshot)?;
    write_atomic(path, json.as_bytes())?;
    Ok(())
}

fn dedup(snapshot: Snapshot) -> (Snapshot, usize) {
    let mut removed = 0usize;

    let mut keys: HashMap<u64, Key> = HashMap::new();
    for k in snapshot.keys {
        match keys.get_mut(&k.id) {
            None => {
                keys.insert(k.id, k);
            }
            Some(existing) => {
                if k.updated_at >= existing.updated_at {
                    *existing = k;
                }
                removed += 1;
            }
        }
    }

    let mut translations: HashMap<u64, Translation> = HashMap::new();
    for t in snapshot.translations {
        match translations.get_mut(&t.id) {
            None => {
                translations.insert(t.id, t);
            }
            Some(existing) => {
                if pick_better(existing, &t) {
                    *existing = t;
                }
                removed += 1;
            }
        }
    }

    let mut keys: Vec<Key> = keys.into_values().collect();
    keys.sort_by_key(|k| k.id);
    let mut translations: Vec<Translation> = translations.into_values().collect();
    translations.sort_by_key(|t| t.id);

    (Snapshot { keys, translations }, removed)
}

/// Later updates win; on equal timestamps the later record in the file wins.
fn pick_better(current: &Translation, candidate: &Translation) -> bool {
    candidate.updated_at >= current.updated_at
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);

    if let Some(parent) = tmp.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "snapshot".to_string(),
    };
    p.set_file_name(format!("{file_name}.tmp"));
    p
}
