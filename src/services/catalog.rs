//! Record side of the search layer: keys and their translations, kept in
//! step with the search index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::model::{Key, Translation, TranslationDocument};
use crate::services::index::SearchIndex;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub keys: Vec<Key>,

    #[serde(default)]
    pub translations: Vec<Translation>,
}

pub struct Catalog {
    keys: BTreeMap<u64, Key>,
    translations: BTreeMap<u64, Translation>,
    index: Box<dyn SearchIndex>,
}

impl Catalog {
    pub fn new(index: Box<dyn SearchIndex>) -> Self {
        Self {
            keys: BTreeMap::new(),
            translations: BTreeMap::new(),
            index,
        }
    }

    pub fn index(&self) -> &dyn SearchIndex {
        self.index.as_ref()
    }

    pub fn key(&self, id: u64) -> Option<&Key> {
        self.keys.get(&id)
    }

    pub fn translation(&self, id: u64) -> Option<&Translation> {
        self.translations.get(&id)
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn translation_count(&self) -> usize {
        self.translations.len()
    }

    fn documents_for_key(&self, key: &Key) -> Vec<TranslationDocument> {
        self.translations
            .values()
            .filter(|t| t.key_id == key.id)
            .map(|t| TranslationDocument::build(t, key))
            .collect()
    }

    /// Inserts or updates a key. When its project or visibility changes, the
    /// key's translations are re-indexed; returns how many were. Records only
    /// change once the index accepted the new documents.
    pub fn put_key(&mut self, key: Key) -> Result<usize> {
        let previous = self.keys.get(&key.id).cloned();
        let changed = previous.as_ref().is_some_and(|old| {
            old.hidden_in_search != key.hidden_in_search || old.project_id != key.project_id
        });

        let mut reindexed = 0;
        if changed {
            let docs = self.documents_for_key(&key);
            match self.index.put_batch(docs) {
                Ok(n) => reindexed = n,
                Err(e) => {
                    if let Some(old) = &previous {
                        let docs = self.documents_for_key(old);
                        self.put_back(docs);
                    }
                    return Err(e);
                }
            }
        }

        self.keys.insert(key.id, key);
        Ok(reindexed)
    }

    /// Removes a key together with its translations; returns how many
    /// translations went with it.
    pub fn delete_key(&mut self, id: u64) -> Result<usize> {
        let key = self.keys.get(&id).ok_or(CoreError::UnknownKey(id))?;
        let docs = self.documents_for_key(key);

        for (n, doc) in docs.iter().enumerate() {
            if let Err(e) = self.index.delete(doc.id) {
                self.put_back(docs[..n].to_vec());
                return Err(e);
            }
        }

        self.keys.remove(&id);
        for doc in &docs {
            self.translations.remove(&doc.id);
        }
        Ok(docs.len())
    }

    pub fn put_translation(&mut self, translation: Translation) -> Result<()> {
        self.put_translations(vec![translation]).map(|_| ())
    }

    /// Stores a batch of translations, all or nothing: every key must exist,
    /// and a failed index write undoes the part of the batch already indexed.
    pub fn put_translations(&mut self, translations: Vec<Translation>) -> Result<usize> {
        let mut docs = Vec::with_capacity(translations.len());
        for t in &translations {
            let key = self.keys.get(&t.key_id).ok_or(CoreError::UnknownKey(t.key_id))?;
            docs.push(TranslationDocument::build(t, key));
        }

        if let Err(e) = self.index.put_batch(docs) {
            self.undo_puts(&translations);
            return Err(e);
        }

        let count = translations.len();
        for t in translations {
            self.translations.insert(t.id, t);
        }
        Ok(count)
    }

    pub fn delete_translation(&mut self, id: u64) -> Result<()> {
        if !self.translations.contains_key(&id) {
            return Err(CoreError::UnknownTranslation(id));
        }
        self.index.delete(id)?;
        self.translations.remove(&id);
        Ok(())
    }

    /// Re-puts documents after a failed write. A failure here leaves the
    /// index behind the records until the next rebuild.
    fn put_back(&mut self, docs: Vec<TranslationDocument>) {
        if let Err(e) = self.index.put_batch(docs) {
            warn!(error = %e, "index out of step with records, rebuild required");
        }
    }

    /// Returns each translation of a failed batch to its stored state.
    fn undo_puts(&mut self, batch: &[Translation]) {
        for t in batch {
            let stored = self
                .translations
                .get(&t.id)
                .and_then(|old| self.keys.get(&old.key_id).map(|k| TranslationDocument::build(old, k)));

            let undone = match stored {
                Some(doc) => self.index.put(doc),
                None => self.index.delete(t.id).map(|_| ()),
            };
            if let Err(e) = undone {
                warn!(translation = t.id, error = %e, "index out of step with records, rebuild required");
            }
        }
    }

    /// Drops the index contents and indexes every translation again.
    pub fn rebuild_index(&mut self) -> Result<usize> {
        self.index.clear()?;

        let docs: Vec<TranslationDocument> = self
            .translations
            .values()
            .filter_map(|t| self.keys.get(&t.key_id).map(|k| TranslationDocument::build(t, k)))
            .collect();

        let indexed = self.index.put_batch(docs)?;
        info!(indexed, backend = self.index.backend_name(), "index rebuilt");
        Ok(indexed)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            keys: self.keys.values().cloned().collect(),
            translations: self.translations.values().cloned().collect(),
        }
    }

    /// Replaces all records with the snapshot and re-indexes. Translations
    /// whose key is missing from the snapshot are skipped.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<usize> {
        self.keys = snapshot.keys.into_iter().map(|k| (k.id, k)).collect();
        self.translations.clear();

        for t in snapshot.translations {
            if !self.keys.contains_key(&t.key_id) {
                warn!(translation = t.id, key = t.key_id, "skipping translation with unknown key");
                continue;
            }
            self.translations.insert(t.id, t);
        }

        self.rebuild_index()
    }
}
