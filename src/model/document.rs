use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Key, Locale, Translation};
use crate::services::translation_memory::source_hash;

/// Flattened translation as stored in the search index. Carries the owning
/// key's project and visibility so filters never need a join.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationDocument {
    pub id: u64,
    pub key_id: u64,
    pub project_id: u64,

    #[serde(default)]
    pub source_copy: String,

    #[serde(default)]
    pub copy: Option<String>,

    pub source_rfc5646_locale: Locale,
    pub rfc5646_locale: Locale,

    #[serde(default)]
    pub translated: bool,

    #[serde(default)]
    pub approved: bool,

    #[serde(default)]
    pub translator_id: Option<u64>,

    #[serde(default)]
    pub reviewer_id: Option<u64>,

    #[serde(default)]
    pub hidden_in_search: bool,

    #[serde(default)]
    pub source_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranslationDocument {
    pub fn build(translation: &Translation, key: &Key) -> Self {
        Self {
            id: translation.id,
            key_id: translation.key_id,
            project_id: key.project_id,
            source_copy: translation.source_copy.clone(),
            copy: translation.copy.clone(),
            source_rfc5646_locale: translation.source_rfc5646_locale.clone(),
            rfc5646_locale: translation.rfc5646_locale.clone(),
            translated: translation.translated,
            approved: translation.approved,
            translator_id: translation.translator_id,
            reviewer_id: translation.reviewer_id,
            hidden_in_search: key.hidden_in_search,
            source_hash: source_hash(&translation.source_copy),
            created_at: translation.created_at,
            updated_at: translation.updated_at,
        }
    }
}
