use chrono::{DateTime, Duration, Utc};

use crate::model::{Key, Locale, Translation, TranslationDocument};

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn locale(tag: &str) -> Locale {
    Locale::parse(tag).unwrap()
}

pub fn key(id: u64, project_id: u64, hidden: bool) -> Key {
    Key {
        id,
        project_id,
        key: format!("key.{id}"),
        source_copy: String::new(),
        source_rfc5646_locale: Some(locale("en-US")),
        hidden_in_search: hidden,
        created_at: ts("2024-01-01T00:00:00Z"),
        updated_at: ts("2024-01-01T00:00:00Z"),
    }
}

/// Approved translation from en-US; timestamps grow with the id.
pub fn translation(id: u64, key_id: u64, source: &str, copy: &str, target: &str) -> Translation {
    let at = ts("2024-01-01T00:00:00Z") + Duration::minutes(id as i64);
    Translation {
        id,
        key_id,
        source_copy: source.to_string(),
        copy: (!copy.is_empty()).then(|| copy.to_string()),
        source_rfc5646_locale: locale("en-US"),
        rfc5646_locale: locale(target),
        translated: !copy.is_empty(),
        approved: true,
        translator_id: None,
        reviewer_id: None,
        created_at: at,
        updated_at: at,
    }
}

/// Indexed document for a translation owned by a visible key of project 1.
pub fn document(id: u64, source: &str, copy: &str, target: &str) -> TranslationDocument {
    TranslationDocument::build(&translation(id, id, source, copy, target), &key(id, 1, false))
}
