use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::locale::Locale;

/// The rendering of a key's source copy into one target locale.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Translation {
    pub id: u64,

    pub key_id: u64,

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

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}
