use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Locale;

/// A localizable string within a project.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Key {
    pub id: u64,

    pub project_id: u64,

    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub source_copy: String,

    #[serde(default)]
    pub source_rfc5646_locale: Option<Locale>,

    /// Hidden keys are left out of normal search results.
    #[serde(default)]
    pub hidden_in_search: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}
