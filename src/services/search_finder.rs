use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::model::locale::{parse_locale_list, Locale};
use crate::model::TranslationDocument;
use crate::services::index::{
    BoolQuery, DateField, Field, Operator, Query, SearchIndex, SearchRequest, SortClause,
    SortField, TextField,
};

#[derive(Debug, Clone)]
pub enum LocaleInput {
    Joined(String),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum FlagInput {
    Bool(bool),
    Text(String),
}

/// Filters as they arrive from a caller. Anything missing, mistyped or
/// unparsable leaves the result set unrestricted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchForm {
    #[serde(default, deserialize_with = "lenient_text")]
    pub query: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub field: Option<String>,

    #[serde(default, deserialize_with = "lenient_locales")]
    pub target_locales: Option<LocaleInput>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub project_id: Option<u64>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub translator_id: Option<u64>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub start_date: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub end_date: Option<String>,

    #[serde(default, deserialize_with = "lenient_flag")]
    pub hidden_keys: Option<FlagInput>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub page: Option<usize>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub per_page: Option<usize>,
}

impl SearchForm {
    /// Reads a request payload. A missing or non-object payload is an empty form.
    pub fn from_payload(payload: &Value) -> Self {
        if !payload.is_object() {
            if !payload.is_null() {
                debug!(payload = %payload, "ignoring non-object search payload");
            }
            return Self::default();
        }
        // Field deserializers never reject a value.
        Self::deserialize(payload).unwrap_or_default()
    }
}

fn ignored(value: &Value) {
    debug!(value = %value, "ignoring invalid search filter");
}

/// Numbers, or strings holding a number (`"12"`).
fn lenient_number<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + TryFrom<u64>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_u64().and_then(|n| T::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    if parsed.is_none() {
        ignored(&value);
    }
    Ok(parsed)
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => {
            ignored(&other);
            None
        }
    })
}

fn lenient_locales<'de, D>(deserializer: D) -> std::result::Result<Option<LocaleInput>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(LocaleInput::Joined(s)),
        Value::Array(items) => Some(LocaleInput::List(
            items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    other => {
                        ignored(&other);
                        None
                    }
                })
                .collect(),
        )),
        other => {
            ignored(&other);
            None
        }
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<Option<FlagInput>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::Bool(b) => Some(FlagInput::Bool(b)),
        Value::String(s) => Some(FlagInput::Text(s)),
        other => {
            ignored(&other);
            None
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenKeys {
    Exclude,
    Only,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub per_page: usize,
    pub max_per_page: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            per_page: 50,
            max_per_page: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub translations: Vec<TranslationDocument>,
    pub total_count: u64,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: u64,
}

pub struct SearchTranslationsFinder {
    form: SearchForm,
    settings: SearchSettings,
}

impl SearchTranslationsFinder {
    pub fn new(form: SearchForm, settings: SearchSettings) -> Self {
        Self { form, settings }
    }

    pub fn page(&self) -> usize {
        self.form.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> usize {
        self.form
            .per_page
            .unwrap_or(self.settings.per_page)
            .clamp(1, self.settings.max_per_page.max(1))
    }

    pub fn target_locales(&self) -> Vec<Locale> {
        match &self.form.target_locales {
            None => Vec::new(),
            Some(LocaleInput::Joined(s)) => parse_locale_list(s),
            Some(LocaleInput::List(items)) => parse_locale_list(&items.join(",")),
        }
    }

    pub fn hidden_keys(&self) -> HiddenKeys {
        match &self.form.hidden_keys {
            Some(FlagInput::Bool(true)) => HiddenKeys::Only,
            Some(FlagInput::Text(s)) if s.trim() == "true" => HiddenKeys::Only,
            _ => HiddenKeys::Exclude,
        }
    }

    fn text_field(&self) -> TextField {
        match self.form.field.as_deref().map(str::trim) {
            None | Some("") | Some("copy") | Some("searchable_copy") => TextField::Copy,
            Some("source_copy") | Some("searchable_source_copy") => TextField::SourceCopy,
            Some(other) => {
                debug!(field = other, "unknown search field, using copy");
                TextField::Copy
            }
        }
    }

    pub fn search_request(&self) -> SearchRequest {
        let mut q = BoolQuery::new();

        if let Some(text) = self.form.query.as_deref().map(str::trim) {
            if !text.is_empty() {
                q = q.must(Query::text(self.text_field(), text, Operator::And));
            }
        }

        let locales = self.target_locales();
        if !locales.is_empty() {
            q = q.filter(Query::terms(Field::Locale, locales.iter()));
        }

        if let Some(project_id) = self.form.project_id {
            q = q.filter(Query::term(Field::ProjectId, project_id));
        }

        if let Some(translator_id) = self.form.translator_id {
            q = q.filter(Query::term(Field::TranslatorId, translator_id));
        }

        let start = self.form.start_date.as_deref().and_then(|s| parse_date_bound(s, false));
        let end = self.form.end_date.as_deref().and_then(|s| parse_date_bound(s, true));
        if start.is_some() || end.is_some() {
            q = q.filter(Query::range(DateField::CreatedAt, start, end));
        }

        q = q.filter(Query::term(
            Field::HiddenInSearch,
            self.hidden_keys() == HiddenKeys::Only,
        ));

        let per_page = self.per_page();
        SearchRequest::new(q.build())
            .sort_by(SortClause::desc(SortField::CreatedAt))
            .sort_by(SortClause::desc(SortField::Id))
            .page(self.page().saturating_sub(1).saturating_mul(per_page), per_page)
    }

    pub fn find_translations(&self, index: &dyn SearchIndex) -> Result<SearchPage> {
        let request = self.search_request();
        let response = index.search(&request)?;

        let per_page = self.per_page();
        let total_pages = response.total.div_ceil(per_page as u64);

        Ok(SearchPage {
            translations: response.hits.into_iter().map(|h| h.document).collect(),
            total_count: response.total,
            page: self.page(),
            per_page,
            total_pages,
        })
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain end date
/// covers the whole day.
fn parse_date_bound(s: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date) => {
            let time = if end_of_day {
                date.and_hms_nano_opt(23, 59, 59, 999_999_999)
            } else {
                date.and_hms_opt(0, 0, 0)
            };
            time.map(|t| t.and_utc())
        }
        Err(_) => {
            debug!(date = s, "ignoring unparsable date filter");
            None
        }
    }
}
