//! Query model understood by every [`SearchIndex`](super::SearchIndex) backend.
//!
//! The shape follows a boolean full-text query language: leaf clauses (`Match`,
//! `Term`, `Terms`, `Range`) composed with `Bool`. Backends decide how the
//! clauses are evaluated or serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Locale, TranslationDocument};

/// Full-text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Copy,
    SourceCopy,
}

impl TextField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextField::Copy => "copy",
            TextField::SourceCopy => "source_copy",
        }
    }

    pub fn text<'a>(&self, doc: &'a TranslationDocument) -> &'a str {
        match self {
            TextField::Copy => doc.copy.as_deref().unwrap_or(""),
            TextField::SourceCopy => &doc.source_copy,
        }
    }
}

/// Exact-value fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    KeyId,
    ProjectId,
    TranslatorId,
    ReviewerId,
    Locale,
    SourceLocale,
    Translated,
    Approved,
    HiddenInSearch,
    SourceHash,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::KeyId => "key_id",
            Field::ProjectId => "project_id",
            Field::TranslatorId => "translator_id",
            Field::ReviewerId => "reviewer_id",
            Field::Locale => "rfc5646_locale",
            Field::SourceLocale => "source_rfc5646_locale",
            Field::Translated => "translated",
            Field::Approved => "approved",
            Field::HiddenInSearch => "hidden_in_search",
            Field::SourceHash => "source_hash",
        }
    }

    /// Value of this field on a document; `None` when the document leaves it unset.
    pub fn value(&self, doc: &TranslationDocument) -> Option<FieldValue> {
        match self {
            Field::Id => Some(FieldValue::Int(doc.id)),
            Field::KeyId => Some(FieldValue::Int(doc.key_id)),
            Field::ProjectId => Some(FieldValue::Int(doc.project_id)),
            Field::TranslatorId => doc.translator_id.map(FieldValue::Int),
            Field::ReviewerId => doc.reviewer_id.map(FieldValue::Int),
            Field::Locale => Some(FieldValue::from(&doc.rfc5646_locale)),
            Field::SourceLocale => Some(FieldValue::from(&doc.source_rfc5646_locale)),
            Field::Translated => Some(FieldValue::Bool(doc.translated)),
            Field::Approved => Some(FieldValue::Bool(doc.approved)),
            Field::HiddenInSearch => Some(FieldValue::Bool(doc.hidden_in_search)),
            Field::SourceHash => Some(FieldValue::Str(doc.source_hash.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(u64),
    Str(String),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<&Locale> for FieldValue {
    fn from(v: &Locale) -> Self {
        FieldValue::Str(v.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    CreatedAt,
    UpdatedAt,
}

impl DateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateField::CreatedAt => "created_at",
            DateField::UpdatedAt => "updated_at",
        }
    }

    pub fn value(&self, doc: &TranslationDocument) -> DateTime<Utc> {
        match self {
            DateField::CreatedAt => doc.created_at,
            DateField::UpdatedAt => doc.updated_at,
        }
    }
}

/// How the tokens of a `Match` clause combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    Match {
        field: TextField,
        text: String,
        operator: Operator,
    },
    Term {
        field: Field,
        value: FieldValue,
    },
    Terms {
        field: Field,
        values: Vec<FieldValue>,
    },
    Range {
        field: DateField,
        gte: Option<DateTime<Utc>>,
        lte: Option<DateTime<Utc>>,
    },
    Bool(BoolQuery),
    Boosted {
        query: Box<Query>,
        boost: f32,
    },
}

impl Query {
    pub fn text(field: TextField, text: impl Into<String>, operator: Operator) -> Self {
        Query::Match {
            field,
            text: text.into(),
            operator,
        }
    }

    pub fn term(field: Field, value: impl Into<FieldValue>) -> Self {
        Query::Term {
            field,
            value: value.into(),
        }
    }

    pub fn terms<V: Into<FieldValue>>(field: Field, values: impl IntoIterator<Item = V>) -> Self {
        Query::Terms {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn range(field: DateField, gte: Option<DateTime<Utc>>, lte: Option<DateTime<Utc>>) -> Self {
        Query::Range { field, gte, lte }
    }

    pub fn boosted(self, boost: f32) -> Self {
        Query::Boosted {
            query: Box::new(self),
            boost,
        }
    }
}

/// Boolean composition. `must` and `should` clauses contribute to the score,
/// `filter` and `must_not` only restrict. With no `must`/`filter` clause, at
/// least one `should` clause has to match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub filter: Vec<Query>,
    pub must_not: Vec<Query>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, q: Query) -> Self {
        self.must.push(q);
        self
    }

    pub fn should(mut self, q: Query) -> Self {
        self.should.push(q);
        self
    }

    pub fn filter(mut self, q: Query) -> Self {
        self.filter.push(q);
        self
    }

    pub fn must_not(mut self, q: Query) -> Self {
        self.must_not.push(q);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.should.is_empty()
            && self.filter.is_empty()
            && self.must_not.is_empty()
    }

    pub fn build(self) -> Query {
        Query::Bool(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Score,
    CreatedAt,
    UpdatedAt,
    Id,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Score => "_score",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Id => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortClause {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortClause {
    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
        }
    }

    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Query,
    pub sort: Vec<SortClause>,
    pub from: usize,
    pub size: usize,
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            sort: Vec::new(),
            from: 0,
            size: 10,
        }
    }

    pub fn sort_by(mut self, clause: SortClause) -> Self {
        self.sort.push(clause);
        self
    }

    pub fn page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: u64,
    pub score: f32,
    pub document: TranslationDocument,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Number of matching documents before pagination.
    pub total: u64,
    pub hits: Vec<Hit>,
}
