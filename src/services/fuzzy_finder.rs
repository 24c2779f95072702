use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::model::{Locale, Translation, TranslationDocument};
use crate::services::index::{
    BoolQuery, Field, Operator, Query, SearchIndex, SearchRequest, SortClause, SortField,
    TextField,
};
use crate::services::similarity::similarity_percentage;
use crate::services::translation_memory::source_hash;

const EXACT_SOURCE_BOOST: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzySettings {
    /// Minimum percentage a candidate needs to be reported.
    pub threshold: f64,
    /// How many candidates the index is asked for.
    pub candidate_limit: usize,
    /// Also consider translations into the locale's less specific parents.
    pub locale_fallbacks: bool,
}

impl Default for FuzzySettings {
    fn default() -> Self {
        Self {
            threshold: 60.0,
            candidate_limit: 10,
            locale_fallbacks: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FuzzyMatch {
    pub translation: TranslationDocument,
    pub match_percentage: f64,
}

/// Finds previously approved translations whose source copy resembles a new
/// source string in the same target locale.
pub struct FuzzyMatchTranslationsFinder {
    query: String,
    locale: Locale,
    settings: FuzzySettings,
}

impl FuzzyMatchTranslationsFinder {
    pub fn new(query: impl Into<String>, locale: Locale, settings: FuzzySettings) -> Self {
        Self {
            query: query.into(),
            locale,
            settings,
        }
    }

    pub fn for_translation(
        query: impl Into<String>,
        translation: &Translation,
        settings: FuzzySettings,
    ) -> Self {
        Self::new(query, translation.rfc5646_locale.clone(), settings)
    }

    /// `None` when there is nothing to match against.
    pub fn search_request(&self) -> Option<SearchRequest> {
        let text = self.query.trim();
        if text.is_empty() {
            return None;
        }

        let locales = if self.settings.locale_fallbacks {
            self.locale.fallbacks()
        } else {
            vec![self.locale.clone()]
        };

        let similar_source = BoolQuery::new()
            .should(Query::text(TextField::SourceCopy, text, Operator::Or))
            .should(Query::term(Field::SourceHash, source_hash(text)).boosted(EXACT_SOURCE_BOOST))
            .build();

        let query = BoolQuery::new()
            .must(similar_source)
            .filter(Query::term(Field::Approved, true))
            .filter(Query::terms(Field::Locale, locales.iter()))
            .build();

        Some(
            SearchRequest::new(query)
                .sort_by(SortClause::desc(SortField::Score))
                .sort_by(SortClause::desc(SortField::UpdatedAt))
                .page(0, self.settings.candidate_limit.max(1)),
        )
    }

    /// Candidates at or above the threshold, best first. Equal percentages go
    /// to the most recently updated translation, then the higher id.
    pub fn find_fuzzy_matches(&self, index: &dyn SearchIndex) -> Result<Vec<FuzzyMatch>> {
        let Some(request) = self.search_request() else {
            return Ok(Vec::new());
        };

        let response = index.search(&request)?;
        let text = self.query.trim();

        let mut matches: Vec<FuzzyMatch> = response
            .hits
            .into_iter()
            .map(|hit| FuzzyMatch {
                match_percentage: similarity_percentage(hit.document.source_copy.trim(), text),
                translation: hit.document,
            })
            .filter(|m| m.match_percentage >= self.settings.threshold)
            .collect();

        matches.sort_by(|a, b| {
            b.match_percentage
                .partial_cmp(&a.match_percentage)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.translation.updated_at.cmp(&a.translation.updated_at))
                .then_with(|| b.translation.id.cmp(&a.translation.id))
        });

        debug!(
            locale = %self.locale,
            candidates = response.total,
            matches = matches.len(),
            "fuzzy match"
        );

        Ok(matches)
    }

    /// Best percentage found, or 0.0 when nothing reaches the threshold.
    pub fn top_fuzzy_match_percentage(&self, index: &dyn SearchIndex) -> Result<f64> {
        Ok(self
            .find_fuzzy_matches(index)?
            .first()
            .map(|m| m.match_percentage)
            .unwrap_or(0.0))
    }
}
