//! Embedded search index.
//!
//! Documents live in a `BTreeMap`; each text field gets an inverted index
//! (token -> document ids) used both to narrow candidates and to compute
//! BM25 relevance.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use super::query::{
    BoolQuery, Hit, Operator, Query, SearchRequest, SearchResponse, SortClause, SortField,
    SortOrder, TextField,
};
use super::tokenizer::{tokenize, unique_tokens};
use super::SearchIndex;
use crate::error::Result;
use crate::model::TranslationDocument;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

const TEXT_FIELDS: [TextField; 2] = [TextField::Copy, TextField::SourceCopy];

#[derive(Debug, Clone, Default)]
struct TermFreqs {
    freqs: HashMap<String, u32>,
    len: usize,
}

impl TermFreqs {
    fn from_text(text: &str) -> Self {
        let tokens = tokenize(text);
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for t in &tokens {
            *freqs.entry(t.clone()).or_default() += 1;
        }
        Self {
            freqs,
            len: tokens.len(),
        }
    }
}

#[derive(Debug, Clone)]
struct IndexedDoc {
    document: TranslationDocument,
    copy: TermFreqs,
    source_copy: TermFreqs,
}

impl IndexedDoc {
    fn terms(&self, field: TextField) -> &TermFreqs {
        match field {
            TextField::Copy => &self.copy,
            TextField::SourceCopy => &self.source_copy,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub token_count: usize,
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: BTreeMap<u64, IndexedDoc>,
    postings: HashMap<TextField, HashMap<String, BTreeSet<u64>>>,
    total_len: HashMap<TextField, usize>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            document_count: self.documents.len(),
            token_count: self.postings.values().map(|p| p.len()).sum(),
        }
    }

    fn unindex(&mut self, id: u64) -> bool {
        let Some(old) = self.documents.remove(&id) else {
            return false;
        };

        for field in TEXT_FIELDS {
            let terms = old.terms(field);
            if let Some(total) = self.total_len.get_mut(&field) {
                *total = total.saturating_sub(terms.len);
            }
            if let Some(field_postings) = self.postings.get_mut(&field) {
                for token in terms.freqs.keys() {
                    if let Some(ids) = field_postings.get_mut(token) {
                        ids.remove(&id);
                        if ids.is_empty() {
                            field_postings.remove(token);
                        }
                    }
                }
            }
        }

        true
    }

    fn postings_for(&self, field: TextField, token: &str) -> Option<&BTreeSet<u64>> {
        self.postings.get(&field).and_then(|p| p.get(token))
    }

    /// Documents that could satisfy the query, or `None` when every document
    /// has to be checked.
    fn candidates(&self, query: &Query) -> Option<BTreeSet<u64>> {
        match query {
            Query::Match {
                field,
                text,
                operator,
            } => {
                let tokens = unique_tokens(text);
                let mut sets = tokens
                    .iter()
                    .map(|t| self.postings_for(*field, t).cloned().unwrap_or_default());

                let first = sets.next().unwrap_or_default();
                Some(sets.fold(first, |acc, set| match operator {
                    Operator::Or => acc.union(&set).copied().collect(),
                    Operator::And => acc.intersection(&set).copied().collect(),
                }))
            }
            Query::Term {
                field: super::Field::Id,
                value: super::FieldValue::Int(id),
            } => Some(BTreeSet::from([*id])),
            Query::Boosted { query, .. } => self.candidates(query),
            Query::Bool(b) => self.bool_candidates(b),
            _ => None,
        }
    }

    fn bool_candidates(&self, b: &BoolQuery) -> Option<BTreeSet<u64>> {
        let mut narrowed: Option<BTreeSet<u64>> = None;

        for clause in b.must.iter().chain(b.filter.iter()) {
            if let Some(set) = self.candidates(clause) {
                narrowed = Some(match narrowed {
                    None => set,
                    Some(acc) => acc.intersection(&set).copied().collect(),
                });
            }
        }

        if narrowed.is_none() && b.must.is_empty() && b.filter.is_empty() && !b.should.is_empty()
        {
            let mut union = BTreeSet::new();
            for clause in &b.should {
                union.extend(self.candidates(clause)?);
            }
            return Some(union);
        }

        narrowed
    }

    fn bm25(&self, field: TextField, token: &str, doc: &IndexedDoc) -> f32 {
        let terms = doc.terms(field);
        let tf = match terms.freqs.get(token) {
            Some(&tf) => tf as f32,
            None => return 0.0,
        };

        let n = self.documents.len().max(1) as f32;
        let df = self.postings_for(field, token).map(|s| s.len()).unwrap_or(0) as f32;
        let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();

        let total = self.total_len.get(&field).copied().unwrap_or(0) as f32;
        let avgdl = (total / n).max(1.0);
        let dl = terms.len as f32;

        idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / avgdl))
    }

    /// Relevance of a document for the query, `None` when it does not match.
    fn score(&self, query: &Query, doc: &IndexedDoc) -> Option<f32> {
        match query {
            Query::MatchAll => Some(1.0),

            Query::Match {
                field,
                text,
                operator,
            } => {
                let tokens = unique_tokens(text);
                if tokens.is_empty() {
                    return None;
                }
                let terms = doc.terms(*field);
                let matched: Vec<&String> =
                    tokens.iter().filter(|t| terms.freqs.contains_key(*t)).collect();

                let ok = match operator {
                    Operator::And => matched.len() == tokens.len(),
                    Operator::Or => !matched.is_empty(),
                };
                if !ok {
                    return None;
                }
                Some(matched.iter().map(|t| self.bm25(*field, t, doc)).sum())
            }

            Query::Term { field, value } => {
                (field.value(&doc.document).as_ref() == Some(value)).then_some(1.0)
            }

            Query::Terms { field, values } => {
                let v = field.value(&doc.document)?;
                values.contains(&v).then_some(1.0)
            }

            Query::Range { field, gte, lte } => {
                let v = field.value(&doc.document);
                let above = gte.map_or(true, |g| v >= g);
                let below = lte.map_or(true, |l| v <= l);
                (above && below).then_some(1.0)
            }

            Query::Bool(b) => self.bool_score(b, doc),

            Query::Boosted { query, boost } => self.score(query, doc).map(|s| s * boost),
        }
    }

    fn bool_score(&self, b: &BoolQuery, doc: &IndexedDoc) -> Option<f32> {
        let mut score = 0.0;

        for clause in &b.must {
            score += self.score(clause, doc)?;
        }
        for clause in &b.filter {
            self.score(clause, doc)?;
        }
        if b.must_not.iter().any(|c| self.score(c, doc).is_some()) {
            return None;
        }

        let mut matched_should = 0usize;
        for clause in &b.should {
            if let Some(s) = self.score(clause, doc) {
                score += s;
                matched_should += 1;
            }
        }
        if b.must.is_empty() && b.filter.is_empty() && !b.should.is_empty() && matched_should == 0
        {
            return None;
        }

        Some(score)
    }
}

fn compare_hits(sort: &[SortClause], a: &(f32, &IndexedDoc), b: &(f32, &IndexedDoc)) -> Ordering {
    for clause in sort {
        let ord = match clause.field {
            SortField::Score => a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal),
            SortField::CreatedAt => a.1.document.created_at.cmp(&b.1.document.created_at),
            SortField::UpdatedAt => a.1.document.updated_at.cmp(&b.1.document.updated_at),
            SortField::Id => a.1.document.id.cmp(&b.1.document.id),
        };
        let ord = match clause.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    // Deterministic order for everything the caller left tied.
    b.1.document.id.cmp(&a.1.document.id)
}

impl SearchIndex for MemoryIndex {
    fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let mut scored: Vec<(f32, &IndexedDoc)> = match self.candidates(&request.query) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.documents.get(id))
                .filter_map(|doc| self.score(&request.query, doc).map(|s| (s, doc)))
                .collect(),
            None => self
                .documents
                .values()
                .filter_map(|doc| self.score(&request.query, doc).map(|s| (s, doc)))
                .collect(),
        };

        let sort: Vec<SortClause> = if request.sort.is_empty() {
            vec![SortClause::desc(SortField::Score)]
        } else {
            request.sort.clone()
        };
        scored.sort_by(|a, b| compare_hits(&sort, a, b));

        let total = scored.len() as u64;
        let hits: Vec<Hit> = scored
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .map(|(score, doc)| Hit {
                id: doc.document.id,
                score,
                document: doc.document.clone(),
            })
            .collect();

        debug!(total, returned = hits.len(), "memory index search");

        Ok(SearchResponse { total, hits })
    }

    fn put(&mut self, document: TranslationDocument) -> Result<()> {
        let id = document.id;
        self.unindex(id);

        let indexed = IndexedDoc {
            copy: TermFreqs::from_text(document.copy.as_deref().unwrap_or("")),
            source_copy: TermFreqs::from_text(&document.source_copy),
            document,
        };

        for field in TEXT_FIELDS {
            let terms = indexed.terms(field);
            *self.total_len.entry(field).or_default() += terms.len;
            let field_postings = self.postings.entry(field).or_default();
            for token in terms.freqs.keys() {
                field_postings.entry(token.clone()).or_default().insert(id);
            }
        }

        self.documents.insert(id, indexed);
        Ok(())
    }

    fn delete(&mut self, id: u64) -> Result<bool> {
        Ok(self.unindex(id))
    }

    fn count(&self) -> Result<u64> {
        Ok(self.documents.len() as u64)
    }

    fn clear(&mut self) -> Result<()> {
        self.documents.clear();
        self.postings.clear();
        self.total_len.clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::index::query::{BoolQuery, DateField, Field};
    use crate::test_support::{document, ts};

    fn index_with(docs: Vec<TranslationDocument>) -> MemoryIndex {
        let mut index = MemoryIndex::new();
        for d in docs {
            index.put(d).unwrap();
        }
        index
    }

    fn ids(resp: &SearchResponse) -> Vec<u64> {
        resp.hits.iter().map(|h| h.id).collect()
    }

    #[test]
    fn match_all_counts_everything() {
        let index = index_with(vec![
            document(1, "Save", "Enregistrer", "fr"),
            document(2, "Open", "Ouvrir", "fr"),
        ]);
        let resp = index.search(&SearchRequest::new(Query::MatchAll)).unwrap();
        assert_eq!(resp.total, 2);
        assert_eq!(index.count().unwrap(), 2);
    }

    #[test]
    fn match_operators() {
        let index = index_with(vec![
            document(1, "save file", "", "fr"),
            document(2, "save", "", "fr"),
            document(3, "open file", "", "fr"),
        ]);

        let and = SearchRequest::new(Query::text(TextField::SourceCopy, "save file", Operator::And));
        assert_eq!(ids(&index.search(&and).unwrap()), vec![1]);

        let or = SearchRequest::new(Query::text(TextField::SourceCopy, "save file", Operator::Or));
        let resp = index.search(&or).unwrap();
        assert_eq!(resp.total, 3);
        // Matching both tokens ranks first.
        assert_eq!(resp.hits[0].id, 1);
    }

    #[test]
    fn match_without_tokens_matches_nothing() {
        let index = index_with(vec![document(1, "save", "", "fr")]);
        let req = SearchRequest::new(Query::text(TextField::SourceCopy, "!!", Operator::Or));
        assert_eq!(index.search(&req).unwrap().total, 0);
    }

    #[test]
    fn filters_terms_and_ranges() {
        let mut a = document(1, "one", "un", "fr");
        a.created_at = ts("2024-01-01T00:00:00Z");
        let mut b = document(2, "two", "zwei", "de");
        b.created_at = ts("2024-02-01T00:00:00Z");
        let mut c = document(3, "three", "drei", "de");
        c.created_at = ts("2024-03-01T00:00:00Z");
        c.hidden_in_search = true;
        let index = index_with(vec![a, b, c]);

        let q = BoolQuery::new()
            .filter(Query::terms(Field::Locale, ["de"]))
            .filter(Query::term(Field::HiddenInSearch, false))
            .build();
        assert_eq!(ids(&index.search(&SearchRequest::new(q)).unwrap()), vec![2]);

        let q = Query::range(
            DateField::CreatedAt,
            Some(ts("2024-01-15T00:00:00Z")),
            Some(ts("2024-03-01T00:00:00Z")),
        );
        let req = SearchRequest::new(q).sort_by(SortClause::asc(SortField::CreatedAt));
        assert_eq!(ids(&index.search(&req).unwrap()), vec![2, 3]);
    }

    #[test]
    fn unset_optional_field_never_matches_term() {
        let mut a = document(1, "one", "un", "fr");
        a.translator_id = Some(7);
        let b = document(2, "two", "deux", "fr");
        let index = index_with(vec![a, b]);

        let req = SearchRequest::new(Query::term(Field::TranslatorId, 7u64));
        assert_eq!(ids(&index.search(&req).unwrap()), vec![1]);
    }

    #[test]
    fn should_needs_one_match_without_must() {
        let index = index_with(vec![
            document(1, "alpha", "", "fr"),
            document(2, "beta", "", "fr"),
            document(3, "gamma", "", "fr"),
        ]);
        let q = BoolQuery::new()
            .should(Query::text(TextField::SourceCopy, "alpha", Operator::Or))
            .should(Query::term(Field::Id, 3u64))
            .build();
        let mut got = ids(&index.search(&SearchRequest::new(q)).unwrap());
        got.sort();
        assert_eq!(got, vec![1, 3]);
    }

    #[test]
    fn must_not_excludes() {
        let index = index_with(vec![document(1, "a", "", "fr"), document(2, "b", "", "fr")]);
        let q = BoolQuery::new().must_not(Query::term(Field::Id, 1u64)).build();
        assert_eq!(ids(&index.search(&SearchRequest::new(q)).unwrap()), vec![2]);
    }

    #[test]
    fn boost_scales_score() {
        let index = index_with(vec![document(1, "alpha", "", "fr")]);
        let plain = index
            .search(&SearchRequest::new(Query::text(TextField::SourceCopy, "alpha", Operator::Or)))
            .unwrap();
        let boosted = index
            .search(&SearchRequest::new(
                Query::text(TextField::SourceCopy, "alpha", Operator::Or).boosted(3.0),
            ))
            .unwrap();
        assert!((boosted.hits[0].score - plain.hits[0].score * 3.0).abs() < 1e-5);
    }

    #[test]
    fn pagination_keeps_total() {
        let docs = (1..=5).map(|i| document(i, "word", "", "fr")).collect();
        let index = index_with(docs);
        let req = SearchRequest::new(Query::MatchAll)
            .sort_by(SortClause::asc(SortField::Id))
            .page(2, 2);
        let resp = index.search(&req).unwrap();
        assert_eq!(resp.total, 5);
        assert_eq!(ids(&resp), vec![3, 4]);
    }

    #[test]
    fn put_replaces_and_delete_unindexes() {
        let mut index = index_with(vec![document(1, "old text", "", "fr")]);
        index.put(document(1, "new text", "", "fr")).unwrap();
        assert_eq!(index.count().unwrap(), 1);

        let old = SearchRequest::new(Query::text(TextField::SourceCopy, "old", Operator::Or));
        assert_eq!(index.search(&old).unwrap().total, 0);
        let new = SearchRequest::new(Query::text(TextField::SourceCopy, "new", Operator::Or));
        assert_eq!(index.search(&new).unwrap().total, 1);

        assert!(index.delete(1).unwrap());
        assert!(!index.delete(1).unwrap());
        assert_eq!(index.search(&new).unwrap().total, 0);
        assert_eq!(index.stats().token_count, 0);
    }
}
