//! Elasticsearch backend over its REST API.

use std::{thread, time::Duration};

use rand::{thread_rng, Rng};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::query::{Hit, Query, SearchRequest, SearchResponse, SortClause};
use super::SearchIndex;
use crate::error::{CoreError, Result};
use crate::model::TranslationDocument;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

fn backoff(attempt: usize) -> Duration {
    let jitter: u64 = thread_rng().gen_range(0..100);
    let ms = BASE_DELAY_MS * (2_u64.pow(attempt as u32)) + jitter;
    Duration::from_millis(ms)
}

pub struct HttpIndex {
    client: Client,
    base_url: String,
    index: String,
}

impl HttpIndex {
    pub fn new(base_url: &str, index: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    /// Builds the client and makes sure the index exists with the
    /// document mapping.
    pub fn connect(base_url: &str, index: &str, timeout: Duration) -> Result<Self> {
        let backend = Self::new(base_url, index, timeout)?;
        backend.ensure_index()?;
        Ok(backend)
    }

    /// Creates the index with [`index_mapping`] unless it exists. Returns
    /// whether it was created.
    pub fn ensure_index(&self) -> Result<bool> {
        let url = format!("{}/{}", self.base_url, self.index);

        let (status, text) = self.send(|| self.client.head(&url))?;
        if status.is_success() {
            return Ok(false);
        }
        if status != StatusCode::NOT_FOUND {
            return Err(CoreError::Index(extract_error_message(status, &text)));
        }

        let body = index_mapping();
        let (status, text) = self.send(|| self.client.put(&url).json(&body))?;
        if status.is_success() {
            info!(index = %self.index, "created search index");
            return Ok(true);
        }
        // Another process created it between the two calls.
        if text.contains("resource_already_exists_exception") {
            return Ok(false);
        }
        Err(CoreError::Index(extract_error_message(status, &text)))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.index, path)
    }

    /// Sends the request built by `build`, retrying transport errors and
    /// transient statuses. Any final status is handed back to the caller.
    fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<(StatusCode, String)> {
        let mut attempt = 0;

        loop {
            match build().send() {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text()?;

                    if should_retry_http(status) && attempt + 1 < MAX_RETRIES {
                        warn!(status = status.as_u16(), attempt, "retrying search backend request");
                        thread::sleep(backoff(attempt));
                        attempt += 1;
                        continue;
                    }

                    return Ok((status, text));
                }
                Err(err) => {
                    if attempt + 1 < MAX_RETRIES {
                        warn!(error = %err, attempt, "search backend unreachable, retrying");
                        thread::sleep(backoff(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

impl SearchIndex for HttpIndex {
    fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let body = request_body(request);
        debug!(body = %body, "elasticsearch query");

        let (status, text) = self.send(|| self.client.post(self.url("_search")).json(&body))?;
        if !status.is_success() {
            return Err(CoreError::Index(extract_error_message(status, &text)));
        }

        parse_search_response(&text)
    }

    fn put(&mut self, document: TranslationDocument) -> Result<()> {
        let url = self.url(&format!("_doc/{}", document.id));
        let (status, text) = self.send(|| self.client.put(&url).json(&document))?;
        if !status.is_success() {
            return Err(CoreError::Index(extract_error_message(status, &text)));
        }
        Ok(())
    }

    fn delete(&mut self, id: u64) -> Result<bool> {
        let url = self.url(&format!("_doc/{id}"));
        let (status, text) = self.send(|| self.client.delete(&url))?;
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(CoreError::Index(extract_error_message(status, &text)));
        }
        Ok(true)
    }

    fn count(&self) -> Result<u64> {
        let (status, text) = self.send(|| self.client.get(self.url("_count")))?;
        if status == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !status.is_success() {
            return Err(CoreError::Index(extract_error_message(status, &text)));
        }

        let v: Value = serde_json::from_str(&text)?;
        v.get("count")
            .and_then(|c| c.as_u64())
            .ok_or_else(|| CoreError::Index("count response without `count`".into()))
    }

    fn clear(&mut self) -> Result<()> {
        let body = json!({ "query": { "match_all": {} } });
        let (status, text) =
            self.send(|| self.client.post(self.url("_delete_by_query")).json(&body))?;
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(CoreError::Index(extract_error_message(status, &text)));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "elasticsearch"
    }
}

/// Explicit field types. Locales and hashes are `keyword` so `term` filters
/// compare whole values; only the copy fields are analyzed.
pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": { "type": "long" },
                "key_id": { "type": "long" },
                "project_id": { "type": "long" },
                "source_copy": { "type": "text" },
                "copy": { "type": "text" },
                "source_rfc5646_locale": { "type": "keyword" },
                "rfc5646_locale": { "type": "keyword" },
                "translated": { "type": "boolean" },
                "approved": { "type": "boolean" },
                "translator_id": { "type": "long" },
                "reviewer_id": { "type": "long" },
                "hidden_in_search": { "type": "boolean" },
                "source_hash": { "type": "keyword" },
                "created_at": { "type": "date" },
                "updated_at": { "type": "date" }
            }
        }
    })
}

pub fn request_body(request: &SearchRequest) -> Value {
    let mut body = json!({
        "query": query_json(&request.query),
        "from": request.from,
        "size": request.size,
        "track_total_hits": true,
    });

    if !request.sort.is_empty() {
        body["sort"] = Value::Array(request.sort.iter().map(sort_json).collect());
    }

    body
}

fn sort_json(clause: &SortClause) -> Value {
    json!({ clause.field.as_str(): { "order": clause.order.as_str() } })
}

pub fn query_json(query: &Query) -> Value {
    match query {
        Query::MatchAll => json!({ "match_all": {} }),

        Query::Match {
            field,
            text,
            operator,
        } => json!({
            "match": { field.as_str(): { "query": text, "operator": operator.as_str() } }
        }),

        Query::Term { field, value } => json!({ "term": { field.as_str(): value } }),

        Query::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),

        Query::Range { field, gte, lte } => {
            let mut bounds = Map::new();
            if let Some(g) = gte {
                bounds.insert("gte".into(), json!(g.to_rfc3339()));
            }
            if let Some(l) = lte {
                bounds.insert("lte".into(), json!(l.to_rfc3339()));
            }
            json!({ "range": { field.as_str(): bounds } })
        }

        Query::Bool(b) => {
            let mut clauses = Map::new();
            for (name, list) in [
                ("must", &b.must),
                ("should", &b.should),
                ("filter", &b.filter),
                ("must_not", &b.must_not),
            ] {
                if !list.is_empty() {
                    clauses.insert(name.into(), Value::Array(list.iter().map(query_json).collect()));
                }
            }
            if !b.should.is_empty() && (!b.must.is_empty() || !b.filter.is_empty()) {
                clauses.insert("minimum_should_match".into(), json!(0));
            }
            json!({ "bool": clauses })
        }

        Query::Boosted { query, boost } => json!({
            "bool": { "should": [query_json(query)], "boost": boost }
        }),
    }
}

pub fn parse_search_response(text: &str) -> Result<SearchResponse> {
    let v: Value = serde_json::from_str(text)?;
    let hits = v
        .get("hits")
        .ok_or_else(|| CoreError::Index("search response without `hits`".into()))?;

    // Older servers report a bare number, newer ones `{ "value": n }`.
    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(obj) => obj.get("value").and_then(|n| n.as_u64()).unwrap_or(0),
        None => 0,
    };

    let mut out = Vec::new();
    if let Some(arr) = hits.get("hits").and_then(|h| h.as_array()) {
        for (i, hit) in arr.iter().enumerate() {
            let source = hit
                .get("_source")
                .cloned()
                .ok_or_else(|| CoreError::Index(format!("hit {i} without `_source`")))?;
            let document: TranslationDocument = serde_json::from_value(source)?;
            let score = hit.get("_score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;

            out.push(Hit {
                id: document.id,
                score,
                document,
            });
        }
    }

    Ok(SearchResponse { total, hits: out })
}

fn should_retry_http(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn extract_error_message(status: StatusCode, body_text: &str) -> String {
    // { "error": { "reason": "..." } } or { "error": "..." }
    if let Ok(v) = serde_json::from_str::<Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("reason"))
            .and_then(|m| m.as_str())
        {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
        if let Some(msg) = v.get("error").and_then(|m| m.as_str()) {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
    }

    let trimmed = body_text.trim();
    let snippet: String = if trimmed.chars().count() > 400 {
        format!("{}...", trimmed.chars().take(400).collect::<String>())
    } else {
        trimmed.to_string()
    };

    format!("HTTP {}: {}", status.as_u16(), snippet)
}
