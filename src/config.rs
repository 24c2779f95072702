use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::services::fuzzy_finder::FuzzySettings;
use crate::services::search_finder::SearchSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackend {
    Memory,
    Elasticsearch,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Index
    pub index_backend: IndexBackend,
    pub elasticsearch_url: String,
    pub index_name: String,
    pub http_timeout: Duration,

    // Persistence
    pub store_path: PathBuf,

    // Search
    pub per_page: usize,
    pub max_per_page: usize,

    // Fuzzy matching
    pub fuzzy_threshold: f64,
    pub fuzzy_candidates: usize,
    pub fuzzy_locale_fallbacks: bool,
}

impl Default for Config {
    fn default() -> Self {
        let search = SearchSettings::default();
        let fuzzy = FuzzySettings::default();
        Self {
            index_backend: IndexBackend::Memory,
            elasticsearch_url: "http://localhost:9200".to_string(),
            index_name: "translations".to_string(),
            http_timeout: Duration::from_secs(30),
            store_path: PathBuf::from("translations_store.json"),
            per_page: search.per_page,
            max_per_page: search.max_per_page,
            fuzzy_threshold: fuzzy.threshold,
            fuzzy_candidates: fuzzy.candidate_limit,
            fuzzy_locale_fallbacks: fuzzy.locale_fallbacks,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Numbers that fail to parse
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let index_backend = match lookup("SHUTTLE_INDEX_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("memory") => IndexBackend::Memory,
            Some("elasticsearch") | Some("es") => IndexBackend::Elasticsearch,
            Some(other) => bail!("SHUTTLE_INDEX_BACKEND must be `memory` or `elasticsearch`, got {other:?}"),
        };

        let fuzzy_threshold: f64 = parse_var(&lookup, "SHUTTLE_FUZZY_THRESHOLD").unwrap_or(defaults.fuzzy_threshold);
        if !(0.0..=100.0).contains(&fuzzy_threshold) {
            bail!("SHUTTLE_FUZZY_THRESHOLD must be between 0 and 100");
        }

        let elasticsearch_url = lookup("SHUTTLE_ELASTICSEARCH_URL").unwrap_or(defaults.elasticsearch_url);
        if index_backend == IndexBackend::Elasticsearch {
            reqwest::Url::parse(&elasticsearch_url)
                .with_context(|| format!("SHUTTLE_ELASTICSEARCH_URL is not a URL: {elasticsearch_url}"))?;
        }

        Ok(Self {
            index_backend,
            elasticsearch_url,
            index_name: lookup("SHUTTLE_INDEX_NAME").unwrap_or(defaults.index_name),
            http_timeout: parse_var(&lookup, "SHUTTLE_HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            store_path: lookup("SHUTTLE_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            per_page: parse_var(&lookup, "SHUTTLE_PER_PAGE").unwrap_or(defaults.per_page),
            max_per_page: parse_var(&lookup, "SHUTTLE_MAX_PER_PAGE").unwrap_or(defaults.max_per_page),
            fuzzy_threshold,
            fuzzy_candidates: parse_var(&lookup, "SHUTTLE_FUZZY_CANDIDATES").unwrap_or(defaults.fuzzy_candidates),
            fuzzy_locale_fallbacks: parse_var(&lookup, "SHUTTLE_FUZZY_LOCALE_FALLBACKS")
                .unwrap_or(defaults.fuzzy_locale_fallbacks),
        })
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            per_page: self.per_page,
            max_per_page: self.max_per_page,
        }
    }

    pub fn fuzzy_settings(&self) -> FuzzySettings {
        FuzzySettings {
            threshold: self.fuzzy_threshold,
            candidate_limit: self.fuzzy_candidates,
            locale_fallbacks: self.fuzzy_locale_fallbacks,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = from(&[]).unwrap();
        assert_eq!(config.index_backend, IndexBackend::Memory);
        assert_eq!(config.per_page, 50);
        assert_eq!(config.fuzzy_threshold, 60.0);
        assert_eq!(config.fuzzy_settings(), FuzzySettings::default());
        assert_eq!(config.search_settings(), SearchSettings::default());
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let config = from(&[
            ("SHUTTLE_INDEX_BACKEND", "elasticsearch"),
            ("SHUTTLE_ELASTICSEARCH_URL", "http://es:9200"),
            ("SHUTTLE_PER_PAGE", "25"),
            ("SHUTTLE_FUZZY_CANDIDATES", "many"),
            ("SHUTTLE_FUZZY_LOCALE_FALLBACKS", "true"),
            ("SHUTTLE_HTTP_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.index_backend, IndexBackend::Elasticsearch);
        assert_eq!(config.elasticsearch_url, "http://es:9200");
        assert_eq!(config.per_page, 25);
        assert_eq!(config.fuzzy_candidates, 10);
        assert!(config.fuzzy_locale_fallbacks);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_unknown_backend_and_bad_threshold() {
        assert!(from(&[("SHUTTLE_INDEX_BACKEND", "solr")]).is_err());
        assert!(from(&[("SHUTTLE_FUZZY_THRESHOLD", "120")]).is_err());
        assert!(from(&[
            ("SHUTTLE_INDEX_BACKEND", "elasticsearch"),
            ("SHUTTLE_ELASTICSEARCH_URL", "not a url"),
        ])
        .is_err());
    }
}
