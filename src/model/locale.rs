use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

static RFC5646_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<language>[A-Za-z]{2,3})(?:-(?P<script>[A-Za-z]{4}))?(?:-(?P<region>[A-Za-z]{2}|[0-9]{3}))?(?P<variants>(?:-(?:[A-Za-z0-9]{5,8}|[0-9][A-Za-z0-9]{3}))*)$",
    )
    .expect("locale regex is valid")
});

/// An RFC 5646 language tag, stored with canonical casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale {
    language: String,
    script: Option<String>,
    region: Option<String>,
    variants: Vec<String>,
}

impl Locale {
    pub fn parse(tag: &str) -> Result<Self, CoreError> {
        let tag = tag.trim().replace('_', "-");
        let caps = RFC5646_RE
            .captures(&tag)
            .ok_or_else(|| CoreError::InvalidRequest(format!("invalid locale: {tag:?}")))?;

        let language = caps["language"].to_lowercase();
        let script = caps.name("script").map(|m| titlecase(m.as_str()));
        let region = caps.name("region").map(|m| m.as_str().to_uppercase());
        let variants = caps
            .name("variants")
            .map(|m| {
                m.as_str()
                    .split('-')
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_lowercase())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            language,
            script,
            region,
            variants,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn rfc5646(&self) -> String {
        self.to_string()
    }

    /// This locale followed by progressively less specific ones, ending with the
    /// bare language: `zh-Hant-TW` → `zh-Hant-TW`, `zh-Hant`, `zh`.
    pub fn fallbacks(&self) -> Vec<Locale> {
        let mut chain = vec![self.clone()];
        let mut current = self.clone();

        loop {
            let trimmed = current.variants.pop().is_some()
                || current.region.take().is_some()
                || current.script.take().is_some();
            if !trimmed {
                break;
            }
            chain.push(current.clone());
        }

        chain
    }
}

fn titlecase(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)?;
        if let Some(script) = &self.script {
            write!(f, "-{script}")?;
        }
        if let Some(region) = &self.region {
            write!(f, "-{region}")?;
        }
        for v in &self.variants {
            write!(f, "-{v}")?;
        }
        Ok(())
    }
}

impl FromStr for Locale {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::parse(s)
    }
}

impl Serialize for Locale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Locale {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Locale::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Parses a comma separated locale list, dropping entries that are not valid tags.
pub fn parse_locale_list(list: &str) -> Vec<Locale> {
    let mut out: Vec<Locale> = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match Locale::parse(part) {
            Ok(l) => {
                if !out.contains(&l) {
                    out.push(l);
                }
            }
            Err(_) => tracing::debug!(locale = part, "ignoring invalid locale"),
        }
    }
    out
}
