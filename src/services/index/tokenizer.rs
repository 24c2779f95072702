//! Tokenizer shared by indexing and querying.
//!
//! Latin-like scripts split on anything that is not a letter or digit. CJK
//! characters carry no spaces, so each one becomes its own token.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::translation_memory::normalize::normalize;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("word regex is valid"));

pub fn tokenize(text: &str) -> Vec<String> {
    let norm = normalize(text);
    let mut tokens = Vec::new();

    for m in WORD_RE.find_iter(&norm) {
        let word = m.as_str();
        if !contains_cjk(word) {
            tokens.push(word.to_string());
            continue;
        }

        let mut run = String::new();
        for ch in word.chars() {
            if is_cjk(ch) {
                if !run.is_empty() {
                    tokens.push(std::mem::take(&mut run));
                }
                tokens.push(ch.to_string());
            } else {
                run.push(ch);
            }
        }
        if !run.is_empty() {
            tokens.push(run);
        }
    }

    tokens
}

/// Distinct tokens in first-seen order.
pub fn unique_tokens(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for t in tokenize(text) {
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4e00}'..='\u{9fff}' |  // CJK Unified Ideographs
        '\u{3400}'..='\u{4dbf}' |  // CJK Extension A
        '\u{3040}'..='\u{309f}' |  // Hiragana
        '\u{30a0}'..='\u{30ff}' |  // Katakana
        '\u{ac00}'..='\u{d7af}'    // Hangul Syllables
    )
}
