use std::fs;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use serde::Serialize;
use tracing::debug;

use crate::error::{CoreError, Result};

#[derive(Debug, Serialize)]
pub struct EncodingCandidate {
    pub name: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
pub struct EncodingDetectionResult {
    pub best: String,
    pub confidence: f32,
    pub candidates: Vec<EncodingCandidate>,
}

pub fn detect_from_file(path: &Path) -> Result<EncodingDetectionResult> {
    let bytes = fs::read(path)?;
    Ok(detect(&bytes))
}

pub fn detect(bytes: &[u8]) -> EncodingDetectionResult {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        let name = encoding.name().to_lowercase();
        return EncodingDetectionResult {
            best: name.clone(),
            confidence: 0.99,
            candidates: vec![EncodingCandidate {
                name,
                confidence: 0.99,
            }],
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);

    let encoding = detector.guess(None, true);
    let best = encoding.name().to_lowercase();
    let confidence = estimate_confidence(bytes, encoding);

    let mut candidates = vec![EncodingCandidate {
        name: best.clone(),
        confidence,
    }];

    // Legacy exports of CJK projects are commonly mislabeled between these.
    match best.as_str() {
        "shift_jis" => candidates.push(EncodingCandidate {
            name: "euc-jp".into(),
            confidence: (confidence - 0.10).max(0.0),
        }),
        "gbk" => candidates.push(EncodingCandidate {
            name: "big5".into(),
            confidence: (confidence - 0.10).max(0.0),
        }),
        _ => {}
    }

    EncodingDetectionResult {
        best,
        confidence,
        candidates,
    }
}

/// Reads a text file in any encoding the detector recognizes and returns it
/// as UTF-8, without a byte order mark.
pub fn decode_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    decode(&bytes)
}

pub fn decode(bytes: &[u8]) -> Result<String> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(encoding, &bytes[bom_len..]);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok(s.to_string());
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    debug!(encoding = encoding.name(), "decoding non utf-8 input");

    decode_with(encoding, bytes)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(CoreError::Encoding(format!(
            "input is not valid {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

fn estimate_confidence(bytes: &[u8], encoding: &'static Encoding) -> f32 {
    let (text, _, had_errors) = encoding.decode(bytes);

    if had_errors {
        return 0.35;
    }

    let len = text.len();
    if len < 64 {
        0.55
    } else if len < 512 {
        0.70
    } else if len < 4096 {
        0.82
    } else {
        0.90
    }
}
