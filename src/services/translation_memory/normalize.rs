/// Canonical form of a source copy used for exact-duplicate detection:
/// lowercased, whitespace collapsed, quote and ellipsis marks dropped.
pub fn normalize(text: &str) -> String {
    let mut s = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    s.retain(|ch| !matches!(ch, '“' | '”' | '’' | '‘' | '«' | '»' | '…' | '"' | '\''));

    s
}
