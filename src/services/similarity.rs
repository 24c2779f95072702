//! Text similarity as a percentage.
//!
//! The common-character count is the length of the longest common substring
//! plus, recursively, the common characters to its left and to its right.
//! The percentage is `common * 2 * 100 / (len_a + len_b)`.

/// Similarity of two strings in `[0, 100]`. Identical non-empty strings score
/// 100; two empty strings score 0.
pub fn similarity_percentage(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }

    let common = common_chars(&a, &b);
    (common * 2) as f64 * 100.0 / total as f64
}

fn common_chars(a: &[char], b: &[char]) -> usize {
    let (pos_a, pos_b, max) = longest_common_substring(a, b);
    if max == 0 {
        return 0;
    }

    max + common_chars(&a[..pos_a], &b[..pos_b])
        + common_chars(&a[pos_a + max..], &b[pos_b + max..])
}

/// First longest common substring, in the order of a scan over `a` then `b`
/// from the left. Runs in `O(len_a * len_b)` time with two rows of memory.
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let (mut pos_a, mut pos_b, mut max) = (0, 0, 0);

    // run[j]: length of the common run starting at a[i] and b[j].
    let mut run = vec![0usize; b.len() + 1];
    let mut next = vec![0usize; b.len() + 1];

    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            run[j] = if a[i] == b[j] { next[j + 1] + 1 } else { 0 };
            // Walking backwards, `>=` keeps the leftmost of equal runs.
            if run[j] > 0 && run[j] >= max {
                max = run[j];
                pos_a = i;
                pos_b = j;
            }
        }
        std::mem::swap(&mut run, &mut next);
    }

    (pos_a, pos_b, max)
}
