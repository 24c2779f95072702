pub mod hash;
pub mod normalize;
pub mod store;

/// Hash of the normalized source copy. Two translations with the same source
/// hash are exact duplicates for fuzzy matching purposes.
pub fn source_hash(source_copy: &str) -> String {
    hash::hash_norm(&normalize::normalize(source_copy))
}
