pub mod catalog;
pub mod encoding;
pub mod fuzzy_finder;
pub mod index;
pub mod search_finder;
pub mod similarity;
pub mod translation_memory;
