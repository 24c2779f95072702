//! Query port between the finders and whatever search engine stores the
//! translation documents.

pub mod http;
pub mod memory;
pub mod query;
pub mod tokenizer;

pub use http::HttpIndex;
pub use memory::MemoryIndex;
pub use query::{
    BoolQuery, DateField, Field, FieldValue, Hit, Operator, Query, SearchRequest, SearchResponse,
    SortClause, SortField, SortOrder, TextField,
};

use crate::error::Result;
use crate::model::TranslationDocument;

pub trait SearchIndex {
    fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;

    /// Inserts or replaces the document with the same id.
    fn put(&mut self, document: TranslationDocument) -> Result<()>;

    /// Returns whether a document was removed.
    fn delete(&mut self, id: u64) -> Result<bool>;

    fn count(&self) -> Result<u64>;

    fn clear(&mut self) -> Result<()>;

    fn backend_name(&self) -> &'static str;

    fn put_batch(&mut self, documents: Vec<TranslationDocument>) -> Result<usize> {
        let mut indexed = 0;
        for doc in documents {
            self.put(doc)?;
            indexed += 1;
        }
        Ok(indexed)
    }
}
