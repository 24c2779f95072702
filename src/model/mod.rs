pub mod document;
pub mod key;
pub mod locale;
pub mod translation;

pub use document::TranslationDocument;
pub use key::Key;
pub use locale::Locale;
pub use translation::Translation;
