#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    KeyPut,
    KeyDelete,
    TranslationPut,
    TranslationDelete,
    Search,
    FuzzyTop,
    FuzzyMatches,
    IndexStats,
    IndexRebuild,
    StoreSave,
    StoreLoad,
    StoreImport,
    DetectEncoding,
    Unknown,
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s {
            "ping" => Command::Ping,
            "key.put" => Command::KeyPut,
            "key.delete" => Command::KeyDelete,
            "translation.put" => Command::TranslationPut,
            "translation.delete" => Command::TranslationDelete,
            "search" => Command::Search,
            "fuzzy.top" => Command::FuzzyTop,
            "fuzzy.matches" => Command::FuzzyMatches,
            "index.stats" => Command::IndexStats,
            "index.rebuild" => Command::IndexRebuild,
            "store.save" => Command::StoreSave,
            "store.load" => Command::StoreLoad,
            "store.import" => Command::StoreImport,
            "encoding.detect" | "detect_encoding" => Command::DetectEncoding,
            _ => Command::Unknown,
        }
    }
}
