pub mod ancestry;
pub mod crc32;
pub mod errors;
pub mod glyphs;
pub mod graphemes;
pub mod lexicon;
pub mod matcher;
pub mod models;
pub mod phoneme_table;
pub mod phonemes;
pub mod settings;
pub mod spelling;
pub mod store;
pub mod translator;

pub use errors::{EngineError, EngineResult};
pub use store::Database;
