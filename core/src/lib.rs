//! In-memory full-text search: an inverted index with per-document tf-idf vectors,
//! an operator-aware query parser, and a cosine-similarity ranker with fuzzy
//! fallback and "did you mean" suggestions.

pub mod config;
pub mod error;
pub mod index;
pub mod morph;
pub mod query;
pub mod rank;
pub mod result;
pub mod scan;
pub mod tokenizer;

pub type DocId = u32;
pub type Term = String;

pub use config::SearchConfig;
pub use error::{EngineError, Result};
pub use index::Corpus;
pub use query::{parse, ParsedQuery};
pub use rank::search;
pub use result::{SearchItem, SearchResult};
pub use scan::{build, LoaderRegistry};
pub use tokenizer::{Loader, PlainLoader, TextLoader, Token};
pub use tokio_util::sync::CancellationToken;
