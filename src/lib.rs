//! # Crocus
//!
//! A term-dictionary reader for inverted-index segments.
//!
//! The dictionary file stores, per field, an FST mapping term bytes to
//! posting-list metadata plus the field's summary statistics. Opening a file
//! validates headers, checksum and statistics, then serves terms through two
//! enumerator strategies: sequential/seeking iteration and automaton
//! intersection.
//!
//! ## Features
//!
//! - Pure Rust implementation
//! - Whole-file checksum verification at open
//! - Lazy per-term metadata decoding
//! - Pluggable postings codecs and byte automatons
//! - Memory-mapped or in-memory file access

pub mod automaton;
pub mod dictionary;
mod error;
pub mod field_info;
pub mod format;
pub mod fst;
pub mod input;
pub mod postings;
pub mod terms;

// Re-exports for the public API
pub use automaton::{Automaton, PrefixAutomaton, SetAutomaton, WildcardAutomaton};
pub use dictionary::{
    FieldReader, IntersectTermsEnum, SegmentTermsEnum, TermDictionary, VERSION_CURRENT,
};
pub use error::{CrocusError, Result};
pub use field_info::{FieldInfo, FieldInfos, IndexOptions};
pub use input::{BytesInput, IndexInput, MmapInput};
pub use postings::{InlinePostingsCodec, PostingsCodec, PostingsIterator, TermState};
pub use terms::{SeekStatus, TermsEnum};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
