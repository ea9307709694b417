//! Term enumeration contract.
//!
//! A [`TermsEnum`] is a cheap, per-query cursor over one field's term
//! dictionary. Metadata decoding is lazy: positioning a term only fetches
//! its raw metadata; [`TermsEnum::decode_metadata`] (invoked implicitly by
//! `term_state` and the postings openers) runs the postings codec, and is
//! idempotent. Callers that only need frequency counts never pay the full
//! decode cost.

use bit_vec::BitVec;

use crate::error::Result;
use crate::postings::{PostingsIterator, TermState};

/// Outcome of a ceiling seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStatus {
    /// Positioned exactly on the target term.
    Found,
    /// Positioned on the smallest term greater than the target.
    NotFound,
    /// No term at or above the target exists.
    End,
}

/// Cursor over a field's terms in lexicographic byte order.
pub trait TermsEnum {
    /// Advance to the next term, returning a copy of its bytes, or `None`
    /// when the enumeration is exhausted.
    fn next(&mut self) -> Result<Option<Vec<u8>>>;

    /// The current term, or `None` before the first advance or after
    /// exhaustion.
    fn term(&self) -> Option<&[u8]>;

    /// Document frequency of the current term. Reads the already-fetched
    /// metadata; never forces a full decode.
    fn doc_freq(&self) -> Result<u32>;

    /// Total occurrences of the current term. Equals `doc_freq` for fields
    /// without frequencies. Never forces a full decode.
    fn total_term_freq(&self) -> Result<u64>;

    /// Run the postings codec over the current term's metadata. Idempotent:
    /// a no-op when the current position is already decoded.
    fn decode_metadata(&mut self) -> Result<()>;

    /// Force a full decode and return an independent snapshot of the decoded
    /// posting state.
    fn term_state(&mut self) -> Result<TermState>;

    /// Open a posting cursor for the current term, filtered by `live_docs`
    /// (set bit = live) when given.
    fn postings(&mut self, live_docs: Option<&BitVec>) -> Result<Box<dyn PostingsIterator>>;

    /// Open a positions-capable cursor. Fails with an unsupported-operation
    /// error when the field does not index positions.
    fn postings_with_positions(
        &mut self,
        live_docs: Option<&BitVec>,
    ) -> Result<Box<dyn PostingsIterator>>;

    /// Position exactly on `target`; `true` iff the term exists.
    fn seek_exact(&mut self, target: &[u8]) -> Result<bool>;

    /// Position on the smallest term greater than or equal to `target`.
    fn seek_ceil(&mut self, target: &[u8]) -> Result<SeekStatus>;

    /// Re-position to a term whose decoded state was previously captured via
    /// [`TermsEnum::term_state`]. Implementations may defer the underlying
    /// cursor movement until the next call to [`TermsEnum::next`].
    fn seek_exact_state(&mut self, target: &[u8], state: &TermState) -> Result<()>;

    /// Ordinal of the current term. Always fails: an FST-backed dictionary
    /// has no dense term numbering.
    fn ord(&self) -> Result<u64>;

    /// Seek by term ordinal. Always fails, never silently degrades.
    fn seek_exact_ord(&mut self, ord: u64) -> Result<()>;
}
