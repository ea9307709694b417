//! Postings reader capability consumed by the term dictionary.
//!
//! The dictionary hands each term's decoded metadata (`longs` + opaque
//! bytes) to a [`PostingsCodec`], which turns it into a [`TermState`] and,
//! on demand, a posting-list cursor. [`InlinePostingsCodec`] is a complete
//! codec that stores each term's postings inline in the metadata bytes, so a
//! dictionary file is self-contained.

use bit_vec::BitVec;

use crate::error::{CrocusError, Result};
use crate::field_info::FieldInfo;
use crate::input::{BytesInput, IndexInput, write_vint, write_vlong};

/// Decoded posting state for one term.
///
/// Snapshots returned by `TermsEnum::term_state` are plain clones and stay
/// valid regardless of later enumerator movement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermState {
    /// Number of documents containing the term.
    pub doc_freq: u32,
    /// Total occurrences across all documents; equals `doc_freq` for fields
    /// without frequencies.
    pub total_term_freq: u64,
    /// Codec-private cursor value reconstructed from the metadata longs.
    pub doc_start: u64,
    /// Codec-private opaque payload.
    pub payload: Vec<u8>,
}

/// Cursor over one term's posting list.
pub trait PostingsIterator {
    /// Advance to the next live document, or `None` when exhausted.
    fn next_doc(&mut self) -> Result<Option<u32>>;

    /// Term frequency within the current document.
    fn freq(&self) -> Result<u32>;

    /// Next position within the current document, or `None` when the
    /// document's positions are exhausted.
    fn next_position(&mut self) -> Result<Option<u32>>;
}

/// Decodes per-term metadata and opens posting cursors.
pub trait PostingsCodec: Send + Sync {
    /// Called once at dictionary open, with the input positioned after the
    /// dictionary header.
    fn init(&mut self, input: &mut dyn IndexInput) -> Result<()>;

    /// Decode a term's metadata into `state`. When `absolute` is false the
    /// longs are deltas against the previously decoded term.
    fn decode_term(
        &self,
        longs: &[u64],
        bytes: &[u8],
        field: &FieldInfo,
        state: &mut TermState,
        absolute: bool,
    ) -> Result<()>;

    /// Open a document cursor for a decoded term.
    fn postings(
        &self,
        field: &FieldInfo,
        state: &TermState,
        live_docs: Option<&BitVec>,
    ) -> Result<Box<dyn PostingsIterator>>;

    /// Open a document-and-positions cursor for a decoded term.
    fn postings_with_positions(
        &self,
        field: &FieldInfo,
        state: &TermState,
        live_docs: Option<&BitVec>,
    ) -> Result<Box<dyn PostingsIterator>>;

    /// Verify codec-level integrity (the dictionary file checksum is checked
    /// separately at open).
    fn check_integrity(&self) -> Result<()>;
}

/// Codec storing each term's postings inline in its metadata bytes.
///
/// Wire format of the payload, per document: vint doc-id delta, vint
/// frequency (when the field records freqs), then `freq` vint position
/// deltas (when the field records positions). `longs[0]` carries the payload
/// length as a consistency check.
#[derive(Debug, Default)]
pub struct InlinePostingsCodec;

/// Number of metadata longs this codec uses per term.
pub const INLINE_LONGS_SIZE: usize = 1;

impl InlinePostingsCodec {
    /// Create the codec.
    pub fn new() -> Self {
        InlinePostingsCodec
    }

    /// Encode a term's postings into `(longs, bytes)` metadata.
    ///
    /// `postings` is a sorted list of `(doc_id, freq, positions)`.
    pub fn encode(
        &self,
        field: &FieldInfo,
        postings: &[(u32, u32, Vec<u32>)],
    ) -> (Vec<u64>, Vec<u8>) {
        let mut bytes = Vec::new();
        let mut prev_doc = 0u32;
        for (doc, freq, positions) in postings {
            write_vint(&mut bytes, doc - prev_doc);
            prev_doc = *doc;
            if field.index_options.has_freqs() {
                write_vint(&mut bytes, *freq);
            }
            if field.index_options.has_positions() {
                debug_assert_eq!(positions.len(), *freq as usize);
                let mut prev_pos = 0u32;
                for pos in positions {
                    write_vint(&mut bytes, pos - prev_pos);
                    prev_pos = *pos;
                }
            }
        }
        (vec![bytes.len() as u64], bytes)
    }

    fn decode_payload(
        &self,
        field: &FieldInfo,
        state: &TermState,
        live_docs: Option<&BitVec>,
        keep_positions: bool,
    ) -> Result<Vec<(u32, u32, Vec<u32>)>> {
        let mut input = BytesInput::new(state.payload.clone());
        let mut entries = Vec::with_capacity(state.doc_freq as usize);
        let mut doc = 0u32;
        for i in 0..state.doc_freq {
            let delta = input.read_vint()?;
            if i > 0 && delta == 0 {
                return Err(CrocusError::corrupt(format!(
                    "non-increasing doc id in postings of field {:?}",
                    field.name
                )));
            }
            doc = doc.checked_add(delta).ok_or_else(|| {
                CrocusError::corrupt(format!(
                    "doc id overflow in postings of field {:?}",
                    field.name
                ))
            })?;
            let freq = if field.index_options.has_freqs() {
                input.read_vint()?
            } else {
                1
            };
            let mut positions = Vec::new();
            if field.index_options.has_positions() {
                let mut pos = 0u32;
                for _ in 0..freq {
                    pos += input.read_vint()?;
                    if keep_positions {
                        positions.push(pos);
                    }
                }
            }
            let live = match live_docs {
                Some(bits) => bits.get(doc as usize).unwrap_or(false),
                None => true,
            };
            if live {
                entries.push((doc, freq, positions));
            }
        }
        if input.position() != input.len() {
            return Err(CrocusError::corrupt(format!(
                "trailing postings bytes for field {:?}",
                field.name
            )));
        }
        Ok(entries)
    }
}

impl PostingsCodec for InlinePostingsCodec {
    fn init(&mut self, _input: &mut dyn IndexInput) -> Result<()> {
        // postings live inside the term metadata; no separate file section
        Ok(())
    }

    fn decode_term(
        &self,
        longs: &[u64],
        bytes: &[u8],
        _field: &FieldInfo,
        state: &mut TermState,
        absolute: bool,
    ) -> Result<()> {
        let long0 = *longs
            .first()
            .ok_or_else(|| CrocusError::corrupt("missing metadata long"))?;
        if absolute {
            state.doc_start = long0;
            if state.doc_start != bytes.len() as u64 {
                return Err(CrocusError::corrupt(format!(
                    "postings payload length mismatch: recorded {}, actual {}",
                    state.doc_start,
                    bytes.len()
                )));
            }
        } else {
            state.doc_start = state.doc_start.wrapping_add(long0);
        }
        state.payload = bytes.to_vec();
        Ok(())
    }

    fn postings(
        &self,
        field: &FieldInfo,
        state: &TermState,
        live_docs: Option<&BitVec>,
    ) -> Result<Box<dyn PostingsIterator>> {
        let entries = self.decode_payload(field, state, live_docs, false)?;
        Ok(Box::new(InlinePostingsIterator::new(entries)))
    }

    fn postings_with_positions(
        &self,
        field: &FieldInfo,
        state: &TermState,
        live_docs: Option<&BitVec>,
    ) -> Result<Box<dyn PostingsIterator>> {
        if !field.index_options.has_positions() {
            return Err(CrocusError::unsupported(format!(
                "field {:?} does not index positions",
                field.name
            )));
        }
        let entries = self.decode_payload(field, state, live_docs, true)?;
        Ok(Box::new(InlinePostingsIterator::new(entries)))
    }

    fn check_integrity(&self) -> Result<()> {
        Ok(())
    }
}

struct InlinePostingsIterator {
    entries: Vec<(u32, u32, Vec<u32>)>,
    // index of the current entry, one past before the first call
    idx: usize,
    pos_idx: usize,
    started: bool,
}

impl InlinePostingsIterator {
    fn new(entries: Vec<(u32, u32, Vec<u32>)>) -> Self {
        InlinePostingsIterator {
            entries,
            idx: 0,
            pos_idx: 0,
            started: false,
        }
    }
}

impl PostingsIterator for InlinePostingsIterator {
    fn next_doc(&mut self) -> Result<Option<u32>> {
        if self.started {
            self.idx += 1;
        } else {
            self.started = true;
        }
        self.pos_idx = 0;
        Ok(self.entries.get(self.idx).map(|(doc, _, _)| *doc))
    }

    fn freq(&self) -> Result<u32> {
        self.entries
            .get(self.idx)
            .filter(|_| self.started)
            .map(|(_, freq, _)| *freq)
            .ok_or_else(|| CrocusError::illegal_state("freq() before next_doc()"))
    }

    fn next_position(&mut self) -> Result<Option<u32>> {
        let positions = self
            .entries
            .get(self.idx)
            .filter(|_| self.started)
            .map(|(_, _, positions)| positions)
            .ok_or_else(|| CrocusError::illegal_state("next_position() before next_doc()"))?;
        let next = positions.get(self.pos_idx).copied();
        if next.is_some() {
            self.pos_idx += 1;
        }
        Ok(next)
    }
}
