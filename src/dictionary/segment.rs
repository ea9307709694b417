//! Sequential/seeking term enumerator.

use std::sync::Arc;

use bit_vec::BitVec;

use crate::error::{CrocusError, Result};
use crate::fst::{CursorSeek, FstCursor};
use crate::postings::{PostingsIterator, TermState};
use crate::terms::{SeekStatus, TermsEnum};

use super::{FieldReader, TermData, TermOutputs};

/// Walks a field's transducer in term order.
///
/// Supports exact and ceiling seeks, plus a deferred re-seek from a
/// previously captured term/state pair: `seek_exact_state` only copies the
/// state, and the transducer is re-synchronized lazily on the next call to
/// `next`. This avoids a redundant traversal when callers repeatedly resume
/// from saved positions.
pub struct SegmentTermsEnum {
    reader: Arc<FieldReader>,
    cursor: FstCursor<TermOutputs>,
    term: Option<Vec<u8>>,
    data: Option<TermData>,
    state: TermState,
    decoded: bool,
    seek_pending: bool,
}

impl SegmentTermsEnum {
    pub(crate) fn new(reader: Arc<FieldReader>) -> Self {
        let cursor = FstCursor::new(Arc::clone(reader.transducer()));
        SegmentTermsEnum {
            reader,
            cursor,
            term: None,
            data: None,
            state: TermState::default(),
            decoded: false,
            seek_pending: false,
        }
    }

    // Adopt the cursor's current term and fetched metadata.
    fn on_positioned(&mut self) -> Result<()> {
        let term = self
            .cursor
            .key()
            .ok_or_else(|| CrocusError::illegal_state("cursor reported no current term"))?
            .to_vec();
        let data = self.cursor.output().cloned().ok_or_else(|| {
            CrocusError::corrupt(format!(
                "field {:?}: term {term:?} has no metadata",
                self.reader.field_info().name
            ))
        })?;
        self.reader.stats_into(&data, &mut self.state);
        self.term = Some(term);
        self.data = Some(data);
        self.decoded = false;
        Ok(())
    }

    fn clear_position(&mut self) {
        self.term = None;
        self.data = None;
        self.decoded = false;
    }

    fn require_positioned(&self) -> Result<()> {
        if self.term.is_none() {
            return Err(CrocusError::illegal_state(
                "enumerator is not positioned on a term",
            ));
        }
        Ok(())
    }
}

impl TermsEnum for SegmentTermsEnum {
    fn next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.seek_pending {
            // resolve the deferred seek before advancing; it must land
            // exactly on the saved term
            let target = self
                .term
                .clone()
                .ok_or_else(|| CrocusError::illegal_state("pending seek without a term"))?;
            if self.cursor.seek_ceil(&target) != CursorSeek::Exact {
                return Err(CrocusError::illegal_state(format!(
                    "deferred seek did not land on saved term {target:?}"
                )));
            }
            self.seek_pending = false;
        }
        match self.cursor.next() {
            Some(_) => {
                self.on_positioned()?;
                Ok(self.term.clone())
            }
            None => {
                self.clear_position();
                Ok(None)
            }
        }
    }

    fn term(&self) -> Option<&[u8]> {
        self.term.as_deref()
    }

    fn doc_freq(&self) -> Result<u32> {
        self.require_positioned()?;
        Ok(self.state.doc_freq)
    }

    fn total_term_freq(&self) -> Result<u64> {
        self.require_positioned()?;
        Ok(self.state.total_term_freq)
    }

    fn decode_metadata(&mut self) -> Result<()> {
        self.require_positioned()?;
        if self.decoded || self.seek_pending {
            // a pending seek carries a fully decoded captured state
            return Ok(());
        }
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| CrocusError::illegal_state("positioned term without metadata"))?;
        self.reader.decode(data, &mut self.state)?;
        self.decoded = true;
        Ok(())
    }

    fn term_state(&mut self) -> Result<TermState> {
        self.decode_metadata()?;
        Ok(self.state.clone())
    }

    fn postings(&mut self, live_docs: Option<&BitVec>) -> Result<Box<dyn PostingsIterator>> {
        self.decode_metadata()?;
        self.reader
            .codec()
            .postings(self.reader.field_info(), &self.state, live_docs)
    }

    fn postings_with_positions(
        &mut self,
        live_docs: Option<&BitVec>,
    ) -> Result<Box<dyn PostingsIterator>> {
        self.decode_metadata()?;
        self.reader
            .codec()
            .postings_with_positions(self.reader.field_info(), &self.state, live_docs)
    }

    fn seek_exact(&mut self, target: &[u8]) -> Result<bool> {
        self.seek_pending = false;
        if self.cursor.seek_exact(target) {
            self.on_positioned()?;
            Ok(true)
        } else {
            self.clear_position();
            Ok(false)
        }
    }

    fn seek_ceil(&mut self, target: &[u8]) -> Result<SeekStatus> {
        self.seek_pending = false;
        match self.cursor.seek_ceil(target) {
            CursorSeek::Exact => {
                self.on_positioned()?;
                Ok(SeekStatus::Found)
            }
            CursorSeek::Greater => {
                self.on_positioned()?;
                Ok(SeekStatus::NotFound)
            }
            CursorSeek::End => {
                self.clear_position();
                Ok(SeekStatus::End)
            }
        }
    }

    fn seek_exact_state(&mut self, target: &[u8], state: &TermState) -> Result<()> {
        if self.term.as_deref() == Some(target) {
            return Ok(());
        }
        // cheap re-positioning: copy the captured state now, touch the
        // transducer only on the next call to next()
        self.state = state.clone();
        self.term = Some(target.to_vec());
        self.data = None;
        self.decoded = true;
        self.seek_pending = true;
        Ok(())
    }

    fn ord(&self) -> Result<u64> {
        Err(CrocusError::unsupported(
            "FST term dictionary has no term ordinals",
        ))
    }

    fn seek_exact_ord(&mut self, _ord: u64) -> Result<()> {
        Err(CrocusError::unsupported(
            "FST term dictionary has no term ordinals",
        ))
    }
}
