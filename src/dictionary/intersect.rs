//! Automaton-intersecting term enumerator.

use std::sync::Arc;

use bit_vec::BitVec;

use crate::automaton::Automaton;
use crate::error::{CrocusError, Result};
use crate::fst::{Transducer, combine_opt};
use crate::postings::{PostingsIterator, TermState};
use crate::terms::{SeekStatus, TermsEnum};

use super::{FieldReader, TermData, TermOutputs};

// One level of the synchronized walk: the transducer arc consumed at this
// depth together with the automaton state reached through it.
struct Frame {
    // node the arc belongs to
    parent: u32,
    // position of the arc within the parent, in label order
    arc_idx: usize,
    // node the arc leads to
    target: u32,
    label: u8,
    is_final: bool,
    output: Option<TermData>,
    // automaton state after consuming `label`; frames only exist for
    // transitions the automaton allows
    fsa_state: u32,
    // accumulated output through this level, valid up to `meta_upto`
    prefix: Option<TermData>,
}

enum SeekOutcome {
    Landed,
    End,
}

/// Depth-first walk over the terms accepted by a byte automaton.
///
/// The transducer and the automaton advance in lockstep: a path is only
/// extended by arcs whose labels the automaton accepts, so rejected subtrees
/// are never visited. Output accumulation is lazy. Each frame caches the
/// combined output of its prefix and `meta_upto` marks how deep the cache is
/// valid, so backtracking over shared prefixes never recombines them.
///
/// Forward iteration only: every seek method fails with an
/// unsupported-operation error.
pub struct IntersectTermsEnum {
    reader: Arc<FieldReader>,
    fst: Arc<Transducer<TermOutputs>>,
    automaton: Arc<dyn Automaton>,
    // frame arena indexed by depth; frames[0] is the virtual root
    frames: Vec<Frame>,
    level: usize,
    // bytes of the current path, parallel to frames[1..=level]
    term_bytes: Vec<u8>,
    // deepest level whose cached prefix output is valid
    meta_upto: usize,
    state: TermState,
    data: Option<TermData>,
    // the current position is an accepted term not yet returned by next()
    pending: bool,
    positioned: bool,
    exhausted: bool,
    decoded: bool,
}

impl IntersectTermsEnum {
    pub(crate) fn new(
        reader: Arc<FieldReader>,
        automaton: Arc<dyn Automaton>,
        start_term: Option<&[u8]>,
    ) -> Self {
        let fst = Arc::clone(reader.transducer());
        let root = Frame {
            parent: fst.root(),
            arc_idx: 0,
            target: fst.root(),
            label: 0,
            is_final: fst.empty_output().is_some(),
            output: None,
            fsa_state: automaton.initial_state(),
            prefix: None,
        };
        let mut this = IntersectTermsEnum {
            reader,
            fst,
            automaton,
            frames: vec![root],
            level: 0,
            term_bytes: Vec::new(),
            meta_upto: 0,
            state: TermState::default(),
            data: None,
            pending: false,
            positioned: false,
            exhausted: false,
            decoded: false,
        };
        match start_term {
            None => this.pending = this.accepted(),
            Some(start) => match this.do_seek_ceil(start) {
                SeekOutcome::End => this.exhausted = true,
                // the start term itself was already consumed by the caller
                SeekOutcome::Landed => {
                    this.pending = this.accepted() && this.term_bytes.as_slice() != start;
                }
            },
        }
        this
    }

    fn accepted(&self) -> bool {
        let top = &self.frames[self.level];
        top.is_final && self.automaton.is_accept(top.fsa_state)
    }

    fn frame_for(&self, node: u32, arc_idx: usize, fsa_state: u32) -> Frame {
        let arc = self.fst.arc(node, arc_idx);
        Frame {
            parent: node,
            arc_idx,
            target: arc.target,
            label: arc.label,
            is_final: arc.is_final,
            output: arc.output.clone(),
            fsa_state,
            prefix: None,
        }
    }

    // Smallest arc out of the current target that the automaton accepts.
    fn expand(&self) -> Option<Frame> {
        let top = &self.frames[self.level];
        let node = top.target;
        for idx in 0..self.fst.num_arcs(node) {
            let label = self.fst.arc(node, idx).label;
            if let Some(next) = self.automaton.step(top.fsa_state, label) {
                return Some(self.frame_for(node, idx, next));
            }
        }
        None
    }

    // Smallest accepted sibling after the current top arc.
    fn advance_sibling(&self) -> Option<Frame> {
        let top = &self.frames[self.level];
        let parent_state = self.frames[self.level - 1].fsa_state;
        let node = top.parent;
        for idx in top.arc_idx + 1..self.fst.num_arcs(node) {
            let label = self.fst.arc(node, idx).label;
            if let Some(next) = self.automaton.step(parent_state, label) {
                return Some(self.frame_for(node, idx, next));
            }
        }
        None
    }

    // Smallest accepted arc with label >= `byte`, falling forward to larger
    // labels when the automaton rejects the ceiling arc itself.
    fn ceiling(&self, node: u32, fsa_state: u32, byte: u8) -> Option<Frame> {
        let start = self.fst.ceil_arc(node, byte)?;
        for idx in start..self.fst.num_arcs(node) {
            let label = self.fst.arc(node, idx).label;
            if let Some(next) = self.automaton.step(fsa_state, label) {
                return Some(self.frame_for(node, idx, next));
            }
        }
        None
    }

    fn push(&mut self, frame: Frame) {
        self.term_bytes.push(frame.label);
        self.level += 1;
        if self.level < self.frames.len() {
            self.frames[self.level] = frame;
        } else {
            self.frames.push(frame);
        }
    }

    fn replace_top(&mut self, frame: Frame) {
        self.term_bytes[self.level - 1] = frame.label;
        self.frames[self.level] = frame;
        self.meta_upto = self.meta_upto.min(self.level - 1);
    }

    fn pop(&mut self) {
        self.level -= 1;
        self.term_bytes.pop();
        self.meta_upto = self.meta_upto.min(self.level);
    }

    // Walk towards the smallest path >= `target` allowed by both machines.
    // Landed leaves the walk on a path that is either exactly `target` or
    // the root of the first subtree beyond it.
    fn do_seek_ceil(&mut self, target: &[u8]) -> SeekOutcome {
        for &byte in target {
            let top = &self.frames[self.level];
            let (node, fsa_state) = (top.target, top.fsa_state);
            if self.fst.num_arcs(node) == 0 {
                return self.unwind_for_seek();
            }
            match self.ceiling(node, fsa_state, byte) {
                Some(frame) => {
                    let overshot = frame.label > byte;
                    self.push(frame);
                    if overshot {
                        return SeekOutcome::Landed;
                    }
                }
                None => return self.unwind_for_seek(),
            }
        }
        SeekOutcome::Landed
    }

    fn unwind_for_seek(&mut self) -> SeekOutcome {
        loop {
            if self.level == 0 {
                return SeekOutcome::End;
            }
            if let Some(frame) = self.advance_sibling() {
                self.replace_top(frame);
                return SeekOutcome::Landed;
            }
            self.pop();
        }
    }

    // Fold arc outputs down to the current level and adopt the result as the
    // current term's metadata.
    fn emit(&mut self) -> Result<()> {
        let fst = Arc::clone(&self.fst);
        let outputs = fst.outputs();
        for i in self.meta_upto + 1..=self.level {
            let prev = self.frames[i - 1].prefix.clone();
            let frame = &mut self.frames[i];
            frame.prefix = combine_opt(outputs, &prev, &frame.output);
        }
        self.meta_upto = self.level;
        let data = if self.level == 0 {
            self.fst.empty_output().cloned()
        } else {
            self.frames[self.level].prefix.clone()
        };
        let data = data.ok_or_else(|| {
            CrocusError::corrupt(format!(
                "field {:?}: term {:?} has no metadata",
                self.reader.field_info().name,
                self.term_bytes
            ))
        })?;
        self.reader.stats_into(&data, &mut self.state);
        self.data = Some(data);
        self.decoded = false;
        self.positioned = true;
        Ok(())
    }

    fn require_positioned(&self) -> Result<()> {
        if !self.positioned {
            return Err(CrocusError::illegal_state(
                "enumerator is not positioned on a term",
            ));
        }
        Ok(())
    }

    fn unsupported_seek<T>() -> Result<T> {
        Err(CrocusError::unsupported(
            "intersecting enumerator only supports forward iteration",
        ))
    }
}

impl TermsEnum for IntersectTermsEnum {
    fn next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.pending {
            self.pending = false;
            self.emit()?;
            return Ok(Some(self.term_bytes.clone()));
        }
        loop {
            if let Some(frame) = self.expand() {
                self.push(frame);
            } else {
                loop {
                    if self.level == 0 {
                        self.exhausted = true;
                        self.positioned = false;
                        return Ok(None);
                    }
                    if let Some(frame) = self.advance_sibling() {
                        self.replace_top(frame);
                        break;
                    }
                    self.pop();
                }
            }
            if self.accepted() {
                self.emit()?;
                return Ok(Some(self.term_bytes.clone()));
            }
        }
    }

    fn term(&self) -> Option<&[u8]> {
        if self.positioned {
            Some(&self.term_bytes)
        } else {
            None
        }
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
        if self.decoded {
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

    fn seek_exact(&mut self, _target: &[u8]) -> Result<bool> {
        Self::unsupported_seek()
    }

    fn seek_ceil(&mut self, _target: &[u8]) -> Result<SeekStatus> {
        Self::unsupported_seek()
    }

    fn seek_exact_state(&mut self, _target: &[u8], _state: &TermState) -> Result<()> {
        Self::unsupported_seek()
    }

    fn ord(&self) -> Result<u64> {
        Self::unsupported_seek()
    }

    fn seek_exact_ord(&mut self, _ord: u64) -> Result<()> {
        Self::unsupported_seek()
    }
}
