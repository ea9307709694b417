//! Byte transducer backing the term dictionary.
//!
//! A [`Transducer`] maps byte strings to output values: arcs are labeled with
//! bytes, each arc optionally carries an output, and the value of a complete
//! key is the combination of all arc outputs along its path. Absence of an
//! output is modelled as `Option::None`, which doubles as the identity
//! element of the combine algebra.
//!
//! The structure is immutable and fully memory-resident once decoded. A
//! [`Builder`] accepts keys in strictly increasing order and serializes the
//! result; [`FstCursor`] walks a decoded transducer in lexicographic order
//! with per-level output accumulation.

use std::sync::Arc;

use crate::error::{CrocusError, Result};
use crate::input::{IndexInput, write_vint};

/// Output algebra for transducer arc values.
///
/// Implementations are instance-based so that decoding can depend on
/// per-field parameters (e.g. how many metadata longs accompany each term).
/// `combine` must be associative.
pub trait Outputs: Send + Sync {
    /// The output value type.
    type Value: Clone + std::fmt::Debug;

    /// Decode one output value from the input.
    fn read(&self, input: &mut dyn IndexInput) -> Result<Self::Value>;

    /// Encode one output value.
    fn write(&self, value: &Self::Value, out: &mut Vec<u8>);

    /// Combine the output accumulated over a prefix with the output of the
    /// next arc on the path.
    fn combine(&self, prefix: &Self::Value, suffix: &Self::Value) -> Self::Value;
}

/// Combine two optional outputs, treating `None` as the identity.
pub fn combine_opt<O: Outputs>(
    outputs: &O,
    prefix: &Option<O::Value>,
    suffix: &Option<O::Value>,
) -> Option<O::Value> {
    match (prefix, suffix) {
        (Some(p), Some(s)) => Some(outputs.combine(p, s)),
        (Some(p), None) => Some(p.clone()),
        (None, Some(s)) => Some(s.clone()),
        (None, None) => None,
    }
}

/// One labeled edge of the transducer.
#[derive(Debug, Clone)]
pub struct TransArc<V> {
    /// Byte label of the arc.
    pub label: u8,
    /// Index of the node this arc leads to.
    pub target: u32,
    /// Whether a key ends on this arc.
    pub is_final: bool,
    /// Output carried by the arc, if any.
    pub output: Option<V>,
}

const ARC_FLAG_FINAL: u8 = 0x01;
const ARC_FLAG_HAS_OUTPUT: u8 = 0x02;

/// Immutable byte transducer with label-sorted arcs per node.
pub struct Transducer<O: Outputs> {
    outputs: O,
    // (first arc index, arc count) per node
    nodes: Vec<(u32, u32)>,
    arcs: Vec<TransArc<O::Value>>,
    root: u32,
    empty_output: Option<O::Value>,
}

impl<O: Outputs> Transducer<O> {
    /// Decode a serialized transducer from the input at its current position.
    pub fn read(input: &mut dyn IndexInput, outputs: O) -> Result<Self> {
        let node_count = input.read_vint()? as usize;
        // each node costs at least its arc-count byte, so the count cannot
        // exceed what is left of the input
        let remaining = input.len() - input.position();
        if node_count as u64 > remaining {
            return Err(CrocusError::corrupt(format!(
                "transducer node count {node_count} exceeds remaining input ({remaining} bytes)"
            )));
        }
        let mut nodes = Vec::with_capacity(node_count);
        let mut arcs = Vec::new();
        for node_idx in 0..node_count {
            let arc_count = input.read_vint()? as usize;
            let start = arcs.len() as u32;
            let mut prev_label: Option<u8> = None;
            for _ in 0..arc_count {
                let label = input.read_u8()?;
                if let Some(prev) = prev_label
                    && label <= prev
                {
                    return Err(CrocusError::corrupt(format!(
                        "transducer arcs out of order at node {node_idx}: {prev} then {label}"
                    )));
                }
                prev_label = Some(label);
                let flags = input.read_u8()?;
                let target = input.read_vint()?;
                if target as usize >= node_idx {
                    return Err(CrocusError::corrupt(format!(
                        "transducer arc target {target} not below node {node_idx}"
                    )));
                }
                let output = if flags & ARC_FLAG_HAS_OUTPUT != 0 {
                    Some(outputs.read(input)?)
                } else {
                    None
                };
                arcs.push(TransArc {
                    label,
                    target,
                    is_final: flags & ARC_FLAG_FINAL != 0,
                    output,
                });
            }
            nodes.push((start, arc_count as u32));
        }
        let root = input.read_vint()?;
        if node_count == 0 || root as usize != node_count - 1 {
            return Err(CrocusError::corrupt(format!(
                "transducer root {root} does not match node count {node_count}"
            )));
        }
        let empty_output = if input.read_u8()? != 0 {
            Some(outputs.read(input)?)
        } else {
            None
        };
        // every path must end on a final arc; a non-final arc into an
        // arcless node would strand the cursor
        for arc in &arcs {
            if !arc.is_final && nodes[arc.target as usize].1 == 0 {
                return Err(CrocusError::corrupt(format!(
                    "non-final arc {:#04x} leads to a node with no arcs",
                    arc.label
                )));
            }
        }
        Ok(Transducer {
            outputs,
            nodes,
            arcs,
            root,
            empty_output,
        })
    }

    /// Root node of the transducer.
    pub fn root(&self) -> u32 {
        self.root
    }

    /// The output algebra this transducer was decoded with.
    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    /// Output of the empty key, if the empty key is accepted.
    pub fn empty_output(&self) -> Option<&O::Value> {
        self.empty_output.as_ref()
    }

    /// Number of outgoing arcs at a node.
    pub fn num_arcs(&self, node: u32) -> usize {
        self.nodes[node as usize].1 as usize
    }

    /// Outgoing arc at the given position within a node, in label order.
    pub fn arc(&self, node: u32, idx: usize) -> &TransArc<O::Value> {
        let (start, len) = self.nodes[node as usize];
        debug_assert!(idx < len as usize);
        &self.arcs[start as usize + idx]
    }

    /// Position of the arc with the exact label, if present.
    pub fn find_arc(&self, node: u32, label: u8) -> Option<usize> {
        let (start, len) = self.nodes[node as usize];
        let slice = &self.arcs[start as usize..(start + len) as usize];
        slice.binary_search_by_key(&label, |arc| arc.label).ok()
    }

    /// Position of the smallest arc with label greater than or equal to the
    /// given byte, if one exists.
    pub fn ceil_arc(&self, node: u32, label: u8) -> Option<usize> {
        let (start, len) = self.nodes[node as usize];
        let slice = &self.arcs[start as usize..(start + len) as usize];
        let idx = slice.partition_point(|arc| arc.label < label);
        (idx < len as usize).then_some(idx)
    }
}

impl<O: Outputs> std::fmt::Debug for Transducer<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transducer")
            .field("nodes", &self.nodes.len())
            .field("arcs", &self.arcs.len())
            .field("accepts_empty", &self.empty_output.is_some())
            .finish()
    }
}

struct BuildArc<V> {
    label: u8,
    target: u32,
    is_final: bool,
    output: Option<V>,
}

/// Builds a transducer from keys inserted in strictly increasing byte order.
pub struct Builder<O: Outputs> {
    outputs: O,
    // node 0 is the root; children always have larger indices than parents
    nodes: Vec<Vec<BuildArc<O::Value>>>,
    last_key: Option<Vec<u8>>,
    empty_output: Option<O::Value>,
}

impl<O: Outputs> Builder<O> {
    /// Create an empty builder.
    pub fn new(outputs: O) -> Self {
        Builder {
            outputs,
            nodes: vec![Vec::new()],
            last_key: None,
            empty_output: None,
        }
    }

    /// Insert a key with its output. Keys must arrive in strictly increasing
    /// order; the empty key is allowed as the first insertion.
    pub fn insert(&mut self, key: &[u8], value: O::Value) -> Result<()> {
        if let Some(last) = &self.last_key
            && key <= last.as_slice()
        {
            return Err(CrocusError::invalid_argument(format!(
                "keys must be inserted in strictly increasing order: {key:?} after {last:?}"
            )));
        }
        self.last_key = Some(key.to_vec());
        if key.is_empty() {
            self.empty_output = Some(value);
            return Ok(());
        }
        let mut node = 0u32;
        for &byte in &key[..key.len() - 1] {
            node = self.child(node, byte);
        }
        self.child(node, key[key.len() - 1]);
        let arc = self.nodes[node as usize]
            .last_mut()
            .ok_or_else(|| CrocusError::illegal_state("builder lost its own path"))?;
        arc.is_final = true;
        arc.output = Some(value);
        Ok(())
    }

    // Follow the arc labeled `byte` out of `node`, creating it (and a fresh
    // child node) if absent. Sorted insertion means only the last arc can
    // ever match.
    fn child(&mut self, node: u32, byte: u8) -> u32 {
        if let Some(arc) = self.nodes[node as usize].last()
            && arc.label == byte
        {
            return arc.target;
        }
        let child = self.nodes.len() as u32;
        self.nodes.push(Vec::new());
        self.nodes[node as usize].push(BuildArc {
            label: byte,
            target: child,
            is_final: false,
            output: None,
        });
        child
    }

    /// Serialize the transducer. Children are emitted before their parents so
    /// the decoder can resolve targets in one pass; the root comes last.
    pub fn into_bytes(self) -> Vec<u8> {
        let node_count = self.nodes.len();
        let mut out = Vec::new();
        write_vint(&mut out, node_count as u32);
        // builder index i becomes serialized index node_count - 1 - i
        for node in self.nodes.iter().rev() {
            write_vint(&mut out, node.len() as u32);
            for arc in node {
                out.push(arc.label);
                let mut flags = 0u8;
                if arc.is_final {
                    flags |= ARC_FLAG_FINAL;
                }
                if arc.output.is_some() {
                    flags |= ARC_FLAG_HAS_OUTPUT;
                }
                out.push(flags);
                write_vint(&mut out, (node_count as u32 - 1) - arc.target);
                if let Some(output) = &arc.output {
                    self.outputs.write(output, &mut out);
                }
            }
        }
        write_vint(&mut out, node_count as u32 - 1);
        match &self.empty_output {
            Some(output) => {
                out.push(1);
                self.outputs.write(output, &mut out);
            }
            None => out.push(0),
        }
        out
    }
}

/// Result of a ceiling seek on a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorSeek {
    /// Landed exactly on the target key.
    Exact,
    /// Landed on the smallest key greater than the target.
    Greater,
    /// No key at or above the target exists.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Start,
    AtEmptyKey,
    Positioned,
    Done,
}

/// Forward cursor over a transducer, yielding keys in lexicographic order
/// with lazily accumulated outputs.
pub struct FstCursor<O: Outputs> {
    fst: Arc<Transducer<O>>,
    // (node, arc index) per consumed byte
    frames: Vec<(u32, usize)>,
    key: Vec<u8>,
    // accumulated output through each level, parallel to `frames`
    outs: Vec<Option<O::Value>>,
    state: CursorState,
}

impl<O: Outputs> FstCursor<O> {
    /// Create a cursor positioned before the first key.
    pub fn new(fst: Arc<Transducer<O>>) -> Self {
        FstCursor {
            fst,
            frames: Vec::new(),
            key: Vec::new(),
            outs: Vec::new(),
            state: CursorState::Start,
        }
    }

    /// The current key, or `None` when unpositioned or exhausted.
    pub fn key(&self) -> Option<&[u8]> {
        match self.state {
            CursorState::AtEmptyKey => Some(&[]),
            CursorState::Positioned => Some(&self.key),
            _ => None,
        }
    }

    /// Accumulated output of the current key.
    pub fn output(&self) -> Option<&O::Value> {
        match self.state {
            CursorState::AtEmptyKey => self.fst.empty_output(),
            CursorState::Positioned => self.outs.last().and_then(|o| o.as_ref()),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.frames.clear();
        self.key.clear();
        self.outs.clear();
        self.state = CursorState::Start;
    }

    fn push(&mut self, node: u32, idx: usize) {
        let arc = self.fst.arc(node, idx);
        let prev = self.outs.last().cloned().unwrap_or(None);
        self.outs
            .push(combine_opt(self.fst.outputs(), &prev, &arc.output));
        self.key.push(arc.label);
        self.frames.push((node, idx));
    }

    fn replace_top(&mut self, idx: usize) {
        let (node, _) = self.frames.pop().expect("replace_top on empty stack");
        self.key.pop();
        self.outs.pop();
        self.push(node, idx);
    }

    fn pop(&mut self) {
        self.frames.pop();
        self.key.pop();
        self.outs.pop();
    }

    fn top_arc(&self) -> &TransArc<O::Value> {
        let (node, idx) = *self.frames.last().expect("top_arc on empty stack");
        self.fst.arc(node, idx)
    }

    // Position on the next arc in pre-order after the current one.
    fn move_next(&mut self) -> bool {
        let target = self.top_arc().target;
        if self.fst.num_arcs(target) > 0 {
            self.push(target, 0);
            return true;
        }
        loop {
            let (node, idx) = *self.frames.last().expect("move_next on empty stack");
            if idx + 1 < self.fst.num_arcs(node) {
                self.replace_top(idx + 1);
                return true;
            }
            self.pop();
            if self.frames.is_empty() {
                return false;
            }
        }
    }

    // From the current top arc, descend along first arcs to the nearest
    // key-ending arc. The top arc itself counts.
    fn descend_to_first_final(&mut self) {
        loop {
            let arc = self.top_arc();
            if arc.is_final {
                self.state = CursorState::Positioned;
                return;
            }
            let target = arc.target;
            debug_assert!(self.fst.num_arcs(target) > 0, "non-final leaf arc");
            self.push(target, 0);
        }
    }

    /// Advance to the next key in lexicographic order.
    pub fn next(&mut self) -> Option<&[u8]> {
        match self.state {
            CursorState::Done => return None,
            CursorState::Start => {
                if self.fst.empty_output().is_some() {
                    self.state = CursorState::AtEmptyKey;
                    return Some(&[]);
                }
                let root = self.fst.root();
                if self.fst.num_arcs(root) == 0 {
                    self.state = CursorState::Done;
                    return None;
                }
                self.push(root, 0);
                self.descend_to_first_final();
                return Some(&self.key);
            }
            CursorState::AtEmptyKey => {
                let root = self.fst.root();
                if self.fst.num_arcs(root) == 0 {
                    self.state = CursorState::Done;
                    return None;
                }
                self.push(root, 0);
                self.descend_to_first_final();
                return Some(&self.key);
            }
            CursorState::Positioned => {}
        }
        loop {
            if !self.move_next() {
                self.state = CursorState::Done;
                return None;
            }
            if self.top_arc().is_final {
                self.state = CursorState::Positioned;
                return Some(&self.key);
            }
        }
    }

    /// Position exactly on `target`. On failure the cursor is unpositioned
    /// (as if freshly created).
    pub fn seek_exact(&mut self, target: &[u8]) -> bool {
        self.reset();
        if target.is_empty() {
            if self.fst.empty_output().is_some() {
                self.state = CursorState::AtEmptyKey;
                return true;
            }
            return false;
        }
        let mut node = self.fst.root();
        for &byte in target {
            match self.fst.find_arc(node, byte) {
                Some(idx) => {
                    self.push(node, idx);
                    node = self.top_arc().target;
                }
                None => {
                    self.reset();
                    return false;
                }
            }
        }
        if self.top_arc().is_final {
            self.state = CursorState::Positioned;
            true
        } else {
            self.reset();
            false
        }
    }

    /// Position on the smallest key greater than or equal to `target`.
    pub fn seek_ceil(&mut self, target: &[u8]) -> CursorSeek {
        self.reset();
        if target.is_empty() {
            if self.fst.empty_output().is_some() {
                self.state = CursorState::AtEmptyKey;
                return CursorSeek::Exact;
            }
            let root = self.fst.root();
            if self.fst.num_arcs(root) == 0 {
                self.state = CursorState::Done;
                return CursorSeek::End;
            }
            self.push(root, 0);
            self.descend_to_first_final();
            return CursorSeek::Greater;
        }
        let mut node = self.fst.root();
        for &byte in target {
            match self.fst.ceil_arc(node, byte) {
                Some(idx) => {
                    self.push(node, idx);
                    if self.top_arc().label != byte {
                        self.descend_to_first_final();
                        return CursorSeek::Greater;
                    }
                    node = self.top_arc().target;
                }
                None => {
                    // exhausted this node; advance a shallower level
                    loop {
                        if self.frames.is_empty() {
                            self.state = CursorState::Done;
                            return CursorSeek::End;
                        }
                        let (n, idx) = *self.frames.last().expect("checked non-empty");
                        if idx + 1 < self.fst.num_arcs(n) {
                            self.replace_top(idx + 1);
                            self.descend_to_first_final();
                            return CursorSeek::Greater;
                        }
                        self.pop();
                    }
                }
            }
        }
        if self.top_arc().is_final {
            self.state = CursorState::Positioned;
            CursorSeek::Exact
        } else {
            // target is a proper prefix of stored keys
            self.descend_to_first_final();
            CursorSeek::Greater
        }
    }
}
