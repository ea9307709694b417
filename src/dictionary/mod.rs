//! FST-backed term dictionary reader.
//!
//! The dictionary file holds, per field, summary statistics and a transducer
//! mapping every term's bytes to its posting-list metadata. Opening the file
//! validates the header, the whole-file checksum and the per-field
//! statistics invariants, then materializes everything in memory; the
//! resulting [`TermDictionary`] is immutable and cheap to share. Terms are
//! read back through two enumerator strategies: a sequential/seeking walk
//! ([`SegmentTermsEnum`]) and an automaton intersection
//! ([`IntersectTermsEnum`]).

pub mod intersect;
pub mod segment;

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::automaton::Automaton;
use crate::error::{CrocusError, Result};
use crate::field_info::{FieldInfo, FieldInfos};
use crate::format::{self, FOOTER_LENGTH};
use crate::fst::{Outputs, Transducer};
use crate::input::{IndexInput, write_byte_string, write_vint, write_vlong};
use crate::postings::{PostingsCodec, TermState};

pub use intersect::IntersectTermsEnum;
pub use segment::SegmentTermsEnum;

/// Codec name in the file header.
pub const TERMS_CODEC_NAME: &str = "CrocusTermsDict";

/// Initial format version.
pub const VERSION_START: u32 = 0;

/// Version from which files carry a checksum footer.
pub const VERSION_CHECKSUM: u32 = 1;

/// Current format version.
pub const VERSION_CURRENT: u32 = VERSION_CHECKSUM;

/// Per-term metadata carried as transducer output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermData {
    /// Number of documents containing the term; zero on non-final arc
    /// fragments that carry only partial metadata.
    pub doc_freq: u32,
    /// Total occurrences; equals `doc_freq` when the field stores no
    /// frequencies.
    pub total_term_freq: u64,
    /// Fixed-width metadata for the postings codec.
    pub longs: Vec<u64>,
    /// Opaque variable-width metadata for the postings codec.
    pub bytes: Vec<u8>,
}

/// Output algebra for [`TermData`], parameterized by the owning field.
#[derive(Debug, Clone)]
pub struct TermOutputs {
    longs_size: usize,
    has_freqs: bool,
}

impl TermOutputs {
    /// Create the algebra for a field.
    pub fn new(longs_size: usize, has_freqs: bool) -> Self {
        TermOutputs {
            longs_size,
            has_freqs,
        }
    }
}

impl Outputs for TermOutputs {
    type Value = TermData;

    fn read(&self, input: &mut dyn IndexInput) -> Result<TermData> {
        let doc_freq = input.read_vint()?;
        let total_term_freq = if self.has_freqs {
            u64::from(doc_freq) + input.read_vlong()?
        } else {
            u64::from(doc_freq)
        };
        let mut longs = Vec::with_capacity(self.longs_size);
        for _ in 0..self.longs_size {
            longs.push(input.read_vlong()?);
        }
        let bytes = input.read_byte_string()?;
        Ok(TermData {
            doc_freq,
            total_term_freq,
            longs,
            bytes,
        })
    }

    fn write(&self, value: &TermData, out: &mut Vec<u8>) {
        write_vint(out, value.doc_freq);
        if self.has_freqs {
            write_vlong(out, value.total_term_freq - u64::from(value.doc_freq));
        }
        debug_assert_eq!(value.longs.len(), self.longs_size);
        for &long in &value.longs {
            write_vlong(out, long);
        }
        write_byte_string(out, &value.bytes);
    }

    fn combine(&self, prefix: &TermData, suffix: &TermData) -> TermData {
        let mut longs = vec![0u64; prefix.longs.len().max(suffix.longs.len())];
        for (i, slot) in longs.iter_mut().enumerate() {
            *slot = prefix.longs.get(i).copied().unwrap_or(0)
                + suffix.longs.get(i).copied().unwrap_or(0);
        }
        let mut bytes = Vec::with_capacity(prefix.bytes.len() + suffix.bytes.len());
        bytes.extend_from_slice(&prefix.bytes);
        bytes.extend_from_slice(&suffix.bytes);
        // stats live on the arc ending the term; prefer the suffix side
        let (doc_freq, total_term_freq) = if suffix.doc_freq > 0 {
            (suffix.doc_freq, suffix.total_term_freq)
        } else {
            (prefix.doc_freq, prefix.total_term_freq)
        };
        TermData {
            doc_freq,
            total_term_freq,
            longs,
            bytes,
        }
    }
}

/// One field's entry in the dictionary: statistics plus its transducer.
pub struct FieldReader {
    field: FieldInfo,
    num_terms: u64,
    sum_total_term_freq: i64,
    sum_doc_freq: u64,
    doc_count: u32,
    longs_size: u32,
    fst: Arc<Transducer<TermOutputs>>,
    codec: Arc<dyn PostingsCodec>,
}

impl FieldReader {
    /// Field metadata from the segment catalog.
    pub fn field_info(&self) -> &FieldInfo {
        &self.field
    }

    /// Number of distinct terms in the field.
    pub fn num_terms(&self) -> u64 {
        self.num_terms
    }

    /// Sum of `total_term_freq` over all terms, or `-1` when the field
    /// stores no frequencies.
    pub fn sum_total_term_freq(&self) -> i64 {
        self.sum_total_term_freq
    }

    /// Sum of `doc_freq` over all terms.
    pub fn sum_doc_freq(&self) -> u64 {
        self.sum_doc_freq
    }

    /// Number of documents with at least one term in the field.
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Number of metadata longs accompanying each term.
    pub fn longs_size(&self) -> u32 {
        self.longs_size
    }

    /// Whether the field stores per-term frequencies.
    pub fn has_freqs(&self) -> bool {
        self.field.index_options.has_freqs()
    }

    /// Whether the field stores positions.
    pub fn has_positions(&self) -> bool {
        self.field.index_options.has_positions()
    }

    /// Sequential/seeking enumerator over all terms.
    pub fn iterator(self: &Arc<Self>) -> Result<SegmentTermsEnum> {
        Ok(SegmentTermsEnum::new(Arc::clone(self)))
    }

    /// Enumerator over the terms accepted by `automaton`, positioned after
    /// `start_term` when one is given.
    pub fn intersect(
        self: &Arc<Self>,
        automaton: Arc<dyn Automaton>,
        start_term: Option<&[u8]>,
    ) -> Result<IntersectTermsEnum> {
        Ok(IntersectTermsEnum::new(
            Arc::clone(self),
            automaton,
            start_term,
        ))
    }

    pub(crate) fn transducer(&self) -> &Arc<Transducer<TermOutputs>> {
        &self.fst
    }

    pub(crate) fn codec(&self) -> &Arc<dyn PostingsCodec> {
        &self.codec
    }

    // Copy the cheap statistics of a fetched term into the enumerator state
    // without running the codec.
    pub(crate) fn stats_into(&self, data: &TermData, state: &mut TermState) {
        state.doc_freq = data.doc_freq;
        state.total_term_freq = data.total_term_freq;
    }

    // Full decode of a term's metadata through the postings codec.
    pub(crate) fn decode(&self, data: &TermData, state: &mut TermState) -> Result<()> {
        self.stats_into(data, state);
        self.codec
            .decode_term(&data.longs, &data.bytes, &self.field, state, true)
    }
}

impl std::fmt::Debug for FieldReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldReader")
            .field("field", &self.field.name)
            .field("num_terms", &self.num_terms)
            .field("sum_doc_freq", &self.sum_doc_freq)
            .field("doc_count", &self.doc_count)
            .finish()
    }
}

// Field entry decoded from the directory, before the shared codec handle
// exists.
struct RawFieldEntry {
    field: FieldInfo,
    num_terms: u64,
    sum_total_term_freq: i64,
    sum_doc_freq: u64,
    doc_count: u32,
    longs_size: u32,
    fst: Transducer<TermOutputs>,
}

/// The open term dictionary: one immutable [`FieldReader`] per field.
pub struct TermDictionary {
    fields: BTreeMap<String, Arc<FieldReader>>,
    codec: Arc<dyn PostingsCodec>,
    version: u32,
}

impl TermDictionary {
    /// Open a dictionary file.
    ///
    /// `field_infos` is the segment's field catalog, `max_doc` its document
    /// count. The input is consumed: once every transducer is materialized
    /// in memory the stream is released, on the error path as well.
    pub fn open(
        mut input: Box<dyn IndexInput>,
        field_infos: &FieldInfos,
        max_doc: u32,
        mut codec: Box<dyn PostingsCodec>,
    ) -> Result<Self> {
        let loaded = Self::load(&mut *input, field_infos, max_doc, &mut *codec);
        // the stream is dropped on both paths; transducers are memory-resident
        drop(input);
        let (raw_fields, version) = loaded?;
        let codec: Arc<dyn PostingsCodec> = Arc::from(codec);
        let mut fields: BTreeMap<String, Arc<FieldReader>> = BTreeMap::new();
        for raw in raw_fields {
            fields.insert(
                raw.field.name.clone(),
                Arc::new(FieldReader {
                    field: raw.field,
                    num_terms: raw.num_terms,
                    sum_total_term_freq: raw.sum_total_term_freq,
                    sum_doc_freq: raw.sum_doc_freq,
                    doc_count: raw.doc_count,
                    longs_size: raw.longs_size,
                    fst: Arc::new(raw.fst),
                    codec: Arc::clone(&codec),
                }),
            );
        }
        debug!(
            "opened term dictionary: version={version} fields={}",
            fields.len()
        );
        Ok(TermDictionary {
            fields,
            codec,
            version,
        })
    }

    fn load(
        input: &mut dyn IndexInput,
        field_infos: &FieldInfos,
        max_doc: u32,
        codec: &mut dyn PostingsCodec,
    ) -> Result<(Vec<RawFieldEntry>, u32)> {
        let version = format::check_header(input, TERMS_CODEC_NAME, VERSION_START, VERSION_CURRENT)?;
        if version >= VERSION_CHECKSUM {
            format::check_footer(input)?;
        }
        codec.init(input)?;

        // back-pointer to the field directory, 8 bytes before EOF (before
        // the footer when one is present)
        let trailer = if version >= VERSION_CHECKSUM {
            FOOTER_LENGTH + 8
        } else {
            8
        };
        if input.len() < trailer {
            return Err(CrocusError::corrupt(format!(
                "file too short for directory pointer: {} bytes",
                input.len()
            )));
        }
        input.seek(input.len() - trailer)?;
        let dir_offset = input.read_u64()?;
        input.seek(dir_offset)?;

        let field_count = input.read_vint()?;
        let mut fields: Vec<RawFieldEntry> = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let number = input.read_vint()?;
            let field = field_infos.by_number(number).ok_or_else(|| {
                CrocusError::corrupt(format!("unknown field number in directory: {number}"))
            })?;
            let num_terms = input.read_vlong()?;
            let sum_total_term_freq = if field.index_options.has_freqs() {
                i64::try_from(input.read_vlong()?).map_err(|_| {
                    CrocusError::corrupt(format!(
                        "field {:?}: sum_total_term_freq out of range",
                        field.name
                    ))
                })?
            } else {
                -1
            };
            let sum_doc_freq = input.read_vlong()?;
            let doc_count = input.read_vint()?;
            let longs_size = input.read_vint()?;
            let outputs = TermOutputs::new(longs_size as usize, field.index_options.has_freqs());
            let fst = Transducer::read(input, outputs)?;

            Self::check_field_stats(
                field,
                num_terms,
                sum_total_term_freq,
                sum_doc_freq,
                doc_count,
                max_doc,
            )?;
            if fields.iter().any(|entry| entry.field.name == field.name) {
                return Err(CrocusError::corrupt(format!(
                    "duplicate field in directory: {:?}",
                    field.name
                )));
            }
            debug!(
                "loaded field {:?}: num_terms={num_terms} sum_doc_freq={sum_doc_freq} doc_count={doc_count}",
                field.name
            );
            fields.push(RawFieldEntry {
                field: field.clone(),
                num_terms,
                sum_total_term_freq,
                sum_doc_freq,
                doc_count,
                longs_size,
                fst,
            });
        }
        Ok((fields, version))
    }

    fn check_field_stats(
        field: &FieldInfo,
        num_terms: u64,
        sum_total_term_freq: i64,
        sum_doc_freq: u64,
        doc_count: u32,
        max_doc: u32,
    ) -> Result<()> {
        if num_terms == 0 {
            return Err(CrocusError::corrupt(format!(
                "field {:?}: empty term dictionary",
                field.name
            )));
        }
        if doc_count > max_doc {
            return Err(CrocusError::corrupt(format!(
                "field {:?}: doc_count {doc_count} exceeds max_doc {max_doc}",
                field.name
            )));
        }
        if sum_doc_freq < u64::from(doc_count) {
            return Err(CrocusError::corrupt(format!(
                "field {:?}: sum_doc_freq {sum_doc_freq} below doc_count {doc_count}",
                field.name
            )));
        }
        if sum_total_term_freq != -1 && (sum_total_term_freq as u64) < sum_doc_freq {
            return Err(CrocusError::corrupt(format!(
                "field {:?}: sum_total_term_freq {sum_total_term_freq} below sum_doc_freq {sum_doc_freq}",
                field.name
            )));
        }
        Ok(())
    }

    /// Look up a field's reader by name.
    pub fn field(&self, name: &str) -> Option<Arc<FieldReader>> {
        self.fields.get(name).cloned()
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the dictionary has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Format version the file was written with.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Verify postings-codec integrity. The dictionary file's own checksum
    /// is verified at open time.
    pub fn check_integrity(&self) -> Result<()> {
        self.codec.check_integrity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::BytesInput;

    fn data(doc_freq: u32, ttf: u64, longs: Vec<u64>, bytes: Vec<u8>) -> TermData {
        TermData {
            doc_freq,
            total_term_freq: ttf,
            longs,
            bytes,
        }
    }

    #[test]
    fn test_term_outputs_round_trip() {
        let outputs = TermOutputs::new(2, true);
        let value = data(3, 7, vec![10, 0], vec![1, 2, 3]);
        let mut buf = Vec::new();
        outputs.write(&value, &mut buf);
        let mut input = BytesInput::new(buf);
        assert_eq!(outputs.read(&mut input).unwrap(), value);
        assert_eq!(input.position(), input.len());
    }

    #[test]
    fn test_term_outputs_without_freqs() {
        let outputs = TermOutputs::new(1, false);
        let value = data(4, 4, vec![9], Vec::new());
        let mut buf = Vec::new();
        outputs.write(&value, &mut buf);
        let mut input = BytesInput::new(buf);
        let back = outputs.read(&mut input).unwrap();
        // total_term_freq falls back to doc_freq
        assert_eq!(back.total_term_freq, 4);
        assert_eq!(back, value);
    }

    #[test]
    fn test_term_outputs_combine() {
        let outputs = TermOutputs::new(2, true);
        let prefix = data(0, 0, vec![5, 1], vec![0xAA]);
        let suffix = data(2, 6, vec![3, 0], vec![0xBB]);
        let combined = outputs.combine(&prefix, &suffix);
        // longs sum pairwise, bytes concatenate, stats come from the
        // term-ending side
        assert_eq!(combined.longs, vec![8, 1]);
        assert_eq!(combined.bytes, vec![0xAA, 0xBB]);
        assert_eq!(combined.doc_freq, 2);
        assert_eq!(combined.total_term_freq, 6);
    }
}
