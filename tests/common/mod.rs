#![allow(dead_code)]

use std::collections::BTreeSet;

use crocus::dictionary::{
    TERMS_CODEC_NAME, TermData, TermDictionary, TermOutputs, VERSION_CURRENT, VERSION_START,
};
use crocus::field_info::{FieldInfo, FieldInfos, IndexOptions};
use crocus::format;
use crocus::fst::Builder;
use crocus::input::{BytesInput, write_vint, write_vlong};
use crocus::postings::{INLINE_LONGS_SIZE, InlinePostingsCodec};

/// Sorted `(doc_id, freq, positions)` entries for one term.
pub type Postings = Vec<(u32, u32, Vec<u32>)>;

/// One field's content: terms must be sorted by their bytes.
pub struct FieldTerms {
    pub field: FieldInfo,
    pub terms: Vec<(Vec<u8>, Postings)>,
}

/// Explicit directory entry, for tests that need to write inconsistent
/// statistics.
pub struct RawField {
    pub number: u32,
    pub num_terms: u64,
    pub sum_total_term_freq: Option<u64>,
    pub sum_doc_freq: u64,
    pub doc_count: u32,
    pub fst_bytes: Vec<u8>,
}

fn write_directory(out: &mut Vec<u8>, fields: &[RawField]) {
    write_vint(out, fields.len() as u32);
    for field in fields {
        write_vint(out, field.number);
        write_vlong(out, field.num_terms);
        if let Some(sum_ttf) = field.sum_total_term_freq {
            write_vlong(out, sum_ttf);
        }
        write_vlong(out, field.sum_doc_freq);
        write_vint(out, field.doc_count);
        write_vint(out, INLINE_LONGS_SIZE as u32);
        out.extend_from_slice(&field.fst_bytes);
    }
}

/// Serialize a complete dictionary file from explicit directory entries.
pub fn write_dictionary_raw(fields: &[RawField]) -> Vec<u8> {
    let mut out = Vec::new();
    format::write_header(&mut out, TERMS_CODEC_NAME, VERSION_CURRENT);
    let dir_offset = out.len() as u64;
    write_directory(&mut out, fields);
    out.extend_from_slice(&dir_offset.to_be_bytes());
    format::write_footer(&mut out);
    out
}

/// Serialize a dictionary in the initial footer-less format.
pub fn write_dictionary_v0(fields: &[FieldTerms]) -> Vec<u8> {
    let raw: Vec<RawField> = fields.iter().map(build_field).collect();
    let mut out = Vec::new();
    format::write_header(&mut out, TERMS_CODEC_NAME, VERSION_START);
    let dir_offset = out.len() as u64;
    write_directory(&mut out, &raw);
    out.extend_from_slice(&dir_offset.to_be_bytes());
    out
}

/// Build one field's transducer and its consistent directory statistics.
pub fn build_field(field_terms: &FieldTerms) -> RawField {
    let codec = InlinePostingsCodec::new();
    let has_freqs = field_terms.field.index_options.has_freqs();
    let mut builder = Builder::new(TermOutputs::new(INLINE_LONGS_SIZE, has_freqs));
    let mut sum_doc_freq = 0u64;
    let mut sum_ttf = 0u64;
    let mut docs: BTreeSet<u32> = BTreeSet::new();
    for (term, postings) in &field_terms.terms {
        let (longs, bytes) = codec.encode(&field_terms.field, postings);
        let doc_freq = postings.len() as u32;
        let ttf: u64 = if has_freqs {
            postings.iter().map(|(_, freq, _)| u64::from(*freq)).sum()
        } else {
            u64::from(doc_freq)
        };
        builder
            .insert(
                term,
                TermData {
                    doc_freq,
                    total_term_freq: ttf,
                    longs,
                    bytes,
                },
            )
            .unwrap();
        sum_doc_freq += u64::from(doc_freq);
        sum_ttf += ttf;
        docs.extend(postings.iter().map(|(doc, _, _)| *doc));
    }
    RawField {
        number: field_terms.field.number,
        num_terms: field_terms.terms.len() as u64,
        sum_total_term_freq: has_freqs.then_some(sum_ttf),
        sum_doc_freq,
        doc_count: docs.len() as u32,
        fst_bytes: builder.into_bytes(),
    }
}

/// Serialize a complete dictionary file with computed statistics.
pub fn write_dictionary(fields: &[FieldTerms]) -> Vec<u8> {
    let raw: Vec<RawField> = fields.iter().map(build_field).collect();
    write_dictionary_raw(&raw)
}

pub fn open_dictionary(
    bytes: Vec<u8>,
    field_infos: &FieldInfos,
    max_doc: u32,
) -> crocus::Result<TermDictionary> {
    TermDictionary::open(
        Box::new(BytesInput::new(bytes)),
        field_infos,
        max_doc,
        Box::new(InlinePostingsCodec::new()),
    )
}

pub fn body_field() -> FieldInfo {
    FieldInfo::new(0, "body", IndexOptions::DocsAndFreqs)
}

/// Single-occurrence postings, one per doc id.
pub fn docs_only(docs: &[u32]) -> Postings {
    docs.iter().map(|&doc| (doc, 1, Vec::new())).collect()
}

/// The dictionary used by most tests: "car" in 2 docs, "cat" in 3, "dog"
/// in 1, over a 4-document segment.
pub fn animals_dictionary() -> (Vec<u8>, FieldInfos) {
    let field = body_field();
    let bytes = write_dictionary(&[FieldTerms {
        field: field.clone(),
        terms: vec![
            (b"car".to_vec(), docs_only(&[0, 2])),
            (b"cat".to_vec(), docs_only(&[0, 1, 3])),
            (b"dog".to_vec(), docs_only(&[2])),
        ],
    }]);
    let infos = FieldInfos::new(vec![field]).unwrap();
    (bytes, infos)
}
