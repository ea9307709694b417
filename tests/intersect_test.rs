mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use crocus::{CrocusError, PrefixAutomaton, SetAutomaton, TermsEnum, WildcardAutomaton};

use common::{FieldTerms, animals_dictionary, body_field, docs_only, open_dictionary,
    write_dictionary};

fn collect(iter: &mut dyn TermsEnum) -> Vec<Vec<u8>> {
    let mut terms = Vec::new();
    while let Some(term) = iter.next().unwrap() {
        terms.push(term);
    }
    terms
}

#[test]
fn test_wildcard_intersection() {
    let (bytes, infos) = animals_dictionary();
    let dict = open_dictionary(bytes, &infos, 4).unwrap();
    let reader = dict.field("body").unwrap();

    let automaton = Arc::new(WildcardAutomaton::new("ca?").unwrap());
    let mut iter = reader.intersect(automaton, None).unwrap();

    assert_eq!(iter.next().unwrap().unwrap(), b"car");
    assert_eq!(iter.doc_freq().unwrap(), 2);
    assert_eq!(iter.next().unwrap().unwrap(), b"cat");
    assert_eq!(iter.doc_freq().unwrap(), 3);
    assert!(iter.next().unwrap().is_none());
    assert!(iter.term().is_none());
}

#[test]
fn test_intersection_matches_filtered_iteration() {
    let field = body_field();
    let terms: Vec<&[u8]> = vec![
        b"ant", b"cab", b"cabs", b"car", b"carp", b"cart", b"cat", b"cats", b"dog",
    ];
    let bytes = write_dictionary(&[FieldTerms {
        field: field.clone(),
        terms: terms
            .iter()
            .map(|t| (t.to_vec(), docs_only(&[0])))
            .collect(),
    }]);
    let infos = crocus::FieldInfos::new(vec![field]).unwrap();
    let dict = open_dictionary(bytes, &infos, 1).unwrap();
    let reader = dict.field("body").unwrap();

    let automaton = Arc::new(PrefixAutomaton::new(b"ca"));
    let mut iter = reader.intersect(automaton, None).unwrap();
    let expected: Vec<Vec<u8>> = terms
        .iter()
        .filter(|t| t.starts_with(b"ca"))
        .map(|t| t.to_vec())
        .collect();
    assert_eq!(collect(&mut iter), expected);
}

#[test]
fn test_intersection_postings() {
    let (bytes, infos) = animals_dictionary();
    let dict = open_dictionary(bytes, &infos, 4).unwrap();
    let reader = dict.field("body").unwrap();

    let automaton = Arc::new(SetAutomaton::new([b"cat".as_slice(), b"emu"]));
    let mut iter = reader.intersect(automaton, None).unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), b"cat");

    let mut postings = iter.postings(None).unwrap();
    assert_eq!(postings.next_doc().unwrap(), Some(0));
    assert_eq!(postings.next_doc().unwrap(), Some(1));
    assert_eq!(postings.next_doc().unwrap(), Some(3));
    assert_eq!(postings.next_doc().unwrap(), None);

    assert!(iter.next().unwrap().is_none());
}

#[test]
fn test_start_term_resumption() {
    let (bytes, infos) = animals_dictionary();
    let dict = open_dictionary(bytes, &infos, 4).unwrap();
    let reader = dict.field("body").unwrap();

    // resuming at the previously returned term skips it
    let automaton = Arc::new(PrefixAutomaton::new(b""));
    let mut iter = reader.intersect(automaton, Some(b"car")).unwrap();
    assert_eq!(collect(&mut iter), vec![b"cat".to_vec(), b"dog".to_vec()]);

    // resuming between terms lands on the next accepted one
    let automaton = Arc::new(PrefixAutomaton::new(b"ca"));
    let mut iter = reader.intersect(automaton, Some(b"cas")).unwrap();
    assert_eq!(collect(&mut iter), vec![b"cat".to_vec()]);

    // resuming past the last accepted term yields nothing
    let automaton = Arc::new(PrefixAutomaton::new(b"ca"));
    let mut iter = reader.intersect(automaton, Some(b"cat")).unwrap();
    assert!(iter.next().unwrap().is_none());
}

#[test]
fn test_no_matching_terms() {
    let (bytes, infos) = animals_dictionary();
    let dict = open_dictionary(bytes, &infos, 4).unwrap();
    let reader = dict.field("body").unwrap();

    let automaton = Arc::new(PrefixAutomaton::new(b"zebra"));
    let mut iter = reader.intersect(automaton, None).unwrap();
    assert!(iter.next().unwrap().is_none());
    assert!(iter.doc_freq().is_err());
}

#[test]
fn test_seeks_unsupported() {
    let (bytes, infos) = animals_dictionary();
    let dict = open_dictionary(bytes, &infos, 4).unwrap();
    let reader = dict.field("body").unwrap();

    let automaton = Arc::new(PrefixAutomaton::new(b"ca"));
    let mut iter = reader.intersect(automaton, None).unwrap();
    iter.next().unwrap().unwrap();
    let state = iter.term_state().unwrap();

    assert!(matches!(
        iter.seek_exact(b"cat"),
        Err(CrocusError::Unsupported(_))
    ));
    assert!(matches!(
        iter.seek_ceil(b"cat"),
        Err(CrocusError::Unsupported(_))
    ));
    assert!(matches!(
        iter.seek_exact_state(b"car", &state),
        Err(CrocusError::Unsupported(_))
    ));
    assert!(matches!(iter.ord(), Err(CrocusError::Unsupported(_))));

    // the captured state still resumes a sequential enumerator
    let mut seq = reader.iterator().unwrap();
    seq.seek_exact_state(b"car", &state).unwrap();
    assert_eq!(seq.next().unwrap().unwrap(), b"cat");
}

#[test]
fn test_randomized_prefix_intersection() {
    use rand::Rng;

    let mut rng = rand::rng();
    let mut terms: BTreeSet<Vec<u8>> = BTreeSet::new();
    while terms.len() < 150 {
        let len = rng.random_range(1..=6);
        let term: Vec<u8> = (0..len).map(|_| rng.random_range(b'a'..=b'd')).collect();
        terms.insert(term);
    }

    let field = body_field();
    let bytes = write_dictionary(&[FieldTerms {
        field: field.clone(),
        terms: terms.iter().map(|t| (t.clone(), docs_only(&[0]))).collect(),
    }]);
    let infos = crocus::FieldInfos::new(vec![field]).unwrap();
    let dict = open_dictionary(bytes, &infos, 1).unwrap();
    let reader = dict.field("body").unwrap();

    for _ in 0..50 {
        let len = rng.random_range(0..=3);
        let prefix: Vec<u8> = (0..len).map(|_| rng.random_range(b'a'..=b'd')).collect();
        let automaton = Arc::new(PrefixAutomaton::new(&prefix));
        let mut iter = reader.intersect(automaton, None).unwrap();
        let expected: Vec<Vec<u8>> = terms
            .iter()
            .filter(|t| t.starts_with(&prefix))
            .cloned()
            .collect();
        assert_eq!(collect(&mut iter), expected);
    }
}
