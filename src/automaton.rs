//! Compiled byte automatons for intersecting the term dictionary.
//!
//! The dictionary core only needs the capability surface of a deterministic
//! byte-driven state machine: an initial state, a step function and an accept
//! predicate. Full regex compilation lives outside this crate; the built-in
//! compilations here cover prefix and simple wildcard patterns plus an
//! explicit finite set, which is enough for query execution and tests.

use crate::error::{CrocusError, Result};

/// A deterministic byte automaton. States are dense integers; `step`
/// returning `None` means the transition is rejected.
pub trait Automaton: Send + Sync {
    /// The start state.
    fn initial_state(&self) -> u32;

    /// Transition on one byte label, or `None` if the label is rejected.
    fn step(&self, state: u32, label: u8) -> Option<u32>;

    /// Whether the state accepts.
    fn is_accept(&self, state: u32) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WildcardStep {
    Literal(u8),
    AnyByte,
}

/// Automaton for patterns of literal bytes, `?` (any single byte) and a
/// trailing `*` (any suffix, including empty).
///
/// State `i` means "the first `i` pattern steps matched"; with a trailing
/// `*` the last state loops on every byte.
#[derive(Debug, Clone)]
pub struct WildcardAutomaton {
    steps: Vec<WildcardStep>,
    trailing_any: bool,
}

impl WildcardAutomaton {
    /// Compile a pattern. `*` is only meaningful as the final character;
    /// anywhere else it is rejected as an invalid argument.
    pub fn new(pattern: &str) -> Result<Self> {
        let bytes = pattern.as_bytes();
        let mut steps = Vec::with_capacity(bytes.len());
        let mut trailing_any = false;
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'*' => {
                    if i != bytes.len() - 1 {
                        return Err(CrocusError::invalid_argument(format!(
                            "'*' is only supported at the end of a pattern: {pattern:?}"
                        )));
                    }
                    trailing_any = true;
                }
                b'?' => steps.push(WildcardStep::AnyByte),
                other => steps.push(WildcardStep::Literal(other)),
            }
        }
        Ok(WildcardAutomaton {
            steps,
            trailing_any,
        })
    }
}

impl Automaton for WildcardAutomaton {
    fn initial_state(&self) -> u32 {
        0
    }

    fn step(&self, state: u32, label: u8) -> Option<u32> {
        let i = state as usize;
        if i < self.steps.len() {
            match self.steps[i] {
                WildcardStep::AnyByte => Some(state + 1),
                WildcardStep::Literal(b) if b == label => Some(state + 1),
                WildcardStep::Literal(_) => None,
            }
        } else if self.trailing_any {
            Some(state)
        } else {
            None
        }
    }

    fn is_accept(&self, state: u32) -> bool {
        state as usize == self.steps.len()
    }
}

/// Automaton accepting every byte string starting with a fixed prefix.
#[derive(Debug, Clone)]
pub struct PrefixAutomaton {
    inner: WildcardAutomaton,
}

impl PrefixAutomaton {
    /// Compile a prefix automaton.
    pub fn new(prefix: &[u8]) -> Self {
        PrefixAutomaton {
            inner: WildcardAutomaton {
                steps: prefix.iter().map(|&b| WildcardStep::Literal(b)).collect(),
                trailing_any: true,
            },
        }
    }
}

impl Automaton for PrefixAutomaton {
    fn initial_state(&self) -> u32 {
        self.inner.initial_state()
    }

    fn step(&self, state: u32, label: u8) -> Option<u32> {
        self.inner.step(state, label)
    }

    fn is_accept(&self, state: u32) -> bool {
        state as usize >= self.inner.steps.len()
    }
}

/// Automaton accepting exactly a finite set of byte strings, stored as a
/// trie with label-sorted transitions.
#[derive(Debug, Clone)]
pub struct SetAutomaton {
    // per state: (accepting, transitions sorted by label)
    states: Vec<(bool, Vec<(u8, u32)>)>,
}

impl SetAutomaton {
    /// Build from an arbitrary collection of byte strings.
    pub fn new<I, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut states: Vec<(bool, Vec<(u8, u32)>)> = vec![(false, Vec::new())];
        for entry in entries {
            let mut state = 0u32;
            for &byte in entry.as_ref() {
                let next = states[state as usize]
                    .1
                    .iter()
                    .find(|(label, _)| *label == byte)
                    .map(|(_, target)| *target);
                state = match next {
                    Some(target) => target,
                    None => {
                        let target = states.len() as u32;
                        states.push((false, Vec::new()));
                        let transitions = &mut states[state as usize].1;
                        let pos = transitions.partition_point(|(label, _)| *label < byte);
                        transitions.insert(pos, (byte, target));
                        target
                    }
                };
            }
            states[state as usize].0 = true;
        }
        SetAutomaton { states }
    }
}

impl Automaton for SetAutomaton {
    fn initial_state(&self) -> u32 {
        0
    }

    fn step(&self, state: u32, label: u8) -> Option<u32> {
        let transitions = &self.states[state as usize].1;
        transitions
            .binary_search_by_key(&label, |(l, _)| *l)
            .ok()
            .map(|idx| transitions[idx].1)
    }

    fn is_accept(&self, state: u32) -> bool {
        self.states[state as usize].0
    }
}
