//! Field catalog supplied by the segment that owns the dictionary.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CrocusError, Result};

/// What a field records per posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOptions {
    /// Only document ids.
    Docs,
    /// Document ids and term frequencies.
    DocsAndFreqs,
    /// Document ids, term frequencies and positions.
    DocsAndFreqsAndPositions,
}

impl IndexOptions {
    /// Whether per-term frequencies are recorded.
    pub fn has_freqs(&self) -> bool {
        !matches!(self, IndexOptions::Docs)
    }

    /// Whether positions are recorded.
    pub fn has_positions(&self) -> bool {
        matches!(self, IndexOptions::DocsAndFreqsAndPositions)
    }
}

/// Metadata for one indexed field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Stable field number used in the on-disk directory.
    pub number: u32,
    /// Field name.
    pub name: String,
    /// Indexing options for the field.
    pub index_options: IndexOptions,
}

impl FieldInfo {
    /// Create a new field info.
    pub fn new<S: Into<String>>(number: u32, name: S, index_options: IndexOptions) -> Self {
        FieldInfo {
            number,
            name: name.into(),
            index_options,
        }
    }
}

/// Catalog of all fields in a segment, addressable by number and by name.
#[derive(Debug, Default)]
pub struct FieldInfos {
    by_number: AHashMap<u32, FieldInfo>,
    by_name: AHashMap<String, u32>,
}

impl FieldInfos {
    /// Build a catalog from a list of field infos.
    ///
    /// Duplicate numbers or names are rejected.
    pub fn new(fields: Vec<FieldInfo>) -> Result<Self> {
        let mut infos = FieldInfos::default();
        for field in fields {
            if infos.by_name.contains_key(&field.name) {
                return Err(CrocusError::invalid_argument(format!(
                    "duplicate field name: {}",
                    field.name
                )));
            }
            if infos.by_number.contains_key(&field.number) {
                return Err(CrocusError::invalid_argument(format!(
                    "duplicate field number: {}",
                    field.number
                )));
            }
            infos.by_name.insert(field.name.clone(), field.number);
            infos.by_number.insert(field.number, field);
        }
        Ok(infos)
    }

    /// Look up a field by its on-disk number.
    pub fn by_number(&self, number: u32) -> Option<&FieldInfo> {
        self.by_number.get(&number)
    }

    /// Look up a field by name.
    pub fn by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name
            .get(name)
            .and_then(|number| self.by_number.get(number))
    }

    /// Number of fields in the catalog.
    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let infos = FieldInfos::new(vec![
            FieldInfo::new(0, "title", IndexOptions::DocsAndFreqs),
            FieldInfo::new(1, "body", IndexOptions::DocsAndFreqsAndPositions),
        ])
        .unwrap();

        assert_eq!(infos.len(), 2);
        assert_eq!(infos.by_name("title").unwrap().number, 0);
        assert_eq!(infos.by_number(1).unwrap().name, "body");
        assert!(infos.by_name("missing").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = FieldInfos::new(vec![
            FieldInfo::new(0, "title", IndexOptions::Docs),
            FieldInfo::new(1, "title", IndexOptions::Docs),
        ]);
        assert!(result.is_err());

        let result = FieldInfos::new(vec![
            FieldInfo::new(0, "a", IndexOptions::Docs),
            FieldInfo::new(0, "b", IndexOptions::Docs),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let field = FieldInfo::new(3, "body", IndexOptions::DocsAndFreqsAndPositions);
        let json = serde_json::to_string(&field).unwrap();
        let back: FieldInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.number, 3);
        assert_eq!(back.name, "body");
        assert_eq!(back.index_options, IndexOptions::DocsAndFreqsAndPositions);
    }

    #[test]
    fn test_index_options() {
        assert!(!IndexOptions::Docs.has_freqs());
        assert!(IndexOptions::DocsAndFreqs.has_freqs());
        assert!(!IndexOptions::DocsAndFreqs.has_positions());
        assert!(IndexOptions::DocsAndFreqsAndPositions.has_positions());
    }
}
