use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};

/// Label returned for a class id the index does not know.
///
/// Only reachable if a model and an index disagree on the class count, which
/// [`crate::inference::InferenceEngine::load`] rules out.
pub const UNKNOWN_LABEL: &str = "-";

/// Bidirectional mapping between contiguous class ids `[0, C)` and labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex {
    labels: Vec<String>,
    ids: HashMap<String, usize>,
}

impl ClassIndex {
    /// Assigns ids in the order given. Labels must be unique.
    pub fn from_labels(labels: Vec<String>) -> Result<ClassIndex> {
        let mut ids = HashMap::with_capacity(labels.len());
        for (id, label) in labels.iter().enumerate() {
            if ids.insert(label.clone(), id).is_some() {
                return Err(Error::configuration(format!("duplicate class label '{label}'")));
            }
        }
        Ok(ClassIndex { labels, ids })
    }

    /// Rebuilds the index from a persisted `idx2cls` map (stringified id → label).
    pub fn from_idx2cls(idx2cls: &BTreeMap<String, String>) -> Result<ClassIndex> {
        let mut by_id: Vec<Option<String>> = vec![None; idx2cls.len()];
        for (key, label) in idx2cls {
            let id: usize = key
                .parse()
                .map_err(|_| Error::configuration(format!("class id '{key}' is not an integer")))?;
            match by_id.get_mut(id) {
                Some(slot) => *slot = Some(label.clone()),
                None => {
                    return Err(Error::configuration(format!(
                        "class ids are not contiguous: id {id} with {} classes",
                        idx2cls.len()
                    )))
                }
            }
        }
        let labels = by_id
            .into_iter()
            .enumerate()
            .map(|(id, label)| label.ok_or_else(|| Error::configuration(format!("class id {id} is missing"))))
            .collect::<Result<Vec<_>>>()?;
        ClassIndex::from_labels(labels)
    }

    /// Stringified id → label, the shape stored in `params.json`.
    pub fn to_idx2cls(&self) -> BTreeMap<String, String> {
        self.labels
            .iter()
            .enumerate()
            .map(|(id, label)| (id.to_string(), label.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn id(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    /// Label for `id`, or [`UNKNOWN_LABEL`] (logged as a warning) if absent.
    pub fn label_or_unknown(&self, id: usize) -> &str {
        self.label(id).unwrap_or_else(|| {
            tracing::warn!(id, classes = self.len(), "class id outside the class index");
            UNKNOWN_LABEL
        })
    }
}
