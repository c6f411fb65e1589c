//! CPT → ICD justification links.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping from CPT entry id to the ICD entry ids that justify it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct LinkGraph {
    links: BTreeMap<String, Vec<String>>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the links for `cpt_id`. An empty list removes the key.
    pub fn set(&mut self, cpt_id: &str, icd_ids: Vec<String>) {
        if icd_ids.is_empty() {
            self.links.remove(cpt_id);
        } else {
            self.links.insert(cpt_id.to_string(), icd_ids);
        }
    }

    /// Linked ICD ids for `cpt_id` (empty when none).
    pub fn get(&self, cpt_id: &str) -> &[String] {
        self.links.get(cpt_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, cpt_id: &str) -> bool {
        self.links.contains_key(cpt_id)
    }

    /// Drop every link owned by `cpt_id`.
    pub fn remove_cpt(&mut self, cpt_id: &str) -> bool {
        self.links.remove(cpt_id).is_some()
    }

    /// Strip `icd_id` from every CPT's list. Lists left empty are dropped.
    pub fn strip_icd(&mut self, icd_id: &str) {
        for icd_ids in self.links.values_mut() {
            icd_ids.retain(|id| id != icd_id);
        }
        self.links.retain(|_, icd_ids| !icd_ids.is_empty());
    }

    /// Whether any CPT links to `icd_id`.
    pub fn references_icd(&self, icd_id: &str) -> bool {
        self.links.values().any(|ids| ids.iter().any(|id| id == icd_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }
}
