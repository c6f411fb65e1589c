//! Local reference table for CPT/ICD code search.
//!
//! Matches are case-insensitive substrings of the code or description; ranking
//! puts exact code hits first, then code prefixes, then string similarity.

use std::cmp::Ordering;

use strsim::jaro_winkler;

use crate::wire::{CodeSearchHit, SearchKind};

/// A row in the reference table.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogCode {
    pub code: String,
    pub description: String,
    pub category: Option<String>,
    /// Modifiers commonly billed with this code (CPT only)
    pub modifiers: Vec<String>,
}

impl CatalogCode {
    pub fn new(code: &str, description: &str) -> Self {
        Self {
            code: code.to_string(),
            description: description.to_string(),
            category: None,
            modifiers: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_modifiers(mut self, modifiers: &[&str]) -> Self {
        self.modifiers = modifiers.iter().map(|m| m.to_string()).collect();
        self
    }

    fn to_hit(&self, kind: SearchKind) -> CodeSearchHit {
        CodeSearchHit {
            code: self.code.clone(),
            description: self.description.clone(),
            modifiers: self.modifiers.clone(),
            category: self.category.clone(),
            units: match kind {
                SearchKind::Cpt => Some(1),
                SearchKind::Icd => None,
            },
        }
    }
}

/// In-memory CPT/ICD reference table.
#[derive(Debug, Clone, Default)]
pub struct CodeCatalog {
    cpt: Vec<CatalogCode>,
    icd: Vec<CatalogCode>,
}

impl CodeCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with common outpatient codes.
    pub fn reference() -> Self {
        let cpt = vec![
            CatalogCode::new("99202", "Office/outpatient visit new patient, 15-29 minutes")
                .with_category("Evaluation and Management")
                .with_modifiers(&["25"]),
            CatalogCode::new("99203", "Office/outpatient visit new patient, 30-44 minutes")
                .with_category("Evaluation and Management")
                .with_modifiers(&["25"]),
            CatalogCode::new("99213", "Office visit, est patient, 10-19 min")
                .with_category("Evaluation and Management")
                .with_modifiers(&["25", "59"]),
            CatalogCode::new("99214", "Office visit, est patient, 20-29 min")
                .with_category("Evaluation and Management")
                .with_modifiers(&["25", "59"]),
            CatalogCode::new("99215", "Office/outpatient visit established patient, 40-54 minutes")
                .with_category("Evaluation and Management")
                .with_modifiers(&["25"]),
            CatalogCode::new("96372", "Therapeutic injection, SC/IM")
                .with_category("Medicine")
                .with_modifiers(&["59"]),
            CatalogCode::new("90471", "Immunization administration").with_category("Medicine"),
            CatalogCode::new("93000", "Electrocardiogram, routine ECG with at least 12 leads")
                .with_category("Cardiovascular"),
            CatalogCode::new(
                "87880",
                "Infectious agent antigen detection by immunoassay with direct optical observation",
            )
            .with_category("Pathology and Laboratory"),
            CatalogCode::new("97110", "Therapeutic exercises to develop strength, endurance, range of motion, and flexibility")
                .with_category("Physical Medicine"),
            CatalogCode::new("97140", "Manual therapy techniques, 15 minutes")
                .with_category("Physical Medicine"),
        ];

        let icd = vec![
            CatalogCode::new("J45.909", "Unspecified asthma without exacerbation")
                .with_category("Respiratory"),
            CatalogCode::new("J45.20", "Mild intermittent asthma, uncomplicated")
                .with_category("Respiratory"),
            CatalogCode::new("J44.9", "Chronic obstructive pulmonary disease, unspecified")
                .with_category("Respiratory"),
            CatalogCode::new("J02.9", "Acute pharyngitis, unspecified").with_category("Respiratory"),
            CatalogCode::new("I10", "Essential (primary) hypertension")
                .with_category("Cardiovascular"),
            CatalogCode::new("E11.9", "Type 2 diabetes mellitus without complications")
                .with_category("Endocrine"),
            CatalogCode::new("E78.5", "Dyslipidemia, unspecified").with_category("Endocrine"),
            CatalogCode::new("M54.5", "Low back pain").with_category("Musculoskeletal"),
            CatalogCode::new("F41.1", "Generalized anxiety disorder").with_category("Mental Health"),
            CatalogCode::new("K21.9", "Gastro-esophageal reflux disease without esophagitis")
                .with_category("Digestive"),
            CatalogCode::new("N39.0", "Urinary tract infection, site not specified")
                .with_category("Genitourinary"),
            CatalogCode::new("R05", "Cough").with_category("Symptoms"),
            CatalogCode::new("R50.9", "Fever, unspecified").with_category("Symptoms"),
            CatalogCode::new("R51", "Headache").with_category("Symptoms"),
        ];

        Self { cpt, icd }
    }

    /// Add a row to the given table.
    pub fn insert(&mut self, kind: SearchKind, code: CatalogCode) {
        self.table_mut(kind).push(code);
    }

    /// Number of rows in the given table.
    pub fn len(&self, kind: SearchKind) -> usize {
        self.table(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpt.is_empty() && self.icd.is_empty()
    }

    /// Search a table. Blank queries return nothing.
    pub fn search(&self, kind: SearchKind, query: &str, limit: usize) -> Vec<CodeSearchHit> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &CatalogCode)> = self
            .table(kind)
            .iter()
            .filter_map(|row| {
                let code = row.code.to_lowercase();
                let description = row.description.to_lowercase();
                if !code.contains(&needle) && !description.contains(&needle) {
                    return None;
                }
                Some((match_score(&needle, &code, &description), row))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.code.cmp(&b.1.code))
        });

        scored
            .into_iter()
            .take(limit)
            .map(|(_, row)| row.to_hit(kind))
            .collect()
    }

    fn table(&self, kind: SearchKind) -> &Vec<CatalogCode> {
        match kind {
            SearchKind::Cpt => &self.cpt,
            SearchKind::Icd => &self.icd,
        }
    }

    fn table_mut(&mut self, kind: SearchKind) -> &mut Vec<CatalogCode> {
        match kind {
            SearchKind::Cpt => &mut self.cpt,
            SearchKind::Icd => &mut self.icd,
        }
    }
}

/// Score a substring match (inputs already lowercased).
fn match_score(needle: &str, code: &str, description: &str) -> f64 {
    if code == needle {
        return 3.0;
    }
    if code.starts_with(needle) {
        return 2.0 + jaro_winkler(needle, code);
    }
    jaro_winkler(needle, code).max(jaro_winkler(needle, description))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_query() {
        let catalog = CodeCatalog::reference();
        assert!(catalog.search(SearchKind::Icd, "   ", 10).is_empty());
    }

    #[test]
    fn test_search_by_description() {
        let catalog = CodeCatalog::reference();
        let hits = catalog.search(SearchKind::Icd, "ASTHMA", 10);

        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.code.starts_with("J45")));
        assert_eq!(hits[0].units, None);
    }

    #[test]
    fn test_exact_code_ranks_first() {
        let catalog = CodeCatalog::reference();
        let hits = catalog.search(SearchKind::Cpt, "99213", 10);

        assert_eq!(hits[0].code, "99213");
        assert_eq!(hits[0].modifiers, vec!["25".to_string(), "59".to_string()]);
        assert_eq!(hits[0].units, Some(1));
    }

    #[test]
    fn test_prefix_before_description_match() {
        let mut catalog = CodeCatalog::new();
        catalog.insert(SearchKind::Icd, CatalogCode::new("X10", "Contains r0 somewhere"));
        catalog.insert(SearchKind::Icd, CatalogCode::new("R05", "Cough"));

        let hits = catalog.search(SearchKind::Icd, "r0", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].code, "R05");
    }

    #[test]
    fn test_limit() {
        let catalog = CodeCatalog::reference();
        let hits = catalog.search(SearchKind::Cpt, "99", 2);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_tables_are_separate() {
        let catalog = CodeCatalog::reference();
        assert!(catalog.search(SearchKind::Cpt, "cough", 10).is_empty());
        assert!(!catalog.is_empty());
        assert!(catalog.len(SearchKind::Icd) > 0);
    }
}
