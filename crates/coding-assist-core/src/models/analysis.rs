//! In-depth chart analysis.

use std::fmt;
use std::str::FromStr;

use coding_assist_api::{AnalysisResponse, WireFinding};
use serde::{Deserialize, Serialize};

use super::code::{CodeType, ModelError};

/// Code type named by an analysis "add" action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalysisCodeType {
    Icd,
    Cpt,
    Hcpcs,
}

impl AnalysisCodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisCodeType::Icd => "ICD",
            AnalysisCodeType::Cpt => "CPT",
            AnalysisCodeType::Hcpcs => "HCPCS",
        }
    }

    /// List that receives promoted codes. HCPCS has none.
    pub fn target(&self) -> Option<CodeType> {
        match self {
            AnalysisCodeType::Icd => Some(CodeType::Icd),
            AnalysisCodeType::Cpt => Some(CodeType::Cpt),
            AnalysisCodeType::Hcpcs => None,
        }
    }
}

impl fmt::Display for AnalysisCodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisCodeType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ICD" => Ok(AnalysisCodeType::Icd),
            "CPT" => Ok(AnalysisCodeType::Cpt),
            "HCPCS" => Ok(AnalysisCodeType::Hcpcs),
            _ => Err(ModelError::UnknownCodeType(s.to_string())),
        }
    }
}

/// Analysis category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisCategory {
    Diagnoses,
    Procedures,
    Symptoms,
    Medications,
}

impl AnalysisCategory {
    pub const ALL: [AnalysisCategory; 4] = [
        AnalysisCategory::Diagnoses,
        AnalysisCategory::Procedures,
        AnalysisCategory::Symptoms,
        AnalysisCategory::Medications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisCategory::Diagnoses => "diagnoses",
            AnalysisCategory::Procedures => "procedures",
            AnalysisCategory::Symptoms => "symptoms",
            AnalysisCategory::Medications => "medications",
        }
    }

    /// Code type offered when promoting a finding from this category.
    pub fn code_type(&self) -> AnalysisCodeType {
        match self {
            AnalysisCategory::Diagnoses | AnalysisCategory::Symptoms => AnalysisCodeType::Icd,
            AnalysisCategory::Procedures => AnalysisCodeType::Cpt,
            AnalysisCategory::Medications => AnalysisCodeType::Hcpcs,
        }
    }
}

/// One finding in the analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisFinding {
    pub code: Option<String>,
    pub description: String,
    pub rationale: String,
}

impl From<WireFinding> for AnalysisFinding {
    fn from(finding: WireFinding) -> Self {
        Self {
            code: finding.code.filter(|c| !c.trim().is_empty()),
            description: finding.description,
            rationale: finding.rationale,
        }
    }
}

/// Chart analysis grouped by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisData {
    pub symptoms: Vec<AnalysisFinding>,
    pub diagnoses: Vec<AnalysisFinding>,
    pub medications: Vec<AnalysisFinding>,
    pub procedures: Vec<AnalysisFinding>,
}

impl AnalysisData {
    pub fn findings(&self, category: AnalysisCategory) -> &[AnalysisFinding] {
        match category {
            AnalysisCategory::Diagnoses => &self.diagnoses,
            AnalysisCategory::Procedures => &self.procedures,
            AnalysisCategory::Symptoms => &self.symptoms,
            AnalysisCategory::Medications => &self.medications,
        }
    }

    /// First finding carrying `code`, searching categories that promote to `code_type`.
    pub fn find_code(&self, code: &str, code_type: AnalysisCodeType) -> Option<&AnalysisFinding> {
        AnalysisCategory::ALL
            .iter()
            .filter(|category| category.code_type() == code_type)
            .flat_map(|category| self.findings(*category))
            .find(|finding| finding.code.as_deref() == Some(code))
    }

    pub fn is_empty(&self) -> bool {
        AnalysisCategory::ALL
            .iter()
            .all(|category| self.findings(*category).is_empty())
    }
}

impl From<AnalysisResponse> for AnalysisData {
    fn from(response: AnalysisResponse) -> Self {
        fn convert(findings: Vec<WireFinding>) -> Vec<AnalysisFinding> {
            findings.into_iter().map(AnalysisFinding::from).collect()
        }

        Self {
            symptoms: convert(response.symptoms),
            diagnoses: convert(response.diagnoses),
            medications: convert(response.medications),
            procedures: convert(response.procedures),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(code: Option<&str>, description: &str) -> AnalysisFinding {
        AnalysisFinding {
            code: code.map(String::from),
            description: description.into(),
            rationale: String::new(),
        }
    }

    #[test]
    fn test_code_type_parse() {
        assert_eq!("icd".parse::<AnalysisCodeType>().unwrap(), AnalysisCodeType::Icd);
        assert_eq!("HCPCS".parse::<AnalysisCodeType>().unwrap(), AnalysisCodeType::Hcpcs);
        assert!("snomed".parse::<AnalysisCodeType>().is_err());
        assert_eq!(AnalysisCodeType::Hcpcs.target(), None);
    }

    #[test]
    fn test_find_code_respects_category() {
        let data = AnalysisData {
            symptoms: vec![finding(Some("R05"), "Cough")],
            procedures: vec![finding(Some("99213"), "Office Visit E/M")],
            ..Default::default()
        };

        assert_eq!(
            data.find_code("R05", AnalysisCodeType::Icd).map(|f| f.description.as_str()),
            Some("Cough")
        );
        assert!(data.find_code("R05", AnalysisCodeType::Cpt).is_none());
        assert!(data.find_code("99213", AnalysisCodeType::Cpt).is_some());
    }

    #[test]
    fn test_from_response_drops_blank_codes() {
        let response = AnalysisResponse {
            medications: vec![WireFinding {
                code: Some(" ".into()),
                description: "Albuterol Inhaler".into(),
                rationale: "Prescribed for asthma.".into(),
            }],
            ..Default::default()
        };
        let data = AnalysisData::from(response);
        assert_eq!(data.medications[0].code, None);
        assert!(!data.is_empty());
        assert!(AnalysisData::default().is_empty());
    }
}
