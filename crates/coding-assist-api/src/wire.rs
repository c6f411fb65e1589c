//! Request and response bodies exchanged with the coding API.
//!
//! The suggestion source is loose about shapes: lists may be `null`, units may
//! arrive as numbers or strings, modifiers as arrays or a comma separated
//! string, and alerts as strings or `{message}` objects. Everything is
//! normalized here so callers only see one shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Response from the suggestions endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub cpt_codes: Vec<WireCode>,
    #[serde(default, deserialize_with = "nullable")]
    pub icd_codes: Vec<WireCode>,
    #[serde(default, deserialize_with = "nullable")]
    pub alerts: Vec<WireAlert>,
}

/// A suggested code as returned by the suggestion source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireCode {
    /// Source-assigned id (generated client-side when absent)
    #[serde(default)]
    pub id: Option<String>,
    pub code: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    /// CPT units
    #[serde(default, alias = "units", deserialize_with = "lenient_units")]
    pub unit: Option<u32>,
    /// CPT modifiers
    #[serde(default, deserialize_with = "lenient_modifiers")]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub is_manual: Option<bool>,
}

/// An alert in either of the shapes the source emits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WireAlert {
    Text(String),
    Structured {
        message: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Other(Value),
}

impl WireAlert {
    /// Split into display text and optional structured metadata.
    pub fn into_parts(self) -> (String, Option<Value>) {
        match self {
            WireAlert::Text(text) => (text, None),
            WireAlert::Structured { message, extra } => {
                let metadata = if extra.is_empty() {
                    None
                } else {
                    Some(Value::Object(extra))
                };
                (message, metadata)
            }
            WireAlert::Other(value) => (value.to_string(), Some(value)),
        }
    }
}

/// Response from the analysis endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub symptoms: Vec<WireFinding>,
    #[serde(default, deserialize_with = "nullable")]
    pub diagnoses: Vec<WireFinding>,
    #[serde(default, deserialize_with = "nullable")]
    pub medications: Vec<WireFinding>,
    #[serde(default, deserialize_with = "nullable")]
    pub procedures: Vec<WireFinding>,
}

/// A single finding in an analysis category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WireFinding {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "text_mention", deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub rationale: String,
}

/// Which code table a search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    Cpt,
    Icd,
}

impl SearchKind {
    /// Route segment for this table.
    pub fn path(&self) -> &'static str {
        match self {
            SearchKind::Cpt => "cpt/search",
            SearchKind::Icd => "icd/search",
        }
    }
}

/// A code search result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CodeSearchHit {
    pub code: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_modifiers")]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_units")]
    pub units: Option<u32>,
}

/// CPT code in the shape the host and rationale endpoints expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedCptCode {
    pub code: String,
    pub description: String,
    pub unit: u32,
    pub modifiers: Vec<String>,
    pub rationale: Option<String>,
}

/// ICD code in the shape the host and rationale endpoints expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedIcdCode {
    pub code: String,
    pub description: String,
    pub rationale: Option<String>,
}

/// Request for an overall coding rationale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RationaleRequest {
    pub cpt_codes: Vec<SubmittedCptCode>,
    pub icd_codes: Vec<SubmittedIcdCode>,
}

/// Response from the rationale endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RationaleResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub overall_rationale: String,
}

/// Final code set delivered to the host application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncounterUpdateRequest {
    pub encounter_id: String,
    pub codes: EncounterCodes,
    pub is_flagged: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncounterCodes {
    pub cpt_codes: Vec<SubmittedCptCode>,
    pub icd_codes: Vec<SubmittedIcdCode>,
}

/// Treat `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUnits {
    Integer(u64),
    Float(f64),
    Text(String),
}

/// Accept `2`, `2.0` or `"2"`; anything unusable becomes `None`.
fn lenient_units<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawUnits>::deserialize(deserializer)?;
    let units = match raw {
        Some(RawUnits::Integer(n)) => u32::try_from(n).ok(),
        Some(RawUnits::Float(f)) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => {
            Some(f as u32)
        }
        Some(RawUnits::Text(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    Ok(units.filter(|n| *n > 0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawModifiers {
    List(Vec<String>),
    Text(String),
}

/// Accept `["25", "59"]` or `"25, 59"`.
fn lenient_modifiers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawModifiers>::deserialize(deserializer)?;
    let items: Vec<String> = match raw {
        None => Vec::new(),
        Some(RawModifiers::List(list)) => list,
        Some(RawModifiers::Text(text)) => text
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect(),
    };
    Ok(items
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestions_defaults_and_nulls() {
        let parsed: SuggestionsResponse = serde_json::from_str(r#"{"cptCodes": null}"#).unwrap();
        assert!(parsed.cpt_codes.is_empty());
        assert!(parsed.icd_codes.is_empty());
        assert!(parsed.alerts.is_empty());
    }

    #[test]
    fn test_mixed_alert_shapes() {
        let json = r#"{
            "alerts": [
                "Verify modifier usage on 96372.",
                {"message": "Check asthma control.", "severity": "high"},
                {"message": "Plain object"}
            ]
        }"#;
        let parsed: SuggestionsResponse = serde_json::from_str(json).unwrap();
        let parts: Vec<(String, Option<Value>)> =
            parsed.alerts.into_iter().map(WireAlert::into_parts).collect();

        assert_eq!(parts[0], ("Verify modifier usage on 96372.".to_string(), None));
        assert_eq!(parts[1].0, "Check asthma control.");
        assert_eq!(
            parts[1].1.as_ref().and_then(|m| m.get("severity")),
            Some(&Value::String("high".into()))
        );
        assert_eq!(parts[2], ("Plain object".to_string(), None));
    }

    #[test]
    fn test_alert_without_message_is_kept() {
        let alert: WireAlert = serde_json::from_str(r#"{"code": 7}"#).unwrap();
        let (text, metadata) = alert.into_parts();
        assert_eq!(text, r#"{"code":7}"#);
        assert!(metadata.is_some());
    }

    #[test]
    fn test_code_shapes() {
        let json = r#"{
            "cptCodes": [
                {"id": "cpt-ai-1", "code": "99213", "description": "Office visit", "unit": 1, "modifiers": ""},
                {"id": "cpt-ai-3", "code": "96372", "description": "Injection", "units": "2", "modifiers": "59, 25"},
                {"code": "93000", "modifiers": ["76"], "unit": 0}
            ],
            "icdCodes": [
                {"id": "icd-ai-1", "code": "J45.909", "description": "Asthma", "rationale": "Primary diagnosis.", "isManual": false}
            ]
        }"#;
        let parsed: SuggestionsResponse = serde_json::from_str(json).unwrap();

        let cpt = &parsed.cpt_codes;
        assert_eq!(cpt[0].unit, Some(1));
        assert!(cpt[0].modifiers.is_empty());
        assert_eq!(cpt[1].unit, Some(2));
        assert_eq!(cpt[1].modifiers, vec!["59".to_string(), "25".to_string()]);
        assert_eq!(cpt[2].id, None);
        assert_eq!(cpt[2].unit, None);
        assert_eq!(cpt[2].modifiers, vec!["76".to_string()]);
        assert_eq!(cpt[2].description, "");

        let icd = &parsed.icd_codes[0];
        assert_eq!(icd.rationale.as_deref(), Some("Primary diagnosis."));
        assert_eq!(icd.is_manual, Some(false));
    }

    #[test]
    fn test_analysis_response() {
        let json = r#"{
            "symptoms": [{"description": "Cough", "rationale": "Patient report.", "code": "R05"}],
            "medications": [{"description": "Albuterol Inhaler", "rationale": "Prescribed for asthma.", "code": null}],
            "procedures": null
        }"#;
        let parsed: AnalysisResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.symptoms[0].code.as_deref(), Some("R05"));
        assert_eq!(parsed.medications[0].code, None);
        assert!(parsed.diagnoses.is_empty());
        assert!(parsed.procedures.is_empty());
    }

    #[test]
    fn test_encounter_update_shape() {
        let request = EncounterUpdateRequest {
            encounter_id: "ENC123456".into(),
            codes: EncounterCodes {
                cpt_codes: vec![SubmittedCptCode {
                    code: "99213".into(),
                    description: "Office visit".into(),
                    unit: 1,
                    modifiers: vec!["25".into()],
                    rationale: None,
                }],
                icd_codes: vec![],
            },
            is_flagged: true,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["encounterId"], "ENC123456");
        assert_eq!(value["isFlagged"], true);
        assert_eq!(value["codes"]["cptCodes"][0]["modifiers"][0], "25");
        assert!(value["codes"]["icdCodes"].as_array().unwrap().is_empty());
    }
}
