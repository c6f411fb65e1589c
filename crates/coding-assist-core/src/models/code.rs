//! Code entries under review.

use std::fmt;
use std::str::FromStr;

use coding_assist_api::{SubmittedCptCode, SubmittedIcdCode, WireCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown code type: {0}")]
    UnknownCodeType(String),

    #[error("Invalid modifier {0:?}: use up to two uppercase letters or digits")]
    InvalidModifier(String),

    #[error("Units must be a positive whole number")]
    InvalidUnit,

    #[error("{0} is required")]
    MissingField(&'static str),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Code table an entry belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    Cpt,
    Icd,
}

impl CodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeType::Cpt => "cpt",
            CodeType::Icd => "icd",
        }
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpt" => Ok(CodeType::Cpt),
            "icd" => Ok(CodeType::Icd),
            _ => Err(ModelError::UnknownCodeType(s.to_string())),
        }
    }
}

/// Where an entry came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CodeSource {
    /// Returned by the suggestion fetch
    #[default]
    Ai,
    /// Entered by the operator
    Manual,
    /// Promoted from the in-depth analysis
    Analysis,
}

impl CodeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeSource::Ai => "ai",
            CodeSource::Manual => "manual",
            CodeSource::Analysis => "analysis",
        }
    }
}

/// CPT-specific attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CptDetail {
    /// Billed units (>= 1)
    pub unit: u32,
    /// Ordered modifiers
    pub modifiers: Vec<String>,
}

impl Default for CptDetail {
    fn default() -> Self {
        Self {
            unit: 1,
            modifiers: Vec::new(),
        }
    }
}

/// Type-specific part of an entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CodeKind {
    Cpt(CptDetail),
    Icd,
}

/// A CPT or ICD code under review.
///
/// `id` is the identity used by removal and linking; `code` may repeat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeEntry {
    pub id: String,
    pub code: String,
    pub description: String,
    pub is_manual: bool,
    pub rationale: Option<String>,
    pub source: CodeSource,
    /// RFC 3339 timestamp for client-added entries
    pub added_at: Option<String>,
    pub kind: CodeKind,
}

impl CodeEntry {
    /// AI-sourced CPT entry with default units.
    pub fn cpt(id: impl Into<String>, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            description: description.into(),
            is_manual: false,
            rationale: None,
            source: CodeSource::Ai,
            added_at: None,
            kind: CodeKind::Cpt(CptDetail::default()),
        }
    }

    /// AI-sourced ICD entry.
    pub fn icd(id: impl Into<String>, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: CodeKind::Icd,
            ..Self::cpt(id, code, description)
        }
    }

    /// Validated operator-entered CPT entry with a generated id.
    pub fn manual_cpt(
        code: &str,
        description: &str,
        unit: u32,
        modifiers: &[String],
        rationale: Option<String>,
    ) -> ModelResult<Self> {
        let code = required(code, "Code")?;
        if unit == 0 {
            return Err(ModelError::InvalidUnit);
        }
        let modifiers = normalize_modifiers(modifiers)?;

        Ok(Self {
            id: generate_code_id(CodeType::Cpt.as_str(), &code),
            description: description.trim().to_string(),
            is_manual: true,
            rationale: non_blank(rationale),
            source: CodeSource::Manual,
            added_at: Some(chrono::Utc::now().to_rfc3339()),
            kind: CodeKind::Cpt(CptDetail { unit, modifiers }),
            code,
        })
    }

    /// Validated operator-entered ICD entry with a generated id.
    pub fn manual_icd(code: &str, description: &str, rationale: Option<String>) -> ModelResult<Self> {
        let code = required(code, "Code")?;
        let description = required(description, "Description")?;

        Ok(Self {
            id: generate_code_id(CodeType::Icd.as_str(), &code),
            code,
            description,
            is_manual: true,
            rationale: non_blank(rationale),
            source: CodeSource::Manual,
            added_at: Some(chrono::Utc::now().to_rfc3339()),
            kind: CodeKind::Icd,
        })
    }

    /// Convert a suggestion from the wire, keeping it verbatim apart from
    /// filling an id when the source omitted one.
    pub fn from_wire(wire: WireCode, code_type: CodeType) -> Self {
        let id = wire
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| generate_code_id(code_type.as_str(), &wire.code));
        let is_manual = wire.is_manual.unwrap_or(false);
        let kind = match code_type {
            CodeType::Cpt => CodeKind::Cpt(CptDetail {
                unit: wire.unit.unwrap_or(1),
                modifiers: wire.modifiers,
            }),
            CodeType::Icd => CodeKind::Icd,
        };

        Self {
            id,
            code: wire.code,
            description: wire.description,
            is_manual,
            rationale: wire.rationale,
            source: if is_manual { CodeSource::Manual } else { CodeSource::Ai },
            added_at: None,
            kind,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Set units and modifiers (ignored for ICD entries).
    pub fn with_cpt_detail(mut self, unit: u32, modifiers: &[&str]) -> Self {
        if let CodeKind::Cpt(detail) = &mut self.kind {
            detail.unit = unit;
            detail.modifiers = modifiers.iter().map(|m| m.to_string()).collect();
        }
        self
    }

    pub fn code_type(&self) -> CodeType {
        match self.kind {
            CodeKind::Cpt(_) => CodeType::Cpt,
            CodeKind::Icd => CodeType::Icd,
        }
    }

    /// Units, 1 for ICD entries.
    pub fn unit(&self) -> u32 {
        match &self.kind {
            CodeKind::Cpt(detail) => detail.unit,
            CodeKind::Icd => 1,
        }
    }

    /// Modifiers, empty for ICD entries.
    pub fn modifiers(&self) -> &[String] {
        match &self.kind {
            CodeKind::Cpt(detail) => &detail.modifiers,
            CodeKind::Icd => &[],
        }
    }

    pub fn to_submitted_cpt(&self) -> SubmittedCptCode {
        SubmittedCptCode {
            code: self.code.clone(),
            description: self.description.clone(),
            unit: self.unit(),
            modifiers: self.modifiers().to_vec(),
            rationale: self.rationale.clone(),
        }
    }

    pub fn to_submitted_icd(&self) -> SubmittedIcdCode {
        SubmittedIcdCode {
            code: self.code.clone(),
            description: self.description.clone(),
            rationale: self.rationale.clone(),
        }
    }
}

/// Build a client-side id: `{type}-{code}-{uuid}`.
pub fn generate_code_id(type_tag: &str, code: &str) -> String {
    format!("{}-{}-{}", type_tag, code, uuid::Uuid::new_v4().simple())
}

/// Check a single modifier: one or two ASCII uppercase letters or digits.
pub fn validate_modifier(modifier: &str) -> ModelResult<()> {
    let valid = (1..=2).contains(&modifier.len())
        && modifier
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ModelError::InvalidModifier(modifier.to_string()))
    }
}

/// Trim and uppercase modifiers, drop blanks, and validate the rest.
pub fn normalize_modifiers(modifiers: &[String]) -> ModelResult<Vec<String>> {
    modifiers
        .iter()
        .map(|m| m.trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .map(|m| validate_modifier(&m).map(|_| m))
        .collect()
}

fn required(value: &str, field: &'static str) -> ModelResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ModelError::MissingField(field));
    }
    Ok(value.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
