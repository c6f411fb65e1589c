//! Encounter metadata and provider codes supplied by the host application.

use serde::{Deserialize, Serialize};

/// Encounter details handed over by the host at session start.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EncounterDetails {
    /// Encounter number (used as the encounter id on submit)
    pub encounter_number: String,
    /// Patient account number
    pub account_number: String,
    /// Insurance carrier
    pub insurance: String,
    /// Rendering provider
    pub provider: String,
    /// Encounter status in the host system
    pub status: String,
    /// Date of service (as given by the host)
    pub date_of_service: String,
    /// Chart note text
    pub chart_text: String,
}

/// CPT code already billed by the provider (read-only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCptCode {
    pub code: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default = "default_units")]
    pub units: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// ICD code already recorded by the provider (read-only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderIcdCode {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

fn default_units() -> u32 {
    1
}
