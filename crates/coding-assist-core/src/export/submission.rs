//! Submission payload for the host application.

use std::collections::BTreeMap;

use coding_assist_api::{EncounterCodes, EncounterUpdateRequest, SubmittedCptCode, SubmittedIcdCode};
use serde::{Deserialize, Serialize};

use crate::models::{CodeType, EncounterDetails};
use crate::session::CodingSession;

/// Everything the operator accepted for an encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Host encounter id (the encounter number)
    pub encounter_id: String,
    /// Encounter details as supplied by the host
    pub encounter_details: EncounterDetails,
    /// Chart text at submission time
    pub chart_text: String,
    /// Displayed CPT codes
    pub cpt_codes: Vec<SubmittedCptCode>,
    /// Displayed ICD codes
    pub icd_codes: Vec<SubmittedIcdCode>,
    /// Ids the operator removed
    pub removed_code_ids: Vec<String>,
    /// CPT id → ICD ids, limited to displayed ICD entries
    pub code_links: BTreeMap<String, Vec<String>>,
    pub is_flagged: bool,
    /// Assembly timestamp
    pub assembled_at: String,
}

impl Submission {
    /// Request body for the host's encounter update endpoint.
    pub fn to_encounter_update(&self) -> EncounterUpdateRequest {
        EncounterUpdateRequest {
            encounter_id: self.encounter_id.clone(),
            codes: EncounterCodes {
                cpt_codes: self.cpt_codes.clone(),
                icd_codes: self.icd_codes.clone(),
            },
            is_flagged: self.is_flagged,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds [`Submission`]s from session state.
pub struct SubmissionAssembler;

impl SubmissionAssembler {
    /// Collect the displayed codes and their links. Never fails; an empty
    /// session yields empty lists.
    pub fn assemble(session: &CodingSession, is_flagged: bool) -> Submission {
        let cpt = session.displayed(CodeType::Cpt);
        let icd = session.displayed(CodeType::Icd);

        let code_links = cpt
            .iter()
            .filter_map(|entry| {
                let linked: Vec<String> = session
                    .linked_icd_codes(&entry.id)
                    .into_iter()
                    .map(|icd| icd.id.clone())
                    .collect();
                (!linked.is_empty()).then(|| (entry.id.clone(), linked))
            })
            .collect();

        Submission {
            encounter_id: session.encounter().encounter_number.clone(),
            encounter_details: session.encounter().clone(),
            chart_text: session.chart_text().to_string(),
            cpt_codes: cpt.iter().map(|entry| entry.to_submitted_cpt()).collect(),
            icd_codes: icd.iter().map(|entry| entry.to_submitted_icd()).collect(),
            removed_code_ids: session.removed().iter().cloned().collect(),
            code_links,
            is_flagged,
            assembled_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
