//! Review session for one encounter.
//!
//! [`CodingSession`] owns everything the operator edits while reviewing an
//! encounter: the suggestion lists, the removal set, CPT → ICD links, codes
//! promoted from the analysis, alerts and the overall rationale.
//!
//! External calls are split into `begin_*` / `complete_*` pairs so the
//! network round trip can happen without holding the session. Each `begin`
//! issues a [`RequestToken`]; completing with a superseded token leaves the
//! session untouched.

mod link_graph;
mod removal;
mod requests;

pub use link_graph::LinkGraph;
pub use removal::RemovalSet;
pub use requests::{Completion, LoadingFlags, RequestKind, RequestToken, RequestTracker};

use coding_assist_api::{
    AnalysisResponse, ApiError, ApiResult, CodingApi, RationaleRequest, RationaleResponse,
    SuggestionsResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::export::{Submission, SubmissionAssembler};
use crate::models::{
    generate_code_id, AlertMessage, AnalysisCodeType, AnalysisData, CodeEntry, CodeSource,
    CodeType, EncounterDetails, ModelError, ProviderCptCode, ProviderIcdCode,
};

/// Shown when generate is attempted without chart text.
pub const EMPTY_CHART_MESSAGE: &str = "Please paste chart text before generating suggestions.";
/// Shown when rationale is requested with nothing displayed.
pub const NO_CODES_MESSAGE: &str = "Add at least one code before requesting a rationale.";

pub const SUGGESTIONS_FAILED_ALERT: &str = "Error generating suggestions. Please try again.";
pub const ANALYSIS_FAILED_ALERT: &str = "Error generating analysis. Please try again.";
pub const RATIONALE_FAILED_ALERT: &str = "Error generating rationale. Please try again.";

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("Unknown code: {0}")]
    UnknownCode(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A code promoted from the analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisAddition {
    pub id: String,
    pub code: String,
    pub code_type: AnalysisCodeType,
    pub source: CodeSource,
    pub added_at: String,
}

/// Result of promoting an analysis code.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisAddOutcome {
    /// Appended to the matching suggestion list
    Added(CodeEntry),
    /// The code was promoted earlier; nothing changed
    AlreadyAdded,
    /// Recorded, but there is no list for this code type
    NoTargetList(AnalysisAddition),
}

/// Record of the last accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub is_flagged: bool,
    pub submitted_at: String,
    /// Acknowledgement returned by the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

/// Working state for reviewing one encounter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodingSession {
    encounter: EncounterDetails,
    chart_text: String,
    provider_cpt_codes: Vec<ProviderCptCode>,
    provider_icd_codes: Vec<ProviderIcdCode>,
    cpt_codes: Vec<CodeEntry>,
    icd_codes: Vec<CodeEntry>,
    removed: RemovalSet,
    links: LinkGraph,
    analysis_additions: Vec<AnalysisAddition>,
    analysis: Option<AnalysisData>,
    alerts: Vec<AlertMessage>,
    overall_rationale: Option<String>,
    submit_error: Option<String>,
    last_submission: Option<SubmissionReceipt>,
    pending_flag: Option<bool>,
    requests: RequestTracker,
}

impl CodingSession {
    /// Start a session. Chart text is taken from the encounter.
    pub fn new(
        encounter: EncounterDetails,
        provider_cpt_codes: Vec<ProviderCptCode>,
        provider_icd_codes: Vec<ProviderIcdCode>,
    ) -> Self {
        Self {
            chart_text: encounter.chart_text.clone(),
            encounter,
            provider_cpt_codes,
            provider_icd_codes,
            ..Default::default()
        }
    }

    // =========================================================================
    // Encounter inputs
    // =========================================================================

    pub fn encounter(&self) -> &EncounterDetails {
        &self.encounter
    }

    pub fn chart_text(&self) -> &str {
        &self.chart_text
    }

    pub fn set_chart_text(&mut self, text: impl Into<String>) {
        self.chart_text = text.into();
    }

    pub fn provider_cpt_codes(&self) -> &[ProviderCptCode] {
        &self.provider_cpt_codes
    }

    pub fn provider_icd_codes(&self) -> &[ProviderIcdCode] {
        &self.provider_icd_codes
    }

    // =========================================================================
    // Suggestion fetch
    // =========================================================================

    /// Validate chart text, reset review state and issue a suggestions token.
    pub fn begin_generate(&mut self) -> SessionResult<RequestToken> {
        self.require_chart_text()?;

        self.cpt_codes.clear();
        self.icd_codes.clear();
        self.removed.clear();
        self.links.clear();
        self.analysis_additions.clear();
        self.analysis = None;
        self.alerts.clear();
        self.overall_rationale = None;
        self.requests.cancel(RequestKind::Analysis);
        self.requests.cancel(RequestKind::Rationale);

        let token = self.requests.issue(RequestKind::Suggestions);
        info!(seq = token.seq, "Generating suggestions");
        Ok(token)
    }

    /// Apply a suggestions response. Failures become a single alert.
    pub fn complete_generate(
        &mut self,
        token: RequestToken,
        result: ApiResult<SuggestionsResponse>,
    ) -> Completion {
        if !self.requests.finish(&token) {
            debug!(seq = token.seq, "Discarding stale suggestions response");
            return Completion::Stale;
        }

        match result {
            Ok(response) => {
                self.cpt_codes = response
                    .cpt_codes
                    .into_iter()
                    .map(|code| CodeEntry::from_wire(code, CodeType::Cpt))
                    .collect();
                self.icd_codes = response
                    .icd_codes
                    .into_iter()
                    .map(|code| CodeEntry::from_wire(code, CodeType::Icd))
                    .collect();
                self.alerts = response.alerts.into_iter().map(AlertMessage::from).collect();
                info!(
                    cpt = self.cpt_codes.len(),
                    icd = self.icd_codes.len(),
                    alerts = self.alerts.len(),
                    "Suggestions loaded"
                );
            }
            Err(error) => {
                warn!(error = %error, "Suggestion fetch failed");
                self.alerts.push(AlertMessage::text(SUGGESTIONS_FAILED_ALERT));
            }
        }
        Completion::Applied
    }

    /// Begin, fetch and complete in one call.
    pub fn generate_suggestions(&mut self, api: &dyn CodingApi) -> SessionResult<Completion> {
        let token = self.begin_generate()?;
        let result = api.get_suggestions(&self.chart_text);
        Ok(self.complete_generate(token, result))
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Soft-delete an entry and prune the links that reference it.
    ///
    /// Links are pruned by the list the id actually lives in. Ids in neither
    /// list are ignored.
    pub fn remove_code(&mut self, code_type: CodeType, id: &str) {
        let Some(actual) = self.entry_type(id) else {
            debug!(code_type = %code_type, id, "Ignoring removal of unknown code");
            return;
        };
        if actual != code_type {
            warn!(requested = %code_type, actual = %actual, id, "Removal type mismatch");
        }
        self.removed.insert(id);
        match actual {
            CodeType::Cpt => {
                self.links.remove_cpt(id);
            }
            CodeType::Icd => self.links.strip_icd(id),
        }
        self.analysis_additions.retain(|addition| addition.id != id);
        info!(code_type = %actual, id, "Code removed");
    }

    /// Append an entry to the list matching its type.
    pub fn add_manual_code(&mut self, entry: CodeEntry) {
        info!(code_type = %entry.code_type(), code = %entry.code, id = %entry.id, "Code added");
        match entry.code_type() {
            CodeType::Cpt => self.cpt_codes.push(entry),
            CodeType::Icd => self.icd_codes.push(entry),
        }
    }

    /// Promote a code from the analysis. Each code is promoted at most once.
    pub fn add_code_from_analysis(
        &mut self,
        code: &str,
        code_type: AnalysisCodeType,
    ) -> AnalysisAddOutcome {
        if self.is_code_already_added(code) {
            debug!(code, "Analysis code already added");
            return AnalysisAddOutcome::AlreadyAdded;
        }

        let addition = AnalysisAddition {
            id: generate_code_id(code_type.as_str(), code),
            code: code.to_string(),
            code_type,
            source: CodeSource::Analysis,
            added_at: chrono::Utc::now().to_rfc3339(),
        };
        self.analysis_additions.push(addition.clone());

        let Some(target) = code_type.target() else {
            warn!(code, code_type = %code_type, "No list accepts this code type");
            return AnalysisAddOutcome::NoTargetList(addition);
        };

        let finding = self
            .analysis
            .as_ref()
            .and_then(|analysis| analysis.find_code(code, code_type));
        let mut entry = match target {
            CodeType::Cpt => CodeEntry::cpt(&addition.id, code, ""),
            CodeType::Icd => CodeEntry::icd(&addition.id, code, ""),
        };
        if let Some(finding) = finding {
            entry.description = finding.description.clone();
            if !finding.rationale.is_empty() {
                entry.rationale = Some(finding.rationale.clone());
            }
        }
        entry.source = CodeSource::Analysis;
        entry.added_at = Some(addition.added_at.clone());

        info!(code, code_type = %code_type, id = %entry.id, "Analysis code added");
        match target {
            CodeType::Cpt => self.cpt_codes.push(entry.clone()),
            CodeType::Icd => self.icd_codes.push(entry.clone()),
        }
        AnalysisAddOutcome::Added(entry)
    }

    pub fn is_code_already_added(&self, code: &str) -> bool {
        self.analysis_additions
            .iter()
            .any(|addition| addition.code == code)
    }

    pub fn analysis_additions(&self) -> &[AnalysisAddition] {
        &self.analysis_additions
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Replace the ICD links of a displayed CPT entry.
    pub fn update_links(&mut self, cpt_id: &str, icd_ids: Vec<String>) -> SessionResult<()> {
        let displayed = self
            .cpt_codes
            .iter()
            .any(|entry| entry.id == cpt_id && !self.removed.contains(&entry.id));
        if !displayed {
            return Err(SessionError::UnknownCode(cpt_id.to_string()));
        }

        debug!(cpt_id, links = icd_ids.len(), "Links updated");
        self.links.set(cpt_id, icd_ids);
        Ok(())
    }

    /// Stored ICD ids for a CPT entry.
    pub fn linked_icd_ids(&self, cpt_id: &str) -> &[String] {
        self.links.get(cpt_id)
    }

    /// Linked ICD entries that are still displayed, in link order.
    pub fn linked_icd_codes(&self, cpt_id: &str) -> Vec<&CodeEntry> {
        self.links
            .get(cpt_id)
            .iter()
            .filter_map(|icd_id| self.find_displayed(CodeType::Icd, icd_id))
            .collect()
    }

    pub fn links(&self) -> &LinkGraph {
        &self.links
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Entries of `code_type` that have not been removed, in insertion order.
    pub fn displayed(&self, code_type: CodeType) -> Vec<&CodeEntry> {
        self.suggestions(code_type)
            .iter()
            .filter(|entry| !self.removed.contains(&entry.id))
            .collect()
    }

    /// Every entry of `code_type`, removed ones included.
    pub fn suggestions(&self, code_type: CodeType) -> &[CodeEntry] {
        match code_type {
            CodeType::Cpt => &self.cpt_codes,
            CodeType::Icd => &self.icd_codes,
        }
    }

    pub fn removed(&self) -> &RemovalSet {
        &self.removed
    }

    pub fn alerts(&self) -> &[AlertMessage] {
        &self.alerts
    }

    pub fn loading(&self) -> LoadingFlags {
        self.requests.loading()
    }

    fn find_displayed(&self, code_type: CodeType, id: &str) -> Option<&CodeEntry> {
        self.suggestions(code_type)
            .iter()
            .find(|entry| entry.id == id && !self.removed.contains(&entry.id))
    }

    /// Which suggestion list holds `id`, if any.
    fn entry_type(&self, id: &str) -> Option<CodeType> {
        [CodeType::Cpt, CodeType::Icd]
            .into_iter()
            .find(|code_type| self.suggestions(*code_type).iter().any(|entry| entry.id == id))
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    pub fn begin_analysis(&mut self) -> SessionResult<RequestToken> {
        self.require_chart_text()?;
        let token = self.requests.issue(RequestKind::Analysis);
        info!(seq = token.seq, "Generating analysis");
        Ok(token)
    }

    pub fn complete_analysis(
        &mut self,
        token: RequestToken,
        result: ApiResult<AnalysisResponse>,
    ) -> Completion {
        if !self.requests.finish(&token) {
            debug!(seq = token.seq, "Discarding stale analysis response");
            return Completion::Stale;
        }

        match result {
            Ok(response) => {
                let analysis = AnalysisData::from(response);
                info!(
                    diagnoses = analysis.diagnoses.len(),
                    procedures = analysis.procedures.len(),
                    "Analysis loaded"
                );
                self.analysis = Some(analysis);
            }
            Err(error) => {
                warn!(error = %error, "Analysis fetch failed");
                self.alerts.push(AlertMessage::text(ANALYSIS_FAILED_ALERT));
            }
        }
        Completion::Applied
    }

    pub fn load_analysis(&mut self, api: &dyn CodingApi) -> SessionResult<Completion> {
        let token = self.begin_analysis()?;
        let result = api.get_analysis(&self.chart_text);
        Ok(self.complete_analysis(token, result))
    }

    pub fn analysis(&self) -> Option<&AnalysisData> {
        self.analysis.as_ref()
    }

    // =========================================================================
    // Rationale
    // =========================================================================

    /// Build the rationale request from the displayed codes.
    pub fn begin_rationale(&mut self) -> SessionResult<(RequestToken, RationaleRequest)> {
        let request = RationaleRequest {
            cpt_codes: self
                .displayed(CodeType::Cpt)
                .into_iter()
                .map(CodeEntry::to_submitted_cpt)
                .collect(),
            icd_codes: self
                .displayed(CodeType::Icd)
                .into_iter()
                .map(CodeEntry::to_submitted_icd)
                .collect(),
        };
        if request.cpt_codes.is_empty() && request.icd_codes.is_empty() {
            return Err(SessionError::Validation(NO_CODES_MESSAGE.to_string()));
        }

        let token = self.requests.issue(RequestKind::Rationale);
        info!(seq = token.seq, "Generating rationale");
        Ok((token, request))
    }

    pub fn complete_rationale(
        &mut self,
        token: RequestToken,
        result: ApiResult<RationaleResponse>,
    ) -> Completion {
        if !self.requests.finish(&token) {
            debug!(seq = token.seq, "Discarding stale rationale response");
            return Completion::Stale;
        }

        match result {
            Ok(response) => self.overall_rationale = Some(response.overall_rationale),
            Err(error) => {
                warn!(error = %error, "Rationale fetch failed");
                self.alerts.push(AlertMessage::text(RATIONALE_FAILED_ALERT));
            }
        }
        Completion::Applied
    }

    pub fn request_rationale(&mut self, api: &dyn CodingApi) -> SessionResult<Completion> {
        let (token, request) = self.begin_rationale()?;
        let result = api.get_rationale(&request);
        Ok(self.complete_rationale(token, result))
    }

    pub fn overall_rationale(&self) -> Option<&str> {
        self.overall_rationale.as_deref()
    }

    /// Store an operator edit of the overall rationale.
    pub fn set_overall_rationale(&mut self, text: impl Into<String>) {
        self.overall_rationale = Some(text.into());
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Assemble the submission and issue a submit token.
    pub fn begin_submit(&mut self, is_flagged: bool) -> (RequestToken, Submission) {
        let submission = SubmissionAssembler::assemble(self, is_flagged);
        self.pending_flag = Some(is_flagged);
        let token = self.requests.issue(RequestKind::Submit);
        info!(
            seq = token.seq,
            is_flagged,
            cpt = submission.cpt_codes.len(),
            icd = submission.icd_codes.len(),
            "Submitting encounter"
        );
        (token, submission)
    }

    /// Record the host's answer. Failure keeps all review state.
    pub fn complete_submit(&mut self, token: RequestToken, result: ApiResult<Value>) -> Completion {
        if !self.requests.finish(&token) {
            debug!(seq = token.seq, "Discarding stale submit response");
            return Completion::Stale;
        }

        let is_flagged = self.pending_flag.take().unwrap_or(false);
        match result {
            Ok(response) => {
                self.submit_error = None;
                self.last_submission = Some(SubmissionReceipt {
                    is_flagged,
                    submitted_at: chrono::Utc::now().to_rfc3339(),
                    response: Some(response),
                });
                info!(is_flagged, "Encounter submitted");
            }
            Err(error) => {
                warn!(error = %error, "Encounter submit failed");
                let message = error.user_message();
                self.alerts.push(AlertMessage::text(message.clone()));
                self.submit_error = Some(message);
            }
        }
        Completion::Applied
    }

    pub fn submit(&mut self, api: &dyn CodingApi, is_flagged: bool) -> Completion {
        let (token, submission) = self.begin_submit(is_flagged);
        let result = api.update_encounter(&submission.to_encounter_update());
        self.complete_submit(token, result)
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    pub fn last_submission(&self) -> Option<&SubmissionReceipt> {
        self.last_submission.as_ref()
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn to_json(&self) -> SessionResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> SessionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn require_chart_text(&self) -> SessionResult<()> {
        if self.chart_text.trim().is_empty() {
            return Err(SessionError::Validation(EMPTY_CHART_MESSAGE.to_string()));
        }
        Ok(())
    }
}
