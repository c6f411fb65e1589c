//! Coding Assist Core Library
//!
//! Review state for an AI-assisted clinical coding workflow.
//!
//! # Architecture
//!
//! ```text
//! Host app → EncounterDetails + chart text
//!                      │
//!              generate suggestions ──────────► Coding API (suggestions)
//!                      │
//!         ┌────────────▼────────────┐
//!         │      CodingSession      │
//!         │  CPT / ICD suggestions  │◄──── manual adds, analysis promotions
//!         │  removal set            │
//!         │  CPT → ICD links        │
//!         └────────────┬────────────┘
//!                      │
//!             displayed views (suggestions − removed)
//!                      │
//!              SubmissionAssembler
//!                      │
//!                      ▼
//!          Host app (encounter update)
//! ```
//!
//! # Core Principle
//!
//! **Nothing is submitted without operator review.** AI suggestions only
//! populate the working lists; the operator removes, adds and links codes
//! before anything is sent back to the host.
//!
//! # Modules
//!
//! - [`models`]: Domain types (CodeEntry, EncounterDetails, AnalysisData, etc.)
//! - [`session`]: Review session state and its transitions
//! - [`export`]: Submission assembly

pub mod export;
pub mod models;
pub mod session;

// Re-export commonly used types
pub use export::{Submission, SubmissionAssembler};
pub use models::{
    AlertMessage, AnalysisCategory, AnalysisCodeType, AnalysisData, AnalysisFinding, CodeEntry,
    CodeSource, CodeType, EncounterDetails, ModelError, ProviderCptCode, ProviderIcdCode,
};
pub use session::{
    AnalysisAddOutcome, CodingSession, Completion, LoadingFlags, SessionError, SessionResult,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use coding_assist_api::{
    ApiConfig, ApiError, CodeSearchHit, CodingApi, ConfigError, HttpCodingApi, MockCodingApi,
    RetryPolicy, SearchKind, SuggestionsResponse,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log filter used when the host passes none.
pub const DEFAULT_LOG_FILTER: &str = "coding_assist=info";

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum CodingAssistError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Session error: {0}")]
    SessionError(String),
}

impl From<SessionError> for CodingAssistError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Validation(message) => CodingAssistError::InvalidInput(message),
            SessionError::UnknownCode(id) => CodingAssistError::NotFound(id),
            SessionError::Model(e) => e.into(),
            SessionError::Api(e) => e.into(),
            SessionError::Serialization(e) => e.into(),
        }
    }
}

impl From<ModelError> for CodingAssistError {
    fn from(e: ModelError) -> Self {
        CodingAssistError::InvalidInput(e.to_string())
    }
}

impl From<ApiError> for CodingAssistError {
    fn from(e: ApiError) -> Self {
        CodingAssistError::ApiError(e.user_message())
    }
}

impl From<ConfigError> for CodingAssistError {
    fn from(e: ConfigError) -> Self {
        CodingAssistError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for CodingAssistError {
    fn from(e: serde_json::Error) -> Self {
        CodingAssistError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for CodingAssistError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        CodingAssistError::SessionError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install a `tracing` subscriber. Safe to call more than once.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) {
    let filter = filter.unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let env_filter =
        EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A subscriber installed earlier wins.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Open a session backed by the HTTP coding API.
///
/// Without an explicit config, settings come from `.env` and the environment.
#[uniffi::export]
pub fn open_session(
    encounter: FfiEncounter,
    provider_cpt_codes: Vec<FfiProviderCptCode>,
    provider_icd_codes: Vec<FfiProviderIcdCode>,
    config: Option<FfiApiConfig>,
) -> Result<Arc<CodingAssistCore>, CodingAssistError> {
    let config = match config {
        Some(config) => config.into(),
        None => ApiConfig::load()?,
    };
    info!(base_url = %config.base_url, host_base_url = %config.host_base_url, "Opening session");
    let api = HttpCodingApi::new(config)?;
    Ok(CodingAssistCore::new(
        encounter,
        provider_cpt_codes,
        provider_icd_codes,
        Arc::new(api),
    ))
}

/// Open a session backed by an in-process API (for testing and demos).
///
/// `suggestions_json` is returned by every suggestion fetch.
#[uniffi::export]
pub fn open_session_with_mock(
    encounter: FfiEncounter,
    suggestions_json: Option<String>,
) -> Result<Arc<CodingAssistCore>, CodingAssistError> {
    let suggestions: SuggestionsResponse = match suggestions_json {
        Some(json) => serde_json::from_str(&json)?,
        None => SuggestionsResponse::default(),
    };
    let api = MockCodingApi::new().with_suggestions(Ok(suggestions));
    Ok(CodingAssistCore::new(
        encounter,
        Vec::new(),
        Vec::new(),
        Arc::new(api),
    ))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe session wrapper for FFI.
///
/// The lock is held only while session state changes; API calls run with it
/// released so other operations stay responsive.
#[derive(uniffi::Object)]
pub struct CodingAssistCore {
    session: Mutex<CodingSession>,
    api: Arc<dyn CodingApi>,
}

impl CodingAssistCore {
    /// Build a core over any API implementation.
    pub fn new(
        encounter: FfiEncounter,
        provider_cpt_codes: Vec<FfiProviderCptCode>,
        provider_icd_codes: Vec<FfiProviderIcdCode>,
        api: Arc<dyn CodingApi>,
    ) -> Arc<Self> {
        let session = CodingSession::new(
            encounter.into(),
            provider_cpt_codes.into_iter().map(Into::into).collect(),
            provider_icd_codes.into_iter().map(Into::into).collect(),
        );
        Arc::new(Self {
            session: Mutex::new(session),
            api,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, CodingSession>, CodingAssistError> {
        Ok(self.session.lock()?)
    }
}

#[uniffi::export]
impl CodingAssistCore {
    // =========================================================================
    // Chart & Encounter
    // =========================================================================

    pub fn chart_text(&self) -> Result<String, CodingAssistError> {
        Ok(self.lock()?.chart_text().to_string())
    }

    pub fn set_chart_text(&self, text: String) -> Result<(), CodingAssistError> {
        self.lock()?.set_chart_text(text);
        Ok(())
    }

    pub fn provider_cpt_codes(&self) -> Result<Vec<FfiProviderCptCode>, CodingAssistError> {
        let session = self.lock()?;
        Ok(session
            .provider_cpt_codes()
            .iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    pub fn provider_icd_codes(&self) -> Result<Vec<FfiProviderIcdCode>, CodingAssistError> {
        let session = self.lock()?;
        Ok(session
            .provider_icd_codes()
            .iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    // =========================================================================
    // Suggestions
    // =========================================================================

    /// Fetch suggestions for the current chart text.
    ///
    /// Returns false when a newer fetch superseded this one.
    pub fn generate_suggestions(&self) -> Result<bool, CodingAssistError> {
        let (token, chart_text) = {
            let mut session = self.lock()?;
            let token = session.begin_generate()?;
            (token, session.chart_text().to_string())
        };
        let result = self.api.get_suggestions(&chart_text);
        let completion = self.lock()?.complete_generate(token, result);
        Ok(completion == Completion::Applied)
    }

    /// Displayed codes of a type (`cpt` or `icd`).
    pub fn displayed_codes(&self, code_type: String) -> Result<Vec<FfiCodeEntry>, CodingAssistError> {
        let code_type: CodeType = code_type.parse()?;
        let session = self.lock()?;
        Ok(session
            .displayed(code_type)
            .into_iter()
            .map(FfiCodeEntry::from)
            .collect())
    }

    pub fn alerts(&self) -> Result<Vec<FfiAlert>, CodingAssistError> {
        let session = self.lock()?;
        Ok(session.alerts().iter().map(FfiAlert::from).collect())
    }

    pub fn loading_state(&self) -> Result<FfiLoadingState, CodingAssistError> {
        Ok(self.lock()?.loading().into())
    }

    // =========================================================================
    // Editing
    // =========================================================================

    pub fn remove_code(&self, code_type: String, id: String) -> Result<(), CodingAssistError> {
        let code_type: CodeType = code_type.parse()?;
        self.lock()?.remove_code(code_type, &id);
        Ok(())
    }

    pub fn add_manual_cpt(
        &self,
        code: String,
        description: String,
        unit: u32,
        modifiers: Vec<String>,
        rationale: Option<String>,
    ) -> Result<FfiCodeEntry, CodingAssistError> {
        let entry = CodeEntry::manual_cpt(&code, &description, unit, &modifiers, rationale)?;
        let ffi = FfiCodeEntry::from(&entry);
        self.lock()?.add_manual_code(entry);
        Ok(ffi)
    }

    pub fn add_manual_icd(
        &self,
        code: String,
        description: String,
        rationale: Option<String>,
    ) -> Result<FfiCodeEntry, CodingAssistError> {
        let entry = CodeEntry::manual_icd(&code, &description, rationale)?;
        let ffi = FfiCodeEntry::from(&entry);
        self.lock()?.add_manual_code(entry);
        Ok(ffi)
    }

    /// Promote an analysis code (`ICD`, `CPT` or `HCPCS`).
    pub fn add_code_from_analysis(
        &self,
        code: String,
        code_type: String,
    ) -> Result<FfiAnalysisAddOutcome, CodingAssistError> {
        let code_type: AnalysisCodeType = code_type.parse()?;
        let outcome = self.lock()?.add_code_from_analysis(&code, code_type);
        Ok(outcome.into())
    }

    pub fn is_code_already_added(&self, code: String) -> Result<bool, CodingAssistError> {
        Ok(self.lock()?.is_code_already_added(&code))
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Replace the ICD links of a CPT entry.
    pub fn update_links(&self, cpt_id: String, icd_ids: Vec<String>) -> Result<(), CodingAssistError> {
        self.lock()?.update_links(&cpt_id, icd_ids)?;
        Ok(())
    }

    /// Displayed ICD entries linked to a CPT entry.
    pub fn linked_icds(&self, cpt_id: String) -> Result<Vec<FfiCodeEntry>, CodingAssistError> {
        let session = self.lock()?;
        Ok(session
            .linked_icd_codes(&cpt_id)
            .into_iter()
            .map(FfiCodeEntry::from)
            .collect())
    }

    // =========================================================================
    // Analysis & Rationale
    // =========================================================================

    /// Fetch the in-depth analysis. Returns false when superseded.
    pub fn load_analysis(&self) -> Result<bool, CodingAssistError> {
        let (token, chart_text) = {
            let mut session = self.lock()?;
            let token = session.begin_analysis()?;
            (token, session.chart_text().to_string())
        };
        let result = self.api.get_analysis(&chart_text);
        let completion = self.lock()?.complete_analysis(token, result);
        Ok(completion == Completion::Applied)
    }

    /// Findings from the last analysis, flattened across categories.
    pub fn analysis_findings(&self) -> Result<Vec<FfiAnalysisFinding>, CodingAssistError> {
        let guard = self.lock()?;
        let session: &CodingSession = &guard;
        let Some(analysis) = session.analysis() else {
            return Ok(Vec::new());
        };
        Ok(AnalysisCategory::ALL
            .into_iter()
            .flat_map(|category| {
                analysis.findings(category).iter().map(move |finding| FfiAnalysisFinding {
                    category: category.as_str().to_string(),
                    code_type: category.code_type().to_string(),
                    code: finding.code.clone(),
                    description: finding.description.clone(),
                    rationale: finding.rationale.clone(),
                    already_added: finding
                        .code
                        .as_deref()
                        .is_some_and(|code| session.is_code_already_added(code)),
                })
            })
            .collect())
    }

    /// Fetch an overall rationale for the displayed codes. Returns false when superseded.
    pub fn request_rationale(&self) -> Result<bool, CodingAssistError> {
        let (token, request) = self.lock()?.begin_rationale()?;
        let result = self.api.get_rationale(&request);
        let completion = self.lock()?.complete_rationale(token, result);
        Ok(completion == Completion::Applied)
    }

    pub fn overall_rationale(&self) -> Result<Option<String>, CodingAssistError> {
        Ok(self.lock()?.overall_rationale().map(String::from))
    }

    pub fn set_overall_rationale(&self, text: String) -> Result<(), CodingAssistError> {
        self.lock()?.set_overall_rationale(text);
        Ok(())
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Search the CPT or ICD table. Errors are returned, not turned into alerts.
    pub fn search_codes(
        &self,
        code_type: String,
        query: String,
    ) -> Result<Vec<FfiSearchHit>, CodingAssistError> {
        let kind = match code_type.parse::<CodeType>()? {
            CodeType::Cpt => SearchKind::Cpt,
            CodeType::Icd => SearchKind::Icd,
        };
        let hits = self.api.search_codes(kind, &query)?;
        Ok(hits.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Assemble and send the submission to the host.
    pub fn submit(&self, is_flagged: bool) -> Result<FfiSubmitResult, CodingAssistError> {
        let (token, submission) = self.lock()?.begin_submit(is_flagged);
        let submission_json = submission.to_json()?;
        let result = self.api.update_encounter(&submission.to_encounter_update());

        let mut session = self.lock()?;
        let completion = session.complete_submit(token, result);
        Ok(FfiSubmitResult::from_completion(
            completion,
            &session,
            submission_json,
        ))
    }

    /// Preview the submission without sending it.
    pub fn submission_json(&self, is_flagged: bool) -> Result<String, CodingAssistError> {
        let session = self.lock()?;
        Ok(SubmissionAssembler::assemble(&session, is_flagged).to_json()?)
    }

    /// Snapshot of the whole session as JSON.
    pub fn session_json(&self) -> Result<String, CodingAssistError> {
        Ok(self.lock()?.to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe API configuration.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiApiConfig {
    pub base_url: String,
    pub host_base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl From<FfiApiConfig> for ApiConfig {
    fn from(config: FfiApiConfig) -> Self {
        ApiConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            host_base_url: config.host_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_delay_ms),
            },
        }
    }
}

/// FFI-safe encounter details.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiEncounter {
    pub encounter_number: String,
    pub account_number: String,
    pub insurance: String,
    pub provider: String,
    pub status: String,
    pub date_of_service: String,
    pub chart_text: String,
}

impl From<FfiEncounter> for EncounterDetails {
    fn from(enc: FfiEncounter) -> Self {
        EncounterDetails {
            encounter_number: enc.encounter_number,
            account_number: enc.account_number,
            insurance: enc.insurance,
            provider: enc.provider,
            status: enc.status,
            date_of_service: enc.date_of_service,
            chart_text: enc.chart_text,
        }
    }
}

/// FFI-safe provider CPT code.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProviderCptCode {
    pub code: String,
    pub modifiers: Vec<String>,
    pub units: u32,
    pub description: Option<String>,
    pub rationale: Option<String>,
}

impl From<FfiProviderCptCode> for ProviderCptCode {
    fn from(code: FfiProviderCptCode) -> Self {
        ProviderCptCode {
            code: code.code,
            modifiers: code.modifiers,
            units: code.units.max(1),
            description: code.description,
            rationale: code.rationale,
        }
    }
}

impl From<ProviderCptCode> for FfiProviderCptCode {
    fn from(code: ProviderCptCode) -> Self {
        Self {
            code: code.code,
            modifiers: code.modifiers,
            units: code.units,
            description: code.description,
            rationale: code.rationale,
        }
    }
}

/// FFI-safe provider ICD code.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProviderIcdCode {
    pub code: String,
    pub description: Option<String>,
    pub rationale: Option<String>,
}

impl From<FfiProviderIcdCode> for ProviderIcdCode {
    fn from(code: FfiProviderIcdCode) -> Self {
        ProviderIcdCode {
            code: code.code,
            description: code.description,
            rationale: code.rationale,
        }
    }
}

impl From<ProviderIcdCode> for FfiProviderIcdCode {
    fn from(code: ProviderIcdCode) -> Self {
        Self {
            code: code.code,
            description: code.description,
            rationale: code.rationale,
        }
    }
}

/// FFI-safe code entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCodeEntry {
    pub id: String,
    pub code: String,
    pub code_type: String,
    pub description: String,
    pub is_manual: bool,
    pub rationale: Option<String>,
    pub source: String,
    pub unit: u32,
    pub modifiers: Vec<String>,
}

impl From<&CodeEntry> for FfiCodeEntry {
    fn from(entry: &CodeEntry) -> Self {
        Self {
            id: entry.id.clone(),
            code: entry.code.clone(),
            code_type: entry.code_type().to_string(),
            description: entry.description.clone(),
            is_manual: entry.is_manual,
            rationale: entry.rationale.clone(),
            source: entry.source.as_str().to_string(),
            unit: entry.unit(),
            modifiers: entry.modifiers().to_vec(),
        }
    }
}

/// FFI-safe alert. Structured metadata is passed as JSON text.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAlert {
    pub message: String,
    pub metadata_json: Option<String>,
}

impl From<&AlertMessage> for FfiAlert {
    fn from(alert: &AlertMessage) -> Self {
        Self {
            message: alert.message.clone(),
            metadata_json: alert.metadata.as_ref().map(|m| m.to_string()),
        }
    }
}

/// FFI-safe loading flags.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLoadingState {
    pub suggestions: bool,
    pub analysis: bool,
    pub rationale: bool,
    pub submit: bool,
}

impl From<LoadingFlags> for FfiLoadingState {
    fn from(flags: LoadingFlags) -> Self {
        Self {
            suggestions: flags.suggestions,
            analysis: flags.analysis,
            rationale: flags.rationale,
            submit: flags.submit,
        }
    }
}

/// FFI-safe analysis finding.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAnalysisFinding {
    pub category: String,
    pub code_type: String,
    pub code: Option<String>,
    pub description: String,
    pub rationale: String,
    pub already_added: bool,
}

/// FFI-safe analysis promotion outcome.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiAnalysisAddOutcome {
    Added { entry: FfiCodeEntry },
    AlreadyAdded,
    NoTargetList { id: String },
}

impl From<AnalysisAddOutcome> for FfiAnalysisAddOutcome {
    fn from(outcome: AnalysisAddOutcome) -> Self {
        match outcome {
            AnalysisAddOutcome::Added(entry) => FfiAnalysisAddOutcome::Added {
                entry: FfiCodeEntry::from(&entry),
            },
            AnalysisAddOutcome::AlreadyAdded => FfiAnalysisAddOutcome::AlreadyAdded,
            AnalysisAddOutcome::NoTargetList(addition) => {
                FfiAnalysisAddOutcome::NoTargetList { id: addition.id }
            }
        }
    }
}

/// FFI-safe code search hit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSearchHit {
    pub code: String,
    pub description: String,
    pub modifiers: Vec<String>,
    pub category: Option<String>,
}

impl From<CodeSearchHit> for FfiSearchHit {
    fn from(hit: CodeSearchHit) -> Self {
        Self {
            code: hit.code,
            description: hit.description,
            modifiers: hit.modifiers,
            category: hit.category,
        }
    }
}

/// FFI-safe submit result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSubmitResult {
    /// False when a newer submit superseded this one
    pub applied: bool,
    pub success: bool,
    /// User-visible failure message
    pub error: Option<String>,
    pub submission_json: String,
}

impl FfiSubmitResult {
    /// Outcome fields are filled only when this submit's completion was applied.
    fn from_completion(
        completion: Completion,
        session: &CodingSession,
        submission_json: String,
    ) -> Self {
        match completion {
            Completion::Applied => Self {
                applied: true,
                success: session.submit_error().is_none() && session.last_submission().is_some(),
                error: session.submit_error().map(String::from),
                submission_json,
            },
            Completion::Stale => Self {
                applied: false,
                success: false,
                error: None,
                submission_json,
            },
        }
    }
}
