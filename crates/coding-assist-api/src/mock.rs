//! In-process coding API for tests and demos.

use std::sync::Mutex;

use serde_json::{json, Value};

use crate::catalog::CodeCatalog;
use crate::client::{validate_chart_text, validate_rationale_request, CodingApi};
use crate::error::{ApiError, ApiResult};
use crate::wire::{
    AnalysisResponse, CodeSearchHit, EncounterUpdateRequest, RationaleRequest, RationaleResponse,
    SearchKind, SuggestionsResponse,
};

/// A call observed by [`MockCodingApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Suggestions(String),
    Analysis(String),
    Search(SearchKind, String),
    Rationale(RationaleRequest),
    UpdateEncounter(EncounterUpdateRequest),
}

/// Mock API returning configurable responses and recording every call.
///
/// Validation mirrors the HTTP client: blank chart text and empty rationale
/// requests fail without being recorded.
pub struct MockCodingApi {
    suggestions: Mutex<ApiResult<SuggestionsResponse>>,
    analysis: Mutex<ApiResult<AnalysisResponse>>,
    rationale: Mutex<ApiResult<RationaleResponse>>,
    update: Mutex<ApiResult<Value>>,
    search_failure: Mutex<Option<ApiError>>,
    catalog: CodeCatalog,
    calls: Mutex<Vec<MockCall>>,
}

impl Default for MockCodingApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCodingApi {
    /// Empty responses for everything, reference catalog for search.
    pub fn new() -> Self {
        Self {
            suggestions: Mutex::new(Ok(SuggestionsResponse::default())),
            analysis: Mutex::new(Ok(AnalysisResponse::default())),
            rationale: Mutex::new(Ok(RationaleResponse::default())),
            update: Mutex::new(Ok(json!({ "success": true }))),
            search_failure: Mutex::new(None),
            catalog: CodeCatalog::reference(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_suggestions(self, response: ApiResult<SuggestionsResponse>) -> Self {
        self.set_suggestions(response);
        self
    }

    pub fn with_analysis(self, response: ApiResult<AnalysisResponse>) -> Self {
        self.set_analysis(response);
        self
    }

    pub fn with_rationale(self, response: ApiResult<RationaleResponse>) -> Self {
        self.set_rationale(response);
        self
    }

    pub fn with_update(self, response: ApiResult<Value>) -> Self {
        self.set_update(response);
        self
    }

    pub fn with_search_failure(self, error: ApiError) -> Self {
        *lock(&self.search_failure) = Some(error);
        self
    }

    pub fn with_catalog(mut self, catalog: CodeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn set_suggestions(&self, response: ApiResult<SuggestionsResponse>) {
        *lock(&self.suggestions) = response;
    }

    pub fn set_analysis(&self, response: ApiResult<AnalysisResponse>) {
        *lock(&self.analysis) = response;
    }

    pub fn set_rationale(&self, response: ApiResult<RationaleResponse>) {
        *lock(&self.rationale) = response;
    }

    pub fn set_update(&self, response: ApiResult<Value>) {
        *lock(&self.update) = response;
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }
}

/// Lock a mutex, recovering the data if a panicking test poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CodingApi for MockCodingApi {
    fn get_suggestions(&self, chart_text: &str) -> ApiResult<SuggestionsResponse> {
        validate_chart_text(chart_text)?;
        self.record(MockCall::Suggestions(chart_text.to_string()));
        lock(&self.suggestions).clone()
    }

    fn get_analysis(&self, chart_text: &str) -> ApiResult<AnalysisResponse> {
        validate_chart_text(chart_text)?;
        self.record(MockCall::Analysis(chart_text.to_string()));
        lock(&self.analysis).clone()
    }

    fn search_codes(&self, kind: SearchKind, query: &str) -> ApiResult<Vec<CodeSearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.record(MockCall::Search(kind, query.to_string()));
        if let Some(error) = lock(&self.search_failure).clone() {
            return Err(error);
        }
        Ok(self.catalog.search(kind, query, 20))
    }

    fn get_rationale(&self, request: &RationaleRequest) -> ApiResult<RationaleResponse> {
        validate_rationale_request(request)?;
        self.record(MockCall::Rationale(request.clone()));
        lock(&self.rationale).clone()
    }

    fn update_encounter(&self, request: &EncounterUpdateRequest) -> ApiResult<Value> {
        self.record(MockCall::UpdateEncounter(request.clone()));
        lock(&self.update).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireCode;

    #[test]
    fn test_records_calls() {
        let api = MockCodingApi::new().with_suggestions(Ok(SuggestionsResponse {
            cpt_codes: vec![WireCode {
                id: Some("c1".into()),
                code: "99213".into(),
                ..Default::default()
            }],
            ..Default::default()
        }));

        let response = api.get_suggestions("Patient has cough").unwrap();
        assert_eq!(response.cpt_codes.len(), 1);
        assert_eq!(
            api.calls(),
            vec![MockCall::Suggestions("Patient has cough".into())]
        );
    }

    #[test]
    fn test_validation_is_not_recorded() {
        let api = MockCodingApi::new();
        assert!(api.get_suggestions("  ").is_err());
        assert!(api.get_rationale(&RationaleRequest::default()).is_err());
        assert!(api.search_codes(SearchKind::Icd, "").unwrap().is_empty());
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn test_search_uses_catalog() {
        let api = MockCodingApi::new();
        let hits = api.search_codes(SearchKind::Icd, "cough").unwrap();
        assert_eq!(hits[0].code, "R05");
    }

    #[test]
    fn test_search_failure() {
        let api = MockCodingApi::new().with_search_failure(ApiError::Network("mock".into()));
        let err = api.search_codes(SearchKind::Cpt, "992").unwrap_err();
        assert_eq!(err.user_message(), ApiError::Network(String::new()).user_message());
    }

    #[test]
    fn test_failure_response() {
        let api = MockCodingApi::new()
            .with_update(Err(ApiError::Server { status: 500, body: "boom".into() }));
        let request = EncounterUpdateRequest {
            encounter_id: "ENC1".into(),
            codes: Default::default(),
            is_flagged: false,
        };
        assert!(matches!(
            api.update_encounter(&request),
            Err(ApiError::Server { status: 500, .. })
        ));
    }
}
