//! Blocking HTTP client for the coding API.

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::wire::{
    AnalysisResponse, CodeSearchHit, EncounterUpdateRequest, RationaleRequest, RationaleResponse,
    SearchKind, SuggestionsResponse,
};

/// Message returned when chart text is blank.
pub const EMPTY_CHART_TEXT: &str = "Chart text is required";

/// Message returned when a rationale is requested without codes.
pub const EMPTY_RATIONALE_CODES: &str = "At least one code is required";

/// Operations offered by the external coding API.
pub trait CodingApi: Send + Sync {
    /// Suggest CPT/ICD codes for a chart note.
    fn get_suggestions(&self, chart_text: &str) -> ApiResult<SuggestionsResponse>;

    /// Break a chart note down into symptoms, diagnoses, medications and procedures.
    fn get_analysis(&self, chart_text: &str) -> ApiResult<AnalysisResponse>;

    /// Autocomplete search over CPT or ICD codes.
    fn search_codes(&self, kind: SearchKind, query: &str) -> ApiResult<Vec<CodeSearchHit>>;

    /// Explain a code set.
    fn get_rationale(&self, request: &RationaleRequest) -> ApiResult<RationaleResponse>;

    /// Deliver the final code set to the host application.
    fn update_encounter(&self, request: &EncounterUpdateRequest) -> ApiResult<Value>;
}

/// Reject blank chart text before any request is made.
pub fn validate_chart_text(chart_text: &str) -> ApiResult<()> {
    if chart_text.trim().is_empty() {
        return Err(ApiError::Validation(EMPTY_CHART_TEXT.into()));
    }
    Ok(())
}

/// Reject rationale requests without codes before any request is made.
pub fn validate_rationale_request(request: &RationaleRequest) -> ApiResult<()> {
    if request.cpt_codes.is_empty() && request.icd_codes.is_empty() {
        return Err(ApiError::Validation(EMPTY_RATIONALE_CODES.into()));
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartTextRequest<'a> {
    chart_text: &'a str,
}

/// reqwest-backed implementation of [`CodingApi`].
pub struct HttpCodingApi {
    client: Client,
    config: ApiConfig,
}

impl HttpCodingApi {
    /// Create a client with the configured timeout.
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Unknown(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    fn host_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.host_base_url, path)
    }

    /// Send a request (rebuilt per attempt) under the retry policy and decode
    /// the JSON body.
    fn execute<T, F>(&self, label: &str, url: &str, build: F) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        self.config.retry.run(label, |attempt| {
            debug!(call = label, url, attempt = attempt + 1, "Sending API request");
            let response = build(&self.client)
                .send()
                .map_err(|e| self.map_transport_error(url, e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(ApiError::Server {
                    status: status.as_u16(),
                    body,
                });
            }

            response.json::<T>().map_err(|e| self.map_body_error(e))
        })
    }

    /// The body is read under the same deadline as the request.
    fn map_body_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.config.timeout)
        } else {
            ApiError::InvalidResponse(e.to_string())
        }
    }

    fn map_transport_error(&self, url: &str, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.config.timeout)
        } else if e.is_connect() || e.is_request() {
            ApiError::Network(url.to_string())
        } else {
            ApiError::Unknown(e.to_string())
        }
    }
}

impl CodingApi for HttpCodingApi {
    fn get_suggestions(&self, chart_text: &str) -> ApiResult<SuggestionsResponse> {
        validate_chart_text(chart_text)?;
        let url = self.api_url("suggestions");
        let body = ChartTextRequest { chart_text };
        self.execute("suggestions", &url, |client| client.post(&url).json(&body))
    }

    fn get_analysis(&self, chart_text: &str) -> ApiResult<AnalysisResponse> {
        validate_chart_text(chart_text)?;
        let url = self.api_url("analysis");
        let body = ChartTextRequest { chart_text };
        self.execute("analysis", &url, |client| client.post(&url).json(&body))
    }

    fn search_codes(&self, kind: SearchKind, query: &str) -> ApiResult<Vec<CodeSearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.api_url(kind.path());
        self.execute("search", &url, |client| {
            client.get(&url).query(&[("query", query)])
        })
    }

    fn get_rationale(&self, request: &RationaleRequest) -> ApiResult<RationaleResponse> {
        validate_rationale_request(request)?;
        let url = self.api_url("rationale");
        self.execute("rationale", &url, |client| client.post(&url).json(request))
    }

    fn update_encounter(&self, request: &EncounterUpdateRequest) -> ApiResult<Value> {
        let url = self.host_url("encounter/update");
        self.execute("update_encounter", &url, |client| {
            client.post(&url).json(request)
        })
    }
}
