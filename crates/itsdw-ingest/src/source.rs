//! Remote API access
//!
//! [`RecordSource`] is the seam between the pipeline and the HTTP API:
//! the orchestrator and the consolidation engine only see records or a
//! [`FetchError`]. [`ApiClient`] is the production implementation.
//!
//! Fetch failures are never fatal for a run. Callers that want the
//! "failure counts as zero records" behaviour go through [`absorb`] or
//! [`fetch_or_empty`], which log the failure kind before returning an empty
//! vector, so a failed call and a genuinely empty collection stay
//! distinguishable in the logs.

use async_trait::async_trait;
use itsdw_common::Secret;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// One flat JSON object as returned by the API
pub type Record = Map<String, Value>;

/// Default timeout for a single API request in seconds
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 45;

/// Production API base URL
pub const DEFAULT_API_BASE_URL: &str =
    "https://api-pw25-grhhckd5abhdhccd.italynorth-01.azurewebsites.net/api";

/// Remote collection names
pub mod resources {
    pub const COURSES: &str = "corsi";
    pub const TEACHERS: &str = "docenti";
    pub const ENROLLMENTS: &str = "iscrizioni";
    pub const INTERNSHIPS: &str = "stage";
    pub const COURSE_SUBJECTS: &str = "corso_materie";
    pub const COURSE_TEACHERS: &str = "corso_docenti";
    pub const STUDENT_HOURS: &str = "ore_alunno";
}

/// Query parameter names understood by the API
pub mod params {
    pub const ACADEMIC_YEAR: &str = "AnnoAccademico";
    pub const DATE_FROM: &str = "DataDa";
    pub const DATE_TO: &str = "DataA";
    pub const COURSE_YEAR_ID: &str = "idCorsoAnno";
}

/// Why a fetch produced no usable records
#[derive(Error, Debug)]
pub enum FetchError {
    /// The server answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },

    /// Timeout, DNS failure, connection reset, or a body that could not be read
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body was not JSON
    #[error("Response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON, but neither an array nor an explicit "not valid" object
    #[error("Response from {url} is a JSON {found}, expected an array")]
    UnexpectedShape { url: String, found: &'static str },
}

impl FetchError {
    /// Short machine-friendly name used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Status { .. } => "status",
            FetchError::Transport { .. } => "transport",
            FetchError::Decode { .. } => "decode",
            FetchError::UnexpectedShape { .. } => "unexpected_shape",
        }
    }
}

/// Anything that can serve named record collections
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch `resource`, filtered by `params`.
    ///
    /// `Ok(vec![])` means the source confirmed there is nothing to return.
    async fn fetch(&self, resource: &str, params: &[(&str, &str)])
        -> Result<Vec<Record>, FetchError>;
}

/// HTTP client for the academic-records API
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Secret,
}

impl ApiClient {
    /// Create a client for `base_url` authenticating with a bearer `token`
    pub fn new(
        base_url: impl Into<String>,
        token: Secret,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn resource_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource.trim_start_matches('/'))
    }
}

#[async_trait]
impl RecordSource for ApiClient {
    async fn fetch(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<Record>, FetchError> {
        let url = self.resource_url(resource);
        debug!(url = %url, params = ?params, "API request");

        let mut request = self.client.get(&url).bearer_auth(self.token.expose());
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request.send().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        let payload: Value = serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.clone(),
            source,
        })?;

        records_from_payload(&url, payload)
    }
}

/// Interpret a decoded response body.
///
/// - an array yields its object elements (other elements are skipped);
/// - an object carrying `"valid": false` is a confirmed empty result;
/// - anything else is [`FetchError::UnexpectedShape`].
pub fn records_from_payload(url: &str, payload: Value) -> Result<Vec<Record>, FetchError> {
    match payload {
        Value::Array(items) => {
            let total = items.len();
            let records: Vec<Record> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect();

            if records.len() < total {
                warn!(
                    url = %url,
                    skipped = total - records.len(),
                    "Skipped array elements that are not JSON objects"
                );
            }
            Ok(records)
        },
        Value::Object(body) if body.get("valid") == Some(&Value::Bool(false)) => {
            let message = body.get("message").and_then(Value::as_str).unwrap_or("no message");
            info!(url = %url, message = %message, "API reported no valid records");
            Ok(Vec::new())
        },
        other => Err(FetchError::UnexpectedShape {
            url: url.to_string(),
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Log the outcome of a fetch and collapse failures to an empty vector
pub fn absorb(resource: &str, result: Result<Vec<Record>, FetchError>) -> Vec<Record> {
    match result {
        Ok(records) => {
            info!(resource = %resource, records = records.len(), "Fetched records");
            records
        },
        Err(e) => {
            error!(
                resource = %resource,
                kind = e.kind(),
                error = %e,
                "Fetch failed, continuing with no records"
            );
            Vec::new()
        },
    }
}

/// Fetch `resource`, treating any failure as an empty collection
pub async fn fetch_or_empty<S>(source: &S, resource: &str, params: &[(&str, &str)]) -> Vec<Record>
where
    S: RecordSource + ?Sized,
{
    absorb(resource, source.fetch(resource, params).await)
}
