//! Eversports widget slot API client.
//!
//! The widget endpoint is not a public API. It answers with a JSON object
//! holding a `slots` array, but only when the request looks like it came from
//! the booking widget in a browser (User-Agent, X-Requested-With, Referer).
//! None of these are authentication.

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use std::time::Duration;

use crate::errors::AppError;

/// Default slot endpoint.
pub const EVERSPORTS_API_URL: &str = "https://www.eversports.de/widget/api/slot";

/// Browser User-Agent; the widget endpoint rejects obvious non-browser clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

const WIDGET_REFERER_BASE: &str = "https://www.eversports.de/widget/w";

/// One slot query: facility, sport, courts and the first day to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityQuery {
    pub facility_id: String,
    pub sport: String,
    /// Trimmed, non-empty, in the order supplied. Duplicates are kept.
    pub court_ids: Vec<String>,
    pub reference_date: NaiveDate,
}

impl FacilityQuery {
    /// Validate and normalise a query. `court_ids` is the comma-separated
    /// list as entered by the user.
    pub fn new(
        facility_id: &str,
        sport: &str,
        court_ids: &str,
        reference_date: NaiveDate,
    ) -> Result<Self, AppError> {
        let facility_id = facility_id.trim();
        let sport = sport.trim();
        if facility_id.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "facility id must not be empty".to_string(),
            ));
        }
        if sport.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "sport must not be empty".to_string(),
            ));
        }

        let court_ids = parse_court_ids(court_ids);
        if court_ids.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "court ids must contain at least one non-empty identifier".to_string(),
            ));
        }

        Ok(Self {
            facility_id: facility_id.to_string(),
            sport: sport.to_string(),
            court_ids,
            reference_date,
        })
    }
}

/// Split a comma-separated court list, trimming each entry and dropping empties.
pub fn parse_court_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// A fully built slot request: URL plus the headers the widget endpoint expects.
///
/// Query values are form-encoded, so `courts[]` goes out as `courts%5B%5D`.
#[derive(Debug, Clone)]
pub struct SlotRequest {
    pub url: String,
    pub headers: HeaderMap,
}

/// Build the request for a query. No I/O.
pub fn build_query(
    base_url: &str,
    user_agent: &str,
    query: &FacilityQuery,
) -> Result<SlotRequest, AppError> {
    if query.court_ids.is_empty() {
        return Err(AppError::InvalidConfiguration(
            "court ids must contain at least one non-empty identifier".to_string(),
        ));
    }

    let mut url = reqwest::Url::parse(base_url).map_err(|e| {
        AppError::InvalidConfiguration(format!("Invalid base URL '{}': {}", base_url, e))
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("facilityId", &query.facility_id)
            .append_pair("sport", &query.sport)
            .append_pair(
                "startDate",
                &query.reference_date.format("%Y-%m-%d").to_string(),
            );
        for id in &query.court_ids {
            pairs.append_pair("courts[]", id);
        }
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).map_err(|e| {
            AppError::InvalidConfiguration(format!("Invalid User-Agent: {}", e))
        })?,
    );
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    headers.insert(
        REFERER,
        HeaderValue::from_str(&format!("{}/{}", WIDGET_REFERER_BASE, query.facility_id))
            .map_err(|e| AppError::InvalidConfiguration(format!("Invalid facility id: {}", e)))?,
    );

    Ok(SlotRequest {
        url: url.to_string(),
        headers,
    })
}

/// Client for the Eversports widget slot endpoint.
#[derive(Debug, Clone)]
pub struct EversportsClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl EversportsClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    /// Build the request for `query` against this client's endpoint.
    pub fn build_request(&self, query: &FacilityQuery) -> Result<SlotRequest, AppError> {
        build_query(&self.base_url, &self.user_agent, query)
    }

    /// Execute a slot request and return the raw records of the `slots` array.
    ///
    /// Individual records are not interpreted here; that is the availability
    /// engine's job, which skips bad records instead of failing the cycle.
    pub async fn fetch_slots(
        &self,
        request: &SlotRequest,
    ) -> Result<Vec<serde_json::Value>, AppError> {
        let response = self
            .client
            .get(&request.url)
            .headers(request.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let slots = parse_slots_body(&body).inspect_err(|e| {
            tracing::warn!("Eversports response unusable ({}); raw body: {}", e, body);
        })?;

        tracing::debug!(
            "Eversports response received: {} slot records from {}",
            slots.len(),
            request.url
        );

        Ok(slots)
    }
}

/// Extract the `slots` array from a response body.
pub fn parse_slots_body(body: &str) -> Result<Vec<serde_json::Value>, AppError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| AppError::MalformedResponse {
            message: format!("invalid JSON: {}", e),
            body: body.to_string(),
        })?;

    match value {
        serde_json::Value::Object(mut map) => match map.remove("slots") {
            Some(serde_json::Value::Array(slots)) => Ok(slots),
            Some(_) => Err(AppError::MalformedResponse {
                message: "'slots' is not an array".to_string(),
                body: body.to_string(),
            }),
            None => Err(AppError::MalformedResponse {
                message: "missing 'slots' key".to_string(),
                body: body.to_string(),
            }),
        },
        _ => Err(AppError::MalformedResponse {
            message: "top level is not an object".to_string(),
            body: body.to_string(),
        }),
    }
}
