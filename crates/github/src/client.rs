//! GitHub GraphQL transport over HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};
use url::Url;

use stargaze_core::error::{FetchError, FetchResult};
use stargaze_core::ports::GraphQLTransport;

/// Public GitHub GraphQL endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

/// Error bodies are cut to this many bytes before being surfaced.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Configuration for the GitHub client.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// GraphQL endpoint (e.g., "https://api.github.com/graphql").
    pub endpoint: String,
    /// Personal access token sent as a bearer token.
    pub token: Option<String>,
    /// `User-Agent` header; GitHub rejects requests without one.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            user_agent: concat!("stargaze/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// GitHub client adapter implementing the GraphQLTransport port.
pub struct GitHubClient {
    http: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQLErrorMessage>,
}

#[derive(Deserialize)]
struct GraphQLErrorMessage {
    message: String,
}

impl GitHubClient {
    /// Build a client. No request is sent until the first query.
    #[instrument(skip_all, fields(endpoint = %config.endpoint))]
    pub fn new(config: GitHubClientConfig) -> FetchResult<Self> {
        let endpoint = parse_endpoint(&config.endpoint)?;

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        debug!(authenticated = config.token.is_some(), "GitHub client ready");

        Ok(Self {
            http,
            endpoint,
            token: config.token.filter(|t| !t.is_empty()),
        })
    }

    /// Endpoint this client posts to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GraphQLTransport for GitHubClient {
    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> FetchResult<serde_json::Value> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .json(&GraphQLRequest { query, variables });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        trace!(status = status.as_u16(), bytes = body.len(), "GraphQL response");

        check_status(status, &body)?;
        parse_response(&body)
    }
}

// =============================================================================
// Response handling helpers
// =============================================================================

/// Validate an endpoint URL.
fn parse_endpoint(endpoint: &str) -> FetchResult<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| FetchError::InvalidRequest(format!("invalid endpoint '{}': {}", endpoint, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(FetchError::InvalidRequest(format!(
            "unsupported endpoint scheme '{}'",
            scheme
        ))),
    }
}

/// Map non-success statuses to errors.
fn check_status(status: StatusCode, body: &str) -> FetchResult<()> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(FetchError::Unauthorized(truncate(body)));
    }
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
            body: truncate(body),
        });
    }
    Ok(())
}

/// Extract `data` from a GraphQL response body.
///
/// Any entry in `errors` fails the whole request, even when partial
/// `data` is present.
fn parse_response(body: &str) -> FetchResult<serde_json::Value> {
    let response: GraphQLResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(FetchError::GraphQl(messages.join("; ")));
    }

    response
        .data
        .ok_or_else(|| FetchError::Decode("response has no data".into()))
}

/// Cut a body to `MAX_ERROR_BODY_LEN` bytes on a char boundary.
fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}
