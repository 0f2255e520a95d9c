//! Authenticated fetch adapter
//!
//! Wraps outgoing requests to the marketplace API with the stored bearer
//! token (only while it is unexpired) and the session's cookie credentials.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::auth::TokenStore;
use crate::error::{ClientError, ClientResult};

/// Default timeout for API requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the marketplace API
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    tokens: TokenStore,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: Url, tokens: TokenStore, timeout: Duration) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            tokens,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Resolve an API path against the base URL
    pub fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| ClientError::InvalidPath(path.to_string()))
    }

    /// Start a request carrying the caller's credentials
    ///
    /// The bearer header is attached only when a stored token is present and
    /// unexpired; cookies ride along either way.
    pub fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        let mut builder = self
            .http
            .request(method, url)
            .header("Accept", "application/json");

        if let Some((token, _claims)) = self.tokens.valid_token()? {
            builder = builder.bearer_auth(token);
        }

        Ok(builder)
    }

    /// GET a JSON resource
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let response = self.request(Method::GET, path)?.query(query).send().await?;
        read_json(response).await
    }

    /// POST a JSON body and read a JSON response
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.request(Method::POST, path)?.json(body).send().await?;
        read_json(response).await
    }

    /// POST without caring about the response body
    pub async fn post_empty(&self, path: &str) -> ClientResult<()> {
        let response = self.request(Method::POST, path)?.send().await?;
        check_status(response).await.map(|_| ())
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        }),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let body = check_status(response).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Pull a human-readable message out of an API error body
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}
