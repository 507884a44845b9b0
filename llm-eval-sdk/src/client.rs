//! HTTP client implementation
//!
//! A thin JSON-over-HTTP layer: one attempt per call, bearer authentication
//! from the configured [`AuthConfig`], and non-2xx responses mapped to
//! [`SdkError`].

use crate::config::{AuthConfig, SdkConfig};
use crate::error::{SdkError, SdkResult};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// The HTTP client for making API requests
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: Arc<SdkConfig>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: SdkConfig) -> SdkResult<Self> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        for (name, value) in &config.custom_headers {
            let name = header::HeaderName::try_from(name.as_str()).map_err(|_| {
                SdkError::ConfigurationError(format!("invalid header name: {}", name))
            })?;
            let value = header::HeaderValue::try_from(value.as_str()).map_err(|_| {
                SdkError::ConfigurationError(format!("invalid value for header {}", name))
            })?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .gzip(true)
            .brotli(true);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().map_err(SdkError::NetworkError)?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Same connection pool and settings, different credentials.
    pub fn with_auth(&self, auth: AuthConfig) -> Self {
        let mut config = (*self.config).clone();
        config.auth = auth;
        Self {
            client: self.client.clone(),
            config: Arc::new(config),
        }
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Build the full URL for an endpoint
    pub fn url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> SdkResult<T> {
        let response = self.send::<(), ()>(Method::GET, path, None, None).await?;
        self.read_json(response).await
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> SdkResult<T> {
        let response = self
            .send::<(), Q>(Method::GET, path, None, Some(query))
            .await?;
        self.read_json(response).await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> SdkResult<T> {
        let response = self
            .send::<B, ()>(Method::POST, path, Some(body), None)
            .await?;
        self.read_json(response).await
    }

    /// Make a POST request with query parameters
    pub async fn post_with_query<T: DeserializeOwned, B: Serialize + ?Sized, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        query: &Q,
    ) -> SdkResult<T> {
        let response = self
            .send(Method::POST, path, Some(body), Some(query))
            .await?;
        self.read_json(response).await
    }

    /// Make a POST request whose response body is ignored
    pub async fn post_no_response<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> SdkResult<()> {
        let response = self
            .send::<B, ()>(Method::POST, path, Some(body), None)
            .await?;
        self.expect_success(response).await
    }

    async fn send<B: Serialize + ?Sized, Q: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: Option<&Q>,
    ) -> SdkResult<Response> {
        let url = self.url(path);
        let mut request = self.client.request(method.clone(), &url);
        request = self.authorize(request).await?;

        if let Some(q) = query {
            request = request.query(q);
        }
        if let Some(body) = body {
            let body_json = serde_json::to_string(body)?;
            if self.config.enable_logging {
                debug!("Request body: {}", body_json);
            }
            request = request.body(body_json);
        }

        debug!(%method, path, "sending request");
        request.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "request failed");
            match self.config.timeout {
                Some(timeout) if e.is_timeout() => SdkError::Timeout(timeout.as_secs()),
                _ => SdkError::NetworkError(e),
            }
        })
    }

    /// Add authentication to a request
    async fn authorize(&self, request: RequestBuilder) -> SdkResult<RequestBuilder> {
        Ok(match &self.config.auth {
            AuthConfig::None => request,
            AuthConfig::BearerToken(token) => request.bearer_auth(token),
            AuthConfig::Session(source) => request.bearer_auth(source.access_token().await?),
        })
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> SdkResult<T> {
        let status = response.status();
        let request_id = request_id(&response);
        let text = response.text().await.map_err(SdkError::NetworkError)?;

        if self.config.enable_logging {
            debug!("Response body: {}", text);
        }

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(%status, error = %e, "malformed response body");
                SdkError::SerializationError(e)
            })
        } else {
            Err(self.handle_error_response(status, &text, request_id))
        }
    }

    async fn expect_success(&self, response: Response) -> SdkResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let request_id = request_id(&response);
        let text = response.text().await.map_err(SdkError::NetworkError)?;
        Err(self.handle_error_response(status, &text, request_id))
    }

    fn handle_error_response(
        &self,
        status: StatusCode,
        body: &str,
        request_id: Option<String>,
    ) -> SdkError {
        let error = SdkError::from_response(status.as_u16(), body, request_id);
        warn!(%status, error = %error, "backend returned an error");
        error
    }
}

fn request_id(response: &Response) -> Option<String> {
    response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
