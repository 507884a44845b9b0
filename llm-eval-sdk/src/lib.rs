//! LLM Eval SDK
//!
//! Typed access to the evaluation backend: projects, datasets, evaluation
//! parameters and experiments, plus session handling against the identity
//! provider.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use llm_eval_sdk::{IdentityClient, LlmEvalClient, SessionManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = IdentityClient::new("http://localhost:54321/auth/v1", "public-anon-key")?;
//!     let session = Arc::new(SessionManager::new(identity));
//!     session.sign_in("me@example.com", "hunter2").await?;
//!
//!     let client = LlmEvalClient::builder("http://localhost:54321/functions/v1")
//!         .with_token_source(session)
//!         .build()?;
//!
//!     for project in client.projects().list().await? {
//!         println!("{} {}", project.id, project.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! ```rust,no_run
//! use llm_eval_sdk::{LlmEvalClient, SdkError};
//! use llm_eval_core::domain::DatasetId;
//!
//! async fn show(client: &LlmEvalClient, id: DatasetId) {
//!     match client.datasets().get(id).await {
//!         Ok(dataset) => println!("{} conversations", dataset.conversations.len()),
//!         Err(SdkError::Unauthorized(msg)) => eprintln!("sign in again: {}", msg),
//!         Err(SdkError::NotFound { resource_type, resource_id }) => {
//!             eprintln!("no {} {}", resource_type, resource_id)
//!         }
//!         Err(e) => eprintln!("request failed: {}", e),
//!     }
//! }
//! ```
//!
//! Calls are made once; nothing is retried and no timeout applies unless
//! one is configured.

#![deny(unsafe_code)]

pub mod backend;
pub mod client;
pub mod collections;
pub mod config;
pub mod error;
pub mod resources;
pub mod session;

pub use client::HttpClient;
pub use collections::{DatasetList, ExperimentHistory, ParameterList, ProjectCollection};
pub use config::{AuthConfig, SdkConfig, DEFAULT_BASE_URL};
pub use error::{SdkError, SdkResult};
pub use resources::{
    DatasetsClient, ExperimentsClient, NewDataset, ParametersClient, ProjectsClient,
};
pub use session::{IdentityClient, Session, SessionManager, TokenSource, User};

use std::sync::Arc;
use std::time::Duration;

/// The main client for the evaluation backend.
///
/// Cloning is cheap; every clone shares one connection pool.
#[derive(Debug, Clone)]
pub struct LlmEvalClient {
    http_client: Arc<HttpClient>,
    projects: ProjectsClient,
    datasets: DatasetsClient,
    parameters: ParametersClient,
    experiments: ExperimentsClient,
}

impl LlmEvalClient {
    pub fn new(config: SdkConfig) -> SdkResult<Self> {
        let http_client = Arc::new(HttpClient::new(config)?);

        Ok(Self {
            projects: ProjectsClient::new(Arc::clone(&http_client)),
            datasets: DatasetsClient::new(Arc::clone(&http_client)),
            parameters: ParametersClient::new(Arc::clone(&http_client)),
            experiments: ExperimentsClient::new(Arc::clone(&http_client)),
            http_client,
        })
    }

    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub fn projects(&self) -> &ProjectsClient {
        &self.projects
    }

    pub fn datasets(&self) -> &DatasetsClient {
        &self.datasets
    }

    pub fn parameters(&self) -> &ParametersClient {
        &self.parameters
    }

    pub fn experiments(&self) -> &ExperimentsClient {
        &self.experiments
    }

    /// Get a reference to the underlying HTTP client.
    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    pub fn base_url(&self) -> &str {
        &self.http_client.config().base_url
    }
}

/// Builder for creating an [`LlmEvalClient`] with fluent configuration.
#[derive(Debug)]
pub struct ClientBuilder {
    config: SdkConfig,
}

impl ClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: SdkConfig::new(base_url),
        }
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.config = self.config.with_auth(auth);
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config = self.config.with_bearer_token(token);
        self
    }

    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.config = self.config.with_token_source(source);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.config = self.config.with_logging(enable);
        self
    }

    /// Add a custom header to all requests.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.with_header(name, value);
        self
    }

    pub fn build(self) -> SdkResult<LlmEvalClient> {
        LlmEvalClient::new(self.config)
    }
}
