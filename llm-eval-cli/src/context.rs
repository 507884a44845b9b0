//! CLI execution context

use anyhow::{bail, Context as _, Result};
use clap::ValueEnum;
use llm_eval_core::domain::{Project, ProjectId};
use llm_eval_sdk::{
    AuthConfig, IdentityClient, LlmEvalClient, ProjectCollection, SdkConfig, Session,
    SessionManager, TokenSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::config::{self, CliConfig, Credentials, Profile, ProfileCredentials};
use crate::output::{OutputFormat, OutputWriter};

/// Profile used when none is given and no default is configured
pub const DEFAULT_PROFILE: &str = "default";

/// Execution context for CLI commands
pub struct Context {
    /// CLI configuration
    pub config: CliConfig,

    /// Credentials as loaded at startup
    pub credentials: Credentials,

    /// Active profile name
    pub profile_name: String,

    /// Active profile
    pub profile: Profile,

    /// Output writer
    pub output: OutputWriter,

    /// Verbose mode
    pub verbose: bool,

    api_url_override: Option<String>,
    token_override: Option<String>,
    project_override: Option<String>,

    /// Session manager for the profile's identity provider, if it could be
    /// built from the configured URL.
    session: Option<Arc<SessionManager>>,

    /// The session as last written to disk.
    persisted: Mutex<Option<Session>>,
    use_keyring: bool,
}

impl Context {
    /// Create a new context from CLI arguments
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = CliConfig::load()?;
        let credentials = Credentials::load()?;

        let profile_name = cli
            .profile
            .clone()
            .or_else(|| config.default_profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        let profile = config.profiles.get(&profile_name).cloned().unwrap_or_default();

        let output_format = cli.output.unwrap_or_else(|| {
            OutputFormat::from_str(&config.settings.output_format, true).unwrap_or_default()
        });
        let output = OutputWriter::new(output_format, cli.no_color || !config.settings.color);

        let stored = credentials.get(&profile_name).cloned();
        let use_keyring = stored.as_ref().is_some_and(|c| c.use_keyring);
        let persisted = stored.map(|creds| restore_session(&profile_name, creds));

        let session = match identity_client(&profile) {
            Ok(identity) => Some(Arc::new(SessionManager::with_session(
                identity,
                persisted.clone(),
            ))),
            Err(e) => {
                warn!(error = %e, "identity provider is not usable");
                None
            }
        };

        Ok(Self {
            verbose: cli.verbose || config.settings.verbose,
            config,
            credentials,
            profile_name,
            profile,
            output,
            api_url_override: cli.api_url.clone(),
            token_override: cli.token.clone(),
            project_override: cli.project.clone(),
            session,
            persisted: Mutex::new(persisted),
            use_keyring,
        })
    }

    pub fn profile_label(&self) -> &str {
        &self.profile_name
    }

    /// Get the effective API URL
    pub fn api_url(&self) -> &str {
        self.api_url_override
            .as_deref()
            .unwrap_or_else(|| self.profile.api_url())
    }

    /// The session manager, or an error naming the misconfigured URL.
    pub fn session_manager(&self) -> Result<Arc<SessionManager>> {
        self.session.clone().with_context(|| {
            format!(
                "Identity provider URL {:?} is invalid. Fix it with 'llm-eval config set identity_url <url>'.",
                self.profile.identity_url()
            )
        })
    }

    /// Get the SDK authentication configuration
    pub async fn auth_config(&self) -> Result<AuthConfig> {
        if let Some(token) = &self.token_override {
            return Ok(AuthConfig::BearerToken(token.clone()));
        }
        match &self.session {
            Some(manager) if manager.is_authenticated().await => {
                let source: Arc<dyn TokenSource> = manager.clone();
                Ok(AuthConfig::Session(source))
            }
            _ => bail!("Not signed in. Run 'llm-eval auth login' or pass --token."),
        }
    }

    /// Create an SDK client
    pub async fn create_client(&self) -> Result<LlmEvalClient> {
        let mut config = SdkConfig::new(self.api_url()).with_auth(self.auth_config().await?);

        if let Some(secs) = self.config.settings.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if self.verbose {
            config = config.with_logging(true);
        }
        for (name, value) in &self.profile.headers {
            config = config.with_header(name.clone(), value.clone());
        }

        LlmEvalClient::new(config).context("Failed to create API client")
    }

    /// Project selector from `--project`, else the profile's default.
    pub fn project_selector(&self) -> Option<&str> {
        self.project_override
            .as_deref()
            .or(self.profile.default_project.as_deref())
    }

    /// Loads the user's projects and picks the one to work in.
    ///
    /// An explicit `--project` (id or name) must exist. A stale profile
    /// default falls back to the first project.
    pub async fn active_project(&self, client: &LlmEvalClient) -> Result<Project> {
        let selector = self.project_selector();
        let preferred = selector.and_then(|s| s.parse::<ProjectId>().ok());

        let mut projects = ProjectCollection::new(client.clone()).with_active(preferred);
        let spinner = self.output.spinner("Loading projects...");
        let loaded = projects.load().await;
        crate::output::finish(spinner);
        loaded.context("Failed to load projects")?;

        if let Some(selector) = selector {
            let found = projects
                .projects()
                .iter()
                .find(|p| Some(p.id) == preferred || p.name == selector);
            match found {
                Some(project) => return Ok(project.clone()),
                None if self.project_override.is_some() => {
                    bail!("Project '{}' not found", selector)
                }
                None => warn!(selector, "default project no longer exists, using the first project"),
            }
        }

        projects.active().cloned().context(
            "No projects found. Create one with 'llm-eval projects create'.",
        )
    }

    /// Resolves a project argument (id or name) against the project list.
    pub async fn find_project(&self, client: &LlmEvalClient, selector: &str) -> Result<Project> {
        let projects = client.projects().list().await.context("Failed to load projects")?;
        let id = selector.parse::<ProjectId>().ok();
        projects
            .into_iter()
            .find(|p| Some(p.id) == id || p.name == selector)
            .with_context(|| format!("Project '{}' not found", selector))
    }

    /// Writes the session for this profile (or removes it when `None`).
    pub async fn save_session(&self, session: Option<&Session>, use_keyring: bool) -> Result<()> {
        let mut credentials = Credentials::load()?;
        match session {
            Some(session) => {
                if use_keyring {
                    config::store_refresh_token(&self.profile_name, &session.refresh_token)?;
                }
                credentials.set(
                    &self.profile_name,
                    ProfileCredentials::from_session(session, use_keyring),
                );
            }
            None => {
                credentials.remove(&self.profile_name);
                config::clear_refresh_token(&self.profile_name);
            }
        }
        credentials.save().context("Failed to save credentials")?;
        *self.persisted.lock().await = session.cloned();
        Ok(())
    }

    /// Persists the current session if it changed since it was loaded, for
    /// example after an automatic refresh.
    pub async fn persist_session(&self) -> Result<()> {
        let Some(manager) = &self.session else {
            return Ok(());
        };
        let current = manager.current().await;
        if *self.persisted.lock().await == current {
            return Ok(());
        }
        debug!(profile = %self.profile_name, "session changed, saving credentials");
        self.save_session(current.as_ref(), self.use_keyring).await
    }
}

fn identity_client(profile: &Profile) -> Result<IdentityClient> {
    let key = std::env::var("LLM_EVAL_IDENTITY_KEY")
        .ok()
        .or_else(|| profile.identity_key.clone())
        .unwrap_or_default();
    let url = std::env::var("LLM_EVAL_IDENTITY_URL").unwrap_or_else(|_| profile.identity_url());
    Ok(IdentityClient::new(url, key)?)
}

fn restore_session(profile: &str, creds: ProfileCredentials) -> Session {
    let keyring_token = if creds.use_keyring {
        config::load_refresh_token(profile)
            .inspect_err(|e| warn!(error = %e, "refresh token unavailable"))
            .ok()
    } else {
        None
    };
    creds.into_session(keyring_token)
}
