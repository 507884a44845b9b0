//! Authentication commands

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use dialoguer::{Input, Password};
use serde::Serialize;

use crate::context::Context;
use crate::output::{print_field, print_section};

/// Session management commands
#[derive(Debug, Args)]
pub struct AuthCommands {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthSubcommand {
    /// Sign in with email and password
    Login {
        /// Account email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,

        /// Password; prefer the prompt or LLM_EVAL_PASSWORD over this flag
        #[arg(long, env = "LLM_EVAL_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Keep the refresh token in the system keyring
        #[arg(long)]
        use_keyring: bool,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the current session
    Status,

    /// Exchange the refresh token for a new access token
    Refresh,
}

/// Execute authentication commands
pub async fn execute(ctx: &Context, cmd: AuthCommands) -> Result<()> {
    match cmd.command {
        AuthSubcommand::Login {
            email,
            password,
            use_keyring,
        } => login(ctx, email, password, use_keyring).await,
        AuthSubcommand::Logout => logout(ctx).await,
        AuthSubcommand::Status => status(ctx).await,
        AuthSubcommand::Refresh => refresh(ctx).await,
    }
}

async fn login(
    ctx: &Context,
    email: Option<String>,
    password: Option<String>,
    use_keyring: bool,
) -> Result<()> {
    let manager = ctx.session_manager()?;

    let email = match email {
        Some(e) => e,
        None => Input::new()
            .with_prompt("Email")
            .interact_text()
            .context("Failed to get email")?,
    };
    let password = match password {
        Some(p) => p,
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to get password")?,
    };

    let spinner = ctx.output.spinner("Signing in...");
    let result = manager.sign_in(email.trim(), &password).await;
    crate::output::finish(spinner);
    let session = result.context("Sign-in failed")?;

    ctx.save_session(Some(&session), use_keyring).await?;

    let who = session.user.email.as_deref().unwrap_or(email.as_str());
    ctx.output
        .success(&format!("Signed in as {} (profile '{}')", who, ctx.profile_name));
    if use_keyring {
        ctx.output.info("Refresh token stored in system keyring");
    }
    Ok(())
}

async fn logout(ctx: &Context) -> Result<()> {
    let manager = ctx.session_manager()?;
    if !manager.is_authenticated().await {
        ctx.output.info("Not signed in");
        return Ok(());
    }

    manager.sign_out().await;
    ctx.save_session(None, false).await?;
    ctx.output
        .success(&format!("Signed out of profile '{}'", ctx.profile_name));
    Ok(())
}

/// Serializable view of the session state
#[derive(Debug, Serialize)]
struct SessionStatus {
    profile: String,
    api_url: String,
    identity_url: String,
    signed_in: bool,
    user_id: Option<String>,
    email: Option<String>,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
    expired: Option<bool>,
    refresh_token_in_keyring: bool,
}

async fn status(ctx: &Context) -> Result<()> {
    let session = match ctx.session_manager() {
        Ok(manager) => manager.current().await,
        Err(_) => None,
    };
    let status = SessionStatus {
        profile: ctx.profile_name.clone(),
        api_url: ctx.api_url().to_string(),
        identity_url: ctx.profile.identity_url(),
        signed_in: session.is_some(),
        user_id: session.as_ref().map(|s| s.user.id.to_string()),
        email: session.as_ref().and_then(|s| s.user.email.clone()),
        expires_at: session.as_ref().map(|s| s.expires_at),
        expired: session.as_ref().map(|s| s.is_expired()),
        refresh_token_in_keyring: ctx
            .credentials
            .get(&ctx.profile_name)
            .is_some_and(|c| c.use_keyring),
    };

    if !ctx.output.is_interactive() {
        return ctx.output.write_data(&status);
    }

    print_section("Session");
    print_field("Profile", &status.profile);
    print_field("API URL", &status.api_url);
    print_field("Identity URL", &status.identity_url);
    match &session {
        Some(s) => {
            let user = s.user.email.clone().unwrap_or_else(|| s.user.id.to_string());
            print_field("User", &user);
            let expiry = if s.is_expired() {
                "expired (refreshed on next request)".to_string()
            } else {
                format!("in {}", humanize_until(&s.expires_at))
            };
            print_field("Access token", &expiry);
            let storage = if status.refresh_token_in_keyring { "keyring" } else { "credentials file" };
            print_field("Refresh token", storage);
        }
        None => {
            print_field("Signed in", "no");
            ctx.output.info("Run 'llm-eval auth login' to sign in");
        }
    }
    Ok(())
}

async fn refresh(ctx: &Context) -> Result<()> {
    let manager = ctx.session_manager()?;
    let spinner = ctx.output.spinner("Refreshing session...");
    let result = manager.refresh().await;
    crate::output::finish(spinner);
    let session = result.context("Refresh failed; sign in again with 'llm-eval auth login'")?;

    ctx.persist_session().await?;
    ctx.output.success(&format!(
        "Session refreshed, access token valid for {}",
        humanize_until(&session.expires_at)
    ));
    Ok(())
}

fn humanize_until(at: &chrono::DateTime<chrono::Utc>) -> String {
    let mins = (*at - chrono::Utc::now()).num_minutes().max(0);
    if mins >= 60 {
        format!("{}h {}m", mins / 60, mins % 60)
    } else {
        format!("{}m", mins)
    }
}
