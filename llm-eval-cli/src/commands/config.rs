//! Configuration commands

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::{self, CliConfig, Credentials, Profile, Settings};
use crate::context::Context;

/// Configuration management commands
#[derive(Debug, Args)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration
    Show,

    /// Set a configuration value
    ///
    /// Keys are `settings.<name>`, `profile.<profile>.<field>`, or a bare
    /// profile field for the active profile.
    Set {
        /// Configuration key (e.g. settings.timeout_secs, api_url)
        key: String,

        /// Value to set
        value: String,
    },

    /// Remove a configuration value
    Unset {
        /// Configuration key
        key: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List all profiles
    Profiles,

    /// Set the default profile
    UseProfile {
        /// Profile name to use as default
        name: String,
    },

    /// Create a new profile
    CreateProfile {
        /// Profile name
        name: String,

        /// Backend URL for this profile
        #[arg(long)]
        api_url: Option<String>,

        /// Identity provider URL for this profile
        #[arg(long)]
        identity_url: Option<String>,

        /// Identity provider public key
        #[arg(long)]
        identity_key: Option<String>,

        /// Copy settings from another profile
        #[arg(long)]
        from: Option<String>,
    },

    /// Delete a profile and its stored session
    DeleteProfile {
        /// Profile name to delete
        name: String,

        /// Force deletion without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file paths
    Path,

    /// Reset configuration to defaults
    Reset {
        /// Force reset without confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Execute configuration commands
pub async fn execute(ctx: &Context, cmd: ConfigCommands) -> Result<()> {
    match cmd.command {
        ConfigSubcommand::Show => show(ctx),
        ConfigSubcommand::Set { key, value } => set(ctx, &key, Some(&value)),
        ConfigSubcommand::Unset { key } => set(ctx, &key, None),
        ConfigSubcommand::Get { key } => get(ctx, &key),
        ConfigSubcommand::Profiles => list_profiles(ctx),
        ConfigSubcommand::UseProfile { name } => use_profile(ctx, &name),
        ConfigSubcommand::CreateProfile {
            name,
            api_url,
            identity_url,
            identity_key,
            from,
        } => {
            let urls = ProfileUrls {
                api_url,
                identity_url,
                identity_key,
            };
            create_profile(ctx, &name, urls, from.as_deref())
        }
        ConfigSubcommand::DeleteProfile { name, force } => delete_profile(ctx, &name, force),
        ConfigSubcommand::Path => show_paths(),
        ConfigSubcommand::Reset { force } => reset(ctx, force),
    }
}

/// A resolved configuration key
#[derive(Debug, PartialEq, Eq)]
enum Key<'a> {
    DefaultProfile,
    Setting(&'a str),
    ProfileField { profile: &'a str, field: &'a str },
}

const SETTINGS: [&str; 4] = ["output_format", "color", "verbose", "timeout_secs"];
const PROFILE_FIELDS: [&str; 4] = ["api_url", "identity_url", "identity_key", "default_project"];

fn parse_key<'a>(key: &'a str, active_profile: &'a str) -> Result<Key<'a>> {
    let parts: Vec<&str> = key.split('.').collect();
    let parsed = match parts.as_slice() {
        ["default_profile"] => Key::DefaultProfile,
        ["settings", setting] => Key::Setting(*setting),
        ["profile", profile, field] => Key::ProfileField {
            profile: *profile,
            field: *field,
        },
        [field] => Key::ProfileField {
            profile: active_profile,
            field: *field,
        },
        _ => bail!("Unknown configuration key: {}", key),
    };
    match parsed {
        Key::Setting(s) if !SETTINGS.contains(&s) => bail!("Unknown setting: {}", s),
        Key::ProfileField { field, .. } if !PROFILE_FIELDS.contains(&field) => {
            bail!("Unknown profile field: {}", field)
        }
        ok => Ok(ok),
    }
}

fn show(ctx: &Context) -> Result<()> {
    if !ctx.output.is_interactive() {
        return ctx.output.write_data(&ctx.config);
    }

    println!("{}", "Configuration".bold().underline());
    println!();

    let settings = &ctx.config.settings;
    println!("{}", "Settings:".cyan());
    println!("  output_format: {}", settings.output_format);
    println!("  color: {}", settings.color);
    println!("  verbose: {}", settings.verbose);
    println!(
        "  timeout_secs: {}",
        settings
            .timeout_secs
            .map(|t| t.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    if let Some(default) = &ctx.config.default_profile {
        println!();
        println!("{}: {}", "Default profile".cyan(), default);
    }

    println!();
    println!("{}", "Profiles:".cyan());
    if ctx.config.profiles.is_empty() {
        println!("  No profiles configured");
    }
    for name in ctx.config.list_profiles() {
        let Some(p) = ctx.config.profiles.get(name) else {
            continue;
        };
        let marker = if name == ctx.profile_name {
            " (active)".green().to_string()
        } else {
            String::new()
        };
        println!("  [{}]{}", name, marker);
        println!("    api_url: {}", p.api_url());
        println!("    identity_url: {}", p.identity_url());
        if let Some(project) = &p.default_project {
            println!("    default_project: {}", project);
        }
        for (k, v) in &p.headers {
            println!("    header {}: {}", k, v);
        }
    }

    Ok(())
}

fn set(ctx: &Context, key: &str, value: Option<&str>) -> Result<()> {
    let mut config = ctx.config.clone();
    apply(&mut config, parse_key(key, &ctx.profile_name)?, value)?;
    config.save()?;

    match value {
        Some(v) => ctx.output.success(&format!("Set {} = {}", key, v)),
        None => ctx.output.success(&format!("Unset {}", key)),
    }
    Ok(())
}

fn apply(config: &mut CliConfig, key: Key<'_>, value: Option<&str>) -> Result<()> {
    match key {
        Key::DefaultProfile => config.default_profile = value.map(str::to_string),
        Key::Setting(setting) => {
            let defaults = Settings::default();
            let s = &mut config.settings;
            match (setting, value) {
                ("output_format", Some(v)) => {
                    <crate::output::OutputFormat as clap::ValueEnum>::from_str(v, true)
                        .map_err(|e| anyhow::anyhow!(e))?;
                    s.output_format = v.to_lowercase();
                }
                ("output_format", None) => s.output_format = defaults.output_format,
                ("color", v) => s.color = parse_bool(v)?.unwrap_or(defaults.color),
                ("verbose", v) => s.verbose = parse_bool(v)?.unwrap_or(defaults.verbose),
                ("timeout_secs", v) => {
                    let secs = v
                        .map(str::parse::<u64>)
                        .transpose()
                        .context("Invalid number")?;
                    if secs == Some(0) {
                        bail!("timeout_secs must be greater than zero; unset it to wait indefinitely");
                    }
                    s.timeout_secs = secs;
                }
                (other, _) => bail!("Unknown setting: {}", other),
            }
        }
        Key::ProfileField { profile, field } => {
            let p = config.get_or_create_profile(profile);
            let value = value.map(str::to_string);
            match field {
                "api_url" => p.api_url = value.map(validated_url).transpose()?,
                "identity_url" => p.identity_url = value.map(validated_url).transpose()?,
                "identity_key" => p.identity_key = value,
                "default_project" => p.default_project = value,
                other => bail!("Unknown profile field: {}", other),
            }
        }
    }
    Ok(())
}

fn parse_bool(value: Option<&str>) -> Result<Option<bool>> {
    value
        .map(str::parse::<bool>)
        .transpose()
        .context("Invalid boolean value")
}

fn validated_url(value: String) -> Result<String> {
    url::Url::parse(&value).with_context(|| format!("Invalid URL: {}", value))?;
    Ok(value)
}

fn get(ctx: &Context, key: &str) -> Result<()> {
    let value = lookup(&ctx.config, parse_key(key, &ctx.profile_name)?)?;
    println!("{}", value);
    Ok(())
}

fn lookup(config: &CliConfig, key: Key<'_>) -> Result<String> {
    let value = match key {
        Key::DefaultProfile => config
            .default_profile
            .clone()
            .unwrap_or_else(|| "not set".to_string()),
        Key::Setting(setting) => {
            let s = &config.settings;
            match setting {
                "output_format" => s.output_format.clone(),
                "color" => s.color.to_string(),
                "verbose" => s.verbose.to_string(),
                "timeout_secs" => s
                    .timeout_secs
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                other => bail!("Unknown setting: {}", other),
            }
        }
        Key::ProfileField { profile, field } => {
            let p = config
                .profiles
                .get(profile)
                .cloned()
                .unwrap_or_default();
            match field {
                "api_url" => p.api_url().to_string(),
                "identity_url" => p.identity_url(),
                "identity_key" => p.identity_key.unwrap_or_default(),
                "default_project" => p.default_project.unwrap_or_default(),
                other => bail!("Unknown profile field: {}", other),
            }
        }
    };
    Ok(value)
}

fn list_profiles(ctx: &Context) -> Result<()> {
    if ctx.config.profiles.is_empty() {
        ctx.output
            .info("No profiles configured. Run 'llm-eval config create-profile <name>' to create one.");
        return Ok(());
    }

    println!("{}", "Configured profiles:".bold());
    println!();
    for name in ctx.config.list_profiles() {
        if ctx.config.default_profile.as_deref() == Some(name) {
            println!("  {} {}", "→".green(), name.green().bold());
        } else {
            println!("    {}", name);
        }
    }
    Ok(())
}

fn use_profile(ctx: &Context, name: &str) -> Result<()> {
    let mut config = ctx.config.clone();
    if !config.profiles.contains_key(name) {
        bail!(
            "Profile '{}' not found. Run 'llm-eval config profiles' to list available profiles.",
            name
        );
    }

    config.set_default_profile(name);
    config.save()?;
    ctx.output.success(&format!("Now using profile '{}'", name));
    Ok(())
}

struct ProfileUrls {
    api_url: Option<String>,
    identity_url: Option<String>,
    identity_key: Option<String>,
}

fn create_profile(ctx: &Context, name: &str, urls: ProfileUrls, from: Option<&str>) -> Result<()> {
    let mut config = ctx.config.clone();
    if config.profiles.contains_key(name) {
        bail!("Profile '{}' already exists", name);
    }

    let mut profile = match from {
        Some(source) => config
            .profiles
            .get(source)
            .cloned()
            .with_context(|| format!("Source profile '{}' not found", source))?,
        None => Profile::default(),
    };
    if let Some(url) = urls.api_url {
        profile.api_url = Some(validated_url(url)?);
    }
    if let Some(url) = urls.identity_url {
        profile.identity_url = Some(validated_url(url)?);
    }
    if let Some(key) = urls.identity_key {
        profile.identity_key = Some(key);
    }

    config.profiles.insert(name.to_string(), profile);
    if config.default_profile.is_none() {
        config.set_default_profile(name);
    }
    config.save()?;

    ctx.output.success(&format!("Created profile '{}'", name));
    if let Some(source) = from {
        ctx.output.info(&format!("Copied settings from '{}'", source));
    }
    Ok(())
}

fn delete_profile(ctx: &Context, name: &str, force: bool) -> Result<()> {
    let mut config = ctx.config.clone();
    if !config.profiles.contains_key(name) {
        bail!("Profile '{}' not found", name);
    }
    if !super::confirm(&format!("Delete profile '{}'?", name), force)? {
        ctx.output.info("Cancelled");
        return Ok(());
    }

    config.remove_profile(name);
    config.save()?;

    let mut credentials = ctx.credentials.clone();
    if credentials.remove(name).is_some_and(|c| c.use_keyring) {
        config::clear_refresh_token(name);
    }
    credentials.save()?;

    ctx.output.success(&format!("Deleted profile '{}'", name));
    Ok(())
}

fn show_paths() -> Result<()> {
    println!("{}", "Configuration paths:".bold());
    println!();

    for (label, path) in [
        ("Config:     ", CliConfig::config_path()),
        ("Credentials:", CliConfig::credentials_path()),
    ] {
        match path {
            Ok(path) => {
                let status = if path.exists() { "✓".green() } else { "✗".red() };
                println!("  {} {} {}", label, status, path.display());
            }
            Err(e) => println!("  {} Error: {}", label, e),
        }
    }
    Ok(())
}

fn reset(ctx: &Context, force: bool) -> Result<()> {
    if !super::confirm(
        "Reset all configuration to defaults? This cannot be undone.",
        force,
    )? {
        ctx.output.info("Cancelled");
        return Ok(());
    }

    for (name, creds) in &ctx.credentials.profiles {
        if creds.use_keyring {
            config::clear_refresh_token(name);
        }
    }
    CliConfig::default().save()?;
    Credentials::default().save()?;

    ctx.output.success("Configuration reset to defaults");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_keys() {
        assert_eq!(parse_key("default_profile", "dev").unwrap(), Key::DefaultProfile);
        assert_eq!(parse_key("settings.color", "dev").unwrap(), Key::Setting("color"));
        assert_eq!(
            parse_key("api_url", "dev").unwrap(),
            Key::ProfileField {
                profile: "dev",
                field: "api_url"
            }
        );
        assert_eq!(
            parse_key("profile.prod.identity_key", "dev").unwrap(),
            Key::ProfileField {
                profile: "prod",
                field: "identity_key"
            }
        );
        assert!(parse_key("settings.max_retries", "dev").is_err());
        assert!(parse_key("headers", "dev").is_err());
        assert!(parse_key("a.b.c.d", "dev").is_err());
    }

    #[test]
    fn test_set_and_unset_timeout() {
        let mut config = CliConfig::default();
        apply(&mut config, Key::Setting("timeout_secs"), Some("45")).unwrap();
        assert_eq!(config.settings.timeout_secs, Some(45));
        assert!(apply(&mut config, Key::Setting("timeout_secs"), Some("0")).is_err());
        assert!(apply(&mut config, Key::Setting("timeout_secs"), Some("soon")).is_err());
        apply(&mut config, Key::Setting("timeout_secs"), None).unwrap();
        assert_eq!(config.settings.timeout_secs, None);
    }

    #[test]
    fn test_profile_fields() {
        let mut config = CliConfig::default();
        let key = || Key::ProfileField {
            profile: "dev",
            field: "api_url",
        };
        apply(&mut config, key(), Some("https://x.example.co/functions/v1")).unwrap();
        assert_eq!(
            lookup(&config, Key::ProfileField { profile: "dev", field: "identity_url" }).unwrap(),
            "https://x.example.co/auth/v1"
        );
        assert!(apply(&mut config, key(), Some("not a url")).is_err());
        apply(&mut config, key(), None).unwrap();
        assert_eq!(
            lookup(&config, key()).unwrap(),
            llm_eval_sdk::DEFAULT_BASE_URL
        );
    }

    #[test]
    fn test_output_format_setting_is_checked() {
        let mut config = CliConfig::default();
        apply(&mut config, Key::Setting("output_format"), Some("JSON")).unwrap();
        assert_eq!(config.settings.output_format, "json");
        assert!(apply(&mut config, Key::Setting("output_format"), Some("xml")).is_err());
    }
}
