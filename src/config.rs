use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::*;

pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_COMPLETION_MAX_TOKENS: u32 = 75;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_style: ApiStyle,
    pub max_tokens: Option<u32>,
    pub backend_timeout_secs: u64,
    pub max_rounds: Option<u32>,
    pub history_depth: Option<usize>,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
    pub environment_context: String,
    pub initial_prompt: Option<String>,
    pub handoff_path: Option<String>,
}

impl RuntimeConfig {
    /// `None` when the backend wait is unbounded.
    pub fn backend_timeout(&self) -> Option<Duration> {
        if self.backend_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.backend_timeout_secs))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_style: Option<ApiStyle>,
    pub max_tokens: Option<u32>,
    pub backend_timeout_secs: Option<u64>,
    pub max_rounds: Option<u32>,
    pub history_depth: Option<usize>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
    pub context: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check provider/backend values and field names.",
            path.display()
        )
    })
}

pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    let provider = if cli.provider != Provider::Auto {
        cli.provider
    } else {
        profile.provider.unwrap_or(Provider::Auto)
    };

    let api_style = cli
        .api_style
        .or(profile.api_style)
        .unwrap_or(ApiStyle::Chat);
    let max_tokens = cli.max_tokens.or(profile.max_tokens).or(match api_style {
        ApiStyle::Completion => Some(DEFAULT_COMPLETION_MAX_TOKENS),
        ApiStyle::Chat => None,
    });

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        provider,
        model: cli.model.clone().or(profile.model),
        base_url: cli
            .base_url
            .clone()
            .or(profile.base_url)
            .map(|url| url.trim_end_matches('/').to_string()),
        api_style,
        max_tokens: max_tokens.map(|tokens| tokens.max(1)),
        backend_timeout_secs: cli
            .backend_timeout_secs
            .or(profile.backend_timeout_secs)
            .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS),
        max_rounds: cli
            .max_rounds
            .or(profile.max_rounds)
            .filter(|rounds| *rounds > 0),
        history_depth: cli.history_depth.or(profile.history_depth),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(false),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".cmdguide/telemetry/events.jsonl".to_string()),
        environment_context: cli
            .context
            .clone()
            .or(profile.context)
            .unwrap_or_default(),
        initial_prompt: cli
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .map(str::to_string),
        handoff_path: cli
            .tempfile
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(str::to_string),
    })
}

pub fn display_optional<T: ToString>(value: Option<T>, fallback: &str) -> String {
    value
        .map(|inner| inner.to_string())
        .unwrap_or_else(|| fallback.to_string())
}
