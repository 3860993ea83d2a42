use anyhow::{Context, Result};

use crate::backend::{
    AnthropicBackend, ChatCompletionsBackend, CompletionBackend, CompletionPromptBackend,
    OllamaBackend,
};
use crate::cli::{ApiStyle, Provider};
use crate::config::RuntimeConfig;

pub fn validate_model_for_provider(provider: Provider, model_name: &str) -> Result<()> {
    let is_valid = match provider {
        Provider::Gemini => model_name.starts_with("gemini"),
        Provider::Anthropic => model_name.starts_with("claude"),
        Provider::Deepseek => model_name.starts_with("deepseek"),
        Provider::Openai | Provider::Groq | Provider::Ollama => !model_name.trim().is_empty(),
        Provider::Auto => true,
    };

    if is_valid {
        return Ok(());
    }

    Err(anyhow::anyhow!(
        "model '{}' is not compatible with provider '{:?}'",
        model_name,
        provider
    ))
}

pub fn default_model(provider: Provider, api_style: ApiStyle) -> &'static str {
    match (provider, api_style) {
        (Provider::Openai, ApiStyle::Completion) => "gpt-3.5-turbo-instruct",
        (Provider::Openai, ApiStyle::Chat) => "gpt-4o-mini",
        (Provider::Anthropic, _) => "claude-sonnet-4-20250514",
        (Provider::Deepseek, _) => "deepseek-chat",
        (Provider::Groq, _) => "llama-3.3-70b-versatile",
        (Provider::Gemini, _) => "gemini-2.5-flash",
        (Provider::Ollama, _) | (Provider::Auto, _) => "llama3.2",
    }
}

pub fn default_base_url(provider: Provider) -> String {
    match provider {
        Provider::Openai | Provider::Auto => "https://api.openai.com/v1".to_string(),
        Provider::Anthropic => "https://api.anthropic.com".to_string(),
        Provider::Deepseek => "https://api.deepseek.com/v1".to_string(),
        Provider::Groq => "https://api.groq.com/openai/v1".to_string(),
        Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
        Provider::Ollama => std::env::var("OLLAMA_HOST")
            .ok()
            .filter(|host| !host.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:11434".to_string()),
    }
}

pub fn api_key_env(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Openai => Some("OPENAI_API_KEY"),
        Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
        Provider::Deepseek => Some("DEEPSEEK_API_KEY"),
        Provider::Groq => Some("GROQ_API_KEY"),
        Provider::Gemini => Some("GOOGLE_API_KEY"),
        Provider::Ollama | Provider::Auto => None,
    }
}

/// Everything needed to build a backend, resolved from config and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub provider: Provider,
    pub api_style: ApiStyle,
    pub model: String,
    pub base_url: String,
    pub max_tokens: Option<u32>,
}

pub fn resolve_backend_settings(cfg: &RuntimeConfig) -> Result<BackendSettings> {
    let provider = match cfg.provider {
        Provider::Auto => detect_provider().context(
            "no provider could be auto-detected. Set one of OPENAI_API_KEY, ANTHROPIC_API_KEY, \
             DEEPSEEK_API_KEY, GROQ_API_KEY, GOOGLE_API_KEY, or use --provider ollama",
        )?,
        p => p,
    };

    if cfg.api_style == ApiStyle::Completion
        && matches!(provider, Provider::Anthropic | Provider::Ollama)
    {
        return Err(anyhow::anyhow!(
            "api style 'completion' requires an OpenAI-compatible provider, not '{:?}'",
            provider
        ));
    }

    let model = cfg
        .model
        .clone()
        .unwrap_or_else(|| default_model(provider, cfg.api_style).to_string());
    validate_model_for_provider(provider, &model)?;

    Ok(BackendSettings {
        provider,
        api_style: cfg.api_style,
        model,
        base_url: cfg
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(provider)),
        max_tokens: cfg.max_tokens,
    })
}

pub fn build_backend(settings: &BackendSettings) -> Result<Box<dyn CompletionBackend>> {
    let label = provider_label(settings.provider);
    let api_key = match api_key_env(settings.provider) {
        Some(key) => Some(
            std::env::var(key)
                .with_context(|| format!("{key} is required for {label} provider"))?,
        ),
        None => None,
    };

    let backend: Box<dyn CompletionBackend> = match (settings.provider, settings.api_style) {
        (Provider::Anthropic, _) => Box::new(AnthropicBackend::new(
            &settings.base_url,
            api_key.unwrap_or_default(),
            &settings.model,
            settings.max_tokens,
        )?),
        (Provider::Ollama, _) => Box::new(OllamaBackend::new(
            &settings.base_url,
            &settings.model,
            settings.max_tokens,
        )?),
        (_, ApiStyle::Completion) => Box::new(CompletionPromptBackend::new(
            label,
            &settings.base_url,
            api_key,
            &settings.model,
            settings.max_tokens,
        )?),
        (_, ApiStyle::Chat) => Box::new(ChatCompletionsBackend::new(
            label,
            &settings.base_url,
            api_key,
            &settings.model,
            settings.max_tokens,
        )?),
    };
    Ok(backend)
}

pub fn resolve_backend(
    cfg: &RuntimeConfig,
) -> Result<(Box<dyn CompletionBackend>, BackendSettings)> {
    let settings = resolve_backend_settings(cfg)?;
    let backend = build_backend(&settings)?;
    Ok((backend, settings))
}

pub fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Auto => "auto",
        Provider::Openai => "openai",
        Provider::Anthropic => "anthropic",
        Provider::Deepseek => "deepseek",
        Provider::Groq => "groq",
        Provider::Gemini => "gemini",
        Provider::Ollama => "ollama",
    }
}

pub fn detect_provider() -> Option<Provider> {
    if env_present("OPENAI_API_KEY") {
        return Some(Provider::Openai);
    }
    if env_present("ANTHROPIC_API_KEY") {
        return Some(Provider::Anthropic);
    }
    if env_present("DEEPSEEK_API_KEY") {
        return Some(Provider::Deepseek);
    }
    if env_present("GROQ_API_KEY") {
        return Some(Provider::Groq);
    }
    if env_present("GOOGLE_API_KEY") {
        return Some(Provider::Gemini);
    }
    if env_present("OLLAMA_HOST") {
        return Some(Provider::Ollama);
    }
    None
}

pub fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}
