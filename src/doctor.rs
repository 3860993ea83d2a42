use anyhow::Result;

use crate::config::{RuntimeConfig, display_optional};
use crate::provider::{
    api_key_env, detect_provider, env_present, provider_label, resolve_backend_settings,
};

pub fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );

    let checks = [
        ("OPENAI_API_KEY", env_present("OPENAI_API_KEY")),
        ("ANTHROPIC_API_KEY", env_present("ANTHROPIC_API_KEY")),
        ("DEEPSEEK_API_KEY", env_present("DEEPSEEK_API_KEY")),
        ("GROQ_API_KEY", env_present("GROQ_API_KEY")),
        ("GOOGLE_API_KEY", env_present("GOOGLE_API_KEY")),
        ("OLLAMA_HOST", env_present("OLLAMA_HOST")),
    ];

    println!("Provider environment check:");
    for (key, ok) in checks {
        let status = if ok { "set" } else { "missing" };
        println!("- {key}: {status}");
    }

    match detect_provider() {
        Some(provider) => println!("Auto provider resolution: {}", provider_label(provider)),
        None => {
            println!("Auto provider resolution: none");
            println!("Tip: export one provider key or run with --provider ollama");
        }
    }

    match resolve_backend_settings(cfg) {
        Ok(settings) => {
            println!(
                "Backend: provider={} style={:?} model={} base_url={}",
                provider_label(settings.provider),
                settings.api_style,
                settings.model,
                settings.base_url
            );
            if let Some(key) = api_key_env(settings.provider) {
                if !env_present(key) {
                    println!("Warning: {key} is not set; requests will fail.");
                }
            }
        }
        Err(err) => println!("Backend: unresolved ({err:#})"),
    }

    println!(
        "Loop: backend_timeout_secs={} max_rounds={} history_depth={}",
        cfg.backend_timeout_secs,
        display_optional(cfg.max_rounds, "unbounded"),
        display_optional(cfg.history_depth, "full")
    );
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );
    println!(
        "Handoff destination: {}",
        cfg.handoff_path.as_deref().unwrap_or("<not set; pass --tempfile>")
    );

    Ok(())
}
