use anyhow::Result;

use crate::config::{ProfilesFile, RuntimeConfig, display_optional};
use crate::provider::provider_label;

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();

    println!("Configured profiles (active='{}'):", cfg.profile);
    for name in names {
        let marker = if name == cfg.profile { "*" } else { " " };
        let source = if profiles.profiles.contains_key(&name) {
            "configured"
        } else {
            "implicit"
        };
        println!("{marker} {name} ({source})");
    }

    Ok(())
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path);
    println!("Provider: {}", provider_label(cfg.provider));
    println!(
        "Model: {}",
        cfg.model.as_deref().unwrap_or("<provider-default>")
    );
    println!(
        "Base URL: {}",
        cfg.base_url.as_deref().unwrap_or("<provider-default>")
    );
    println!("API style: {:?}", cfg.api_style);
    println!(
        "Max tokens: {}",
        display_optional(cfg.max_tokens, "<provider-default>")
    );
    println!("Backend timeout (secs): {}", cfg.backend_timeout_secs);
    println!(
        "Max rounds: {}",
        display_optional(cfg.max_rounds, "unbounded")
    );
    println!(
        "History depth: {}",
        display_optional(cfg.history_depth, "full")
    );
    println!(
        "Environment context: {}",
        if cfg.environment_context.is_empty() {
            "<none>"
        } else {
            cfg.environment_context.as_str()
        }
    );
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    Ok(())
}
