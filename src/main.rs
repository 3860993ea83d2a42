use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;

use cmdguide::cli::{Cli, Commands, ProfileCommands, TelemetryCommands, command_label};
use cmdguide::config::{load_profiles, resolve_runtime_config};
use cmdguide::doctor::run_doctor;
use cmdguide::driver::{SessionOutcome, require_handoff_path, run_guide_session};
use cmdguide::error::{categorize_error, format_cli_error};
use cmdguide::profiles::{run_profiles_list, run_profiles_show};
use cmdguide::provider::{provider_label, resolve_backend};
use cmdguide::telemetry::{TelemetrySink, run_telemetry_report};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(category = %categorize_error(&err).code(), error = %err, "command failed");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;
    let telemetry = TelemetrySink::new(&cfg, command_label(cli.command.as_ref()));

    match cli.command {
        None => {
            require_handoff_path(&cfg)?;
            let (backend, settings) = resolve_backend(&cfg)?;
            tracing::info!(
                provider = provider_label(settings.provider),
                model = %settings.model,
                style = ?settings.api_style,
                "Using backend"
            );

            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut out = std::io::stdout();
            match run_guide_session(&cfg, backend.as_ref(), &telemetry, &mut input, &mut out)
                .await?
            {
                SessionOutcome::Selected(command) => {
                    tracing::info!(chars = command.len(), "command handed off");
                }
                SessionOutcome::Aborted => tracing::info!("session aborted by operator"),
            }
        }
        Some(Commands::Doctor) => {
            run_doctor(&cfg)?;
        }
        Some(Commands::Profiles { command }) => match command {
            ProfileCommands::List => run_profiles_list(&profiles, &cfg)?,
            ProfileCommands::Show => run_profiles_show(&cfg)?,
        },
        Some(Commands::Telemetry { command }) => match command {
            TelemetryCommands::Report { path, limit } => {
                run_telemetry_report(&cfg, path, limit)?;
            }
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays reserved for the menu.
fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::ERROR);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
