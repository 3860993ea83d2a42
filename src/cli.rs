use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Auto,
    Openai,
    Anthropic,
    Deepseek,
    Groq,
    Gemini,
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStyle {
    Chat,
    Completion,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TelemetryCommands {
    #[command(about = "Summarize telemetry events from a JSONL stream")]
    Report {
        #[arg(long)]
        path: Option<String>,
        #[arg(long, default_value_t = 5000)]
        limit: usize,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  cmdguide --tempfile /tmp/cmd.out --prompt \"What is using port 5050?\"\n\
  cmdguide --tempfile /tmp/cmd.out --context \"$(uname -a)\"\n\
  cmdguide --provider ollama --model llama3.2 --tempfile /tmp/cmd.out\n\
  cmdguide --api-style completion --model my-finetuned-model --tempfile /tmp/cmd.out\n\
  cmdguide --history-depth 4 --max-rounds 10 --tempfile /tmp/cmd.out\n\
  cmdguide doctor\n\
  cmdguide profiles show\n\
  cmdguide telemetry report --limit 2000\n\
\n\
Shell integration:\n\
  The selected command is written verbatim to --tempfile. Wrap cmdguide in a shell\n\
  function that reads that file and pushes it onto the prompt or history.\n\
  Choosing 0 exits cleanly without writing anything.";

#[derive(Debug, Parser)]
#[command(name = "cmdguide")]
#[command(about = "Turn a task description into a shell command, one round at a time")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    /// Destination file that receives the selected command.
    #[arg(long, env = "CMDGUIDE_TEMPFILE")]
    pub tempfile: Option<String>,

    /// System information context sent with every round (OS, shell, cwd, ...).
    #[arg(long, env = "CMDGUIDE_CONTEXT")]
    pub context: Option<String>,

    /// Prompt for the first round. Later rounds always ask interactively.
    #[arg(long)]
    pub prompt: Option<String>,

    #[arg(long, env = "CMDGUIDE_PROVIDER", value_enum, default_value_t = Provider::Auto)]
    pub provider: Provider,

    #[arg(long, env = "CMDGUIDE_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "CMDGUIDE_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "CMDGUIDE_API_STYLE", value_enum)]
    pub api_style: Option<ApiStyle>,

    #[arg(long, env = "CMDGUIDE_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    #[arg(long, env = "CMDGUIDE_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "CMDGUIDE_CONFIG", default_value = ".cmdguide/config.toml")]
    pub config_path: String,

    /// Seconds to wait for one backend reply; 0 waits indefinitely.
    #[arg(long, env = "CMDGUIDE_BACKEND_TIMEOUT_SECS")]
    pub backend_timeout_secs: Option<u64>,

    #[arg(long, env = "CMDGUIDE_MAX_ROUNDS")]
    pub max_rounds: Option<u32>,

    /// Number of most recent rounds replayed to the backend.
    #[arg(long, env = "CMDGUIDE_HISTORY_DEPTH")]
    pub history_depth: Option<usize>,

    #[arg(long, env = "CMDGUIDE_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "CMDGUIDE_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "error")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Validate provider environment and resolved backend settings")]
    Doctor,
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Telemetry utilities and reporting")]
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

pub fn command_label(command: Option<&Commands>) -> String {
    match command {
        None => "guide".to_string(),
        Some(Commands::Doctor) => "doctor".to_string(),
        Some(Commands::Profiles { command }) => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Some(Commands::Telemetry { command }) => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}
