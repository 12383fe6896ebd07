//! CLI command definitions, routing, and tracing setup.

use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use terminalplex_core::{AnswerPipeline, Session, TurnObserver, TurnOutcome};
use terminalplex_shared::{AppConfig, ContextBlock, init_config, load_config, validate_api_key};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Terminalplex — ask questions, get answers with numbered web citations.
#[derive(Parser)]
#[command(
    name = "terminalplex",
    version,
    about = "Conversational web search: streamed answers grounded in numbered sources.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Chat model identifier (overrides config and environment).
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Number of search results to read per question.
    #[arg(long, global = true)]
    pub max_results: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start an interactive conversation.
    Chat,

    /// Answer a single question and exit.
    Ask {
        /// The question (words are joined with spaces).
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so they never
/// interleave with the streamed answer on stdout.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "terminalplex=warn",
        1 => "terminalplex=info",
        2 => "terminalplex=debug",
        _ => "terminalplex=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Chat => cmd_chat(&cli).await,
        Command::Ask { query } => cmd_ask(&cli, &query.join(" ")).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&cli).await,
        },
    }
}

/// Load config (file, then environment) and apply command-line overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = load_config()?;
    apply_cli_overrides(&mut config, cli);
    Ok(config)
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(max_results) = cli.max_results {
        config.search.max_results = max_results;
    }
}

fn build_session(cli: &Cli) -> Result<Session> {
    let config = resolve_config(cli)?;
    validate_api_key(&config)?;

    info!(
        model = %config.llm.model,
        max_results = config.search.max_results,
        "starting session"
    );

    Ok(Session::new(AnswerPipeline::from_config(&config)?))
}

fn is_exit_command(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

async fn cmd_chat(cli: &Cli) -> Result<()> {
    let mut session = build_session(cli)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Enter your prompt: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if is_exit_command(line) {
            break;
        }
        if line == "/reset" {
            session.reset();
            println!("History cleared.");
            continue;
        }

        let observer = CliObserver::new();
        let result = session.ask(line, &observer).await;
        observer.finish();

        match result {
            Ok(outcome) => print_footer(&outcome),
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "turn failed");
                eprintln!("\n  Error: {e}\n");
            }
        }
    }

    Ok(())
}

async fn cmd_ask(cli: &Cli, query: &str) -> Result<()> {
    let mut session = build_session(cli)?;

    let observer = CliObserver::new();
    let result = session.ask(query, &observer).await;
    observer.finish();

    let outcome = result.map_err(|e| eyre!("could not answer: {e}"))?;
    print_footer(&outcome);
    Ok(())
}

fn print_footer(outcome: &TurnOutcome) {
    println!();
    if outcome.citations.is_empty() {
        println!("  (answered without sources)");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI turn observer
// ---------------------------------------------------------------------------

/// Shows a spinner while the turn is working, then streams the answer.
struct CliObserver {
    spinner: ProgressBar,
    streaming: AtomicBool,
}

impl CliObserver {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            streaming: AtomicBool::new(false),
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl TurnObserver for CliObserver {
    fn phase(&self, name: &str) {
        self.spinner.set_message(format!("{name}..."));
    }

    fn search_query(&self, query: &str) {
        self.spinner.suspend(|| println!("\nSearch Query: {query}"));
    }

    fn sources(&self, context: &ContextBlock) {
        self.spinner.suspend(|| {
            println!("Sources:");
            if context.is_empty() {
                println!("  (none retrieved)");
            }
            for (number, url) in context.sources() {
                println!("  [{number}] {url}");
            }
        });
    }

    fn delta(&self, text: &str) {
        if !self.streaming.swap(true, Ordering::SeqCst) {
            self.spinner.finish_and_clear();
            println!();
        }
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands_are_case_insensitive() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(is_exit_command("Exit"));
        assert!(!is_exit_command("exiting"));
        assert!(!is_exit_command("/reset"));
    }

    #[test]
    fn ask_joins_words() {
        let cli = Cli::try_parse_from(["terminalplex", "ask", "what", "is", "rust?"]).unwrap();
        match cli.command {
            Command::Ask { query } => assert_eq!(query.join(" "), "what is rust?"),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "terminalplex",
            "chat",
            "--model",
            "llama-3.1-8b",
            "--max-results",
            "6",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.llm.model, "llama-3.1-8b");
        assert_eq!(config.search.max_results, 6);
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::try_parse_from(["terminalplex", "chat"]).unwrap();
        let mut config = AppConfig::default();
        let before = config.llm.model.clone();
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.llm.model, before);
        assert_eq!(config.search.max_results, 4);
    }
}
