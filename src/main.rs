use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use yoyors::config::AppConfig;
use yoyors::cues::{open_sink, CueOutput, CueSink};
use yoyors::display;
use yoyors::error::YoyoError;
use yoyors::export::{export_results, ExportFormat};
use yoyors::history::{import_legacy_json, HistoryFilters, HistoryStore, SqliteHistory};
use yoyors::logging::{init_logging, LogLevel};
use yoyors::runner::{run_session, CommandReply, RunnerEvent, HELP_TEXT};
use yoyors::session::TestSession;

/// yoyors - Yo-Yo Intermittent Recovery Level 1 test runner
///
/// Runs the shuttle protocol for a group of athletes, records warnings and
/// eliminations, and keeps a history of results with VO2max estimates.
#[derive(Parser)]
#[command(name = "yoyors")]
#[command(version)]
#[command(about = "Yo-Yo IR1 field test runner", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test for the named athletes
    Run {
        /// Athlete names, in roster order
        #[arg(required = true)]
        names: Vec<String>,

        /// Do not save the results to history
        #[arg(long)]
        discard: bool,

        /// No audible cues, whatever the configuration says
        #[arg(long)]
        mute: bool,
    },

    /// Show stored results, newest first
    History {
        /// Only this athlete
        #[arg(short, long)]
        athlete: Option<String>,

        /// Number of results to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Delete every stored result
        #[arg(long)]
        clear: bool,
    },

    /// Export stored results
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (csv, json, text)
        #[arg(short = 'f', long, default_value = "csv")]
        format: String,

        /// Only this athlete
        #[arg(short, long)]
        athlete: Option<String>,
    },

    /// Import a JSON history saved by the browser version of the test
    Import {
        /// Input file path
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the stage table in use
    Levels,

    /// Configure application settings
    Config {
        /// List all configuration options
        #[arg(short, long)]
        list: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Set a configuration value (KEY=VALUE)
        #[arg(short, long)]
        set: Option<String>,

        /// Get a configuration value
        #[arg(short, long)]
        get: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_config_path);
    let config = AppConfig::load_or_default(&config_path)?;

    let mut log_config = config.logging.clone();
    if let Some(level) = LogLevel::from_verbosity(cli.verbose) {
        log_config.level = level;
    }
    init_logging(&log_config)?;

    if cli.verbose > 0 {
        eprintln!("{}", format!("Log level: {}", log_config.level).dimmed());
    }

    match cli.command {
        Commands::Run {
            names,
            discard,
            mute,
        } => run_test(&config, names, discard, mute),

        Commands::History {
            athlete,
            limit,
            clear,
        } => {
            let mut history = open_history(&config)?;
            if clear {
                history.clear().map_err(fail)?;
                println!("{}", "✓ History cleared".green());
                return Ok(());
            }

            let results = HistoryFilters { athlete, limit }.apply(history.list().map_err(fail)?);
            if results.is_empty() {
                println!("{}", "No results stored yet".dimmed());
            } else {
                println!("{}", display::history_table(&results));
            }
            Ok(())
        }

        Commands::Export {
            output,
            format,
            athlete,
        } => {
            let format: ExportFormat = format.parse().map_err(fail)?;
            let history = open_history(&config)?;
            let results = HistoryFilters { athlete, limit: None }.apply(history.list().map_err(fail)?);

            export_results(&results, format, &output)
                .map_err(fail)
                .with_context(|| format!("Failed to export to {}", output.display()))?;
            println!(
                "{}",
                format!("✓ Exported {} results to {}", results.len(), output.display()).green()
            );
            Ok(())
        }

        Commands::Import { file } => {
            let mut history = open_history(&config)?;
            let count = import_legacy_json(&file, &mut history)
                .map_err(fail)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            println!("{}", format!("✓ Imported {} results", count).green());
            Ok(())
        }

        Commands::Levels => {
            println!("{}", display::stages_table(&config.stage_table()));
            Ok(())
        }

        Commands::Config {
            list,
            init,
            set,
            get,
        } => manage_config(config, &config_path, list, init, set, get),
    }
}

/// Log a library error at its severity and turn it into the operator message
fn fail(error: impl Into<YoyoError>) -> anyhow::Error {
    anyhow!(error.into().report())
}

fn open_history(config: &AppConfig) -> Result<SqliteHistory> {
    let path = &config.storage.database_path;
    SqliteHistory::open(path).map_err(|e| {
        tracing::debug!(path = %path.display(), "History unavailable");
        fail(e)
    })
}

fn run_test(config: &AppConfig, names: Vec<String>, discard: bool, mute: bool) -> Result<()> {
    let output = if mute { CueOutput::Silent } else { config.cues.output };
    let cues = open_sink(output, config.cues.volume);

    let mut session =
        TestSession::start(&names, config.stage_table(), config.timing(), cues).map_err(fail)?;

    println!("{}", "Yo-Yo IR1 test".bold());
    println!("{}", display::roster_table(session.roster()));
    println!("{}", HELP_TEXT.dimmed());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the test clock")?;
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let results = runtime.block_on(run_session(
        &mut session,
        input,
        config.tick_period(),
        print_event,
    ));
    // A pending stdin read must not keep the process alive
    runtime.shutdown_background();

    if let Some(reason) = session.completion() {
        println!("{}", display::completion_line(reason));
    }
    println!("{}", display::standings_table(&results));

    if discard {
        println!("{}", "Results discarded".dimmed());
        return Ok(());
    }

    let mut history = open_history(config)?;
    history
        .append(session.id(), &results)
        .map_err(fail)
        .context("Failed to save results")?;
    println!(
        "{}",
        format!("✓ Saved to {}", config.storage.database_path.display()).green()
    );
    Ok(())
}

fn print_event<C: CueSink>(session: &TestSession<C>, event: &RunnerEvent) {
    match event {
        RunnerEvent::Tick(outcome) => {
            if let Some(line) = display::tick_line(outcome, session) {
                println!("{}", line);
            }
        }
        RunnerEvent::Reply(CommandReply::Warned(outcome)) => {
            println!("{}", display::warn_line(outcome));
        }
        RunnerEvent::Reply(CommandReply::Stopped(_)) => {}
        RunnerEvent::Reply(CommandReply::WarnRejected(e)) => {
            eprintln!("{}", YoyoError::from(e.clone()).report().yellow());
        }
        RunnerEvent::Reply(CommandReply::StopRejected(e)) => {
            eprintln!("{}", YoyoError::from(e.clone()).report().yellow());
        }
        RunnerEvent::Reply(CommandReply::Status) => {
            println!("{}", display::status_line(session));
            println!("{}", display::roster_table(session.roster()));
        }
        RunnerEvent::Reply(CommandReply::Help) => println!("{}", HELP_TEXT),
        RunnerEvent::BadCommand(e) => eprintln!("{}", e.to_string().yellow()),
        RunnerEvent::InputClosed => {
            tracing::info!("Command input closed; the clock runs to completion");
        }
    }
}

fn manage_config(
    mut config: AppConfig,
    path: &Path,
    list: bool,
    init: bool,
    set: Option<String>,
    get: Option<String>,
) -> Result<()> {
    if init {
        if path.exists() {
            bail!("Config file already exists: {}", path.display());
        }
        AppConfig::default().save_to_file(path)?;
        println!("{}", format!("✓ Wrote default configuration to {}", path.display()).green());
    } else if let Some(key_value) = set {
        let (key, value) = key_value
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{}'", key_value))?;
        config.set(key.trim(), value)?;
        config.save_to_file(path)?;
        println!("{}", format!("✓ {} = {}", key.trim(), config.get(key.trim())?).green());
    } else if let Some(key) = get {
        println!("{}", config.get(&key)?);
    } else if list {
        println!("{}", format!("# {}", path.display()).dimmed());
        for (key, value) in config.entries()? {
            println!("{} = {}", key, value);
        }
    } else {
        println!("Use --list, --init, --get KEY or --set KEY=VALUE");
    }
    Ok(())
}
