use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use opfail::config::ClassifierConfig;
use opfail::error::codes::{self, KnownCode};
use opfail::error::{
    Classification, FailureClassifier, FailureResult, OperationFailure, OperationKind,
};
use opfail::logging::{init_logging, LogSettings};

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// JSON on a single line
    #[default]
    Json,
    /// Human-readable text
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "opfail")]
#[command(version)]
#[command(about = "Classify failed database operations: not-primary, retryable, resumable")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Classifier configuration file (TOML)
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a server reply document
    Classify {
        /// Reply document as JSON; `-` reads stdin
        #[arg(long, short, default_value = "-")]
        reply: String,

        /// Max wire version negotiated with the server
        #[arg(long, short = 'w', default_value = "0")]
        wire_version: u32,

        /// The failed command was a getMore
        #[arg(long)]
        get_more: bool,

        /// Output format
        #[arg(long, short = 'f', default_value = "json", value_enum)]
        format: OutputFormat,
    },
    /// List the built-in error code tables
    Codes {
        /// Output format
        #[arg(long, short = 'f', default_value = "json", value_enum)]
        format: OutputFormat,
    },
}

/// Exit codes
mod exit_codes {
    use std::process::ExitCode;

    /// Reply classified (or reported success)
    pub fn classified() -> ExitCode {
        ExitCode::SUCCESS
    }

    /// Input or configuration could not be used
    pub fn invalid_input() -> ExitCode {
        ExitCode::from(2)
    }
}

#[derive(Serialize)]
struct Report {
    failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    classification: Option<Classification>,
}

#[derive(Serialize)]
struct CodeEntry {
    code: i32,
    name: &'static str,
}

#[derive(Serialize)]
struct CodeTables {
    not_primary: Vec<CodeEntry>,
    node_recovering: Vec<CodeEntry>,
    node_shutting_down: Vec<CodeEntry>,
    write_retryable: Vec<CodeEntry>,
    change_stream_resume_extra: Vec<CodeEntry>,
}

fn entries(table: &[KnownCode]) -> Vec<CodeEntry> {
    table
        .iter()
        .map(|&(code, name)| CodeEntry { code, name })
        .collect()
}

fn load_classifier(path: Option<&Path>) -> FailureResult<FailureClassifier> {
    let config = match path {
        Some(path) => ClassifierConfig::load(path)?,
        None => ClassifierConfig::from_env()?,
    };
    Ok(FailureClassifier::from_config(&config))
}

fn read_reply(source: &str) -> FailureResult<String> {
    if source == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

fn flag(label: &str, value: bool) -> String {
    if value {
        format!("  {:<28}{}", label, "yes".green().bold())
    } else {
        format!("  {:<28}{}", label, "no".dimmed())
    }
}

fn render_text(failure: &OperationFailure, classification: &Classification) -> String {
    let mut lines = vec![format!("{}", failure.to_string().bold())];
    if !classification.labels.is_empty() {
        lines.push(format!("  labels: {}", classification.labels.join(", ")));
    }
    lines.push(flag("not primary", classification.not_primary));
    lines.push(flag("node recovering", classification.node_recovering));
    lines.push(flag("node shutting down", classification.node_shutting_down));
    lines.push(flag("state change", classification.state_change));
    lines.push(flag("write retryable", classification.write_retryable));
    lines.push(flag("read retryable", classification.read_retryable));
    lines.push(flag(
        "unsupported retryable write",
        classification.unsupported_retryable_write,
    ));
    lines.push(flag("max time expired", classification.max_time_expired));
    lines.push(flag(
        "change stream resumable",
        classification.change_stream_resumable,
    ));
    lines.join("\n")
}

fn run_classify(
    classifier: &FailureClassifier,
    reply: &str,
    wire_version: u32,
    get_more: bool,
    format: OutputFormat,
) -> FailureResult<()> {
    let operation_kind = if get_more {
        OperationKind::GetMore
    } else {
        OperationKind::Other
    };
    let body = read_reply(reply)?;
    let failure = OperationFailure::from_reply_str(&body, operation_kind, wire_version)?;

    match (failure, format) {
        (None, OutputFormat::Json) => {
            let report = Report {
                failed: false,
                message: None,
                classification: None,
            };
            println!("{}", serde_json::to_string(&report)?);
        }
        (None, OutputFormat::Text) => println!("{}", "no failure".green()),
        (Some(failure), OutputFormat::Json) => {
            let report = Report {
                failed: true,
                message: failure.message().map(str::to_string),
                classification: Some(classifier.classify(&failure)),
            };
            println!("{}", serde_json::to_string(&report)?);
        }
        (Some(failure), OutputFormat::Text) => {
            println!("{}", render_text(&failure, &classifier.classify(&failure)));
        }
    }
    Ok(())
}

fn run_codes(format: OutputFormat) -> FailureResult<()> {
    let tables = CodeTables {
        not_primary: entries(codes::NOT_PRIMARY_CODES),
        node_recovering: entries(codes::NODE_RECOVERING_CODES),
        node_shutting_down: entries(codes::NODE_SHUTTING_DOWN_CODES),
        write_retryable: entries(codes::WRITE_RETRYABLE_CODES),
        change_stream_resume_extra: entries(codes::CHANGE_STREAM_RESUME_EXTRA_CODES),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tables)?),
        OutputFormat::Text => {
            for (title, table) in [
                ("not primary", &tables.not_primary),
                ("node recovering", &tables.node_recovering),
                ("node shutting down", &tables.node_shutting_down),
                ("write retryable", &tables.write_retryable),
                ("change stream resume (legacy extra)", &tables.change_stream_resume_extra),
            ] {
                println!("{}", title.bold());
                for entry in table {
                    println!("  {:>6}  {}", entry.code, entry.name);
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&LogSettings::for_cli(cli.verbose));

    let result = match cli.command {
        Commands::Classify {
            reply,
            wire_version,
            get_more,
            format,
        } => load_classifier(cli.config.as_deref()).and_then(|classifier| {
            run_classify(&classifier, &reply, wire_version, get_more, format)
        }),
        Commands::Codes { format } => run_codes(format),
    };

    match result {
        Ok(()) => exit_codes::classified(),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            exit_codes::invalid_input()
        }
    }
}
