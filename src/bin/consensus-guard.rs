//! CLI driver: one JSON request in, one JSON response out.

use clap::Parser;
use consensus_guard::logging::{self, LogFormat};
use consensus_guard::{ConsensusEngine, EngineConfig, LogStore, RequestKind};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

/// CLI arguments for consensus-guard
#[derive(Parser, Debug)]
#[command(name = "consensus-guard")]
#[command(version, about = "Reputation-weighted persona voting for risky actions")]
#[command(long_about = r#"
Reads one request as JSON (stdin by default), runs it against the board state
log and prints the response JSON on stdout. Logs go to stderr.

State path resolution: --state, then $CONSENSUS_GUARD_STATE, then
./.consensus-guard/state.jsonl.

Example:
  consensus-guard deployment-guard --input deploy.json --state board-1.jsonl
"#)]
struct Cli {
    /// Request kind: deployment-guard, permission-escalation-guard,
    /// persona-generator or persona-engine
    kind: RequestKind,

    /// Request file (defaults to stdin)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// State log path
    #[arg(short, long, value_name = "PATH")]
    state: Option<PathBuf>,

    /// Engine configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level filter, overridden by RUST_LOG
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn read_request(input: Option<&PathBuf>) -> consensus_guard::Result<Value> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&raw)
        .map_err(|e| consensus_guard::Error::invalid("input", format!("input is not valid JSON: {}", e)))
}

fn run(cli: Cli) -> consensus_guard::Result<Value> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(state) = cli.state {
        config = config.with_state_path(state);
    }

    let state_path = config.resolved_state_path();
    let store = LogStore::open_with_threshold(&state_path, config.compaction_threshold)?;
    let mut engine = ConsensusEngine::new(store, config);

    let request = read_request(cli.input.as_ref())?;
    Ok(engine.handle(cli.kind, &request))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Text };
    if let Err(e) = logging::init(&cli.log_level, format) {
        eprintln!("{}", e);
        return ExitCode::from(2);
    }

    let kind = cli.kind;
    match run(cli) {
        Ok(response) => {
            println!("{}", response);
            if response.get("error").is_some() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!(kind = %kind, error = %e, "request could not be processed");
            let envelope = consensus_guard::ErrorEnvelope::from_error("", kind.failure_code(), &e);
            match serde_json::to_string(&envelope) {
                Ok(body) => println!("{}", body),
                Err(_) => eprintln!("{}", e),
            }
            ExitCode::from(2)
        }
    }
}
