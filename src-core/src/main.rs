//! HaremDB command host
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout:
//!
//! ```text
//! {"id": 1, "command": "addGroup", "payload": {"name": "Genshin"}}
//! {"id": 1, "response": {"isSuccess": true, "message": "Group added", "data": {...}}}
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use haremdb_lib::commands::invoke;
use haremdb_lib::config::AppConfig;
use haremdb_lib::AppState;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "haremdb", about = "Tagged card library with game mod management")]
struct Cli {
    /// Managed asset root (database, repo/ and logs live here)
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Config file; defaults to <root>/haremdb.json
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    command: String,
    #[serde(default)]
    payload: Value,
}

async fn serve(state: &AppState) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(req) => {
                let response = invoke(state, &req.command, req.payload).await;
                json!({ "id": req.id, "response": response })
            }
            Err(e) => json!({
                "id": Value::Null,
                "response": { "isSuccess": false, "message": format!("Malformed request: {}", e), "data": null }
            }),
        };
        stdout.write_all(reply.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Log an error, falling back to stderr before the logger is up
fn report(msg: &str) {
    if rolling_logger::error(msg).is_err() {
        eprintln!("{}", msg);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.root, cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = rolling_logger::init_logger(config.log_dir(), "HaremDB") {
        eprintln!("Failed to init logger: {}", e);
    }

    let state = match AppState::open(config).await {
        Ok(state) => state,
        Err(e) => {
            report(&format!("Failed to open library: {}", e));
            return ExitCode::FAILURE;
        }
    };
    let _ = rolling_logger::info("Ready for requests");

    let served = serve(&state).await;
    if let Err(e) = state.close().await {
        report(&format!("Final flush failed: {}", e));
        return ExitCode::FAILURE;
    }
    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&format!("Request loop failed: {}", e));
            ExitCode::FAILURE
        }
    }
}
