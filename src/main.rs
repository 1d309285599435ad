// src/main.rs

//! Command-line entry point: connects to a server and runs commands, printing
//! each reply as a table.

use anyhow::{Result, anyhow};
use std::env;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;
use tracing_subscriber::filter::EnvFilter;
use xeondb_client::{Client, ClientConfig};

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|arg| arg == "--version") {
        println!("xeondb-client version {VERSION}");
        return Ok(());
    }

    // Settings come from a --config file when given, otherwise from the
    // XEONDB_* environment variables.
    let config_index = args.iter().position(|arg| arg == "--config");
    let config = match config_index {
        Some(i) => {
            let Some(path) = args.get(i + 1) else {
                eprintln!("--config flag requires a value");
                std::process::exit(1);
            };
            match ClientConfig::from_file(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Failed to load configuration from \"{path}\": {e:#}");
                    std::process::exit(1);
                }
            }
        }
        None => ClientConfig::from_env(),
    };

    // Everything that is not the --config flag or its value is a command.
    let commands: Vec<&String> = args
        .iter()
        .enumerate()
        .filter(|(i, _)| config_index.is_none_or(|c| *i != c && *i != c + 1))
        .map(|(_, arg)| arg)
        .collect();

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .init();

    let addr = config.addr();
    let client = Client::new(config);
    if let Err(e) = client.try_connect().await {
        error!("Unable to connect to {addr}: {e}");
        return Err(anyhow!("unable to connect to {addr}: {e}"));
    }

    let outcome = if commands.is_empty() {
        run_interactive(&client).await
    } else {
        run_commands(&client, &commands).await
    };

    client.close().await;
    outcome
}

async fn run_commands(client: &Client, commands: &[&String]) -> Result<()> {
    for command in commands {
        client.query_table(command).await?;
    }
    Ok(())
}

/// Reads one command per line from stdin until EOF, `exit`, or `quit`.
async fn run_interactive(client: &Client) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command.eq_ignore_ascii_case("exit") || command.eq_ignore_ascii_case("quit") {
            break;
        }
        if let Err(e) = client.query_table(command).await {
            if e.is_terminal() {
                return Err(e.into());
            }
            eprintln!("{e}");
        }
    }
    Ok(())
}
