//! FlashKV-Q - Command-line driver
//!
//! Adapts the in-memory client library and runs commands read from stdin,
//! one per line, through the future-returning methods. A line starting with
//! `multi` queues the `|`-separated commands that follow and runs them as a
//! batch.

use flashkv_q::memory::{MemoryBatch, MemoryClient, Store};
use flashkv_q::module::{BATCH_METHOD, EXEC_METHOD};
use flashkv_q::{Adapted, AdaptedClient, Adapter, Options, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "FLASHKV_Q_LOG";

/// Driver configuration
struct Config {
    /// Prefix of adapted method names
    prefix: String,
    /// Suffix of adapted method names
    suffix: String,
    /// Route values through the JSON codec
    json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: flashkv_q::DEFAULT_SUFFIX.to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--prefix" | "-p" => {
                    if i + 1 < args.len() {
                        config.prefix = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --prefix requires a value");
                        std::process::exit(1);
                    }
                }
                "--suffix" | "-s" => {
                    if i + 1 < args.len() {
                        config.suffix = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --suffix requires a value");
                        std::process::exit(1);
                    }
                }
                "--json" | "-j" => {
                    config.json = true;
                    i += 1;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("FlashKV-Q version {}", flashkv_q::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn options(&self) -> Options {
        Options::new()
            .with_prefix(self.prefix.clone())
            .with_suffix(self.suffix.clone())
            .with_json(self.json)
    }
}

fn print_help() {
    println!(
        r#"
FlashKV-Q - Future-returning adapter for callback key-value clients

USAGE:
    flashkv-q [OPTIONS] < commands.txt

OPTIONS:
    -p, --prefix <PREFIX>    Prefix of adapted method names (default: none)
    -s, --suffix <SUFFIX>    Suffix of adapted method names (default: Q)
    -j, --json               Store objects and arrays as JSON text
    -v, --version            Print version information
        --help               Print this help message

INPUT:
    One command per line. Arguments are read as JSON where they parse,
    as plain strings otherwise.

    set user {{"name":"Ariz"}}
    get user
    multi | set n 1 | incr n | get n

ENVIRONMENT:
    FLASHKV_Q_LOG    Log filter (default: info)
"#
    );
}

/// Splits a line into a command name and its arguments.
fn parse_line(line: &str) -> Option<(String, Vec<Value>)> {
    let mut tokens = line.split_whitespace();
    let command = tokens.next()?.to_lowercase();
    let args = tokens
        .map(|token| {
            serde_json::from_str(token).unwrap_or_else(|_| Value::String(token.to_string()))
        })
        .collect();
    Some((command, args))
}

async fn run_line(
    adapted: &Adapted<MemoryClient, MemoryBatch>,
    client: &AdaptedClient<'_, MemoryClient, MemoryBatch>,
    line: &str,
) -> anyhow::Result<Value> {
    let mapper = adapted.mapper();
    let mut steps = line.split('|').map(str::trim).filter(|s| !s.is_empty());

    let Some((command, args)) = steps.next().and_then(parse_line) else {
        return Ok(Value::Null);
    };

    if command != BATCH_METHOD {
        let mapped = mapper.map(&command);
        debug!(command = %command, mapped = %mapped, "running command");
        return Ok(client.call(&mapped, args)?.await?);
    }

    // Mapped batch steps only exist with the codec on; raw mode keeps the originals.
    let step_name = |command: &str| {
        if adapted.is_json() {
            mapper.map(command)
        } else {
            command.to_string()
        }
    };

    let mut batch = client.batch(&step_name(BATCH_METHOD), args)?;
    for step in steps {
        if let Some((command, args)) = parse_line(step) {
            batch.queue(&step_name(&command), args)?;
        }
    }
    Ok(batch.call(&mapper.map(EXEC_METHOD), vec![])?.await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let adapted = Adapter::new(config.options()).adapt_default()?;
    info!(
        commands = adapted.client_methods().len(),
        json = adapted.is_json(),
        "adapted in-memory client"
    );

    let store = Arc::new(Store::new());
    let client = MemoryClient::new(store);
    let client = adapted.bind(&client);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match run_line(&adapted, &client, line).await {
            Ok(value) => println!("{}", value),
            Err(e) => {
                warn!(line = %line, "command failed");
                println!("(error) {}", e);
            }
        }
    }

    info!("Input exhausted, shutting down");
    Ok(())
}
