//! wiki-context: command-line entrypoint.
//! Loads configuration, builds the engine, answers one query as JSON on stdout.
//!
//! Usage: `wiki-context [--config PATH] [--warm] <query words...>`

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wiki_context::{ContextEngine, EngineConfig};

/// Documentation context engine: relevant excerpts for a query, as JSON
#[derive(Parser, Debug)]
#[command(name = "wiki-context")]
#[command(about = "Relevant documentation excerpts for a query", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a JSON or TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prefetch every source first; without a query, print cache stats
    #[arg(long)]
    warm: bool,

    /// Query words
    #[arg(required_unless_present = "warm")]
    query: Vec<String>,
}

/// Logs go to stderr so stdout carries only JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wiki_context=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let query = cli.query.join(" ");
    let cfg = EngineConfig::load(cli.config.as_deref())?;
    let engine = ContextEngine::from_config(&cfg)?;

    if cli.warm {
        let origins = engine.warm_cache().await;
        for (url, origin) in &origins {
            tracing::info!(target: "engine", %url, ?origin, "warmed");
        }
        if query.is_empty() {
            println!("{}", serde_json::to_string_pretty(&engine.cache_stats())?);
            return Ok(());
        }
    }

    let results = engine.get_context(&query).await;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_words_are_collected_after_flags() {
        let cli = Cli::try_parse_from(["wiki-context", "-c", "alt.toml", "pin", "a", "flake"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(!cli.warm);
        assert_eq!(cli.query.join(" "), "pin a flake");
    }

    #[test]
    fn query_is_optional_only_when_warming() {
        assert!(Cli::try_parse_from(["wiki-context"]).is_err());
        let cli = Cli::try_parse_from(["wiki-context", "--warm"]).unwrap();
        assert!(cli.warm);
        assert!(cli.query.is_empty());
    }
}
