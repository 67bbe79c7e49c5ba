//! web2api - chat websites as an OpenAI-compatible API.
//!
//! Main entry point for the web2api CLI and server.

mod cli;
mod pages;
mod routes;
mod server;

use std::path::Path;

use clap::Parser;
use tracing::{info, warn};
use web2api_config::{Config, ConfigLoader, ConfigValidator};

use cli::{Cli, Commands};
use server::{init_tracing, run_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig) => check_config(&cli.config),
        Some(Commands::Sites) => list_sites(&cli.config),
        Some(Commands::Serve { host, port }) => {
            let mut config = load_config(&cli.config)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        None => serve(load_config(&cli.config)?).await,
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(&config.logging)?;

    let validation = ConfigValidator::validate(&config)?;
    for warning in &validation.warnings {
        warn!("{}: {}", warning.path, warning.message);
    }
    if !validation.is_valid() {
        let errors: Vec<String> = validation
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect();
        return Err(format!("Invalid configuration:\n  {}", errors.join("\n  ")).into());
    }

    info!("Configuration validated");
    run_server(config).await
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(ConfigLoader::load(path)?)
    } else {
        eprintln!(
            "Config file {} not found, using defaults (no sites configured)",
            path.display()
        );
        Ok(Config::default())
    }
}

fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load(path)?;
    let validation = ConfigValidator::validate(&config)?;

    for warning in &validation.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &validation.errors {
        println!("error: {}: {}", error.path, error.message);
    }

    if validation.is_valid() {
        println!("{} is valid ({} site(s))", path.display(), config.sites.len());
        Ok(())
    } else {
        Err(format!("{} error(s) in {}", validation.errors.len(), path.display()).into())
    }
}

fn list_sites(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load(path)?;
    if config.sites.is_empty() {
        println!("No sites configured.");
        return Ok(());
    }

    let mut domains: Vec<&String> = config.sites.keys().collect();
    domains.sort();

    println!("{:<32} {:<10} {}", "SITE", "STEPS", "MODELS");
    for domain in domains {
        let site = &config.sites[domain];
        let default_marker = if config.server.default_site.as_ref() == Some(domain) {
            " (default)"
        } else {
            ""
        };
        println!(
            "{:<32} {:<10} {}{}",
            domain,
            site.workflow.len(),
            site.models.join(", "),
            default_marker
        );
    }
    Ok(())
}
