//! OpenAPI from routes - command-line tool.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-routes [-v] <COMMAND>
//! ```
//!
//! # Examples
//!
//! Generate a service fragment:
//! ```bash
//! openapi-from-routes generate ./inventory-service -o openapi/items.yaml
//! ```
//!
//! Generate a Rust module for a build script:
//! ```bash
//! openapi-from-routes generate ./inventory-service -f rust -o src/openapi.rs
//! ```
//!
//! Compose and validate the gateway contract:
//! ```bash
//! openapi-from-routes compose openapi/compose.yaml -f json -o openapi.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_routes::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI from routes starting...");

    cli::run(args)?;

    Ok(())
}
