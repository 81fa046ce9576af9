use crate::config::cli::Command;
use crate::config::Config;
use crate::error::Result;
use crate::presentation::terminal::{self, ScrapeOptions};
use crate::presentation::web;
use std::str::FromStr;
use tracing::{info, Level};

mod config;
mod domain;
mod error;
mod infrastructure;
mod presentation;
mod services;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new()?;

    let level = Level::from_str(&config.args.log_level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    match &config.args.command {
        Command::Search { query } => terminal::search(&config, query).await?,
        Command::Scrape {
            query,
            count,
            pick,
            export,
            out_dir,
        } => {
            let options = ScrapeOptions {
                query: query.clone(),
                count: *count,
                pick: *pick,
                exports: export.clone(),
                out_dir: out_dir.clone(),
            };
            terminal::scrape(&config, options).await?;
            info!("Scraping completed successfully!");
        }
        Command::Serve { bind } => web::serve(&config, *bind).await?,
    }

    Ok(())
}
