use crate::infrastructure::ExportFormat;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    pub headful: bool,

    /// Path to the Chrome/Chromium executable
    #[arg(long, global = true, env = "CHROME_EXECUTABLE")]
    pub chrome_path: Option<PathBuf>,

    /// DevTools endpoint of a running browser to use instead of launching one
    #[arg(long, global = true)]
    pub remote_browser: Option<String>,

    /// JSON file overriding the built-in element locators
    #[arg(long, global = true)]
    pub locators: Option<PathBuf>,

    /// Minimum scroll attempts before the loader may stop
    #[arg(long, global = true, default_value_t = 4)]
    pub min_attempts: usize,

    /// Hard ceiling on scroll attempts
    #[arg(long, global = true, default_value_t = 50)]
    pub max_attempts: usize,

    /// Scroll attempts without new reviews tolerated before stopping
    #[arg(long, global = true, default_value_t = 3)]
    pub grace: usize,

    /// How long each scroll attempt waits for new reviews, in milliseconds
    #[arg(long, global = true, default_value_t = 1500)]
    pub settle_ms: u64,

    /// Do not click "More" on truncated reviews
    #[arg(long, global = true)]
    pub no_expand: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the places matching a name, or check a map link
    Search {
        query: String,
    },
    /// Scrape reviews of a place and export them
    Scrape {
        /// Place name or Google Maps link
        query: String,

        /// Number of reviews to collect
        #[arg(long, short = 'n', default_value_t = 50)]
        count: usize,

        /// Which search result to use (1-based); asks when omitted
        #[arg(long)]
        pick: Option<usize>,

        /// Export formats to write after scraping
        #[arg(long, value_enum, num_args = 1..)]
        export: Vec<ExportFormat>,

        /// Directory for exported files
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Serve the web interface
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
}
