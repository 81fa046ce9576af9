use crate::config::cli::Args;
use crate::domain::{LocatorConfig, Locators};
use crate::error::{Result, ScraperError};
use crate::infrastructure::BrowserSettings;
use crate::services::{ScrapeSettings, ScrollPolicy};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) mod cli;

pub struct Config {
    pub args: Args,
    pub locators: Arc<Locators>,
    pub scrape: ScrapeSettings,
    pub browser: BrowserSettings,
}

impl Config {
    pub fn new() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self> {
        let locator_config = match &args.locators {
            Some(path) => {
                info!("Loading locators from {}", path.display());
                LocatorConfig::from_json(&std::fs::read_to_string(path)?)?
            }
            None => LocatorConfig::default(),
        };
        let locators = Arc::new(locator_config.compile()?);

        if args.min_attempts > args.max_attempts {
            return Err(ScraperError::Config(format!(
                "--min-attempts ({}) exceeds --max-attempts ({})",
                args.min_attempts, args.max_attempts
            )));
        }

        let scrape = ScrapeSettings {
            policy: ScrollPolicy {
                min_attempts: args.min_attempts,
                max_attempts: args.max_attempts,
                grace: args.grace,
                settle: Duration::from_millis(args.settle_ms),
                ..ScrollPolicy::default()
            },
            expand_text: !args.no_expand,
            ..ScrapeSettings::default()
        };

        let browser = BrowserSettings {
            headful: args.headful,
            chrome_path: args.chrome_path.clone(),
            remote_url: args.remote_browser.clone(),
            ..BrowserSettings::default()
        };

        Ok(Self {
            args,
            locators,
            scrape,
            browser,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::Command;
    use std::io::Write;

    #[test]
    fn flags_flow_into_settings() {
        let args = Args::parse_from([
            "maps-review-scraper",
            "scrape",
            "coffee",
            "--count",
            "20",
            "--grace",
            "5",
            "--no-expand",
            "--export",
            "csv",
            "xlsx",
        ]);
        let config = Config::from_args(args).unwrap();

        assert_eq!(config.scrape.policy.grace, 5);
        assert!(!config.scrape.expand_text);
        assert!(!config.browser.headful);
        let Command::Scrape { count, export, .. } = &config.args.command else {
            panic!("expected scrape");
        };
        assert_eq!(*count, 20);
        assert_eq!(export.len(), 2);
    }

    #[test]
    fn locator_file_is_applied() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "search_box": ["input.custom-search"] }}"#).unwrap();

        let args = Args::parse_from([
            "maps-review-scraper",
            "--locators",
            file.path().to_str().unwrap(),
            "search",
            "bakery",
        ]);
        let config = Config::from_args(args).unwrap();

        assert_eq!(config.locators.search_box.strategies()[0].css(), "input.custom-search");
        assert!(!config.locators.review_items.is_empty());
    }

    #[test]
    fn inconsistent_attempt_bounds_are_rejected() {
        let args = Args::parse_from([
            "maps-review-scraper",
            "--min-attempts",
            "10",
            "--max-attempts",
            "3",
            "search",
            "x",
        ]);
        assert!(matches!(Config::from_args(args), Err(ScraperError::Config(_))));
    }
}
