use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
    #[error("Failed to start browser: {0}")]
    Launch(String),
    #[error("Could not find the {0} on the page")]
    NoMatch(&'static str),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Excel error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("Selector error: {0}")]
    Selector(String),
    #[error("Invalid input: {0}")]
    Config(String),
    #[error("Scrape cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
