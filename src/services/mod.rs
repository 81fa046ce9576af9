pub(crate) mod analytics;
pub(crate) mod events;
pub(crate) mod extraction;
#[cfg(test)]
pub(crate) mod fixture;
pub(crate) mod lookup;
pub(crate) mod place_locator;
pub(crate) mod review_loader;
pub(crate) mod scraping;

pub use analytics::ReviewAnalytics;
pub use events::{Progress, ScrapeEvent};
pub use lookup::LookupTimeouts;
pub use place_locator::{PlaceLocator, SearchOutcome};
pub use review_loader::{LoadDecision, LoadOutcome, ScrollPolicy};
pub use scraping::{ScrapeReport, ScrapeRequest, ScrapeSettings, ScrapingService};
