use super::events::{Progress, ScrapeEvent};
use super::extraction::ReviewExtractor;
use super::lookup::{first_present, wait_for_chain, LookupTimeouts};
use super::place_locator::PlaceLocator;
use super::review_loader::{LoadOutcome, ReviewFeed, ReviewLoader, ScrollPolicy};
use crate::domain::locator::Strategy;
use crate::domain::{Locators, MapPage, PlaceTarget, ReviewSet, StrategyChain};
use crate::error::{Result, ScraperError};
use crate::utils::poll_until;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Settle delay after expanding truncated review texts.
const EXPAND_SETTLE: Duration = Duration::from_millis(200);
/// Delay after a successful click on the reviews tab.
const TAB_SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub target: PlaceTarget,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub reviews: ReviewSet,
    pub load: LoadOutcome,
}

#[derive(Debug, Clone, Copy)]
pub struct ScrapeSettings {
    pub policy: ScrollPolicy,
    pub timeouts: LookupTimeouts,
    pub expand_text: bool,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            policy: ScrollPolicy::default(),
            timeouts: LookupTimeouts::default(),
            expand_text: true,
        }
    }
}

pub struct ScrapingService {
    locators: Arc<Locators>,
    settings: ScrapeSettings,
    places: PlaceLocator,
    extractor: ReviewExtractor,
}

impl ScrapingService {
    pub fn new(locators: Arc<Locators>, settings: ScrapeSettings) -> Self {
        info!("Created new Scraping service");
        Self {
            places: PlaceLocator::new(locators.clone(), settings.timeouts),
            extractor: ReviewExtractor::new(locators.clone()),
            locators,
            settings,
        }
    }

    pub fn places(&self) -> &PlaceLocator {
        &self.places
    }

    pub async fn scrape(
        &self,
        page: &dyn MapPage,
        request: &ScrapeRequest,
        progress: &Progress,
    ) -> Result<ScrapeReport> {
        if request.count < 1 {
            return Err(ScraperError::Config(
                "number of reviews must be positive".to_string(),
            ));
        }

        progress.status("Opening place...");
        self.places.open(page, &request.target).await?;

        self.open_reviews_tab(page, progress).await;

        let timeouts = self.settings.timeouts;
        let container = wait_for_chain(
            page,
            &self.locators.review_container,
            timeouts.required,
            timeouts.poll_interval,
        )
        .await?
        .ok_or(ScraperError::NoMatch("review container"))?;

        progress.status(format!("Scrolling to load {} reviews...", request.count));
        let feed = PageFeed {
            page,
            container,
            items: &self.locators.review_items,
        };
        let load = ReviewLoader::new(self.settings.policy)
            .load(&feed, request.count, progress)
            .await?;

        progress.status("Extracting review data...");
        let mut reviews = ReviewSet::new(request.count);
        if let Some((items, visible)) = first_present(page, &self.locators.review_items).await? {
            if self.settings.expand_text {
                self.expand_truncated(page, items).await;
            }
            let limit = visible.max(request.count.saturating_mul(4));
            let snapshots = page.outer_html(items, limit).await?;
            self.extractor.absorb(&snapshots, &mut reviews, progress);
        } else {
            warn!("No review elements found after scrolling");
        }

        info!("Scraped {} reviews", reviews.len());
        progress.emit(ScrapeEvent::Finished {
            count: reviews.len(),
        });

        Ok(ScrapeReport { reviews, load })
    }

    async fn open_reviews_tab(&self, page: &dyn MapPage, progress: &Progress) {
        let timeouts = self.settings.timeouts;

        for strategy in self.locators.reviews_tab.strategies() {
            let found = appears_within(page, strategy, timeouts).await;
            if !found {
                continue;
            }
            match page.click(strategy, 0).await {
                Ok(true) => {
                    info!("Opened reviews via '{}'", strategy.css());
                    sleep(TAB_SETTLE).await;
                    return;
                }
                Ok(false) => {}
                Err(e) => warn!("Clicking '{}' failed: {}", strategy.css(), e),
            }
        }

        warn!("Reviews tab not found");
        progress.status("Couldn't find reviews tab directly, trying to locate reviews...");
    }

    /// Clicks every "more" button inside review items. Failures are ignored.
    async fn expand_truncated(&self, page: &dyn MapPage, items: &Strategy) {
        let mut clicked = 0;
        for button in self.locators.more_button.strategies() {
            match page.click_within(items, button).await {
                Ok(n) => clicked += n,
                Err(e) => warn!("Expanding reviews via '{}' failed: {}", button.css(), e),
            }
            if clicked > 0 {
                break;
            }
        }

        if clicked > 0 {
            info!("Expanded {} truncated reviews", clicked);
            sleep(EXPAND_SETTLE).await;
        }
    }
}

async fn appears_within(page: &dyn MapPage, strategy: &Strategy, timeouts: LookupTimeouts) -> bool {
    poll_until(timeouts.optional, timeouts.poll_interval, || async move {
        Ok((page.count(strategy).await? > 0).then_some(()))
    })
    .await
    .map(|found| found.is_some())
    .unwrap_or(false)
}

/// Scrolls the review container and counts review items with the first
/// item strategy that matches anything.
struct PageFeed<'a> {
    page: &'a dyn MapPage,
    container: &'a Strategy,
    items: &'a StrategyChain,
}

#[async_trait]
impl ReviewFeed for PageFeed<'_> {
    async fn advance(&self) -> Result<()> {
        if !self.page.scroll_to_end(self.container).await? {
            warn!("Review container '{}' disappeared", self.container.css());
        }
        Ok(())
    }

    async fn visible(&self) -> Result<usize> {
        Ok(first_present(self.page, self.items)
            .await?
            .map(|(_, n)| n)
            .unwrap_or(0))
    }
}
