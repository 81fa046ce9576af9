use super::script;
use crate::domain::{MapPage, Strategy};
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// [`MapPage`] over a live Chromium tab.
#[derive(Clone)]
pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub(super) fn into_inner(self) -> Page {
        self.page
    }

    async fn eval<T: DeserializeOwned>(&self, js: String) -> Result<T> {
        Ok(self.page.evaluate(js).await?.into_value::<T>()?)
    }

    /// Marks the match for CDP and returns whether it exists.
    async fn mark(&self, strategy: &Strategy, index: usize) -> Result<bool> {
        self.eval(script::mark(strategy, index)).await
    }
}

#[async_trait]
impl MapPage for ChromePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        tokio::time::timeout(NAVIGATION_TIMEOUT, self.page.goto(url))
            .await
            .map_err(|_| {
                ScraperError::Other(format!(
                    "Navigation timed out after {}s for {}",
                    NAVIGATION_TIMEOUT.as_secs(),
                    url
                ))
            })??;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.page.url().await?)
    }

    async fn count(&self, strategy: &Strategy) -> Result<usize> {
        self.eval(script::count(strategy)).await
    }

    async fn outer_html(&self, strategy: &Strategy, limit: usize) -> Result<Vec<String>> {
        self.eval(script::outer_html(strategy, limit)).await
    }

    async fn click(&self, strategy: &Strategy, index: usize) -> Result<bool> {
        if !self.mark(strategy, index).await? {
            return Ok(false);
        }
        debug!("Clicking '{}' #{}", strategy.css(), index);
        self.page
            .find_element(script::MARK_SELECTOR)
            .await?
            .click()
            .await?;
        Ok(true)
    }

    async fn click_within(&self, scope: &Strategy, target: &Strategy) -> Result<usize> {
        self.eval(script::click_within(scope, target)).await
    }

    async fn type_and_submit(&self, strategy: &Strategy, text: &str) -> Result<()> {
        if !self.mark(strategy, 0).await? {
            return Err(ScraperError::NoMatch("search box"));
        }
        self.page
            .evaluate(script::clear_value(script::MARK_SELECTOR))
            .await?;

        self.page
            .find_element(script::MARK_SELECTOR)
            .await?
            .click()
            .await?
            .type_str(text)
            .await?
            .press_key("Enter")
            .await?;
        Ok(())
    }

    async fn scroll_to_end(&self, strategy: &Strategy) -> Result<bool> {
        self.eval(script::scroll_to_end(strategy)).await
    }
}
