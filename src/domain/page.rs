use super::locator::Strategy;
use crate::error::Result;
use async_trait::async_trait;

/// The browser operations the place locator and the scraper rely on.
///
/// Every element lookup goes through a [`Strategy`], so the fallback chains
/// live in configuration and not in the callers.
#[async_trait]
pub trait MapPage: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<Option<String>>;

    /// Number of elements currently matching `strategy`.
    async fn count(&self, strategy: &Strategy) -> Result<usize>;

    /// Outer HTML of at most `limit` matching elements, in document order.
    async fn outer_html(&self, strategy: &Strategy, limit: usize) -> Result<Vec<String>>;

    /// Clicks the `index`-th match. `Ok(false)` if there is no such element.
    async fn click(&self, strategy: &Strategy, index: usize) -> Result<bool>;

    /// Clicks every `target` match inside every `scope` match and returns
    /// how many clicks happened.
    async fn click_within(&self, scope: &Strategy, target: &Strategy) -> Result<usize>;

    /// Types into the first match and presses Enter.
    async fn type_and_submit(&self, strategy: &Strategy, text: &str) -> Result<()>;

    /// Scrolls the first match to its bottom. `Ok(false)` if nothing matched.
    async fn scroll_to_end(&self, strategy: &Strategy) -> Result<bool>;
}
