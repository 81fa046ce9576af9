use super::lookup::{wait_for_any, wait_for_chain, LookupTimeouts};
use crate::domain::locator::Strategy;
use crate::domain::{is_direct_link, Locators, MapPage, PlaceTarget, SearchResult, Suggestion};
use crate::error::{Result, ScraperError};
use scraper::{ElementRef, Html};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub const SEARCH_URL: &str = "https://www.google.com/maps";
pub const MAX_RESULTS: usize = 10;

/// Result of looking up a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The query was already a place link; nothing was searched.
    DirectLink(String),
    Results(Vec<SearchResult>),
    /// The search went straight to a single place page.
    PlacePage,
    NoResults,
}

impl SearchOutcome {
    pub fn suggestions(&self, query: &str) -> Vec<Suggestion> {
        match self {
            SearchOutcome::DirectLink(url) => vec![Suggestion::link(url)],
            SearchOutcome::Results(results) => Suggestion::from_results(query, results),
            SearchOutcome::PlacePage => vec![Suggestion::proceed_directly(query)],
            SearchOutcome::NoResults => Vec::new(),
        }
    }
}

pub struct PlaceLocator {
    locators: Arc<Locators>,
    timeouts: LookupTimeouts,
}

impl PlaceLocator {
    pub fn new(locators: Arc<Locators>, timeouts: LookupTimeouts) -> Self {
        Self { locators, timeouts }
    }

    pub async fn search(&self, page: &dyn MapPage, query: &str) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ScraperError::Config(
                "enter a place name or Google Maps link".to_string(),
            ));
        }

        if is_direct_link(query) {
            info!("Query is a map link, skipping search");
            return Ok(SearchOutcome::DirectLink(query.to_string()));
        }

        let Some(results) = self.submit_query(page, query).await? else {
            return Ok(self.without_result_list(page).await);
        };

        let snapshots = page.outer_html(results, MAX_RESULTS).await?;
        let parsed: Vec<SearchResult> = snapshots
            .iter()
            .enumerate()
            .filter_map(|(position, html)| Some(self.parse_result(html)?.at(position)))
            .collect();

        info!("Found {} results for '{}'", parsed.len(), query);
        if parsed.is_empty() {
            Ok(SearchOutcome::NoResults)
        } else {
            Ok(SearchOutcome::Results(parsed))
        }
    }

    /// Brings the page to the place described by `target`.
    pub async fn open(&self, page: &dyn MapPage, target: &PlaceTarget) -> Result<()> {
        match target {
            PlaceTarget::Link { url } => {
                info!("Navigating to {}", url);
                page.navigate(url).await
            }
            PlaceTarget::SearchHit { query, index } => {
                let results = self
                    .submit_query(page, query)
                    .await?
                    .ok_or(ScraperError::NoMatch("search results"))?;
                if !page.click(results, *index).await? {
                    return Err(ScraperError::Other(format!(
                        "search result {} is no longer on the page",
                        index + 1
                    )));
                }
                Ok(())
            }
            PlaceTarget::Direct { query } => {
                self.submit_query(page, query).await?;
                Ok(())
            }
        }
    }

    /// Runs the search and returns the strategy that matched the result
    /// list, if any.
    async fn submit_query(&self, page: &dyn MapPage, query: &str) -> Result<Option<&Strategy>> {
        info!("Searching for '{}'", query);
        page.navigate(SEARCH_URL).await?;
        self.dismiss_consent(page).await;

        let search_box = wait_for_chain(
            page,
            &self.locators.search_box,
            self.timeouts.required,
            self.timeouts.poll_interval,
        )
        .await?
        .ok_or(ScraperError::NoMatch("search box"))?;

        page.type_and_submit(search_box, query).await?;

        wait_for_chain(
            page,
            &self.locators.search_results,
            self.timeouts.required,
            self.timeouts.poll_interval,
        )
        .await
    }

    async fn dismiss_consent(&self, page: &dyn MapPage) {
        let found = wait_for_any(
            page,
            &self.locators.consent_button,
            self.timeouts.optional,
            self.timeouts.poll_interval,
        )
        .await;

        match found {
            Ok(Some(button)) => match page.click(button, 0).await {
                Ok(true) => {
                    debug!("Dismissed consent dialog");
                    sleep(Duration::from_secs(1)).await;
                }
                Ok(false) => {}
                Err(e) => debug!("Consent click failed: {}", e),
            },
            Ok(None) => debug!("No consent dialog"),
            Err(e) => debug!("Consent lookup failed: {}", e),
        }
    }

    async fn without_result_list(&self, page: &dyn MapPage) -> SearchOutcome {
        match page.current_url().await {
            Ok(Some(url)) if url.contains("/maps/place/") => {
                info!("Search opened a place page directly");
                SearchOutcome::PlacePage
            }
            Ok(_) => SearchOutcome::NoResults,
            Err(e) => {
                warn!("Could not read the current URL: {}", e);
                SearchOutcome::NoResults
            }
        }
    }

    fn parse_result(&self, snapshot: &str) -> Option<SearchResult> {
        let fragment = Html::parse_fragment(snapshot);
        let root = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)?;

        let Some(name) = self.locators.result_name.first_text(root) else {
            warn!("Skipping search result without a name");
            return None;
        };
        let info = self.locators.result_info.first_text(root);
        let link = self.locators.result_link.first_text(root);

        Some(SearchResult::from_info(name, info.as_deref(), link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocatorConfig;
    use crate::services::fixture::FixturePage;

    fn locator() -> PlaceLocator {
        PlaceLocator::new(
            Arc::new(LocatorConfig::default().compile().unwrap()),
            LookupTimeouts {
                optional: Duration::from_millis(5),
                required: Duration::from_millis(5),
                poll_interval: Duration::from_millis(1),
            },
        )
    }

    const SEARCH_PAGE: &str = r#"<html><body>
        <input id="searchboxinput" aria-label="Search Google Maps">
    </body></html>"#;

    const RESULTS_PAGE: &str = r#"<html><body>
        <input id="searchboxinput">
        <div role="feed">
          <div role="article">
            <a class="hfpxzc" href="https://www.google.com/maps/place/Blue+Bottle" aria-label="Blue Bottle"></a>
            <div class="qBF1Pd">Blue Bottle Coffee</div>
            <div class="W4Efsd">4.5 stars · Coffee shop · 300 Webster St</div>
          </div>
          <div role="article">
            <div class="qBF1Pd">Philz Coffee</div>
          </div>
          <div role="article"><img src="ad.png"></div>
        </div>
    </body></html>"#;

    #[tokio::test]
    async fn direct_links_bypass_the_search() {
        let page = FixturePage::new(SEARCH_PAGE);
        let outcome = locator()
            .search(&page, "https://maps.app.goo.gl/xyz")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SearchOutcome::DirectLink("https://maps.app.goo.gl/xyz".into())
        );
        assert!(page.visited().is_empty());
        assert!(page.typed().is_empty());
    }

    #[tokio::test]
    async fn parses_result_cards() {
        let page = FixturePage::new(SEARCH_PAGE).on_submit(RESULTS_PAGE, None);
        let outcome = locator().search(&page, "coffee oakland").await.unwrap();

        let SearchOutcome::Results(results) = &outcome else {
            panic!("expected results, got {:?}", outcome);
        };
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "Blue Bottle Coffee");
        assert_eq!(results[0].rating, "4.5 stars");
        assert_eq!(results[0].address, "300 Webster St");
        assert_eq!(
            results[0].link.as_deref(),
            Some("https://www.google.com/maps/place/Blue+Bottle")
        );
        assert_eq!(results[1].link, None);
        assert_eq!(page.visited(), vec![SEARCH_URL.to_string()]);
        assert_eq!(page.typed(), vec!["coffee oakland".to_string()]);

        let suggestions = outcome.suggestions("coffee oakland");
        assert!(matches!(suggestions[1].target, PlaceTarget::SearchHit { index: 1, .. }));
    }

    #[tokio::test]
    async fn missing_search_box_is_fatal() {
        let page = FixturePage::new("<html><body><p>blocked</p></body></html>");
        let err = locator().search(&page, "coffee").await.unwrap_err();

        assert!(matches!(err, ScraperError::NoMatch("search box")));
    }

    #[tokio::test]
    async fn landing_on_a_place_page_offers_to_proceed() {
        let page = FixturePage::new(SEARCH_PAGE).on_submit(
            "<html><body><h1>Blue Bottle</h1></body></html>",
            Some("https://www.google.com/maps/place/Blue+Bottle/@37.8,-122.2"),
        );
        let outcome = locator().search(&page, "blue bottle webster").await.unwrap();

        assert_eq!(outcome, SearchOutcome::PlacePage);
        assert!(outcome.suggestions("blue bottle webster")[0].is_direct());
    }

    #[tokio::test]
    async fn consent_dialog_is_clicked_when_present() {
        let page = FixturePage::new(
            r#"<html><body><form><button>Reject all</button><button>Accept all</button></form>
               <input name="q"></body></html>"#,
        );
        let outcome = locator().search(&page, "bakery").await.unwrap();

        assert_eq!(outcome, SearchOutcome::NoResults);
        assert_eq!(page.clicks(), vec![("button".to_string(), 0)]);
    }

    const AD_FIRST_PAGE: &str = r#"<html><body>
        <input id="searchboxinput">
        <div role="feed">
          <div role="article"><img src="sponsored.png"></div>
          <div role="article">
            <div class="qBF1Pd">Philz Coffee</div>
            <div class="W4Efsd">4.4 stars · Coffee shop · 4300 Telegraph Ave</div>
          </div>
        </div>
    </body></html>"#;

    #[tokio::test]
    async fn search_hits_click_the_card_they_were_parsed_from() {
        let locator = locator();
        let page = FixturePage::new(SEARCH_PAGE).on_submit(AD_FIRST_PAGE, None);
        let outcome = locator.search(&page, "coffee").await.unwrap();

        let suggestions = outcome.suggestions("coffee");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].id, 0);
        assert_eq!(
            suggestions[0].target,
            PlaceTarget::SearchHit {
                query: "coffee".into(),
                index: 1
            }
        );

        locator.open(&page, &suggestions[0].target).await.unwrap();
        assert_eq!(
            page.clicks(),
            vec![("div[role='feed'] div[role='article']".to_string(), 1)]
        );
    }
}
