//! In-memory [`MapPage`] over static HTML, for exercising the services
//! without a browser.

use crate::domain::locator::Strategy;
use crate::domain::MapPage;
use crate::error::Result;
use async_trait::async_trait;
use scraper::Html;
use std::sync::Mutex;

/// Where revealed reviews are spliced into the page.
pub const REVIEWS_MARKER: &str = "<!--reviews-->";

#[derive(Default)]
struct FixtureState {
    html: String,
    url: Option<String>,
    after_submit: Option<(String, Option<String>)>,
    reviews: Vec<String>,
    revealed: usize,
    reveal_step: usize,
    visited: Vec<String>,
    typed: Vec<String>,
    clicks: Vec<(String, usize)>,
    scrolls: usize,
}

impl FixtureState {
    fn render(&self) -> String {
        let shown = self.reviews[..self.revealed.min(self.reviews.len())].join("\n");
        self.html.replace(REVIEWS_MARKER, &shown)
    }

    fn matches(&self, strategy: &Strategy) -> Vec<String> {
        let document = Html::parse_document(&self.render());
        strategy
            .select_document(&document)
            .into_iter()
            .map(|el| el.html())
            .collect()
    }
}

pub struct FixturePage {
    state: Mutex<FixtureState>,
}

impl FixturePage {
    pub fn new(html: &str) -> Self {
        Self {
            state: Mutex::new(FixtureState {
                html: html.to_string(),
                ..FixtureState::default()
            }),
        }
    }

    /// Page shown after the search box is submitted.
    pub fn on_submit(self, html: &str, url: Option<&str>) -> Self {
        self.state.lock().unwrap().after_submit =
            Some((html.to_string(), url.map(str::to_string)));
        self
    }

    /// Reviews revealed `step` at a time; `initial` are visible up front.
    pub fn with_reviews(self, reviews: Vec<String>, initial: usize, step: usize) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.reviews = reviews;
            state.revealed = initial;
            state.reveal_step = step;
        }
        self
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn clicks(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }
}

#[async_trait]
impl MapPage for FixturePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.visited.push(url.to_string());
        state.url = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn count(&self, strategy: &Strategy) -> Result<usize> {
        Ok(self.state.lock().unwrap().matches(strategy).len())
    }

    async fn outer_html(&self, strategy: &Strategy, limit: usize) -> Result<Vec<String>> {
        let mut found = self.state.lock().unwrap().matches(strategy);
        found.truncate(limit);
        Ok(found)
    }

    async fn click(&self, strategy: &Strategy, index: usize) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.matches(strategy).len() <= index {
            return Ok(false);
        }
        state.clicks.push((strategy.css().to_string(), index));
        Ok(true)
    }

    async fn click_within(&self, scope: &Strategy, target: &Strategy) -> Result<usize> {
        let state = self.state.lock().unwrap();
        let document = Html::parse_document(&state.render());
        let clicked = scope
            .select_document(&document)
            .into_iter()
            .map(|el| target.select_in(el).count())
            .sum();
        Ok(clicked)
    }

    async fn type_and_submit(&self, strategy: &Strategy, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.matches(strategy).is_empty() {
            return Err(crate::error::ScraperError::NoMatch("input"));
        }
        state.typed.push(text.to_string());
        if let Some((html, url)) = state.after_submit.take() {
            state.html = html;
            if url.is_some() {
                state.url = url;
            }
        }
        Ok(())
    }

    async fn scroll_to_end(&self, strategy: &Strategy) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.matches(strategy).is_empty() {
            return Ok(false);
        }
        state.scrolls += 1;
        state.revealed += state.reveal_step;
        Ok(true)
    }
}
