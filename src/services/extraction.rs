use super::events::{Progress, ScrapeEvent};
use crate::domain::locator::element_text;
use crate::domain::review::{ANONYMOUS, NO_RATING, NO_TEXT, UNKNOWN_DATE};
use crate::domain::{Locators, Review, ReviewSet};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

static RATING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").unwrap());

/// First number in an accessibility label or star text.
///
/// `"4.5 stars"` -> `"4.5"`, `"Rated 4,0 out of 5"` -> `"4.0"`.
pub fn parse_rating(label: &str) -> Option<String> {
    RATING_NUMBER
        .captures(label)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace(',', "."))
}

/// Hash-based id for review elements without an id attribute. Changes if the
/// rendered text changes.
pub fn text_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

pub struct ReviewExtractor {
    locators: Arc<Locators>,
}

impl ReviewExtractor {
    pub fn new(locators: Arc<Locators>) -> Self {
        Self { locators }
    }

    /// Adds the reviews in `snapshots` (outer HTML of review elements) to
    /// `set`, skipping known ids, until the set is full. Returns how many
    /// were added.
    pub fn absorb(&self, snapshots: &[String], set: &mut ReviewSet, progress: &Progress) -> usize {
        let mut added = 0;
        let mut duplicates = 0;

        for snapshot in snapshots {
            if set.is_full() {
                break;
            }

            let Some(review) = self.extract(snapshot) else {
                warn!("Skipping review snapshot without an element");
                continue;
            };

            if set.insert(review.clone()) {
                added += 1;
                progress.emit(ScrapeEvent::Extracted(review));
            } else {
                duplicates += 1;
            }
        }

        debug!(
            "Extracted {} new reviews ({} duplicates, {} total)",
            added,
            duplicates,
            set.len()
        );
        added
    }

    /// Reads one review element. `None` only if the snapshot holds no element.
    pub fn extract(&self, snapshot: &str) -> Option<Review> {
        let fragment = Html::parse_fragment(snapshot);
        let root = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)?;

        Some(self.read_review(root))
    }

    fn read_review(&self, root: ElementRef) -> Review {
        let locators = &self.locators;

        let name = locators
            .reviewer_name
            .first_text(root)
            .unwrap_or_else(|| ANONYMOUS.to_string());
        let rating = locators
            .rating
            .first_value(root, |value| parse_rating(&value))
            .unwrap_or_else(|| NO_RATING.to_string());
        let date = locators
            .date
            .first_text(root)
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());
        let text = locators
            .text
            .first_text(root)
            .unwrap_or_else(|| NO_TEXT.to_string());

        Review {
            id: self.review_id(root),
            name,
            rating,
            date,
            text,
        }
    }

    fn review_id(&self, root: ElementRef) -> String {
        self.locators
            .review_id_attributes
            .iter()
            .filter_map(|attr| root.value().attr(attr))
            .map(str::trim)
            .find(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| text_id(&element_text(&root)))
    }
}
