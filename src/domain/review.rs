use serde::{Deserialize, Serialize};

pub const ANONYMOUS: &str = "Anonymous";
pub const NO_RATING: &str = "N/A";
pub const UNKNOWN_DATE: &str = "Unknown date";
pub const NO_TEXT: &str = "No review text";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub name: String,
    /// Numeric string such as `"4"` or `"4.5"`, or [`NO_RATING`].
    pub rating: String,
    /// As displayed ("3 weeks ago"); never parsed.
    pub date: String,
    pub text: String,
}

impl Review {
    pub fn numeric_rating(&self) -> Option<f64> {
        self.rating.parse().ok()
    }
}

/// Reviews collected during one scraping run, in discovery order.
///
/// Ids are compared by linear scan; the set never grows past `capacity`,
/// which is the requested review count.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewSet {
    reviews: Vec<Review>,
    capacity: usize,
}

impl ReviewSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            reviews: Vec::with_capacity(capacity.min(512)),
            capacity,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.reviews.iter().any(|r| r.id == id)
    }

    pub fn is_full(&self) -> bool {
        self.reviews.len() >= self.capacity
    }

    /// Returns `false` if the set is full or the id was already seen.
    pub fn insert(&mut self, review: Review) -> bool {
        if self.is_full() || self.contains(&review.id) {
            return false;
        }
        self.reviews.push(review);
        true
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[Review] {
        &self.reviews
    }

    pub fn into_vec(self) -> Vec<Review> {
        self.reviews
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(id: &str) -> Review {
        Review {
            id: id.to_string(),
            name: "Jane".to_string(),
            rating: "5".to_string(),
            date: "a week ago".to_string(),
            text: "Great coffee".to_string(),
        }
    }

    #[test]
    fn insert_skips_known_ids() {
        let mut set = ReviewSet::new(10);
        assert!(set.insert(review("a")));
        assert!(!set.insert(review("a")));
        assert!(set.insert(review("b")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn insert_stops_at_capacity() {
        let mut set = ReviewSet::new(1);
        assert!(set.insert(review("a")));
        assert!(set.is_full());
        assert!(!set.insert(review("b")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn numeric_rating_ignores_placeholder() {
        let mut r = review("a");
        assert_eq!(r.numeric_rating(), Some(5.0));
        r.rating = NO_RATING.to_string();
        assert_eq!(r.numeric_rating(), None);
    }
}
