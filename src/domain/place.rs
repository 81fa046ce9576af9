use serde::{Deserialize, Serialize};

/// Substrings that mark a query as a link to a place rather than a name.
pub const DIRECT_LINK_MARKERS: &[&str] = &[
    "maps.google",
    "google.com/maps",
    "goo.gl/maps",
    "maps.app.goo.gl",
    "g.co/",
];

pub const NO_RATING_INFO: &str = "No rating";
pub const NO_ADDRESS: &str = "No address";

pub fn is_direct_link(query: &str) -> bool {
    let query = query.trim().to_lowercase();
    DIRECT_LINK_MARKERS.iter().any(|m| query.contains(m))
}

/// One entry of the search results list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub rating: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Index of the card among all result elements on the page, nameless
    /// ones included.
    #[serde(default)]
    pub position: usize,
}

impl SearchResult {
    /// Builds a result from the info line, e.g. `"4.6(1,024) · Café · 12 Main St"`.
    pub fn from_info(name: String, info: Option<&str>, link: Option<String>) -> Self {
        let parts: Vec<&str> = info
            .map(|i| i.split('·').map(str::trim).filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        let rating = parts
            .first()
            .map(|p| p.to_string())
            .unwrap_or_else(|| NO_RATING_INFO.to_string());
        let address = if parts.len() > 1 {
            parts[parts.len() - 1].to_string()
        } else {
            NO_ADDRESS.to_string()
        };

        Self {
            name,
            rating,
            address,
            link,
            position: 0,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn label(&self) -> String {
        format!("{} - {} - {}", self.name, self.rating, self.address)
    }
}

/// What to open before scraping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaceTarget {
    /// A place URL, opened directly.
    Link { url: String },
    /// The `index`-th entry on the results page for `query`.
    SearchHit { query: String, index: usize },
    /// The search for `query` landed on a place page by itself.
    Direct { query: String },
}

/// A choice offered to the user after a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: usize,
    pub label: String,
    pub target: PlaceTarget,
}

impl Suggestion {
    pub fn link(url: &str) -> Self {
        Self {
            id: 0,
            label: url.trim().to_string(),
            target: PlaceTarget::Link {
                url: url.trim().to_string(),
            },
        }
    }

    pub fn proceed_directly(query: &str) -> Self {
        Self {
            id: 0,
            label: format!("Continue with \"{}\"", query),
            target: PlaceTarget::Direct {
                query: query.to_string(),
            },
        }
    }

    pub fn from_results(query: &str, results: &[SearchResult]) -> Vec<Self> {
        results
            .iter()
            .enumerate()
            .map(|(id, result)| Self {
                id,
                label: result.label(),
                target: match &result.link {
                    Some(url) => PlaceTarget::Link { url: url.clone() },
                    None => PlaceTarget::SearchHit {
                        query: query.to_string(),
                        index: result.position,
                    },
                },
            })
            .collect()
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.target, PlaceTarget::Direct { .. })
    }

    /// True when opening the place needs no click on a results page.
    pub fn opens_directly(&self) -> bool {
        matches!(
            self.target,
            PlaceTarget::Direct { .. } | PlaceTarget::Link { .. }
        )
    }
}
