pub(crate) mod locator;
pub(crate) mod page;
pub(crate) mod place;
pub(crate) mod review;

pub use locator::{Locator, LocatorConfig, Locators, Strategy, StrategyChain};
pub use page::MapPage;
pub use place::{is_direct_link, PlaceTarget, SearchResult, Suggestion};
pub use review::{Review, ReviewSet};
