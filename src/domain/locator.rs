use crate::error::{Result, ScraperError};
use crate::utils::collapse_whitespace;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// A single lookup expression, as written in the locator config.
///
/// In JSON either a bare CSS string or an object:
/// `{ "css": "span", "text_contains": ["ago"], "attribute": "aria-label" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LocatorRepr")]
pub struct Locator {
    pub css: String,
    /// Case-insensitive; the element text must contain at least one of these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_contains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_text_len: Option<usize>,
    /// Read this attribute instead of the element text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocatorRepr {
    Css(String),
    Full {
        css: String,
        #[serde(default)]
        text_contains: Vec<String>,
        #[serde(default)]
        min_text_len: Option<usize>,
        #[serde(default)]
        attribute: Option<String>,
    },
}

impl From<LocatorRepr> for Locator {
    fn from(repr: LocatorRepr) -> Self {
        match repr {
            LocatorRepr::Css(css) => Locator::css(css),
            LocatorRepr::Full {
                css,
                text_contains,
                min_text_len,
                attribute,
            } => Locator {
                css,
                text_contains,
                min_text_len,
                attribute,
            },
        }
    }
}

impl Locator {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text_contains: Vec::new(),
            min_text_len: None,
            attribute: None,
        }
    }

    pub fn containing(mut self, needles: &[&str]) -> Self {
        self.text_contains = needles.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn min_len(mut self, len: usize) -> Self {
        self.min_text_len = Some(len);
        self
    }

    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.attribute = Some(name.into());
        self
    }
}

/// A compiled [`Locator`].
#[derive(Debug, Clone)]
pub struct Strategy {
    locator: Locator,
    selector: Selector,
    needles: Vec<String>,
}

impl Strategy {
    pub fn new(locator: Locator) -> Result<Self> {
        let selector = Selector::parse(&locator.css)
            .map_err(|e| ScraperError::Selector(format!("{}: {}", locator.css, e)))?;
        let needles = locator
            .text_contains
            .iter()
            .map(|n| n.to_lowercase())
            .collect();

        Ok(Self {
            locator,
            selector,
            needles,
        })
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn css(&self) -> &str {
        &self.locator.css
    }

    /// Lowercased text filters.
    pub fn needles(&self) -> &[String] {
        &self.needles
    }

    /// Whether an element with this (collapsed) text passes the text filters.
    pub fn accepts_text(&self, text: &str) -> bool {
        if let Some(min) = self.locator.min_text_len {
            if text.chars().count() < min {
                return false;
            }
        }
        if self.needles.is_empty() {
            return true;
        }
        let lowered = text.to_lowercase();
        self.needles.iter().any(|n| lowered.contains(n.as_str()))
    }

    fn accepts(&self, element: &ElementRef) -> bool {
        if self.needles.is_empty() && self.locator.min_text_len.is_none() {
            return true;
        }
        self.accepts_text(&element_text(element))
    }

    /// Descendants of `root` matching the selector and the text filters.
    pub fn select_in<'a>(&'a self, root: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        root.select(&self.selector).filter(move |el| self.accepts(el))
    }

    pub fn select_document<'a>(&'a self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document
            .select(&self.selector)
            .filter(|el| self.accepts(el))
            .collect()
    }

    /// The configured attribute, or the collapsed text, if non-empty.
    pub fn value_of(&self, element: ElementRef) -> Option<String> {
        let raw = match &self.locator.attribute {
            Some(attr) => element.value().attr(attr).map(collapse_whitespace),
            None => Some(element_text(&element)),
        }?;

        if raw.is_empty() {
            None
        } else {
            Some(raw)
        }
    }
}

pub fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// An ordered list of alternative strategies; the first that yields wins.
#[derive(Debug, Clone)]
pub struct StrategyChain {
    name: &'static str,
    strategies: Vec<Strategy>,
}

impl StrategyChain {
    pub fn compile(name: &'static str, locators: &[Locator]) -> Result<Self> {
        let strategies = locators
            .iter()
            .cloned()
            .map(Strategy::new)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { name, strategies })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// First value produced by any strategy, in chain order, that `accept`
    /// maps to `Some`.
    pub fn first_value<F>(&self, root: ElementRef, accept: F) -> Option<String>
    where
        F: Fn(String) -> Option<String>,
    {
        self.strategies.iter().find_map(|strategy| {
            strategy
                .select_in(root)
                .filter_map(|el| strategy.value_of(el))
                .find_map(&accept)
        })
    }

    /// First non-empty value in chain order.
    pub fn first_text(&self, root: ElementRef) -> Option<String> {
        self.first_value(root, Some)
    }
}

/// Every strategy chain the scraper uses. Missing keys in a JSON override
/// fall back to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub consent_button: Vec<Locator>,
    pub search_box: Vec<Locator>,
    pub search_results: Vec<Locator>,
    pub result_name: Vec<Locator>,
    pub result_info: Vec<Locator>,
    pub result_link: Vec<Locator>,
    pub reviews_tab: Vec<Locator>,
    pub review_container: Vec<Locator>,
    pub review_items: Vec<Locator>,
    pub more_button: Vec<Locator>,
    pub review_id_attributes: Vec<String>,
    pub reviewer_name: Vec<Locator>,
    pub rating: Vec<Locator>,
    pub date: Vec<Locator>,
    pub text: Vec<Locator>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            consent_button: vec![
                Locator::css("button").containing(&["Accept all"]),
                Locator::css("button").containing(&["I agree"]),
                Locator::css("button").containing(&["Accept"]),
            ],
            search_box: vec![
                Locator::css("input#searchboxinput"),
                Locator::css("input[name='q']"),
                Locator::css("input[aria-label*='earch']"),
            ],
            search_results: vec![
                Locator::css("div[role='feed'] div[role='article']"),
                Locator::css("div[role='article']"),
                Locator::css("div[jsaction*='pane.listItem']"),
            ],
            result_name: vec![
                Locator::css(".qBF1Pd"),
                Locator::css(".fontHeadlineSmall"),
                Locator::css("h3"),
                Locator::css("a[aria-label]").attr("aria-label"),
            ],
            result_info: vec![
                Locator::css(".W4Efsd").containing(&["·"]),
                Locator::css("div").containing(&["stars", "★"]),
            ],
            result_link: vec![
                Locator::css("a[href*='/maps/place']").attr("href"),
                Locator::css("a[href*='maps']").attr("href"),
            ],
            reviews_tab: vec![
                Locator::css("button[role='tab']").containing(&["review"]),
                Locator::css("button[aria-label*='eview']"),
                Locator::css("button").containing(&["review"]),
                Locator::css("span").containing(&["★", "stars"]),
                Locator::css("div[aria-label*='rating']"),
            ],
            review_container: vec![
                Locator::css("div.m6QErb.DxyBCb.kA9KIf.dS8AEf"),
                Locator::css("div[role='feed']"),
                Locator::css("div[jsaction*='pane.review']"),
                Locator::css("div.m6QErb[tabindex='-1']"),
            ],
            review_items: vec![
                Locator::css("div.jftiEf[data-review-id]"),
                Locator::css("div[data-review-id]"),
                Locator::css("div[jsaction*='review.out']"),
            ],
            more_button: vec![
                Locator::css("button.w8nwRe"),
                Locator::css("button").containing(&["More"]),
            ],
            review_id_attributes: vec!["data-review-id".to_string()],
            reviewer_name: vec![
                Locator::css(".d4r55"),
                Locator::css("button[data-href*='contrib'] div"),
                Locator::css("a[href*='contrib']"),
                Locator::css("a"),
            ],
            rating: vec![
                Locator::css("span.kvMYJc").attr("aria-label"),
                Locator::css("span[role='img'][aria-label]").attr("aria-label"),
                Locator::css("span[aria-label*='star']").attr("aria-label"),
                Locator::css("span[aria-label*='Star']").attr("aria-label"),
                Locator::css("span.fzvQIb"),
                Locator::css("span").containing(&["★"]),
            ],
            date: vec![
                Locator::css("span.rsqaWe"),
                Locator::css("time"),
                Locator::css("span").containing(&["ago", "/"]),
                Locator::css("span").containing(&["day", "week", "month", "year"]),
            ],
            text: vec![
                Locator::css("span.wiI7pd"),
                Locator::css("div.MyEned span"),
                Locator::css("span").min_len(11),
                Locator::css("div").min_len(11),
            ],
        }
    }
}

impl LocatorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn compile(&self) -> Result<Locators> {
        Ok(Locators {
            consent_button: StrategyChain::compile("consent button", &self.consent_button)?,
            search_box: StrategyChain::compile("search box", &self.search_box)?,
            search_results: StrategyChain::compile("search results", &self.search_results)?,
            result_name: StrategyChain::compile("result name", &self.result_name)?,
            result_info: StrategyChain::compile("result info", &self.result_info)?,
            result_link: StrategyChain::compile("result link", &self.result_link)?,
            reviews_tab: StrategyChain::compile("reviews tab", &self.reviews_tab)?,
            review_container: StrategyChain::compile(
                "review container",
                &self.review_container,
            )?,
            review_items: StrategyChain::compile("review items", &self.review_items)?,
            more_button: StrategyChain::compile("more button", &self.more_button)?,
            review_id_attributes: self.review_id_attributes.clone(),
            reviewer_name: StrategyChain::compile("reviewer name", &self.reviewer_name)?,
            rating: StrategyChain::compile("rating", &self.rating)?,
            date: StrategyChain::compile("date", &self.date)?,
            text: StrategyChain::compile("review text", &self.text)?,
        })
    }
}

/// Compiled [`LocatorConfig`].
#[derive(Debug, Clone)]
pub struct Locators {
    pub consent_button: StrategyChain,
    pub search_box: StrategyChain,
    pub search_results: StrategyChain,
    pub result_name: StrategyChain,
    pub result_info: StrategyChain,
    pub result_link: StrategyChain,
    pub reviews_tab: StrategyChain,
    pub review_container: StrategyChain,
    pub review_items: StrategyChain,
    pub more_button: StrategyChain,
    pub review_id_attributes: Vec<String>,
    pub reviewer_name: StrategyChain,
    pub rating: StrategyChain,
    pub date: StrategyChain,
    pub text: StrategyChain,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(html: &str) -> Html {
        Html::parse_fragment(html)
    }

    #[test]
    fn defaults_compile() {
        assert!(LocatorConfig::default().compile().is_ok());
    }

    #[test]
    fn json_override_replaces_only_named_chains() {
        let config = LocatorConfig::from_json(
            r#"{ "date": ["span.when", { "css": "em", "text_contains": ["ago"] }] }"#,
        )
        .unwrap();

        assert_eq!(config.date.len(), 2);
        assert_eq!(config.date[0], Locator::css("span.when"));
        assert_eq!(config.date[1].text_contains, vec!["ago".to_string()]);
        assert_eq!(config.search_box, LocatorConfig::default().search_box);
    }

    #[test]
    fn invalid_css_is_a_selector_error() {
        let err = Strategy::new(Locator::css("div[")).unwrap_err();
        assert!(matches!(err, ScraperError::Selector(_)));
    }

    #[test]
    fn chain_takes_first_strategy_that_yields() {
        let chain = StrategyChain::compile(
            "date",
            &[
                Locator::css("time"),
                Locator::css("span").containing(&["ago"]),
                Locator::css("span"),
            ],
        )
        .unwrap();
        let doc = root("<div><span>Local Guide</span><span>3 weeks ago</span></div>");

        assert_eq!(
            chain.first_text(doc.root_element()).as_deref(),
            Some("3 weeks ago")
        );
    }

    #[test]
    fn empty_text_does_not_count_as_a_match() {
        let chain =
            StrategyChain::compile("name", &[Locator::css("a"), Locator::css("b")]).unwrap();
        let doc = root("<div><a>   </a><b> Jane   Doe </b></div>");

        assert_eq!(chain.first_text(doc.root_element()).as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn attribute_strategies_read_the_attribute() {
        let chain = StrategyChain::compile(
            "rating",
            &[Locator::css("span[aria-label]").attr("aria-label")],
        )
        .unwrap();
        let doc = root(r#"<div><span aria-label=" 4 stars "></span></div>"#);

        assert_eq!(chain.first_text(doc.root_element()).as_deref(), Some("4 stars"));
    }

    #[test]
    fn min_text_len_filters_short_elements() {
        let strategy = Strategy::new(Locator::css("span").min_len(11)).unwrap();
        let doc = root("<div><span>short</span><span>long enough text</span></div>");

        let texts: Vec<String> = strategy
            .select_in(doc.root_element())
            .map(|el| element_text(&el))
            .collect();
        assert_eq!(texts, vec!["long enough text".to_string()]);
    }
}
