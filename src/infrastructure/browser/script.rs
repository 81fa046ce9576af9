//! JavaScript generated from [`Strategy`]s, so the browser applies the same
//! selector and text filters as the `scraper` side.

use crate::domain::Strategy;

/// Attribute put on an element before it is handed to CDP for a real click.
pub const MARK_ATTRIBUTE: &str = "data-mrs-target";
pub const MARK_SELECTOR: &str = "[data-mrs-target='1']";

/// Hides `navigator.webdriver` on every new document.
pub const WEBDRIVER_OVERRIDE: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// `pick(root, css, needles, min)` filters `root.querySelectorAll(css)` by
/// collapsed inner text.
const PICK: &str = r#"const pick = (root, css, needles, min) =>
  Array.from(root.querySelectorAll(css)).filter((el) => {
    if (!needles.length && min === null) return true;
    const text = (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim();
    if (min !== null && text.length < min) return false;
    if (!needles.length) return true;
    const lowered = text.toLowerCase();
    return needles.some((n) => lowered.includes(n));
  });"#;

fn js_string(value: &str) -> String {
    // JSON strings are valid JS string literals.
    serde_json::Value::String(value.to_string()).to_string()
}

fn pick_args(strategy: &Strategy) -> String {
    let needles = serde_json::Value::from(strategy.needles().to_vec()).to_string();
    let min = strategy
        .locator()
        .min_text_len
        .map(|n| n.to_string())
        .unwrap_or_else(|| "null".to_string());
    format!("{}, {}, {}", js_string(strategy.css()), needles, min)
}

fn wrap(body: String) -> String {
    format!("(() => {{\n{}\n{}\n}})()", PICK, body)
}

pub fn count(strategy: &Strategy) -> String {
    wrap(format!("return pick(document, {}).length;", pick_args(strategy)))
}

pub fn outer_html(strategy: &Strategy, limit: usize) -> String {
    wrap(format!(
        "return pick(document, {}).slice(0, {}).map((el) => el.outerHTML);",
        pick_args(strategy),
        limit
    ))
}

/// Marks the `index`-th match with [`MARK_ATTRIBUTE`] and scrolls it into
/// view. Evaluates to whether the element exists.
pub fn mark(strategy: &Strategy, index: usize) -> String {
    wrap(format!(
        r#"document.querySelectorAll({selector}).forEach((el) => el.removeAttribute({attr}));
const el = pick(document, {args})[{index}];
if (!el) return false;
el.setAttribute({attr}, '1');
el.scrollIntoView({{ block: 'center' }});
return true;"#,
        selector = js_string(MARK_SELECTOR),
        attr = js_string(MARK_ATTRIBUTE),
        args = pick_args(strategy),
        index = index
    ))
}

pub fn clear_value(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (el) el.value = ''; }})()",
        js_string(selector)
    )
}

pub fn click_within(scope: &Strategy, target: &Strategy) -> String {
    wrap(format!(
        r#"let clicked = 0;
for (const item of pick(document, {scope})) {{
  for (const button of pick(item, {target})) {{
    try {{ button.click(); clicked += 1; }} catch (e) {{}}
  }}
}}
return clicked;"#,
        scope = pick_args(scope),
        target = pick_args(target)
    ))
}

pub fn scroll_to_end(strategy: &Strategy) -> String {
    wrap(format!(
        r#"const el = pick(document, {})[0];
if (!el) return false;
el.scrollTop = el.scrollHeight;
return true;"#,
        pick_args(strategy)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Locator;

    #[test]
    fn selectors_and_needles_are_escaped() {
        let strategy = Strategy::new(
            Locator::css(r#"button[aria-label="Joe's"]"#).containing(&["It's"]),
        )
        .unwrap();
        let script = count(&strategy);

        assert!(script.contains(r#""button[aria-label=\"Joe's\"]""#));
        assert!(script.contains(r#"["it's"]"#));
        assert!(script.contains("null).length"));
    }

    #[test]
    fn min_length_is_passed_through() {
        let strategy = Strategy::new(Locator::css("span").min_len(20)).unwrap();
        let script = outer_html(&strategy, 7);

        assert!(script.contains(r#"pick(document, "span", [], 20).slice(0, 7)"#));
    }

    #[test]
    fn mark_targets_the_requested_index() {
        let strategy = Strategy::new(Locator::css("div[role='article']")).unwrap();
        let script = mark(&strategy, 3);

        assert!(script.contains(r#"pick(document, "div[role='article']", [], null)[3]"#));
        assert!(script.contains(r#"setAttribute("data-mrs-target", '1')"#));
    }

    #[test]
    fn click_within_scopes_the_target_query() {
        let scope = Strategy::new(Locator::css("div.jftiEf")).unwrap();
        let target = Strategy::new(Locator::css("button").containing(&["More"])).unwrap();
        let script = click_within(&scope, &target);

        assert!(script.contains(r#"pick(item, "button", ["more"], null)"#));
    }
}
