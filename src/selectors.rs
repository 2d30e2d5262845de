//! Selector micro-language.
//!
//! A selector string is classified by the first matching prefix into either a
//! strategy the WebDriver `find element` command understands natively, or a
//! custom strategy that is resolved by generating a lookup script.
//!
//! | prefix            | strategy          | native |
//! |-------------------|-------------------|--------|
//! | `xpath=`, `//`, `(//` | xpath         | yes    |
//! | `text=`           | text              | no     |
//! | `visible-text=`   | visible-text      | no     |
//! | `id=`             | id                | yes    |
//! | `class=`          | class name        | yes    |
//! | `tag=`            | tag name          | yes    |
//! | `link=`           | link text         | yes    |
//! | `partial-link=`   | partial link text | yes    |
//! | `data-testid=`    | data-testid       | no     |
//! | `aria-label=`     | aria-label        | no     |
//! | `role=`           | role              | no     |
//! | anything else     | css selector      | yes    |

use crate::{Error, Result};
use regex::Regex;

/// Lookup strategy chosen for a selector string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    CssSelector,
    XPath,
    LinkText,
    PartialLinkText,
    Id,
    ClassName,
    TagName,
    Text,
    DataTestId,
    AriaLabel,
    Role,
    VisibleText,
}

impl Strategy {
    /// Name used in the `using` field of a find request (and for diagnostics
    /// on custom strategies).
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CssSelector => "css selector",
            Strategy::XPath => "xpath",
            Strategy::LinkText => "link text",
            Strategy::PartialLinkText => "partial link text",
            Strategy::Id => "id",
            Strategy::ClassName => "class name",
            Strategy::TagName => "tag name",
            Strategy::Text => "text",
            Strategy::DataTestId => "data-testid",
            Strategy::AriaLabel => "aria-label",
            Strategy::Role => "role",
            Strategy::VisibleText => "visible-text",
        }
    }

    pub fn is_native(&self) -> bool {
        !matches!(
            self,
            Strategy::Text
                | Strategy::VisibleText
                | Strategy::DataTestId
                | Strategy::AriaLabel
                | Strategy::Role
        )
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in order after the XPath rules; the first hit wins.
const PREFIXES: &[(&str, Strategy)] = &[
    ("text=", Strategy::Text),
    ("visible-text=", Strategy::VisibleText),
    ("id=", Strategy::Id),
    ("class=", Strategy::ClassName),
    ("tag=", Strategy::TagName),
    ("link=", Strategy::LinkText),
    ("partial-link=", Strategy::PartialLinkText),
    ("data-testid=", Strategy::DataTestId),
    ("aria-label=", Strategy::AriaLabel),
    ("role=", Strategy::Role),
];

/// A classified selector. Derived fresh from each input string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
    pub strategy: Strategy,
    pub value: String,
    pub is_native: bool,
}

impl ParsedSelector {
    fn new(strategy: Strategy, value: &str) -> Self {
        Self {
            strategy,
            value: value.to_string(),
            is_native: strategy.is_native(),
        }
    }
}

/// Classify a selector string.
pub fn parse_selector(selector: &str) -> ParsedSelector {
    if let Some(rest) = selector.strip_prefix("xpath=") {
        return ParsedSelector::new(Strategy::XPath, rest);
    }
    // Bare XPath keeps its leading slashes.
    if selector.starts_with("//") || selector.starts_with("(//") {
        return ParsedSelector::new(Strategy::XPath, selector);
    }
    for (prefix, strategy) in PREFIXES {
        if let Some(rest) = selector.strip_prefix(prefix) {
            return ParsedSelector::new(*strategy, rest);
        }
    }
    ParsedSelector::new(Strategy::CssSelector, selector)
}

/// Escape double quotes for embedding in a double-quoted script literal.
///
/// This is the only escaping applied; it is not a defence against hostile
/// selector input.
pub fn escape_double_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

const TEXT_FILTER: &str = r#"function(el) {
    var directText = Array.from(el.childNodes)
        .filter(function(node) { return node.nodeType === 3; })
        .map(function(node) { return node.textContent; })
        .join('').trim();
    return directText === "__VALUE__" || el.textContent.trim() === "__VALUE__";
}"#;

const VISIBLE_TEXT_FILTER: &str = r#"function(el) {
    if (el.offsetWidth === 0 || el.offsetHeight === 0) return false;
    var style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    var text = el.textContent ? el.textContent.trim() : '';
    return text.includes("__VALUE__");
}"#;

fn filter(template: &str, escaped: &str) -> String {
    template.replace("__VALUE__", escaped)
}

/// Script body (for `execute/sync`) returning the single best match or `null`.
///
/// Native strategies are normally resolved by the find commands; their
/// scripts here mirror those lookups for in-page use.
pub fn find_one_script(strategy: Strategy, value: &str) -> String {
    let escaped = escape_double_quotes(value);
    match strategy {
        // The last match in document order is the most deeply nested one.
        Strategy::Text => format!(
            "var matches = Array.from(document.querySelectorAll('*')).filter({});\n\
             return matches.length > 0 ? matches[matches.length - 1] : null;",
            filter(TEXT_FILTER, &escaped)
        ),
        // Fewest descendant elements wins.
        Strategy::VisibleText => format!(
            "var matches = Array.from(document.querySelectorAll('*')).filter({});\n\
             matches.sort(function(a, b) {{\n\
                 return a.getElementsByTagName('*').length - b.getElementsByTagName('*').length;\n\
             }});\n\
             return matches.length > 0 ? matches[0] : null;",
            filter(VISIBLE_TEXT_FILTER, &escaped)
        ),
        Strategy::DataTestId => attribute_one("data-testid", &escaped),
        Strategy::AriaLabel => attribute_one("aria-label", &escaped),
        Strategy::Role => attribute_one("role", &escaped),
        Strategy::LinkText | Strategy::PartialLinkText => {
            format!("return {} || null;", link_find(strategy, &escaped))
        }
        Strategy::CssSelector
        | Strategy::XPath
        | Strategy::Id
        | Strategy::ClassName
        | Strategy::TagName => format!("return {};", native_one(strategy, value)),
    }
}

/// Script body returning every match as an array (unsorted, document order).
pub fn find_all_script(strategy: Strategy, value: &str) -> String {
    let escaped = escape_double_quotes(value);
    match strategy {
        Strategy::Text => format!(
            "return Array.from(document.querySelectorAll('*')).filter({});",
            filter(TEXT_FILTER, &escaped)
        ),
        Strategy::VisibleText => format!(
            "return Array.from(document.querySelectorAll('*')).filter({});",
            filter(VISIBLE_TEXT_FILTER, &escaped)
        ),
        Strategy::DataTestId => attribute_all("data-testid", &escaped),
        Strategy::AriaLabel => attribute_all("aria-label", &escaped),
        Strategy::Role => attribute_all("role", &escaped),
        Strategy::LinkText | Strategy::PartialLinkText => format!(
            "return Array.from(document.querySelectorAll('a')).filter({});",
            link_predicate(strategy, &escaped)
        ),
        Strategy::CssSelector => format!(
            "return Array.from(document.querySelectorAll(\"{}\"));",
            escaped
        ),
        Strategy::XPath => format!(
            "var snapshot = document.evaluate('{}', document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);\n\
             var out = [];\n\
             for (var i = 0; i < snapshot.snapshotLength; i++) out.push(snapshot.snapshotItem(i));\n\
             return out;",
            escape_single_quotes(value)
        ),
        Strategy::Id => format!(
            "return Array.from(document.querySelectorAll('[id=\"{}\"]'));",
            escaped
        ),
        Strategy::ClassName => format!(
            "return Array.from(document.getElementsByClassName(\"{}\"));",
            escaped
        ),
        Strategy::TagName => format!(
            "return Array.from(document.getElementsByTagName(\"{}\"));",
            escaped
        ),
    }
}

fn attribute_one(attr: &str, escaped: &str) -> String {
    format!("return document.querySelector('[{}=\"{}\"]');", attr, escaped)
}

fn attribute_all(attr: &str, escaped: &str) -> String {
    format!(
        "return Array.from(document.querySelectorAll('[{}=\"{}\"]'));",
        attr, escaped
    )
}

fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', "\\'")
}

// Link text is compared trimmed; partial links match on a substring.
fn link_predicate(strategy: Strategy, escaped: &str) -> String {
    let test = if strategy == Strategy::PartialLinkText {
        format!("a.textContent.trim().includes(\"{}\")", escaped)
    } else {
        format!("a.textContent.trim() === \"{}\"", escaped)
    };
    format!("function(a) {{ return {}; }}", test)
}

fn link_find(strategy: Strategy, escaped: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll('a')).find({})",
        link_predicate(strategy, escaped)
    )
}

/// Expression for the first node of a strategy the find commands understand.
fn native_one(strategy: Strategy, value: &str) -> String {
    let escaped = escape_double_quotes(value);
    match strategy {
        Strategy::XPath => format!(
            "document.evaluate('{}', document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            escape_single_quotes(value)
        ),
        Strategy::Id => format!("document.getElementById(\"{}\")", escaped),
        Strategy::ClassName => format!("document.getElementsByClassName(\"{}\")[0]", escaped),
        Strategy::TagName => format!("document.getElementsByTagName(\"{}\")[0]", escaped),
        Strategy::LinkText | Strategy::PartialLinkText => link_find(strategy, &escaped),
        // css selector; custom strategies go through `find_one_script`
        _ => format!("document.querySelector(\"{}\")", escaped),
    }
}

/// A JavaScript expression evaluating to the matched node (or null/undefined).
/// Used by the wait engine to embed a lookup inside a state check.
pub fn lookup_expression(parsed: &ParsedSelector) -> String {
    if parsed.is_native {
        return native_one(parsed.strategy, &parsed.value);
    }
    format!(
        "(function() {{\n{}\n}})()",
        find_one_script(parsed.strategy, &parsed.value)
    )
}

/// True for strings shaped like `/pattern/`.
pub fn is_regex(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('/') && s.ends_with('/')
}

/// Compile the interior of a `/pattern/` literal.
pub fn parse_regex(s: &str) -> Result<Regex> {
    if !is_regex(s) {
        return Err(Error::NotRegex(s.to_string()));
    }
    Ok(Regex::new(&s[1..s.len() - 1])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(s: &str) -> (Strategy, String, bool) {
        let p = parse_selector(s);
        (p.strategy, p.value, p.is_native)
    }

    #[test]
    fn prefixes_select_strategy() {
        let cases = [
            ("button.submit", Strategy::CssSelector, "button.submit", true),
            ("xpath=//div", Strategy::XPath, "//div", true),
            ("//button[@type='submit']", Strategy::XPath, "//button[@type='submit']", true),
            ("(//li)[2]", Strategy::XPath, "(//li)[2]", true),
            ("text=Submit Form", Strategy::Text, "Submit Form", false),
            ("visible-text=Submit", Strategy::VisibleText, "Submit", false),
            ("id=submitBtn", Strategy::Id, "submitBtn", true),
            ("class=submit-button", Strategy::ClassName, "submit-button", true),
            ("tag=button", Strategy::TagName, "button", true),
            ("link=Click Here", Strategy::LinkText, "Click Here", true),
            ("partial-link=Click", Strategy::PartialLinkText, "Click", true),
            ("data-testid=submit-button", Strategy::DataTestId, "submit-button", false),
            ("aria-label=Close dialog", Strategy::AriaLabel, "Close dialog", false),
            ("role=button", Strategy::Role, "button", false),
        ];
        for (input, strategy, value, native) in cases {
            assert_eq!(
                triple(input),
                (strategy, value.to_string(), native),
                "selector {:?}",
                input
            );
        }
    }

    #[test]
    fn unknown_prefix_is_css() {
        assert_eq!(
            triple("foo=bar"),
            (Strategy::CssSelector, "foo=bar".to_string(), true)
        );
        assert_eq!(triple(""), (Strategy::CssSelector, String::new(), true));
    }

    #[test]
    fn xpath_prefix_keeps_inner_text_prefixes() {
        // "xpath=" is checked first so its value is never re-classified.
        assert_eq!(
            triple("xpath=//a[text()='id=1']"),
            (Strategy::XPath, "//a[text()='id=1']".to_string(), true)
        );
    }

    #[test]
    fn scripts_embed_escaped_values() {
        let s = find_one_script(Strategy::Text, "Submit");
        assert!(s.contains("textContent.trim() === \"Submit\""));
        assert!(s.contains("matches[matches.length - 1]"));

        let v = find_one_script(Strategy::VisibleText, "Submit");
        assert!(v.contains("offsetWidth"));
        assert!(v.contains("getElementsByTagName('*').length"));

        assert!(find_one_script(Strategy::DataTestId, "submit-btn")
            .contains("[data-testid=\"submit-btn\"]"));
        assert!(find_one_script(Strategy::AriaLabel, "Close").contains("[aria-label=\"Close\"]"));
        assert!(find_one_script(Strategy::Role, "button").contains("[role=\"button\"]"));

        let quoted = find_one_script(Strategy::Text, "say \"hi\"");
        assert!(quoted.contains("say \\\"hi\\\""));
    }

    #[test]
    fn find_all_scripts_return_arrays_unsorted() {
        let all = find_all_script(Strategy::VisibleText, "Go");
        assert!(all.starts_with("return Array.from("));
        assert!(!all.contains("sort"));
        assert!(find_all_script(Strategy::Role, "tab").contains("querySelectorAll('[role=\"tab\"]')"));
    }

    #[test]
    fn native_strategy_scripts_use_matching_dom_lookups() {
        assert_eq!(
            find_one_script(Strategy::Id, "main"),
            "return document.getElementById(\"main\");"
        );
        assert!(find_all_script(Strategy::ClassName, "row")
            .contains("getElementsByClassName(\"row\")"));
        assert!(find_all_script(Strategy::TagName, "li").contains("getElementsByTagName(\"li\")"));
        assert!(find_all_script(Strategy::XPath, "//li").contains("ORDERED_NODE_SNAPSHOT_TYPE"));

        let link = find_one_script(Strategy::LinkText, "Home");
        assert!(link.starts_with("return Array.from(document.querySelectorAll('a')).find("));
        assert!(link.ends_with("|| null;"));
        assert!(!find_one_script(Strategy::LinkText, "Home").contains("querySelector(\"Home\")"));
    }

    #[test]
    fn lookup_expression_per_strategy() {
        let css = lookup_expression(&parse_selector("#main"));
        assert_eq!(css, "document.querySelector(\"#main\")");

        let xp = lookup_expression(&parse_selector("//a[@id='x']"));
        assert!(xp.contains("document.evaluate('//a[@id=\\'x\\']'"));

        assert_eq!(
            lookup_expression(&parse_selector("id=submitBtn")),
            "document.getElementById(\"submitBtn\")"
        );
        assert_eq!(
            lookup_expression(&parse_selector("class=spinner")),
            "document.getElementsByClassName(\"spinner\")[0]"
        );
        assert_eq!(
            lookup_expression(&parse_selector("tag=button")),
            "document.getElementsByTagName(\"button\")[0]"
        );
        assert!(lookup_expression(&parse_selector("link=Click Here"))
            .contains("a.textContent.trim() === \"Click Here\""));
        assert!(lookup_expression(&parse_selector("partial-link=Click"))
            .contains("a.textContent.trim().includes(\"Click\")"));

        let custom = lookup_expression(&parse_selector("role=dialog"));
        assert!(custom.starts_with("(function() {"));
        assert!(custom.contains("[role=\"dialog\"]"));
    }

    #[test]
    fn regex_literals() {
        assert!(is_regex("/abc/"));
        assert!(is_regex("//"));
        assert!(!is_regex("abc"));
        assert!(!is_regex("/"));
        assert!(!is_regex("/abc"));
        assert!(!is_regex(""));

        let re = parse_regex("/[a-z]+\\d{2,}/").unwrap();
        assert!(re.is_match("abc12"));
        assert!(matches!(parse_regex("/[/"), Err(Error::Regex(_))));
        assert!(matches!(parse_regex("abc"), Err(Error::NotRegex(_))));
    }
}
