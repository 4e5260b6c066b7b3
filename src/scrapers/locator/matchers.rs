//! Matching rules for the download trigger.
//!
//! Each stage of the locator chain has a backend-neutral description here.
//! Browser surfaces compile them to CSS, XPath or an in-page script; the
//! test fixture evaluates them directly.

use serde::Deserialize;

/// Tags a trigger can be. Anything else is never clicked.
pub const CLICKABLE_TAGS: [&str; 3] = ["button", "a", "input"];

/// Input types that count as buttons for the text stage.
const BUTTON_INPUT_TYPES: [&str; 2] = ["submit", "button"];

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// Ordered structural selectors for `keyword`.
///
/// Attribute-value matches use the keyword verbatim (case-sensitive);
/// link and handler matches also try the lower-cased form.
pub fn structural_selectors(keyword: &str) -> Vec<String> {
    let kw = sanitize(keyword);
    let lower = kw.to_ascii_lowercase();
    vec![
        format!(r#"input[value="{kw}"]"#),
        format!(r#"button[value="{kw}"]"#),
        format!(r#"input[type="submit"][value="{kw}"]"#),
        format!(r#"input[type="button"][value="{kw}"]"#),
        format!(r#"a[href*="{lower}"]"#),
        format!(r#"*[onclick*="{lower}"]"#),
        format!(r#"*[onclick*="{kw}"]"#),
        format!(r#"form[action*="{lower}"] input[type="submit"]"#),
        format!(r#"form[action*="{lower}"] button"#),
        format!(r#"input[name*="{lower}"]"#),
        format!(r#"input[id*="{lower}"]"#),
    ]
}

/// What the locator knows about one candidate element.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementView<'a> {
    /// Lower-case tag name.
    pub tag: &'a str,
    pub input_type: Option<&'a str>,
    /// Text content including descendants.
    pub text: &'a str,
    pub value: Option<&'a str>,
    pub title: Option<&'a str>,
    pub aria_label: Option<&'a str>,
    pub href: Option<&'a str>,
    /// Source of the click handler, whether bound as attribute or property.
    pub handler: Option<&'a str>,
}

/// Case-insensitive keyword match over text and descriptive attributes of
/// buttons, links and button-like inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    keyword: String,
}

impl TextQuery {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: sanitize(keyword).to_ascii_lowercase(),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Whether `view` satisfies the query.
    pub fn matches(&self, view: &ElementView<'_>) -> bool {
        let kind_ok = match view.tag {
            "button" | "a" => true,
            "input" => view
                .input_type
                .map(|t| BUTTON_INPUT_TYPES.contains(&t.to_ascii_lowercase().as_str()))
                .unwrap_or(false),
            _ => false,
        };
        if !kind_ok {
            return false;
        }

        std::iter::once(Some(view.text))
            .chain([view.value, view.title, view.aria_label, view.href])
            .flatten()
            .any(|s| contains_ci(s, &self.keyword))
    }

    /// XPath 1.0 expression equivalent to `matches`.
    pub fn to_xpath(&self) -> String {
        let fields = [".", "@value", "@title", "@aria-label", "@href"];
        let any_field = fields
            .iter()
            .map(|f| {
                format!(
                    "contains(translate({f}, '{UPPER}', '{LOWER}'), '{}')",
                    self.keyword
                )
            })
            .collect::<Vec<_>>()
            .join(" or ");

        format!(
            "//button[{any_field}] | //a[{any_field}] | //input[(@type='submit' or @type='button') and ({any_field})]"
        )
    }
}

/// Last-resort scan: any clickable element whose text, value, click handler
/// or link target mentions the keyword, case-insensitively.
pub fn dom_scan_matches(keyword: &str, view: &ElementView<'_>) -> bool {
    if !CLICKABLE_TAGS.contains(&view.tag) {
        return false;
    }
    let kw = keyword.to_ascii_lowercase();
    std::iter::once(Some(view.text))
        .chain([view.value, view.handler, view.href])
        .flatten()
        .any(|s| contains_ci(s, &kw))
}

/// In-page helper computing a unique CSS path for an element.
///
/// Stops at the nearest ancestor with an id. Used so that matches found by
/// script can be resolved to handles without tagging the DOM.
const CSS_PATH_JS: &str = r#"const cssPath = (el) => {
        const parts = [];
        while (el && el.nodeType === 1 && el !== document.documentElement) {
            if (el.id) { parts.unshift('#' + CSS.escape(el.id)); break; }
            let i = 1;
            for (let s = el.previousElementSibling; s; s = s.previousElementSibling) {
                if (s.tagName === el.tagName) i++;
            }
            parts.unshift(el.tagName.toLowerCase() + ':nth-of-type(' + i + ')');
            el = el.parentElement;
        }
        return parts.join(' > ');
    };"#;

/// In-page script for the DOM scan. Evaluates to the CSS paths of every
/// visible match, in document order.
pub fn dom_scan_script(keyword: &str) -> String {
    let kw = sanitize(keyword).to_ascii_lowercase();
    format!(
        r#"(() => {{
    const kw = '{kw}';
    const clickable = ['BUTTON', 'A', 'INPUT'];
    const has = (s) => typeof s === 'string' && s.toLowerCase().includes(kw);
    const visible = (el) => {{
        const r = el.getBoundingClientRect();
        const s = window.getComputedStyle(el);
        return r.width > 0 && r.height > 0 && s.visibility !== 'hidden'
            && s.display !== 'none' && parseFloat(s.opacity) !== 0;
    }};
    {CSS_PATH_JS}
    const out = [];
    for (const el of document.querySelectorAll('*')) {{
        if (!clickable.includes(el.tagName)) continue;
        const handler = el.onclick ? el.onclick.toString() : el.getAttribute('onclick');
        if (![el.textContent, el.value, handler, el.getAttribute('href')].some(has)) continue;
        if (visible(el)) out.push(cssPath(el));
    }}
    return out;
}})()"#
    )
}

/// In-page script evaluating an XPath query to CSS paths.
pub fn xpath_paths_script(xpath: &str) -> String {
    let literal = serde_json::to_string(xpath).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(() => {{
    {CSS_PATH_JS}
    const snap = document.evaluate({literal}, document, null,
        XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    const out = [];
    for (let i = 0; i < snap.snapshotLength; i++) out.push(cssPath(snap.snapshotItem(i)));
    return out;
}})()"#
    )
}

/// Function run against an element to read its box and style, returned
/// as a JSON string.
pub const GEOMETRY_FN: &str = r#"function() {
    const r = this.getBoundingClientRect();
    const s = window.getComputedStyle(this);
    return JSON.stringify({
        width: r.width,
        height: r.height,
        visibility: s.visibility,
        display: s.display,
        opacity: parseFloat(s.opacity)
    });
}"#;

/// Function run against an element to fire a synthetic click.
pub const DISPATCH_CLICK_FN: &str = r#"function() {
    this.dispatchEvent(new MouseEvent('click', { bubbles: true, cancelable: true, view: window }));
    return true;
}"#;

/// Rendered box and computed style of an element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElementGeometry {
    pub width: f64,
    pub height: f64,
    pub visibility: String,
    pub display: String,
    pub opacity: f64,
}

impl ElementGeometry {
    /// Non-zero box, not hidden, not `display: none`, not fully transparent.
    pub fn is_interactable(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.visibility != "hidden"
            && self.display != "none"
            && self.opacity != 0.0
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_ascii_lowercase().contains(needle_lower)
}

/// Keep the keyword safe to splice into selectors, XPath and script literals.
fn sanitize(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '\\' | '\n' | '\r'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view<'a>(tag: &'a str, text: &'a str) -> ElementView<'a> {
        ElementView {
            tag,
            text,
            ..Default::default()
        }
    }

    #[test]
    fn test_structural_order_starts_with_exact_value() {
        let selectors = structural_selectors("CSV");
        assert_eq!(selectors[0], r#"input[value="CSV"]"#);
        assert!(selectors.contains(&r#"a[href*="csv"]"#.to_string()));
        assert!(selectors.contains(&r#"*[onclick*="CSV"]"#.to_string()));
    }

    #[test]
    fn test_text_query_kinds() {
        let q = TextQuery::new("CSV");
        assert!(q.matches(&view("a", "Descargar csv")));
        assert!(q.matches(&view("button", "CSV")));
        assert!(!q.matches(&view("div", "CSV")));

        let text_input = ElementView {
            tag: "input",
            input_type: Some("text"),
            value: Some("csv"),
            ..Default::default()
        };
        assert!(!q.matches(&text_input));

        let submit = ElementView {
            input_type: Some("SUBMIT"),
            ..text_input
        };
        assert!(q.matches(&submit));
    }

    #[test]
    fn test_text_query_attributes() {
        let q = TextQuery::new("csv");
        let titled = ElementView {
            tag: "a",
            title: Some("Exportar a CSV"),
            ..Default::default()
        };
        assert!(q.matches(&titled));

        let labelled = ElementView {
            tag: "button",
            aria_label: Some("Descargar Csv"),
            ..Default::default()
        };
        assert!(q.matches(&labelled));
    }

    #[test]
    fn test_xpath_shape() {
        let xpath = TextQuery::new("CSV").to_xpath();
        assert!(xpath.starts_with("//button["));
        assert!(xpath.contains("'csv'"));
        assert!(xpath.contains("@aria-label"));
        assert!(xpath.contains("@type='submit' or @type='button'"));
    }

    #[test]
    fn test_dom_scan_matches_handler() {
        let bound = ElementView {
            tag: "a",
            text: "Descargar",
            handler: Some("function () { exportCsv(); }"),
            ..Default::default()
        };
        assert!(dom_scan_matches("CSV", &bound));
        assert!(!TextQuery::new("CSV").matches(&bound));

        let span = ElementView {
            tag: "span",
            handler: Some("exportCsv()"),
            ..Default::default()
        };
        assert!(!dom_scan_matches("CSV", &span));
    }

    #[test]
    fn test_sanitize_strips_quotes() {
        let selectors = structural_selectors(r#"C"SV"#);
        assert_eq!(selectors[0], r#"input[value="CSV"]"#);
        assert!(dom_scan_script("c'sv").contains("const kw = 'csv';"));
    }

    #[test]
    fn test_xpath_script_quotes_query() {
        let script = xpath_paths_script("//a[@x='1']");
        assert!(script.contains(r#"document.evaluate("//a[@x='1']""#));
        assert!(script.contains("const cssPath"));
    }

    #[test]
    fn test_geometry_interactable() {
        let visible = ElementGeometry {
            width: 80.0,
            height: 20.0,
            visibility: "visible".into(),
            display: "inline-block".into(),
            opacity: 1.0,
        };
        assert!(visible.is_interactable());
        assert!(!ElementGeometry {
            width: 0.0,
            ..visible.clone()
        }
        .is_interactable());
        assert!(!ElementGeometry {
            visibility: "hidden".into(),
            ..visible.clone()
        }
        .is_interactable());
        assert!(!ElementGeometry {
            opacity: 0.0,
            ..visible
        }
        .is_interactable());
    }
}
