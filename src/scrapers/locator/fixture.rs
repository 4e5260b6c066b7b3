//! Synthetic DOM for exercising the locator and extraction flow in tests.
//!
//! HTML is parsed with `scraper`. Layout is approximated from inline
//! styles and a few test-only attributes:
//! - `data-box="WxH"` sets the rendered size (default 100x20)
//! - `data-handler="..."` is a click handler bound as a DOM property, so it
//!   is invisible to attribute selectors
//! - `data-lazy` hides the element until the page has been scrolled
//! - `data-download="name.csv"` writes a file into the download directory
//!   when the element is clicked

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{
    dom_scan_matches, ElementGeometry, ElementView, TextQuery, TriggerSurface,
};
use crate::scrapers::error::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClickKind {
    Native,
    Synthetic,
}

#[derive(Debug)]
struct FixtureNode {
    tag: String,
    attrs: HashMap<String, String>,
    style: HashMap<String, String>,
    text: String,
    ancestor_hidden: bool,
}

impl FixtureNode {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    fn view(&self) -> ElementView<'_> {
        ElementView {
            tag: &self.tag,
            input_type: self.attr("type"),
            text: &self.text,
            value: self.attr("value"),
            title: self.attr("title"),
            aria_label: self.attr("aria-label"),
            href: self.attr("href"),
            handler: self.attr("data-handler").or_else(|| self.attr("onclick")),
        }
    }

    fn geometry(&self) -> ElementGeometry {
        let (width, height) = self
            .attr("data-box")
            .and_then(|b| b.split_once('x'))
            .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)))
            .unwrap_or((100.0, 20.0));

        let display = if self.ancestor_hidden || self.attrs.contains_key("hidden") {
            "none".to_string()
        } else {
            self.style
                .get("display")
                .cloned()
                .unwrap_or_else(|| "inline-block".to_string())
        };

        ElementGeometry {
            width,
            height,
            visibility: self
                .style
                .get("visibility")
                .cloned()
                .unwrap_or_else(|| "visible".to_string()),
            display,
            opacity: self
                .style
                .get("opacity")
                .and_then(|o| o.parse().ok())
                .unwrap_or(1.0),
        }
    }
}

pub(crate) struct HtmlFixture {
    source: String,
    nodes: Vec<FixtureNode>,
    revealed: AtomicBool,
    scrolls: AtomicU32,
    clicks: Mutex<Vec<(usize, ClickKind)>>,
    fail_direct_click: bool,
    download: Option<(PathBuf, String)>,
}

impl HtmlFixture {
    pub(crate) fn new(html: &str) -> Self {
        let document = Html::parse_document(html);
        let nodes = elements(&document)
            .map(|el| {
                let attrs: HashMap<String, String> = el
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                let ancestor_hidden = el
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|a| parse_style(a.value().attr("style")).get("display").map(|d| d.as_str()) == Some("none"));
                FixtureNode {
                    tag: el.value().name().to_ascii_lowercase(),
                    style: parse_style(attrs.get("style").map(|s| s.as_str())),
                    attrs,
                    text: el.text().collect::<String>(),
                    ancestor_hidden,
                }
            })
            .collect();

        Self {
            source: html.to_string(),
            nodes,
            revealed: AtomicBool::new(false),
            scrolls: AtomicU32::new(0),
            clicks: Mutex::new(Vec::new()),
            fail_direct_click: false,
            download: None,
        }
    }

    /// Make native clicks fail so the synthetic fallback is used.
    pub(crate) fn with_failing_click(mut self) -> Self {
        self.fail_direct_click = true;
        self
    }

    /// Clicking a `data-download` element writes `content` into `dir`.
    pub(crate) fn with_download_dir(mut self, dir: PathBuf, content: String) -> Self {
        self.download = Some((dir, content));
        self
    }

    pub(crate) fn id_of(&self, handle: usize) -> Option<String> {
        self.nodes.get(handle)?.attr("id").map(str::to_string)
    }

    pub(crate) fn scroll_count(&self) -> u32 {
        self.scrolls.load(Ordering::SeqCst)
    }

    pub(crate) fn clicks(&self) -> Vec<(usize, ClickKind)> {
        self.clicks.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn present(&self, idx: usize) -> bool {
        self.nodes
            .get(idx)
            .map(|n| !n.attrs.contains_key("data-lazy") || self.revealed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn record_click(&self, idx: usize, kind: ClickKind) -> Result<(), ExtractError> {
        if let Ok(mut clicks) = self.clicks.lock() {
            clicks.push((idx, kind));
        }
        let target = self.nodes.get(idx).and_then(|n| n.attr("data-download"));
        if let (Some(name), Some((dir, content))) = (target, &self.download) {
            std::fs::write(dir.join(name), content)?;
        }
        Ok(())
    }
}

fn elements(document: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
}

fn parse_style(style: Option<&str>) -> HashMap<String, String> {
    style
        .unwrap_or_default()
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_ascii_lowercase()))
        .collect()
}

#[async_trait]
impl TriggerSurface for HtmlFixture {
    type Handle = usize;

    async fn query_css(&self, selector: &str) -> Result<Vec<usize>, ExtractError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| ExtractError::Browser(format!("invalid selector {}: {:?}", selector, e)))?;
        let document = Html::parse_document(&self.source);
        let matches = elements(&document)
            .enumerate()
            .filter(|(_, el)| parsed.matches(el))
            .map(|(i, _)| i)
            .filter(|i| self.present(*i))
            .collect();
        Ok(matches)
    }

    async fn query_text(&self, query: &TextQuery) -> Result<Vec<usize>, ExtractError> {
        Ok((0..self.nodes.len())
            .filter(|i| self.present(*i) && query.matches(&self.nodes[*i].view()))
            .collect())
    }

    async fn scan_dom(&self, keyword: &str) -> Result<Vec<usize>, ExtractError> {
        Ok((0..self.nodes.len())
            .filter(|i| {
                let node = &self.nodes[*i];
                self.present(*i)
                    && dom_scan_matches(keyword, &node.view())
                    && node.geometry().is_interactable()
            })
            .collect())
    }

    async fn geometry(&self, handle: &usize) -> Result<Option<ElementGeometry>, ExtractError> {
        if !self.present(*handle) {
            return Ok(None);
        }
        Ok(self.nodes.get(*handle).map(FixtureNode::geometry))
    }

    async fn scroll_cycle(&self) -> Result<(), ExtractError> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        self.revealed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn click(&self, handle: &usize) -> Result<(), ExtractError> {
        if self.fail_direct_click {
            return Err(ExtractError::Browser(
                "Node is either not visible or not an HTMLElement".to_string(),
            ));
        }
        self.record_click(*handle, ClickKind::Native)
    }

    async fn dispatch_click(&self, handle: &usize) -> Result<(), ExtractError> {
        self.record_click(*handle, ClickKind::Synthetic)
    }
}
