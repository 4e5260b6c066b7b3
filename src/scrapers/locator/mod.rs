//! Download trigger locator.
//!
//! The target page's markup is not under our control, so the trigger is
//! found by an ordered chain of increasingly permissive matchers:
//!
//! 1. structural CSS selectors on exact attribute values
//! 2. case-insensitive text/attribute matching on buttons and links
//! 3. a full DOM scan that also inspects click handler source
//!
//! Every stage applies the same interactability check. When a whole pass
//! finds nothing, the page is scrolled to the bottom and back to wake lazy
//! content, and the pass is repeated.

mod matchers;

#[cfg(test)]
pub(crate) mod fixture;

pub use matchers::{
    dom_scan_matches, dom_scan_script, structural_selectors, xpath_paths_script, ElementGeometry,
    ElementView, TextQuery, CLICKABLE_TAGS, DISPATCH_CLICK_FN, GEOMETRY_FN,
};

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::error::ExtractError;

/// A rendered page the locator can query and click.
#[async_trait]
pub trait TriggerSurface: Send + Sync {
    /// Reference to one element on the page.
    type Handle: Send + Sync;

    /// Elements matching a CSS selector, in document order.
    async fn query_css(&self, selector: &str) -> Result<Vec<Self::Handle>, ExtractError>;

    /// Elements matching a text query, in document order.
    async fn query_text(&self, query: &TextQuery) -> Result<Vec<Self::Handle>, ExtractError>;

    /// Visible clickable elements found by the in-page DOM scan.
    async fn scan_dom(&self, keyword: &str) -> Result<Vec<Self::Handle>, ExtractError>;

    /// Box and style of an element, or `None` if it is gone.
    async fn geometry(&self, handle: &Self::Handle)
        -> Result<Option<ElementGeometry>, ExtractError>;

    /// Scroll to the bottom of the page and back to the top.
    async fn scroll_cycle(&self) -> Result<(), ExtractError>;

    /// Native click on the element.
    async fn click(&self, handle: &Self::Handle) -> Result<(), ExtractError>;

    /// Synthetic `click` event dispatched from page script.
    async fn dispatch_click(&self, handle: &Self::Handle) -> Result<(), ExtractError>;
}

/// Which matcher produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Structural,
    Text,
    DomScan,
}

impl MatchStage {
    pub const ALL: [MatchStage; 3] = [Self::Structural, Self::Text, Self::DomScan];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Text => "text",
            Self::DomScan => "dom-scan",
        }
    }
}

impl std::fmt::Display for MatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trigger element and how it was found.
#[derive(Debug)]
pub struct Located<H> {
    pub handle: H,
    pub stage: MatchStage,
    /// Selector or query that matched.
    pub matched_by: String,
}

/// Locator settings.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Keyword identifying the trigger ("CSV").
    pub keyword: String,
    /// Full passes over the matcher chain before giving up.
    pub passes: u32,
    /// Pause between passes.
    pub pass_delay: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            keyword: "CSV".to_string(),
            passes: 3,
            pass_delay: Duration::from_secs(2),
        }
    }
}

/// Finds the download trigger on a rendered page.
#[derive(Debug, Clone, Default)]
pub struct ElementLocator {
    config: LocatorConfig,
}

impl ElementLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Run the matcher chain until something interactable turns up.
    pub async fn locate<S: TriggerSurface>(
        &self,
        surface: &S,
    ) -> Result<Located<S::Handle>, ExtractError> {
        let passes = self.config.passes.max(1);

        for pass in 1..=passes {
            if pass > 1 {
                info!("Retry {} looking for the {} trigger", pass - 1, self.config.keyword);
                if let Err(e) = surface.scroll_cycle().await {
                    debug!("Scroll failed: {}", e);
                }
                tokio::time::sleep(self.config.pass_delay).await;
            }

            for stage in MatchStage::ALL {
                if let Some(found) = self.try_stage(surface, stage).await {
                    info!(
                        "Found {} trigger via {} match: {}",
                        self.config.keyword, found.stage, found.matched_by
                    );
                    return Ok(found);
                }
            }
        }

        warn!(
            "No {} trigger found after {} passes",
            self.config.keyword, passes
        );
        Err(ExtractError::ElementNotFound {
            keyword: self.config.keyword.clone(),
            passes,
        })
    }

    /// Run a single matcher stage once.
    ///
    /// Query failures are treated as "no match" so one broken matcher never
    /// prevents the next from running.
    pub async fn try_stage<S: TriggerSurface>(
        &self,
        surface: &S,
        stage: MatchStage,
    ) -> Option<Located<S::Handle>> {
        let keyword = &self.config.keyword;

        match stage {
            MatchStage::Structural => {
                for selector in structural_selectors(keyword) {
                    let candidates = match surface.query_css(&selector).await {
                        Ok(c) => c,
                        Err(e) => {
                            debug!("Selector {} failed: {}", selector, e);
                            continue;
                        }
                    };
                    if let Some(handle) = first_interactable(surface, candidates).await {
                        return Some(Located {
                            handle,
                            stage,
                            matched_by: selector,
                        });
                    }
                }
                None
            }
            MatchStage::Text => {
                let query = TextQuery::new(keyword);
                let candidates = match surface.query_text(&query).await {
                    Ok(c) => c,
                    Err(e) => {
                        debug!("Text query failed: {}", e);
                        return None;
                    }
                };
                first_interactable(surface, candidates)
                    .await
                    .map(|handle| Located {
                        handle,
                        stage,
                        matched_by: format!("text contains {:?}", query.keyword()),
                    })
            }
            MatchStage::DomScan => {
                let candidates = match surface.scan_dom(keyword).await {
                    Ok(c) => c,
                    Err(e) => {
                        debug!("DOM scan failed: {}", e);
                        return None;
                    }
                };
                first_interactable(surface, candidates)
                    .await
                    .map(|handle| Located {
                        handle,
                        stage,
                        matched_by: format!("dom scan for {:?}", keyword.to_ascii_lowercase()),
                    })
            }
        }
    }
}

async fn first_interactable<S: TriggerSurface>(
    surface: &S,
    candidates: Vec<S::Handle>,
) -> Option<S::Handle> {
    for handle in candidates {
        match surface.geometry(&handle).await {
            Ok(Some(g)) if g.is_interactable() => return Some(handle),
            Ok(_) => {}
            Err(e) => debug!("Could not read element geometry: {}", e),
        }
    }
    None
}
