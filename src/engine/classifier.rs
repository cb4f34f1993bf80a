//! Request classification: the shared hot path.
//!
//! Used verbatim by the network interceptor and the page-context API
//! decorators. Pure and synchronous; all side effects (counting,
//! canceling) belong to the caller.

use crate::engine::rules::{self, BODY_RULES, URL_RULES};
use crate::error::EngineError;

/// What a classification applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCategory {
    NetworkApi,
    DomElement,
    Click,
    SpaNavigation,
}

/// What the caller should do with the candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockAction {
    Allow,
    /// Cancel the request outright.
    Cancel,
    /// Send the user somewhere safe instead of canceling.
    Redirect(String),
    /// Resolve with a synthetic empty response (page-context patch).
    Substitute,
}

/// The result of classifying one candidate. Constructed fresh on
/// every call, folded into a counter increment, and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDecision {
    pub action: BlockAction,
    pub category: BlockCategory,
    /// Matched rule label, when the action is a block.
    pub rule: Option<&'static str>,
    /// What was classified, original case preserved for logging.
    pub target: String,
}

impl BlockDecision {
    pub fn allow(category: BlockCategory, target: &str) -> Self {
        Self {
            action: BlockAction::Allow,
            category,
            rule: None,
            target: target.to_string(),
        }
    }

    pub fn cancel(category: BlockCategory, rule: &'static str, target: &str) -> Self {
        Self {
            action: BlockAction::Cancel,
            category,
            rule: Some(rule),
            target: target.to_string(),
        }
    }

    pub fn is_block(&self) -> bool {
        self.action != BlockAction::Allow
    }

    pub fn rule_label(&self) -> &'static str {
        self.rule.unwrap_or("unmatched")
    }

    /// Downgrades a cancel into a substitution. The page patch cannot
    /// cancel a call the page already made; it resolves it with a
    /// synthetic empty response instead.
    pub fn into_substitute(mut self) -> Self {
        if self.is_block() {
            self.action = BlockAction::Substitute;
        }
        self
    }
}

/// Classifies one candidate request by URL and optional body.
///
/// The URL check happens first and short-circuits body inspection. An
/// empty or absent body is "no match"; an undecodable body is
/// swallowed as "no match", never surfaced to the caller.
pub fn classify_request(url: &str, body: Option<&[u8]>) -> BlockDecision {
    let lowered = url.to_lowercase();
    for rule in URL_RULES.iter() {
        if rule.pattern.is_match(&lowered) {
            return BlockDecision::cancel(BlockCategory::NetworkApi, rule.label, url);
        }
    }

    if let Some(rule) = body.and_then(match_body) {
        return BlockDecision::cancel(BlockCategory::NetworkApi, rule, url);
    }

    BlockDecision::allow(BlockCategory::NetworkApi, url)
}

/// Classifies a candidate click destination (an anchor href, possibly
/// relative).
pub fn classify_click(href: &str, home_url: &str) -> BlockDecision {
    if rules::href_is_shorts(href) {
        BlockDecision {
            action: BlockAction::Redirect(home_url.to_string()),
            category: BlockCategory::Click,
            rule: Some("shorts-anchor"),
            target: href.to_string(),
        }
    } else {
        BlockDecision::allow(BlockCategory::Click, href)
    }
}

/// Classifies a client-side route change. History-API navigation
/// bypasses the network hook entirely, so this runs in the page
/// context.
pub fn classify_spa_navigation(url: &str, home_url: &str) -> BlockDecision {
    if rules::is_shorts_navigation(url) {
        BlockDecision {
            action: BlockAction::Redirect(home_url.to_string()),
            category: BlockCategory::SpaNavigation,
            rule: Some("shorts-navigation"),
            target: url.to_string(),
        }
    } else {
        BlockDecision::allow(BlockCategory::SpaNavigation, url)
    }
}

fn match_body(bytes: &[u8]) -> Option<&'static str> {
    if bytes.is_empty() {
        return None;
    }
    let text = match decode_body(bytes) {
        Ok(text) => text,
        Err(_) => return None,
    };
    BODY_RULES
        .iter()
        .find(|rule| rule.matches(text))
        .map(|rule| rule.needle)
}

fn decode_body(bytes: &[u8]) -> Result<&str, EngineError> {
    Ok(std::str::from_utf8(bytes)?)
}
