//! The classification rule tables.
//!
//! Every pattern the engine matches on lives here as ordered tables
//! evaluated uniformly by the network and DOM classifiers, so tests
//! can enumerate the tables instead of re-deriving them from
//! scattered conditionals. The tables are immutable after first use;
//! each context gets them by value since contexts share no memory.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Where users are sent instead of a short-form surface.
pub const CANONICAL_HOME_URL: &str = "https://www.youtube.com/";

/// Hosts the engine is scoped to. Requests elsewhere are never classified.
pub const SCOPE_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

/// Path prefix denoting direct navigation into short-form content.
pub const SHORTS_PATH_PREFIX: &str = "/shorts/";

/// Upper bound on ancestor hops for the click guard. Bounded for
/// latency: the walk runs inside the capture-phase handler.
pub const MAX_CLICK_ANCESTOR_HOPS: usize = 10;

/// A single endpoint rule. Every URL rule maps to cancel.
pub struct UrlRule {
    pub label: &'static str,
    pub pattern: Regex,
}

/// Ordered endpoint patterns, matched against the lowercased URL.
/// First match wins; the order is fixed for determinism.
pub static URL_RULES: LazyLock<Vec<UrlRule>> = LazyLock::new(|| {
    [
        ("reel-watch-sequence", r"/youtubei/v1/reel/reel_watch_sequence"),
        ("reel-item-watch", r"/youtubei/v1/reel/reel_item_watch"),
        ("shorts-namespace", r"/youtubei/v1/shorts/"),
        ("browse-shorts", r"/youtubei/v1/browse.*shorts"),
        ("next-shorts", r"/youtubei/v1/next.*shorts"),
        ("reel-items-shorts", r"reelitems.*shorts"),
        ("reel-watch-field", r"reelwatchsequence"),
        ("get-reel-watch-sequence", r"/get_reel_watch_sequence"),
        ("get-shorts-sequence", r"/get_shorts_sequence"),
    ]
    .into_iter()
    .map(|(label, pattern)| UrlRule {
        label,
        pattern: Regex::new(pattern).expect("endpoint pattern compiles"),
    })
    .collect()
});

/// Substring rule applied to decoded request bodies. Catches
/// POST-style payloads that name the surface in the body instead of
/// the URL.
pub struct BodyRule {
    pub needle: &'static str,
    pub case_insensitive: bool,
}

impl BodyRule {
    pub fn matches(&self, body: &str) -> bool {
        if self.case_insensitive {
            body.to_ascii_lowercase()
                .contains(&self.needle.to_ascii_lowercase())
        } else {
            body.contains(self.needle)
        }
    }
}

pub const BODY_RULES: &[BodyRule] = &[
    BodyRule {
        needle: "shorts",
        case_insensitive: true,
    },
    // "reel" alone is too common in ordinary payloads; only the
    // upper-case enum constant is a safe marker.
    BodyRule {
        needle: "REEL",
        case_insensitive: false,
    },
    BodyRule {
        needle: "reelItems",
        case_insensitive: true,
    },
];

/// How a DOM rule identifies a short-form element.
pub enum DomPredicate {
    /// A chip/tab-style widget whose visible text names the surface.
    /// Ambiguous tag classes need the text check; tag alone would
    /// remove every chip on the page.
    ChipText {
        tags: &'static [&'static str],
        text: &'static str,
    },
    /// Attribute presence, optionally constrained to a tag and value.
    Attribute {
        tag: Option<&'static str>,
        name: &'static str,
        value: Option<&'static str>,
    },
    /// Tag identity alone.
    Tag(&'static str),
    /// Anchor whose destination enters the short-form path.
    AnchorHref,
}

pub struct DomRule {
    pub label: &'static str,
    pub predicate: DomPredicate,
}

/// Ordered DOM rules: chip/tab-textual first, then attribute-based,
/// then tag-based, then anchors. First hit wins.
pub const DOM_RULES: &[DomRule] = &[
    DomRule {
        label: "chip-shorts",
        predicate: DomPredicate::ChipText {
            tags: &[
                "yt-chip-cloud-chip-renderer",
                "tp-yt-paper-tab",
                "yt-tab-shape",
            ],
            text: "shorts",
        },
    },
    DomRule {
        label: "is-shorts-attr",
        predicate: DomPredicate::Attribute {
            tag: None,
            name: "is-shorts",
            value: None,
        },
    },
    DomRule {
        label: "guide-entry-shorts",
        predicate: DomPredicate::Attribute {
            tag: Some("ytd-guide-entry-renderer"),
            name: "guide-entry-style",
            value: Some("STYLE_SHORTS"),
        },
    },
    DomRule {
        label: "mini-guide-shorts",
        predicate: DomPredicate::Attribute {
            tag: Some("ytd-mini-guide-entry-renderer"),
            name: "aria-label",
            value: Some("Shorts"),
        },
    },
    DomRule {
        label: "reel-shelf",
        predicate: DomPredicate::Tag("ytd-reel-shelf-renderer"),
    },
    DomRule {
        label: "reel-video",
        predicate: DomPredicate::Tag("ytd-reel-video-renderer"),
    },
    DomRule {
        label: "shorts-anchor",
        predicate: DomPredicate::AnchorHref,
    },
];

fn host_in_scope(host: &str) -> bool {
    SCOPE_HOSTS.iter().any(|scope| {
        host == *scope
            || (host.len() > scope.len()
                && host.ends_with(scope)
                && host.as_bytes()[host.len() - scope.len() - 1] == b'.')
    })
}

/// True when the request falls inside the hook's registration scope.
pub fn in_scope(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str().map(host_in_scope).unwrap_or(false),
        Err(_) => false,
    }
}

/// True when `url` is a navigation into short-form content on a
/// platform host.
pub fn is_shorts_navigation(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            parsed.host_str().map(host_in_scope).unwrap_or(false)
                && parsed.path().starts_with(SHORTS_PATH_PREFIX)
        }
        Err(_) => false,
    }
}

/// True when an anchor destination points at short-form content.
/// Anchors carry relative hrefs, so this is a substring check rather
/// than a full URL parse.
pub fn href_is_shorts(href: &str) -> bool {
    href.contains(SHORTS_PATH_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_rules_are_ordered_and_compiled() {
        let labels: Vec<_> = URL_RULES.iter().map(|r| r.label).collect();
        assert_eq!(labels[0], "reel-watch-sequence");
        assert_eq!(labels.len(), 9);
    }

    #[test]
    fn scope_covers_platform_hosts_only() {
        assert!(in_scope("https://www.youtube.com/feed"));
        assert!(in_scope("https://m.youtube.com/"));
        assert!(in_scope("https://youtu.be/abc"));
        assert!(!in_scope("https://example.com/shorts/abc"));
        assert!(!in_scope("https://notyoutube.com/"));
        assert!(!in_scope("not a url"));
    }

    #[test]
    fn shorts_navigation_requires_host_and_path() {
        assert!(is_shorts_navigation("https://www.youtube.com/shorts/abc123"));
        assert!(is_shorts_navigation("https://youtu.be/shorts/xyz"));
        assert!(!is_shorts_navigation("https://www.youtube.com/watch?v=abc"));
        assert!(!is_shorts_navigation("https://example.com/shorts/abc"));
    }

    #[test]
    fn body_rules_respect_casing() {
        assert!(BODY_RULES[0].matches("browse SHORTS feed"));
        assert!(BODY_RULES[1].matches("playerType REEL"));
        assert!(!BODY_RULES[1].matches("reel"));
        assert!(BODY_RULES[2].matches("reelItems"));
        assert!(BODY_RULES[2].matches("REELITEMS"));
    }

    #[test]
    fn dom_rules_put_textual_checks_first() {
        assert!(matches!(
            DOM_RULES[0].predicate,
            DomPredicate::ChipText { .. }
        ));
        assert!(matches!(
            DOM_RULES.last().unwrap().predicate,
            DomPredicate::AnchorHref
        ));
    }
}
