//! Request classification.
//!
//! Maps a method and path onto a [`RequestKind`] without touching the store.
//! Only the out-of-range check needs the page count, so it is applied
//! separately by [`RequestKind::bounded`] once the count is known.

use crate::links::BasePath;

/// What a request asks of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Not a feed resource; hand it to the next handler.
    Unhandled,
    /// The feed description at the base path.
    Meta,
    /// The `/pages` collection, which redirects to page 1.
    PagesRedirect,
    /// A well-formed page request.
    Page(u64),
    /// A page token that is not a positive integer.
    MalformedPage(String),
    /// A page past the current tail.
    PageOutOfRange { page: u64, total_pages: u64 },
}

impl RequestKind {
    /// Turns `Page(n)` into `PageOutOfRange` when `n` exceeds `total_pages`.
    /// Every other kind is returned unchanged.
    pub fn bounded(self, total_pages: u64) -> Self {
        match self {
            RequestKind::Page(page) if page > total_pages => {
                RequestKind::PageOutOfRange { page, total_pages }
            }
            other => other,
        }
    }

    /// Whether this request needs a store read to answer.
    pub fn needs_store(&self) -> bool {
        matches!(self, RequestKind::Meta | RequestKind::Page(_))
    }
}

/// Classifies a request.
///
/// Precedence: paths outside `base` and non-GET methods pass through; the
/// base itself is the meta document; `pages` redirects; `pages/{token}` is a
/// page or a malformed token. Anything else under the base passes through.
/// One trailing slash is ignored.
pub fn classify(method: &str, path: &str, base: &BasePath) -> RequestKind {
    let Some(rest) = path.strip_prefix(base.as_str()) else {
        return RequestKind::Unhandled;
    };
    // Segment-aware: `/api/event-feedX` is not under `/api/event-feed`.
    if !(rest.is_empty() || rest.starts_with('/')) {
        return RequestKind::Unhandled;
    }
    if !method.eq_ignore_ascii_case("GET") {
        return RequestKind::Unhandled;
    }

    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() {
        return RequestKind::Meta;
    }

    match rest.strip_prefix("/pages") {
        Some("") => RequestKind::PagesRedirect,
        Some(tail) => match tail.strip_prefix('/') {
            Some(token) if !token.contains('/') => parse_page_token(token),
            _ => RequestKind::Unhandled,
        },
        None => RequestKind::Unhandled,
    }
}

fn parse_page_token(token: &str) -> RequestKind {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return RequestKind::MalformedPage(token.to_string());
    }
    match token.parse::<u64>() {
        Ok(0) => RequestKind::MalformedPage(token.to_string()),
        Ok(page) => RequestKind::Page(page),
        // All digits but wider than u64: certainly past the tail.
        Err(_) => RequestKind::Page(u64::MAX),
    }
}
