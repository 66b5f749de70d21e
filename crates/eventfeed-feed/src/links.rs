//! Navigation links.
//!
//! Links are derived from the base path and a page number alone; nothing is
//! stored. A link with an empty `href` means "no target in this direction"
//! and can never collide with a real page address, which is always absolute.

use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// Normalised feed base path, e.g. `/api/event-feed`.
///
/// Always starts with `/`, never ends with `/`, and names at least one
/// segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BasePath(String);

impl BasePath {
    /// Default mount point of the feed.
    pub const DEFAULT: &'static str = "/api/event-feed";

    /// Validates and normalises a configured base path.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidBasePath`] if the path is relative, is the
    /// root, or contains a query or fragment.
    pub fn new(path: &str) -> Result<Self, FeedError> {
        let trimmed = path.trim().trim_end_matches('/');
        if !trimmed.starts_with('/') || trimmed.contains(['?', '#']) || trimmed.contains("//") {
            return Err(FeedError::InvalidBasePath(path.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of page `page_number`.
    pub fn page(&self, page_number: u64) -> String {
        format!("{}/pages/{}", self.0, page_number)
    }

    /// The `/pages` collection address, which redirects to the head.
    pub fn pages(&self) -> String {
        format!("{}/pages", self.0)
    }
}

impl Default for BasePath {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl std::fmt::Display for BasePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single hypermedia link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    /// Set when `href` is a URI template.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub templated: bool,
}

impl Link {
    pub fn to(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: false,
        }
    }

    /// The "no target" sentinel.
    pub fn none() -> Self {
        Self::to(String::new())
    }

    pub fn template(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: true,
        }
    }

    pub fn is_none(&self) -> bool {
        self.href.is_empty()
    }
}

fn page_template(base: &BasePath) -> Link {
    Link::template(format!("{}/pages/{{pageNumber}}", base.as_str()))
}

/// Links embedded in the meta document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaLinks {
    #[serde(rename = "self")]
    pub self_: Link,
    pub meta: Link,
    pub head: Link,
    pub tail: Link,
    pub page: Link,
}

impl MetaLinks {
    pub fn build(base: &BasePath, total_pages: u64) -> Self {
        Self {
            self_: Link::to(base.as_str()),
            meta: Link::to(base.as_str()),
            head: Link::to(base.page(1)),
            tail: Link::to(base.page(total_pages)),
            page: page_template(base),
        }
    }
}

/// Links embedded in a page document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    pub meta: Link,
    pub head: Link,
    pub tail: Link,
    #[serde(rename = "self")]
    pub self_: Link,
    pub previous: Link,
    pub next: Link,
    pub page: Link,
}

impl PageLinks {
    /// Builds the link set for `page_number` of a feed with `total_pages`.
    ///
    /// `previous` is empty on the first page, `next` on the last.
    pub fn build(base: &BasePath, page_number: u64, total_pages: u64) -> Self {
        let previous = if page_number > 1 {
            Link::to(base.page(page_number - 1))
        } else {
            Link::none()
        };
        let next = if page_number < total_pages {
            Link::to(base.page(page_number + 1))
        } else {
            Link::none()
        };

        Self {
            meta: Link::to(base.as_str()),
            head: Link::to(base.page(1)),
            tail: Link::to(base.page(total_pages)),
            self_: Link::to(base.page(page_number)),
            previous,
            next,
            page: page_template(base),
        }
    }
}
