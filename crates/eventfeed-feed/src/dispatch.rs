//! Response documents and the request dispatcher.
//!
//! [`Dispatcher::respond`] turns a classified request into a
//! [`FeedResponse`]. It is synchronous and may block on the reader, so async
//! callers run it on a blocking thread. Mapping a response onto HTTP headers
//! is left to the server.

use eventfeed_types::FeedEvent;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::links::{BasePath, Link, MetaLinks, PageLinks};
use crate::paging::{is_complete, total_pages, PageSize};
use crate::reader::FeedReader;
use crate::route::{classify, RequestKind};

/// Problem type for a page token that is not a positive integer.
pub const PROBLEM_MALFORMED_PAGE: &str = "urn:eventfeed:problem:malformed-page-number";
/// Problem type for a page past the current tail.
pub const PROBLEM_PAGE_NOT_FOUND: &str = "urn:eventfeed:problem:page-not-found";
/// Problem type for a failed store read.
pub const PROBLEM_STORE_UNAVAILABLE: &str = "urn:eventfeed:problem:store-unavailable";

/// The feed description served at the base path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDocument {
    pub event_count: u64,
    pub events_per_page: u64,
    pub page_count: u64,
    #[serde(rename = "_links")]
    pub links: MetaLinks,
}

/// One page of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDocument {
    pub page_number: u64,
    pub events: Vec<FeedEvent>,
    #[serde(rename = "_links")]
    pub links: PageLinks,
    pub is_complete: bool,
}

/// Recovery links attached to a problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemLinks {
    pub meta: Link,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail: Option<Link>,
}

/// A problem details body (`application/problem+json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<ProblemLinks>,
}

impl ProblemDocument {
    pub fn malformed_page(base: &BasePath, token: &str, instance: &str) -> Self {
        Self {
            kind: PROBLEM_MALFORMED_PAGE.to_string(),
            title: "Malformed page number".to_string(),
            status: 400,
            detail: format!("page number must be a positive integer, got {token:?}"),
            instance: instance.to_string(),
            links: Some(ProblemLinks {
                meta: Link::to(base.as_str()),
                head: None,
                tail: None,
            }),
        }
    }

    pub fn page_not_found(base: &BasePath, page: u64, total_pages: u64, instance: &str) -> Self {
        Self {
            kind: PROBLEM_PAGE_NOT_FOUND.to_string(),
            title: "Page not found".to_string(),
            status: 404,
            detail: format!("page {page} does not exist; the feed has {total_pages} page(s)"),
            instance: instance.to_string(),
            links: Some(ProblemLinks {
                meta: Link::to(base.as_str()),
                head: Some(Link::to(base.page(1))),
                tail: Some(Link::to(base.page(total_pages))),
            }),
        }
    }

    /// The body for a failed store read. The underlying error is not exposed.
    pub fn store_unavailable(instance: &str) -> Self {
        Self {
            kind: PROBLEM_STORE_UNAVAILABLE.to_string(),
            title: "Event store unavailable".to_string(),
            status: 500,
            detail: "the event store could not be read".to_string(),
            instance: instance.to_string(),
            links: None,
        }
    }
}

/// A feed response, before it is mapped onto a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedResponse {
    Meta(MetaDocument),
    Page(PageDocument),
    Redirect { location: String },
    Problem(ProblemDocument),
}

impl FeedResponse {
    pub fn status(&self) -> u16 {
        match self {
            FeedResponse::Meta(_) | FeedResponse::Page(_) => 200,
            FeedResponse::Redirect { .. } => 307,
            FeedResponse::Problem(problem) => problem.status,
        }
    }
}

/// Answers feed requests from a [`FeedReader`].
pub struct Dispatcher<R> {
    base: BasePath,
    reader: R,
}

impl<R: FeedReader> Dispatcher<R> {
    pub fn new(base: BasePath, reader: R) -> Self {
        Self { base, reader }
    }

    pub fn base(&self) -> &BasePath {
        &self.base
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn classify(&self, method: &str, path: &str) -> RequestKind {
        classify(method, path, &self.base)
    }

    /// Builds the response for `kind`.
    ///
    /// Returns `Ok(None)` for [`RequestKind::Unhandled`]. `instance` is the
    /// request path, echoed in problem bodies.
    ///
    /// # Errors
    ///
    /// Propagates the reader's [`FeedError`]; nothing is served in its place.
    pub fn respond(
        &self,
        kind: &RequestKind,
        instance: &str,
    ) -> Result<Option<FeedResponse>, FeedError> {
        let response = match kind {
            RequestKind::Unhandled => return Ok(None),
            RequestKind::PagesRedirect => FeedResponse::Redirect {
                location: self.base.page(1),
            },
            RequestKind::MalformedPage(token) => FeedResponse::Problem(
                ProblemDocument::malformed_page(&self.base, token, instance),
            ),
            RequestKind::PageOutOfRange { page, total_pages } => FeedResponse::Problem(
                ProblemDocument::page_not_found(&self.base, *page, *total_pages, instance),
            ),
            RequestKind::Meta => FeedResponse::Meta(self.meta()?),
            RequestKind::Page(page) => self.page(*page, instance)?,
        };
        Ok(Some(response))
    }

    fn meta(&self) -> Result<MetaDocument, FeedError> {
        let numbers = self.reader.event_numbers()?;
        let page_size = PageSize::new(numbers.events_per_page)?;
        let page_count = total_pages(numbers.event_count, page_size);
        Ok(MetaDocument {
            event_count: numbers.event_count,
            events_per_page: numbers.events_per_page,
            page_count,
            links: MetaLinks::build(&self.base, page_count),
        })
    }

    fn page(&self, page_number: u64, instance: &str) -> Result<FeedResponse, FeedError> {
        let numbers = self.reader.event_numbers()?;
        let page_size = PageSize::new(numbers.events_per_page)?;
        let page_count = total_pages(numbers.event_count, page_size);

        if let RequestKind::PageOutOfRange { page, total_pages } =
            RequestKind::Page(page_number).bounded(page_count)
        {
            return Ok(FeedResponse::Problem(ProblemDocument::page_not_found(
                &self.base,
                page,
                total_pages,
                instance,
            )));
        }

        let events = self.reader.read_page(page_number)?;
        let complete = is_complete(events.len(), page_size);
        Ok(FeedResponse::Page(PageDocument {
            page_number,
            links: PageLinks::build(&self.base, page_number, page_count),
            events,
            is_complete: complete,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryFeedReader;

    fn dispatcher(count: u64) -> Dispatcher<InMemoryFeedReader> {
        Dispatcher::new(
            BasePath::default(),
            InMemoryFeedReader::with_generated(PageSize::new(10).unwrap(), count),
        )
    }

    fn get(d: &Dispatcher<InMemoryFeedReader>, path: &str) -> FeedResponse {
        let kind = d.classify("GET", path);
        d.respond(&kind, path).unwrap().expect("feed path should be handled")
    }

    #[test]
    fn empty_feed_meta() {
        let d = dispatcher(0);
        let FeedResponse::Meta(meta) = get(&d, "/api/event-feed") else {
            panic!("expected meta document");
        };
        assert_eq!(meta.event_count, 0);
        assert_eq!(meta.events_per_page, 10);
        assert_eq!(meta.page_count, 1);
        assert_eq!(meta.links.head.href, "/api/event-feed/pages/1");
        assert_eq!(meta.links.tail.href, "/api/event-feed/pages/1");
    }

    #[test]
    fn empty_feed_has_an_empty_incomplete_first_page() {
        let d = dispatcher(0);
        let FeedResponse::Page(page) = get(&d, "/api/event-feed/pages/1") else {
            panic!("expected page document");
        };
        assert!(page.events.is_empty());
        assert!(!page.is_complete);
        assert!(page.links.next.is_none());
    }

    #[test]
    fn partial_first_page() {
        let d = dispatcher(5);
        let FeedResponse::Page(page) = get(&d, "/api/event-feed/pages/1") else {
            panic!("expected page document");
        };
        assert_eq!(page.page_number, 1);
        assert_eq!(page.events.len(), 5);
        assert!(!page.is_complete);
        assert!(page.links.previous.is_none());
        assert!(page.links.next.is_none());
    }

    #[test]
    fn full_last_page() {
        let d = dispatcher(20);
        let FeedResponse::Page(page) = get(&d, "/api/event-feed/pages/2") else {
            panic!("expected page document");
        };
        let seqs: Vec<u64> = page.events.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, (11..=20).collect::<Vec<_>>());
        assert!(page.is_complete);
        assert_eq!(page.links.previous.href, "/api/event-feed/pages/1");
        assert_eq!(page.links.tail.href, "/api/event-feed/pages/2");
        assert!(page.links.next.is_none());
    }

    #[test]
    fn page_past_the_tail_is_not_found_with_recovery_links() {
        let d = dispatcher(20);
        let response = get(&d, "/api/event-feed/pages/3");
        assert_eq!(response.status(), 404);
        let FeedResponse::Problem(problem) = response else {
            panic!("expected problem");
        };
        assert_eq!(problem.kind, PROBLEM_PAGE_NOT_FOUND);
        assert_eq!(problem.instance, "/api/event-feed/pages/3");
        let links = problem.links.expect("recovery links");
        assert_eq!(links.meta.href, "/api/event-feed");
        assert_eq!(links.head.unwrap().href, "/api/event-feed/pages/1");
        assert_eq!(links.tail.unwrap().href, "/api/event-feed/pages/2");
        assert_eq!(d.reader().page_reads(), 0, "out-of-range pages are not read");
    }

    #[test]
    fn malformed_token_is_a_bad_request_without_store_access() {
        let d = dispatcher(20);
        let response = get(&d, "/api/event-feed/pages/abc");
        assert_eq!(response.status(), 400);
        let FeedResponse::Problem(problem) = response else {
            panic!("expected problem");
        };
        assert_eq!(problem.kind, PROBLEM_MALFORMED_PAGE);
        assert_eq!(problem.links.unwrap().meta.href, "/api/event-feed");
        assert_eq!(d.reader().count_reads(), 0);
    }

    #[test]
    fn pages_collection_redirects_to_the_head() {
        let d = dispatcher(20);
        let response = get(&d, "/api/event-feed/pages");
        assert_eq!(response.status(), 307);
        assert_eq!(
            response,
            FeedResponse::Redirect {
                location: "/api/event-feed/pages/1".to_string()
            }
        );
    }

    #[test]
    fn unhandled_requests_produce_no_response() {
        let d = dispatcher(1);
        let kind = d.classify("GET", "/somewhere/else");
        assert_eq!(d.respond(&kind, "/somewhere/else").unwrap(), None);
    }

    #[test]
    fn store_failure_propagates() {
        let d = dispatcher(5);
        d.reader().set_unavailable(true);
        let kind = d.classify("GET", "/api/event-feed/pages/1");
        assert!(matches!(
            d.respond(&kind, "/api/event-feed/pages/1"),
            Err(FeedError::Unavailable(_))
        ));
    }

    #[test]
    fn full_single_page_is_complete_and_the_tail() {
        let d = dispatcher(10);
        let FeedResponse::Page(page) = get(&d, "/api/event-feed/pages/1") else {
            panic!("expected page document");
        };
        assert!(page.is_complete);
        assert!(page.links.next.is_none());
        assert_eq!(page.links.tail.href, "/api/event-feed/pages/1");
    }

    #[test]
    fn pages_reconstruct_the_whole_log() {
        let d = dispatcher(37);
        let mut seqs = Vec::new();
        for n in 1..=4 {
            let FeedResponse::Page(page) = get(&d, &format!("/api/event-feed/pages/{n}")) else {
                panic!("expected page {n}");
            };
            assert_eq!(page.is_complete, n < 4, "page {n}");
            seqs.extend(page.events.iter().map(|e| e.sequence_number));
        }
        assert_eq!(seqs, (1..=37).collect::<Vec<_>>());
    }

    #[test]
    fn documents_serialize_with_hal_field_names() {
        let d = dispatcher(3);
        let FeedResponse::Page(page) = get(&d, "/api/event-feed/pages/1") else {
            panic!("expected page document");
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pageNumber"], 1);
        assert_eq!(json["isComplete"], false);
        assert_eq!(json["_links"]["self"]["href"], "/api/event-feed/pages/1");
        assert_eq!(json["_links"]["page"]["templated"], true);
        assert_eq!(json["events"][0]["sequenceNumber"], 1);

        let problem = serde_json::to_value(ProblemDocument::store_unavailable("/x")).unwrap();
        assert_eq!(problem["type"], PROBLEM_STORE_UNAVAILABLE);
        assert!(problem.get("_links").is_none());
    }
}
