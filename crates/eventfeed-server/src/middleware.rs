//! Feed request handling.
//!
//! Requests the dispatcher does not claim are passed to the next service
//! untouched. Claimed requests that need the store are answered on the
//! blocking pool.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use eventfeed_feed::{CacheSettings, FeedResponse, ProblemDocument, RequestKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::AppState;

/// Media type of meta and page documents.
pub const HAL_JSON: &str = "application/hal+json";
/// Media type of problem documents.
pub const PROBLEM_JSON: &str = "application/problem+json";

/// Serves the feed resources under the configured base path.
pub async fn feed_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let kind = state
        .dispatcher
        .classify(req.method().as_str(), req.uri().path());
    if kind == RequestKind::Unhandled {
        return next.run(req).await;
    }

    let instance = req.uri().path().to_string();
    let result = if kind.needs_store() {
        let dispatcher = Arc::clone(&state.dispatcher);
        let task_instance = instance.clone();
        match tokio::task::spawn_blocking(move || dispatcher.respond(&kind, &task_instance)).await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, path = %instance, "feed read task panicked or was cancelled");
                return problem_response(&ProblemDocument::store_unavailable(&instance));
            }
        }
    } else {
        state.dispatcher.respond(&kind, &instance)
    };

    match result {
        Ok(Some(response)) => feed_response(response, &state.max_age),
        Ok(None) => next.run(req).await,
        Err(e) => {
            tracing::error!(error = %e, path = %instance, "feed read failed");
            problem_response(&ProblemDocument::store_unavailable(&instance))
        }
    }
}

fn max_age(ttl: Duration) -> String {
    format!("public, max-age={}", ttl.as_secs())
}

fn feed_response(response: FeedResponse, ttl: &CacheSettings) -> Response {
    match response {
        FeedResponse::Meta(meta) => {
            json_response(StatusCode::OK, HAL_JSON, max_age(ttl.incomplete_page_ttl), &meta)
        }
        FeedResponse::Page(page) => {
            let lifetime = if page.is_complete {
                ttl.complete_page_ttl
            } else {
                ttl.incomplete_page_ttl
            };
            json_response(StatusCode::OK, HAL_JSON, max_age(lifetime), &page)
        }
        FeedResponse::Redirect { location } => (
            [(header::CACHE_CONTROL, max_age(ttl.complete_page_ttl))],
            Redirect::temporary(&location),
        )
            .into_response(),
        FeedResponse::Problem(problem) => problem_response(&problem),
    }
}

fn problem_response(problem: &ProblemDocument) -> Response {
    let status =
        StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, PROBLEM_JSON, "no-store".to_string(), problem)
}

fn json_response<T: Serialize>(
    status: StatusCode,
    content_type: &'static str,
    cache_control: String,
    body: &T,
) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            status,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CACHE_CONTROL, cache_control),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize feed document");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_age_is_whole_seconds() {
        assert_eq!(max_age(Duration::from_secs(300)), "public, max-age=300");
        assert_eq!(max_age(Duration::from_millis(1_500)), "public, max-age=1");
    }

    #[test]
    fn problems_are_never_cached() {
        let response = problem_response(&ProblemDocument::store_unavailable("/x"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::CONTENT_TYPE], PROBLEM_JSON);
    }
}
