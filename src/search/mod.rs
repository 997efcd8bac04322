//! Full-text search over the workspace, shared by the browser client and the
//! proxy endpoint.

pub mod cache;

use crate::models::{SearchParams, SearchResults};
use crate::util::now_ms;
use cache::DedupCache;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const AUTH_FAILED_MESSAGE: &str =
    "Authentication failed. Please check your NOTION_TOKEN_V2 or NOTION_API_KEY environment variable.";

/// Identical queries issued within this window share one request.
pub const SEARCH_DEDUPE_WINDOW_MS: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("{}", AUTH_FAILED_MESSAGE)]
    Authentication,
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Value>,
    },
    #[error("network error: {0}")]
    Transport(String),
    #[error("invalid search response: {0}")]
    Parse(String),
}

/// `details`, then `error`, then `message`, whichever is a non-empty string.
pub fn extract_error_message(body: &Value) -> Option<String> {
    ["details", "error", "message"]
        .iter()
        .filter_map(|k| body.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

impl SearchError {
    /// Failed response from Notion itself.
    pub fn from_upstream(status: u16, body_text: &str) -> Self {
        if status == 401 || status == 403 {
            return Self::Authentication;
        }

        let body = serde_json::from_str::<Value>(body_text).ok();
        let message = body
            .as_ref()
            .and_then(extract_error_message)
            .or_else(|| {
                let t = body_text.trim();
                (!t.is_empty()).then(|| t.to_string())
            })
            .unwrap_or_else(|| format!("upstream returned status {status}"));

        Self::Http {
            status,
            message,
            body,
        }
    }

    /// Failed response from our own endpoint, as seen by the browser.
    pub fn from_response(status: u16, status_text: &str, body_text: &str) -> Self {
        let body = serde_json::from_str::<Value>(body_text).ok();
        let message = body
            .as_ref()
            .and_then(extract_error_message)
            .unwrap_or_else(|| {
                if status_text.is_empty() {
                    format!("Search failed with status {status}")
                } else {
                    status_text.to_string()
                }
            });

        Self::Http {
            status,
            message,
            body,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type SearchFuture = LocalBoxFuture<'static, Result<SearchResults, SearchError>>;

/// Something that can run a search request.
pub trait SearchTransport {
    fn search(&self, params: SearchParams) -> SearchFuture;
}

pub struct SearchClient {
    transport: Rc<dyn SearchTransport>,
    cache: DedupCache<SearchResults, SearchError>,
    clock: Box<dyn Fn() -> i64>,
}

impl SearchClient {
    pub fn new(transport: impl SearchTransport + 'static) -> Self {
        Self {
            transport: Rc::new(transport),
            cache: DedupCache::new(SEARCH_DEDUPE_WINDOW_MS),
            clock: Box::new(now_ms),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> i64 + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Keyed on the query text alone: the ancestor is fixed per site.
    pub fn search(&self, params: SearchParams) -> SearchFuture {
        let key = params.query.clone();
        let transport = Rc::clone(&self.transport);
        self.cache
            .get_or_insert_with(&key, (self.clock)(), move || transport.search(params))
    }
}

thread_local! {
    static CLIENT: OnceCell<Rc<SearchClient>> = const { OnceCell::new() };
}

fn search_client() -> Rc<SearchClient> {
    CLIENT.with(|cell| {
        cell.get_or_init(|| {
            let config = crate::api::EnvConfig::new();
            Rc::new(SearchClient::new(crate::api::HttpSearchTransport::new(
                config.search_api_url,
            )))
        })
        .clone()
    })
}

/// Page-wide entry point used by the search overlay.
pub(crate) fn search_notion(params: SearchParams) -> SearchFuture {
    search_client().search(params)
}

/// Hands out request numbers so only the newest response is applied.
#[derive(Debug, Default)]
pub struct LatestRequest {
    current: AtomicU64,
}

impl LatestRequest {
    pub fn begin(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.current.load(Ordering::SeqCst) == id
    }

    /// Make every outstanding request stale.
    pub fn cancel(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

/// Notion marks matches with `<gzkNfoUU>` tags; the overlay shows plain text.
pub fn strip_highlight_tags(text: &str) -> String {
    text.replace("<gzkNfoUU>", "").replace("</gzkNfoUU>", "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchResult;
    use futures::executor::block_on;
    use futures::future::{join, ready, FutureExt};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Replays queued outcomes and counts calls.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        calls: Rc<Cell<u32>>,
        outcomes: Rc<RefCell<VecDeque<Result<SearchResults, SearchError>>>>,
    }

    impl ScriptedTransport {
        fn push(&self, outcome: Result<SearchResults, SearchError>) {
            self.outcomes.borrow_mut().push_back(outcome);
        }
    }

    impl SearchTransport for ScriptedTransport {
        fn search(&self, params: SearchParams) -> SearchFuture {
            self.calls.set(self.calls.get() + 1);
            let outcome = self
                .outcomes
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(results_for(&params.query)));
            ready(outcome).boxed_local()
        }
    }

    fn results_for(query: &str) -> SearchResults {
        SearchResults {
            results: vec![SearchResult {
                id: format!("{query}-1"),
                is_navigable: true,
                score: 1.0,
                ..Default::default()
            }],
            total: 1,
            ..Default::default()
        }
    }

    fn params(query: &str) -> SearchParams {
        SearchParams {
            query: query.to_string(),
            ancestor_id: None,
        }
    }

    fn client_at(transport: &ScriptedTransport, now: &Rc<Cell<i64>>) -> SearchClient {
        let now = Rc::clone(now);
        SearchClient::new(transport.clone()).with_clock(move || now.get())
    }

    #[test]
    fn test_concurrent_identical_queries_share_one_request() {
        let transport = ScriptedTransport::default();
        let now = Rc::new(Cell::new(1_000));
        let client = client_at(&transport, &now);

        let (a, b) = block_on(join(
            client.search(params("rust")),
            client.search(params("rust")),
        ));
        assert_eq!(transport.calls.get(), 1);
        assert_eq!(a, b);
        assert_eq!(a.map(|r| r.total), Ok(1));
    }

    #[test]
    fn test_repeat_inside_window_is_served_from_cache() {
        let transport = ScriptedTransport::default();
        let now = Rc::new(Cell::new(0));
        let client = client_at(&transport, &now);

        let _ = block_on(client.search(params("rust")));
        now.set(SEARCH_DEDUPE_WINDOW_MS - 1);
        let _ = block_on(client.search(params("rust")));
        assert_eq!(transport.calls.get(), 1);

        now.set(SEARCH_DEDUPE_WINDOW_MS);
        let _ = block_on(client.search(params("rust")));
        assert_eq!(transport.calls.get(), 2);
    }

    #[test]
    fn test_different_queries_do_not_share() {
        let transport = ScriptedTransport::default();
        let now = Rc::new(Cell::new(0));
        let client = client_at(&transport, &now);

        let a = block_on(client.search(params("a"))).expect("a");
        let b = block_on(client.search(params("b"))).expect("b");
        assert_eq!(transport.calls.get(), 2);
        assert_eq!(a.results[0].id, "a-1");
        assert_eq!(b.results[0].id, "b-1");
    }

    #[test]
    fn test_ancestor_is_not_part_of_the_key() {
        let transport = ScriptedTransport::default();
        let now = Rc::new(Cell::new(0));
        let client = client_at(&transport, &now);

        let _ = block_on(client.search(params("a")));
        let scoped = SearchParams {
            query: "a".to_string(),
            ancestor_id: Some("root".to_string()),
        };
        let _ = block_on(client.search(scoped));
        assert_eq!(transport.calls.get(), 1);
    }

    #[test]
    fn test_failure_is_retried_on_next_call() {
        let transport = ScriptedTransport::default();
        transport.push(Err(SearchError::Transport("offline".to_string())));
        let now = Rc::new(Cell::new(0));
        let client = client_at(&transport, &now);

        let first = block_on(client.search(params("rust")));
        assert_eq!(first, Err(SearchError::Transport("offline".to_string())));

        now.set(10);
        let second = block_on(client.search(params("rust")));
        assert!(second.is_ok());
        assert_eq!(transport.calls.get(), 2);
    }

    #[test]
    fn test_upstream_auth_statuses() {
        assert_eq!(SearchError::from_upstream(401, ""), SearchError::Authentication);
        assert_eq!(SearchError::from_upstream(403, "{}"), SearchError::Authentication);
        assert_eq!(SearchError::Authentication.to_string(), AUTH_FAILED_MESSAGE);
    }

    #[test]
    fn test_upstream_message_extraction() {
        let body = r#"{"message":"bad query","code":"validation_error"}"#;
        let err = SearchError::from_upstream(400, body);
        assert_eq!(err.to_string(), "bad query");
        assert_eq!(err.status(), Some(400));

        let err = SearchError::from_upstream(502, "Bad Gateway");
        assert_eq!(err.to_string(), "Bad Gateway");

        let err = SearchError::from_upstream(500, "");
        assert_eq!(err.to_string(), "upstream returned status 500");
    }

    #[test]
    fn test_response_message_prefers_details() {
        let body = json!({"error": "Search failed", "details": "rate limited"}).to_string();
        let err = SearchError::from_response(500, "Internal Server Error", &body);
        assert_eq!(err.to_string(), "rate limited");
        match err {
            SearchError::Http { body: Some(b), .. } => assert_eq!(b["error"], "Search failed"),
            other => panic!("unexpected {other:?}"),
        }

        let body = json!({"error": "method not allowed"}).to_string();
        assert_eq!(
            SearchError::from_response(405, "Method Not Allowed", &body).to_string(),
            "method not allowed"
        );

        assert_eq!(
            SearchError::from_response(504, "Gateway Timeout", "<html>").to_string(),
            "Gateway Timeout"
        );
    }

    #[test]
    fn test_only_latest_request_is_current() {
        let latest = LatestRequest::default();
        let first = latest.begin();
        let second = latest.begin();
        assert!(!latest.is_current(first));
        assert!(latest.is_current(second));

        latest.cancel();
        assert!(!latest.is_current(second));
    }

    #[test]
    fn test_strip_highlight_tags() {
        assert_eq!(
            strip_highlight_tags("my <gzkNfoUU>notes</gzkNfoUU> page"),
            "my notes page"
        );
    }
}
