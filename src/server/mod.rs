//! `POST /api/search-notion`: proxies site search to Notion so tokens never
//! reach the browser.

pub mod config;
pub mod observability;
pub mod upstream;

use crate::models::SearchParams;
use crate::search::SearchError;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use config::{SearchStrategy, ServerArgs};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use upstream::{IntegrationSearch, SearchUpstream, SessionSearch};

pub const SEARCH_PATH: &str = "/api/search-notion";
pub const SEARCH_CACHE_CONTROL: &str =
    "public, s-maxage=60, max-age=60, stale-while-revalidate=60";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server stopped: {0}")]
    Serve(#[source] std::io::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::Search(SearchError::Authentication) => json!({ "error": self.to_string() }),
            other => json!({ "error": "Search failed", "details": other.to_string() }),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct SearchState {
    upstream: Arc<dyn SearchUpstream>,
}

impl SearchState {
    pub fn new(upstream: Arc<dyn SearchUpstream>) -> Self {
        Self { upstream }
    }

    pub fn from_strategy(strategy: SearchStrategy) -> Self {
        let upstream: Arc<dyn SearchUpstream> = match strategy {
            SearchStrategy::Integration { api_url, token } => {
                Arc::new(IntegrationSearch::new(api_url, token))
            }
            SearchStrategy::Session {
                api_base_url,
                token,
            } => Arc::new(SessionSearch::new(api_base_url, token)),
        };
        Self::new(upstream)
    }
}

pub fn search_router(state: SearchState) -> Router {
    Router::new()
        .route(SEARCH_PATH, post(search_notion))
        .method_not_allowed_fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "method not allowed" })),
    )
        .into_response()
}

async fn search_notion(
    State(state): State<SearchState>,
    Json(params): Json<SearchParams>,
) -> Result<Response, ServerError> {
    let results = state.upstream.search(params).await.map_err(|e| {
        error!(error = %e, "search failed");
        ServerError::from(e)
    })?;

    Ok((
        [(header::CACHE_CONTROL, SEARCH_CACHE_CONTROL)],
        Json(results),
    )
        .into_response())
}

/// Bind and serve until ctrl-c.
pub async fn serve(args: ServerArgs) -> Result<(), ServerError> {
    let strategy = args.strategy();
    match &strategy {
        SearchStrategy::Integration { api_url, .. } => {
            info!(api_url = %api_url, "using integration search");
        }
        SearchStrategy::Session {
            api_base_url,
            token,
        } => {
            info!(
                api_base_url = %api_base_url,
                authenticated = token.is_some(),
                "using session search"
            );
        }
    }

    let app = search_router(SearchState::from_strategy(strategy));
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: args.bind,
            source,
        })?;
    info!(addr = %args.bind, path = SEARCH_PATH, "search server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(ServerError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchResults;
    use crate::search::AUTH_FAILED_MESSAGE;
    use axum::body::Body;
    use axum::http::Request;
    use futures::future::{ready, FutureExt};
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use upstream::UpstreamFuture;

    struct FixedUpstream {
        calls: AtomicUsize,
        outcome: Result<SearchResults, SearchError>,
    }

    impl SearchUpstream for FixedUpstream {
        fn search(&self, _params: SearchParams) -> UpstreamFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ready(self.outcome.clone()).boxed()
        }
    }

    fn app(outcome: Result<SearchResults, SearchError>) -> (Router, Arc<FixedUpstream>) {
        let upstream = Arc::new(FixedUpstream {
            calls: AtomicUsize::new(0),
            outcome,
        });
        (search_router(SearchState::new(upstream.clone())), upstream)
    }

    fn post_search(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(SEARCH_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let (app, upstream) = app(Ok(SearchResults::default()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(SEARCH_PATH)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await, json!({ "error": "method not allowed" }));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_sets_cache_control() {
        let results = SearchResults {
            total: 0,
            ..Default::default()
        };
        let (app, upstream) = app(Ok(results));
        let response = app
            .oneshot(post_search(r#"{"query":"rust","ancestorId":"root"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
            Some(SEARCH_CACHE_CONTROL.as_bytes())
        );
        let body = json_body(response).await;
        assert_eq!(body["total"], 0);
        assert!(body["results"].is_array());
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_maps_to_500_with_message() {
        let (app, _) = app(Err(SearchError::from_upstream(403, "")));
        let response = app
            .oneshot(post_search(r#"{"query":"rust"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({ "error": AUTH_FAILED_MESSAGE }));
    }

    #[tokio::test]
    async fn test_other_failure_carries_details() {
        let (app, _) = app(Err(SearchError::from_upstream(
            502,
            r#"{"message":"upstream down"}"#,
        )));
        let response = app
            .oneshot(post_search(r#"{"query":"rust"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Search failed", "details": "upstream down" })
        );
    }

    #[tokio::test]
    async fn test_strategy_routes_to_integration_upstream() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let state = SearchState::from_strategy(SearchStrategy::Integration {
            api_url: server.uri(),
            token: "secret".to_string(),
        });
        let response = search_router(state)
            .oneshot(post_search(r#"{"query":"rust"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], AUTH_FAILED_MESSAGE);
    }
}
