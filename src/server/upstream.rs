//! Notion search backends.

use crate::models::{
    normalize_block_id, Block, BlockRecord, RecordMap, SearchHighlight, SearchParams,
    SearchResult, SearchResults,
};
use crate::search::SearchError;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

pub const NOTION_VERSION: &str = "2022-06-28";
pub const INTEGRATION_PAGE_SIZE: u32 = 100;
pub const SESSION_RESULT_LIMIT: u32 = 20;

const DESCRIPTION_MAX_CHARS: usize = 100;
const NO_DESCRIPTION: &str = "No description available";
const UNTITLED: &str = "Untitled";

pub type UpstreamFuture = BoxFuture<'static, Result<SearchResults, SearchError>>;

pub trait SearchUpstream: Send + Sync {
    fn search(&self, params: SearchParams) -> UpstreamFuture;
}

async fn post_json(request: reqwest::RequestBuilder) -> Result<Value, SearchError> {
    let res = request
        .send()
        .await
        .map_err(|e| SearchError::Transport(e.to_string()))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| SearchError::Transport(e.to_string()))?;

    if !status.is_success() {
        warn!(status = status.as_u16(), "notion search rejected");
        return Err(SearchError::from_upstream(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| SearchError::Parse(e.to_string()))
}

/// Official API (`/v1/search`) with an integration token.
#[derive(Clone, Debug)]
pub struct IntegrationSearch {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl IntegrationSearch {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    fn request_body(params: &SearchParams) -> Value {
        let mut body = json!({
            "query": params.query,
            "page_size": INTEGRATION_PAGE_SIZE,
        });
        if params.ancestor_id.is_some() {
            body["filter"] = json!({ "value": "page", "property": "object" });
        }
        body
    }
}

impl SearchUpstream for IntegrationSearch {
    fn search(&self, params: SearchParams) -> UpstreamFuture {
        let request = self
            .client
            .post(format!("{}/v1/search", self.api_url))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&Self::request_body(&params));

        async move {
            let raw = post_json(request).await?;
            let results = normalize_integration_results(&raw);
            debug!(total = results.total, "integration search done");
            Ok(results)
        }
        .boxed()
    }
}

/// Private API (`/search`) authenticated with the `token_v2` cookie.
#[derive(Clone, Debug)]
pub struct SessionSearch {
    client: reqwest::Client,
    api_base_url: String,
    token: Option<String>,
}

impl SessionSearch {
    pub fn new(api_base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.into(),
            token,
        }
    }

    fn request_body(params: &SearchParams) -> Value {
        json!({
            "type": "BlocksInAncestor",
            "source": "quick_find_public",
            "ancestorId": params.ancestor_id.as_deref().map(normalize_block_id),
            "sort": { "field": "relevance" },
            "limit": SESSION_RESULT_LIMIT,
            "query": params.query,
            "filters": {
                "isDeletedOnly": false,
                "isNavigableOnly": false,
                "excludeTemplates": true,
                "requireEditPermissions": false,
                "includePublicPagesWithoutExplicitAccess": true,
                "ancestors": [],
                "createdBy": [],
                "editedBy": [],
                "lastEditedTime": {},
                "createdTime": {},
                "inTeams": []
            }
        })
    }
}

impl SearchUpstream for SessionSearch {
    fn search(&self, params: SearchParams) -> UpstreamFuture {
        let mut request = self
            .client
            .post(format!("{}/search", self.api_base_url))
            .json(&Self::request_body(&params));
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::COOKIE, format!("token_v2={token}"));
        }

        async move {
            let raw = post_json(request).await?;
            let mut results: SearchResults =
                serde_json::from_value(raw).map_err(|e| SearchError::Parse(e.to_string()))?;
            dedupe_results(&mut results);
            debug!(total = results.total, "session search done");
            Ok(results)
        }
        .boxed()
    }
}

/// Drop repeated ids (first one wins) and take them off `total`.
fn dedupe_results(results: &mut SearchResults) {
    let before = results.results.len();
    let mut seen = HashSet::new();
    results.results.retain(|r| seen.insert(r.id.clone()));
    let removed = before - results.results.len();
    results.total = results.total.saturating_sub(removed);
}

/// Plain text of a `title` or `rich_text` property value.
fn property_text(prop: &Value) -> Option<String> {
    let runs = prop
        .get("title")
        .and_then(Value::as_array)
        .filter(|r| !r.is_empty())
        .or_else(|| prop.get("rich_text").and_then(Value::as_array))?;

    let text: String = runs
        .iter()
        .filter_map(|r| r.get("plain_text").and_then(Value::as_str))
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn first_named<'a>(props: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| props.get(*n))
}

fn page_title(props: &Map<String, Value>) -> String {
    first_named(props, &["title", "Title", "Name", "name"])
        .and_then(property_text)
        // Every database page has exactly one property of type `title`.
        .or_else(|| {
            props
                .values()
                .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))
                .and_then(property_text)
        })
        .or_else(|| props.values().next().and_then(property_text))
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn page_description(props: &Map<String, Value>) -> Option<String> {
    let text = first_named(props, &["Description", "description", "Summary", "summary"])
        .and_then(property_text)?;

    if text.chars().count() > DESCRIPTION_MAX_CHARS {
        let cut: String = text.chars().take(DESCRIPTION_MAX_CHARS).collect();
        Some(format!("{cut}..."))
    } else {
        Some(text)
    }
}

fn page_block(id: &str, title: &str, item: &Value) -> Block {
    let parent = item.get("parent");
    let parent_id = ["database_id", "page_id"]
        .iter()
        .find_map(|k| parent.and_then(|p| p.get(*k)).and_then(Value::as_str))
        .unwrap_or_default();

    Block {
        id: id.to_string(),
        block_type: "page".to_string(),
        content: Some(vec![]),
        properties: Some(json!({ "title": [[title]] })),
        parent_id: Some(parent_id.to_string()),
        parent_table: Some("block".to_string()),
        ..Default::default()
    }
}

/// Map an official `/v1/search` response onto the shape the site renders.
pub fn normalize_integration_results(raw: &Value) -> SearchResults {
    let items = raw
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut record_map = RecordMap::default();
    let mut results = Vec::new();

    for item in items {
        if item.get("object").and_then(Value::as_str) != Some("page") {
            continue;
        }
        let Some(id) = item.get("id").and_then(Value::as_str) else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }

        let empty = Map::new();
        let props = item
            .get("properties")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let title = page_title(props);
        let description = page_description(props);

        record_map
            .block
            .insert(id.to_string(), BlockRecord::reader(page_block(id, &title, item)));
        results.push(SearchResult {
            id: id.to_string(),
            is_navigable: true,
            score: 1.0,
            highlight: SearchHighlight {
                text: title,
                path_text: description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            },
        });
    }

    SearchResults {
        total: results.len(),
        record_map,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(id: &str, props: Value) -> Value {
        json!({
            "object": "page",
            "id": id,
            "parent": { "database_id": "db-1" },
            "properties": props,
        })
    }

    fn title_prop(key: &str, text: &str) -> Value {
        let mut props = Map::new();
        props.insert(
            key.to_string(),
            json!({ "type": "title", "title": [{ "plain_text": text }] }),
        );
        Value::Object(props)
    }

    #[test]
    fn test_normalize_dedupes_and_skips_non_pages() {
        let raw = json!({
            "results": [
                page("a", title_prop("Name", "First")),
                { "object": "database", "id": "db-1" },
                page("a", title_prop("Name", "Duplicate")),
                page("b", title_prop("title", "Second")),
            ]
        });

        let out = normalize_integration_results(&raw);
        assert_eq!(out.total, 2);
        let titles: Vec<&str> = out.results.iter().map(|r| r.highlight.text.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert_eq!(out.record_map.block.len(), 2);

        let block = out.record_map.get_block("a").expect("block");
        assert_eq!(block.title(), "First");
        assert_eq!(block.parent_id.as_deref(), Some("db-1"));
        assert!(out.results.iter().all(|r| r.is_navigable && r.score == 1.0));
    }

    #[test]
    fn test_normalize_title_fallbacks() {
        let custom = json!({
            "Tags": { "type": "multi_select", "multi_select": [] },
            "Headline": { "type": "title", "title": [{ "plain_text": "Via type" }] },
        });
        let rich = json!({
            "name": { "rich_text": [{ "plain_text": "Rich " }, { "plain_text": "name" }] }
        });
        let raw = json!({
            "results": [page("a", custom), page("b", rich), page("c", json!({}))]
        });

        let out = normalize_integration_results(&raw);
        let titles: Vec<&str> = out.results.iter().map(|r| r.highlight.text.as_str()).collect();
        assert_eq!(titles, vec!["Via type", "Rich name", "Untitled"]);
    }

    #[test]
    fn test_normalize_first_property_in_document_order() {
        let raw: Value = serde_json::from_str(
            r#"{"results": [{
                "object": "page",
                "id": "a",
                "properties": {
                    "Zeta": { "type": "rich_text", "rich_text": [{ "plain_text": "From Zeta" }] },
                    "Alpha": { "type": "rich_text", "rich_text": [{ "plain_text": "From Alpha" }] }
                }
            }]}"#,
        )
        .expect("json");

        let out = normalize_integration_results(&raw);
        assert_eq!(out.results[0].highlight.text, "From Zeta");
    }

    #[test]
    fn test_normalize_description() {
        let long = "x".repeat(150);
        let mut props = title_prop("Name", "T");
        props["Summary"] = json!({ "rich_text": [{ "plain_text": long }] });
        let raw = json!({ "results": [page("a", props), page("b", title_prop("Name", "U"))] });

        let out = normalize_integration_results(&raw);
        assert_eq!(out.results[0].highlight.path_text, format!("{}...", "x".repeat(100)));
        assert_eq!(out.results[1].highlight.path_text, "No description available");
    }

    #[test]
    fn test_normalize_tolerates_garbage() {
        assert_eq!(normalize_integration_results(&json!({})).total, 0);
        assert_eq!(normalize_integration_results(&json!({"results": "nope"})).total, 0);
    }

    #[tokio::test]
    async fn test_integration_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .and(header("authorization", "Bearer secret_x"))
            .and(header("notion-version", NOTION_VERSION))
            .and(body_partial_json(json!({
                "query": "rust",
                "page_size": 100,
                "filter": { "value": "page", "property": "object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [page("a", title_prop("Name", "Hit"))]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let upstream = IntegrationSearch::new(server.uri(), "secret_x");
        let out = upstream
            .search(SearchParams {
                query: "rust".to_string(),
                ancestor_id: Some("root".to_string()),
            })
            .await
            .expect("search");
        assert_eq!(out.results[0].highlight.text, "Hit");
    }

    #[tokio::test]
    async fn test_integration_forbidden_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "nope"})))
            .mount(&server)
            .await;

        let upstream = IntegrationSearch::new(server.uri(), "bad");
        let err = upstream
            .search(SearchParams::default())
            .await
            .expect_err("should fail");
        assert_eq!(err, SearchError::Authentication);
    }

    #[tokio::test]
    async fn test_session_sends_cookie_and_passes_results_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("cookie", "token_v2=v2"))
            .and(body_partial_json(json!({
                "type": "BlocksInAncestor",
                "query": "notes",
                "ancestorId": "0123abcd-0123-abcd-0123-abcd0123abcd"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "recordMap": { "block": {} },
                "results": [{
                    "id": "p1",
                    "isNavigable": true,
                    "score": 12.5,
                    "highlight": { "text": "my <gzkNfoUU>notes</gzkNfoUU>", "pathText": "Blog" }
                }],
                "total": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let upstream = SessionSearch::new(server.uri(), Some("v2".to_string()));
        let out = upstream
            .search(SearchParams {
                query: "notes".to_string(),
                ancestor_id: Some("0123abcd0123abcd0123abcd0123abcd".to_string()),
            })
            .await
            .expect("search");
        assert_eq!(out.total, 1);
        assert_eq!(out.results[0].score, 12.5);
        assert_eq!(out.results[0].highlight.path_text, "Blog");
    }

    #[tokio::test]
    async fn test_session_drops_repeated_ids() {
        let hit = |score: f64, text: &str| {
            json!({
                "id": "p1",
                "isNavigable": true,
                "score": score,
                "highlight": { "text": text, "pathText": "" }
            })
        };
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "recordMap": { "block": {} },
                "results": [hit(3.0, "first"), hit(2.0, "again")],
                "total": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let upstream = SessionSearch::new(server.uri(), None);
        let out = upstream
            .search(SearchParams {
                query: "p".to_string(),
                ancestor_id: None,
            })
            .await
            .expect("search");

        let ids: Vec<&str> = out.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["p1"]);
        assert_eq!(out.results[0].highlight.text, "first");
        assert_eq!(out.total, 1);
    }

    #[tokio::test]
    async fn test_session_error_message_from_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid input."})),
            )
            .mount(&server)
            .await;

        let upstream = SessionSearch::new(server.uri(), None);
        let err = upstream
            .search(SearchParams::default())
            .await
            .expect_err("should fail");
        assert_eq!(err.to_string(), "Invalid input.");
        assert_eq!(err.status(), Some(400));
    }
}
