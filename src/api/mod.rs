use crate::models::{PageProps, SearchParams, SearchResults};
use crate::search::{SearchError, SearchFuture, SearchTransport};
use crate::toc::DEFAULT_MIN_TOC_ITEMS;
use futures::future::FutureExt;
use leptos::logging::error;
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

pub const DEFAULT_SEARCH_API_URL: &str = "/api/search-notion";

/// Deploy-time settings injected by the host page as `window.ENV`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EnvConfig {
    pub search_api_url: String,
    pub search_enabled: bool,
    pub min_toc_items: usize,
    pub site_name: String,
    pub root_page_id: Option<String>,
    pub author: Option<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            search_api_url: DEFAULT_SEARCH_API_URL.to_string(),
            search_enabled: true,
            min_toc_items: DEFAULT_MIN_TOC_ITEMS,
            site_name: String::new(),
            root_page_id: None,
            author: None,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl EnvConfig {
    pub fn new() -> Self {
        let env = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object());

        match env {
            Some(env) => Self::from_lookup(|key| read_env_key(&env, key)),
            None => Self::default(),
        }
    }

    /// Both `SEARCH_API_URL` and `search_api_url` spellings are accepted;
    /// unparsable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .or_else(|| lookup(&key.to_ascii_lowercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Self {
            search_api_url: get("SEARCH_API_URL").unwrap_or(defaults.search_api_url),
            search_enabled: get("SEARCH_ENABLED")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.search_enabled),
            min_toc_items: get("MIN_TOC_ITEMS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_toc_items),
            site_name: get("SITE_NAME").unwrap_or(defaults.site_name),
            root_page_id: get("ROOT_PAGE_ID"),
            author: get("AUTHOR"),
        }
    }
}

fn read_env_key(env: &JsValue, key: &str) -> Option<String> {
    let v = js_sys::Reflect::get(env, &key.into()).ok()?;
    if let Some(s) = v.as_string() {
        return Some(s);
    }
    if let Some(b) = v.as_bool() {
        return Some(b.to_string());
    }
    v.as_f64().map(|n| n.to_string())
}

/// The page the host rendered into `window.__NOTION_PAGE__`.
pub(crate) fn load_page_props() -> Option<PageProps> {
    let raw = web_sys::window()?.get("__NOTION_PAGE__")?;
    if raw.is_undefined() || raw.is_null() {
        return None;
    }
    let json = js_sys::JSON::stringify(&raw).ok()?.as_string()?;
    match serde_json::from_str::<PageProps>(&json) {
        Ok(props) => Some(props),
        Err(e) => {
            error!("Invalid page props: {e}");
            None
        }
    }
}

/// reqwest needs an absolute URL, so relative endpoints are joined to the
/// page origin.
pub(crate) fn resolve_endpoint(origin: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if endpoint.starts_with('/') {
        format!("{origin}{endpoint}")
    } else {
        format!("{origin}/{endpoint}")
    }
}

/// POSTs search params as JSON to the proxy endpoint.
#[derive(Clone, Debug)]
pub(crate) struct HttpSearchTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSearchTransport {
    pub fn new(endpoint: String) -> Self {
        let origin = web_sys::window()
            .and_then(|w| w.location().origin().ok())
            .unwrap_or_default();

        Self {
            client: reqwest::Client::new(),
            endpoint: resolve_endpoint(&origin, &endpoint),
        }
    }

    async fn request(
        client: reqwest::Client,
        endpoint: String,
        params: SearchParams,
    ) -> Result<SearchResults, SearchError> {
        let res = client
            .post(&endpoint)
            .json(&params)
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<SearchResults>()
                .await
                .map_err(|e| SearchError::Parse(e.to_string()));
        }

        let body = res.text().await.unwrap_or_default();
        Err(SearchError::from_response(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            &body,
        ))
    }
}

impl SearchTransport for HttpSearchTransport {
    fn search(&self, params: SearchParams) -> SearchFuture {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        async move {
            let result = Self::request(client, endpoint, params).await;
            if let Err(e) = &result {
                error!("Search request failed: {e}");
            }
            result
        }
        .boxed_local()
    }
}
