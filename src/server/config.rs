use clap::Parser;
use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_API_BASE_URL: &str = "https://www.notion.so/api/v3";
pub const DEFAULT_OFFICIAL_API_URL: &str = "https://api.notion.com";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// JSON lines, for log shippers.
    Json,
    /// Human-readable, for local runs.
    #[default]
    Pretty,
}

/// Notion search proxy.
#[derive(Debug, Clone, Parser)]
#[command(name = "search-server", version, about, long_about = None)]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(long, env = "SEARCH_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Integration token for the official API.
    #[arg(long, env = "NOTION_API_KEY", hide_env_values = true)]
    pub notion_api_key: Option<String>,

    /// Session token used when `NOTION_TOKEN_V2` is not set.
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: Option<String>,

    /// `token_v2` cookie value for the private API.
    #[arg(long, env = "NOTION_TOKEN_V2", hide_env_values = true)]
    pub notion_token_v2: Option<String>,

    /// Private API base, e.g. `https://<workspace>.notion.site/api/v3`.
    #[arg(long, env = "NOTION_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    #[arg(long, env = "NOTION_OFFICIAL_API_URL", default_value = DEFAULT_OFFICIAL_API_URL)]
    pub official_api_url: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Which Notion API answers searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStrategy {
    Integration {
        api_url: String,
        token: String,
    },
    Session {
        api_base_url: String,
        token: Option<String>,
    },
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ServerArgs {
    /// The official API is used only when an integration key is configured
    /// and no session cookie is.
    #[must_use]
    pub fn strategy(&self) -> SearchStrategy {
        match (non_empty(&self.notion_api_key), non_empty(&self.notion_token_v2)) {
            (Some(token), None) => SearchStrategy::Integration {
                api_url: self.official_api_url.trim_end_matches('/').to_string(),
                token,
            },
            (_, session) => SearchStrategy::Session {
                api_base_url: self.api_base_url.trim_end_matches('/').to_string(),
                token: session.or_else(|| non_empty(&self.notion_token)),
            },
        }
    }
}
