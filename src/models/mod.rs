use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One Notion block.
///
/// The upstream schema is large and evolves often; we only name the fields the
/// site reads and keep everything else in `extra` so records round-trip.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Block {
    pub id: String,

    #[serde(rename = "type")]
    pub block_type: String,

    /// Ordered child block ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_table: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_edited_time: Option<i64>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Block {
    pub fn children(&self) -> &[String] {
        self.content.as_deref().unwrap_or_default()
    }

    /// Rich-text runs stored under `properties[name]`.
    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.as_ref()?.get(name)
    }

    pub fn title(&self) -> String {
        self.property("title").map(flatten_rich_text).unwrap_or_default()
    }

    pub fn is_page(&self) -> bool {
        matches!(self.block_type.as_str(), "page" | "collection_view_page")
    }

    /// Pages living inside a collection are rendered as blog posts.
    pub fn is_blog_post(&self) -> bool {
        self.block_type == "page" && self.parent_table.as_deref() == Some("collection")
    }
}

/// A `block` map entry.
///
/// Older responses store `{ role, value: Block }`; newer ones wrap that once
/// more (`{ value: { value: Block, role } }`). Plain blocks are accepted too.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum BlockRecord {
    Wrapped {
        value: Box<BlockRecord>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
    Plain(Block),
}

impl BlockRecord {
    pub fn reader(block: Block) -> Self {
        Self::Wrapped {
            value: Box::new(Self::Plain(block)),
            role: Some("reader".to_string()),
        }
    }

    pub fn block(&self) -> &Block {
        match self {
            Self::Wrapped { value, .. } => value.block(),
            Self::Plain(b) => b,
        }
    }
}

/// Everything needed to render one page and its embedded references.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RecordMap {
    pub block: HashMap<String, BlockRecord>,
    pub collection: HashMap<String, serde_json::Value>,
    pub collection_view: HashMap<String, serde_json::Value>,
    pub notion_user: HashMap<String, serde_json::Value>,
}

impl RecordMap {
    pub fn get_block(&self, id: &str) -> Option<&Block> {
        self.block
            .get(id)
            .or_else(|| self.block.get(&normalize_block_id(id)))
            .map(BlockRecord::block)
    }
}

/// Turn a 32-char hex id (as found in page URLs) into the dashed UUID form used
/// as record map keys. Anything else is returned unchanged.
pub fn normalize_block_id(id: &str) -> String {
    let id = id.trim();
    if id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        format!(
            "{}-{}-{}-{}-{}",
            &id[0..8],
            &id[8..12],
            &id[12..16],
            &id[16..20],
            &id[20..32]
        )
    } else {
        id.to_string()
    }
}

/// Concatenate the text of every rich-text run (`[[text, formats?], ...]`).
pub fn flatten_rich_text(runs: &serde_json::Value) -> String {
    let Some(runs) = runs.as_array() else {
        return runs.as_str().unwrap_or_default().to_string();
    };

    runs.iter()
        .filter_map(|run| match run {
            serde_json::Value::Array(parts) => parts.first().and_then(|t| t.as_str()),
            serde_json::Value::String(s) => Some(s.as_str()),
            _ => None,
        })
        .collect()
}

/// One outline item bound to a heading block.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TocEntry {
    pub id: String,
    pub text: String,
    pub indent_level: usize,
}

/// What the host page hands to the shell.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageProps {
    pub page_id: String,
    #[serde(default)]
    pub record_map: RecordMap,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchHighlight {
    pub text: String,
    pub path_text: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResult {
    pub id: String,
    pub is_navigable: bool,
    pub score: f64,
    pub highlight: SearchHighlight,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResults {
    pub record_map: RecordMap,
    pub results: Vec<SearchResult>,
    pub total: usize,
}
