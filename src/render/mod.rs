//! Minimal block renderer with a per-type override table.
//!
//! Output uses the `notion-*` class names the site stylesheet and the anchor
//! synchronizer expect; anything fancier is left to the host's renderer.

use crate::models::{flatten_rich_text, Block, RecordMap};
use crate::util::page_href;
use leptos::prelude::*;
use std::collections::{HashMap, HashSet};

const MAX_RENDER_DEPTH: usize = 64;

pub type BlockRenderer = fn(&RenderCtx<'_>, &Block) -> AnyView;

/// Block type -> renderer. Unknown types fall back to a plain container.
#[derive(Clone)]
pub struct Overrides {
    table: HashMap<String, BlockRenderer>,
}

impl Default for Overrides {
    fn default() -> Self {
        let mut o = Self {
            table: HashMap::new(),
        };
        o.set("text", render_text);
        o.set("header", render_heading);
        o.set("sub_header", render_heading);
        o.set("sub_sub_header", render_heading);
        o.set("bulleted_list", render_list_item);
        o.set("numbered_list", render_list_item);
        o.set("code", render_code);
        o.set("quote", render_quote);
        o.set("divider", render_divider);
        o.set("page", render_page_link);
        o
    }
}

impl Overrides {
    pub fn set(&mut self, block_type: &str, renderer: BlockRenderer) -> &mut Self {
        self.table.insert(block_type.to_string(), renderer);
        self
    }

    pub fn get(&self, block_type: &str) -> Option<BlockRenderer> {
        self.table.get(block_type).copied()
    }

    pub fn contains(&self, block_type: &str) -> bool {
        self.table.contains_key(block_type)
    }
}

pub struct RenderCtx<'a> {
    pub record_map: &'a RecordMap,
    pub overrides: &'a Overrides,
    depth: usize,
    visited: std::cell::RefCell<HashSet<String>>,
}

impl<'a> RenderCtx<'a> {
    pub fn new(record_map: &'a RecordMap, overrides: &'a Overrides) -> Self {
        Self {
            record_map,
            overrides,
            depth: 0,
            visited: Default::default(),
        }
    }

    fn nested(&self) -> Self {
        Self {
            record_map: self.record_map,
            overrides: self.overrides,
            depth: self.depth + 1,
            visited: std::cell::RefCell::new(self.visited.borrow().clone()),
        }
    }

    pub fn render_block(&self, id: &str) -> AnyView {
        if self.depth > MAX_RENDER_DEPTH || !self.visited.borrow_mut().insert(id.to_string()) {
            return ().into_view().into_any();
        }
        let Some(block) = self.record_map.get_block(id) else {
            return ().into_view().into_any();
        };

        match self.overrides.get(&block.block_type) {
            Some(render) => render(self, block),
            None => render_container(self, block),
        }
    }

    pub fn render_children(&self, block: &Block) -> AnyView {
        let child = self.nested();
        block
            .children()
            .iter()
            .map(|id| child.render_block(id))
            .collect_view()
            .into_any()
    }
}

/// What a `code` block turns into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodeRoute {
    Diagram(String),
    Highlighted { language: String, source: String },
}

pub fn code_route(block: &Block) -> CodeRoute {
    let language = block
        .property("language")
        .map(flatten_rich_text)
        .unwrap_or_default();
    let source = block.title();

    if language.eq_ignore_ascii_case("mermaid") {
        CodeRoute::Diagram(source)
    } else {
        CodeRoute::Highlighted {
            language: language.to_ascii_lowercase().replace(' ', "-"),
            source,
        }
    }
}

fn render_text(ctx: &RenderCtx<'_>, block: &Block) -> AnyView {
    let id = block.id.clone();
    let text = block.title();
    view! {
        <div class="notion-text" data-id=id>
            {text}
            {ctx.render_children(block)}
        </div>
    }
    .into_any()
}

fn render_heading(ctx: &RenderCtx<'_>, block: &Block) -> AnyView {
    let id = block.id.clone();
    let title = view! { <span class="notion-h-title">{block.title()}</span> };
    let children = ctx.render_children(block);

    match block.block_type.as_str() {
        "header" => view! { <h2 class="notion-h notion-h1" data-id=id>{title}</h2>{children} }
            .into_any(),
        "sub_header" => view! { <h3 class="notion-h notion-h2" data-id=id>{title}</h3>{children} }
            .into_any(),
        _ => view! { <h4 class="notion-h notion-h3" data-id=id>{title}</h4>{children} }
            .into_any(),
    }
}

fn render_list_item(ctx: &RenderCtx<'_>, block: &Block) -> AnyView {
    let id = block.id.clone();
    let text = block.title();
    let children = ctx.render_children(block);
    if block.block_type == "numbered_list" {
        view! { <ol class="notion-list notion-list-numbered" data-id=id><li>{text}{children}</li></ol> }
            .into_any()
    } else {
        view! { <ul class="notion-list notion-list-disc" data-id=id><li>{text}{children}</li></ul> }
            .into_any()
    }
}

fn render_code(_ctx: &RenderCtx<'_>, block: &Block) -> AnyView {
    let id = block.id.clone();
    match code_route(block) {
        // mermaid.js picks up `.mermaid` nodes once loaded by the host page.
        CodeRoute::Diagram(source) => view! {
            <div class="notion-mermaid" data-id=id>
                <pre class="mermaid">{source}</pre>
            </div>
        }
        .into_any(),
        CodeRoute::Highlighted { language, source } => {
            let class = format!("language-{language}");
            view! {
                <pre class="notion-code" data-id=id>
                    <code class=class>{source}</code>
                </pre>
            }
            .into_any()
        }
    }
}

fn render_quote(ctx: &RenderCtx<'_>, block: &Block) -> AnyView {
    let id = block.id.clone();
    view! {
        <blockquote class="notion-quote" data-id=id>
            {block.title()}
            {ctx.render_children(block)}
        </blockquote>
    }
    .into_any()
}

fn render_divider(_ctx: &RenderCtx<'_>, block: &Block) -> AnyView {
    let id = block.id.clone();
    view! { <hr class="notion-hr" data-id=id /> }.into_any()
}

fn render_page_link(_ctx: &RenderCtx<'_>, block: &Block) -> AnyView {
    let href = page_href(&block.id);
    let title = block.title();
    let title = if title.is_empty() { "Untitled".to_string() } else { title };
    view! {
        <a class="notion-page-link" href=href data-id=block.id.clone()>
            <span class="notion-page-title">{title}</span>
        </a>
    }
    .into_any()
}

fn render_container(ctx: &RenderCtx<'_>, block: &Block) -> AnyView {
    let class = format!("notion-{}", block.block_type.replace('_', "-"));
    view! {
        <div class=class data-id=block.id.clone()>
            {ctx.render_children(block)}
        </div>
    }
    .into_any()
}

/// The page body: the page block's children inside `.notion-page`.
#[component]
pub fn NotionRenderer(
    record_map: RecordMap,
    page_id: String,
    #[prop(optional)] overrides: Option<Overrides>,
) -> impl IntoView {
    let overrides = overrides.unwrap_or_default();
    let ctx = RenderCtx::new(&record_map, &overrides);

    let body = match record_map.get_block(&page_id) {
        Some(page) => {
            ctx.visited.borrow_mut().insert(page.id.clone());
            ctx.render_children(page)
        }
        None => view! { <p class="notion-empty">"This page could not be loaded."</p> }.into_any(),
    };

    view! { <article class="notion-page-content">{body}</article> }
}
