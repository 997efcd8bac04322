use crate::anchors::{sync_anchors, WebAnchorDom};
use crate::api::{load_page_props, EnvConfig};
use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, ButtonVariant, Input, Spinner,
};
use crate::models::{normalize_block_id, PageProps, SearchParams, SearchResult, TocEntry};
use crate::render::NotionRenderer;
use crate::scroll::{header_height, scroll_to, use_is_mobile};
use crate::search::{search_notion, strip_highlight_tags, LatestRequest};
use crate::state::{provide_mobile_navigation, use_mobile_navigation, BodyOverflow, ScrollLock};
use crate::theme::{apply_body_class, use_dark_mode};
use crate::toc::TocBuilder;
use crate::util::page_href;
use icons::{Menu, Moon, Search, Sun, X};
use leptos::ev;
use leptos::html;
use leptos::logging::debug_warn;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use leptos_router::hooks::use_params_map;
use wasm_bindgen::JsCast;

/// Clicks that land on the overlay itself rather than its content.
fn is_backdrop_click(ev: &web_sys::MouseEvent) -> bool {
    match (ev.target(), ev.current_target()) {
        (Some(t), Some(c)) => js_sys::Object::is(&t, &c),
        _ => false,
    }
}

pub(crate) fn page_class(has_toc: bool, toc_collapsed: bool) -> String {
    let mut class = String::from("notion-page");
    if has_toc {
        class.push_str(" notion-page-has-toc");
        if toc_collapsed {
            class.push_str(" toc-collapsed");
        }
    }
    class
}

pub(crate) fn copyright_line(year: i32, author: Option<&str>) -> String {
    match author.map(str::trim).filter(|a| !a.is_empty()) {
        Some(author) => format!("Copyright {year} {author}"),
        None => format!("Copyright {year}"),
    }
}

/// Let the renderer flush, then stamp outline ids onto the rendered headings.
fn schedule_anchor_sync(entries: Vec<TocEntry>) {
    let Some(win) = web_sys::window() else {
        return;
    };

    let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
        let Some(dom) = WebAnchorDom::new() else {
            return;
        };
        let report = sync_anchors(&dom, &entries, header_height());
        if !report.unbound.is_empty() {
            debug_warn!("no rendered heading for outline entries {:?}", report.unbound);
        }
    });

    let Ok(tid) = win.set_timeout_with_callback_and_timeout_and_arguments_0(
        cb.as_ref().unchecked_ref(),
        0,
    ) else {
        return;
    };

    on_cleanup(move || {
        if let Some(win) = web_sys::window() {
            win.clear_timeout_with_handle(tid);
        }
    });
}

/// Route entry: page data comes from the host page; the route only fills in
/// a missing page id.
#[component]
pub fn SitePage() -> impl IntoView {
    let config = EnvConfig::new();
    let params = use_params_map();

    move || {
        let route_id = params.with(|p| p.get("page_id"));
        let props = load_page_props().map(|mut props| {
            if props.page_id.trim().is_empty() {
                props.page_id = route_id
                    .clone()
                    .or_else(|| config.root_page_id.clone())
                    .map(|id| normalize_block_id(&id))
                    .unwrap_or_default();
            }
            props
        });

        match props {
            Some(props) => view! { <NotionPage props=props config=config.clone() /> }.into_any(),
            None => view! {
                <div class="notion-page-missing">
                    <Alert>
                        <AlertDescription class="text-xs">"This page is not available."</AlertDescription>
                    </Alert>
                </div>
            }
            .into_any(),
        }
    }
}

#[component]
pub fn NotionPage(props: PageProps, config: EnvConfig) -> impl IntoView {
    let nav = provide_mobile_navigation();
    let (dark, _) = use_dark_mode();
    let is_mobile = use_is_mobile();

    Effect::new(move |_| apply_body_class(dark.get()));

    // Growing past the breakpoint dismisses the mobile sidebar.
    Effect::new(move |_| {
        if !is_mobile.get() && nav.state.with_untracked(|s| s.nav.sidebar_open) {
            nav.close();
        }
    });

    // Dropped with the owner on unmount, which releases the lock.
    let scroll_lock: StoredValue<Option<ScrollLock<BodyOverflow>>> = StoredValue::new(None);
    Effect::new(move |_| {
        let locked = nav.locks_background();
        scroll_lock.update_value(|lock| match (locked, lock.is_some()) {
            (true, false) => *lock = Some(ScrollLock::acquire(BodyOverflow)),
            (false, true) => *lock = None,
            _ => {}
        });
    });

    let key_handle = window_event_listener(ev::keydown, move |ev: web_sys::KeyboardEvent| {
        if ev.key() == "Escape" {
            nav.close();
        }
    });
    on_cleanup(move || key_handle.remove());

    let builder = TocBuilder::new(config.min_toc_items);
    let page_block = props.record_map.get_block(&props.page_id).cloned();
    let toc = builder.build(&props.page_id, &props.record_map);
    let has_toc = page_block
        .as_ref()
        .is_some_and(|page| builder.show_pane(page, &toc));

    if has_toc {
        schedule_anchor_sync(toc.clone());
    }

    let page_title = page_block.as_ref().map(|b| b.title()).unwrap_or_default();
    let site_name = if config.site_name.is_empty() {
        page_title.clone()
    } else {
        config.site_name.clone()
    };
    let ancestor_id = config.root_page_id.clone();
    let search_enabled = config.search_enabled;
    let sidebar_entries = if has_toc { toc.clone() } else { vec![] };
    let author = config.author.clone();

    view! {
        <div class="notion notion-app">
            <PageHeader
                site_name=site_name.clone()
                search_enabled=search_enabled
                is_mobile=is_mobile
            />

            <main class="notion-frame">
                <div class=move || page_class(has_toc, nav.is_toc_collapsed())>
                    <h1 class="notion-title">{page_title}</h1>
                    <NotionRenderer record_map=props.record_map page_id=props.page_id />
                </div>
                {has_toc.then(|| view! { <TocAside entries=toc /> })}
            </main>

            <Footer author=author />

            <MobileSidebar
                site_name=site_name
                entries=sidebar_entries
                search_enabled=search_enabled
            />

            <Show when=move || search_enabled && nav.is_search_open()>
                <SearchOverlay ancestor_id=ancestor_id.clone() />
            </Show>
        </div>
    }
}

#[component]
fn PageHeader(
    site_name: String,
    search_enabled: bool,
    is_mobile: ReadSignal<bool>,
) -> impl IntoView {
    let nav = use_mobile_navigation();
    let (dark, toggle_dark) = use_dark_mode();

    // Small screens get the hamburger; its sidebar carries the same actions.
    view! {
        <header class="notion-header">
            <div class="notion-nav-header">
                <a class="notion-nav-brand" href="/">{site_name}</a>

                <Show when=move || !is_mobile.get()>
                    <div class="notion-nav-header-rhs">
                        {search_enabled.then(|| view! {
                            <Button
                                variant=ButtonVariant::Ghost
                                size=ButtonSize::Icon
                                attr:title="Search"
                                attr:aria-label="Search"
                                on:click=move |_| nav.toggle_search()
                            >
                                <Search />
                            </Button>
                        })}

                        <Button
                            variant=ButtonVariant::Ghost
                            size=ButtonSize::Icon
                            attr:title="Toggle dark mode"
                            on:click=move |_| toggle_dark()
                        >
                            {move || if dark.get() {
                                view! { <Sun /> }.into_any()
                            } else {
                                view! { <Moon /> }.into_any()
                            }}
                        </Button>
                    </div>
                </Show>

                <Show when=move || is_mobile.get()>
                    <Button
                        variant=ButtonVariant::Ghost
                        size=ButtonSize::Icon
                        class="notion-mobile-menu-button"
                        attr:title="Menu"
                        attr:aria-expanded=move || nav.is_open().to_string()
                        on:click=move |_| nav.toggle()
                    >
                        {move || if nav.is_open() {
                            view! { <X /> }.into_any()
                        } else {
                            view! { <Menu /> }.into_any()
                        }}
                    </Button>
                </Show>
            </div>
        </header>
    }
}

#[component]
fn TocList(entries: Vec<TocEntry>) -> impl IntoView {
    let nav = use_mobile_navigation();

    view! {
        <nav class="notion-table-of-contents">
            {entries
                .into_iter()
                .map(|entry| {
                    let id = entry.id.clone();
                    let href = format!("#{}", entry.id);
                    let class = format!(
                        "notion-table-of-contents-item notion-table-of-contents-item-indent-level-{}",
                        entry.indent_level
                    );
                    view! {
                        <a
                            class=class
                            href=href
                            on:click=move |ev: web_sys::MouseEvent| {
                                ev.prevent_default();
                                scroll_to(&id);
                                if nav.is_open() {
                                    nav.close();
                                }
                            }
                        >
                            <span class="notion-table-of-contents-item-body">{entry.text}</span>
                        </a>
                    }
                })
                .collect_view()}
        </nav>
    }
}

#[component]
fn TocAside(entries: Vec<TocEntry>) -> impl IntoView {
    let nav = use_mobile_navigation();

    view! {
        <aside class="notion-aside">
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Sm
                class="notion-toc-toggle"
                attr:aria-expanded=move || (!nav.is_toc_collapsed()).to_string()
                on:click=move |_| nav.toggle_toc_collapsed()
            >
                {move || if nav.is_toc_collapsed() { "Show contents" } else { "Hide contents" }}
            </Button>

            <Show when=move || !nav.is_toc_collapsed()>
                <TocList entries=entries.clone() />
            </Show>
        </aside>
    }
}

#[component]
fn MobileSidebar(site_name: String, entries: Vec<TocEntry>, search_enabled: bool) -> impl IntoView {
    let nav = use_mobile_navigation();
    let (dark, toggle_dark) = use_dark_mode();

    view! {
        <Show when=move || nav.is_open()>
            <div
                class="notion-mobile-menu-overlay"
                on:click=move |ev: web_sys::MouseEvent| {
                    if is_backdrop_click(&ev) {
                        nav.close();
                    }
                }
            >
                <div class="notion-mobile-sidebar">
                    <div class="notion-mobile-menu-header">
                        <span class="notion-mobile-menu-title">{site_name.clone()}</span>
                        <Button
                            variant=ButtonVariant::Ghost
                            size=ButtonSize::Icon
                            attr:aria-label="Close menu"
                            on:click=move |_| nav.close()
                        >
                            <X />
                        </Button>
                    </div>

                    <a class="notion-mobile-menu-item" href="/" on:click=move |_| nav.close()>
                        "Home"
                    </a>
                    {search_enabled.then(|| view! {
                        <button class="notion-mobile-menu-item" on:click=move |_| nav.open_search()>
                            "Search"
                        </button>
                    })}
                    <button
                        class="notion-mobile-menu-item"
                        on:click=move |_| nav.then_close(toggle_dark)
                    >
                        {move || if dark.get() { "Light mode" } else { "Dark mode" }}
                    </button>

                    {(!entries.is_empty()).then(|| view! { <TocList entries=entries.clone() /> })}
                </div>
            </div>
        </Show>
    }
}

#[component]
fn Footer(author: Option<String>) -> impl IntoView {
    let (dark, toggle_dark) = use_dark_mode();
    let year = js_sys::Date::new_0().get_full_year() as i32;

    view! {
        <footer class="notion-footer">
            <a class="notion-footer-home" href="/" title="Home">"Home"</a>
            <div class="notion-footer-copyright">{copyright_line(year, author.as_deref())}</div>
            <a
                class="notion-footer-theme"
                href="#"
                role="button"
                title="Toggle dark mode"
                on:click=move |ev: web_sys::MouseEvent| {
                    ev.prevent_default();
                    toggle_dark();
                }
            >
                {move || if dark.get() {
                    view! { <Moon /> }.into_any()
                } else {
                    view! { <Sun /> }.into_any()
                }}
            </a>
        </footer>
    }
}

#[component]
fn SearchOverlay(ancestor_id: Option<String>) -> impl IntoView {
    let nav = use_mobile_navigation();
    let query: RwSignal<String> = RwSignal::new(String::new());
    let results: RwSignal<Vec<SearchResult>> = RwSignal::new(vec![]);
    let loading: RwSignal<bool> = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let latest = StoredValue::new(LatestRequest::default());
    let input_ref: NodeRef<html::Input> = NodeRef::new();

    on_cleanup(move || {
        let _ = latest.try_with_value(|l| l.cancel());
    });

    Effect::new(move |_| {
        if let Some(input) = input_ref.get() {
            let _ = input.focus();
        }
    });

    Effect::new(move |_| {
        let q = query.get().trim().to_string();
        let request = latest.with_value(|l| l.begin());

        if q.is_empty() {
            results.set(vec![]);
            error.set(None);
            loading.set(false);
            return;
        }

        loading.set(true);
        error.set(None);
        let params = SearchParams {
            query: q,
            ancestor_id: ancestor_id.clone(),
        };

        spawn_local(async move {
            let outcome = search_notion(params).await;

            // A newer query (or unmount) superseded this one.
            if !latest
                .try_with_value(|l| l.is_current(request))
                .unwrap_or(false)
            {
                return;
            }

            match outcome {
                Ok(found) => results.set(found.results),
                Err(e) => {
                    results.set(vec![]);
                    error.set(Some(e.to_string()));
                }
            }
            loading.set(false);
        });
    });

    view! {
        <div
            class="notion-search-overlay"
            on:click=move |ev: web_sys::MouseEvent| {
                if is_backdrop_click(&ev) {
                    nav.close_search();
                }
            }
        >
            <div class="notion-search" role="dialog" aria-label="Search">
                <div class="notion-search-bar">
                    <Input
                        class="notion-search-input"
                        placeholder="Search"
                        bind_value=query
                        node_ref=input_ref
                    />
                    <Show when=move || loading.get()>
                        <Spinner />
                    </Show>
                    <Button
                        variant=ButtonVariant::Ghost
                        size=ButtonSize::Icon
                        attr:aria-label="Close search"
                        on:click=move |_| nav.close_search()
                    >
                        <X />
                    </Button>
                </div>

                {move || error.get().map(|e| view! {
                    <Alert class="border-destructive/30">
                        <AlertDescription class="text-destructive text-xs">{e}</AlertDescription>
                    </Alert>
                })}

                <div class="notion-search-results">
                    {move || {
                        let items = results.get();
                        let settled = !loading.get() && error.with(Option::is_none);
                        if items.is_empty() && settled && !query.with(|q| q.trim().is_empty()) {
                            return view! { <p class="notion-search-empty">"No results"</p> }
                                .into_any();
                        }

                        items
                            .into_iter()
                            .map(|hit| {
                                let href = page_href(&hit.id);
                                view! {
                                    <a class="notion-search-result" href=href>
                                        <span class="notion-search-result-title">
                                            {strip_highlight_tags(&hit.highlight.text)}
                                        </span>
                                        <span class="notion-search-result-path">
                                            {hit.highlight.path_text}
                                        </span>
                                    </a>
                                }
                            })
                            .collect_view()
                            .into_any()
                    }}
                </div>
            </div>
        </div>
    }
}
