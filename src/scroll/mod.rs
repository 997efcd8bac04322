//! Header-aware scrolling to in-page anchors, plus the mobile breakpoint.

use crate::util::parse_css_px;
use leptos::ev;
use leptos::prelude::*;
use leptos_dom::helpers::window_event_listener;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlElement, ScrollBehavior, ScrollToOptions};

/// Gap left between the sticky header and the target heading.
pub const SCROLL_PADDING_PX: f64 = 8.0;

pub const HEADER_HEIGHT_VAR: &str = "--notion-header-height";
pub const MOBILE_QUERY: &str = "(max-width: 768px)";

pub trait ScrollHost {
    /// Raw value of the header height custom property, if set.
    fn css_header_height(&self) -> Option<String>;
    /// Offset heights of the rendered header elements that exist.
    fn header_heights(&self) -> Vec<i32>;
    /// Viewport-relative top of the anchor, looked up by id then `data-id`.
    fn anchor_top(&self, id: &str) -> Option<f64>;
    fn scroll_y(&self) -> f64;
    fn smooth_scroll_to(&self, top: f64);
    /// Swap the URL fragment without adding a history entry.
    fn replace_fragment(&self, id: &str);
}

pub fn compute_header_height<H: ScrollHost>(host: &H) -> i32 {
    let from_var = host
        .css_header_height()
        .and_then(|raw| parse_css_px(&raw))
        .unwrap_or(0);

    host.header_heights()
        .into_iter()
        .fold(from_var, i32::max)
        .max(0)
}

/// Returns whether a scroll was issued.
pub fn scroll_to_anchor<H: ScrollHost>(host: &H, id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    let Some(rect_top) = host.anchor_top(id) else {
        return false;
    };

    let header = compute_header_height(host) as f64;
    let top = rect_top + host.scroll_y() - header - SCROLL_PADDING_PX;
    host.smooth_scroll_to(top);
    host.replace_fragment(id);
    true
}

/// The browser window.
pub(crate) struct WebViewport {
    window: web_sys::Window,
    document: web_sys::Document,
}

impl WebViewport {
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }

    fn offset_height(&self, selector: &str) -> Option<i32> {
        self.document
            .query_selector(selector)
            .ok()
            .flatten()?
            .dyn_into::<HtmlElement>()
            .ok()
            .map(|el| el.offset_height())
    }
}

impl ScrollHost for WebViewport {
    fn css_header_height(&self) -> Option<String> {
        let root = self.document.document_element()?;
        let style = self.window.get_computed_style(&root).ok().flatten()?;
        style
            .get_property_value(HEADER_HEIGHT_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    fn header_heights(&self) -> Vec<i32> {
        [".notion-header", ".notion-nav-header"]
            .into_iter()
            .filter_map(|sel| self.offset_height(sel))
            .collect()
    }

    fn anchor_top(&self, id: &str) -> Option<f64> {
        let el = self.document.get_element_by_id(id).or_else(|| {
            let sel = format!("[data-id=\"{}\"]", id.replace('"', "\\\""));
            self.document.query_selector(&sel).ok().flatten()
        })?;
        Some(el.get_bounding_client_rect().top())
    }

    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn smooth_scroll_to(&self, top: f64) {
        let opts = ScrollToOptions::new();
        opts.set_top(top);
        opts.set_behavior(ScrollBehavior::Smooth);
        self.window.scroll_to_with_scroll_to_options(&opts);
    }

    fn replace_fragment(&self, id: &str) {
        if let Ok(history) = self.window.history() {
            let _ = history.replace_state_with_url(&JsValue::NULL, "", Some(&format!("#{id}")));
        }
    }
}

pub(crate) fn header_height() -> i32 {
    WebViewport::new()
        .map(|v| compute_header_height(&v))
        .unwrap_or(0)
}

/// Used by TOC links.
pub(crate) fn scroll_to(id: &str) -> bool {
    WebViewport::new().is_some_and(|v| scroll_to_anchor(&v, id))
}

fn matches_mobile() -> bool {
    web_sys::window()
        .and_then(|w| w.match_media(MOBILE_QUERY).ok().flatten())
        .map(|mq| mq.matches())
        .unwrap_or(false)
}

/// Tracks the mobile breakpoint for the lifetime of the calling owner.
pub(crate) fn use_is_mobile() -> ReadSignal<bool> {
    let (is_mobile, set_is_mobile) = signal(matches_mobile());

    let handle = window_event_listener(ev::resize, move |_| {
        let now = matches_mobile();
        if is_mobile.get_untracked() != now {
            set_is_mobile.set(now);
        }
    });
    on_cleanup(move || handle.remove());

    is_mobile
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeViewport {
        css_var: Option<String>,
        headers: Vec<i32>,
        anchors: HashMap<String, f64>,
        scroll_y: f64,
        scrolled_to: RefCell<Vec<f64>>,
        fragment: RefCell<Option<String>>,
    }

    impl ScrollHost for FakeViewport {
        fn css_header_height(&self) -> Option<String> {
            self.css_var.clone()
        }
        fn header_heights(&self) -> Vec<i32> {
            self.headers.clone()
        }
        fn anchor_top(&self, id: &str) -> Option<f64> {
            self.anchors.get(id).copied()
        }
        fn scroll_y(&self) -> f64 {
            self.scroll_y
        }
        fn smooth_scroll_to(&self, top: f64) {
            self.scrolled_to.borrow_mut().push(top);
        }
        fn replace_fragment(&self, id: &str) {
            *self.fragment.borrow_mut() = Some(format!("#{id}"));
        }
    }

    #[test]
    fn test_header_height_takes_the_largest_source() {
        let vp = FakeViewport {
            css_var: Some("56px".to_string()),
            headers: vec![48, 60],
            ..Default::default()
        };
        assert_eq!(compute_header_height(&vp), 60);

        let vp = FakeViewport {
            css_var: Some(" 72px".to_string()),
            headers: vec![48],
            ..Default::default()
        };
        assert_eq!(compute_header_height(&vp), 72);
    }

    #[test]
    fn test_header_height_defaults_to_zero() {
        let vp = FakeViewport {
            css_var: Some("auto".to_string()),
            ..Default::default()
        };
        assert_eq!(compute_header_height(&vp), 0);
    }

    #[test]
    fn test_scroll_offsets_by_header_and_padding() {
        let vp = FakeViewport {
            headers: vec![50],
            anchors: HashMap::from([("intro".to_string(), 300.0)]),
            scroll_y: 1000.0,
            ..Default::default()
        };

        assert!(scroll_to_anchor(&vp, "intro"));
        assert_eq!(*vp.scrolled_to.borrow(), vec![1242.0]);
        assert_eq!(vp.fragment.borrow().as_deref(), Some("#intro"));
    }

    #[test]
    fn test_unknown_anchor_is_a_no_op() {
        let vp = FakeViewport {
            headers: vec![50],
            ..Default::default()
        };

        assert!(!scroll_to_anchor(&vp, "missing"));
        assert!(!scroll_to_anchor(&vp, ""));
        assert!(vp.scrolled_to.borrow().is_empty());
        assert_eq!(*vp.fragment.borrow(), None);
    }
}
