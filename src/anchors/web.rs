use super::AnchorDom;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

const HEADING_TITLE_SELECTOR: &str = ".notion-page .notion-h-title";
const HEADING_SELECTOR: &str = ".notion-h, .notion-h1, .notion-h2, .notion-h3";

/// The live document.
pub(crate) struct WebAnchorDom {
    document: Document,
}

impl WebAnchorDom {
    pub fn new() -> Option<Self> {
        let document = web_sys::window()?.document()?;
        Some(Self { document })
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl AnchorDom for WebAnchorDom {
    type Node = Element;

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn element_by_attr(&self, attr: &str, value: &str) -> Option<Element> {
        let selector = format!("[{attr}=\"{}\"]", escape_attr(value));
        self.document.query_selector(&selector).ok().flatten()
    }

    fn heading_titles(&self) -> Vec<Element> {
        let Ok(list) = self.document.query_selector_all(HEADING_TITLE_SELECTOR) else {
            return vec![];
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .collect()
    }

    fn text_content(&self, node: &Element) -> Option<String> {
        node.text_content()
    }

    fn closest_heading(&self, node: &Element) -> Option<Element> {
        node.closest(HEADING_SELECTOR).ok().flatten()
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn set_id(&self, node: &Element, id: &str) {
        node.set_id(id);
    }

    fn set_scroll_margin_top(&self, node: &Element, px: i32) {
        if let Some(el) = node.dyn_ref::<HtmlElement>() {
            let _ = el
                .style()
                .set_property("scroll-margin-top", &format!("{px}px"));
        }
    }
}
