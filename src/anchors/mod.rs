//! Give every TOC heading an addressable anchor after the renderer paints.
//!
//! Renderers do not always emit heading ids matching the outline ids, so we
//! look the heading up by data attributes and, as a last resort, by its title
//! text, then stamp the outline id on it.

mod web;

pub(crate) use web::WebAnchorDom;

use crate::models::TocEntry;

/// Extra space kept between a sticky header and a jumped-to heading.
pub const ANCHOR_MARGIN_PADDING_PX: i32 = 12;

pub const DATA_ID_ATTR: &str = "data-id";
pub const DATA_BLOCK_ID_ATTR: &str = "data-block-id";

/// The few DOM operations the synchronizer needs.
pub trait AnchorDom {
    type Node: Clone;

    fn element_by_id(&self, id: &str) -> Option<Self::Node>;
    fn element_by_attr(&self, attr: &str, value: &str) -> Option<Self::Node>;
    /// Rendered heading title elements, in document order.
    fn heading_titles(&self) -> Vec<Self::Node>;
    fn text_content(&self, node: &Self::Node) -> Option<String>;
    /// Nearest heading container (the node itself included).
    fn closest_heading(&self, node: &Self::Node) -> Option<Self::Node>;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn set_id(&self, node: &Self::Node, id: &str);
    fn set_scroll_margin_top(&self, node: &Self::Node, px: i32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorSource {
    DataId,
    DataBlockId,
    TitleText,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnchorReport {
    pub already_bound: usize,
    pub bound: Vec<(String, AnchorSource)>,
    pub unbound: Vec<String>,
}

fn find_target<D: AnchorDom>(dom: &D, entry: &TocEntry) -> Option<(D::Node, AnchorSource)> {
    if let Some(el) = dom.element_by_attr(DATA_ID_ATTR, &entry.id) {
        return Some((el, AnchorSource::DataId));
    }
    if let Some(el) = dom.element_by_attr(DATA_BLOCK_ID_ATTR, &entry.id) {
        return Some((el, AnchorSource::DataBlockId));
    }

    // Identical heading texts bind to the first one in document order.
    let wanted = entry.text.trim();
    let title = dom
        .heading_titles()
        .into_iter()
        .find(|t| dom.text_content(t).is_some_and(|s| s.trim() == wanted))?;
    let el = dom
        .closest_heading(&title)
        .or_else(|| dom.parent(&title))?;
    Some((el, AnchorSource::TitleText))
}

/// Bind each entry's id to a rendered element. Entries whose id is already
/// present are left alone, so running this again is a no-op.
pub fn sync_anchors<D: AnchorDom>(
    dom: &D,
    entries: &[TocEntry],
    header_height: i32,
) -> AnchorReport {
    let mut report = AnchorReport::default();

    for entry in entries {
        if entry.id.is_empty() {
            continue;
        }
        if dom.element_by_id(&entry.id).is_some() {
            report.already_bound += 1;
            continue;
        }

        match find_target(dom, entry) {
            Some((el, source)) => {
                dom.set_id(&el, &entry.id);
                dom.set_scroll_margin_top(&el, header_height + ANCHOR_MARGIN_PADDING_PX);
                report.bound.push((entry.id.clone(), source));
            }
            None => report.unbound.push(entry.id.clone()),
        }
    }

    report
}
