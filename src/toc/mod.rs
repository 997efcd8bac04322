//! Table of contents derived from a page's block tree.

use crate::models::{Block, RecordMap, TocEntry};
use leptos::logging::warn;
use std::collections::HashSet;

/// A 1-2 item outline is not worth a sidebar.
pub const DEFAULT_MIN_TOC_ITEMS: usize = 3;

/// Guard against pathological (or cyclic-through-aliases) trees.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TocError {
    #[error("page {0} is not in the record map")]
    MissingPage(String),
    #[error("block tree is deeper than {0} levels")]
    TooDeep(usize),
}

struct RawHeading {
    id: String,
    text: String,
    rank: usize,
}

fn heading_rank(block_type: &str) -> Option<usize> {
    match block_type {
        "header" => Some(0),
        "sub_header" => Some(1),
        "sub_sub_header" => Some(2),
        _ => None,
    }
}

/// Every heading reachable from the page, in document order.
///
/// Nested containers (columns, toggles, synced blocks, toggleable headings) are
/// walked; child pages are not. Missing or repeated children are skipped.
pub fn page_table_of_contents(
    page_id: &str,
    record_map: &RecordMap,
) -> Result<Vec<TocEntry>, TocError> {
    let page = record_map
        .get_block(page_id)
        .ok_or_else(|| TocError::MissingPage(page_id.to_string()))?;

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(page.id.as_str());

    let mut headings = Vec::new();
    walk(page, record_map, 0, &mut visited, &mut headings)?;

    Ok(smooth_indent_levels(headings))
}

fn walk<'a>(
    block: &'a Block,
    record_map: &'a RecordMap,
    depth: usize,
    visited: &mut HashSet<&'a str>,
    out: &mut Vec<RawHeading>,
) -> Result<(), TocError> {
    if depth > MAX_DEPTH {
        return Err(TocError::TooDeep(MAX_DEPTH));
    }

    for child_id in block.children() {
        if !visited.insert(child_id.as_str()) {
            continue;
        }
        let Some(child) = record_map.get_block(child_id) else {
            continue;
        };
        if child.is_page() {
            continue;
        }

        if let Some(rank) = heading_rank(&child.block_type) {
            out.push(RawHeading {
                id: child_id.clone(),
                text: child.title(),
                rank,
            });
        }

        walk(child, record_map, depth + 1, visited, out)?;
    }

    Ok(())
}

/// Map heading ranks to outline depth so a level is never skipped: an
/// `h1, h3` sequence yields depths `0, 1`, not `0, 2`.
fn smooth_indent_levels(headings: Vec<RawHeading>) -> Vec<TocEntry> {
    // (rank, depth); the sentinel is never popped because ranks are >= 0.
    let mut stack: Vec<(isize, isize)> = vec![(-1, -1)];
    let mut out = Vec::with_capacity(headings.len());

    for h in headings {
        let rank = h.rank as isize;
        let depth = loop {
            let Some(&(prev_rank, prev_depth)) = stack.last() else {
                break 0;
            };
            if rank > prev_rank {
                stack.push((rank, prev_depth + 1));
                break prev_depth + 1;
            } else if rank == prev_rank {
                break prev_depth;
            } else {
                stack.pop();
            }
        };

        out.push(TocEntry {
            id: h.id,
            text: h.text,
            indent_level: depth.max(0) as usize,
        });
    }

    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TocBuilder {
    pub min_items: usize,
}

impl Default for TocBuilder {
    fn default() -> Self {
        Self {
            min_items: DEFAULT_MIN_TOC_ITEMS,
        }
    }
}

impl TocBuilder {
    pub fn new(min_items: usize) -> Self {
        Self { min_items }
    }

    /// The outline to display, or an empty one when it is below the threshold
    /// or the tree could not be walked.
    pub fn build(&self, page_id: &str, record_map: &RecordMap) -> Vec<TocEntry> {
        let entries = match page_table_of_contents(page_id, record_map) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to generate table of contents: {e}");
                return vec![];
            }
        };

        if self.available(&entries) {
            entries
        } else {
            vec![]
        }
    }

    pub fn available(&self, entries: &[TocEntry]) -> bool {
        !entries.is_empty() && entries.len() >= self.min_items
    }

    /// Only blog posts get the TOC pane.
    pub fn show_pane(&self, page: &Block, entries: &[TocEntry]) -> bool {
        page.is_blog_post() && self.available(entries)
    }
}
