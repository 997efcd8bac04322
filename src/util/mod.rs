#[cfg(target_arch = "wasm32")]
pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Parse a CSS length the way `parseInt` does: leading sign and digits only,
/// so `"64px"` is 64 and `"4.5rem"` is 4. Returns `None` when nothing parses.
pub(crate) fn parse_css_px(raw: &str) -> Option<i32> {
    let s = raw.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i32>().ok().map(|n| sign * n)
}

/// Site-relative URL for a page, using the undashed id like Notion does.
pub(crate) fn page_href(id: &str) -> String {
    format!("/{}", id.replace('-', ""))
}
