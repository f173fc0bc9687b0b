//! In-page snapshot script.
//!
//! The script only reports facts (element boxes, styles, frame access); it
//! makes no clickability or layout decisions. Frames whose document cannot be
//! read are reported as `denied` instead of throwing.

use super::DocumentSnapshot;
use crate::{Error, Result};

/// Evaluates to a JSON string describing the top document and every nested
/// frame document reachable from it.
pub const SNAPSHOT_SCRIPT: &str = r#"
(function () {
    function rectOf(el) {
        var r = el.getBoundingClientRect();
        return { x: r.left, y: r.top, width: r.width, height: r.height };
    }

    function access(frame) {
        try {
            var doc = frame.contentDocument;
            if (!doc || !doc.documentElement) return { status: 'denied' };
            return { status: 'loaded', document: snapshot(doc) };
        } catch (e) {
            return { status: 'denied' };
        }
    }

    function frameset(set) {
        var children = [];
        for (var i = 0; i < set.children.length; i++) {
            var child = set.children[i];
            var tag = child.tagName.toLowerCase();
            if (tag === 'frame') {
                children.push({ kind: 'frame', src: child.getAttribute('src'), access: access(child) });
            } else if (tag === 'frameset') {
                children.push({ kind: 'frameset', layout: frameset(child) });
            }
        }
        return { cols: set.getAttribute('cols'), rows: set.getAttribute('rows'), children: children };
    }

    function snapshot(doc) {
        var win = doc.defaultView || window;
        var elements = [];
        var frames = [];
        var all = doc.querySelectorAll('*');
        for (var i = 0; i < all.length; i++) {
            var el = all[i];
            try {
                var tag = el.tagName.toLowerCase();
                if (tag === 'iframe' || tag === 'frame') {
                    var parent = el.parentElement;
                    if (parent && parent.tagName.toLowerCase() === 'frameset') continue;
                    frames.push({ tag: tag, src: el.getAttribute('src'), rect: rectOf(el), access: access(el) });
                    continue;
                }
                var rect = rectOf(el);
                if (!(rect.width > 0 && rect.height > 0)) continue;
                var style = win.getComputedStyle(el);
                elements.push({
                    tag: tag,
                    href: typeof el.href === 'string' ? el.href : el.getAttribute('href'),
                    role: el.getAttribute('role'),
                    cursor: style ? style.cursor : null,
                    click_handler: typeof el.onclick === 'function' || el.hasAttribute('onclick'),
                    rect: rect
                });
            } catch (e) {
                // skip this element, keep the rest of the document
            }
        }
        var set = doc.querySelector('frameset');
        return {
            scroll_x: win.scrollX || 0,
            scroll_y: win.scrollY || 0,
            viewport_width: win.innerWidth || 0,
            viewport_height: win.innerHeight || 0,
            elements: elements,
            frames: frames,
            frameset: set ? frameset(set) : null
        };
    }

    return JSON.stringify(snapshot(document));
})()
"#;

/// Evaluates to `[width, height]` of the full scrollable page.
pub const PAGE_SIZE_SCRIPT: &str = r#"
(function () {
    var d = document.documentElement, b = document.body || d;
    return JSON.stringify([
        Math.ceil(Math.max(d.scrollWidth, b.scrollWidth, d.clientWidth)),
        Math.ceil(Math.max(d.scrollHeight, b.scrollHeight, d.clientHeight))
    ]);
})()
"#;

/// Evaluates to `[loadComplete, finishedResourceCount]`, sampled while waiting
/// for the network to go quiet.
pub const ACTIVITY_SCRIPT: &str = r#"
(function () {
    var entries = (window.performance && performance.getEntriesByType)
        ? performance.getEntriesByType('resource').length : 0;
    return JSON.stringify([document.readyState === 'complete', entries]);
})()
"#;

/// Parse the string produced by [`SNAPSHOT_SCRIPT`].
pub fn parse_snapshot(json: &str) -> Result<DocumentSnapshot> {
    serde_json::from_str(json).map_err(|e| Error::Internal(format!("Malformed page snapshot: {}", e)))
}

/// Parse the string produced by [`PAGE_SIZE_SCRIPT`].
pub fn parse_page_size(json: &str) -> Result<(u32, u32)> {
    let [w, h]: [f64; 2] =
        serde_json::from_str(json).map_err(|e| Error::Internal(format!("Malformed page size: {}", e)))?;
    Ok((w.max(1.0) as u32, h.max(1.0) as u32))
}

/// Parse the string produced by [`ACTIVITY_SCRIPT`].
pub fn parse_activity(json: &str) -> Result<(bool, u64)> {
    serde_json::from_str(json).map_err(|e| Error::Internal(format!("Malformed activity sample: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_size() {
        assert_eq!(parse_page_size("[1280, 2400]").unwrap(), (1280, 2400));
        assert_eq!(parse_page_size("[0, 0]").unwrap(), (1, 1));
        assert!(parse_page_size("{}").is_err());
    }

    #[test]
    fn parses_activity_sample() {
        assert_eq!(parse_activity("[true, 12]").unwrap(), (true, 12));
        assert!(parse_activity("[1]").is_err());
    }

    #[test]
    fn script_is_a_self_invoking_expression() {
        let trimmed = SNAPSHOT_SCRIPT.trim();
        assert!(trimmed.starts_with("(function"));
        assert!(trimmed.ends_with("})()"));
    }
}
