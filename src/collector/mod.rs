//! Clickable-region collection over a rendered page's frame tree.
//!
//! The browser side ([`script::SNAPSHOT_SCRIPT`]) captures a
//! [`DocumentSnapshot`]; [`collect`] then walks it, composing frame offsets and
//! resolving frameset tracks, to produce page-absolute [`ClickableRegion`]s.
//! A frame whose document was not readable (cross-origin) contributes one
//! synthetic `frame` region pointing at its `src`.

pub mod script;
pub mod tracks;

use log::debug;
use serde::{Deserialize, Serialize};

pub use tracks::{parse_tracks, resolve_tracks, FrameTrack, TrackKind};

/// Axis-aligned box in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    fn translate(self, dx: f64, dy: f64) -> Rect {
        Rect { x: self.x + dx, y: self.y + dy, ..self }
    }

    fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// An interactive element with page-absolute coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickableRegion {
    pub tag: String,
    pub href: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One document as seen from inside the page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DocumentSnapshot {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub elements: Vec<ElementSnapshot>,
    pub frames: Vec<FrameSnapshot>,
    pub frameset: Option<FramesetSnapshot>,
}

/// Facts about one rendered element, box relative to its document's viewport.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub click_handler: bool,
    pub rect: Rect,
}

/// Outcome of reaching into a frame's document.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FrameAccess {
    Loaded { document: Box<DocumentSnapshot> },
    Denied,
}

/// An `iframe` or free-standing `frame` element.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameSnapshot {
    pub tag: String,
    #[serde(default)]
    pub src: Option<String>,
    pub rect: Rect,
    pub access: FrameAccess,
}

/// A `<frameset>` and its direct children, in document order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FramesetSnapshot {
    pub cols: Option<String>,
    pub rows: Option<String>,
    pub children: Vec<FramesetChild>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FramesetChild {
    Frame {
        #[serde(default)]
        src: Option<String>,
        access: FrameAccess,
    },
    Frameset {
        layout: FramesetSnapshot,
    },
}

/// Whether an element counts as interactive.
pub fn is_clickable(el: &ElementSnapshot) -> bool {
    let tag = el.tag.to_ascii_lowercase();
    let has_href = el.href.as_deref().is_some_and(|h| !h.is_empty());

    ((tag == "a" || tag == "area") && has_href)
        || tag == "button"
        || el.click_handler
        || el.role.as_deref().is_some_and(|r| r.trim().eq_ignore_ascii_case("button"))
        || el.cursor.as_deref().is_some_and(|c| c.trim() == "pointer")
}

/// Flatten a snapshot into page-absolute clickable regions.
pub fn collect(document: &DocumentSnapshot) -> Vec<ClickableRegion> {
    let mut out = Vec::new();
    walk_document(document, document.scroll_x, document.scroll_y, &mut out);
    out
}

fn walk_document(doc: &DocumentSnapshot, dx: f64, dy: f64, out: &mut Vec<ClickableRegion>) {
    for el in doc.elements.iter().filter(|el| is_clickable(el)) {
        push_region(out, &el.tag, el.href.clone(), el.rect.translate(dx, dy));
    }

    for frame in &doc.frames {
        visit_frame(&frame.access, frame.src.as_deref(), frame.rect.translate(dx, dy), out);
    }

    if let Some(set) = &doc.frameset {
        let area = Rect { x: dx, y: dy, width: doc.viewport_width, height: doc.viewport_height };
        walk_frameset(set, area, out);
    }
}

fn visit_frame(access: &FrameAccess, src: Option<&str>, bounds: Rect, out: &mut Vec<ClickableRegion>) {
    match access {
        FrameAccess::Loaded { document } => walk_document(document, bounds.x, bounds.y, out),
        FrameAccess::Denied => {
            debug!("frame {:?} not accessible, reporting as a single region", src);
            push_region(out, "frame", src.map(str::to_string), bounds);
        }
    }
}

fn walk_frameset(set: &FramesetSnapshot, area: Rect, out: &mut Vec<ClickableRegion>) {
    let cols = resolve_tracks(set.cols.as_deref().unwrap_or("*"), area.width);
    let rows = resolve_tracks(set.rows.as_deref().unwrap_or("*"), area.height);
    let col_starts = starts(&cols);
    let row_starts = starts(&rows);

    for (i, child) in set.children.iter().enumerate() {
        let (row, col) = (i / cols.len(), i % cols.len());
        if row >= rows.len() {
            debug!("frameset has {} children for {} cells", set.children.len(), cols.len() * rows.len());
            break;
        }
        let cell = Rect {
            x: area.x + col_starts[col],
            y: area.y + row_starts[row],
            width: cols[col],
            height: rows[row],
        };
        match child {
            FramesetChild::Frame { src, access } => visit_frame(access, src.as_deref(), cell, out),
            FramesetChild::Frameset { layout } => walk_frameset(layout, cell, out),
        }
    }
}

fn starts(sizes: &[f64]) -> Vec<f64> {
    sizes
        .iter()
        .scan(0.0, |acc, size| {
            let start = *acc;
            *acc += size;
            Some(start)
        })
        .collect()
}

fn push_region(out: &mut Vec<ClickableRegion>, tag: &str, href: Option<String>, rect: Rect) {
    if !rect.has_area() {
        return;
    }
    out.push(ClickableRegion {
        tag: tag.to_string(),
        href,
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
    });
}
