//! Frameset `cols`/`rows` track sizing.

/// How a single track claims space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackKind {
    /// Literal pixel size.
    Fixed,
    /// Percentage of the total.
    Percentage,
    /// Share of whatever is left, by weight.
    Proportional,
}

/// One parsed entry of a track list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTrack {
    pub kind: TrackKind,
    pub value: f64,
}

impl FrameTrack {
    const PROPORTIONAL: FrameTrack = FrameTrack { kind: TrackKind::Proportional, value: 1.0 };

    /// Parse one token. Anything unrecognised becomes a weight-1 proportional
    /// track, so `2*` is weighted the same as `*`.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if let Some(number) = token.strip_suffix('%') {
            return match number.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => FrameTrack { kind: TrackKind::Percentage, value: v.max(0.0) },
                _ => Self::PROPORTIONAL,
            };
        }
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(v) = token.parse::<f64>() {
                return FrameTrack { kind: TrackKind::Fixed, value: v };
            }
        }
        Self::PROPORTIONAL
    }

    /// Space claimed up front (zero for proportional tracks).
    fn claim(&self, total: f64) -> f64 {
        match self.kind {
            TrackKind::Fixed => self.value,
            TrackKind::Percentage => total * self.value / 100.0,
            TrackKind::Proportional => 0.0,
        }
    }
}

/// Split a comma-separated track list into tracks, in order.
pub fn parse_tracks(list: &str) -> Vec<FrameTrack> {
    list.split(',').map(FrameTrack::parse).collect()
}

/// Resolve a track list against `total`.
///
/// Fixed and percentage tracks are served first; proportional tracks share
/// `max(0, total - claimed)` by weight. When the claimed space alone exceeds
/// `total` it is scaled down so the result never sums past `total`.
pub fn resolve_tracks(list: &str, total: f64) -> Vec<f64> {
    let total = if total.is_finite() { total.max(0.0) } else { 0.0 };
    let tracks = parse_tracks(list);

    let claimed: f64 = tracks.iter().map(|t| t.claim(total)).sum();
    let scale = if claimed > total && claimed > 0.0 { total / claimed } else { 1.0 };
    let remaining = (total - claimed).max(0.0);
    let weights: f64 = tracks
        .iter()
        .filter(|t| t.kind == TrackKind::Proportional)
        .map(|t| t.value)
        .sum();

    tracks
        .iter()
        .map(|t| match t.kind {
            TrackKind::Proportional if weights > 0.0 => remaining * t.value / weights,
            TrackKind::Proportional => 0.0,
            _ => t.claim(total) * scale,
        })
        .collect()
}
