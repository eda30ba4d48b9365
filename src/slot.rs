use serde::{Deserialize, Serialize};
use std::fmt;

/// Named insertion point on the playback timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertionPoint {
    /// Before main content, chained in registration order.
    Preroll,
    /// Short mandatory clip between the prerolls and main content.
    Bumper,
    /// Non-linear banner shown over playing content on a start/frequency window.
    Overlay,
    /// Cue-point triggered break inside main content.
    Midroll,
    /// After main content ends.
    Postroll,
}

impl InsertionPoint {
    /// All slots in timeline order.
    pub const ALL: [InsertionPoint; 5] = [
        InsertionPoint::Preroll,
        InsertionPoint::Bumper,
        InsertionPoint::Overlay,
        InsertionPoint::Midroll,
        InsertionPoint::Postroll,
    ];

    /// Parse a slot from a string (case-insensitive, surrounding whitespace ignored).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "preroll" | "pre-roll" => Some(InsertionPoint::Preroll),
            "bumper" => Some(InsertionPoint::Bumper),
            "overlay" => Some(InsertionPoint::Overlay),
            "midroll" | "mid-roll" => Some(InsertionPoint::Midroll),
            "postroll" | "post-roll" => Some(InsertionPoint::Postroll),
            _ => None,
        }
    }

    /// Index into per-slot tables.
    pub(crate) fn index(self) -> usize {
        match self {
            InsertionPoint::Preroll => 0,
            InsertionPoint::Bumper => 1,
            InsertionPoint::Overlay => 2,
            InsertionPoint::Midroll => 3,
            InsertionPoint::Postroll => 4,
        }
    }

    /// Whether breaks in this slot replace the media source.
    /// Overlays render on top of content instead.
    pub fn swaps_source(self) -> bool {
        self != InsertionPoint::Overlay
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InsertionPoint::Preroll => "preroll",
            InsertionPoint::Bumper => "bumper",
            InsertionPoint::Overlay => "overlay",
            InsertionPoint::Midroll => "midroll",
            InsertionPoint::Postroll => "postroll",
        }
    }
}

impl fmt::Display for InsertionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
