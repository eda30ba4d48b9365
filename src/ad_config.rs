use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Token in helper text templates replaced with the remaining ad time.
pub const TIME_TOKEN: &str = "$1";

// --- Candidate pieces ---

/// One encoding of an ad's video asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFile {
    pub src: String,
    /// MIME type, e.g. `video/mp4`.
    #[serde(rename = "type", alias = "contentType")]
    pub content_type: String,
}

/// Sized HTML creative, used for both companions and non-linear overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creative {
    pub width: u32,
    pub height: u32,
    pub html: String,
}

/// Beacon URL bound to a named playback milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingBeacon {
    pub event_name: String,
    pub beacon_url: String,
}

/// A single playable ad inside a pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCandidate {
    pub id: String,
    /// Nominal length of the creative in seconds.
    #[serde(default, alias = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub video_files: Vec<VideoFile>,
    #[serde(default)]
    pub companions: Vec<Creative>,
    #[serde(default)]
    pub non_linear: Vec<Creative>,
    /// Landing page opened when the playing ad is clicked.
    #[serde(default, alias = "clickThroughUrl", skip_serializing_if = "Option::is_none")]
    pub click_through: Option<String>,
    /// Impression beacons. Accepts bare URLs or `{"beaconUrl": ...}` objects.
    #[serde(default, deserialize_with = "deserialize_impressions")]
    pub impressions: Vec<String>,
    #[serde(default)]
    pub tracking_events: Vec<TrackingBeacon>,
    /// Hide native controls while this ad plays.
    #[serde(default, alias = "lockUI")]
    pub lock_ui: bool,
}

impl AdCandidate {
    pub fn new(id: &str) -> Self {
        AdCandidate {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// Add a video encoding.
    pub fn with_video(mut self, src: &str, content_type: &str) -> Self {
        self.video_files.push(VideoFile {
            src: src.to_string(),
            content_type: content_type.to_string(),
        });
        self
    }

    /// Add a tracking beacon for `event_name`.
    pub fn with_tracking(mut self, event_name: &str, beacon_url: &str) -> Self {
        self.tracking_events.push(TrackingBeacon {
            event_name: event_name.to_string(),
            beacon_url: beacon_url.to_string(),
        });
        self
    }

    pub fn has_video(&self) -> bool {
        !self.video_files.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImpressionRepr {
    Url(String),
    Object {
        #[serde(rename = "beaconUrl")]
        beacon_url: String,
    },
}

fn deserialize_impressions<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let raw = Vec::<ImpressionRepr>::deserialize(d)?;
    Ok(raw
        .into_iter()
        .map(|r| match r {
            ImpressionRepr::Url(url) => url,
            ImpressionRepr::Object { beacon_url } => beacon_url,
        })
        .collect())
}

// --- Break configuration ---

/// On-screen helper (ad countdown notice or skip button).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperConfig {
    /// Text template; [`TIME_TOKEN`] is replaced with the remaining seconds.
    pub text: String,
    /// Opaque style map handed to the host.
    #[serde(default)]
    pub css: Map<String, Value>,
}

impl HelperConfig {
    pub fn new(text: &str) -> Self {
        HelperConfig {
            text: text.to_string(),
            css: Map::new(),
        }
    }

    /// Fill the time token with `remaining` (or `...` when unknown).
    pub fn render(&self, remaining: Option<f64>) -> String {
        let value = match remaining {
            Some(secs) if secs.is_finite() => format!("{}", secs.round().max(0.0) as i64),
            _ => "...".to_string(),
        };
        self.text.replacen(TIME_TOKEN, &value, 1)
    }

    /// Numeric `bottom` offset in pixels, if the style declares one.
    pub fn bottom_px(&self) -> Option<f64> {
        match self.css.get("bottom")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches("px").trim().parse().ok(),
            _ => None,
        }
    }
}

/// Page region where a companion creative may render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionTarget {
    #[serde(rename = "elementid", alias = "elementId")]
    pub element_id: String,
    pub width: u32,
    pub height: u32,
    /// Target type (`html` on the web player).
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Start/frequency window for overlay breaks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayTiming {
    /// Content time (seconds) of the first overlay.
    pub start: f64,
    /// Minimum content seconds between the end of one overlay and the next.
    pub frequency: f64,
    /// How long each overlay stays up.
    pub timeout: Option<f64>,
}

/// One registered unit of ad content for a slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdBreakConfig {
    /// The pod. One candidate is chosen per display.
    #[serde(default)]
    pub ads: Vec<AdCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<HelperConfig>,
    #[serde(default, alias = "skipButton", skip_serializing_if = "Option::is_none")]
    pub skip_btn: Option<HelperConfig>,
    #[serde(default)]
    pub companion_targets: Vec<CompanionTarget>,
    // Overlay timing, only read for overlay breaks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl AdBreakConfig {
    pub fn new(ads: Vec<AdCandidate>) -> Self {
        AdBreakConfig {
            ads,
            ..Default::default()
        }
    }

    /// Overlay window. Missing values start at 0 and never repeat.
    pub fn overlay_timing(&self) -> OverlayTiming {
        OverlayTiming {
            start: self.start.unwrap_or(0.0),
            frequency: self.frequency.unwrap_or(f64::INFINITY),
            timeout: self.timeout,
        }
    }
}
