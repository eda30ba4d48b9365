//! Boundary to the host media player.
//!
//! The player owns the single media element, the control bar and the UI
//! container. The timeline drives it exclusively through [`HostPlayer`] and
//! reacts to the events the embedder forwards to
//! [`AdTimeline`](crate::timeline::AdTimeline).

use crate::ad_config::VideoFile;
use crate::error::HostError;
use crate::slot::InsertionPoint;
use serde_json::{Map, Value};

/// On-screen helper elements the timeline can ask the host to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelperKind {
    /// Countdown text ("Ad ends in 12 seconds").
    Notice,
    /// Clickable skip link.
    SkipButton,
}

/// Control bar geometry, used to keep overlays and the skip button clear of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlBar {
    pub visible: bool,
    pub height: f64,
}

/// Absolutely positioned non-linear ad panel, horizontally centred.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPanel {
    pub width: u32,
    pub height: u32,
    pub html: String,
    /// Distance from the bottom of the player in pixels.
    pub bottom_px: f64,
    /// Negative half-width, pairs with `left: 50%`.
    pub margin_left_px: f64,
}

/// Notifications broadcast to out-of-player listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    /// A companion creative was placed in `element_id`.
    CompanionUpdated { element_id: String, html: String },
    BreakStarted { slot: InsertionPoint, ad_id: String },
    BreakCompleted { slot: InsertionPoint },
    BeaconSent { event_name: String, url: String },
}

/// Everything the timeline needs from the embedding player.
pub trait HostPlayer {
    /// URL of the currently loaded source.
    fn source(&self) -> String;

    /// Load `url` into the media element and start it.
    fn switch_source(&mut self, url: &str) -> Result<(), HostError>;

    /// First source in `files` this player's playback technology can handle.
    fn compatible_source(&self, files: &[VideoFile]) -> Option<String>;

    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, seconds: f64);

    fn disable_seek(&mut self);
    fn enable_seek(&mut self);

    /// Stop forwarding the player's own lifecycle events to page listeners.
    fn stop_event_propagation(&mut self);
    fn restore_event_propagation(&mut self);

    /// Playback position of the media element in seconds.
    fn current_time(&self) -> f64;

    /// Duration of the loaded media, when known.
    fn duration(&self) -> Option<f64>;

    /// False once the media element has been torn down.
    fn media_available(&self) -> bool {
        true
    }

    fn set_native_controls(&mut self, enabled: bool);
    fn control_bar(&self) -> ControlBar;

    /// Open a click-through URL in a new browsing context.
    fn open_url(&mut self, url: &str);

    fn show_helper(
        &mut self,
        kind: HelperKind,
        text: &str,
        css: &Map<String, Value>,
        bottom_px: Option<f64>,
    );
    fn update_helper(&mut self, kind: HelperKind, text: &str);
    fn remove_helper(&mut self, kind: HelperKind);

    /// Replace the content of a page element with companion markup.
    fn render_companion(&mut self, element_id: &str, html: &str);

    fn show_overlay(&mut self, panel: &OverlayPanel);
    fn move_overlay(&mut self, bottom_px: f64);
    fn hide_overlay(&mut self);

    /// Fire-and-forget tracking request.
    fn send_beacon(&mut self, url: &str);

    fn emit(&mut self, _event: TimelineEvent) {}
}
