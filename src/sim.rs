//! In-memory host player and a fixed-step session driver.
//!
//! `SimPlayer` records every call the timeline makes so tests and the CLI can
//! inspect the exact choreography. `Simulation` plays content and ad clips on
//! a virtual clock, forwarding `play`, monitor ticks and `ended` the way a
//! real player would.

use crate::ad_config::VideoFile;
use crate::error::HostError;
use crate::host::{ControlBar, HelperKind, HostPlayer, OverlayPanel, TimelineEvent};
use crate::settings::TimelineFile;
use crate::slot::InsertionPoint;
use crate::timeline::{AdTimeline, Phase};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Clip length assumed for ad media that declares no duration.
pub const DEFAULT_CLIP_SECONDS: f64 = 15.0;

/// One recorded call into the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    SwitchSource(String),
    Play,
    Pause,
    Stop,
    Seek(f64),
    DisableSeek,
    EnableSeek,
    StopPropagation,
    RestorePropagation,
    NativeControls(bool),
    OpenUrl(String),
    ShowHelper(HelperKind, String),
    UpdateHelper(HelperKind, String),
    RemoveHelper(HelperKind),
    Companion { element_id: String, html: String },
    ShowOverlay(OverlayPanel),
    MoveOverlay(f64),
    HideOverlay,
    Beacon(String),
    Event(TimelineEvent),
}

impl fmt::Display for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCall::SwitchSource(url) => write!(f, "switch source -> {}", url),
            HostCall::Seek(t) => write!(f, "seek {:.2}s", t),
            HostCall::NativeControls(on) => {
                write!(f, "native controls {}", if *on { "on" } else { "off" })
            }
            HostCall::OpenUrl(url) => write!(f, "open {}", url),
            HostCall::ShowHelper(kind, text) => write!(f, "show {:?} \"{}\"", kind, text),
            HostCall::UpdateHelper(kind, text) => write!(f, "update {:?} \"{}\"", kind, text),
            HostCall::RemoveHelper(kind) => write!(f, "remove {:?}", kind),
            HostCall::Companion { element_id, .. } => write!(f, "companion #{}", element_id),
            HostCall::ShowOverlay(panel) => {
                write!(f, "show overlay {}x{} at {}px", panel.width, panel.height, panel.bottom_px)
            }
            HostCall::MoveOverlay(bottom) => write!(f, "move overlay to {}px", bottom),
            HostCall::Beacon(url) => write!(f, "beacon {}", url),
            HostCall::Event(TimelineEvent::BreakStarted { slot, ad_id }) => {
                write!(f, "event break started {} ({})", slot, ad_id)
            }
            HostCall::Event(TimelineEvent::BreakCompleted { slot }) => {
                write!(f, "event break completed {}", slot)
            }
            HostCall::Event(TimelineEvent::CompanionUpdated { element_id, .. }) => {
                write!(f, "event companion updated #{}", element_id)
            }
            HostCall::Event(TimelineEvent::BeaconSent { event_name, .. }) => {
                write!(f, "event beacon sent {}", event_name)
            }
            other => write!(f, "{:?}", other),
        }
    }
}

/// Scriptable in-memory player.
#[derive(Debug)]
pub struct SimPlayer {
    source: String,
    time: f64,
    playing: bool,
    durations: HashMap<String, f64>,
    supported_types: Vec<String>,
    failing_sources: HashSet<String>,
    media_available: bool,
    control_bar: ControlBar,
    helpers: HashMap<HelperKind, Option<f64>>,
    overlay: Option<OverlayPanel>,
    calls: Vec<HostCall>,
}

impl SimPlayer {
    /// Player with `content` loaded, paused at 0.
    pub fn new(content: &str) -> Self {
        SimPlayer {
            source: content.to_string(),
            time: 0.0,
            playing: false,
            durations: HashMap::new(),
            supported_types: vec!["video/mp4".to_string(), "video/webm".to_string()],
            failing_sources: HashSet::new(),
            media_available: true,
            control_bar: ControlBar {
                visible: true,
                height: 30.0,
            },
            helpers: HashMap::new(),
            overlay: None,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Tracking and impression URLs in the order they were sent.
    pub fn beacons(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Beacon(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    /// Bottom offset a helper was shown with, if it is on screen.
    pub fn helper_bottom(&self, kind: HelperKind) -> Option<f64> {
        self.helpers.get(&kind).copied().flatten()
    }

    pub fn helper_visible(&self, kind: HelperKind) -> bool {
        self.helpers.contains_key(&kind)
    }

    pub fn overlay(&self) -> Option<&OverlayPanel> {
        self.overlay.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_duration(&mut self, url: &str, seconds: f64) {
        self.durations.insert(url.to_string(), seconds);
    }

    /// Make every switch to `url` fail.
    pub fn fail_source(&mut self, url: &str) {
        self.failing_sources.insert(url.to_string());
    }

    pub fn set_time(&mut self, seconds: f64) {
        self.time = seconds;
    }

    pub fn set_media_available(&mut self, available: bool) {
        self.media_available = available;
    }

    pub fn set_control_bar(&mut self, bar: ControlBar) {
        self.control_bar = bar;
    }

    /// Advance playback by `dt` seconds. Returns true on the step that reaches the end.
    pub fn advance_media(&mut self, dt: f64) -> bool {
        if !self.playing {
            return false;
        }
        self.time += dt;
        match self.duration() {
            Some(d) if self.time >= d => {
                self.time = d;
                self.playing = false;
                true
            }
            _ => false,
        }
    }
}

impl HostPlayer for SimPlayer {
    fn source(&self) -> String {
        self.source.clone()
    }

    fn switch_source(&mut self, url: &str) -> Result<(), HostError> {
        if !self.media_available {
            return Err(HostError::MediaUnavailable);
        }
        if self.failing_sources.contains(url) {
            return Err(HostError::SourceSwitch {
                url: url.to_string(),
                reason: "media error".to_string(),
            });
        }
        self.calls.push(HostCall::SwitchSource(url.to_string()));
        self.source = url.to_string();
        self.time = 0.0;
        self.playing = true;
        Ok(())
    }

    fn compatible_source(&self, files: &[VideoFile]) -> Option<String> {
        files
            .iter()
            .find(|f| self.supported_types.iter().any(|t| *t == f.content_type))
            .map(|f| f.src.clone())
    }

    fn play(&mut self) {
        self.playing = true;
        self.calls.push(HostCall::Play);
    }

    fn pause(&mut self) {
        self.playing = false;
        self.calls.push(HostCall::Pause);
    }

    fn stop(&mut self) {
        self.playing = false;
        self.time = 0.0;
        self.calls.push(HostCall::Stop);
    }

    fn seek(&mut self, seconds: f64) {
        self.time = seconds;
        self.calls.push(HostCall::Seek(seconds));
    }

    fn disable_seek(&mut self) {
        self.calls.push(HostCall::DisableSeek);
    }

    fn enable_seek(&mut self) {
        self.calls.push(HostCall::EnableSeek);
    }

    fn stop_event_propagation(&mut self) {
        self.calls.push(HostCall::StopPropagation);
    }

    fn restore_event_propagation(&mut self) {
        self.calls.push(HostCall::RestorePropagation);
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn duration(&self) -> Option<f64> {
        self.durations.get(&self.source).copied()
    }

    fn media_available(&self) -> bool {
        self.media_available
    }

    fn set_native_controls(&mut self, enabled: bool) {
        self.calls.push(HostCall::NativeControls(enabled));
    }

    fn control_bar(&self) -> ControlBar {
        self.control_bar
    }

    fn open_url(&mut self, url: &str) {
        self.calls.push(HostCall::OpenUrl(url.to_string()));
    }

    fn show_helper(
        &mut self,
        kind: HelperKind,
        text: &str,
        _css: &Map<String, Value>,
        bottom_px: Option<f64>,
    ) {
        self.helpers.insert(kind, bottom_px);
        self.calls.push(HostCall::ShowHelper(kind, text.to_string()));
    }

    fn update_helper(&mut self, kind: HelperKind, text: &str) {
        self.calls.push(HostCall::UpdateHelper(kind, text.to_string()));
    }

    fn remove_helper(&mut self, kind: HelperKind) {
        self.helpers.remove(&kind);
        self.calls.push(HostCall::RemoveHelper(kind));
    }

    fn render_companion(&mut self, element_id: &str, html: &str) {
        self.calls.push(HostCall::Companion {
            element_id: element_id.to_string(),
            html: html.to_string(),
        });
    }

    fn show_overlay(&mut self, panel: &OverlayPanel) {
        self.overlay = Some(panel.clone());
        self.calls.push(HostCall::ShowOverlay(panel.clone()));
    }

    fn move_overlay(&mut self, bottom_px: f64) {
        if let Some(panel) = self.overlay.as_mut() {
            panel.bottom_px = bottom_px;
        }
        self.calls.push(HostCall::MoveOverlay(bottom_px));
    }

    fn hide_overlay(&mut self) {
        self.overlay = None;
        self.calls.push(HostCall::HideOverlay);
    }

    fn send_beacon(&mut self, url: &str) {
        self.calls.push(HostCall::Beacon(url.to_string()));
    }

    fn emit(&mut self, event: TimelineEvent) {
        self.calls.push(HostCall::Event(event));
    }
}

/// Summary of a simulated session.
#[derive(Debug)]
pub struct SimReport {
    pub calls: Vec<HostCall>,
    pub breaks_started: Vec<(InsertionPoint, String)>,
    pub final_phase: Phase,
    /// Virtual time the session took.
    pub elapsed: Duration,
    /// Content position when the session ended.
    pub content_position: f64,
}

/// Fixed-step session driver.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub step: Duration,
    /// Content times at which a mid-roll cue fires.
    pub midroll_cues: Vec<f64>,
    /// Upper bound on loop iterations.
    pub max_steps: usize,
}

impl Default for Simulation {
    fn default() -> Self {
        Simulation {
            step: Duration::from_millis(250),
            midroll_cues: Vec::new(),
            max_steps: 100_000,
        }
    }
}

impl Simulation {
    /// Teach `host` the length of every ad clip in `file`.
    pub fn load_clip_lengths(host: &mut SimPlayer, file: &TimelineFile) {
        for entry in &file.breaks {
            for ad in &entry.config.ads {
                let secs = ad.duration_seconds.unwrap_or(DEFAULT_CLIP_SECONDS);
                for video in &ad.video_files {
                    host.set_duration(&video.src, secs);
                }
            }
        }
    }

    /// Press play and run until the session ends (postroll stop, or content
    /// end without a postroll).
    pub fn run(&self, timeline: &mut AdTimeline, host: &mut SimPlayer) -> SimReport {
        let content = host.source();
        let dt = self.step.as_secs_f64();
        let mut cues: Vec<f64> = self.midroll_cues.clone();
        cues.sort_by(f64::total_cmp);
        let mut cues = cues.into_iter().peekable();
        let mut content_position = 0.0;

        host.play();
        timeline.on_play(host);

        for _ in 0..self.max_steps {
            let ended = host.advance_media(dt);
            if host.source() == content {
                content_position = host.current_time();
            }
            timeline.advance(host, self.step);
            timeline.on_monitor_tick(host);

            if timeline.phase() == Phase::MainContent && host.source() == content {
                if let Some(&cue) = cues.peek() {
                    if host.current_time() >= cue {
                        cues.next();
                        debug!(cue, "Mid-roll cue");
                        timeline.play_midroll(host);
                    }
                }
            }

            if ended {
                let content_ended = host.source() == content;
                timeline.on_ended(host);
                if content_ended && timeline.phase() == Phase::MainContent {
                    break;
                }
            }
            if timeline.phase() == Phase::Restored && timeline.pending_tasks() == 0 {
                break;
            }
        }

        let calls = host.calls().to_vec();
        let breaks_started = calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Event(TimelineEvent::BreakStarted { slot, ad_id }) => {
                    Some((*slot, ad_id.clone()))
                }
                _ => None,
            })
            .collect();
        SimReport {
            calls,
            breaks_started,
            final_phase: timeline.phase(),
            elapsed: timeline.now(),
            content_position,
        }
    }
}
