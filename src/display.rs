//! Display life cycle of a single ad break.
//!
//! `DisplayController` swaps the media source to the selected candidate,
//! renders companions, overlay panel and helper UI, binds tracking, and
//! funnels every way a break can end (media end, duration timeout, skip
//! click, pre-emption, failures) through [`DisplayController::playback_done`].

use crate::ad_config::{AdBreakConfig, AdCandidate, HelperConfig};
use crate::host::{ControlBar, HelperKind, HostPlayer, OverlayPanel, TimelineEvent};
use crate::registry::{BreakRef, TimelineRegistry};
use crate::selector::AdSelector;
use crate::settings::TimelineSettings;
use crate::slot::InsertionPoint;
use crate::timeline::{Step, Task};
use crate::timer::TimerQueue;
use crate::tracking::TrackingBinder;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// What to run once a break has finished.
pub enum DoneCallback {
    /// Continue the orchestrator's state machine.
    Step(Step),
    /// Caller-supplied continuation.
    External(Box<dyn FnOnce()>),
}

impl fmt::Debug for DoneCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoneCallback::Step(step) => write!(f, "Step({:?})", step),
            DoneCallback::External(_) => f.write_str("External(..)"),
        }
    }
}

/// Result of a display request.
#[derive(Debug)]
pub enum DisplayOutcome {
    /// Nothing to show; the callback is handed back to be run right away.
    NothingToShow(DoneCallback),
    /// The break under the cursor is already on screen; request ignored.
    AlreadyDisplayed,
    /// The break is now displayed (it may already be finishing if playback failed).
    Started,
}

/// Subscriptions held by the active display, released at completion.
#[derive(Debug)]
enum Binding {
    /// One-shot click-through on the player surface.
    ClickThrough { url: String, clicked: bool },
    /// Media events of the swapped-in ad clip.
    Media(TrackingBinder),
    Notice(HelperConfig),
    SkipButton,
    /// Overlay panel follows control bar show/hide.
    OverlayLayout { visible: bool },
}

/// Teardown steps registered during display, run in order at completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cleanup {
    HideOverlay,
    RestoreControls,
}

#[derive(Debug)]
struct ActiveDisplay {
    id: u64,
    at: BreakRef,
    ad_id: String,
    /// Position of the playing element when the break took hold of it,
    /// for explicit durations.
    started_at: f64,
    duration: Option<f64>,
    bindings: Vec<Binding>,
    cleanups: Vec<Cleanup>,
    on_done: DoneCallback,
}

impl ActiveDisplay {
    fn media_mut(&mut self) -> Option<&mut TrackingBinder> {
        self.bindings.iter_mut().find_map(|b| match b {
            Binding::Media(binder) => Some(binder),
            _ => None,
        })
    }

    fn release_click_through(&mut self) {
        self.bindings
            .retain(|b| !matches!(b, Binding::ClickThrough { .. }));
    }
}

/// Drives one ad break at a time through its display life cycle.
pub struct DisplayController {
    settings: TimelineSettings,
    selector: AdSelector,
    active: Option<ActiveDisplay>,
    next_id: u64,
    resume_point: Option<f64>,
}

impl DisplayController {
    pub fn new(settings: TimelineSettings, selector: AdSelector) -> Self {
        DisplayController {
            settings,
            selector,
            active: None,
            next_id: 1,
            resume_point: None,
        }
    }

    /// The break currently on screen.
    pub fn active(&self) -> Option<BreakRef> {
        self.active.as_ref().map(|a| a.at)
    }

    /// Id of the candidate currently on screen.
    pub fn active_ad(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.ad_id.as_str())
    }

    /// Whether the active break has swapped in its own media clip.
    pub fn is_playing_ad_media(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.bindings.iter().any(|b| matches!(b, Binding::Media(_))))
    }

    /// Content position recorded when an ad last replaced the content source.
    pub fn resume_point(&self) -> Option<f64> {
        self.resume_point
    }

    /// Like [`resume_point`](Self::resume_point), clearing it.
    pub fn take_resume_point(&mut self) -> Option<f64> {
        self.resume_point.take()
    }

    /// Display the pending break for `slot`.
    ///
    /// `content_source` is the main content URL, used to remember where
    /// content was interrupted when the source is swapped.
    #[allow(clippy::too_many_arguments)]
    pub fn display<H: HostPlayer>(
        &mut self,
        registry: &mut TimelineRegistry,
        host: &mut H,
        timers: &mut TimerQueue<Task>,
        slot: InsertionPoint,
        on_done: DoneCallback,
        duration: Option<f64>,
        content_source: Option<&str>,
    ) -> DisplayOutcome {
        debug!(slot = %slot, "Display requested");
        let Some(at) = registry.current_ref(slot) else {
            debug!(slot = %slot, "No break registered, passing through");
            return DisplayOutcome::NothingToShow(on_done);
        };
        let Some(entry) = registry.get(at) else {
            return DisplayOutcome::NothingToShow(on_done);
        };
        if entry.runtime.currently_displayed {
            debug!(slot = %slot, "Break already displayed");
            return DisplayOutcome::AlreadyDisplayed;
        }
        let config: AdBreakConfig = entry.config.clone();
        let Some(candidate) = self.selector.pick(&config.ads).cloned() else {
            debug!(slot = %slot, "Empty pod, passing through");
            return DisplayOutcome::NothingToShow(on_done);
        };
        if duration.is_none() && !candidate.has_video() {
            debug!(slot = %slot, ad = %candidate.id, "No duration and no video, passing through");
            return DisplayOutcome::NothingToShow(on_done);
        }

        // Only one break may be on screen.
        if let Some(other) = self.active() {
            info!(slot = %slot, preempted = %other.slot, "Pre-empting displayed break");
            self.playback_done(registry, host, timers);
        }

        let id = self.next_id;
        self.next_id += 1;
        if let Some(entry) = registry.get_mut(at) {
            entry.runtime.currently_displayed = true;
        }
        info!(slot = %slot, ad = %candidate.id, "Ad break started");
        host.emit(TimelineEvent::BreakStarted {
            slot,
            ad_id: candidate.id.clone(),
        });
        self.active = Some(ActiveDisplay {
            id,
            at,
            ad_id: candidate.id.clone(),
            started_at: host.current_time(),
            duration,
            bindings: Vec::new(),
            cleanups: Vec::new(),
            on_done,
        });

        if duration.is_some() {
            timers.schedule(self.settings.monitor_rate(), Task::DurationPoll(id));
        }

        if slot.swaps_source() && candidate.has_video() {
            self.play_video(registry, host, timers, &config, &candidate, content_source);
        }
        if self.is_current(id) {
            self.show_companions(host, &config, &candidate);
        }
        if slot == InsertionPoint::Overlay && self.is_current(id) {
            self.show_non_linear(host, &candidate);
        }
        if self.is_current(id) {
            for url in &candidate.impressions {
                debug!(ad = %candidate.id, url = %url, "Sending impression");
                host.send_beacon(url);
            }
        }
        DisplayOutcome::Started
    }

    fn is_current(&self, id: u64) -> bool {
        self.active.as_ref().is_some_and(|a| a.id == id)
    }

    fn play_video<H: HostPlayer>(
        &mut self,
        registry: &mut TimelineRegistry,
        host: &mut H,
        timers: &mut TimerQueue<Task>,
        config: &AdBreakConfig,
        candidate: &AdCandidate,
        content_source: Option<&str>,
    ) {
        let Some(src) = host.compatible_source(&candidate.video_files) else {
            warn!(ad = %candidate.id, "No compatible video source, skipping ad");
            self.playback_done(registry, host, timers);
            return;
        };
        debug!(ad = %candidate.id, src = %src, "Switching to ad source");

        let Some(active) = self.active.as_mut() else {
            return;
        };
        if candidate.lock_ui {
            host.set_native_controls(false);
            active.cleanups.push(Cleanup::RestoreControls);
        }
        if let Some(url) = &candidate.click_through {
            active.bindings.push(Binding::ClickThrough {
                url: url.clone(),
                clicked: false,
            });
        }
        if content_source.is_some_and(|content| host.source() == content) {
            self.resume_point = Some(host.current_time());
        }

        if let Err(e) = host.switch_source(&src) {
            warn!(ad = %candidate.id, "Ad playback failed: {}", e);
            if let Some(active) = self.active.as_mut() {
                active.release_click_through();
            }
            self.playback_done(registry, host, timers);
            return;
        }

        let bar = host.control_bar();
        let remaining = remaining_time(host);
        let Some(active) = self.active.as_mut() else {
            return;
        };
        // The ad clip restarts the media clock.
        active.started_at = host.current_time();
        active.bindings.push(Binding::Media(TrackingBinder::new(
            candidate.tracking_events.clone(),
        )));
        if let Some(notice) = &config.notice {
            host.show_helper(HelperKind::Notice, &notice.render(remaining), &notice.css, None);
            active.bindings.push(Binding::Notice(notice.clone()));
        }
        if let Some(skip) = &config.skip_btn {
            // Keep the skip link clear of the control bar.
            let bottom = skip.bottom_px().map(|b| b + bar.height);
            host.show_helper(HelperKind::SkipButton, &skip.text, &skip.css, bottom);
            active.bindings.push(Binding::SkipButton);
        }
    }

    fn show_companions<H: HostPlayer>(
        &mut self,
        host: &mut H,
        config: &AdBreakConfig,
        candidate: &AdCandidate,
    ) {
        if candidate.companions.is_empty() || config.companion_targets.is_empty() {
            return;
        }
        let mut filled: HashSet<&str> = HashSet::new();
        for companion in &candidate.companions {
            for target in &config.companion_targets {
                if target.width != companion.width || target.height != companion.height {
                    continue;
                }
                if !filled.insert(target.element_id.as_str()) {
                    continue;
                }
                debug!(element = %target.element_id, "Rendering companion");
                host.render_companion(&target.element_id, &companion.html);
                host.emit(TimelineEvent::CompanionUpdated {
                    element_id: target.element_id.clone(),
                    html: companion.html.clone(),
                });
            }
        }
    }

    fn show_non_linear<H: HostPlayer>(&mut self, host: &mut H, candidate: &AdCandidate) {
        let Some(creative) = self.selector.pick(&candidate.non_linear) else {
            return;
        };
        let panel = OverlayPanel {
            width: creative.width,
            height: creative.height,
            html: creative.html.clone(),
            bottom_px: overlay_bottom(host.control_bar(), self.settings.overlay_offset_px),
            margin_left_px: -(creative.width as f64 / 2.0),
        };
        host.show_overlay(&panel);
        if let Some(active) = self.active.as_mut() {
            active.bindings.push(Binding::OverlayLayout { visible: true });
            active.cleanups.push(Cleanup::HideOverlay);
        }
    }

    /// Single completion funnel: tear down UI, run cleanups, clear the
    /// displayed flag, then schedule the done callback.
    pub fn playback_done<H: HostPlayer>(
        &mut self,
        registry: &mut TimelineRegistry,
        host: &mut H,
        timers: &mut TimerQueue<Task>,
    ) {
        let Some(active) = self.active.take() else {
            return;
        };
        for binding in &active.bindings {
            match binding {
                Binding::Notice(_) => host.remove_helper(HelperKind::Notice),
                Binding::SkipButton => host.remove_helper(HelperKind::SkipButton),
                _ => {}
            }
        }
        for cleanup in &active.cleanups {
            match cleanup {
                Cleanup::HideOverlay => host.hide_overlay(),
                Cleanup::RestoreControls => host.set_native_controls(true),
            }
        }
        if let Some(entry) = registry.get_mut(active.at) {
            entry.runtime.currently_displayed = false;
        }
        info!(slot = %active.at.slot, ad = %active.ad_id, "Ad break finished");
        host.emit(TimelineEvent::BreakCompleted {
            slot: active.at.slot,
        });
        timers.schedule(self.settings.done_delay(), Task::Done(active.on_done));
    }

    /// Explicit-duration poll. Ends the break once the duration has elapsed
    /// or the media element is gone; otherwise re-arms itself.
    pub fn poll_duration<H: HostPlayer>(
        &mut self,
        id: u64,
        registry: &mut TimelineRegistry,
        host: &mut H,
        timers: &mut TimerQueue<Task>,
    ) {
        let Some(active) = self.active.as_ref().filter(|a| a.id == id) else {
            return;
        };
        let limit = active.duration.unwrap_or(0.0);
        if !host.media_available() {
            debug!(ad = %active.ad_id, "Media element gone, ending break");
            self.playback_done(registry, host, timers);
        } else if host.current_time() - active.started_at > limit {
            debug!(ad = %active.ad_id, limit, "Display duration reached");
            self.playback_done(registry, host, timers);
        } else {
            timers.schedule(self.settings.monitor_rate(), Task::DurationPoll(id));
        }
    }

    /// Monitor tick: feed the tracking poll and refresh the countdown notice.
    pub fn on_tick<H: HostPlayer>(&mut self, host: &mut H) {
        let time = host.current_time();
        let duration = host.duration();
        let remaining = remaining_time(host);
        let Some(active) = self.active.as_mut() else {
            return;
        };
        for binding in active.bindings.iter_mut() {
            match binding {
                Binding::Media(binder) => binder.on_tick(host, time, duration),
                Binding::Notice(notice) => {
                    host.update_helper(HelperKind::Notice, &notice.render(remaining))
                }
                _ => {}
            }
        }
    }

    /// The media element ended. Returns true if it was the ad clip.
    pub fn on_media_ended<H: HostPlayer>(
        &mut self,
        registry: &mut TimelineRegistry,
        host: &mut H,
        timers: &mut TimerQueue<Task>,
    ) -> bool {
        let Some(binder) = self.active.as_mut().and_then(|a| a.media_mut()) else {
            return false;
        };
        binder.on_ended(host);
        self.playback_done(registry, host, timers);
        true
    }

    pub fn on_media_pause<H: HostPlayer>(&mut self, host: &mut H) {
        if let Some(binder) = self.active.as_mut().and_then(|a| a.media_mut()) {
            binder.on_pause(host);
        }
    }

    pub fn on_media_resume<H: HostPlayer>(&mut self, host: &mut H) {
        if let Some(binder) = self.active.as_mut().and_then(|a| a.media_mut()) {
            binder.on_resume(host);
        }
    }

    pub fn on_media_seek<H: HostPlayer>(&mut self, host: &mut H, time: f64) {
        if let Some(binder) = self.active.as_mut().and_then(|a| a.media_mut()) {
            binder.on_seek(host, time);
        }
    }

    /// Click on the player surface. Opens the click-through the first time;
    /// returns true if the click was consumed.
    pub fn on_click<H: HostPlayer>(&mut self, host: &mut H) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        for binding in active.bindings.iter_mut() {
            if let Binding::ClickThrough { url, clicked } = binding {
                if *clicked {
                    return false;
                }
                *clicked = true;
                info!(url = %url, "Opening click-through");
                host.open_url(url);
                return true;
            }
        }
        false
    }

    /// Skip button clicked. Returns true if a skippable break was ended.
    pub fn on_skip<H: HostPlayer>(
        &mut self,
        registry: &mut TimelineRegistry,
        host: &mut H,
        timers: &mut TimerQueue<Task>,
    ) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if !active.bindings.iter().any(|b| matches!(b, Binding::SkipButton)) {
            return false;
        }
        info!(ad = %active.ad_id, "Ad skipped");
        active.release_click_through();
        self.playback_done(registry, host, timers);
        true
    }

    /// Close affordance on the overlay panel: hide it, the break keeps running.
    pub fn on_overlay_close<H: HostPlayer>(&mut self, host: &mut H) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        for binding in active.bindings.iter_mut() {
            if let Binding::OverlayLayout { visible } = binding {
                if *visible {
                    *visible = false;
                    host.hide_overlay();
                }
            }
        }
    }

    /// Control bar shown or hidden: move the overlay panel with it.
    pub fn on_control_bar<H: HostPlayer>(&mut self, host: &mut H, bar: ControlBar) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let visible_panel = active
            .bindings
            .iter()
            .any(|b| matches!(b, Binding::OverlayLayout { visible: true }));
        if visible_panel {
            host.move_overlay(overlay_bottom(bar, self.settings.overlay_offset_px));
        }
    }
}

/// Seconds left in the loaded media, when its duration is known.
fn remaining_time<H: HostPlayer>(host: &H) -> Option<f64> {
    host.duration().map(|d| d - host.current_time())
}

fn overlay_bottom(bar: ControlBar, offset: f64) -> f64 {
    if bar.visible { bar.height + offset } else { offset }
}
