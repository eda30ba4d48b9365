//! Playback orchestrator.
//!
//! `AdTimeline` reacts to the host player's lifecycle events (`play`,
//! `ended`, monitor ticks, clicks) and decides when each insertion point
//! fires. All waiting happens through the virtual-clock [`TimerQueue`]; the
//! embedder drives it with [`AdTimeline::advance`].

use crate::ad_config::{AdBreakConfig, OverlayTiming};
use crate::display::{DisplayController, DisplayOutcome, DoneCallback};
use crate::host::{ControlBar, HostPlayer};
use crate::registry::{BreakRef, TimelineRegistry};
use crate::selector::AdSelector;
use crate::settings::TimelineSettings;
use crate::slot::InsertionPoint;
use crate::timer::TimerQueue;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the session is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing registered yet.
    Idle,
    AwaitingFirstPlay,
    PrerollChain,
    Bumper,
    /// Content source switched back, waiting for the media element to settle.
    Restoring,
    MainContent,
    Midroll,
    Postroll,
    /// Session over; the player has been stopped.
    Restored,
}

/// Per-session bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    original_source: Option<String>,
    first_play_consumed: bool,
    postroll_displayed: bool,
}

impl SessionState {
    pub fn original_source(&self) -> Option<&str> {
        self.original_source.as_deref()
    }

    pub fn first_play_consumed(&self) -> bool {
        self.first_play_consumed
    }

    pub fn postroll_displayed(&self) -> bool {
        self.postroll_displayed
    }

    /// Record the content source. Only the first call has any effect.
    fn capture_original_source(&mut self, url: String) {
        if self.original_source.is_none() {
            debug!(source = %url, "Captured content source");
            self.original_source = Some(url);
        }
    }

    /// True exactly once.
    fn consume_first_play(&mut self) -> bool {
        !std::mem::replace(&mut self.first_play_consumed, true)
    }

    /// True exactly once.
    fn latch_postroll(&mut self) -> bool {
        !std::mem::replace(&mut self.postroll_displayed, true)
    }
}

/// Start/frequency gate for the overlay slot.
#[derive(Debug, Clone, Default)]
pub struct OverlayGate {
    enabled: bool,
    last_play_end: Option<f64>,
    has_played_start: bool,
}

impl OverlayGate {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_play_end(&self) -> Option<f64> {
        self.last_play_end
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn arm(&mut self) {
        self.enabled = true;
    }

    /// An overlay finished at media time `t`.
    fn complete(&mut self, t: f64) {
        self.last_play_end = Some(t);
    }

    /// Decide whether an overlay fires at media time `t`. Firing closes the
    /// gate until the overlay completes.
    fn evaluate(&mut self, t: f64, timing: &OverlayTiming) -> bool {
        let last_end = *self.last_play_end.get_or_insert(t);
        if !self.enabled {
            return false;
        }
        let fire = if self.has_played_start {
            t - last_end > timing.frequency
        } else {
            t >= timing.start
        };
        if fire {
            self.has_played_start = true;
            self.enabled = false;
        }
        fire
    }
}

/// Orchestrator continuations, run when a break's completion callback fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PrerollDone,
    BumperDone,
    OverlayDone,
    MidrollDone,
    PostrollDone,
}

/// Deferred work on the timeline clock.
#[derive(Debug)]
pub enum Task {
    /// A finished break's completion callback.
    Done(DoneCallback),
    /// Explicit-duration poll for display `id`.
    DurationPoll(u64),
    /// Resume content after the settle interval.
    Resume,
    /// Repeated pause after a postroll.
    Pause,
    Stop,
}

/// Ad timeline for one player session.
pub struct AdTimeline {
    settings: TimelineSettings,
    registry: TimelineRegistry,
    controller: DisplayController,
    session: SessionState,
    overlay: OverlayGate,
    phase: Phase,
    timers: TimerQueue<Task>,
}

impl AdTimeline {
    pub fn new(settings: TimelineSettings) -> Self {
        Self::with_selector(settings, AdSelector::new())
    }

    /// Timeline with a caller-provided selector (seeded for reproducible runs).
    pub fn with_selector(settings: TimelineSettings, selector: AdSelector) -> Self {
        AdTimeline {
            controller: DisplayController::new(settings.clone(), selector),
            settings,
            registry: TimelineRegistry::new(),
            session: SessionState::default(),
            overlay: OverlayGate::default(),
            phase: Phase::Idle,
            timers: TimerQueue::new(),
        }
    }

    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &TimelineRegistry {
        &self.registry
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn overlay_gate(&self) -> &OverlayGate {
        &self.overlay
    }

    /// The break currently on screen.
    pub fn active_break(&self) -> Option<BreakRef> {
        self.controller.active()
    }

    /// Id of the ad candidate currently on screen.
    pub fn active_ad(&self) -> Option<&str> {
        self.controller.active_ad()
    }

    /// Whether an ad clip currently occupies the media element.
    pub fn is_ad_playing(&self) -> bool {
        self.controller.is_playing_ad_media()
    }

    /// Virtual time elapsed since the timeline was created.
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn pending_tasks(&self) -> usize {
        self.timers.len()
    }

    /// Register a break against `slot`.
    pub fn register_ad_break(&mut self, slot: InsertionPoint, config: AdBreakConfig) {
        self.registry.register(slot, config);
        if self.phase == Phase::Idle {
            self.phase = Phase::AwaitingFirstPlay;
        }
    }

    /// Register by slot name. Unknown names are ignored; returns whether the break was added.
    pub fn register_named(&mut self, slot: &str, config: AdBreakConfig) -> bool {
        match InsertionPoint::from_str_loose(slot) {
            Some(slot) => {
                self.register_ad_break(slot, config);
                true
            }
            None => self.registry.register_named(slot, config),
        }
    }

    /// Display the pending break of `slot` outside the automatic sequencing.
    ///
    /// With nothing to show, `on_done` runs before this returns. Otherwise it
    /// runs once the break finishes, after the content source is back in place.
    pub fn display<H: HostPlayer>(
        &mut self,
        host: &mut H,
        slot: InsertionPoint,
        on_done: impl FnOnce() + 'static,
        duration: Option<f64>,
    ) {
        let content = self
            .session
            .original_source()
            .map(str::to_string)
            .unwrap_or_else(|| host.source());
        let outcome = self.controller.display(
            &mut self.registry,
            host,
            &mut self.timers,
            slot,
            DoneCallback::External(Box::new(on_done)),
            duration,
            Some(&content),
        );
        match outcome {
            DisplayOutcome::NothingToShow(cb) => self.run_now(host, cb),
            DisplayOutcome::Started => self.session.capture_original_source(content),
            DisplayOutcome::AlreadyDisplayed => {}
        }
    }

    /// Cue point: play the next pending mid-roll. Only honoured during main content.
    pub fn play_midroll<H: HostPlayer>(&mut self, host: &mut H) -> bool {
        if self.phase != Phase::MainContent || !self.registry.has_pending(InsertionPoint::Midroll) {
            debug!(phase = ?self.phase, "Mid-roll cue ignored");
            return false;
        }
        info!("Mid-roll cue point reached");
        self.suspend_content(host);
        self.phase = Phase::Midroll;
        self.show(host, InsertionPoint::Midroll, Step::MidrollDone, None);
        true
    }

    /// Host `play` event. Only the first one after registration starts the sequence.
    pub fn on_play<H: HostPlayer>(&mut self, host: &mut H) {
        if self.phase == Phase::Idle {
            return;
        }
        if !self.session.consume_first_play() {
            return;
        }
        info!("First play, starting ad sequence");
        self.session.capture_original_source(host.source());
        self.suspend_content(host);
        self.phase = Phase::PrerollChain;
        self.next_preroll(host);
    }

    /// Host `ended` event for whatever the media element is playing.
    pub fn on_ended<H: HostPlayer>(&mut self, host: &mut H) {
        if self
            .controller
            .on_media_ended(&mut self.registry, host, &mut self.timers)
        {
            return;
        }
        if !self.registry.has_pending(InsertionPoint::Postroll) {
            return;
        }
        if !self.session.latch_postroll() {
            debug!("Postroll already shown, ignoring ended");
            return;
        }
        info!("Content ended, showing postroll");
        self.suspend_content(host);
        self.phase = Phase::Postroll;
        self.show(host, InsertionPoint::Postroll, Step::PostrollDone, None);
    }

    /// Host monitor tick.
    pub fn on_monitor_tick<H: HostPlayer>(&mut self, host: &mut H) {
        self.controller.on_tick(host);
        if self.phase != Phase::MainContent {
            return;
        }
        let Some(timing) = self.overlay_timing() else {
            return;
        };
        let t = host.current_time();
        if self.overlay.evaluate(t, &timing) {
            debug!(time = t, "Overlay window open");
            self.show(host, InsertionPoint::Overlay, Step::OverlayDone, timing.timeout);
        }
    }

    pub fn on_pause<H: HostPlayer>(&mut self, host: &mut H) {
        self.controller.on_media_pause(host);
    }

    pub fn on_resume<H: HostPlayer>(&mut self, host: &mut H) {
        self.controller.on_media_resume(host);
    }

    pub fn on_seek<H: HostPlayer>(&mut self, host: &mut H, time: f64) {
        self.controller.on_media_seek(host, time);
    }

    /// Click on the player surface; returns true if it opened a click-through.
    pub fn on_click<H: HostPlayer>(&mut self, host: &mut H) -> bool {
        self.controller.on_click(host)
    }

    pub fn on_skip<H: HostPlayer>(&mut self, host: &mut H) -> bool {
        self.controller
            .on_skip(&mut self.registry, host, &mut self.timers)
    }

    pub fn on_overlay_close<H: HostPlayer>(&mut self, host: &mut H) {
        self.controller.on_overlay_close(host);
    }

    /// Control bar shown or hidden.
    pub fn on_control_bar<H: HostPlayer>(&mut self, host: &mut H, bar: ControlBar) {
        self.controller.on_control_bar(host, bar);
    }

    /// Move the timeline clock forward and run everything that came due.
    pub fn advance<H: HostPlayer>(&mut self, host: &mut H, elapsed: Duration) {
        self.timers.advance(elapsed);
        while let Some(task) = self.timers.pop_due() {
            self.run_task(host, task);
        }
    }

    fn run_task<H: HostPlayer>(&mut self, host: &mut H, task: Task) {
        match task {
            Task::Done(cb) => self.finish(host, cb),
            Task::DurationPoll(id) => {
                self.controller
                    .poll_duration(id, &mut self.registry, host, &mut self.timers)
            }
            Task::Resume => {
                if self.phase == Phase::Restoring {
                    self.resume(host);
                }
            }
            Task::Pause => host.pause(),
            Task::Stop => {
                info!("Stopping player after postroll");
                host.stop();
            }
        }
    }

    /// Completion callback of a break that actually displayed.
    fn finish<H: HostPlayer>(&mut self, host: &mut H, cb: DoneCallback) {
        match cb {
            DoneCallback::Step(step) => self.run_step(host, step),
            DoneCallback::External(f) => {
                // A pre-empted break must not pull the source from under its successor.
                if self.controller.active().is_none() && self.restore_source(host) {
                    if let Some(pos) = self.controller.take_resume_point().filter(|p| *p > 0.0) {
                        host.seek(pos);
                    }
                }
                f();
            }
        }
    }

    /// Nothing was shown: continue right away.
    fn run_now<H: HostPlayer>(&mut self, host: &mut H, cb: DoneCallback) {
        match cb {
            DoneCallback::Step(step) => self.run_step(host, step),
            DoneCallback::External(f) => f(),
        }
    }

    fn run_step<H: HostPlayer>(&mut self, host: &mut H, step: Step) {
        debug!(step = ?step, "Break finished");
        match step {
            Step::PrerollDone => {
                self.registry.advance_cursor(InsertionPoint::Preroll);
                self.next_preroll(host);
            }
            Step::BumperDone => {
                self.overlay.arm();
                self.restore_and_resume(host);
            }
            Step::OverlayDone => {
                // A break that pre-empted the overlay may own the media
                // element; the gate runs on the content clock.
                let end = if self.phase == Phase::MainContent {
                    host.current_time()
                } else {
                    self.controller
                        .resume_point()
                        .unwrap_or_else(|| host.current_time())
                };
                self.overlay.complete(end);
                if self.phase == Phase::MainContent {
                    self.overlay.arm();
                }
            }
            Step::MidrollDone => {
                self.registry.advance_cursor(InsertionPoint::Midroll);
                self.overlay.arm();
                self.restore_and_resume(host);
            }
            Step::PostrollDone => self.finish_postroll(host),
        }
    }

    fn show<H: HostPlayer>(
        &mut self,
        host: &mut H,
        slot: InsertionPoint,
        step: Step,
        duration: Option<f64>,
    ) {
        let content = self.session.original_source.clone();
        let outcome = self.controller.display(
            &mut self.registry,
            host,
            &mut self.timers,
            slot,
            DoneCallback::Step(step),
            duration,
            content.as_deref(),
        );
        if let DisplayOutcome::NothingToShow(cb) = outcome {
            self.run_now(host, cb);
        }
    }

    fn next_preroll<H: HostPlayer>(&mut self, host: &mut H) {
        if self.registry.has_pending(InsertionPoint::Preroll) {
            debug!(index = self.registry.cursor(InsertionPoint::Preroll), "Next preroll");
            self.show(host, InsertionPoint::Preroll, Step::PrerollDone, None);
        } else {
            self.phase = Phase::Bumper;
            self.show(host, InsertionPoint::Bumper, Step::BumperDone, None);
        }
    }

    /// Hold content while a linear break runs.
    fn suspend_content<H: HostPlayer>(&mut self, host: &mut H) {
        self.overlay.disable();
        host.stop_event_propagation();
        host.disable_seek();
    }

    /// Switch back to the content source if an ad replaced it. Returns whether a switch happened.
    fn restore_source<H: HostPlayer>(&mut self, host: &mut H) -> bool {
        let Some(original) = self.session.original_source.clone() else {
            return false;
        };
        if host.source() == original {
            return false;
        }
        info!(source = %original, "Restoring content source");
        if let Err(e) = host.switch_source(&original) {
            warn!("Could not restore content source: {}", e);
        }
        true
    }

    fn restore_and_resume<H: HostPlayer>(&mut self, host: &mut H) {
        if self.restore_source(host) {
            self.phase = Phase::Restoring;
            self.timers.schedule(self.settings.settle_delay(), Task::Resume);
        } else {
            self.controller.take_resume_point();
            self.resume(host);
        }
    }

    fn resume<H: HostPlayer>(&mut self, host: &mut H) {
        host.restore_event_propagation();
        host.enable_seek();
        if let Some(pos) = self.controller.take_resume_point().filter(|p| *p > 0.0) {
            debug!(position = pos, "Seeking back into content");
            host.seek(pos);
        }
        host.play();
        self.phase = Phase::MainContent;
        info!("Main content resumed");
    }

    fn finish_postroll<H: HostPlayer>(&mut self, host: &mut H) {
        self.restore_source(host);
        host.enable_seek();
        host.restore_event_propagation();
        host.pause();
        self.timers.schedule(self.settings.settle_delay(), Task::Pause);
        self.timers.schedule(self.settings.stop_delay(), Task::Stop);
        self.phase = Phase::Restored;
    }

    fn overlay_timing(&self) -> Option<OverlayTiming> {
        let at = self.registry.current_ref(InsertionPoint::Overlay)?;
        self.registry.get(at).map(|b| b.config.overlay_timing())
    }
}
