//! VAST-style progress and lifecycle beacons for one ad play-through.
//!
//! Supported: start, firstQuartile, midpoint, complete, pause, resume, rewind.
//! Not supported (no signal from the media element): mute, unmute,
//! creativeView, fullscreen, expand, collapse, acceptInvitation, close.

use crate::ad_config::TrackingBeacon;
use crate::host::{HostPlayer, TimelineEvent};
use std::collections::HashSet;
use tracing::debug;

/// `complete` fires from the poll once `time > duration / COMPLETE_DIVISOR`.
///
/// This is 66% of the way through, not the end of the clip. Media end still
/// force-sends `complete`.
pub const COMPLETE_DIVISOR: f64 = 1.5;

/// Milestones the binder knows how to detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingEvent {
    Start,
    FirstQuartile,
    Midpoint,
    Complete,
    Pause,
    Resume,
    Rewind,
}

impl TrackingEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackingEvent::Start => "start",
            TrackingEvent::FirstQuartile => "firstQuartile",
            TrackingEvent::Midpoint => "midpoint",
            TrackingEvent::Complete => "complete",
            TrackingEvent::Pause => "pause",
            TrackingEvent::Resume => "resume",
            TrackingEvent::Rewind => "rewind",
        }
    }
}

/// Bound to the media element while it plays one ad candidate.
#[derive(Debug)]
pub struct TrackingBinder {
    beacons: Vec<TrackingBeacon>,
    sent: HashSet<TrackingEvent>,
    history: Vec<TrackingEvent>,
    last_time: f64,
    polling: bool,
}

impl TrackingBinder {
    pub fn new(beacons: Vec<TrackingBeacon>) -> Self {
        TrackingBinder {
            beacons,
            sent: HashSet::new(),
            history: Vec::new(),
            last_time: 0.0,
            polling: true,
        }
    }

    /// Events delivered so far, in order.
    pub fn history(&self) -> &[TrackingEvent] {
        &self.history
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Deliver `event` unless already sent (or `force`). Returns whether it was delivered.
    ///
    /// An event with no configured beacon is recorded but sends nothing.
    pub fn send<H: HostPlayer>(&mut self, host: &mut H, event: TrackingEvent, force: bool) -> bool {
        if self.sent.contains(&event) && !force {
            return false;
        }
        self.sent.insert(event);
        self.history.push(event);
        let name = event.as_str();
        for beacon in self.beacons.iter().filter(|b| b.event_name == name) {
            debug!(event = name, url = %beacon.beacon_url, "Sending tracking beacon");
            host.send_beacon(&beacon.beacon_url);
            host.emit(TimelineEvent::BeaconSent {
                event_name: name.to_string(),
                url: beacon.beacon_url.clone(),
            });
        }
        true
    }

    /// Media reached its end: force `complete` and stop polling.
    pub fn on_ended<H: HostPlayer>(&mut self, host: &mut H) {
        self.send(host, TrackingEvent::Complete, true);
        self.polling = false;
    }

    pub fn on_pause<H: HostPlayer>(&mut self, host: &mut H) {
        self.send(host, TrackingEvent::Pause, false);
    }

    pub fn on_resume<H: HostPlayer>(&mut self, host: &mut H) {
        self.send(host, TrackingEvent::Resume, false);
    }

    /// Seek landed at `time`; moving backwards is a rewind.
    pub fn on_seek<H: HostPlayer>(&mut self, host: &mut H, time: f64) {
        if time < self.last_time {
            self.send(host, TrackingEvent::Rewind, false);
        }
        self.last_time = time;
    }

    /// Periodic progress poll.
    pub fn on_tick<H: HostPlayer>(&mut self, host: &mut H, time: f64, duration: Option<f64>) {
        if !self.polling {
            return;
        }
        if time < self.last_time {
            self.send(host, TrackingEvent::Rewind, false);
        }
        self.last_time = time;

        if time > 0.0 {
            self.send(host, TrackingEvent::Start, false);
        }
        let Some(dur) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
            return;
        };
        if time > dur / 4.0 {
            self.send(host, TrackingEvent::FirstQuartile, false);
        }
        if time > dur / 2.0 {
            self.send(host, TrackingEvent::Midpoint, false);
        }
        if time > dur / COMPLETE_DIVISOR {
            self.send(host, TrackingEvent::Complete, false);
        }
    }
}
