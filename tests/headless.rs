//! Headless integration tests for ad_timeline.
//!
//! These tests drive AdTimeline end-to-end against the in-memory SimPlayer,
//! forwarding player events by hand and pumping the virtual clock.

use ad_timeline::ad_config::{AdBreakConfig, AdCandidate, CompanionTarget, Creative, HelperConfig};
use ad_timeline::host::{HelperKind, HostPlayer, TimelineEvent};
use ad_timeline::selector::AdSelector;
use ad_timeline::settings::{BreakEntry, TimelineFile, TimelineSettings};
use ad_timeline::sim::{HostCall, SimPlayer, Simulation};
use ad_timeline::slot::InsertionPoint;
use ad_timeline::timeline::{AdTimeline, Phase};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

const CONTENT: &str = "content.mp4";

fn make_timeline() -> AdTimeline {
    AdTimeline::with_selector(TimelineSettings::default(), AdSelector::with_seed(7))
}

fn make_host() -> SimPlayer {
    let mut host = SimPlayer::new(CONTENT);
    host.set_duration(CONTENT, 120.0);
    host
}

fn video_break(id: &str) -> AdBreakConfig {
    AdBreakConfig::new(vec![AdCandidate::new(id).with_video(&format!("{}.mp4", id), "video/mp4")])
}

fn overlay_break(start: f64, frequency: f64, timeout: f64) -> AdBreakConfig {
    let mut ad = AdCandidate::new("banner");
    ad.non_linear.push(Creative {
        width: 320,
        height: 50,
        html: "<a>banner</a>".into(),
    });
    let mut cfg = AdBreakConfig::new(vec![ad]);
    cfg.start = Some(start);
    cfg.frequency = Some(frequency);
    cfg.timeout = Some(timeout);
    cfg
}

/// Advance the timeline clock in 10 ms steps.
fn pump(timeline: &mut AdTimeline, host: &mut SimPlayer, ms: u64) {
    for _ in 0..ms / 10 {
        timeline.advance(host, Duration::from_millis(10));
    }
}

fn switches(host: &SimPlayer) -> Vec<String> {
    host.calls()
        .iter()
        .filter_map(|c| match c {
            HostCall::SwitchSource(url) => Some(url.clone()),
            _ => None,
        })
        .collect()
}

fn started(host: &SimPlayer, slot: InsertionPoint) -> usize {
    host.count(|c| match c {
        HostCall::Event(TimelineEvent::BreakStarted { slot: s, .. }) => *s == slot,
        _ => false,
    })
}

fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    (count, move || c.set(c.get() + 1))
}

// ── Pass-through contract ─────────────────────────────────────────────────

#[test]
fn empty_slots_invoke_callback_synchronously() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    for slot in InsertionPoint::ALL {
        let (count, done) = counter();
        timeline.display(&mut host, slot, done, None);
        assert_eq!(count.get(), 1, "{} callback", slot);
    }
    assert!(host.calls().is_empty());
    assert_eq!(timeline.pending_tasks(), 0);
    assert!(timeline.session().original_source().is_none());
}

#[test]
fn play_without_registrations_is_ignored() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.on_play(&mut host);
    timeline.on_ended(&mut host);
    assert_eq!(timeline.phase(), Phase::Idle);
    assert!(host.calls().is_empty());
}

// ── Sequencing ────────────────────────────────────────────────────────────

#[test]
fn preroll_chain_then_bumper_resumes_once() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Preroll, video_break("pre1"));
    timeline.register_ad_break(InsertionPoint::Preroll, video_break("pre2"));
    timeline.register_ad_break(InsertionPoint::Bumper, video_break("bump"));

    timeline.on_play(&mut host);
    assert_eq!(timeline.phase(), Phase::PrerollChain);
    assert_eq!(host.source(), "pre1.mp4");
    assert_eq!(timeline.session().original_source(), Some(CONTENT));
    assert!(host.calls().contains(&HostCall::StopPropagation));
    assert!(host.calls().contains(&HostCall::DisableSeek));

    // A second play while ads run changes nothing.
    timeline.on_play(&mut host);
    assert_eq!(switches(&host).len(), 1);

    timeline.on_ended(&mut host);
    pump(&mut timeline, &mut host, 50);
    assert_eq!(timeline.registry().cursor(InsertionPoint::Preroll), 1);
    assert_eq!(host.source(), "pre2.mp4");

    timeline.on_ended(&mut host);
    pump(&mut timeline, &mut host, 50);
    assert_eq!(timeline.registry().cursor(InsertionPoint::Preroll), 2);
    assert_eq!(timeline.phase(), Phase::Bumper);
    assert_eq!(host.source(), "bump.mp4");

    timeline.on_ended(&mut host);
    pump(&mut timeline, &mut host, 50);
    assert_eq!(timeline.phase(), Phase::Restoring);
    assert_eq!(host.source(), CONTENT);
    assert_eq!(host.count(|c| *c == HostCall::Play), 0);

    pump(&mut timeline, &mut host, 100);
    assert_eq!(timeline.phase(), Phase::MainContent);
    assert_eq!(switches(&host), vec!["pre1.mp4", "pre2.mp4", "bump.mp4", CONTENT]);
    assert_eq!(host.count(|c| *c == HostCall::Play), 1);
    assert!(host.calls().contains(&HostCall::RestorePropagation));
    assert!(host.calls().contains(&HostCall::EnableSeek));

    pump(&mut timeline, &mut host, 1000);
    assert_eq!(host.count(|c| *c == HostCall::Play), 1);
}

#[test]
fn no_linear_breaks_resume_without_switching() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Midroll, video_break("mid"));
    timeline.on_play(&mut host);
    assert_eq!(timeline.phase(), Phase::MainContent);
    assert!(switches(&host).is_empty());
    assert_eq!(host.count(|c| *c == HostCall::Play), 1);
}

#[test]
fn failed_preroll_does_not_block_content() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    let mut cfg = video_break("broken");
    cfg.ads[0].click_through = Some("https://advertiser".into());
    host.fail_source("broken.mp4");
    timeline.register_ad_break(InsertionPoint::Preroll, cfg);

    timeline.on_play(&mut host);
    assert!(timeline.active_break().is_none());
    assert!(!timeline.on_click(&mut host));
    pump(&mut timeline, &mut host, 50);
    assert_eq!(timeline.phase(), Phase::MainContent);
    assert_eq!(host.source(), CONTENT);
    assert_eq!(timeline.registry().cursor(InsertionPoint::Preroll), 1);
}

#[test]
fn skip_ends_preroll_early() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    let mut cfg = video_break("long");
    cfg.skip_btn = Some(HelperConfig::new("Skip"));
    timeline.register_ad_break(InsertionPoint::Preroll, cfg);

    timeline.on_play(&mut host);
    assert!(host.helper_visible(HelperKind::SkipButton));
    assert!(timeline.on_skip(&mut host));
    assert!(!host.helper_visible(HelperKind::SkipButton));
    pump(&mut timeline, &mut host, 150);
    assert_eq!(timeline.phase(), Phase::MainContent);
    assert_eq!(host.source(), CONTENT);
}

#[test]
fn click_through_opens_once_per_break() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    let mut cfg = video_break("clicky");
    cfg.ads[0].click_through = Some("https://advertiser".into());
    timeline.register_ad_break(InsertionPoint::Preroll, cfg);

    timeline.on_play(&mut host);
    assert!(timeline.on_click(&mut host));
    assert!(!timeline.on_click(&mut host));
    assert_eq!(host.count(|c| *c == HostCall::OpenUrl("https://advertiser".into())), 1);
}

// ── Mutual exclusion & restoration ────────────────────────────────────────

#[test]
fn only_one_break_displayed_at_a_time() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Overlay, overlay_break(0.0, 30.0, 10.0));
    timeline.register_ad_break(InsertionPoint::Midroll, video_break("mid"));

    let (overlay_done, done) = counter();
    timeline.display(&mut host, InsertionPoint::Overlay, done, Some(10.0));
    assert_eq!(timeline.registry().displayed().len(), 1);

    let (_, done) = counter();
    timeline.display(&mut host, InsertionPoint::Midroll, done, None);
    let displayed = timeline.registry().displayed();
    assert_eq!(displayed.len(), 1);
    assert_eq!(displayed[0].slot, InsertionPoint::Midroll);
    assert!(host.overlay().is_none());

    pump(&mut timeline, &mut host, 50);
    assert_eq!(overlay_done.get(), 1);
}

#[test]
fn source_restored_before_callback() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Midroll, video_break("mid"));
    host.play();
    host.set_time(42.0);

    let (count, done) = counter();
    timeline.display(&mut host, InsertionPoint::Midroll, done, None);
    assert_eq!(host.source(), "mid.mp4");
    assert_eq!(timeline.session().original_source(), Some(CONTENT));

    timeline.on_ended(&mut host);
    pump(&mut timeline, &mut host, 40);
    assert_eq!(count.get(), 0);
    assert_eq!(host.source(), "mid.mp4");

    pump(&mut timeline, &mut host, 10);
    assert_eq!(count.get(), 1);
    assert_eq!(host.source(), CONTENT);
    assert_eq!(host.calls().last(), Some(&HostCall::Seek(42.0)));
}

#[test]
fn redisplay_while_active_is_ignored() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Midroll, video_break("mid"));
    let (first, done) = counter();
    timeline.display(&mut host, InsertionPoint::Midroll, done, None);
    let (second, done) = counter();
    timeline.display(&mut host, InsertionPoint::Midroll, done, None);
    assert_eq!(started(&host, InsertionPoint::Midroll), 1);

    timeline.on_ended(&mut host);
    pump(&mut timeline, &mut host, 100);
    assert_eq!(first.get(), 1);
    assert_eq!(second.get(), 0);
}

// ── Overlays ──────────────────────────────────────────────────────────────

#[test]
fn overlay_respects_start_and_frequency() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Overlay, overlay_break(10.0, 30.0, 5.0));
    timeline.on_play(&mut host);
    assert_eq!(timeline.phase(), Phase::MainContent);
    let shown = |h: &SimPlayer| h.count(|c| matches!(c, HostCall::ShowOverlay(_)));

    host.set_time(5.0);
    timeline.on_monitor_tick(&mut host);
    assert_eq!(shown(&host), 0);

    host.set_time(12.0);
    timeline.on_monitor_tick(&mut host);
    assert_eq!(shown(&host), 1);
    // Overlays never take over the media source.
    assert_eq!(host.source(), CONTENT);

    host.set_time(50.0);
    timeline.on_monitor_tick(&mut host);
    assert_eq!(shown(&host), 1);

    // Timeout elapsed (50 - 12 > 5): poll ends the overlay, gate re-arms.
    pump(&mut timeline, &mut host, 400);
    assert!(timeline.active_break().is_none());
    assert!(host.overlay().is_none());
    assert!(timeline.overlay_gate().is_enabled());
    assert_eq!(timeline.overlay_gate().last_play_end(), Some(50.0));

    host.set_time(70.0);
    timeline.on_monitor_tick(&mut host);
    assert_eq!(shown(&host), 1);

    host.set_time(81.0);
    timeline.on_monitor_tick(&mut host);
    assert_eq!(shown(&host), 2);
}

#[test]
fn overlay_close_keeps_break_running() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Overlay, overlay_break(0.0, 60.0, 20.0));
    timeline.on_play(&mut host);
    host.set_time(1.0);
    timeline.on_monitor_tick(&mut host);
    assert!(host.overlay().is_some());

    timeline.on_overlay_close(&mut host);
    assert!(host.overlay().is_none());
    assert_eq!(timeline.active_break().map(|b| b.slot), Some(InsertionPoint::Overlay));
}

#[test]
fn no_overlay_during_midroll() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Overlay, overlay_break(0.0, 1.0, 5.0));
    timeline.register_ad_break(InsertionPoint::Midroll, video_break("mid"));
    timeline.on_play(&mut host);
    host.set_time(20.0);
    assert!(timeline.play_midroll(&mut host));
    host.set_time(3.0);
    timeline.on_monitor_tick(&mut host);
    assert_eq!(host.count(|c| matches!(c, HostCall::ShowOverlay(_))), 0);
}

#[test]
fn preempted_overlay_end_uses_content_position() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Overlay, overlay_break(0.0, 30.0, 100.0));
    timeline.register_ad_break(InsertionPoint::Midroll, video_break("mid"));
    timeline.on_play(&mut host);
    let shown = |h: &SimPlayer| h.count(|c| matches!(c, HostCall::ShowOverlay(_)));

    host.set_time(40.0);
    timeline.on_monitor_tick(&mut host);
    assert_eq!(shown(&host), 1);

    // The mid-roll takes over the element while the overlay is still up.
    host.set_time(50.0);
    assert!(timeline.play_midroll(&mut host));
    assert_eq!(host.source(), "mid.mp4");
    pump(&mut timeline, &mut host, 100);
    assert_eq!(timeline.overlay_gate().last_play_end(), Some(50.0));

    timeline.on_ended(&mut host);
    pump(&mut timeline, &mut host, 150);
    assert_eq!(timeline.phase(), Phase::MainContent);

    // 60 - 50 < 30: still inside the frequency window.
    host.set_time(60.0);
    timeline.on_monitor_tick(&mut host);
    assert_eq!(shown(&host), 1);

    host.set_time(81.0);
    timeline.on_monitor_tick(&mut host);
    assert_eq!(shown(&host), 2);
}

// ── Mid-rolls ─────────────────────────────────────────────────────────────

#[test]
fn midroll_cue_resumes_content_at_interruption() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Midroll, video_break("mid"));
    assert!(!timeline.play_midroll(&mut host));

    timeline.on_play(&mut host);
    host.set_time(30.0);
    assert!(timeline.play_midroll(&mut host));
    assert_eq!(timeline.phase(), Phase::Midroll);
    assert_eq!(host.source(), "mid.mp4");
    assert!(!timeline.play_midroll(&mut host));

    timeline.on_ended(&mut host);
    pump(&mut timeline, &mut host, 150);
    assert_eq!(timeline.phase(), Phase::MainContent);
    assert_eq!(host.source(), CONTENT);
    assert!(host.calls().contains(&HostCall::Seek(30.0)));
    assert_eq!(timeline.registry().cursor(InsertionPoint::Midroll), 1);
    assert!(!timeline.play_midroll(&mut host));
}

#[test]
fn timed_break_ends_after_its_duration_on_the_ad_clip() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Midroll, video_break("mid"));
    host.set_duration("mid.mp4", 30.0);
    host.set_time(42.0);

    let (count, done) = counter();
    timeline.display(&mut host, InsertionPoint::Midroll, done, Some(2.0));
    assert_eq!(host.source(), "mid.mp4");

    let mut ad_time = 0.0;
    for _ in 0..40 {
        if count.get() == 1 {
            break;
        }
        ad_time = host.current_time();
        host.advance_media(0.25);
        timeline.advance(&mut host, Duration::from_millis(250));
    }
    assert_eq!(count.get(), 1);
    assert!(ad_time < 5.0, "ended at {}", ad_time);
    assert!(timeline.active_break().is_none());
    assert_eq!(host.source(), CONTENT);
    assert!(host.calls().contains(&HostCall::Seek(42.0)));
}

// ── Postroll ──────────────────────────────────────────────────────────────

#[test]
fn postroll_plays_once_then_stops_player() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Postroll, video_break("post"));
    timeline.on_play(&mut host);

    host.set_time(120.0);
    timeline.on_ended(&mut host);
    assert_eq!(timeline.phase(), Phase::Postroll);
    assert_eq!(host.source(), "post.mp4");
    assert!(timeline.session().postroll_displayed());

    // Ad clip ends.
    timeline.on_ended(&mut host);
    pump(&mut timeline, &mut host, 50);
    assert_eq!(timeline.phase(), Phase::Restored);
    assert_eq!(host.source(), CONTENT);

    pump(&mut timeline, &mut host, 100);
    assert_eq!(host.calls().last(), Some(&HostCall::Stop));
    assert_eq!(host.count(|c| *c == HostCall::Pause), 2);

    timeline.on_ended(&mut host);
    assert_eq!(started(&host, InsertionPoint::Postroll), 1);
}

#[test]
fn repeated_ended_shows_postroll_once() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    let mut cfg = AdBreakConfig::new(vec![
        AdCandidate::new("post").with_video("post.flv", "video/x-flv"),
    ]);
    cfg.ads[0].impressions = vec!["https://imp/post".into()];
    timeline.register_ad_break(InsertionPoint::Postroll, cfg);
    timeline.on_play(&mut host);

    timeline.on_ended(&mut host);
    timeline.on_ended(&mut host);
    pump(&mut timeline, &mut host, 300);
    timeline.on_ended(&mut host);
    assert_eq!(started(&host, InsertionPoint::Postroll), 1);
    assert_eq!(timeline.phase(), Phase::Restored);
}

#[test]
fn ended_without_postroll_passes_through() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    timeline.register_ad_break(InsertionPoint::Midroll, video_break("mid"));
    timeline.on_play(&mut host);
    host.clear_calls();
    timeline.on_ended(&mut host);
    assert!(host.calls().is_empty());
    assert_eq!(timeline.phase(), Phase::MainContent);
}

// ── Companions & tracking ─────────────────────────────────────────────────

#[test]
fn companions_broadcast_updates() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    let mut cfg = video_break("comp");
    cfg.ads[0].companions.push(Creative {
        width: 300,
        height: 250,
        html: "<img>".into(),
    });
    cfg.companion_targets.push(CompanionTarget {
        element_id: "side".into(),
        width: 300,
        height: 250,
        kind: "html".into(),
    });
    timeline.register_ad_break(InsertionPoint::Preroll, cfg);
    timeline.on_play(&mut host);
    assert!(host.calls().contains(&HostCall::Event(TimelineEvent::CompanionUpdated {
        element_id: "side".into(),
        html: "<img>".into(),
    })));
}

#[test]
fn tracking_beacons_follow_ad_playback() {
    let mut timeline = make_timeline();
    let mut host = make_host();
    host.set_duration("trk.mp4", 8.0);
    let mut cfg = AdBreakConfig::new(vec![AdCandidate::new("trk")
        .with_video("trk.mp4", "video/mp4")
        .with_tracking("start", "https://t/start")
        .with_tracking("firstQuartile", "https://t/q1")
        .with_tracking("midpoint", "https://t/mid")
        .with_tracking("complete", "https://t/complete")
        .with_tracking("pause", "https://t/pause")]);
    cfg.ads[0].impressions = vec!["https://t/imp".into()];
    timeline.register_ad_break(InsertionPoint::Preroll, cfg);

    timeline.on_play(&mut host);
    for t in [0.0, 1.0, 1.0, 2.5, 4.5, 6.0] {
        host.set_time(t);
        timeline.on_monitor_tick(&mut host);
    }
    timeline.on_pause(&mut host);
    timeline.on_pause(&mut host);
    timeline.on_ended(&mut host);
    assert_eq!(
        host.beacons(),
        vec![
            "https://t/imp",
            "https://t/start",
            "https://t/q1",
            "https://t/mid",
            "https://t/complete",
            "https://t/pause",
            "https://t/complete",
        ]
    );
}

// ── Configuration & simulation ────────────────────────────────────────────

#[test]
fn config_file_drives_full_session() {
    let mut pre = AdCandidate::new("pre").with_video("pre.mp4", "video/mp4");
    pre.duration_seconds = Some(2.0);
    let mut bump = AdCandidate::new("bump").with_video("bump.mp4", "video/mp4");
    bump.duration_seconds = Some(1.0);
    let mut mid = AdCandidate::new("mid").with_video("mid.mp4", "video/mp4");
    mid.duration_seconds = Some(2.0);

    let file = TimelineFile {
        settings: TimelineSettings::default(),
        breaks: vec![
            BreakEntry {
                slot: "preroll".into(),
                config: AdBreakConfig::new(vec![pre]),
            },
            BreakEntry {
                slot: "bumper".into(),
                config: AdBreakConfig::new(vec![bump]),
            },
            BreakEntry {
                slot: "overlay".into(),
                config: overlay_break(5.0, 1000.0, 2.0),
            },
            BreakEntry {
                slot: "midroll".into(),
                config: AdBreakConfig::new(vec![mid]),
            },
        ],
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    file.save(&path).unwrap();
    let file = TimelineFile::load(&path).unwrap();

    let mut host = SimPlayer::new(CONTENT);
    host.set_duration(CONTENT, 30.0);
    Simulation::load_clip_lengths(&mut host, &file);
    let mut timeline = file.into_timeline_with(AdSelector::with_seed(11));
    let sim = Simulation {
        midroll_cues: vec![20.0],
        ..Simulation::default()
    };
    let report = sim.run(&mut timeline, &mut host);

    let slots: Vec<InsertionPoint> = report.breaks_started.iter().map(|(s, _)| *s).collect();
    assert_eq!(
        slots,
        vec![
            InsertionPoint::Preroll,
            InsertionPoint::Bumper,
            InsertionPoint::Overlay,
            InsertionPoint::Midroll,
        ]
    );
    assert_eq!(report.final_phase, Phase::MainContent);
    assert_eq!(report.content_position, 30.0);
    assert_eq!(host.source(), CONTENT);
}
