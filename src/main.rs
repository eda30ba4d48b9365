use ad_timeline::ad_config::{AdBreakConfig, AdCandidate, CompanionTarget, Creative, HelperConfig};
use ad_timeline::selector::AdSelector;
use ad_timeline::settings::{BreakEntry, TimelineFile, TimelineSettings};
use ad_timeline::sim::{SimPlayer, Simulation};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const CONTENT_URL: &str = "content.mp4";

#[derive(Parser)]
#[command(name = "ad_timeline", about = "Ad break timeline simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full playback session against the simulated player
    Simulate {
        /// Timeline configuration (JSON)
        config: PathBuf,
        /// Main content length in seconds
        #[arg(long, default_value_t = 60.0)]
        content: f64,
        /// Seed for ad selection
        #[arg(long)]
        seed: Option<u64>,
        /// Content time (seconds) of a mid-roll cue point; repeatable
        #[arg(long = "midroll-at")]
        midroll_at: Vec<f64>,
    },
    /// Load a configuration and show what it registers
    Validate {
        /// Timeline configuration (JSON)
        config: PathBuf,
    },
    /// Print an example configuration
    Sample,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ad_timeline=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            content,
            seed,
            midroll_at,
        } => {
            let file = load_or_exit(&config);
            let mut host = SimPlayer::new(CONTENT_URL);
            host.set_duration(CONTENT_URL, content);
            Simulation::load_clip_lengths(&mut host, &file);

            let selector = match seed {
                Some(s) => AdSelector::with_seed(s),
                None => AdSelector::new(),
            };
            let mut timeline = file.into_timeline_with(selector);
            let sim = Simulation {
                midroll_cues: midroll_at,
                ..Simulation::default()
            };
            let report = sim.run(&mut timeline, &mut host);

            for call in &report.calls {
                println!("  {}", call);
            }
            println!();
            println!(
                "Breaks played: {} | Final phase: {:?}",
                report.breaks_started.len(),
                report.final_phase
            );
            println!(
                "Session time: {:.2}s | Content reached: {:.2}s",
                report.elapsed.as_secs_f64(),
                report.content_position
            );
            for (i, (slot, ad)) in report.breaks_started.iter().enumerate() {
                println!("  {}. {} ({})", i + 1, slot, ad);
            }
        }
        Commands::Validate { config } => {
            let file = load_or_exit(&config);
            let mut invalid = 0;
            for entry in &file.breaks {
                if let Err(e) = entry.insertion_point() {
                    eprintln!("Warning: {}", e);
                    invalid += 1;
                }
            }
            println!(
                "Settings: monitor {}ms | done delay {}ms | settle {}ms | stop {}ms",
                file.settings.monitor_rate_ms,
                file.settings.done_delay_ms,
                file.settings.settle_delay_ms,
                file.settings.stop_delay_ms
            );
            for (slot, n) in file.counts() {
                println!("  {:<9} {} break(s)", slot.as_str(), n);
            }
            if invalid > 0 {
                eprintln!("{} break(s) with unknown insertion points will be ignored.", invalid);
                std::process::exit(1);
            }
        }
        Commands::Sample => match serde_json::to_string_pretty(&sample_file()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }
}

fn load_or_exit(path: &Path) -> TimelineFile {
    match TimelineFile::load(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn sample_file() -> TimelineFile {
    let mut preroll = AdCandidate::new("preroll-1")
        .with_video("https://ads.example.com/preroll.mp4", "video/mp4")
        .with_tracking("start", "https://track.example.com/start")
        .with_tracking("midpoint", "https://track.example.com/midpoint")
        .with_tracking("complete", "https://track.example.com/complete");
    preroll.duration_seconds = Some(15.0);
    preroll.click_through = Some("https://advertiser.example.com".to_string());
    preroll.impressions = vec!["https://track.example.com/impression".to_string()];
    preroll.companions = vec![Creative {
        width: 300,
        height: 250,
        html: "<img src=\"https://ads.example.com/box.png\">".to_string(),
    }];

    let mut preroll_break = AdBreakConfig::new(vec![preroll]);
    preroll_break.notice = Some(HelperConfig::new("Advertisement: $1 seconds remaining"));
    preroll_break.skip_btn = Some(HelperConfig::new("Skip ad"));
    preroll_break.companion_targets = vec![CompanionTarget {
        element_id: "sidebar-box".to_string(),
        width: 300,
        height: 250,
        kind: "html".to_string(),
    }];

    let mut banner = AdCandidate::new("banner-1");
    banner.non_linear = vec![Creative {
        width: 468,
        height: 60,
        html: "<a href=\"https://advertiser.example.com\">Visit us</a>".to_string(),
    }];
    let mut overlay_break = AdBreakConfig::new(vec![banner]);
    overlay_break.start = Some(10.0);
    overlay_break.frequency = Some(30.0);
    overlay_break.timeout = Some(8.0);

    let mut bumper =
        AdCandidate::new("bumper-1").with_video("https://ads.example.com/bumper.mp4", "video/mp4");
    bumper.duration_seconds = Some(3.0);

    let midroll = AdCandidate::new("midroll-1")
        .with_video("https://ads.example.com/midroll.webm", "video/webm");

    TimelineFile {
        settings: TimelineSettings::default(),
        breaks: vec![
            BreakEntry {
                slot: "preroll".to_string(),
                config: preroll_break,
            },
            BreakEntry {
                slot: "bumper".to_string(),
                config: AdBreakConfig::new(vec![bumper]),
            },
            BreakEntry {
                slot: "overlay".to_string(),
                config: overlay_break,
            },
            BreakEntry {
                slot: "midroll".to_string(),
                config: AdBreakConfig::new(vec![midroll]),
            },
        ],
    }
}
