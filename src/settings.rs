use crate::ad_config::AdBreakConfig;
use crate::error::TimelineError;
use crate::selector::AdSelector;
use crate::slot::InsertionPoint;
use crate::timeline::AdTimeline;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Timing knobs shared with the host player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineSettings {
    /// Host monitor tick rate; also the duration-poll interval.
    pub monitor_rate_ms: u64,
    /// Pause between a break's teardown and its completion callback,
    /// letting pending native media events settle.
    pub done_delay_ms: u64,
    /// Wait after restoring the content source before resuming.
    pub settle_delay_ms: u64,
    /// Delay before the final stop after a postroll.
    pub stop_delay_ms: u64,
    /// Gap between an overlay panel and the control bar (or player bottom).
    pub overlay_offset_px: f64,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        TimelineSettings {
            monitor_rate_ms: 250,
            done_delay_ms: 50,
            settle_delay_ms: 100,
            stop_delay_ms: 100,
            overlay_offset_px: 10.0,
        }
    }
}

impl TimelineSettings {
    pub fn monitor_rate(&self) -> Duration {
        Duration::from_millis(self.monitor_rate_ms.max(1))
    }

    pub fn done_delay(&self) -> Duration {
        Duration::from_millis(self.done_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn stop_delay(&self) -> Duration {
        Duration::from_millis(self.stop_delay_ms)
    }
}

/// One break entry in a configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEntry {
    /// Slot name (`preroll`, `bumper`, `overlay`, `midroll`, `postroll`).
    pub slot: String,
    #[serde(flatten)]
    pub config: AdBreakConfig,
}

impl BreakEntry {
    pub fn insertion_point(&self) -> Result<InsertionPoint, TimelineError> {
        InsertionPoint::from_str_loose(&self.slot)
            .ok_or_else(|| TimelineError::UnknownInsertionPoint(self.slot.clone()))
    }
}

/// On-disk timeline description: settings plus the breaks to register.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineFile {
    #[serde(default)]
    pub settings: TimelineSettings,
    #[serde(default)]
    pub breaks: Vec<BreakEntry>,
}

impl TimelineFile {
    pub fn from_json(json: &str) -> Result<Self, TimelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, TimelineError> {
        let data = fs::read_to_string(path).map_err(|source| TimelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file = Self::from_json(&data)?;
        info!(path = %path.display(), breaks = file.breaks.len(), "Loaded timeline configuration");
        Ok(file)
    }

    /// Persist as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), TimelineError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| TimelineError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Number of entries per known slot, in timeline order.
    pub fn counts(&self) -> Vec<(InsertionPoint, usize)> {
        InsertionPoint::ALL
            .iter()
            .map(|&slot| {
                let n = self
                    .breaks
                    .iter()
                    .filter(|b| b.insertion_point().ok() == Some(slot))
                    .count();
                (slot, n)
            })
            .collect()
    }

    /// Build a timeline and register every entry. Entries with unknown slots are skipped.
    pub fn into_timeline(self) -> AdTimeline {
        self.into_timeline_with(AdSelector::new())
    }

    pub fn into_timeline_with(self, selector: AdSelector) -> AdTimeline {
        let mut timeline = AdTimeline::with_selector(self.settings, selector);
        for entry in self.breaks {
            match entry.insertion_point() {
                Ok(slot) => timeline.register_ad_break(slot, entry.config),
                Err(e) => warn!("Skipping break: {}", e),
            }
        }
        timeline
    }
}
