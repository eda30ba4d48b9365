//! ad_timeline — Ad break sequencing for single-media-element players.
//!
//! Breaks are registered against insertion points and played by swapping the
//! player's one media source, then restoring content where it left off.
//! The CLI and the simulated player in [`sim`] consume this crate.

pub mod ad_config;
pub mod display;
pub mod error;
pub mod host;
pub mod registry;
pub mod selector;
pub mod settings;
pub mod sim;
pub mod slot;
pub mod timeline;
pub mod timer;
pub mod tracking;
