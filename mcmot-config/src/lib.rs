//! Configuration, logging, and the ambient error-disposition type shared by
//! the daemon: versioned on-disk config structs, env-driven settings, and
//! tracing setup.

mod disposition;
mod error;
mod logging;
mod mcmot_config;
mod schedule;
mod settings;

pub use disposition::Disposition;
pub use error::{Error, Result};
pub use mcmot_config::{CameraEntryConfig, MapSection, McmotConfig, SystemSection, TrackingSection};
pub use schedule::{PhaseEntry, PipelineEntry, ScheduleDocument};
pub use settings::{DaemonSettings, EdgeEventBackend, StaleMode};

pub fn init_logging(default_level: &str) -> impl Drop {
    logging::init(default_level)
}
