pub mod backfill;
pub mod backup;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod idgen;
pub mod locator;
pub mod progress;
pub mod scanner;
pub mod xml;

pub use config::AppConfig;
pub use engine::{BackfillEngine, GapSummary, Outcome, RunReport};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
