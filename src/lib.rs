// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod config;
pub mod detector;
pub mod event;
pub mod history;
pub mod source;
pub mod timer;

pub use config::{ConfigStore, DetectorConfig, FileConfigStore};
pub use detector::{Evaluation, ScanDetector};
pub use event::{KeyPress, Suppression, TagClassifier, Target, TargetClassifier};
pub use history::ScanLog;
pub use source::{ChannelKeySource, CrosstermKeySource, KeyEventSource, ScanMonitor};
