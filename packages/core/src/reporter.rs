// Reporter
//
// Event sink for build progress. The core only ever emits transforming
// progress; richer phases belong to the outer build graph.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildPhase {
    Transforming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReporterEvent {
    #[serde(rename_all = "camelCase")]
    BuildProgress {
        phase: BuildPhase,
        /// Absolute path of the file being transformed.
        file_path: PathBuf,
    },
}

/// Sink accepting reporter events.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &ReporterEvent);
}

/// Reporter that discards every event.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _event: &ReporterEvent) {}
}
