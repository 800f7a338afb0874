use serde::{Deserialize, Serialize};

use crate::media::MediaDescriptor;

/// Which queue a job waits in. Jobs are promoted to `Viewport`, never demoted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobPriority {
    Viewport,
    Background,
}

impl JobPriority {
    pub fn elevate(self, target: JobPriority) -> JobPriority {
        match (self, target) {
            (JobPriority::Viewport, _) | (_, JobPriority::Viewport) => JobPriority::Viewport,
            _ => JobPriority::Background,
        }
    }

    /// Viewport jobs publish a tiny preview before the full thumbnail.
    pub fn wants_tiny_preview(self) -> bool {
        matches!(self, JobPriority::Viewport)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Queued(JobPriority),
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// A pending thumbnail for one descriptor.
#[derive(Clone, Debug)]
pub struct GenerationJob {
    pub descriptor: MediaDescriptor,
    pub priority: JobPriority,
}

impl GenerationJob {
    pub fn relative_path(&self) -> &str {
        &self.descriptor.relative_path
    }
}

/// Outcome of running one job, applied to the counters by the dispatcher.
#[derive(Debug)]
pub struct JobReport {
    pub relative_path: String,
    pub result: Result<(), crate::error::GenerationError>,
}
