//! Thumbnail generation scheduling and progress fan-out.

pub mod events;
pub mod job;
pub mod runtime;
pub mod scheduler;

pub use events::ProgressEvent;
pub use job::{GenerationJob, JobPriority, JobState};
pub use runtime::{ProgressBroadcaster, ProgressSubscription};
pub use scheduler::{
    GenerationScheduler, JobObserver, NoopJobObserver, SchedulerPhase, SchedulerStatus,
};
