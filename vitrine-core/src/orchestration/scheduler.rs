use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{ProgressEvent, percent};
use super::job::{GenerationJob, JobPriority, JobReport, JobState};
use super::runtime::ProgressBroadcaster;
use crate::config::SchedulerConfig;
use crate::media::MediaDescriptor;
use crate::thumbs::{ThumbnailBackend, ThumbnailVariant};

/// Told about every full thumbnail the scheduler writes.
pub trait JobObserver: Send + Sync {
    fn on_thumbnail_ready(&self, descriptor: &MediaDescriptor);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopJobObserver;

impl JobObserver for NoopJobObserver {
    fn on_thumbnail_ready(&self, _descriptor: &MediaDescriptor) {}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchedulerPhase {
    Idle,
    Running,
    Paused,
}

/// Point-in-time view of the scheduler counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub phase: SchedulerPhase,
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub is_paused: bool,
    pub current_file: Option<String>,
    pub queued_viewport: usize,
    pub queued_background: usize,
    /// Jobs per batch at the current run size.
    pub batch_size: usize,
}

struct JobEntry {
    descriptor: MediaDescriptor,
    state: JobState,
}

#[derive(Default)]
struct SchedulerState {
    jobs: HashMap<String, JobEntry>,
    viewport: VecDeque<String>,
    background: VecDeque<String>,
    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
    last_reported: usize,
    current_file: Option<String>,
    running: bool,
}

impl SchedulerState {
    fn begin_run(&mut self) {
        self.jobs.retain(|_, entry| !entry.state.is_terminal());
        self.total = 0;
        self.completed = 0;
        self.succeeded = 0;
        self.failed = 0;
        self.last_reported = 0;
        self.current_file = None;
    }

    fn take_batch(&mut self, size: usize) -> Vec<GenerationJob> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            let (path, priority) = match self.viewport.pop_front() {
                Some(path) => (path, JobPriority::Viewport),
                None => match self.background.pop_front() {
                    Some(path) => (path, JobPriority::Background),
                    None => break,
                },
            };
            let Some(entry) = self.jobs.get_mut(&path) else {
                continue;
            };
            if !matches!(entry.state, JobState::Queued(_)) {
                continue;
            }
            entry.state = JobState::Running;
            batch.push(GenerationJob {
                descriptor: entry.descriptor.clone(),
                priority,
            });
        }
        batch
    }

    /// Whether any queue entry still points at a job waiting to run.
    fn has_queued(&self) -> bool {
        self.viewport
            .iter()
            .chain(self.background.iter())
            .any(|path| {
                self.jobs
                    .get(path)
                    .is_some_and(|entry| matches!(entry.state, JobState::Queued(_)))
            })
    }

    fn progress_event(&self, is_generating: bool) -> ProgressEvent {
        ProgressEvent::GlobalProgress {
            total: self.total,
            completed: self.completed,
            current_file: self.current_file.clone(),
            progress: percent(self.completed, self.total),
            is_generating,
        }
    }
}

struct SchedulerInner {
    config: SchedulerConfig,
    backend: Arc<dyn ThumbnailBackend>,
    events: ProgressBroadcaster,
    observer: Arc<dyn JobObserver>,
    state: Mutex<SchedulerState>,
    paused: watch::Sender<bool>,
    running: watch::Sender<bool>,
    shutdown: CancellationToken,
}

/// Prioritised, batched thumbnail generation for one scan root.
///
/// Jobs wait in two FIFO queues; the viewport queue is always drained before
/// the background queue. A single dispatch task runs one batch at a time,
/// applies the results serially, and goes idle once every job is terminal.
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct GenerationScheduler {
    inner: Arc<SchedulerInner>,
}

impl fmt::Debug for GenerationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("GenerationScheduler");
        dbg.field("config", &self.inner.config)
            .field("paused", &*self.inner.paused.borrow());
        if let Ok(state) = self.inner.state.try_lock() {
            dbg.field("total", &state.total)
                .field("completed", &state.completed)
                .field("queued_viewport", &state.viewport.len())
                .field("queued_background", &state.background.len())
                .field("running", &state.running);
        }
        dbg.finish()
    }
}

impl GenerationScheduler {
    pub fn new(
        config: SchedulerConfig,
        backend: Arc<dyn ThumbnailBackend>,
        events: ProgressBroadcaster,
        observer: Arc<dyn JobObserver>,
        shutdown: CancellationToken,
    ) -> Self {
        let (paused, _) = watch::channel(false);
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                backend,
                events,
                observer,
                state: Mutex::new(SchedulerState::default()),
                paused,
                running,
                shutdown,
            }),
        }
    }

    /// Queue `descriptors` behind any existing background work. Paths that
    /// already have a live job are ignored. Starts a run if the scheduler is
    /// idle. Returns how many jobs were added.
    pub async fn enqueue_background(&self, descriptors: Vec<MediaDescriptor>) -> usize {
        if self.inner.shutdown.is_cancelled() {
            return 0;
        }
        let mut state = self.inner.state.lock().await;
        let was_running = state.running;
        if !was_running && !descriptors.is_empty() {
            state.begin_run();
        }

        let mut added = 0;
        for descriptor in descriptors {
            let path = descriptor.relative_path.clone();
            if state
                .jobs
                .get(&path)
                .is_some_and(|entry| !entry.state.is_terminal())
            {
                continue;
            }
            state.jobs.insert(
                path.clone(),
                JobEntry {
                    descriptor,
                    state: JobState::Queued(JobPriority::Background),
                },
            );
            state.background.push_back(path);
            state.total += 1;
            added += 1;
        }

        if added > 0 && !was_running {
            state.running = true;
            self.inner.running.send_replace(true);
            info!(
                target: "vitrine::scheduler",
                jobs = state.total,
                batch_size = self.inner.config.batch_size_for(state.total),
                "generation run started"
            );
            tokio::spawn(dispatch_loop(Arc::clone(&self.inner)));
        } else if added > 0 {
            debug!(target: "vitrine::scheduler", added, total = state.total, "jobs appended to run");
        }
        added
    }

    /// Move queued jobs for `relative_paths` to the front of the viewport
    /// queue, keeping the reported order. Running and finished jobs are left
    /// alone.
    pub async fn report_viewport(&self, relative_paths: &[String]) -> usize {
        let mut state = self.inner.state.lock().await;
        let mut promoted = Vec::new();
        let mut seen = HashSet::new();
        for path in relative_paths {
            if !seen.insert(path.as_str()) {
                continue;
            }
            let Some(entry) = state.jobs.get_mut(path) else {
                continue;
            };
            let JobState::Queued(priority) = entry.state else {
                continue;
            };
            entry.state = JobState::Queued(priority.elevate(JobPriority::Viewport));
            promoted.push(path.clone());
        }
        if promoted.is_empty() {
            return 0;
        }

        let moved: HashSet<&str> = promoted.iter().map(String::as_str).collect();
        state.background.retain(|p| !moved.contains(p.as_str()));
        state.viewport.retain(|p| !moved.contains(p.as_str()));
        for path in promoted.iter().rev() {
            state.viewport.push_front(path.clone());
        }
        debug!(target: "vitrine::scheduler", promoted = promoted.len(), "viewport reported");
        promoted.len()
    }

    /// Flip the pause flag and return the new value. A batch already in
    /// flight still completes.
    pub fn toggle_pause(&self) -> bool {
        let mut is_paused = false;
        self.inner.paused.send_modify(|paused| {
            *paused = !*paused;
            is_paused = *paused;
        });
        info!(target: "vitrine::scheduler", is_paused, "pause toggled");
        self.inner.events.publish(ProgressEvent::Paused { is_paused });
        is_paused
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.inner.state.lock().await;
        let is_paused = self.is_paused();
        let phase = match (state.running, is_paused) {
            (false, _) => SchedulerPhase::Idle,
            (true, true) => SchedulerPhase::Paused,
            (true, false) => SchedulerPhase::Running,
        };
        SchedulerStatus {
            phase,
            total_jobs: state.total,
            completed_jobs: state.completed,
            succeeded: state.succeeded,
            failed: state.failed,
            is_paused,
            current_file: state.current_file.clone(),
            queued_viewport: state.viewport.len(),
            queued_background: state.background.len(),
            batch_size: self.inner.config.batch_size_for(state.total),
        }
    }

    /// Resolves once no run is active.
    pub async fn wait_idle(&self) {
        let mut running = self.inner.running.subscribe();
        let _ = running.wait_for(|running| !*running).await;
    }

    /// Stop dispatching. In-flight codec work is not interrupted.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

async fn dispatch_loop(inner: Arc<SchedulerInner>) {
    let mut paused = inner.paused.subscribe();
    loop {
        // A run with nothing left to start is over even while paused.
        if inner.finish_if_drained().await {
            return;
        }

        tokio::select! {
            _ = inner.shutdown.cancelled() => {
                inner.abandon().await;
                return;
            }
            resumed = async { paused.wait_for(|paused| !*paused).await.is_ok() } => {
                if !resumed {
                    inner.abandon().await;
                    return;
                }
            }
        }

        let (batch, delay) = {
            let mut state = inner.state.lock().await;
            let size = inner.config.batch_size_for(state.total);
            let batch = state.take_batch(size);
            if batch.is_empty() {
                inner.finish_run(&mut state);
                return;
            }
            state.current_file = batch.first().map(|job| job.relative_path().to_string());
            (batch, inner.config.inter_batch_delay_for(state.total))
        };

        debug!(target: "vitrine::scheduler", size = batch.len(), "dispatching batch");
        let reports = join_all(batch.iter().map(|job| inner.run_job(job))).await;

        {
            let mut state = inner.state.lock().await;
            for report in reports {
                inner.apply_report(&mut state, report);
            }
            if !state.has_queued() {
                inner.finish_run(&mut state);
                return;
            }
        }

        tokio::select! {
            _ = inner.shutdown.cancelled() => {
                inner.abandon().await;
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

impl SchedulerInner {
    async fn run_job(&self, job: &GenerationJob) -> JobReport {
        let descriptor = &job.descriptor;
        let relative_path = descriptor.relative_path.clone();

        if job.priority.wants_tiny_preview() {
            let tiny_ready = self.backend.exists(descriptor, ThumbnailVariant::Tiny).await
                || match self.backend.generate(descriptor, ThumbnailVariant::Tiny).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(
                            target: "vitrine::scheduler",
                            relative_path = %relative_path,
                            error = %err.message,
                            "tiny preview failed"
                        );
                        false
                    }
                };
            if tiny_ready {
                self.events.publish(ProgressEvent::TinyPreviewReady {
                    url: self.backend.url_for(&relative_path, ThumbnailVariant::Tiny),
                    relative_path: relative_path.clone(),
                });
            }
        }

        let result = self.backend.generate(descriptor, ThumbnailVariant::Full).await;
        match &result {
            Ok(()) => {
                self.events.publish(ProgressEvent::ThumbnailReady {
                    url: self.backend.url_for(&relative_path, ThumbnailVariant::Full),
                    relative_path: relative_path.clone(),
                });
                self.observer.on_thumbnail_ready(descriptor);
            }
            Err(err) => warn!(
                target: "vitrine::scheduler",
                relative_path = %relative_path,
                error = %err.message,
                "thumbnail generation failed"
            ),
        }
        JobReport {
            relative_path,
            result,
        }
    }

    fn apply_report(&self, state: &mut SchedulerState, report: JobReport) {
        let terminal = if report.result.is_ok() {
            state.succeeded += 1;
            JobState::Done
        } else {
            state.failed += 1;
            JobState::Failed
        };
        if let Some(entry) = state.jobs.get_mut(&report.relative_path) {
            entry.state = terminal;
        }
        state.completed += 1;

        let stride = self.config.progress_stride_for(state.total);
        if state.completed < state.total && state.completed >= state.last_reported + stride {
            state.last_reported = state.completed;
            self.events.publish(state.progress_event(true));
        }
    }

    async fn finish_if_drained(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.has_queued() {
            return false;
        }
        self.finish_run(&mut state);
        true
    }

    fn finish_run(&self, state: &mut SchedulerState) {
        state.running = false;
        state.current_file = None;
        state.last_reported = state.completed;
        self.events.publish(state.progress_event(false));
        self.events.publish(ProgressEvent::GenerationFinished {
            total: state.total,
            succeeded: state.succeeded,
            failed: state.failed,
        });
        info!(
            target: "vitrine::scheduler",
            total = state.total,
            succeeded = state.succeeded,
            failed = state.failed,
            "generation run finished"
        );
        self.running.send_replace(false);
    }

    async fn abandon(&self) {
        let mut state = self.state.lock().await;
        state.running = false;
        state.current_file = None;
        state.viewport.clear();
        state.background.clear();
        state.jobs.retain(|_, entry| entry.state.is_terminal());
        info!(
            target: "vitrine::scheduler",
            completed = state.completed,
            total = state.total,
            "generation run abandoned"
        );
        self.running.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{GenerationError, StoreError};
    use crate::media::MediaKind;

    #[derive(Default)]
    struct RecordingBackend {
        calls: StdMutex<Vec<(String, ThumbnailVariant)>>,
        fail: HashSet<String>,
        work: Duration,
    }

    impl RecordingBackend {
        fn full_calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, v)| *v == ThumbnailVariant::Full)
                .map(|(p, _)| p.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ThumbnailBackend for RecordingBackend {
        async fn exists(&self, _d: &MediaDescriptor, _v: ThumbnailVariant) -> bool {
            false
        }

        async fn generate(
            &self,
            d: &MediaDescriptor,
            v: ThumbnailVariant,
        ) -> Result<(), GenerationError> {
            self.calls.lock().unwrap().push((d.relative_path.clone(), v));
            if !self.work.is_zero() {
                tokio::time::sleep(self.work).await;
            }
            if self.fail.contains(&d.relative_path) {
                return Err(GenerationError::new(&d.relative_path, "corrupt"));
            }
            Ok(())
        }

        async fn remove(&self, _d: &MediaDescriptor) {}

        async fn cleanup_orphans(&self, _root: &Path) -> Result<usize, StoreError> {
            Ok(0)
        }

        fn url_for(&self, relative_path: &str, variant: ThumbnailVariant) -> String {
            format!("/t/{relative_path}/{variant:?}")
        }
    }

    fn item(rel: &str) -> MediaDescriptor {
        MediaDescriptor::from_parts(
            Path::new("/lib"),
            &Path::new("/lib").join(rel),
            MediaKind::Image,
            1,
            None,
        )
        .unwrap()
    }

    fn scheduler(backend: Arc<RecordingBackend>) -> (GenerationScheduler, ProgressBroadcaster) {
        let events = ProgressBroadcaster::new(4096);
        let scheduler = GenerationScheduler::new(
            SchedulerConfig::default(),
            backend,
            events.clone(),
            Arc::new(NoopJobObserver),
            CancellationToken::new(),
        );
        (scheduler, events)
    }

    fn drain(sub: &mut crate::orchestration::runtime::ProgressSubscription) -> Vec<ProgressEvent> {
        std::iter::from_fn(|| sub.try_recv()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_isolated_and_counted() {
        let backend = Arc::new(RecordingBackend {
            fail: HashSet::from(["b.jpg".to_string()]),
            ..Default::default()
        });
        let (scheduler, events) = scheduler(backend);
        let mut sub = events.subscribe();

        let added = scheduler
            .enqueue_background(vec![item("a.jpg"), item("b.jpg"), item("c.jpg"), item("d.jpg")])
            .await;
        assert_eq!(added, 4);
        scheduler.wait_idle().await;

        let status = scheduler.status().await;
        assert_eq!(status.phase, SchedulerPhase::Idle);
        assert_eq!((status.total_jobs, status.succeeded, status.failed), (4, 3, 1));

        let events = drain(&mut sub);
        let ready = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::ThumbnailReady { .. }))
            .count();
        assert_eq!(ready, 3);
        assert_eq!(
            events[events.len() - 2],
            ProgressEvent::GlobalProgress {
                total: 4,
                completed: 4,
                current_file: None,
                progress: 100,
                is_generating: false,
            }
        );
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::GenerationFinished {
                total: 4,
                succeeded: 3,
                failed: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn viewport_jobs_jump_the_queue_and_get_a_tiny_preview() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, events) = scheduler(Arc::clone(&backend));
        let mut sub = events.subscribe();

        assert!(scheduler.toggle_pause());
        let items: Vec<_> = (0..8).map(|i| item(&format!("img{i}.jpg"))).collect();
        scheduler.enqueue_background(items).await;
        let promoted = scheduler
            .report_viewport(&["img6.jpg".to_string(), "img7.jpg".to_string(), "missing.jpg".to_string()])
            .await;
        assert_eq!(promoted, 2);
        assert_eq!(scheduler.status().await.phase, SchedulerPhase::Paused);

        assert!(!scheduler.toggle_pause());
        scheduler.wait_idle().await;

        let order = backend.full_calls();
        assert_eq!(&order[..2], &["img6.jpg", "img7.jpg"]);
        assert_eq!(order.len(), 8);

        let calls = backend.calls.lock().unwrap().clone();
        let tiny: Vec<_> = calls
            .iter()
            .filter(|(_, v)| *v == ThumbnailVariant::Tiny)
            .map(|(p, _)| p.as_str())
            .collect();
        assert_eq!(tiny, vec!["img6.jpg", "img7.jpg"]);

        let events = drain(&mut sub);
        let tiny_at = events
            .iter()
            .position(|e| matches!(e, ProgressEvent::TinyPreviewReady { relative_path, .. } if relative_path == "img6.jpg"))
            .unwrap();
        let full_at = events
            .iter()
            .position(|e| matches!(e, ProgressEvent::ThumbnailReady { relative_path, .. } if relative_path == "img6.jpg"))
            .unwrap();
        assert!(tiny_at < full_at);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_lets_the_current_batch_finish() {
        let backend = Arc::new(RecordingBackend {
            work: Duration::from_millis(20),
            ..Default::default()
        });
        let (scheduler, _events) = scheduler(Arc::clone(&backend));
        let items: Vec<_> = (0..6).map(|i| item(&format!("p{i}.jpg"))).collect();
        scheduler.enqueue_background(items).await;

        while backend.full_calls().len() < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(scheduler.toggle_pause());
        tokio::time::sleep(Duration::from_secs(5)).await;

        let status = scheduler.status().await;
        assert_eq!(status.phase, SchedulerPhase::Paused);
        assert_eq!(status.completed_jobs, 3);
        assert_eq!(backend.full_calls().len(), 3);

        assert!(!scheduler.toggle_pause());
        scheduler.wait_idle().await;
        let mut calls = backend.full_calls();
        calls.sort();
        calls.dedup();
        assert_eq!(calls.len(), 6);
        assert_eq!(backend.full_calls().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_during_the_last_batch_still_ends_the_run() {
        let backend = Arc::new(RecordingBackend {
            work: Duration::from_millis(20),
            ..Default::default()
        });
        let (scheduler, events) = scheduler(Arc::clone(&backend));
        let mut sub = events.subscribe();
        scheduler
            .enqueue_background(vec![item("a.jpg"), item("b.jpg")])
            .await;

        while backend.full_calls().len() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(scheduler.toggle_pause());
        tokio::time::timeout(Duration::from_secs(60), scheduler.wait_idle())
            .await
            .expect("run stayed open while paused");

        let status = scheduler.status().await;
        assert_eq!(status.phase, SchedulerPhase::Idle);
        assert!(status.is_paused);
        assert_eq!(status.completed_jobs, 2);

        let events = drain(&mut sub);
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::GenerationFinished {
                total: 2,
                succeeded: 2,
                failed: 0
            })
        );
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::GlobalProgress {
                completed: 2,
                progress: 100,
                is_generating: false,
                ..
            }
        )));

        // Later work starts a fresh run that waits for the resume.
        assert_eq!(scheduler.enqueue_background(vec![item("c.jpg")]).await, 1);
        let status = scheduler.status().await;
        assert_eq!(status.phase, SchedulerPhase::Paused);
        assert_eq!((status.total_jobs, status.completed_jobs), (1, 0));

        assert!(!scheduler.toggle_pause());
        scheduler.wait_idle().await;
        assert_eq!(backend.full_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_reported_once_per_stride() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, events) = scheduler(backend);
        let mut sub = events.subscribe();

        let progress_points = |events: Vec<ProgressEvent>| -> Vec<(usize, u8, bool)> {
            events
                .into_iter()
                .filter_map(|e| match e {
                    ProgressEvent::GlobalProgress {
                        completed,
                        progress,
                        is_generating,
                        ..
                    } => Some((completed, progress, is_generating)),
                    _ => None,
                })
                .collect()
        };

        let items: Vec<_> = (0..25).map(|i| item(&format!("s{i:02}.jpg"))).collect();
        scheduler.enqueue_background(items).await;
        scheduler.wait_idle().await;
        assert_eq!(
            progress_points(drain(&mut sub)),
            vec![(10, 40, true), (20, 80, true), (25, 100, false)]
        );

        let items: Vec<_> = (0..4).map(|i| item(&format!("t{i}.jpg"))).collect();
        scheduler.enqueue_background(items).await;
        scheduler.wait_idle().await;
        assert_eq!(progress_points(drain(&mut sub)), vec![(4, 100, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_enqueues_are_ignored_while_live() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _events) = scheduler(Arc::clone(&backend));
        scheduler.toggle_pause();
        assert_eq!(scheduler.enqueue_background(vec![item("a.jpg"), item("b.jpg")]).await, 2);
        assert_eq!(scheduler.enqueue_background(vec![item("a.jpg"), item("c.jpg")]).await, 1);
        assert_eq!(scheduler.status().await.total_jobs, 3);
        scheduler.toggle_pause();
        scheduler.wait_idle().await;
        assert_eq!(backend.full_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_size_follows_the_run_size() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _events) = scheduler(backend);
        scheduler.toggle_pause();
        let items: Vec<_> = (0..300).map(|i| item(&format!("n{i:03}.jpg"))).collect();
        scheduler.enqueue_background(items).await;
        assert_eq!(scheduler.status().await.batch_size, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_the_run() {
        let backend = Arc::new(RecordingBackend::default());
        let (scheduler, _events) = scheduler(backend);
        scheduler.toggle_pause();
        scheduler.enqueue_background(vec![item("a.jpg")]).await;
        scheduler.shutdown();
        scheduler.wait_idle().await;
        assert_eq!(scheduler.status().await.phase, SchedulerPhase::Idle);
        assert_eq!(scheduler.enqueue_background(vec![item("b.jpg")]).await, 0);
    }
}
