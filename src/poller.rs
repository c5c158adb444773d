//! Client side of an asynchronous backend job.
//!
//! [`JobPoller`] submits a [`JobRequest`], polls `/progress` on a fixed
//! interval and maps every response onto a [`DownloadView`] the UI reads
//! each frame. All backend IO runs inside one [`PollTask`] owned by the
//! poller, so stopping the task (explicitly, or by dropping the poller)
//! ends polling.
//!
//! Ticks never wait for earlier requests. Every request is tagged with its
//! tick number and a response is only applied when it is newer than the
//! last one applied, so a slow response can't roll the progress back.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    task::{JoinHandle, JoinSet},
    time::{self, Instant, MissedTickBehavior},
};

use crate::backend::JobBackend;
use crate::config::PollerConfig;
use crate::error::DownloadError;
use crate::model::{DownloadView, JobRequest, UiStatus};
use crate::progress::JobStatus;

const CONNECTING: &str = "Connecting to backend...";
const BACKEND_UNREACHABLE: &str = "Could not connect to backend. Ensure the backend is running.";
const COMPLETED: &str = "Download complete! Your ZIP is ready.";
const TIMED_OUT: &str = "Timed out waiting for the backend";
const SAVING: &str = "Saving archive...";

/// Called after every change to the view, e.g. to request a repaint
pub type ChangeNotifier = Arc<dyn Fn() + Send + Sync>;

/// Background job task. Aborted when stopped or dropped.
pub struct PollTask {
    handle: JoinHandle<()>,
}

impl PollTask {
    fn spawn<F>(runtime: &Handle, future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: runtime.spawn(future),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Default)]
struct Inner {
    view: DownloadView,
    /// Bumped for every submission or cancel; tasks holding an older id
    /// no longer own the view
    job: u64,
    reset_pending: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    notify: Option<ChangeNotifier>,
}

impl Shared {
    fn changed(&self) {
        if let Some(notify) = &self.notify {
            notify();
        }
    }

    /// Starts a new job generation and initialises its view.
    fn begin(&self, init: impl FnOnce(&mut DownloadView)) -> u64 {
        let job = {
            let mut inner = self.inner.lock();
            inner.job += 1;
            inner.reset_pending = false;
            inner.view = DownloadView::default();
            init(&mut inner.view);
            inner.job
        };
        self.changed();
        job
    }

    /// Applies `f` if `job` is still current. Returns false for a superseded job.
    fn update(&self, job: u64, f: impl FnOnce(&mut DownloadView)) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.job != job {
                return false;
            }
            f(&mut inner.view);
        }
        self.changed();
        true
    }

    fn reset(&self, job: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.job != job {
                return;
            }
            inner.view = DownloadView::default();
            inner.reset_pending = true;
        }
        self.changed();
    }
}

/// Maps one poll response onto the view.
fn apply_status(view: &mut DownloadView, status: &JobStatus) {
    view.set_progress(status.percentage());
    match status {
        JobStatus::InProgress { message, .. } => view.message = message.clone(),
        JobStatus::Completed { .. } => {
            view.status = UiStatus::Ready;
            view.message = COMPLETED.to_string();
        }
        JobStatus::Failed { reason, .. } => view.fail(DownloadError::Backend(reason.clone())),
    }
}

/// Drives one download job at a time against a [`JobBackend`].
///
/// The UI thread calls [`submit`](Self::submit), [`retrieve`](Self::retrieve)
/// and [`cancel`](Self::cancel); the work itself runs as a single owned task
/// on the tokio runtime, which writes into the shared [`DownloadView`] that
/// [`snapshot`](Self::snapshot) reads back. Dropping the poller aborts that task.
pub struct JobPoller<B: JobBackend> {
    backend: Arc<B>,
    runtime: Handle,
    config: PollerConfig,
    shared: Arc<Shared>,
    task: Option<PollTask>,
}

impl<B: JobBackend> JobPoller<B> {
    pub fn new(backend: Arc<B>, runtime: Handle, config: PollerConfig) -> Self {
        Self::with_notifier(backend, runtime, config, None)
    }

    pub fn with_notifier(
        backend: Arc<B>,
        runtime: Handle,
        config: PollerConfig,
        notify: Option<ChangeNotifier>,
    ) -> Self {
        Self {
            backend,
            runtime,
            config,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                notify,
            }),
            task: None,
        }
    }

    pub fn snapshot(&self) -> DownloadView {
        self.shared.inner.lock().view.clone()
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Folder used by the next [`retrieve`](Self::retrieve)
    pub fn set_download_dir(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.config.download_dir = dir.into();
    }

    /// Returns true once after a retrieval finished and the view went back
    /// to idle; the UI clears its inputs in response.
    pub fn take_reset(&self) -> bool {
        std::mem::take(&mut self.shared.inner.lock().reset_pending)
    }

    /// Validates the request and, if it passes, starts the job task.
    ///
    /// Ignored while a job is downloading. Validation failures move straight
    /// to `Error` without touching the backend.
    pub fn submit(&mut self, request: JobRequest) -> Result<(), DownloadError> {
        if self.snapshot().status == UiStatus::Downloading {
            tracing::warn!(url = %request.url, "Job already running, ignoring submit");
            return Ok(());
        }
        self.stop_task();

        if let Err(err) = request.validate() {
            tracing::warn!(url = %request.url, error = %err, "Rejected job request");
            let failure = err.clone();
            self.shared.begin(|view| view.fail(failure));
            return Err(err);
        }

        let job = self.shared.begin(|view| {
            view.status = UiStatus::Downloading;
            view.message = CONNECTING.to_string();
        });
        tracing::info!(
            job,
            url = %request.url,
            quality = %request.quality,
            format = ?request.file_format,
            "Submitting job"
        );

        let future = run_job(
            Arc::clone(&self.backend),
            Arc::clone(&self.shared),
            job,
            request,
            self.config.clone(),
        );
        self.task = Some(PollTask::spawn(&self.runtime, future));
        Ok(())
    }

    /// Saves the finished archive, then returns to idle after the reset delay.
    ///
    /// Only valid in `Ready`; returns false (and does nothing) otherwise.
    pub fn retrieve(&mut self) -> bool {
        let job = {
            let mut inner = self.shared.inner.lock();
            if inner.view.status != UiStatus::Ready || inner.view.saving {
                return false;
            }
            inner.view.saving = true;
            inner.view.message = SAVING.to_string();
            inner.job
        };
        self.shared.changed();
        self.stop_task();

        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);
        let dir = self.config.download_dir.clone();
        let reset_delay = self.config.reset_delay;
        let future = async move {
            match backend.fetch_archive(&dir).await {
                Ok(path) => {
                    // `saving` stays set until the reset so the archive can't
                    // be fetched a second time during the delay
                    let saved = format!("Saved to {}", path.display());
                    if !shared.update(job, |view| view.message = saved) {
                        return;
                    }
                    time::sleep(reset_delay).await;
                    shared.reset(job);
                    tracing::info!(job, "Reset to idle");
                }
                Err(err) => {
                    tracing::error!(job, error = %err, "Archive retrieval failed");
                    let message = format!("Could not retrieve the ZIP archive: {err}");
                    shared.update(job, |view| {
                        view.saving = false;
                        view.fail(DownloadError::Backend(message));
                    });
                }
            }
        };
        self.task = Some(PollTask::spawn(&self.runtime, future));
        true
    }

    /// Stops any running job task and returns to idle.
    pub fn cancel(&mut self) {
        self.stop_task();
        let job = self.shared.begin(|_| {});
        tracing::info!(job, "Job cancelled");
    }

    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(PollTask::is_running)
    }

    fn stop_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.stop();
        }
    }
}

async fn run_job<B: JobBackend>(
    backend: Arc<B>,
    shared: Arc<Shared>,
    job: u64,
    request: JobRequest,
    config: PollerConfig,
) {
    if let Err(err) = backend.start_download(&request).await {
        tracing::error!(job, error = %err, "Backend rejected job");
        shared.update(job, |view| {
            view.fail(DownloadError::Backend(BACKEND_UNREACHABLE.to_string()))
        });
        return;
    }
    tracing::info!(job, "Job accepted, polling for progress");
    poll_until_terminal(backend, &shared, job, &config).await;
}

async fn poll_until_terminal<B: JobBackend>(
    backend: Arc<B>,
    shared: &Shared,
    job: u64,
    config: &PollerConfig,
) {
    let mut ticker = time::interval_at(Instant::now() + config.poll_interval, config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let max_poll_duration = config.max_poll_duration;
    let deadline = async move {
        match max_poll_duration {
            Some(limit) => time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut in_flight = JoinSet::new();
    let mut issued = 0u64;
    let mut applied = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                issued += 1;
                let tick = issued;
                let backend = Arc::clone(&backend);
                in_flight.spawn(async move { (tick, backend.fetch_progress().await) });
            }
            Some(joined) = in_flight.join_next() => {
                let (tick, result) = match joined {
                    Ok(done) => done,
                    Err(err) => {
                        tracing::warn!(job, error = %err, "Progress request task failed");
                        continue;
                    }
                };
                let payload = match result {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::warn!(job, tick, error = %err, "Progress poll failed");
                        continue;
                    }
                };
                if tick <= applied {
                    tracing::debug!(job, tick, applied, "Dropping stale progress response");
                    continue;
                }
                applied = tick;

                let status = JobStatus::from(payload);
                if !shared.update(job, |view| apply_status(view, &status)) {
                    break;
                }
                match &status {
                    JobStatus::InProgress { percentage, message } => {
                        tracing::debug!(job, tick, percentage, %message, "Progress");
                    }
                    JobStatus::Completed { .. } => {
                        tracing::info!(job, polls = issued, "Job completed");
                    }
                    JobStatus::Failed { reason, .. } => {
                        tracing::error!(job, %reason, "Job failed");
                    }
                }
                if status.is_terminal() {
                    break;
                }
            }
            _ = &mut deadline => {
                tracing::error!(job, polls = issued, "Gave up waiting for the backend");
                shared.update(job, |view| {
                    view.fail(DownloadError::Backend(TIMED_OUT.to_string()))
                });
                break;
            }
        }
    }

    in_flight.abort_all();
}
