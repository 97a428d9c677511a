//! Orchestrator — runs Load and Switch over every requested application.
//!
//! ```text
//!   requests ──► [load gate: W permits] ──► Application::load ──┬─► successful
//!                                                               └─► failed
//!   successful ──► [switch gate: W permits] ──► Application::switch ──┬─► switched
//!                                                                    └─► switch_failed
//! ```
//!
//! Permits are taken in request order by the dispatching loop before a
//! task is spawned, so admission is FIFO. Each application is owned by
//! exactly one task per phase. The outcome lists are the only state the
//! tasks share; each has its own lock, held just long enough to append.
//! A task that panics still hands its application back, as failed.
//! Every phase waits for all of its tasks before returning.

use std::sync::{Arc, Mutex, PoisonError};

use switchctl_core::ApplicationRequest;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{Instrument, debug, error, info, info_span};

use crate::application::Application;
use crate::context::RolloutContext;
use crate::error::RolloutResult;
use crate::gate::ConcurrencyGate;

/// Default number of applications processed at once.
pub const DEFAULT_WORKERS: usize = 5;

/// An application tagged with its position in the request list.
type Slot = (usize, Application);

/// Outcome lists shared by the tasks of one phase.
#[derive(Clone, Default)]
struct Partition {
    succeeded: Arc<Mutex<Vec<Slot>>>,
    failed: Arc<Mutex<Vec<Slot>>>,
}

impl Partition {
    fn record(&self, slot: Slot, ok: bool) {
        let list = if ok { &self.succeeded } else { &self.failed };
        list.lock().unwrap_or_else(PoisonError::into_inner).push(slot);
    }

    /// Both lists, in request order.
    fn into_lists(self) -> (Vec<Application>, Vec<Application>) {
        let succeeded = take(&self.succeeded);
        let failed = take(&self.failed);
        (sorted(succeeded), sorted(failed))
    }
}

fn take(list: &Mutex<Vec<Slot>>) -> Vec<Slot> {
    std::mem::take(&mut *list.lock().unwrap_or_else(PoisonError::into_inner))
}

fn sorted(mut slots: Vec<Slot>) -> Vec<Application> {
    slots.sort_by_key(|(index, _)| *index);
    slots.into_iter().map(|(_, app)| app).collect()
}

/// Owns one task's application and records it in the partition when the
/// task ends, including when it panics. Recorded as failed unless `ok`
/// was set.
struct SlotGuard {
    partition: Partition,
    index: usize,
    app: Option<Application>,
    ok: bool,
}

impl SlotGuard {
    fn new(partition: Partition, index: usize, app: Application) -> Self {
        Self {
            partition,
            index,
            app: Some(app),
            ok: false,
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(app) = self.app.take() {
            self.partition.record((self.index, app), self.ok);
        }
    }
}

/// Drives the Load and Switch phases.
pub struct Orchestrator {
    ctx: RolloutContext,
    workers: usize,
    loaded: Vec<Application>,
    load_failed: Vec<Application>,
    switched: Vec<Application>,
    switch_failed: Vec<Application>,
}

impl Orchestrator {
    /// `workers` caps concurrent applications per phase; zero is raised to
    /// one.
    pub fn new(ctx: RolloutContext, workers: usize) -> Self {
        Self {
            ctx,
            workers: workers.max(1),
            loaded: Vec::new(),
            load_failed: Vec::new(),
            switched: Vec::new(),
            switch_failed: Vec::new(),
        }
    }

    pub fn context(&self) -> &RolloutContext {
        &self.ctx
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Applications that loaded and have not (yet) been switched.
    pub fn successful_applications(&self) -> &[Application] {
        &self.loaded
    }

    /// Applications whose Load phase failed.
    pub fn failed_applications(&self) -> &[Application] {
        &self.load_failed
    }

    pub fn switched_applications(&self) -> &[Application] {
        &self.switched
    }

    pub fn switch_failed_applications(&self) -> &[Application] {
        &self.switch_failed
    }

    /// Load every requested application, at most `workers` at a time.
    pub async fn load_all(&mut self, requests: &[ApplicationRequest]) -> RolloutResult<()> {
        let gate = ConcurrencyGate::new(self.workers);
        let partition = Partition::default();
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(requests.len());

        info!(
            applications = requests.len(),
            environment = %self.ctx.environment,
            workers = self.workers,
            dryrun = self.ctx.dryrun,
            "loading applications"
        );

        for (index, request) in requests.iter().enumerate() {
            let permit = gate.acquire().await?;
            let ctx = self.ctx.clone();
            let mut guard = SlotGuard::new(partition.clone(), index, Application::new(request));
            let span = info_span!("application", name = %request.name, version = %request.version);

            let task = async move {
                let Some(app) = guard.app.as_mut() else {
                    return;
                };
                let result = app.load(&ctx).await;
                permit.release();

                let ok = match &result {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(error = %e, "load failed");
                        false
                    }
                };
                ctx.events.on_application_loaded(app.name(), !ok);
                guard.ok = ok;
            }
            .instrument(span)
            .with_current_subscriber();

            handles.push(tokio::spawn(task));
        }

        join_all(handles).await;

        let (loaded, failed) = partition.into_lists();
        info!(loaded = loaded.len(), failed = failed.len(), "load phase finished");
        self.loaded.extend(loaded);
        self.load_failed.extend(failed);
        Ok(())
    }

    /// Switch every loaded application, at most `workers` at a time.
    ///
    /// Returns `true` if no application's switch failed.
    pub async fn switch_all(&mut self) -> RolloutResult<bool> {
        let gate = ConcurrencyGate::new(self.workers);
        let partition = Partition::default();
        let apps = std::mem::take(&mut self.loaded);
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(apps.len());

        for (index, app) in apps.into_iter().enumerate() {
            let permit = gate.acquire().await?;
            let ctx = self.ctx.clone();
            let span = info_span!("application", name = %app.name(), version = %app.version());
            let mut guard = SlotGuard::new(partition.clone(), index, app);

            let task = async move {
                let Some(app) = guard.app.as_mut() else {
                    return;
                };
                let ok = app.switch(&ctx).await.is_ok();
                permit.release();

                ctx.events.on_application_switched(app.name(), !ok);
                guard.ok = ok;
            }
            .instrument(span)
            .with_current_subscriber();

            handles.push(tokio::spawn(task));
        }

        let panicked = join_all(handles).await;

        let (switched, failed) = partition.into_lists();
        info!(switched = switched.len(), failed = failed.len(), "switch phase finished");
        let all_ok = failed.is_empty() && panicked == 0;
        self.switched.extend(switched);
        self.switch_failed.extend(failed);
        Ok(all_ok)
    }

    /// 0 only if at least one application loaded and no switch failed.
    pub fn exit_code(&self) -> u8 {
        let loaded = self.loaded.len() + self.switched.len() + self.switch_failed.len();
        if loaded == 0 || !self.switch_failed.is_empty() {
            1
        } else {
            0
        }
    }

    /// Release every session of every application.
    pub async fn close_all(&mut self) {
        for app in self
            .loaded
            .iter_mut()
            .chain(self.load_failed.iter_mut())
            .chain(self.switched.iter_mut())
            .chain(self.switch_failed.iter_mut())
        {
            app.close().await;
        }
    }
}

/// Wait for every task. Returns how many did not finish normally; their
/// applications were recorded as failed when the task was dropped.
async fn join_all(handles: Vec<JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "application task failed");
            failed += 1;
        }
    }
    failed
}
