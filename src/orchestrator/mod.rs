//! Generation orchestrator: runs the per-podcast stage pipeline and owns its state.
//!
//! Locking: the run map lock is only held for lookups and inserts. A run's own lock
//! may be taken while holding it, never the other way round. Every transition is
//! persisted and published under the run's lock alone, which keeps each podcast's
//! updates in transition order. Readers use the committed snapshot and never wait
//! on a run's lock.

pub mod cancel;
pub mod stages;

pub use cancel::CancellationToken;
pub use stages::{SegmentSynthesizer, VoicePreparer};

use crate::audio::{AudioAssembler, AudioSegment, OutputFormat};
use crate::broadcast::StatusBroadcaster;
use crate::defaults;
use crate::error::{PodgenError, Result};
use crate::status::{GenerationRun, Stage, StatusUpdate};
use crate::store::{ArtifactStore, MemoryRunStore, RunStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Semaphore, watch};
use uuid::Uuid;

const INTERRUPTED_MESSAGE: &str = "Generation interrupted by restart";

/// Worker pool and output settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Runs allowed to execute stage work at the same time.
    pub max_concurrent_runs: usize,
    /// Runs allowed to wait for a free worker; `None` queues without limit.
    pub max_queued_runs: Option<usize>,
    /// Format of the assembled podcast.
    pub output: OutputFormat,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: defaults::MAX_CONCURRENT_RUNS,
            max_queued_runs: None,
            output: OutputFormat::default(),
        }
    }
}

/// Podcast ids key files on disk, so only `[A-Za-z0-9_-]{1,64}` is accepted.
pub fn validate_podcast_id(podcast_id: &str) -> Result<()> {
    let invalid = |message: &str| PodgenError::InvalidPodcastId {
        podcast_id: podcast_id.to_string(),
        message: message.to_string(),
    };
    if podcast_id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if podcast_id.len() > defaults::MAX_PODCAST_ID_LEN {
        return Err(invalid("is too long"));
    }
    if !podcast_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid("may only contain ASCII letters, digits, '-' and '_'"));
    }
    Ok(())
}

/// Sort segments by sequence index, rejecting duplicate indices.
pub fn order_segments(segments: &mut [AudioSegment]) -> Result<()> {
    segments.sort_by_key(|segment| segment.sequence);
    if let Some(pair) = segments
        .windows(2)
        .find(|pair| pair[0].sequence == pair[1].sequence)
    {
        return Err(PodgenError::DuplicateSegment {
            sequence: pair[0].sequence,
        });
    }
    Ok(())
}

struct RunState {
    run: GenerationRun,
    token: CancellationToken,
}

struct RunCell {
    state: Mutex<RunState>,
    /// Last committed snapshot.
    snapshots: watch::Sender<GenerationRun>,
    /// Still counted in `Inner::queued`.
    waiting: AtomicBool,
    /// Set once the worker task has exited, whatever the run's stage.
    worker_done: watch::Sender<bool>,
}

/// Returned by `start_generation`; tracks one run.
#[derive(Debug)]
pub struct GenerationHandle {
    podcast_id: String,
    run_id: Uuid,
    token: CancellationToken,
    snapshots: watch::Receiver<GenerationRun>,
}

impl GenerationHandle {
    pub fn podcast_id(&self) -> &str {
        &self.podcast_id
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Signal cooperative cancellation. The run ends CANCELLED at its next stage boundary.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Latest snapshot of this run.
    pub fn snapshot(&self) -> GenerationRun {
        self.snapshots.borrow().clone()
    }

    /// Wait until the run reaches a terminal stage and return its final snapshot.
    pub async fn wait(mut self) -> GenerationRun {
        if self
            .snapshots
            .wait_for(|run| run.is_terminal())
            .await
            .is_err()
        {
            tracing::debug!(podcast_id = %self.podcast_id, "Run snapshots closed before termination");
        }
        self.snapshots.borrow().clone()
    }
}

enum Outcome {
    Completed(String),
    Cancelled,
    Failed(String),
}

struct Inner {
    config: OrchestratorConfig,
    runs: Mutex<HashMap<String, Arc<RunCell>>>,
    permits: Arc<Semaphore>,
    queued: AtomicUsize,
    voices: Arc<dyn VoicePreparer>,
    synthesizer: Arc<dyn SegmentSynthesizer>,
    assembler: AudioAssembler,
    artifacts: Arc<dyn ArtifactStore>,
    store: Arc<dyn RunStore>,
    broadcaster: StatusBroadcaster,
}

/// Builds an [`Orchestrator`] from its collaborators.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    voices: Arc<dyn VoicePreparer>,
    synthesizer: Arc<dyn SegmentSynthesizer>,
    artifacts: Arc<dyn ArtifactStore>,
    store: Option<Arc<dyn RunStore>>,
    broadcaster: Option<StatusBroadcaster>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to an in-memory store.
    pub fn run_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn broadcaster(mut self, broadcaster: StatusBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn build(self) -> Orchestrator {
        let workers = self.config.max_concurrent_runs.max(1);
        Orchestrator {
            inner: Arc::new(Inner {
                assembler: AudioAssembler::new(self.config.output),
                config: self.config,
                runs: Mutex::new(HashMap::new()),
                permits: Arc::new(Semaphore::new(workers)),
                queued: AtomicUsize::new(0),
                voices: self.voices,
                synthesizer: self.synthesizer,
                artifacts: self.artifacts,
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(MemoryRunStore::new())),
                broadcaster: self.broadcaster.unwrap_or_default(),
            }),
        }
    }
}

/// Drives generation runs. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn builder(
        voices: Arc<dyn VoicePreparer>,
        synthesizer: Arc<dyn SegmentSynthesizer>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config: OrchestratorConfig::default(),
            voices,
            synthesizer,
            artifacts,
            store: None,
            broadcaster: None,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.inner.broadcaster
    }

    /// Create a QUEUED run for `podcast_id` and schedule its pipeline.
    ///
    /// The QUEUED snapshot is persisted and broadcast before this returns. Must be
    /// called from within a tokio runtime.
    pub fn start_generation(&self, podcast_id: &str) -> Result<GenerationHandle> {
        validate_podcast_id(podcast_id)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PodgenError::Other(format!("No async runtime to run generation: {e}")))?;

        let mut runs = self.inner.runs.lock();
        // A cancelled run is terminal before its worker has left the stage body, so
        // the next run for the podcast waits for that worker before doing any work.
        let previous = match runs.get(podcast_id) {
            Some(existing) if !existing.snapshots.borrow().is_terminal() => {
                return Err(PodgenError::AlreadyRunning {
                    podcast_id: podcast_id.to_string(),
                });
            }
            Some(existing) => Some(existing.worker_done.subscribe()),
            None => None,
        };

        if let Some(limit) = self.inner.config.max_queued_runs {
            let waiting = self.inner.queued.load(Ordering::SeqCst);
            let free = self.inner.permits.available_permits();
            if waiting >= free + limit {
                return Err(PodgenError::Busy {
                    queued: waiting.saturating_sub(free),
                });
            }
        }
        self.inner.queued.fetch_add(1, Ordering::SeqCst);

        let run = GenerationRun::queued(podcast_id);
        let token = CancellationToken::new();
        let (snapshots, rx) = watch::channel(run.clone());
        let handle = GenerationHandle {
            podcast_id: podcast_id.to_string(),
            run_id: run.run_id,
            token: token.clone(),
            snapshots: rx,
        };
        let cell = Arc::new(RunCell {
            state: Mutex::new(RunState { run, token }),
            snapshots,
            waiting: AtomicBool::new(true),
            worker_done: watch::channel(false).0,
        });

        // Locked before the map is released so a racing cancel cannot publish first.
        let state = cell.state.lock();
        runs.insert(podcast_id.to_string(), Arc::clone(&cell));
        drop(runs);
        self.commit(&cell, &state.run, &state.run.status_update());
        drop(state);

        let orchestrator = self.clone();
        runtime.spawn(async move {
            let worker = {
                let orchestrator = orchestrator.clone();
                let cell = Arc::clone(&cell);
                tokio::spawn(async move { orchestrator.run_pipeline(cell, previous).await })
            };
            if let Err(e) = worker.await {
                tracing::error!("Generation worker aborted: {}", e);
                orchestrator.leave_queue(&cell);
                orchestrator.finish(&cell, Outcome::Failed(format!("worker aborted: {e}")));
            }
            cell.worker_done.send_replace(true);
        });

        Ok(handle)
    }

    /// Latest snapshot for `podcast_id`, from memory or, failing that, the run store.
    pub fn get_status(&self, podcast_id: &str) -> Result<GenerationRun> {
        validate_podcast_id(podcast_id)?;

        if let Some(run) = self.live_snapshot(podcast_id) {
            return Ok(run);
        }

        let Some(mut run) = self.inner.store.load_run(podcast_id)? else {
            return Err(PodgenError::NotFound {
                podcast_id: podcast_id.to_string(),
            });
        };
        if run.is_terminal() {
            return Ok(run);
        }

        // A start may have raced the load. Its live run wins, and holding the map
        // while saving keeps a later start from being overwritten.
        let runs = self.inner.runs.lock();
        if let Some(cell) = runs.get(podcast_id) {
            return Ok(cell.snapshots.borrow().clone());
        }
        tracing::warn!(
            podcast_id,
            run_id = %run.run_id,
            stage = %run.stage,
            "Found unfinished run without a worker"
        );
        run.transition(Stage::Error, INTERRUPTED_MESSAGE)?;
        if let Err(e) = self.inner.store.save_run(&run) {
            tracing::warn!(podcast_id, "Failed to persist interrupted run: {}", e);
        }
        Ok(run)
    }

    fn live_snapshot(&self, podcast_id: &str) -> Option<GenerationRun> {
        let runs = self.inner.runs.lock();
        runs.get(podcast_id)
            .map(|cell| cell.snapshots.borrow().clone())
    }

    /// Cancel the run for `podcast_id`, if any. Always broadcasts CANCELLED.
    ///
    /// A live run is moved to CANCELLED immediately; its worker stops at the next
    /// stage boundary. For terminal or unknown runs nothing changes and the
    /// CANCELLED payload is broadcast without run context.
    pub fn cancel_generation(&self, podcast_id: &str) -> StatusUpdate {
        let cell = self.inner.runs.lock().get(podcast_id).cloned();
        let Some(cell) = cell else {
            let update = StatusUpdate::cancelled();
            self.inner.broadcaster.publish(podcast_id, &update);
            return update;
        };

        let mut state = cell.state.lock();
        state.token.cancel();
        self.leave_queue(&cell);
        if !state.run.is_terminal() {
            match state
                .run
                .transition(Stage::Cancelled, Stage::Cancelled.default_message())
            {
                Ok(update) => {
                    self.commit(&cell, &state.run, &update);
                    return update;
                }
                Err(e) => tracing::warn!(podcast_id, "Failed to cancel run: {}", e),
            }
        }

        let update = StatusUpdate::cancelled();
        self.inner.broadcaster.publish(podcast_id, &update);
        update
    }

    /// Snapshots of all runs that have not reached a terminal stage.
    pub fn active_runs(&self) -> Vec<GenerationRun> {
        let runs = self.inner.runs.lock();
        runs.values()
            .map(|cell| cell.snapshots.borrow().clone())
            .filter(|run| !run.is_terminal())
            .collect()
    }

    /// Runs submitted but still waiting for a free worker.
    pub fn queued_runs(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    async fn run_pipeline(&self, cell: Arc<RunCell>, previous: Option<watch::Receiver<bool>>) {
        let (podcast_id, token) = {
            let state = cell.state.lock();
            (state.run.podcast_id.clone(), state.token.clone())
        };

        let acquire = async {
            if let Some(mut previous) = previous {
                let gone = previous.wait_for(|done| *done).await.is_err();
                if gone {
                    tracing::debug!(podcast_id = %podcast_id, "Previous worker gone");
                }
            }
            Arc::clone(&self.inner.permits).acquire_owned().await
        };
        let permit = tokio::select! {
            biased;
            () = token.cancelled() => None,
            permit = acquire => Some(permit),
        };
        self.leave_queue(&cell);
        let Some(permit) = permit else {
            self.finish(&cell, Outcome::Cancelled);
            return;
        };
        let Ok(_permit) = permit else {
            self.finish(&cell, Outcome::Failed("worker pool closed".to_string()));
            return;
        };

        let outcome = match self.execute(&cell, &podcast_id, &token).await {
            Ok(reference) => Outcome::Completed(reference),
            Err(PodgenError::Cancelled) => Outcome::Cancelled,
            Err(e) => Outcome::Failed(e.to_string()),
        };
        self.finish(&cell, outcome);
    }

    async fn execute(
        &self,
        cell: &RunCell,
        podcast_id: &str,
        token: &CancellationToken,
    ) -> Result<String> {
        self.advance(cell, token, Stage::GeneratingVoices)?;
        self.inner
            .voices
            .prepare_voices(podcast_id, token)
            .await
            .map_err(stage_failure(Stage::GeneratingVoices))?;

        self.advance(cell, token, Stage::GeneratingSegments)?;
        let mut segments = self
            .inner
            .synthesizer
            .synthesize_segments(podcast_id, token)
            .await
            .map_err(stage_failure(Stage::GeneratingSegments))?;
        order_segments(&mut segments).map_err(stage_failure(Stage::GeneratingSegments))?;

        self.advance(cell, token, Stage::Stitching)?;
        let assembler = self.inner.assembler;
        let audio = tokio::task::spawn_blocking(move || assembler.assemble(segments))
            .await
            .map_err(|e| PodgenError::Other(format!("assembly task failed: {e}")))
            .and_then(|result| result)
            .map_err(stage_failure(Stage::Stitching))?;

        token.checkpoint()?;
        self.inner
            .artifacts
            .store(podcast_id, &audio)
            .await
            .map_err(stage_failure(Stage::Stitching))
    }

    /// Enter `stage` unless cancellation was requested or the run already ended.
    fn advance(&self, cell: &RunCell, token: &CancellationToken, stage: Stage) -> Result<()> {
        let mut state = cell.state.lock();
        if token.is_cancelled() || state.run.is_terminal() {
            return Err(PodgenError::Cancelled);
        }
        let update = state.run.transition(stage, stage.default_message())?;
        self.commit(cell, &state.run, &update);
        Ok(())
    }

    fn finish(&self, cell: &RunCell, outcome: Outcome) {
        let mut state = cell.state.lock();
        if state.run.is_terminal() {
            tracing::debug!(
                podcast_id = %state.run.podcast_id,
                stage = %state.run.stage,
                "Run already terminal"
            );
            return;
        }

        let result = match outcome {
            Outcome::Completed(reference) => state.run.complete(reference),
            Outcome::Cancelled => state
                .run
                .transition(Stage::Cancelled, Stage::Cancelled.default_message()),
            Outcome::Failed(message) => {
                tracing::error!(podcast_id = %state.run.podcast_id, "Generation failed: {}", message);
                state.run.transition(
                    Stage::Error,
                    format!("{}: {}", Stage::Error.default_message(), message),
                )
            }
        };
        match result {
            Ok(update) => self.commit(cell, &state.run, &update),
            Err(e) => tracing::warn!(podcast_id = %state.run.podcast_id, "Failed to finish run: {}", e),
        }
    }

    /// Drop a run from the waiting count, once.
    fn leave_queue(&self, cell: &RunCell) {
        if cell.waiting.swap(false, Ordering::SeqCst) {
            self.inner.queued.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Persist, broadcast and expose a transition. Caller holds the run's lock.
    fn commit(&self, cell: &RunCell, run: &GenerationRun, update: &StatusUpdate) {
        tracing::info!(
            podcast_id = %run.podcast_id,
            run_id = %run.run_id,
            stage = %run.stage,
            progress = run.progress,
            "{}",
            run.message
        );
        if let Err(e) = self.inner.store.save_run(run) {
            tracing::warn!(podcast_id = %run.podcast_id, "Failed to persist run: {}", e);
        }
        self.inner.broadcaster.publish(&run.podcast_id, update);
        cell.snapshots.send_replace(run.clone());
    }
}

fn stage_failure(stage: Stage) -> impl Fn(PodgenError) -> PodgenError {
    move |e| match e {
        PodgenError::Cancelled => PodgenError::Cancelled,
        other => PodgenError::StageFailure {
            stage,
            message: other.to_string(),
        },
    }
}
