//! Main hunt runner
//!
//! [`Hunter`] is the control surface. A run executes on one background worker
//! thread that walks the timeline until a detection halts it, the operator
//! stops or pauses it, or a collaborator fails.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::confirm::{ConfirmationOutcome, ConfirmationRound};
use super::events::{HuntEvent, StopReason};
use super::snapshot::HuntSnapshot;
use super::state::{CountAdjustment, EngineState, FaultKind, RunState, RunStatus};
use super::timeline::{ActionKind, TimelineAction, TimelineConfig};
use super::wait::Countdown;
use crate::config::{HuntConfig, ThresholdSet, CONFIG_VERSION};
use crate::input::{InputActuator, KeyBindings};
use crate::vision::{EvidenceStore, FrameSource, ReferenceImage, ReferenceSet, Region, RegionRegistry};
use crate::{HunterError, Result};

/// How long `stop` waits for the worker to acknowledge cancellation
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;
type SharedActuator = Arc<Mutex<Box<dyn InputActuator>>>;

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Shiny hunt engine
pub struct Hunter {
    state: Arc<EngineState>,
    regions: RegionRegistry,
    references: ReferenceSet,
    timeline: TimelineConfig,
    keys: KeyBindings,
    source: SharedSource,
    actuator: SharedActuator,
    evidence: Option<Arc<dyn EvidenceStore>>,
    worker: Option<Worker>,
}

impl Hunter {
    /// Create an idle hunter with the default configuration
    pub fn new(
        source: impl FrameSource + 'static,
        actuator: impl InputActuator + 'static,
    ) -> Self {
        let source: Box<dyn FrameSource> = Box::new(source);
        let actuator: Box<dyn InputActuator> = Box::new(actuator);
        Self {
            state: Arc::new(EngineState::new(ThresholdSet::default())),
            regions: RegionRegistry::new(),
            references: ReferenceSet::new(),
            timeline: TimelineConfig::default(),
            keys: KeyBindings::default(),
            source: Arc::new(Mutex::new(source)),
            actuator: Arc::new(Mutex::new(actuator)),
            evidence: None,
            worker: None,
        }
    }

    /// Save failing-region images of detection halts into `store`
    pub fn with_evidence_store(mut self, store: Arc<dyn EvidenceStore>) -> Self {
        self.evidence = Some(store);
        self
    }

    /// Rebuild a paused hunt from a snapshot; `resume` continues at the
    /// saved timeline position with the saved count.
    pub fn restore(
        snapshot: HuntSnapshot,
        source: impl FrameSource + 'static,
        actuator: impl InputActuator + 'static,
    ) -> Result<Self> {
        let mut hunter = Self::new(source, actuator);
        hunter.apply_config(snapshot.config)?;
        hunter.references = snapshot.references;

        let cursor = snapshot.cursor % hunter.timeline.len();
        hunter.state.hunt_count.store(snapshot.hunt_count, Ordering::SeqCst);
        hunter.state.cursor.store(cursor, Ordering::SeqCst);
        hunter.state.set_status(RunStatus::Paused);

        log::info!(
            "Restored paused hunt: count {}, next action {}",
            snapshot.hunt_count,
            cursor
        );
        Ok(hunter)
    }

    /// Subscribe to hunt events
    pub fn subscribe(&self) -> Receiver<HuntEvent> {
        self.state.events.subscribe()
    }

    /// Point-in-time copy of status, count, cursor and cancel flag
    pub fn state(&self) -> RunState {
        self.state.snapshot()
    }

    /// Current lifecycle status
    pub fn status(&self) -> RunStatus {
        self.state.status()
    }

    /// True while a worker is executing the timeline
    pub fn is_running(&self) -> bool {
        self.status() == RunStatus::Running
    }

    /// Encounters counted so far in this hunt
    pub fn hunt_count(&self) -> u64 {
        self.state.hunt_count()
    }

    /// Outcome of the most recent confirmation round
    pub fn last_outcome(&self) -> Option<ConfirmationOutcome> {
        self.state.last_outcome.lock().clone()
    }

    /// Count corrections recorded so far
    pub fn adjustments(&self) -> Vec<CountAdjustment> {
        self.state.adjustments.lock().clone()
    }

    // --- configuration -------------------------------------------------

    /// Current configuration, including the live thresholds
    pub fn config(&self) -> HuntConfig {
        HuntConfig {
            version: CONFIG_VERSION,
            thresholds: self.thresholds(),
            keys: self.keys.clone(),
            timeline: self.timeline.clone(),
            regions: self.regions.clone(),
        }
    }

    /// Replace the whole configuration
    pub fn apply_config(&mut self, config: HuntConfig) -> Result<()> {
        self.ensure_mutable()?;
        config.validate()?;
        *self.state.thresholds.write() = config.thresholds;
        self.keys = config.keys;
        self.timeline = config.timeline;
        self.regions = config.regions;
        log::info!("Applied hunt configuration");
        Ok(())
    }

    /// Live match thresholds
    pub fn thresholds(&self) -> ThresholdSet {
        *self.state.thresholds.read()
    }

    /// Thresholds may change at any time, including mid-run; an attempt in
    /// progress finishes with the values it started with.
    pub fn set_thresholds(&self, thresholds: ThresholdSet) -> Result<()> {
        thresholds.validate()?;
        *self.state.thresholds.write() = thresholds;
        log::info!(
            "Thresholds set: cs>={} ssim>={} cd<={}",
            thresholds.color_similarity,
            thresholds.ssim_threshold,
            thresholds.color_difference
        );
        Ok(())
    }

    /// Timeline the next run will execute
    pub fn timeline(&self) -> &TimelineConfig {
        &self.timeline
    }

    /// Replace the timeline and rewind to its first action
    pub fn set_timeline(&mut self, timeline: TimelineConfig) -> Result<()> {
        self.ensure_mutable()?;
        timeline.validate()?;
        log::info!("Timeline set: {} actions", timeline.len());
        self.timeline = timeline;
        self.state.cursor.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Keys pressed for each logical action
    pub fn key_bindings(&self) -> &KeyBindings {
        &self.keys
    }

    /// Replace the key bindings; the next `start` or `resume` presses them
    pub fn set_key_bindings(&mut self, keys: KeyBindings) -> Result<()> {
        self.ensure_mutable()?;
        keys.validate()?;
        log::info!(
            "Keys set: reset={} quick_load={} confirm={} hold={}s",
            keys.reset,
            keys.quick_load,
            keys.confirm,
            keys.hold_secs
        );
        self.keys = keys;
        Ok(())
    }

    /// Configured capture regions
    pub fn regions(&self) -> &RegionRegistry {
        &self.regions
    }

    /// Add a region; its name must be unused
    pub fn add_region(&mut self, region: Region) -> Result<()> {
        self.ensure_mutable()?;
        self.regions.add(region)
    }

    /// Remove a region by name, returning it if it existed
    pub fn remove_region(&mut self, name: &str) -> Result<Option<Region>> {
        self.ensure_mutable()?;
        Ok(self.regions.remove(name))
    }

    /// Enable or disable a region; `Ok(false)` if no region has that name
    pub fn set_region_enabled(&mut self, name: &str, enabled: bool) -> Result<bool> {
        self.ensure_mutable()?;
        Ok(self.regions.set_enabled(name, enabled))
    }

    /// Flip a region's enabled flag, returning the new value
    pub fn toggle_region(&mut self, name: &str) -> Result<Option<bool>> {
        self.ensure_mutable()?;
        Ok(self.regions.toggle(name))
    }

    /// Replace every region at once
    pub fn replace_regions(&mut self, regions: Vec<Region>) -> Result<()> {
        self.ensure_mutable()?;
        self.regions.replace_all(regions)
    }

    /// Remove all regions
    pub fn clear_regions(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.regions.clear();
        Ok(())
    }

    /// Loaded reference images
    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    /// Add a reference, replacing any with the same name
    pub fn add_reference(&mut self, reference: ReferenceImage) -> Result<()> {
        self.ensure_mutable()?;
        self.references.insert(reference);
        Ok(())
    }

    /// Decode a reference image from disk and add it under `name`
    pub fn load_reference(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_mutable()?;
        self.references.load(name, path)
    }

    /// Remove a reference by name
    pub fn remove_reference(&mut self, name: &str) -> Result<bool> {
        self.ensure_mutable()?;
        Ok(self.references.remove(name))
    }

    /// Remove all references
    pub fn clear_references(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.references.clear();
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<()> {
        match self.status() {
            RunStatus::Running => Err(HunterError::InvalidState(RunStatus::Running)),
            _ => Ok(()),
        }
    }

    /// Everything a run needs before the worker may start
    fn validate_for_run(&self) -> Result<()> {
        self.timeline.validate()?;
        self.keys.validate()?;
        if self.references.is_empty() {
            return Err(HunterError::config("No reference images loaded"));
        }
        if self.regions.enabled_count() == 0 {
            return Err(HunterError::config("No enabled regions"));
        }
        Ok(())
    }

    // --- lifecycle -----------------------------------------------------

    /// Start a fresh hunt: the count and timeline position reset to zero.
    /// A paused hunt is discarded.
    pub fn start(&mut self) -> Result<()> {
        let status = self.status();
        if status == RunStatus::Running {
            return Err(HunterError::AlreadyRunning);
        }
        self.validate_for_run()?;
        self.reap_worker();

        if status == RunStatus::Paused {
            log::info!("Discarding paused hunt at count {}", self.hunt_count());
        }

        self.state.hunt_count.store(0, Ordering::SeqCst);
        self.state.cursor.store(0, Ordering::SeqCst);
        *self.state.last_outcome.lock() = None;
        *self.state.pending_adjudication.lock() = None;

        self.state.emit(HuntEvent::Started);
        self.spawn_worker()?;
        log::info!(
            "Hunt started: {} regions, {} references, {} actions",
            self.regions.enabled_count(),
            self.references.len(),
            self.timeline.len()
        );
        Ok(())
    }

    /// Continue a paused hunt where it left off
    pub fn resume(&mut self) -> Result<()> {
        let status = self.status();
        if status != RunStatus::Paused {
            return Err(HunterError::InvalidState(status));
        }
        self.validate_for_run()?;
        self.reap_worker();

        let hunt_count = self.hunt_count();
        self.state.emit(HuntEvent::Resumed { hunt_count });
        self.spawn_worker()?;
        log::info!(
            "Hunt resumed at count {}, action {}",
            hunt_count,
            self.state.cursor.load(Ordering::SeqCst)
        );
        Ok(())
    }

    /// Ask the worker to pause after the current action.
    ///
    /// Returns immediately; the status becomes `Paused` once the worker
    /// reaches the action boundary.
    pub fn pause(&self) -> Result<()> {
        let status = self.status();
        if status != RunStatus::Running {
            return Err(HunterError::InvalidState(status));
        }
        self.state.pause.store(true, Ordering::SeqCst);
        log::info!("Pause requested");
        Ok(())
    }

    /// Stop the hunt. A running worker is cancelled and joined (bounded by
    /// [`STOP_TIMEOUT`]); a paused hunt is abandoned and returns to `Idle`.
    pub fn stop(&mut self) {
        if self.status() == RunStatus::Running {
            self.state.cancel.store(true, Ordering::SeqCst);
            log::info!("Stop requested");
        }

        if let Some(worker) = self.worker.take() {
            match worker.done.recv_timeout(STOP_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.handle.join().is_err() {
                        log::error!("Hunt worker panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!("Hunt worker did not stop within {:?}; detaching", STOP_TIMEOUT);
                }
            }
        }

        // paused, or the worker reached a pause point before seeing the cancel
        if self.status() == RunStatus::Paused {
            self.state.set_status(RunStatus::Idle);
            let final_count = self.hunt_count();
            self.state.emit(HuntEvent::Stopped {
                final_count,
                reason: StopReason::Requested,
            });
            log::info!("Paused hunt abandoned at count {}", final_count);
        }
    }

    /// Reset the encounter counter; only in `Idle`
    pub fn reset_counter(&self) -> Result<()> {
        let status = self.status();
        if status != RunStatus::Idle {
            return Err(HunterError::InvalidState(status));
        }
        self.state.hunt_count.store(0, Ordering::SeqCst);
        self.state.emit(HuntEvent::progress(0, 0, "Counter reset"));
        log::info!("Counter reset");
        Ok(())
    }

    /// Add back `n` regions the operator ruled false positives after a
    /// detection halt. Allowed once per detection, before the next start.
    pub fn record_false_positives(&self, n: usize) -> Result<u64> {
        let status = self.status();
        if status != RunStatus::Idle {
            return Err(HunterError::InvalidState(status));
        }
        let mut pending = self.state.pending_adjudication.lock();
        let Some(failed) = *pending else {
            return Err(HunterError::config("No detection awaiting adjudication"));
        };
        if n > failed {
            return Err(HunterError::config(format!(
                "{} false positives exceed {} failed regions",
                n, failed
            )));
        }
        *pending = None;

        let added = n as u64;
        let hunt_count = self.state.add_to_count(added);
        self.state.adjustments.lock().push(CountAdjustment {
            at: chrono::Local::now(),
            added,
            hunt_count_after: hunt_count,
        });
        self.state.emit(HuntEvent::CountAdjusted { added, hunt_count });
        log::info!("Recorded {} false positives, count now {}", n, hunt_count);
        Ok(hunt_count)
    }

    /// Capture the configuration, references and progress; not while running
    pub fn snapshot(&self) -> Result<HuntSnapshot> {
        self.ensure_mutable()?;
        Ok(HuntSnapshot {
            hunt_count: self.hunt_count(),
            cursor: self.state.cursor.load(Ordering::SeqCst),
            config: self.config(),
            references: self.references.clone(),
        })
    }

    fn reap_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                log::error!("Hunt worker panicked");
            }
        }
    }

    fn spawn_worker(&mut self) -> Result<()> {
        self.state.cancel.store(false, Ordering::SeqCst);
        self.state.pause.store(false, Ordering::SeqCst);
        self.state.set_status(RunStatus::Running);

        let (done_tx, done_rx) = mpsc::channel();
        let context = WorkerContext {
            state: self.state.clone(),
            regions: self.regions.clone(),
            references: self.references.clone(),
            timeline: self.timeline.clone(),
            keys: self.keys.clone(),
            source: self.source.clone(),
            actuator: self.actuator.clone(),
            evidence: self.evidence.clone(),
        };

        let spawned = thread::Builder::new()
            .name("shiny-hunter".to_string())
            .spawn(move || run_hunt_loop(context, done_tx));

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    handle,
                    done: done_rx,
                });
                Ok(())
            }
            Err(e) => {
                self.state.set_status(RunStatus::Idle);
                Err(e.into())
            }
        }
    }
}

impl Drop for Hunter {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

/// Everything the worker owns for one run
struct WorkerContext {
    state: Arc<EngineState>,
    regions: RegionRegistry,
    references: ReferenceSet,
    timeline: TimelineConfig,
    keys: KeyBindings,
    source: SharedSource,
    actuator: SharedActuator,
    evidence: Option<Arc<dyn EvidenceStore>>,
}

enum LoopEnd {
    Paused,
    Cancelled,
    Detection,
    Fault(HunterError),
}

enum Step {
    Continue,
    Halt,
}

fn run_hunt_loop(context: WorkerContext, done: Sender<()>) {
    let end = context.execute();
    context.finish(end);
    let _ = done.send(());
}

impl WorkerContext {
    fn execute(&self) -> LoopEnd {
        let state = &self.state;
        let countdown = Countdown::new(&state.cancel).with_events(&state.events);
        let len = self.timeline.len();
        let mut cursor = state.cursor.load(Ordering::SeqCst) % len;
        // initial delays run on the first pass after start or resume
        let mut first_pass = true;

        loop {
            if state.is_cancelled() {
                return LoopEnd::Cancelled;
            }
            if state.pause.load(Ordering::SeqCst) {
                return LoopEnd::Paused;
            }

            let action = &self.timeline.actions[cursor];
            match self.run_action(action, first_pass, &countdown) {
                Ok(Step::Continue) => {}
                Ok(Step::Halt) => return LoopEnd::Detection,
                Err(HunterError::Cancelled) => return LoopEnd::Cancelled,
                Err(e) => return LoopEnd::Fault(e),
            }

            cursor += 1;
            if cursor >= len {
                cursor = 0;
                first_pass = false;
            }
            state.cursor.store(cursor, Ordering::SeqCst);
        }
    }

    fn run_action(
        &self,
        action: &TimelineAction,
        first_pass: bool,
        countdown: &Countdown<'_>,
    ) -> Result<Step> {
        let label = action.label();
        match action.kind {
            ActionKind::InitialDelay => {
                if first_pass {
                    countdown.wait(action.delay, &label)?;
                }
            }
            ActionKind::CustomDelay => countdown.wait(action.delay, &label)?,
            ActionKind::Reset | ActionKind::QuickLoad | ActionKind::Confirm => {
                if let Some(logical) = action.kind.logical_action() {
                    let press = self.keys.press_for(logical);
                    log::debug!("Pressing {} for {}", press.key, logical);
                    self.actuator.lock().press(&press)?;
                }
                countdown.wait(action.delay, &label)?;
            }
            ActionKind::Analysis => {
                if let Step::Halt = self.run_analysis(countdown)? {
                    return Ok(Step::Halt);
                }
                countdown.wait(action.delay, &label)?;
            }
        }
        Ok(Step::Continue)
    }

    fn run_analysis(&self, countdown: &Countdown<'_>) -> Result<Step> {
        let state = &self.state;
        let round = ConfirmationRound::new(&self.regions, &self.references, &state.thresholds)
            .with_retry(self.timeline.retry_count, self.timeline.retry_interval)
            .with_evidence(self.evidence.as_deref());

        let outcome = {
            let mut source = self.source.lock();
            round.run(&mut **source, countdown)?
        };

        let delta = outcome.success_count as u64;
        let hunt_count = state.add_to_count(delta);
        *state.last_outcome.lock() = Some(outcome.clone());
        state.emit(HuntEvent::Outcome(outcome.clone()));

        if let Some(message) = &outcome.capture_error {
            return Err(HunterError::capture(message.clone()));
        }

        if outcome.has_failure {
            *state.pending_adjudication.lock() = Some(outcome.failed_regions.len());
            log::warn!(
                "Possible shiny: {} of {} regions failed after {} attempts (count {})",
                outcome.failed_regions.len(),
                outcome.total_regions,
                outcome.attempt_count,
                hunt_count
            );
            return Ok(Step::Halt);
        }

        state.emit(HuntEvent::progress(
            hunt_count,
            delta,
            format!("Round passed, {} encounters so far", hunt_count),
        ));
        log::info!("Round passed: +{} (count {})", delta, hunt_count);
        Ok(Step::Continue)
    }

    fn finish(&self, end: LoopEnd) {
        let state = &self.state;
        let final_count = state.hunt_count();
        match end {
            LoopEnd::Paused => {
                state.pause.store(false, Ordering::SeqCst);
                state.set_status(RunStatus::Paused);
                state.emit(HuntEvent::Paused {
                    hunt_count: final_count,
                });
                log::info!("Hunt paused at count {}", final_count);
            }
            LoopEnd::Cancelled => {
                state.set_status(RunStatus::Stopped);
                state.emit(HuntEvent::Stopped {
                    final_count,
                    reason: StopReason::Requested,
                });
                log::info!("Hunt stopped, total count {}", final_count);
            }
            LoopEnd::Detection => {
                state.set_status(RunStatus::Idle);
                state.emit(HuntEvent::Stopped {
                    final_count,
                    reason: StopReason::Detection,
                });
                log::info!("Hunt halted for adjudication at count {}", final_count);
            }
            LoopEnd::Fault(e) => {
                let kind = e.fault_kind().unwrap_or(FaultKind::Configuration);
                state.set_status(RunStatus::Idle);
                state.emit(HuntEvent::Stopped {
                    final_count,
                    reason: StopReason::Fault {
                        kind,
                        message: e.to_string(),
                    },
                });
                log::error!("Hunt aborted ({} fault) at count {}: {}", kind, final_count, e);
            }
        }
    }
}
