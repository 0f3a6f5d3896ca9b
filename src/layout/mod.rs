//! Background force-directed layout.
//!
//! One worker thread per engine iterates the physics while the graph is
//! dirty and idles on a condition variable once it settles. `stop()` joins
//! the worker, so no position write can race a mutation that follows it.

mod collision;
mod forces;
mod signal;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::LayoutConfig;
use crate::error::{CoreError, Result};
use crate::graph::{SharedGraph, lock_graph};

use forces::CoolingState;
pub use forces::StepReport;
pub use signal::{LayoutPhase, LayoutSignal};
use signal::{Interrupt, Wake};

const SLEEP_STEP: Duration = Duration::from_millis(5);

/// Counters describing what the worker has done so far.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutStats {
    pub runs: u64,
    pub iterations: u64,
    pub panics: u64,
    pub last_report: StepReport,
    pub sleep_interval: Duration,
}

/// State the worker thread owns a share of. Kept apart from the engine so
/// dropping the last engine handle can still cancel and join the worker.
#[derive(Clone)]
struct WorkerContext {
    graph: SharedGraph,
    signal: Arc<LayoutSignal>,
    config: LayoutConfig,
    stats: Arc<Mutex<LayoutStats>>,
}

struct EngineInner {
    context: WorkerContext,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the layout worker. Clones share the same worker.
#[derive(Clone)]
pub struct LayoutEngine {
    inner: Arc<EngineInner>,
}

impl LayoutEngine {
    pub fn new(graph: SharedGraph, config: LayoutConfig) -> Self {
        let signal = lock_graph(&graph).signal();
        Self {
            inner: Arc::new(EngineInner {
                context: WorkerContext {
                    graph,
                    signal,
                    config,
                    stats: Arc::new(Mutex::new(LayoutStats::default())),
                },
                worker: Mutex::new(None),
            }),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.inner.context.config
    }

    /// Spawns the worker if it is not already running. The first run always
    /// iterates, even if nothing is dirty.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }
        if let Some(finished) = worker.take()
            && finished.join().is_err()
        {
            warn!("previous layout worker had panicked");
        }

        self.inner.context.signal.arm();
        let context = self.inner.context.clone();
        let handle = thread::Builder::new()
            .name("starspire-layout".to_owned())
            .spawn(move || run_worker(&context))
            .map_err(|err| CoreError::Conflict(format!("failed to spawn layout worker: {err}")))?;
        *worker = Some(handle);
        info!("layout started");
        Ok(())
    }

    /// Cancels the worker and blocks until it has exited. Must not be called
    /// while holding the graph lock.
    pub fn stop(&self) {
        let handle = self.worker().take();
        let Some(handle) = handle else {
            return;
        };
        self.inner.context.signal.cancel();
        if handle.join().is_err() {
            warn!("layout worker panicked outside an iteration");
        }
        self.inner.context.signal.set_phase(LayoutPhase::Stopped);
        info!("layout stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn phase(&self) -> LayoutPhase {
        if self.is_running() {
            self.inner.context.signal.phase()
        } else {
            LayoutPhase::Stopped
        }
    }

    pub fn mark_dirty(&self) {
        self.inner.context.signal.mark_dirty();
    }

    pub fn set_paused(&self, paused: bool) {
        self.inner.context.signal.set_paused(paused);
        debug!(paused, "layout pause toggled");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.context.signal.is_paused()
    }

    pub fn stats(&self) -> LayoutStats {
        *self
            .inner
            .context
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stops the worker until the returned guard is dropped. The worker is
    /// restarted on drop only if it was running when the guard was taken.
    pub fn pause(&self) -> LayoutPause {
        let resume = self.is_running();
        self.stop();
        LayoutPause {
            engine: self.clone(),
            resume,
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.context.signal.cancel();
        let handle = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

/// Scoped stop of the layout worker. Structural mutations happen while one
/// of these is alive.
#[must_use = "the layout restarts as soon as the guard is dropped"]
pub struct LayoutPause {
    engine: LayoutEngine,
    resume: bool,
}

impl LayoutPause {
    pub fn will_resume(&self) -> bool {
        self.resume
    }
}

impl Drop for LayoutPause {
    fn drop(&mut self) {
        if self.resume
            && let Err(err) = self.engine.start()
        {
            error!("failed to restart layout: {err}");
        }
    }
}

enum RunEnd {
    Stable,
    Interrupted,
    Cancelled,
}

fn run_worker(context: &WorkerContext) {
    let signal = &context.signal;
    loop {
        signal.set_phase(LayoutPhase::Idle);
        if signal.wait_for_work() == Wake::Cancelled {
            break;
        }
        signal.set_phase(LayoutPhase::Running);
        match run_until_stable(context) {
            RunEnd::Stable => {}
            RunEnd::Interrupted => signal.mark_dirty(),
            RunEnd::Cancelled => break,
        }
    }
    signal.set_phase(LayoutPhase::Stopped);
}

fn run_until_stable(context: &WorkerContext) -> RunEnd {
    let config = &context.config;
    let signal = &context.signal;
    let mut cooling = CoolingState::new(config);
    let mut sleep = Duration::from_millis(config.initial_sleep_ms);
    let mut iteration = 0;
    let started = Instant::now();

    update_stats(context, |stats| stats.runs += 1);

    while iteration < config.max_iterations {
        match signal.interrupt() {
            Interrupt::Cancelled => return RunEnd::Cancelled,
            Interrupt::Paused => return RunEnd::Interrupted,
            Interrupt::None => {}
        }
        if signal.take_dirty() {
            iteration = 0;
            cooling = CoolingState::new(config);
        }

        let tick = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut graph = lock_graph(&context.graph);
            forces::step(&mut graph, config, iteration, &mut cooling)
        }));
        let report = match outcome {
            Ok(report) => report,
            Err(_) => {
                error!(iteration, "layout iteration panicked; treating layout as stable");
                update_stats(context, |stats| stats.panics += 1);
                return RunEnd::Stable;
            }
        };
        iteration += 1;
        update_stats(context, |stats| {
            stats.iterations += 1;
            stats.last_report = report;
            stats.sleep_interval = sleep;
        });

        if report.is_stable(config) {
            debug!(
                iterations = iteration,
                movement = report.system_movement,
                max_velocity = report.max_velocity,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "layout settled"
            );
            return RunEnd::Stable;
        }

        sleep = adapt_sleep(sleep, tick.elapsed(), config);
        match signal.sleep(sleep) {
            Interrupt::Cancelled => return RunEnd::Cancelled,
            Interrupt::Paused => return RunEnd::Interrupted,
            Interrupt::None => {}
        }
    }

    debug!(iterations = iteration, "layout hit the iteration cap");
    RunEnd::Stable
}

/// Nudges the inter-iteration sleep so that work plus sleep stays within
/// the configured iteration window.
fn adapt_sleep(sleep: Duration, work: Duration, config: &LayoutConfig) -> Duration {
    let total = work + sleep;
    if total < config.min_iteration_time() {
        sleep + SLEEP_STEP
    } else if total > config.max_iteration_time() {
        sleep.saturating_sub(SLEEP_STEP)
    } else {
        sleep
    }
}

fn update_stats(context: &WorkerContext, update: impl FnOnce(&mut LayoutStats)) {
    let mut stats = context.stats.lock().unwrap_or_else(PoisonError::into_inner);
    update(&mut stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;
    use crate::graph::{Graph, NodeKind};
    use crate::model::{DocumentId, EntityId};

    fn engine(nodes: u32) -> (SharedGraph, LayoutEngine) {
        let mut graph = Graph::new(
            &CanvasConfig {
                seed: Some(5),
                ..CanvasConfig::default()
            },
            4.0,
        );
        let ids = (0..nodes)
            .map(|index| graph.add_node(NodeKind::Document(DocumentId(index)), "n"))
            .collect::<Vec<_>>();
        for pair in ids.windows(2) {
            graph.add_edge_entity(pair[0], pair[1], EntityId(0), 1.0).unwrap();
        }
        let shared = graph.into_shared();
        let config = LayoutConfig {
            min_iteration_ms: 0,
            max_iteration_ms: 2,
            initial_sleep_ms: 0,
            ..LayoutConfig::default()
        };
        let engine = LayoutEngine::new(Arc::clone(&shared), config);
        (shared, engine)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn adaptive_sleep_stays_in_the_window() {
        let config = LayoutConfig::default();
        let fast = adapt_sleep(Duration::ZERO, Duration::from_millis(1), &config);
        assert_eq!(fast, SLEEP_STEP);
        let slow = adapt_sleep(Duration::from_millis(20), Duration::from_millis(60), &config);
        assert_eq!(slow, Duration::from_millis(15));
        let fine = adapt_sleep(Duration::from_millis(20), Duration::from_millis(10), &config);
        assert_eq!(fine, Duration::from_millis(20));
    }

    #[test]
    fn worker_settles_and_stops_while_idle() {
        let (_graph, engine) = engine(6);
        engine.start().unwrap();
        assert!(wait_for(|| engine.phase() == LayoutPhase::Idle && engine.stats().runs > 0));

        let stopping = Instant::now();
        engine.stop();
        assert!(stopping.elapsed() < Duration::from_secs(2));
        assert!(!engine.is_running());
        assert_eq!(engine.phase(), LayoutPhase::Stopped);
    }

    #[test]
    fn dirty_marks_wake_an_idle_worker() {
        let (graph, engine) = engine(3);
        engine.start().unwrap();
        assert!(wait_for(|| engine.phase() == LayoutPhase::Idle && engine.stats().runs > 0));
        let runs = engine.stats().runs;

        let node = lock_graph(&graph).node_for(NodeKind::Document(DocumentId(0))).unwrap();
        lock_graph(&graph)
            .move_node(node, eframe::egui::vec2(100.0, 100.0))
            .unwrap();
        assert!(wait_for(|| engine.stats().runs > runs));
        engine.stop();
    }

    struct PanicOnMove;

    impl crate::graph::RenderFeedback for PanicOnMove {
        fn node_moved(&self, _node: crate::model::NodeId, _position: eframe::egui::Vec2) {
            panic!("view blew up while painting a move");
        }
    }

    #[test]
    fn a_panicking_iteration_leaves_the_worker_idle_and_stoppable() {
        let (graph, engine) = engine(4);
        lock_graph(&graph).set_feedback(Some(Arc::new(PanicOnMove)));

        engine.start().unwrap();
        assert!(wait_for(|| engine.stats().panics == 1 && engine.phase() == LayoutPhase::Idle));
        let stats = engine.stats();
        assert_eq!(stats.panics, 1);
        assert_eq!(stats.runs, 1);
        assert!(engine.is_running());

        let stopping = Instant::now();
        engine.stop();
        assert!(stopping.elapsed() < Duration::from_secs(2));
        assert_eq!(engine.phase(), LayoutPhase::Stopped);

        // The panic poisoned the graph lock; it must still be usable.
        let mut graph = lock_graph(&graph);
        graph.set_feedback(None);
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn pause_guard_restarts_only_a_running_worker() {
        let (_graph, engine) = engine(2);
        {
            let guard = engine.pause();
            assert!(!guard.will_resume());
        }
        assert!(!engine.is_running());

        engine.start().unwrap();
        {
            let guard = engine.pause();
            assert!(guard.will_resume());
            assert!(!engine.is_running());
        }
        assert!(engine.is_running());
        engine.stop();
    }
}
