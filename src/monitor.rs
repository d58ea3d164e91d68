//! ==============================================================================
//! monitor.rs - mount/unmount lifecycle and the single owner of view state
//! ==============================================================================
//!
//! purpose:
//!     wires the pollers, reconcilers and animator together. one task owns
//!     every piece of mutable state (CrossingView) and serializes the two
//!     independent cadences through a single select! loop:
//!     - poll events arrive whenever responses complete (network cadence)
//!     - animator ticks fire every tick period (local cadence)
//!     a slow response never delays a tick because the requests themselves
//!     run on the pollers' tasks, not here.
//!
//! architecture:
//!
//! ```text
//!     ┌──────────────┐   FeedEvent    ┌─────────────────────────┐
//!     │ train poller ├───────────────►│                         │
//!     └──────────────┘                │   monitor task          │  watch   ┌───────────┐
//!     ┌──────────────┐   FeedEvent    │   (CrossingView owner)  ├─────────►│ presenter │
//!     │ signal poller├───────────────►│   + animator tick       │ snapshot └───────────┘
//!     └──────────────┘                └─────────────────────────┘
//! ```
//!
//! relationships:
//!     - uses: poller.rs, reconciler.rs, animator.rs, source.rs
//!     - publishes: presenter.rs (DashboardSnapshot)
//!     - used by: main.rs (mount at startup, unmount on ctrl-c)
//!
//! ==============================================================================

use crate::animator::{Animator, GateArm, SignalCycle, SignalPhase};
use crate::config::{Crossing, MonitorConfig, SourceMode, TimeFormat};
use crate::domain::{PollRecord, SignalCategory, SignalStatus};
use crate::poller::{FeedEvent, FeedHealth, FeedId, Poller, PollerSettings};
use crate::presenter::{CyclePanel, DashboardSnapshot, SignalPanel, TrainPanel};
use crate::reconciler::{Applied, Reconciler};
use crate::source::{RecordSource, SearchSource, SimulatedTrainSource};

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

const EVENT_BUFFER: usize = 256;

// ==============================================================================
// view state
// ==============================================================================

/// where the signal panel gets its truth
pub enum SignalDriver {
    Live(Reconciler),
    /// no feed configured: local GREEN/RED cycle
    Simulated(SignalCycle),
}

pub struct CrossingView {
    train: Reconciler,
    signal: SignalDriver,
    animator: Animator,
    gate: GateArm,
    train_health: FeedHealth,
    signal_health: FeedHealth,
    crossings: Vec<Crossing>,
    time_format: TimeFormat,
}

impl CrossingView {
    pub fn new(config: &MonitorConfig) -> Self {
        let signal = match config.signal.mode {
            SourceMode::Live => SignalDriver::Live(Reconciler::new(PollRecord::sentinel(config.signal_anchor()))),
            SourceMode::Simulated => {
                SignalDriver::Simulated(SignalCycle::new(config.signal.green_seconds, config.signal.red_seconds))
            }
        };
        Self {
            train: Reconciler::new(PollRecord::sentinel(config.train.start)),
            signal,
            animator: Animator::new(config.animation.tick_period()),
            gate: GateArm::new(config.animation.gate_close_seconds, config.animation.gate_open_seconds),
            train_health: FeedHealth::default(),
            signal_health: FeedHealth::default(),
            crossings: config.crossings.clone(),
            time_format: config.animation.time_format,
        }
    }

    pub fn signal_is_live(&self) -> bool {
        matches!(self.signal, SignalDriver::Live(_))
    }

    /// apply one poller event; returns the reconciler verdict for records
    pub fn apply(&mut self, event: FeedEvent) -> Option<Applied> {
        match event {
            FeedEvent::Health { feed: FeedId::Train, health } => {
                self.train_health = health;
                None
            }
            FeedEvent::Health { feed: FeedId::Signal, health } => {
                self.signal_health = health;
                None
            }
            FeedEvent::Record { feed: FeedId::Train, record } => Some(self.train.on_poll_record(record)),
            FeedEvent::Record { feed: FeedId::Signal, record } => match &mut self.signal {
                SignalDriver::Live(reconciler) => {
                    let before = reconciler.category();
                    let applied = reconciler.on_poll_record(record);
                    let after = reconciler.category();
                    if before != after {
                        info!("[MONITOR] crossing {:?} -> {:?}", before, after);
                    }
                    Some(applied)
                }
                SignalDriver::Simulated(_) => {
                    debug!("[MONITOR] ignoring signal record, signal is simulated");
                    None
                }
            },
        }
    }

    /// one animator period
    pub fn tick(&mut self) {
        let period = self.animator.period();
        match &mut self.signal {
            SignalDriver::Live(reconciler) => self.animator.advance(reconciler.state_mut()),
            SignalDriver::Simulated(cycle) => cycle.advance(period),
        }
        let category = self.signal_category();
        self.gate.advance(period, category);
    }

    pub fn signal_category(&self) -> SignalCategory {
        match &self.signal {
            SignalDriver::Live(reconciler) => reconciler.category(),
            SignalDriver::Simulated(cycle) => cycle.phase().category(),
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let latest = &self.train.state().latest;
        let train = TrainPanel {
            train_id: latest.source_id.clone(),
            position: latest.position,
            speed: latest.speed,
            linestring: latest.heading_linestring.clone(),
            updated: latest.timestamp.as_str().to_string(),
        };

        let signal = match &self.signal {
            SignalDriver::Live(reconciler) => {
                let state = reconciler.state();
                SignalPanel {
                    category: reconciler.category(),
                    displayed_seconds: state.displayed_seconds,
                    is_counting: state.is_counting,
                    light: state.latest.signal_status,
                    sentence: state.latest.status_sentence.clone(),
                    phase: None,
                    cycle: None,
                    updated: state.latest.timestamp.as_str().to_string(),
                }
            }
            SignalDriver::Simulated(cycle) => {
                let phase = cycle.phase();
                SignalPanel {
                    category: phase.category(),
                    displayed_seconds: cycle.remaining(),
                    is_counting: true,
                    light: match phase {
                        SignalPhase::Green => SignalStatus::Green,
                        SignalPhase::Red => SignalStatus::Red,
                    },
                    sentence: None,
                    phase: Some(phase),
                    cycle: Some(CyclePanel {
                        green_seconds: cycle.green_seconds(),
                        red_seconds: cycle.red_seconds(),
                        total_cycle: cycle.total_cycle(),
                    }),
                    updated: String::new(),
                }
            }
        };

        DashboardSnapshot {
            train,
            signal,
            gate_angle: self.gate.angle(),
            train_health: self.train_health,
            signal_health: self.signal_health,
            crossings: self.crossings.clone(),
            time_format: self.time_format,
        }
    }
}

// ==============================================================================
// sources
// ==============================================================================

#[derive(Default)]
pub struct Sources {
    pub train: Option<Arc<dyn RecordSource>>,
    pub signal: Option<Arc<dyn RecordSource>>,
}

impl Sources {
    /// search-index sources for live feeds, a random walk for a simulated train
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let timeout = config.polling.request_timeout();

        let train: Arc<dyn RecordSource> = match config.train.mode {
            SourceMode::Live => Arc::new(SearchSource::new(
                &config.search.endpoint,
                config.feeds.train.clone(),
                config.train.start,
                timeout,
            )?),
            SourceMode::Simulated => Arc::new(SimulatedTrainSource::new(
                config.train.start,
                config.train.step_degrees,
                config.train.step_interval(),
            )),
        };

        let signal: Option<Arc<dyn RecordSource>> = match config.signal.mode {
            SourceMode::Live => Some(Arc::new(SearchSource::new(
                &config.search.endpoint,
                config.feeds.signal.clone(),
                config.signal_anchor(),
                timeout,
            )?)),
            SourceMode::Simulated => None,
        };

        Ok(Self {
            train: Some(train),
            signal,
        })
    }
}

// ==============================================================================
// mount / unmount
// ==============================================================================

pub struct Monitor;

impl Monitor {
    /// start both pollers and the view task
    pub fn mount(config: &MonitorConfig, sources: Sources) -> MonitorHandle {
        let view = CrossingView::new(config);
        let (snapshot_tx, snapshot_rx) = watch::channel(view.snapshot());
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        let settings = PollerSettings {
            interval: config.polling.interval(),
            unavailable_after: config.polling.unavailable_after,
            max_in_flight: config.polling.max_in_flight,
            show_records: config.logging.show_records,
        };

        let mut pollers = Vec::new();
        if let Some(source) = sources.train {
            pollers.push(Poller::start(FeedId::Train, source, settings.clone(), events_tx.clone()));
        }
        match (view.signal_is_live(), sources.signal) {
            (true, Some(source)) => {
                pollers.push(Poller::start(FeedId::Signal, source, settings, events_tx.clone()));
            }
            (true, None) => info!("[MONITOR] no signal source, countdown will hold at zero"),
            (false, _) => info!("[MONITOR] signal simulated locally"),
        }
        drop(events_tx);

        let mounted = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let period = config.animation.tick_period();
        let task = tokio::spawn(run(view, period, events_rx, snapshot_tx, shutdown_rx, mounted.clone()));

        info!("[MONITOR] mounted with {} poller(s), tick {:?}", pollers.len(), period);
        MonitorHandle {
            snapshot_rx,
            pollers,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            mounted,
        }
    }
}

async fn run(
    mut view: CrossingView,
    period: Duration,
    mut events: mpsc::Receiver<FeedEvent>,
    snapshots: watch::Sender<DashboardSnapshot>,
    mut shutdown: oneshot::Receiver<()>,
    mounted: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut feeds_open = true;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if !mounted.load(Ordering::SeqCst) {
                    break;
                }
                view.tick();
            }
            event = events.recv(), if feeds_open => {
                let Some(event) = event else {
                    debug!("[MONITOR] all pollers gone, animating only");
                    feeds_open = false;
                    continue;
                };
                if !mounted.load(Ordering::SeqCst) {
                    break;
                }
                view.apply(event);
            }
        }
        snapshots.send_replace(view.snapshot());
    }
    debug!("[MONITOR] view task exiting");
}

/// owner-side handle for a mounted view
pub struct MonitorHandle {
    snapshot_rx: watch::Receiver<DashboardSnapshot>,
    pollers: Vec<Poller>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    mounted: Arc<AtomicBool>,
}

impl MonitorHandle {
    /// latest published snapshot
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot_rx.clone()
    }

    fn cancel(&mut self) {
        self.mounted.store(false, Ordering::SeqCst);
        for poller in self.pollers.iter().filter(|p| !p.is_stopped()) {
            debug!("[MONITOR] stopping {} poller", poller.feed());
            poller.stop();
        }
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// stop both timers and wait until the view task is gone
    pub async fn unmount(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("[MONITOR] unmounted");
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
