//! The decay scheduler: one full-population pass per tick.
//!
//! Periodic firings and the manual REST trigger share `run_cycle` and its
//! non-overlap guard. A firing that arrives while a cycle is still running is
//! dropped, never queued. Failures are isolated per pet: one bad write never
//! aborts the rest of the pass.

mod decay;

pub use decay::StatDecayEngine;

use crate::broadcast::Broadcaster;
use crate::config::TickConfig;
use crate::notify::{self, ThresholdNotifier};
use crate::presence::PresenceRegistry;
use crate::store::PetStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{error, info, warn};

/// Result of one trigger of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The pass ran; this many pets were decayed and persisted
    Completed(usize),
    /// Another cycle held the guard; this firing was dropped
    InProgress,
}

impl CycleOutcome {
    /// Updated-pet count as reported to REST callers (a dropped firing is 0)
    pub fn updated(&self) -> usize {
        match self {
            CycleOutcome::Completed(count) => *count,
            CycleOutcome::InProgress => 0,
        }
    }
}

/// Drives the decay engine over the whole population on a fixed period.
///
/// The non-overlap guard is per-process. Running several instances of this
/// scheduler against one shared store needs an external lock or a single
/// designated scheduler; this type does not provide that.
pub struct TickScheduler {
    store: Arc<PetStore>,
    engine: Arc<StatDecayEngine>,
    notifier: Arc<ThresholdNotifier>,
    presence: Arc<PresenceRegistry>,
    broadcaster: Broadcaster,
    /// Non-overlap guard: held for the duration of one cycle
    cycle_lock: Mutex<()>,
    interval: Duration,
    deadline: Duration,
}

impl TickScheduler {
    pub fn new(
        store: Arc<PetStore>,
        engine: Arc<StatDecayEngine>,
        notifier: Arc<ThresholdNotifier>,
        presence: Arc<PresenceRegistry>,
        broadcaster: Broadcaster,
        config: &TickConfig,
    ) -> Self {
        Self {
            store,
            engine,
            notifier,
            presence,
            broadcaster,
            cycle_lock: Mutex::new(()),
            interval: Duration::from_secs(config.interval_seconds),
            deadline: Duration::from_secs(config.cycle_deadline_seconds),
        }
    }

    /// Run one full-population decay pass.
    ///
    /// Shared by the periodic timer and the manual trigger. Returns
    /// `InProgress` without touching anything when a cycle already holds the
    /// guard.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            warn!("tick cycle already in progress, dropping trigger");
            return CycleOutcome::InProgress;
        };

        let started = Instant::now();

        let pets = match self.store.list_all() {
            Ok(pets) => pets,
            Err(e) => {
                error!(error = %e, "failed to load pet population, skipping cycle");
                return CycleOutcome::Completed(0);
            }
        };

        let total = pets.len();
        let mut updated = 0;

        for pet in pets {
            // Soft deadline: a stalled store must not starve the next firing
            if started.elapsed() >= self.deadline {
                warn!(
                    updated,
                    total,
                    deadline_secs = self.deadline.as_secs(),
                    "cycle deadline exceeded, stopping early"
                );
                break;
            }

            match self.engine.decay(&pet) {
                Ok(Some((old, new))) => {
                    updated += 1;
                    notify::dispatch_stat_change(
                        &self.notifier,
                        &self.presence,
                        &self.broadcaster,
                        &pet,
                        old,
                        new,
                    );
                }
                Ok(None) => {
                    // Not yet initialized; picked up once it gets a name
                }
                Err(e) => {
                    // Skipped this cycle, retried next cycle from fresh state
                    warn!(pet_id = %pet.id, error = %e, "decay failed for pet, continuing cycle");
                }
            }
        }

        info!(
            updated,
            total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tick cycle complete"
        );

        CycleOutcome::Completed(updated)
    }

    /// Run the periodic tick loop. Never returns.
    ///
    /// The first firing comes one full period after startup, so a restart
    /// does not immediately decay the whole world.
    pub async fn run_tick_loop(self: Arc<Self>) {
        info!(
            interval_seconds = self.interval.as_secs(),
            "starting tick scheduler"
        );

        let mut ticker = interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        // Skip missed firings instead of bursting to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }
}
