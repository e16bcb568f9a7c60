// src/core/budget.rs — Rolling-window spend throttle
//
// Tracks (timestamp, cost) entries over a trailing window and advises callers
// how long to wait before a call of a given estimated cost fits under the
// ceiling. Admission reserves the estimate so concurrently dispatched calls
// cannot jointly overshoot; `record` swaps the reservation for the real cost.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::infra::errors::EvolveError;

/// Float slack when comparing accumulated spend against the ceiling.
const EPSILON_USD: f64 = 1e-9;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct BudgetConfig {
    pub usd_per_hour: f64,
    pub window: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            usd_per_hour: 2.0,
            window: DEFAULT_WINDOW,
        }
    }
}

impl BudgetConfig {
    /// Spend allowed within one window (the hourly rate scaled to the window length).
    pub fn ceiling(&self) -> f64 {
        self.usd_per_hour * self.window.as_secs_f64() / 3600.0
    }
}

impl From<&crate::infra::config::BudgetConfig> for BudgetConfig {
    fn from(cfg: &crate::infra::config::BudgetConfig) -> Self {
        Self {
            usd_per_hour: cfg.usd_per_hour,
            window: Duration::from_secs(cfg.window_secs),
        }
    }
}

/// Handle for an admitted call's reserved spend. Pass it back to `record`;
/// dropping it releases the reservation.
#[derive(Debug)]
#[must_use = "a reservation holds budget until it is recorded or released"]
pub struct Reservation {
    id: u64,
    estimated: f64,
    ledger: Weak<Ledger>,
}

impl Reservation {
    pub fn estimated(&self) -> f64 {
        self.estimated
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Some(ledger) = self.ledger.upgrade() {
            ledger.release(self.id);
        }
    }
}

#[derive(Debug)]
pub enum Admission {
    /// Fits now; the estimate is reserved.
    Admitted(Reservation),
    /// Fits after this long, assuming no other spend.
    Wait(Duration),
    /// Blocked by in-flight reservations alone; fits once enough of them settle.
    Pending,
    /// The estimate alone exceeds the ceiling; no wait will ever be enough.
    Unsatisfiable { estimated: f64, ceiling: f64 },
}

/// Result of waiting for admission on behalf of the engine.
#[derive(Debug)]
pub enum Acquired {
    Ready(Reservation),
    Exhausted { wait: Duration },
    Cancelled,
}

#[derive(Debug)]
struct Spend {
    id: u64,
    at: Instant,
    cost: f64,
    pending: bool,
}

#[derive(Debug, Default)]
struct BudgetState {
    entries: Vec<Spend>,
    next_id: u64,
    total_spent: f64,
    calls: u64,
}

impl BudgetState {
    fn prune(&mut self, now: Instant, window: Duration) {
        self.entries
            .retain(|e| e.pending || e.at + window > now);
    }

    fn window_spend(&self) -> f64 {
        self.entries.iter().map(|e| e.cost).sum()
    }
}

/// Shared by the throttle and every outstanding reservation.
#[derive(Debug)]
struct Ledger {
    state: Mutex<BudgetState>,
    /// Woken whenever a reservation is recorded or released.
    settled: Notify,
}

impl Ledger {
    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: u64) {
        self.lock().entries.retain(|e| e.id != id);
        self.settled.notify_waiters();
    }
}

/// Process-wide budget gate. Every operation is one critical section.
#[derive(Debug)]
pub struct BudgetThrottle {
    ceiling: f64,
    window: Duration,
    ledger: Arc<Ledger>,
}

impl BudgetThrottle {
    pub fn new(config: &BudgetConfig) -> Self {
        Self::with_ceiling(config.ceiling(), config.window)
    }

    pub fn with_ceiling(ceiling: f64, window: Duration) -> Self {
        Self {
            ceiling,
            window,
            ledger: Arc::new(Ledger {
                state: Mutex::new(BudgetState::default()),
                settled: Notify::new(),
            }),
        }
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.ledger.lock()
    }

    pub fn admit(&self, estimated_cost: f64) -> Admission {
        self.admit_at(Instant::now(), estimated_cost)
    }

    pub fn admit_at(&self, now: Instant, estimated_cost: f64) -> Admission {
        let estimated = estimated_cost.max(0.0);
        if estimated > self.ceiling + EPSILON_USD {
            return Admission::Unsatisfiable {
                estimated,
                ceiling: self.ceiling,
            };
        }

        let mut state = self.lock();
        state.prune(now, self.window);
        let spent = state.window_spend();

        if spent + estimated <= self.ceiling + EPSILON_USD {
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push(Spend {
                id,
                at: now,
                cost: estimated,
                pending: true,
            });
            tracing::debug!(
                estimated_usd = estimated,
                window_spend_usd = spent,
                "Budget admitted call"
            );
            return Admission::Admitted(Reservation {
                id,
                estimated,
                ledger: Arc::downgrade(&self.ledger),
            });
        }

        // Walk completed spends oldest-first until enough has expired.
        let mut completed: Vec<&Spend> = state.entries.iter().filter(|e| !e.pending).collect();
        completed.sort_by_key(|e| e.at);
        let mut remaining = spent;
        for entry in completed {
            remaining -= entry.cost;
            if remaining + estimated <= self.ceiling + EPSILON_USD {
                let wait = (entry.at + self.window).saturating_duration_since(now);
                tracing::debug!(
                    estimated_usd = estimated,
                    wait_ms = wait.as_millis() as u64,
                    "Budget advised wait"
                );
                return Admission::Wait(wait);
            }
        }

        // Only in-flight reservations stand in the way. Their actual cost is
        // not known until they settle.
        tracing::debug!(estimated_usd = estimated, "Budget blocked by in-flight calls");
        Admission::Pending
    }

    /// Replace a reservation with the call's actual cost, stamped now.
    pub fn record(&self, reservation: Reservation, actual_cost: f64) {
        self.record_at(Instant::now(), reservation, actual_cost);
    }

    pub fn record_at(&self, now: Instant, mut reservation: Reservation, actual_cost: f64) {
        // Recording settles the reservation; its drop must not release it again.
        reservation.ledger = Weak::new();
        let actual = actual_cost.max(0.0);
        let mut state = self.lock();
        match state.entries.iter_mut().find(|e| e.id == reservation.id) {
            Some(entry) => {
                entry.cost = actual;
                entry.at = now;
                entry.pending = false;
            }
            None => state.entries.push(Spend {
                id: reservation.id,
                at: now,
                cost: actual,
                pending: false,
            }),
        }
        state.total_spent += actual;
        state.calls += 1;
        drop(state);
        self.ledger.settled.notify_waiters();
    }

    /// Drop a reservation whose call never ran or produced nothing billable.
    pub fn release(&self, reservation: Reservation) {
        drop(reservation);
    }

    pub fn spent_in_window(&self) -> f64 {
        let mut state = self.lock();
        state.prune(Instant::now(), self.window);
        state.window_spend()
    }

    pub fn available(&self) -> f64 {
        (self.ceiling - self.spent_in_window()).max(0.0)
    }

    /// Everything ever recorded, independent of the window.
    pub fn total_spent(&self) -> f64 {
        self.lock().total_spent
    }

    pub fn recorded_calls(&self) -> u64 {
        self.lock().calls
    }

    pub fn in_flight(&self) -> usize {
        self.lock().entries.iter().filter(|e| e.pending).count()
    }

    /// Wait for admission, sleeping through advised waits up to `max_wait`.
    ///
    /// Any settled reservation wakes the waiter early. A wait longer than
    /// `max_wait` is exhaustion only once nothing is left in flight. An
    /// unsatisfiable estimate is a configuration error for the whole run.
    pub async fn acquire(
        &self,
        estimated_cost: f64,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<Acquired, EvolveError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(Acquired::Cancelled);
            }
            // Registered before admission so a settle in between is not missed.
            let settled = self.ledger.settled.notified();
            match self.admit(estimated_cost) {
                Admission::Admitted(reservation) => return Ok(Acquired::Ready(reservation)),
                Admission::Unsatisfiable { estimated, ceiling } => {
                    return Err(EvolveError::config(format!(
                        "a single call estimated at ${:.4} exceeds the budget ceiling of ${:.4} per window",
                        estimated, ceiling
                    )));
                }
                Admission::Wait(wait) if wait > max_wait => {
                    if self.in_flight() == 0 {
                        return Ok(Acquired::Exhausted { wait });
                    }
                    tokio::select! {
                        _ = settled => {}
                        _ = cancel.cancelled() => return Ok(Acquired::Cancelled),
                    }
                }
                Admission::Pending => {
                    tokio::select! {
                        _ = settled => {}
                        _ = cancel.cancelled() => return Ok(Acquired::Cancelled),
                    }
                }
                Admission::Wait(wait) => {
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = settled => {}
                        _ = cancel.cancelled() => return Ok(Acquired::Cancelled),
                    }
                }
            }
        }
    }
}
