use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::market::MarketCoin;
use crate::models::snapshot::PortfolioSnapshot;
use crate::models::view::DashboardViewModel;
use crate::PortfolioDashboard;

const STARTUP_FAILURE_NOTICE: &str = "Failed to load cryptocurrency data. Showing sample data instead.";
const MANUAL_FAILURE_NOTICE: &str = "Failed to refresh data. Please try again.";
const MANUAL_SUCCESS_NOTICE: &str = "Data refreshed successfully!";

/// Manual triggers buffered while the scheduler is busy; extras are coalesced anyway.
const TRIGGER_BUFFER: usize = 8;

/// What started a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshTrigger {
    Startup,
    Timer,
    Manual,
}

impl std::fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshTrigger::Startup => write!(f, "startup"),
            RefreshTrigger::Timer => write!(f, "timer"),
            RefreshTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Pipeline state.
///
/// ```text
/// Idle ──startup/manual──▶ Loading ──ok──▶ Ready
///                             │  ▲           │
///                           fail └──timer/manual──┘
///                             ▼              │
///                          Degraded ─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle,
    Loading,
    Ready,
    Degraded,
}

impl std::fmt::Display for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshState::Idle => write!(f, "idle"),
            RefreshState::Loading => write!(f, "loading"),
            RefreshState::Ready => write!(f, "ready"),
            RefreshState::Degraded => write!(f, "degraded"),
        }
    }
}

/// Transition bookkeeping, independent of any runtime.
///
/// At most one cycle is in flight: `begin` while `Loading` is refused and
/// counted as coalesced.
#[derive(Debug)]
pub struct RefreshStateMachine {
    state: RefreshState,
    cycles: u64,
    coalesced: u64,
}

impl RefreshStateMachine {
    pub fn new() -> Self {
        Self {
            state: RefreshState::Idle,
            cycles: 0,
            coalesced: 0,
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Number of triggers that arrived while a cycle was in flight.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Enter `Loading`. Returns the new cycle number, or `None` if a cycle
    /// is already running (the trigger is coalesced into it).
    pub fn begin(&mut self, trigger: RefreshTrigger) -> Option<u64> {
        if self.state == RefreshState::Loading {
            self.coalesced += 1;
            debug!(%trigger, "Cycle in flight, coalescing trigger");
            return None;
        }
        self.state = RefreshState::Loading;
        self.cycles += 1;
        Some(self.cycles)
    }

    /// `Loading → Ready`.
    pub fn succeed(&mut self) {
        if self.state == RefreshState::Loading {
            self.state = RefreshState::Ready;
        }
    }

    /// `Loading → Degraded`.
    pub fn fail(&mut self) {
        if self.state == RefreshState::Loading {
            self.state = RefreshState::Degraded;
        }
    }
}

impl Default for RefreshStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Error,
}

/// A transient, user-visible banner. Cleared by the scheduler at `expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// The result of one completed cycle, published as a unit.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardUpdate {
    pub cycle: u64,
    pub cycle_id: Uuid,
    pub trigger: RefreshTrigger,
    /// `Ready` or `Degraded`
    pub state: RefreshState,
    pub snapshot: PortfolioSnapshot,
    pub market: Vec<MarketCoin>,
    pub view: DashboardViewModel,
    /// Why the cycle degraded, if it did
    pub error: Option<String>,
}

/// What readers see: the current state plus the last completed cycle.
///
/// `latest` is swapped as a whole `Arc` when a cycle completes, never
/// modified in place.
#[derive(Debug, Clone)]
pub struct DashboardStatus {
    pub state: RefreshState,
    pub latest: Option<Arc<DashboardUpdate>>,
    pub notice: Option<Notice>,
    pub coalesced: u64,
}

/// Drives the dashboard: one cycle at startup, then one per interval, plus
/// manual refreshes requested through a [`SchedulerHandle`].
///
/// Runs as a single task. Triggers that arrive while a cycle is loading are
/// coalesced into it, and the timer restarts after every cycle so a manual
/// refresh is never immediately followed by a timer one.
pub struct RefreshScheduler {
    dashboard: PortfolioDashboard,
    machine: RefreshStateMachine,
    triggers: mpsc::Receiver<RefreshTrigger>,
    status: watch::Sender<DashboardStatus>,
    notice_deadline: Option<Instant>,
}

/// Cloneable handle for requesting refreshes and reading published state.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    triggers: mpsc::Sender<RefreshTrigger>,
    status: watch::Receiver<DashboardStatus>,
}

impl SchedulerHandle {
    /// Ask for a manual refresh. Returns `false` if the scheduler has
    /// stopped; a full buffer still counts as accepted since the request
    /// would be coalesced.
    pub fn refresh(&self) -> bool {
        match self.triggers.try_send(RefreshTrigger::Manual) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Current status (cheap clone of the shared state).
    pub fn status(&self) -> DashboardStatus {
        self.status.borrow().clone()
    }

    /// The last completed cycle, if any.
    pub fn current(&self) -> Option<Arc<DashboardUpdate>> {
        self.status.borrow().latest.clone()
    }

    /// Wait for the next status change. `None` once the scheduler is gone.
    pub async fn changed(&mut self) -> Option<DashboardStatus> {
        self.status.changed().await.ok()?;
        Some(self.status.borrow_and_update().clone())
    }

    /// Wait until `predicate` holds for the published status.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&DashboardStatus) -> bool,
    ) -> Option<DashboardStatus> {
        self.status.wait_for(predicate).await.ok().map(|s| s.clone())
    }
}

impl RefreshScheduler {
    pub fn new(dashboard: PortfolioDashboard) -> (Self, SchedulerHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_BUFFER);
        let (status_tx, status_rx) = watch::channel(DashboardStatus {
            state: RefreshState::Idle,
            latest: None,
            notice: None,
            coalesced: 0,
        });
        let scheduler = Self {
            dashboard,
            machine: RefreshStateMachine::new(),
            triggers: trigger_rx,
            status: status_tx,
            notice_deadline: None,
        };
        let handle = SchedulerHandle {
            triggers: trigger_tx,
            status: status_rx,
        };
        (scheduler, handle)
    }

    /// Run until every [`SchedulerHandle`] has been dropped.
    pub async fn run(mut self) {
        let period = self.dashboard.settings().refresh_interval();
        info!(
            interval_secs = period.as_secs(),
            holdings = self.dashboard.holdings().len(),
            "Refresh scheduler started"
        );

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.run_cycle(RefreshTrigger::Startup).await;
        ticker.reset();

        loop {
            let deadline = self.notice_deadline;
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle(RefreshTrigger::Timer).await;
                    ticker.reset();
                }
                trigger = self.triggers.recv() => match trigger {
                    Some(trigger) => {
                        self.run_cycle(trigger).await;
                        ticker.reset();
                    }
                    None => break,
                },
                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.notice_deadline = None;
                    self.status.send_modify(|s| s.notice = None);
                    debug!("Notice expired");
                }
            }
        }

        info!(cycles = self.machine.cycles(), "Refresh scheduler stopped");
    }

    async fn run_cycle(&mut self, trigger: RefreshTrigger) {
        let Some(cycle) = self.machine.begin(trigger) else {
            return;
        };
        let cycle_id = Uuid::new_v4();
        self.publish_state();
        info!(cycle, %cycle_id, %trigger, "Refresh cycle started");

        let result = self.dashboard.refresh().await;

        // Anything that queued up while loading belongs to this cycle. A
        // coalesced manual request still gets the manual notice.
        let mut manual = trigger == RefreshTrigger::Manual;
        while let Ok(extra) = self.triggers.try_recv() {
            manual |= extra == RefreshTrigger::Manual;
            self.machine.begin(extra);
        }

        let (data, notice, error) = match result {
            Ok(data) => {
                self.machine.succeed();
                info!(
                    cycle,
                    total_usd = data.snapshot.total_value_usd,
                    "Refresh cycle ready"
                );
                let notice = manual
                    .then(|| self.notice(NoticeKind::Info, MANUAL_SUCCESS_NOTICE));
                (data, notice, None)
            }
            Err(e) => {
                self.machine.fail();
                if e.is_feed_failure() {
                    warn!(cycle, error = %e, "Feed unavailable, showing sample data");
                } else {
                    error!(cycle, error = %e, "Refresh cycle failed, showing sample data");
                }
                let message = if manual {
                    MANUAL_FAILURE_NOTICE
                } else {
                    STARTUP_FAILURE_NOTICE
                };
                let notice = Some(self.notice(NoticeKind::Error, message));
                (self.dashboard.fallback(), notice, Some(e.to_string()))
            }
        };

        let update = Arc::new(DashboardUpdate {
            cycle,
            cycle_id,
            trigger,
            state: self.machine.state(),
            snapshot: data.snapshot,
            market: data.market,
            view: data.view,
            error,
        });

        let state = self.machine.state();
        let coalesced = self.machine.coalesced();
        self.status.send_modify(|s| {
            s.state = state;
            s.latest = Some(update);
            s.coalesced = coalesced;
            if notice.is_some() {
                s.notice = notice;
            }
        });
    }

    fn notice(&mut self, kind: NoticeKind, message: &str) -> Notice {
        let duration = self.dashboard.settings().notice_duration();
        self.notice_deadline = Some(Instant::now() + duration);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        Notice {
            kind,
            message: message.to_string(),
            expires_at,
        }
    }

    fn publish_state(&self) {
        let state = self.machine.state();
        self.status.send_modify(|s| s.state = state);
    }
}
