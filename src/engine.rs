//! Polling engine: startup join, accounts refresh and inactivity watchdog.
//!
//! One task owns every piece of mutable state (snapshot writes, the
//! known-account set, the idle clock, the timers). Fetches run on their
//! own tasks and report back over the command channel, so results are
//! applied one at a time in arrival order.
//!
//! Lifecycle:
//! - `start()` fires activity, probability and accounts fetches together
//!   and waits for all three to finish (success or exhaustion).
//! - If all three succeeded, the accounts refresh timer and the inactivity
//!   watchdog are armed.
//! - `stop()` cancels both timers. Fetches already in flight still land in
//!   the snapshot but can no longer arm anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::DashboardConfig;
use crate::detector::ChangeDetector;
use crate::error::FetchError;
use crate::fetcher::{Fetcher, RetryPolicy, Transport};
use crate::notification::{NewAccountEvent, Notifier};
use crate::pollers::{poll_endpoint, Endpoint, PollResult};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::types::Account;

/// Command channel buffer size
const COMMAND_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
}

/// Outcome of the startup join: AND of the three initial polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupReport {
    pub success: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    AccountsRefresh,
    Watchdog,
}

/// Why a fetch was started; decides what happens after it lands.
enum PollOrigin {
    Initial { generation: u64 },
    AccountsRefresh,
    Watchdog,
    NewAccount,
    Manual(oneshot::Sender<bool>),
}

enum Command {
    Start,
    Stop,
    Shutdown,
    Poll {
        endpoint: Endpoint,
        reply: oneshot::Sender<bool>,
    },
    KnownIds(oneshot::Sender<Vec<i64>>),
    Tick {
        timer: TimerKind,
        generation: u64,
    },
    Fetched {
        origin: PollOrigin,
        endpoint: Endpoint,
        result: Result<PollResult, FetchError>,
    },
}

/// Recurring tick source. Dropping or cancelling it stops all further ticks.
struct RecurringTimer {
    task: JoinHandle<()>,
}

impl RecurringTimer {
    fn spawn(
        period: Duration,
        tx: mpsc::WeakSender<Command>,
        timer: TimerKind,
        generation: u64,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(tx) = tx.upgrade() else { break };
                if tx.send(Command::Tick { timer, generation }).await.is_err() {
                    break;
                }
            }
        });
        Self { task }
    }

    fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for RecurringTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Timers {
    generation: u64,
    accounts: RecurringTimer,
    watchdog: RecurringTimer,
}

struct StartupJoin {
    generation: u64,
    pending: usize,
    all_ok: bool,
    started: Instant,
}

/// Client side of a running engine. Cheap to clone.
#[derive(Clone)]
pub struct DashboardHandle {
    tx: mpsc::Sender<Command>,
    store: Arc<SnapshotStore>,
    phase: watch::Receiver<Phase>,
    startup: watch::Receiver<Option<StartupReport>>,
}

impl DashboardHandle {
    /// Begin (or restart) the startup join. Must be called inside a tokio runtime.
    pub async fn start(&self) -> bool {
        self.send(Command::Start).await
    }

    /// Cancel the refresh and watchdog timers. Safe to call repeatedly.
    pub async fn stop(&self) -> bool {
        self.send(Command::Stop).await
    }

    pub async fn shutdown(&self) -> bool {
        self.send(Command::Shutdown).await
    }

    /// Fetch one endpoint now. Resolves exactly once: true only if the
    /// snapshot was updated.
    pub async fn poll(&self, endpoint: Endpoint) -> bool {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::Poll { endpoint, reply }).await {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn known_account_ids(&self) -> Vec<i64> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::KnownIds(reply)).await {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Wait for the current startup join to finish. `None` if the engine is gone.
    pub async fn wait_startup(&self) -> Option<StartupReport> {
        let mut rx = self.startup.clone();
        let report = rx.wait_for(|report| report.is_some()).await.ok()?;
        *report
    }

    async fn send(&self, command: Command) -> bool {
        if self.tx.send(command).await.is_err() {
            log::debug!("Dashboard engine: command dropped, engine has shut down");
            return false;
        }
        true
    }
}

/// Spawn the engine task. Nothing is fetched until [`DashboardHandle::start`].
pub fn spawn_dashboard(
    config: DashboardConfig,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
) -> DashboardHandle {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (phase_tx, phase_rx) = watch::channel(Phase::Idle);
    let (startup_tx, startup_rx) = watch::channel(None);
    let store = Arc::new(SnapshotStore::new());

    let engine = Engine {
        fetcher: Fetcher::new(config.api_url.as_deref(), transport),
        config,
        store: store.clone(),
        notifier,
        detector: ChangeDetector::new(),
        accounts_loaded: false,
        last_new_account_at: Instant::now(),
        generation: 0,
        join: None,
        timers: None,
        in_flight: HashMap::new(),
        tx: tx.downgrade(),
        phase: phase_tx,
        startup: startup_tx,
    };
    tokio::spawn(engine.run(rx));

    DashboardHandle {
        tx,
        store,
        phase: phase_rx,
        startup: startup_rx,
    }
}

struct Engine {
    config: DashboardConfig,
    fetcher: Fetcher,
    store: Arc<SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    detector: ChangeDetector,
    accounts_loaded: bool,
    last_new_account_at: Instant,
    /// Bumped by every start and stop; stale ticks and joins are ignored.
    generation: u64,
    join: Option<StartupJoin>,
    timers: Option<Timers>,
    in_flight: HashMap<Endpoint, usize>,
    tx: mpsc::WeakSender<Command>,
    phase: watch::Sender<Phase>,
    startup: watch::Sender<Option<StartupReport>>,
}

impl Engine {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        log::info!("Dashboard engine: started");

        while let Some(command) = rx.recv().await {
            match command {
                Command::Start => self.start(),
                Command::Stop => self.stop(),
                Command::Shutdown => {
                    self.stop();
                    break;
                }
                Command::Poll { endpoint, reply } => {
                    let policy = self.initial_policy();
                    self.spawn_poll(endpoint, PollOrigin::Manual(reply), policy);
                }
                Command::KnownIds(reply) => {
                    let mut ids: Vec<i64> = self.detector.known_ids().iter().copied().collect();
                    ids.sort_unstable();
                    let _ = reply.send(ids);
                }
                Command::Tick { timer, generation } => self.on_tick(timer, generation),
                Command::Fetched {
                    origin,
                    endpoint,
                    result,
                } => self.on_fetched(origin, endpoint, result),
            }
        }

        log::info!("Dashboard engine: shut down");
    }

    fn initial_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.initial_retries, self.config.retry_delay())
    }

    fn refresh_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.refresh_retries, self.config.retry_delay())
    }

    fn start(&mut self) {
        self.cancel_timers();
        self.generation += 1;
        let generation = self.generation;

        log::info!("Dashboard engine: loading (generation {})", generation);
        self.last_new_account_at = Instant::now();
        self.join = Some(StartupJoin {
            generation,
            pending: Endpoint::ALL.len(),
            all_ok: true,
            started: Instant::now(),
        });
        self.startup.send_replace(None);
        self.phase.send_replace(Phase::Loading);

        let policy = self.initial_policy();
        for endpoint in Endpoint::ALL {
            self.spawn_poll(endpoint, PollOrigin::Initial { generation }, policy);
        }
    }

    fn stop(&mut self) {
        self.generation += 1;
        if self.cancel_timers() {
            log::info!("Dashboard engine: timers stopped");
        }
    }

    /// Returns true if timers were running.
    fn cancel_timers(&mut self) -> bool {
        match self.timers.take() {
            Some(timers) => {
                timers.accounts.cancel();
                timers.watchdog.cancel();
                true
            }
            None => false,
        }
    }

    fn arm_timers(&mut self) {
        self.cancel_timers();
        let accounts_period = self.config.accounts_refresh_period();
        let watchdog_period = self.config.watchdog_period();
        log::info!(
            "Dashboard engine: refreshing accounts every {:?}, watchdog every {:?}",
            accounts_period,
            watchdog_period
        );

        self.timers = Some(Timers {
            generation: self.generation,
            accounts: RecurringTimer::spawn(
                accounts_period,
                self.tx.clone(),
                TimerKind::AccountsRefresh,
                self.generation,
            ),
            watchdog: RecurringTimer::spawn(
                watchdog_period,
                self.tx.clone(),
                TimerKind::Watchdog,
                self.generation,
            ),
        });
    }

    fn on_tick(&mut self, timer: TimerKind, generation: u64) {
        let live = self
            .timers
            .as_ref()
            .is_some_and(|t| t.generation == generation && generation == self.generation);
        if !live {
            log::debug!("Dashboard engine: ignoring stale {:?} tick", timer);
            return;
        }

        match timer {
            TimerKind::AccountsRefresh => {
                let policy = self.refresh_policy();
                self.spawn_coalesced(Endpoint::Accounts, PollOrigin::AccountsRefresh, policy);
            }
            TimerKind::Watchdog => self.check_inactivity(),
        }
    }

    /// Force an activity read when no new account has shown up for too long.
    fn check_inactivity(&mut self) {
        let idle = self.last_new_account_at.elapsed();
        if idle <= self.config.inactivity_threshold() {
            return;
        }

        log::info!(
            "Watchdog: no new accounts for {}s, re-checking store activity",
            idle.as_secs()
        );
        // The forced check counts as activity whether or not it succeeds.
        self.last_new_account_at = Instant::now();
        let policy = self.initial_policy();
        self.spawn_coalesced(Endpoint::Activity, PollOrigin::Watchdog, policy);
    }

    /// Start a poll unless one for the same endpoint is already running.
    /// The running fetch stands in for the skipped one; it lands in the same snapshot field.
    fn spawn_coalesced(&mut self, endpoint: Endpoint, origin: PollOrigin, policy: RetryPolicy) {
        if self.in_flight.get(&endpoint).copied().unwrap_or(0) > 0 {
            log::debug!("{}: fetch already in flight, skipping", endpoint.label());
            return;
        }
        self.spawn_poll(endpoint, origin, policy);
    }

    fn spawn_poll(&mut self, endpoint: Endpoint, origin: PollOrigin, policy: RetryPolicy) {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        *self.in_flight.entry(endpoint).or_insert(0) += 1;

        let fetcher = self.fetcher.clone();
        tokio::spawn(async move {
            let result = poll_endpoint(&fetcher, endpoint, policy).await;
            let _ = tx
                .send(Command::Fetched {
                    origin,
                    endpoint,
                    result,
                })
                .await;
        });
    }

    fn on_fetched(
        &mut self,
        origin: PollOrigin,
        endpoint: Endpoint,
        result: Result<PollResult, FetchError>,
    ) {
        if let Some(count) = self.in_flight.get_mut(&endpoint) {
            *count = count.saturating_sub(1);
        }

        let success = match result {
            Ok(payload) => {
                self.apply(payload);
                true
            }
            Err(e) => {
                log::warn!(
                    "{}: giving up ({}), keeping last known data: {}",
                    endpoint.label(),
                    e.kind(),
                    e
                );
                false
            }
        };

        match origin {
            PollOrigin::Initial { generation } => self.complete_join(generation, success),
            PollOrigin::Manual(reply) => {
                let _ = reply.send(success);
            }
            PollOrigin::AccountsRefresh | PollOrigin::Watchdog | PollOrigin::NewAccount => {}
        }
    }

    fn apply(&mut self, payload: PollResult) {
        match payload {
            PollResult::Activity(activity) => {
                log::debug!(
                    "Activity poller: active={} last_active={}",
                    activity.is_active,
                    activity.last_active_at
                );
                self.store.set_activity(activity);
            }
            PollResult::Probability(probability) => {
                log::debug!("Probability poller: weekly table updated");
                self.store.set_probability(probability);
            }
            PollResult::Accounts(accounts) => {
                let fresh = if !self.accounts_loaded && !self.config.notify_on_first_load {
                    self.detector.seed(&accounts);
                    Vec::new()
                } else {
                    self.detector.observe(&accounts)
                };
                self.accounts_loaded = true;
                log::debug!(
                    "Accounts poller: {} accounts, {} new",
                    accounts.len(),
                    fresh.len()
                );
                self.store.set_accounts(accounts);
                self.on_new_accounts(fresh);
            }
        }
    }

    fn on_new_accounts(&mut self, fresh: Vec<Account>) {
        if fresh.is_empty() {
            return;
        }

        log::info!("Accounts poller: {} new account(s)", fresh.len());
        self.last_new_account_at = Instant::now();
        for account in fresh {
            self.notifier.notify(&NewAccountEvent::new(account));
        }

        if self.config.force_activity_on_new_account {
            let policy = self.initial_policy();
            self.spawn_coalesced(Endpoint::Activity, PollOrigin::NewAccount, policy);
        }
    }

    fn complete_join(&mut self, generation: u64, success: bool) {
        let Some(join) = self.join.as_mut() else {
            return;
        };
        if join.generation != generation {
            return;
        }

        join.all_ok &= success;
        join.pending -= 1;
        if join.pending > 0 {
            return;
        }

        let report = StartupReport {
            success: join.all_ok,
            elapsed: join.started.elapsed(),
        };
        self.join = None;

        log::info!(
            "Dashboard engine: initial load finished in {:?} (success: {})",
            report.elapsed,
            report.success
        );
        self.phase.send_replace(Phase::Ready);
        self.startup.send_replace(Some(report));

        // A stop (or restart) since this join began means nobody wants timers.
        if report.success && generation == self.generation {
            self.arm_timers();
        }
    }
}
