// ═══════════════════════════════════════════════════════════════════
// Scheduler Tests: state transitions, coalescing, timer, notices
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use coinfolio_core::errors::CoreError;
use coinfolio_core::models::holding::HoldingConfig;
use coinfolio_core::models::quote::{PriceQuote, QuoteMap};
use coinfolio_core::models::settings::Settings;
use coinfolio_core::providers::traits::PriceFeed;
use coinfolio_core::services::refresh_service::{
    DashboardStatus, NoticeKind, RefreshScheduler, RefreshState, RefreshStateMachine,
    RefreshTrigger, SchedulerHandle,
};
use coinfolio_core::PortfolioDashboard;

// ═══════════════════════════════════════════════════════════════════
// Test feed
// ═══════════════════════════════════════════════════════════════════

/// Feed that can fail on demand and, when gated, blocks each fetch until
/// the test releases it.
struct TestFeed {
    calls: AtomicUsize,
    fail: AtomicBool,
    gated: bool,
    entered: Notify,
    gate: Notify,
}

impl TestFeed {
    fn new(fail: bool, gated: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(fail),
            gated,
            entered: Notify::new(),
            gate: Notify::new(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for TestFeed {
    fn name(&self) -> &str {
        "TestFeed"
    }

    async fn fetch_quotes(&self, _asset_ids: &[String]) -> Result<QuoteMap, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if self.gated {
            self.gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::FeedUnavailable {
                provider: "TestFeed".into(),
                status: Some(503),
                message: "service unavailable".into(),
            });
        }
        let mut quotes = QuoteMap::new();
        quotes.insert("bitcoin".into(), PriceQuote::new("bitcoin", 45_230.50, -2.5));
        quotes.insert("ethereum".into(), PriceQuote::new("ethereum", 2_310.75, 5.2));
        quotes.insert("cardano".into(), PriceQuote::new("cardano", 0.52, -1.3));
        Ok(quotes)
    }
}

fn start(feed: Arc<TestFeed>, refresh_interval_secs: u64) -> (SchedulerHandle, tokio::task::JoinHandle<()>) {
    let settings = Settings {
        refresh_interval_secs,
        ..Settings::default()
    };
    let dashboard = PortfolioDashboard::new(settings, HoldingConfig::default(), feed).unwrap();
    let (scheduler, handle) = RefreshScheduler::new(dashboard);
    let task = tokio::spawn(scheduler.run());
    (handle, task)
}

/// The published status once cycle `n` (or a later one) has finished.
fn completed_cycle(n: u64) -> impl FnMut(&DashboardStatus) -> bool {
    move |s| s.latest.as_ref().is_some_and(|u| u.cycle >= n) && s.state != RefreshState::Loading
}

// ═══════════════════════════════════════════════════════════════════
// RefreshStateMachine
// ═══════════════════════════════════════════════════════════════════

mod state_machine {
    use super::*;

    #[test]
    fn starts_idle() {
        let m = RefreshStateMachine::new();
        assert_eq!(m.state(), RefreshState::Idle);
        assert_eq!(m.cycles(), 0);
        assert_eq!(m.coalesced(), 0);
    }

    #[test]
    fn begin_while_loading_is_coalesced() {
        let mut m = RefreshStateMachine::new();
        assert_eq!(m.begin(RefreshTrigger::Startup), Some(1));
        assert_eq!(m.state(), RefreshState::Loading);
        assert_eq!(m.begin(RefreshTrigger::Manual), None);
        assert_eq!(m.begin(RefreshTrigger::Timer), None);
        assert_eq!(m.coalesced(), 2);
        assert_eq!(m.cycles(), 1);
    }

    #[test]
    fn ready_and_degraded_cycles() {
        let mut m = RefreshStateMachine::new();
        m.begin(RefreshTrigger::Startup);
        m.fail();
        assert_eq!(m.state(), RefreshState::Degraded);

        assert_eq!(m.begin(RefreshTrigger::Manual), Some(2));
        m.succeed();
        assert_eq!(m.state(), RefreshState::Ready);

        assert_eq!(m.begin(RefreshTrigger::Timer), Some(3));
        m.fail();
        assert_eq!(m.state(), RefreshState::Degraded);
    }

    #[test]
    fn outcome_without_cycle_is_ignored() {
        let mut m = RefreshStateMachine::new();
        m.succeed();
        assert_eq!(m.state(), RefreshState::Idle);
        m.fail();
        assert_eq!(m.state(), RefreshState::Idle);
    }

    #[test]
    fn display_names() {
        assert_eq!(RefreshState::Degraded.to_string(), "degraded");
        assert_eq!(RefreshTrigger::Manual.to_string(), "manual");
    }
}

// ═══════════════════════════════════════════════════════════════════
// RefreshScheduler
// ═══════════════════════════════════════════════════════════════════

mod scheduler {
    use super::*;

    #[tokio::test]
    async fn startup_cycle_becomes_ready() {
        let feed = TestFeed::new(false, false);
        let (mut handle, _task) = start(feed.clone(), 3600);

        let status = handle.wait_for(completed_cycle(1)).await.unwrap();
        assert_eq!(status.state, RefreshState::Ready);
        let update = status.latest.unwrap();
        assert_eq!(update.cycle, 1);
        assert_eq!(update.trigger, RefreshTrigger::Startup);
        assert_eq!(update.state, RefreshState::Ready);
        assert!(!update.snapshot.is_fallback());
        assert!(update.error.is_none());
        assert!(status.notice.is_none(), "startup success shows no notice");
        assert_eq!(feed.calls(), 1);
        assert!(handle.current().is_some());
    }

    #[tokio::test]
    async fn manual_refresh_during_loading_is_coalesced() {
        let feed = TestFeed::new(false, true);
        let (mut handle, _task) = start(feed.clone(), 3600);

        feed.entered.notified().await;
        assert_eq!(handle.status().state, RefreshState::Loading);
        assert!(handle.refresh());
        assert!(handle.refresh());
        assert!(handle.refresh());
        feed.gate.notify_one();

        let status = handle.wait_for(completed_cycle(1)).await.unwrap();
        assert_eq!(status.state, RefreshState::Ready);
        assert_eq!(status.coalesced, 3);
        assert_eq!(status.latest.as_ref().unwrap().trigger, RefreshTrigger::Startup);
        let notice = status.notice.clone().expect("coalesced manual refresh is acknowledged");
        assert_eq!(notice.kind, NoticeKind::Info);
        assert_eq!(notice.message, "Data refreshed successfully!");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(feed.calls(), 1, "coalesced triggers must not start new fetches");
        assert_eq!(handle.current().unwrap().cycle, 1);
    }

    #[tokio::test]
    async fn coalesced_manual_refresh_reports_failure_as_manual() {
        let feed = TestFeed::new(true, true);
        let (mut handle, _task) = start(feed.clone(), 3600);

        feed.entered.notified().await;
        assert!(handle.refresh());
        feed.gate.notify_one();

        let status = handle.wait_for(completed_cycle(1)).await.unwrap();
        assert_eq!(status.state, RefreshState::Degraded);
        assert_eq!(status.coalesced, 1);
        let notice = status.notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.message, "Failed to refresh data. Please try again.");
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test]
    async fn manual_refresh_after_ready_runs_new_cycle() {
        let feed = TestFeed::new(false, false);
        let (mut handle, _task) = start(feed.clone(), 3600);
        handle.wait_for(completed_cycle(1)).await.unwrap();

        assert!(handle.refresh());
        let status = handle.wait_for(completed_cycle(2)).await.unwrap();
        let update = status.latest.unwrap();
        assert_eq!(update.trigger, RefreshTrigger::Manual);
        assert_eq!(update.state, RefreshState::Ready);
        let notice = status.notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Info);
        assert_eq!(notice.message, "Data refreshed successfully!");
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn feed_failure_degrades_to_sample_data() {
        let feed = TestFeed::new(true, false);
        let (mut handle, _task) = start(feed.clone(), 3600);

        let status = handle.wait_for(completed_cycle(1)).await.unwrap();
        assert_eq!(status.state, RefreshState::Degraded);
        let update = status.latest.clone().unwrap();
        assert!(update.snapshot.is_fallback());
        assert_eq!(update.view.holdings.len(), 4);
        assert!(update.error.as_deref().unwrap().contains("503"));
        let notice = status.notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(
            notice.message,
            "Failed to load cryptocurrency data. Showing sample data instead."
        );

        // The notice clears itself; the degraded data stays.
        let cleared = handle.wait_for(|s| s.notice.is_none()).await.unwrap();
        assert_eq!(cleared.state, RefreshState::Degraded);
        assert!(cleared.latest.unwrap().snapshot.is_fallback());
        assert_eq!(feed.calls(), 1);

        assert!(handle.refresh());
        let status = handle.wait_for(completed_cycle(2)).await.unwrap();
        assert_eq!(status.state, RefreshState::Degraded);
        assert_eq!(
            status.notice.unwrap().message,
            "Failed to refresh data. Please try again."
        );
    }

    #[tokio::test]
    async fn recovers_after_degraded_cycle() {
        let feed = TestFeed::new(true, false);
        let (mut handle, _task) = start(feed.clone(), 3600);
        handle.wait_for(completed_cycle(1)).await.unwrap();

        feed.fail.store(false, Ordering::SeqCst);
        assert!(handle.refresh());
        let status = handle.wait_for(completed_cycle(2)).await.unwrap();
        assert_eq!(status.state, RefreshState::Ready);
        assert!(!status.latest.unwrap().snapshot.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_drives_cycles() {
        let feed = TestFeed::new(false, false);
        let (mut handle, _task) = start(feed.clone(), 60);

        handle.wait_for(completed_cycle(1)).await.unwrap();
        let status = handle.wait_for(completed_cycle(2)).await.unwrap();
        let update = status.latest.unwrap();
        assert_eq!(update.trigger, RefreshTrigger::Timer);
        assert!(status.notice.is_none(), "timer success shows no notice");
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test]
    async fn stops_when_handles_are_dropped() {
        let feed = TestFeed::new(false, false);
        let (mut handle, task) = start(feed, 3600);
        handle.wait_for(completed_cycle(1)).await.unwrap();

        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
