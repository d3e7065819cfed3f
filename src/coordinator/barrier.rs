//! Barrier state machine
//!
//! The coordinator moves through three phases:
//!
//! ```text
//! INIT ──(readiness probe succeeds)──▶ RACE ──(quota completions)──▶ FINISHED
//! ```
//!
//! `running` counts clients that received `GO`, `finished` counts clients
//! that reported completion. A completion is only accepted while an
//! admitted client has not finished yet, so `finished <= running` always
//! holds, and with a positive quota `running <= quota`.
//!
//! Every check-then-mutate sequence runs inside one critical section of
//! [`Barrier`], so two concurrent requests can never both pass the quota or
//! ordering check.

use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::probe::ReadinessProbe;

// ============================================================================
// Phase
// ============================================================================

/// Barrier lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the readiness probe to succeed
    Init,

    /// Clients are being admitted and may report completion
    Race,

    /// Quota reached, the process is exiting
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Init => "INIT",
            Self::Race => "RACE",
            Self::Finished => "FINISHED",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// Why a start request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoGoReason {
    /// The readiness probe has not succeeded yet
    NotReady,

    /// All `quota` slots are already taken
    QuotaReached,

    /// The barrier already finished
    Finished,
}

/// Outcome of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Client admitted; carries the running count after admission
    Go { running: u64 },

    /// Client refused; nothing was counted
    NoGo(NoGoReason),
}

impl Admission {
    /// Response body sent to the client
    pub fn body(&self) -> &'static str {
        match self {
            Self::Go { .. } => "GO",
            Self::NoGo(_) => "NOGO",
        }
    }

    pub fn is_go(&self) -> bool {
        matches!(self, Self::Go { .. })
    }
}

/// Why a finish request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KoReason {
    /// Every admitted client already finished (or none was admitted)
    NoOutstandingClient,

    /// The barrier already finished
    Finished,
}

/// Outcome of a finish request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Completion recorded; `quorum` is set for the one that reached the quota
    Ok { finished: u64, quorum: bool },

    /// Completion refused; nothing was counted
    Ko(KoReason),
}

impl Completion {
    /// Response body sent to the client
    pub fn body(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "OK",
            Self::Ko(_) => "KO",
        }
    }

    /// Whether this completion ended the barrier
    pub fn reached_quorum(&self) -> bool {
        matches!(self, Self::Ok { quorum: true, .. })
    }
}

// ============================================================================
// Barrier State
// ============================================================================

/// Snapshot of the barrier counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierSnapshot {
    pub phase: Phase,
    pub running: u64,
    pub finished: u64,
    pub quota: u64,
}

/// The counters and phase of the barrier
///
/// Plain data with synchronous transitions; [`Barrier`] owns the single
/// instance behind a mutex.
#[derive(Debug, Clone)]
pub struct BarrierState {
    phase: Phase,
    running: u64,
    finished: u64,
    quota: u64,
}

impl BarrierState {
    /// Create a new state in `INIT`; `quota == 0` never finishes
    pub fn new(quota: u64) -> Self {
        Self {
            phase: Phase::Init,
            running: 0,
            finished: 0,
            quota,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn running(&self) -> u64 {
        self.running
    }

    pub fn finished(&self) -> u64 {
        self.finished
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    pub fn snapshot(&self) -> BarrierSnapshot {
        BarrierSnapshot {
            phase: self.phase,
            running: self.running,
            finished: self.finished,
            quota: self.quota,
        }
    }

    /// One-time `INIT -> RACE` transition; returns whether it happened
    pub fn open(&mut self) -> bool {
        if self.phase == Phase::Init {
            self.phase = Phase::Race;
            true
        } else {
            false
        }
    }

    /// Admit one client if the phase and quota allow it
    pub fn try_admit(&mut self) -> Admission {
        match self.phase {
            Phase::Init => Admission::NoGo(NoGoReason::NotReady),
            Phase::Finished => Admission::NoGo(NoGoReason::Finished),
            Phase::Race => {
                if self.quota > 0 && self.running >= self.quota {
                    return Admission::NoGo(NoGoReason::QuotaReached);
                }
                self.running += 1;
                Admission::Go {
                    running: self.running,
                }
            }
        }
    }

    /// Record one completion, moving to `FINISHED` when the quota is met
    pub fn try_complete(&mut self) -> Completion {
        if self.phase == Phase::Finished {
            return Completion::Ko(KoReason::Finished);
        }
        if self.running < self.finished + 1 {
            return Completion::Ko(KoReason::NoOutstandingClient);
        }

        self.finished += 1;

        let quorum = self.quota > 0 && self.finished == self.quota && self.phase == Phase::Race;
        if quorum {
            self.phase = Phase::Finished;
        }

        Completion::Ok {
            finished: self.finished,
            quorum,
        }
    }
}

// ============================================================================
// Barrier
// ============================================================================

/// Single owner of the barrier state
///
/// Cloning shares the same state.
#[derive(Clone)]
pub struct Barrier {
    state: Arc<Mutex<BarrierState>>,
    probe: Arc<dyn ReadinessProbe>,
}

impl Barrier {
    /// Create a barrier gated by `probe`
    pub fn new(quota: u64, probe: Arc<dyn ReadinessProbe>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BarrierState::new(quota))),
            probe,
        }
    }

    /// Handle a start request
    ///
    /// While in `INIT` the readiness probe runs once for this request,
    /// outside the lock so a slow command does not stall finish requests.
    /// The phase transition and the admission itself happen in a single
    /// critical section afterwards.
    pub async fn start(&self) -> Admission {
        let phase = self.state.lock().await.phase();

        // A request whose own check failed is refused even if another
        // request opened the barrier meanwhile
        if phase == Phase::Init && !self.probe.check().await {
            return Admission::NoGo(NoGoReason::NotReady);
        }

        let mut state = self.state.lock().await;
        if phase == Phase::Init && state.open() {
            tracing::info!("Readiness probe succeeded, barrier is open");
        }
        state.try_admit()
    }

    /// Handle a finish request
    pub async fn finish(&self) -> Completion {
        self.state.lock().await.try_complete()
    }

    /// Current counters
    pub async fn snapshot(&self) -> BarrierSnapshot {
        self.state.lock().await.snapshot()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::probe::testing::ScriptedProbe;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn racing(quota: u64) -> BarrierState {
        let mut state = BarrierState::new(quota);
        assert!(state.open());
        state
    }

    #[test]
    fn test_init_refuses_everything() {
        let mut state = BarrierState::new(2);
        assert_eq!(state.try_admit(), Admission::NoGo(NoGoReason::NotReady));
        assert_eq!(
            state.try_complete(),
            Completion::Ko(KoReason::NoOutstandingClient)
        );
        assert_eq!(state.running(), 0);
        assert_eq!(state.finished(), 0);
        assert_eq!(state.phase(), Phase::Init);
    }

    #[test]
    fn test_open_only_once() {
        let mut state = BarrierState::new(0);
        assert!(state.open());
        assert!(!state.open());
        assert_eq!(state.phase(), Phase::Race);
    }

    #[test]
    fn test_overflow_admission() {
        let mut state = racing(3);
        for expected in 1..=3 {
            assert_eq!(state.try_admit(), Admission::Go { running: expected });
        }
        assert_eq!(state.try_admit(), Admission::NoGo(NoGoReason::QuotaReached));
        assert_eq!(state.running(), 3);
    }

    #[test]
    fn test_unbounded_quota() {
        let mut state = racing(0);
        for _ in 0..100 {
            assert!(state.try_admit().is_go());
        }
        for _ in 0..100 {
            assert!(!state.try_complete().reached_quorum());
        }
        assert_eq!(state.phase(), Phase::Race);
    }

    #[test]
    fn test_finish_before_start() {
        let mut state = racing(2);
        assert_eq!(state.try_complete().body(), "KO");
        assert_eq!(state.finished(), 0);
    }

    #[test]
    fn test_repeated_finish() {
        let mut state = racing(5);
        state.try_admit();
        assert_eq!(
            state.try_complete(),
            Completion::Ok {
                finished: 1,
                quorum: false
            }
        );
        assert_eq!(
            state.try_complete(),
            Completion::Ko(KoReason::NoOutstandingClient)
        );
    }

    #[test]
    fn test_quorum_finishes_barrier() {
        let mut state = racing(2);
        state.try_admit();
        state.try_admit();
        assert!(!state.try_complete().reached_quorum());
        assert!(state.try_complete().reached_quorum());
        assert_eq!(state.phase(), Phase::Finished);

        assert_eq!(state.try_admit(), Admission::NoGo(NoGoReason::Finished));
        assert_eq!(state.try_complete(), Completion::Ko(KoReason::Finished));
        assert_eq!(state.finished(), 2);
    }

    #[test]
    fn test_bodies() {
        assert_eq!(Admission::Go { running: 1 }.body(), "GO");
        assert_eq!(Admission::NoGo(NoGoReason::NotReady).body(), "NOGO");
        assert_eq!(
            Completion::Ok {
                finished: 1,
                quorum: false
            }
            .body(),
            "OK"
        );
        assert_eq!(Completion::Ko(KoReason::Finished).body(), "KO");
        assert_eq!(Phase::Race.to_string(), "RACE");
    }

    #[tokio::test]
    async fn test_probe_failure_keeps_init() {
        let probe = Arc::new(ScriptedProbe::new([false, true]));
        let barrier = Barrier::new(1, probe.clone());

        assert_eq!(barrier.start().await, Admission::NoGo(NoGoReason::NotReady));
        assert_eq!(barrier.snapshot().await.phase, Phase::Init);
        assert_eq!(probe.calls(), 1);

        // Client retries; the probe runs again and now succeeds
        assert_eq!(barrier.start().await, Admission::Go { running: 1 });
        assert_eq!(barrier.snapshot().await.phase, Phase::Race);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_probe_not_run_after_open() {
        let probe = Arc::new(ScriptedProbe::new([true]));
        let barrier = Barrier::new(0, probe.clone());

        barrier.start().await;
        barrier.start().await;
        barrier.start().await;

        assert_eq!(probe.calls(), 1);
        assert_eq!(barrier.snapshot().await.running, 3);
    }

    /// Fails, but only once released; every later call succeeds at once
    struct SlowFailingProbe {
        calls: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl ReadinessProbe for SlowFailingProbe {
        async fn check(&self) -> bool {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.release.notified().await;
                false
            } else {
                true
            }
        }
    }

    #[tokio::test]
    async fn test_failed_check_not_admitted_after_concurrent_open() {
        let probe = Arc::new(SlowFailingProbe {
            calls: AtomicUsize::new(0),
            release: Notify::new(),
        });
        let barrier = Barrier::new(0, probe.clone());

        let slow = tokio::spawn({
            let barrier = barrier.clone();
            async move { barrier.start().await }
        });
        while probe.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(barrier.start().await, Admission::Go { running: 1 });

        probe.release.notify_one();
        assert_eq!(slow.await.unwrap(), Admission::NoGo(NoGoReason::NotReady));

        let snapshot = barrier.snapshot().await;
        assert_eq!(snapshot.phase, Phase::Race);
        assert_eq!(snapshot.running, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admission_respects_quota() {
        let quota = 16;
        let probe = Arc::new(ScriptedProbe::always(true));
        let barrier = Barrier::new(quota, probe);

        let handles: Vec<_> = (0..quota * 2)
            .map(|_| {
                let barrier = barrier.clone();
                tokio::spawn(async move { barrier.start().await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let admitted = results
            .into_iter()
            .filter(|r| r.as_ref().map(|a| a.is_go()).unwrap_or(false))
            .count();

        assert_eq!(admitted as u64, quota);
        assert_eq!(barrier.snapshot().await.running, quota);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Open,
        Start,
        Finish,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Open), Just(Op::Start), Just(Op::Finish)]
    }

    proptest! {
        #[test]
        fn prop_counters_stay_ordered(quota in 0u64..6, ops in prop::collection::vec(op(), 0..64)) {
            let mut state = BarrierState::new(quota);
            for op in ops {
                let before = state.phase();
                match op {
                    Op::Open => { state.open(); }
                    Op::Start => { state.try_admit(); }
                    Op::Finish => { state.try_complete(); }
                }

                prop_assert!(state.finished() <= state.running());
                if quota > 0 {
                    prop_assert!(state.running() <= quota);
                }
                if state.phase() == Phase::Finished {
                    prop_assert_eq!(state.finished(), quota);
                }
                // No reverse transitions
                prop_assert!(!(before == Phase::Race && state.phase() == Phase::Init));
                prop_assert!(!(before == Phase::Finished && state.phase() != Phase::Finished));
            }
        }
    }
}
