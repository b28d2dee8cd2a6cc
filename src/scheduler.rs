//! Fixed-interval job scheduler.
//!
//! A [`Scheduler`] owns one timer task per [`Job`] (plus a one-shot startup
//! task for jobs that ask for one). Every firing is spawned as its own task:
//! the timer never waits for a previous firing to finish, and a firing that
//! fails or panics does not affect later ones. Timing goes through
//! `tokio::time`, so tests drive it with a paused clock.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Unit of scheduled work.
#[async_trait]
pub trait Cycle: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Run once to completion. Failures are the cycle's to report.
    async fn run(&self);
}

/// A cycle and when to fire it.
pub struct Job {
    // ---
    cycle: Arc<dyn Cycle>,
    period: Duration,
    initial_delay: Option<Duration>,
}

impl Job {
    // ---
    /// Fire `cycle` every `period`, starting one period after the scheduler starts.
    pub fn every(cycle: Arc<dyn Cycle>, period: Duration) -> Self {
        Self {
            cycle,
            period,
            initial_delay: None,
        }
    }

    /// Additionally fire once, `delay` after the scheduler starts.
    pub fn with_initial_run(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }
}

// ---

/// Running set of timers. Dropping the scheduler stops them.
pub struct Scheduler {
    // ---
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    // ---
    /// Arm every job's timers. Must be called inside a tokio runtime.
    pub fn start(jobs: Vec<Job>) -> Self {
        // ---
        let mut handles = Vec::with_capacity(jobs.len() * 2);

        for job in jobs {
            info!(
                "Scheduling '{}' every {}s{}",
                job.cycle.name(),
                job.period.as_secs(),
                job.initial_delay
                    .map(|d| format!(", first run in {}s", d.as_secs()))
                    .unwrap_or_default()
            );

            if let Some(delay) = job.initial_delay {
                let cycle = job.cycle.clone();
                handles.push(tokio::spawn(async move {
                    time::sleep(delay).await;
                    fire(&cycle);
                }));
            }

            handles.push(spawn_timer(job.cycle, job.period));
        }

        Self { handles }
    }

    /// Stop all timers. Firings already in flight run to completion.
    pub fn shutdown(mut self) {
        self.abort_all();
        info!("Scheduler stopped");
    }

    fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.abort_all();
    }
}

fn spawn_timer(cycle: Arc<dyn Cycle>, period: Duration) -> JoinHandle<()> {
    // ---
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            fire(&cycle);
        }
    })
}

fn fire(cycle: &Arc<dyn Cycle>) {
    // ---
    debug!("Firing '{}'", cycle.name());
    let cycle = cycle.clone();
    tokio::spawn(async move { cycle.run().await });
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HALF_HOUR: Duration = Duration::from_secs(30 * 60);
    const HOUR: Duration = Duration::from_secs(60 * 60);

    #[derive(Default)]
    struct CountingCycle {
        runs: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        work: Duration,
        panics: bool,
    }

    impl CountingCycle {
        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Cycle for CountingCycle {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.work.is_zero() {
                time::sleep(self.work).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panics {
                panic!("cycle failure");
            }
        }
    }

    /// Let spawned firings run before asserting.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_run_then_fixed_interval() {
        // ---
        let cycle = Arc::new(CountingCycle::default());
        let scheduler = Scheduler::start(vec![
            Job::every(cycle.clone(), HALF_HOUR).with_initial_run(Duration::from_secs(5))
        ]);

        settle().await;
        assert_eq!(cycle.runs(), 0);

        time::sleep(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(cycle.runs(), 1, "startup run after 5s");

        time::sleep(HALF_HOUR).await;
        settle().await;
        assert_eq!(cycle.runs(), 2);

        time::sleep(HALF_HOUR).await;
        settle().await;
        assert_eq!(cycle.runs(), 3);

        scheduler.shutdown();
        time::sleep(HOUR * 2).await;
        settle().await;
        assert_eq!(cycle.runs(), 3, "no firings after shutdown");
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_tick_independently() {
        // ---
        let fast = Arc::new(CountingCycle::default());
        let slow = Arc::new(CountingCycle::default());
        let _scheduler = Scheduler::start(vec![
            Job::every(fast.clone(), HALF_HOUR),
            Job::every(slow.clone(), HOUR),
        ]);

        time::sleep(HOUR + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(fast.runs(), 2);
        assert_eq!(slow.runs(), 1);

        time::sleep(HOUR).await;
        settle().await;
        assert_eq!(fast.runs(), 4);
        assert_eq!(slow.runs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_firing_does_not_stop_schedule() {
        // ---
        let cycle = Arc::new(CountingCycle {
            panics: true,
            ..CountingCycle::default()
        });
        let _scheduler = Scheduler::start(vec![Job::every(cycle.clone(), HALF_HOUR)]);

        time::sleep(HALF_HOUR * 3 + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(cycle.runs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_firing_does_not_wait_for_previous() {
        // ---
        let cycle = Arc::new(CountingCycle {
            work: Duration::from_secs(45 * 60),
            ..CountingCycle::default()
        });
        let _scheduler = Scheduler::start(vec![Job::every(cycle.clone(), HALF_HOUR)]);

        time::sleep(HOUR + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(cycle.runs(), 2);
        assert_eq!(cycle.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_scheduler_stops_timers() {
        // ---
        let cycle = Arc::new(CountingCycle::default());
        drop(Scheduler::start(vec![
            Job::every(cycle.clone(), HALF_HOUR).with_initial_run(Duration::from_secs(5))
        ]));

        time::sleep(HOUR).await;
        settle().await;
        assert_eq!(cycle.runs(), 0);
    }
}
