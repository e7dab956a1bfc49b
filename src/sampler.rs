use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::action::{ActionOutcome, ActionRequest};
use crate::config::SamplingSettings;
use crate::error::ActionError;
use crate::system::collector::Collector;
use crate::system::control::ActionExecutor;
use crate::system::snapshot::Snapshot;
use crate::system::source::ProcessSource;

/// Front door to a running sampler task.
///
/// Consumers read the latest published snapshot without blocking the
/// sampler; settings, refresh requests and actions flow the other way.
pub struct SamplerHandle {
    snapshots: watch::Receiver<Arc<Snapshot>>,
    settings: watch::Sender<SamplingSettings>,
    refresh: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    executor: Arc<ActionExecutor>,
    action_timeout: Duration,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// New settings take effect at the start of the next pass.
    pub fn update_settings(&self, settings: SamplingSettings) {
        self.settings.send_replace(settings);
    }

    /// Asks for a pass ahead of schedule. Requests made while a pass is
    /// running collapse into a single follow-up pass.
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    /// Runs `request` off the async thread, then schedules a refresh so the
    /// effect shows up in the next snapshot whether or not it succeeded.
    pub async fn perform(&self, request: ActionRequest) -> Result<ActionOutcome, ActionError> {
        let executor = Arc::clone(&self.executor);
        let result = run_bounded(request.pid, self.action_timeout, move || {
            executor.apply(&request)
        })
        .await;
        self.request_refresh();
        result
    }

    /// Stops the sampler. A pass in flight gets one pass budget to finish.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(err) = self.task.await {
            tracing::warn!(%err, "sampler task ended abnormally");
        }
    }
}

/// Runs a blocking OS call for `pid` on the blocking pool and gives up
/// waiting after `limit`. The call itself keeps running detached.
pub async fn run_bounded<T, F>(pid: u32, limit: Duration, call: F) -> Result<T, ActionError>
where
    F: FnOnce() -> Result<T, ActionError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(call)).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => Err(ActionError::Os {
            pid,
            source: io::Error::other(err.to_string()),
        }),
        Err(_) => {
            let millis = limit.as_millis() as u64;
            tracing::warn!(pid, budget_ms = millis, "process action overran its budget");
            Err(ActionError::TimedOut { pid, millis })
        }
    }
}

pub fn spawn<S>(
    collector: Collector<S>,
    settings: SamplingSettings,
    pass_timeout: Duration,
    action_timeout: Duration,
    executor: ActionExecutor,
) -> SamplerHandle
where
    S: ProcessSource + Send + 'static,
{
    let history_capacity = collector.history().capacity();
    let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Snapshot::empty(history_capacity)));
    let (settings_tx, settings_rx) = watch::channel(settings);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh = Arc::new(Notify::new());

    let task = tokio::spawn(run(
        collector,
        settings_rx,
        Arc::clone(&refresh),
        shutdown_rx,
        snapshot_tx,
        pass_timeout,
    ));

    SamplerHandle {
        snapshots: snapshot_rx,
        settings: settings_tx,
        refresh,
        shutdown: shutdown_tx,
        executor: Arc::new(executor),
        action_timeout,
        task,
    }
}

fn ticker(period: Duration, start: Instant) -> Interval {
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

type PassOutput<S> = (Collector<S>, Snapshot);

/// The one pass allowed to run. The collector travels with it and comes
/// back on join.
struct InFlight<S> {
    handle: JoinHandle<PassOutput<S>>,
    started: Instant,
    deadline: Instant,
    overran: bool,
}

async fn join_pass<S>(slot: &mut Option<InFlight<S>>) -> Result<PassOutput<S>, JoinError> {
    match slot {
        Some(pass) => (&mut pass.handle).await,
        None => std::future::pending().await,
    }
}

/// Republishes the last snapshot flagged stale so consumers keep a cadence
/// while the pass that should replace it is stuck in the OS.
fn publish_stale(snapshot_tx: &watch::Sender<Arc<Snapshot>>) {
    let stale = snapshot_tx.borrow().marked_stale();
    snapshot_tx.send_replace(Arc::new(stale));
}

async fn run<S>(
    collector: Collector<S>,
    mut settings_rx: watch::Receiver<SamplingSettings>,
    refresh: Arc<Notify>,
    mut shutdown_rx: watch::Receiver<bool>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    pass_timeout: Duration,
) where
    S: ProcessSource + Send + 'static,
{
    let mut period = settings_rx.borrow().refresh_interval;
    let mut interval = ticker(period, Instant::now());
    let mut idle = Some(collector);
    let mut in_flight: Option<InFlight<S>> = None;
    let mut refresh_pending = false;
    tracing::info!(interval_ms = period.as_millis() as u64, "sampler started");

    loop {
        let overrun_at = in_flight
            .as_ref()
            .filter(|pass| !pass.overran)
            .map(|pass| pass.deadline);

        let start_pass = tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                false
            }
            joined = join_pass(&mut in_flight), if in_flight.is_some() => {
                let started = in_flight.take().map(|pass| pass.started);
                match joined {
                    Ok((returned, snapshot)) => {
                        idle = Some(returned);
                        tracing::trace!(
                            pass = snapshot.pass,
                            elapsed_ms = started.map_or(0, |t| t.elapsed().as_millis() as u64),
                            "snapshot published"
                        );
                        snapshot_tx.send_replace(Arc::new(snapshot));
                    }
                    Err(err) => {
                        tracing::error!(%err, "sampling pass panicked; sampler stopping");
                        return;
                    }
                }
                std::mem::take(&mut refresh_pending)
            }
            _ = tokio::time::sleep_until(overrun_at.unwrap_or_else(Instant::now)),
                if overrun_at.is_some() =>
            {
                tracing::warn!(
                    budget_ms = pass_timeout.as_millis() as u64,
                    "sampling pass overran its budget"
                );
                if let Some(pass) = in_flight.as_mut() {
                    pass.overran = true;
                }
                publish_stale(&snapshot_tx);
                false
            }
            _ = interval.tick() => match &in_flight {
                None => true,
                Some(pass) => {
                    if pass.overran {
                        publish_stale(&snapshot_tx);
                    }
                    tracing::debug!("tick skipped, previous pass still running");
                    false
                }
            },
            _ = refresh.notified() => {
                if in_flight.is_some() {
                    refresh_pending = true;
                    false
                } else {
                    true
                }
            }
        };

        if !start_pass {
            continue;
        }
        let Some(mut collector) = idle.take() else {
            continue;
        };

        let settings = settings_rx.borrow_and_update().clone();
        if settings.refresh_interval != period {
            period = settings.refresh_interval;
            interval = ticker(period, Instant::now() + period);
            tracing::info!(
                interval_ms = period.as_millis() as u64,
                "refresh interval changed"
            );
        }

        let started = Instant::now();
        let handle = tokio::task::spawn_blocking(move || {
            let _span = tracing::debug_span!("sampler.pass").entered();
            let snapshot = collector.refresh(&settings);
            (collector, snapshot)
        });
        in_flight = Some(InFlight {
            handle,
            started,
            deadline: started + pass_timeout,
            overran: false,
        });
    }

    // The blocking pass cannot be cancelled; give it one budget to return
    // so tracker state is never left half-updated by a shutdown.
    if let Some(pass) = in_flight
        && tokio::time::timeout(pass_timeout, pass.handle).await.is_err()
    {
        tracing::warn!("sampling pass still running at shutdown; detaching it");
    }
    tracing::info!("sampler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::filter::ClassificationPolicy;
    use crate::system::process::{ProcessReading, ProcessState};
    use crate::system::source::{HostReading, ReplaySource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(10);

    fn reading(pid: u32, owner: &str) -> ProcessReading {
        ProcessReading {
            pid,
            name: format!("task{pid}"),
            owner: owner.into(),
            cpu_time_ms: 0,
            memory_bytes: 4096,
            status: ProcessState::Sleeping,
            priority: 0,
            thread_count: 1,
            open_handles: 0,
            start_time: 10,
            command: String::new(),
        }
    }

    fn start(source: ReplaySource) -> SamplerHandle {
        let collector = Collector::with_source(source, ClassificationPolicy::default(), 60);
        let settings = SamplingSettings {
            refresh_interval: Duration::from_secs(60),
            ..SamplingSettings::default()
        };
        spawn(
            collector,
            settings,
            Duration::from_secs(5),
            Duration::from_secs(5),
            ActionExecutor::with_logical_cpus(1),
        )
    }

    /// Blocks every enumeration until the test releases it, and records how
    /// many enumerations were ever running at once.
    struct GatedSource {
        gate: mpsc::Receiver<()>,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl ProcessSource for GatedSource {
        fn processes(&mut self) -> Vec<ProcessReading> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.recv_timeout(WAIT);
            self.active.fetch_sub(1, Ordering::SeqCst);
            vec![reading(1400, "erin")]
        }

        fn host(&mut self) -> HostReading {
            HostReading::default()
        }
    }

    #[tokio::test]
    async fn publishes_first_pass_and_serves_refresh_requests() {
        let source = ReplaySource::new().with_frame(
            vec![reading(1200, "alice"), reading(1201, "bob")],
            HostReading::default(),
        );
        let handle = start(source);
        let mut rx = handle.subscribe();

        tokio::time::timeout(WAIT, rx.wait_for(|s| s.pass >= 1))
            .await
            .expect("first pass in time")
            .expect("sampler alive");
        assert_eq!(handle.latest().rows.len(), 2);

        handle.request_refresh();
        tokio::time::timeout(WAIT, rx.wait_for(|s| s.pass >= 2))
            .await
            .expect("refresh pass in time")
            .expect("sampler alive");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn settings_apply_on_next_pass() {
        let source = ReplaySource::new().with_frame(
            vec![reading(1300, "root"), reading(1301, "carol")],
            HostReading::default(),
        );
        let handle = start(source);
        let mut rx = handle.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|s| s.pass >= 1))
            .await
            .expect("first pass in time")
            .expect("sampler alive");

        handle.update_settings(SamplingSettings {
            refresh_interval: Duration::from_secs(60),
            show_system_processes: false,
            search_text: String::new(),
        });
        handle.request_refresh();
        let snapshot = tokio::time::timeout(WAIT, rx.wait_for(|s| s.pass >= 2))
            .await
            .expect("refresh pass in time")
            .expect("sampler alive")
            .clone();
        let pids: Vec<u32> = snapshot.rows.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![1301]);
        assert_eq!(snapshot.host.process_count, 2);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn failed_action_still_schedules_refresh() {
        let handle = start(ReplaySource::new().with_frame(Vec::new(), HostReading::default()));
        let mut rx = handle.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|s| s.pass >= 1))
            .await
            .expect("first pass in time")
            .expect("sampler alive");

        let request = ActionRequest::new(
            0,
            crate::action::ProcessAction::Signal(crate::action::Signal::Terminate),
        );
        assert!(handle.perform(request).await.is_err());
        tokio::time::timeout(WAIT, rx.wait_for(|s| s.pass >= 2))
            .await
            .expect("refresh after action")
            .expect("sampler alive");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn stuck_pass_publishes_stale_and_never_overlaps() {
        let (release, gate) = mpsc::channel();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let source = GatedSource {
            gate,
            active: Arc::clone(&active),
            peak: Arc::clone(&peak),
            calls: Arc::clone(&calls),
        };
        let collector = Collector::with_source(source, ClassificationPolicy::default(), 60);
        let settings = SamplingSettings {
            refresh_interval: Duration::from_secs(60),
            ..SamplingSettings::default()
        };
        let handle = spawn(
            collector,
            settings,
            Duration::from_millis(50),
            Duration::from_secs(5),
            ActionExecutor::with_logical_cpus(1),
        );
        let mut rx = handle.subscribe();

        let stale = tokio::time::timeout(WAIT, rx.wait_for(|s| s.stale))
            .await
            .expect("stale snapshot while the pass is stuck")
            .expect("sampler alive")
            .clone();
        assert_eq!(stale.pass, 0);

        for _ in 0..3 {
            handle.request_refresh();
            tokio::task::yield_now().await;
        }
        release.send(()).expect("first pass waiting");
        release.send(()).expect("gate open");

        let fresh = tokio::time::timeout(WAIT, rx.wait_for(|s| s.pass >= 2 && !s.stale))
            .await
            .expect("both passes finish")
            .expect("sampler alive")
            .clone();
        assert_eq!(fresh.rows.len(), 1);

        handle.shutdown().await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_action_times_out() {
        let err = run_bounded(4321, Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::TimedOut);
    }
}
