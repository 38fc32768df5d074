//! Lazy camera lifecycle around one frame source.
//!
//! A [`Camera`] owns a source factory, the latest-frame slot, and a producer
//! thread that exists only while someone is watching. [`Camera::poke`] starts
//! the producer on first demand and suspends until the first frame lands;
//! consumers then pull frames through a [`ConsumerHandle`]. The producer
//! stops itself after an idle window with no consumer activity and a fresh
//! source is built on the next demand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use crossbeam::utils::CachePadded;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn};

use crate::source::{Frame, SourceError, SourceFactory, SourceSpec};
use crate::stream::signal::{BroadcastSignal, ConsumerId, WaitOutcome};
use crate::stream::StreamError;
use crate::CameraTuning;

/// Producer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    /// No producer; the latest frame (if any) is from a finished period.
    Stopped,
    /// Producer spawned, first frame not yet published.
    Starting,
    /// Producer running with at least one frame published.
    Streaming,
}

#[derive(Default)]
struct Counters {
    frames_produced: AtomicU64,
    frames_delivered: AtomicU64,
    stale_reclaimed: AtomicU64,
    runs_started: AtomicU64,
}

/// Point-in-time counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraStats {
    pub frames_produced: u64,
    pub frames_delivered: u64,
    pub stale_reclaimed: u64,
    pub runs_started: u64,
}

struct Lifecycle {
    producer: Option<JoinHandle<()>>,
}

struct Inner {
    name: String,
    spec: SourceSpec,
    factory: Box<dyn SourceFactory>,
    idle_timeout: Duration,

    signal: BroadcastSignal,
    /// Written only by the producer thread (and emptied at run start, under
    /// the lifecycle lock); consumers take cheap snapshots.
    latest: ArcSwapOption<Frame>,
    status: watch::Sender<CameraStatus>,
    lifecycle: Mutex<Lifecycle>,
    last_error: Mutex<Option<SourceError>>,

    /// Millis since `epoch` of the last consumer call, monotone under races.
    last_access_ms: AtomicU64,
    epoch: Instant,

    counters: CachePadded<Counters>,
}

impl Inner {
    fn touch(&self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.last_access_ms.fetch_max(now, Ordering::Relaxed);
    }

    fn idle_for(&self) -> Duration {
        let now = self.epoch.elapsed().as_millis() as u64;
        let last = self.last_access_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }

    /// What a consumer should see once its wait came back `Closed`.
    fn stop_reason(&self) -> StreamError {
        match self.last_error.lock().unwrap().clone() {
            Some(err) => StreamError::Source(err),
            None => StreamError::Stopped,
        }
    }
}

pub struct Camera {
    inner: Arc<Inner>,
}

impl Camera {
    pub fn new(
        name: impl Into<String>,
        spec: SourceSpec,
        factory: impl SourceFactory + 'static,
        tuning: CameraTuning,
    ) -> Self {
        let (status, _) = watch::channel(CameraStatus::Stopped);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                spec,
                factory: Box::new(factory),
                idle_timeout: tuning.idle_timeout(),
                signal: BroadcastSignal::new(tuning.stale_after()),
                latest: ArcSwapOption::empty(),
                status,
                lifecycle: Mutex::new(Lifecycle { producer: None }),
                last_error: Mutex::new(None),
                last_access_ms: AtomicU64::new(0),
                epoch: Instant::now(),
                counters: CachePadded::new(Counters::default()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn spec(&self) -> SourceSpec {
        self.inner.spec
    }

    pub fn status(&self) -> CameraStatus {
        *self.inner.status.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.status() != CameraStatus::Stopped
    }

    /// The failure that ended the last running period, if it ended in one.
    pub fn last_error(&self) -> Option<SourceError> {
        self.inner.last_error.lock().unwrap().clone()
    }

    /// Snapshot of the most recently published frame, bypassing signaling.
    pub fn current_frame(&self) -> Option<Frame> {
        self.inner.latest.load_full().map(|frame| (*frame).clone())
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.signal.consumer_count()
    }

    pub fn stats(&self) -> CameraStats {
        let counters = &*self.inner.counters;
        CameraStats {
            frames_produced: counters.frames_produced.load(Ordering::Relaxed),
            frames_delivered: counters.frames_delivered.load(Ordering::Relaxed),
            stale_reclaimed: counters.stale_reclaimed.load(Ordering::Relaxed),
            runs_started: counters.runs_started.load(Ordering::Relaxed),
        }
    }

    /// Wake the camera up. Idempotent.
    ///
    /// Starts a producer against a freshly built source if none is running,
    /// then suspends until the first frame of the run is published. On an
    /// already-streaming camera this returns promptly. A clean idle-stop
    /// racing the call is retried; only a recorded source failure (or a
    /// spawn failure) surfaces as an error.
    pub async fn poke(&self) -> Result<(), StreamError> {
        loop {
            self.inner.touch();
            self.ensure_producer()?;

            let mut rx = self.inner.status.subscribe();
            loop {
                match *rx.borrow_and_update() {
                    CameraStatus::Streaming => return Ok(()),
                    CameraStatus::Stopped => match self.last_error() {
                        Some(err) => return Err(StreamError::Source(err)),
                        // Published, then idled out before we observed the
                        // streaming state; its frame stands until the next
                        // start, so demand is satisfied.
                        None if self.current_frame().is_some() => return Ok(()),
                        None => break, // a new run already took the slot over
                    },
                    CameraStatus::Starting => {}
                }
                if rx.changed().await.is_err() {
                    return Err(StreamError::Stopped);
                }
            }
        }
    }

    /// Register a consumer for this camera. The handle deregisters on drop;
    /// the staleness sweep in the signal covers handles that never drop.
    pub fn subscribe(&self) -> ConsumerHandle {
        self.inner.touch();
        let id = self.inner.signal.register();
        debug!(camera = %self.inner.name, ?id, "consumer subscribed");
        ConsumerHandle {
            inner: Arc::clone(&self.inner),
            id,
            last: None,
        }
    }

    /// Start critical section: at most one producer per camera, ever.
    fn ensure_producer(&self) -> Result<(), StreamError> {
        let mut lifecycle = self.inner.lifecycle.lock().unwrap();

        if let Some(handle) = lifecycle.producer.take() {
            // A producer that has announced Stopped is moments from exiting;
            // join it so the new period cannot overlap the old thread.
            if !handle.is_finished() && *self.inner.status.borrow() != CameraStatus::Stopped {
                lifecycle.producer = Some(handle);
                return Ok(());
            }
            let _ = handle.join();
        }

        // Fresh running period: nothing from the previous one survives.
        self.inner.signal.reopen();
        self.inner.latest.store(None);
        *self.inner.last_error.lock().unwrap() = None;
        self.inner.status.send_replace(CameraStatus::Starting);
        self.inner
            .counters
            .runs_started
            .fetch_add(1, Ordering::Relaxed);

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name(format!("camera-{}", self.inner.name))
            .spawn(move || producer_loop(inner))
            .map_err(|err| {
                self.inner.status.send_replace(CameraStatus::Stopped);
                StreamError::Spawn(err)
            })?;
        lifecycle.producer = Some(handle);
        Ok(())
    }
}

/// One registered consumer of one camera.
///
/// The handle is the connection-side end of the broadcast: one streaming
/// client holds one handle and pulls with [`next_frame`](Self::next_frame)
/// in a loop. Delivery is last-value-wins: a handle that falls behind skips
/// to the most recent frame instead of backing up the producer.
pub struct ConsumerHandle {
    inner: Arc<Inner>,
    id: ConsumerId,
    /// The exact frame last handed out here, for duplicate suppression.
    last: Option<Arc<Frame>>,
}

impl ConsumerHandle {
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Suspend until a frame newer than the last one taken here exists, then
    /// return it. Returns the stop reason instead of blocking into a period
    /// that has ended.
    pub async fn next_frame(&mut self) -> Result<Frame, StreamError> {
        self.inner.touch();
        loop {
            match self.inner.signal.wait(self.id).await {
                WaitOutcome::Signaled => {}
                WaitOutcome::Closed => return Err(self.inner.stop_reason()),
            }
            self.inner.signal.clear(self.id);

            match self.inner.latest.load_full() {
                // A clear landing between the producer's store and its
                // notify would re-deliver the same frame; wait that out.
                Some(frame) if self.last.as_ref().is_some_and(|l| Arc::ptr_eq(l, &frame)) => {
                    continue
                }
                Some(frame) => {
                    self.last = Some(Arc::clone(&frame));
                    self.inner
                        .counters
                        .frames_delivered
                        .fetch_add(1, Ordering::Relaxed);
                    return Ok((*frame).clone());
                }
                // Signaled, but the slot was already emptied for the next
                // period: treat it as the stop the signal was about to report.
                None => return Err(self.inner.stop_reason()),
            }
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        debug!(camera = %self.inner.name, id = ?self.id, "consumer unsubscribed");
        self.inner.signal.deregister(self.id);
    }
}

/// Runs on its own thread, once per running period.
fn producer_loop(inner: Arc<Inner>) {
    let span = info_span!("producer", camera = %inner.name);
    let _guard = span.enter();

    let mut source = inner.factory.open(&inner.spec);
    info!(spec = ?inner.spec, "producer started");

    let mut produced: u64 = 0;
    let failure = loop {
        match source.next_frame() {
            Ok(frame) => {
                inner.latest.store(Some(Arc::new(frame)));
                produced += 1;
                inner
                    .counters
                    .frames_produced
                    .fetch_add(1, Ordering::Relaxed);
                if produced == 1 {
                    inner.status.send_replace(CameraStatus::Streaming);
                }

                let reclaimed = inner.signal.notify();
                if reclaimed > 0 {
                    inner
                        .counters
                        .stale_reclaimed
                        .fetch_add(reclaimed as u64, Ordering::Relaxed);
                    debug!(reclaimed, "reclaimed stale consumers");
                }

                let idle = inner.idle_for();
                if idle > inner.idle_timeout {
                    info!(?idle, frames = produced, "no consumer activity, stopping");
                    break None;
                }
            }
            Err(err) => {
                warn!(error = %err, frames = produced, "source failed, stopping");
                break Some(err);
            }
        }
    };

    *inner.last_error.lock().unwrap() = failure;
    // Stopped must be observable before waiters wake, so a woken consumer
    // reads the final state, not the dying one.
    inner.status.send_replace(CameraStatus::Stopped);
    inner.signal.close();
    // `source` drops here; nothing of this period is reused.
}
