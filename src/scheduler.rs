//! Fetch scheduler: per-surface debounced jobs on a bounded worker pool.
//!
//! Scheduling a job for a surface cancels the previous job for that surface.
//! Jobs wait out the debounce delay on a timer thread, then run on a worker.
//! Cancellation is cooperative: a job cancelled before it starts never runs,
//! a running job sees its token flip.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::Error;
use crate::task::CancelToken;
use crate::types::{JobId, SurfaceId};

/// Work run on a worker thread with its job id and cancellation token.
pub type Task = Box<dyn FnOnce(JobId, &CancelToken) + Send + 'static>;

/// Handle to a scheduled job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    /// Job id; later jobs have larger ids.
    pub id: JobId,
    /// Token cancelled when the job is superseded or cancelled.
    pub token: CancelToken,
}

/// The current job of one surface.
struct Entry {
    /// Job id.
    id: JobId,
    /// Its cancellation token.
    token: CancelToken,
}

/// One unit of work travelling through the timer and worker channels.
struct Work {
    /// Job id.
    id: JobId,
    /// Surface the job belongs to; `None` for unkeyed submissions.
    key: Option<SurfaceId>,
    /// The work itself.
    task: Task,
    /// Cancellation token.
    token: CancelToken,
}

/// Messages to the debounce timer thread.
enum TimerMessage {
    /// Run `work` once `due` passes.
    Schedule {
        /// Earliest start.
        due: Instant,
        /// The job.
        work: Work,
    },
}

/// State shared with the timer and worker threads.
struct Shared {
    /// Current job per surface.
    entries: Mutex<HashMap<SurfaceId, Entry>>,
    /// Next job id.
    next_id: AtomicU64,
    /// Jobs scheduled or submitted but not yet finished or dropped.
    outstanding: AtomicUsize,
}

impl Shared {
    /// Bookkeeping after a job ran or was dropped.
    fn finish(&self, key: Option<SurfaceId>, id: JobId) {
        if let Some(key) = key {
            let mut entries = self.entries.lock();
            if entries.get(&key).is_some_and(|current| return current.id == id) {
                entries.remove(&key);
            }
        }
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Debounced, per-surface job queue.
pub struct FetchScheduler {
    /// Delay between scheduling and running.
    debounce: Duration,
    /// Shared bookkeeping.
    shared: Arc<Shared>,
    /// Timer thread handle, joined on drop.
    timer: Option<JoinHandle<()>>,
    /// Sender to the timer thread; dropped on shutdown.
    timer_tx: Option<Sender<TimerMessage>>,
    /// Worker thread handles, joined on drop.
    workers: Vec<JoinHandle<()>>,
    /// Sender to the workers for unkeyed submissions; dropped on shutdown.
    work_tx: Option<Sender<Work>>,
}

impl std::fmt::Debug for FetchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("FetchScheduler")
            .field("debounce", &self.debounce)
            .field("outstanding", &self.shared.outstanding.load(Ordering::Acquire))
            .field("workers", &self.workers.len())
            .finish_non_exhaustive();
    }
}

impl FetchScheduler {
    /// Start the timer thread and `worker_threads` workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a thread cannot be spawned.
    pub fn new(debounce: Duration, worker_threads: usize) -> Result<Self, Error> {
        let shared = Arc::new(Shared {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            outstanding: AtomicUsize::new(0),
        });
        let (work_tx, work_rx) = crossbeam_channel::unbounded::<Work>();
        let (timer_tx, timer_rx) = crossbeam_channel::unbounded::<TimerMessage>();

        let mut workers = Vec::with_capacity(worker_threads.max(1));
        for n in 0..worker_threads.max(1) {
            let rx = work_rx.clone();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("quickdoc-fetch-{n}"))
                .spawn(move || worker_loop(&rx, &shared))?;
            workers.push(handle);
        }

        let timer_work_tx = work_tx.clone();
        let timer_shared = Arc::clone(&shared);
        let timer = thread::Builder::new()
            .name("quickdoc-debounce".to_string())
            .spawn(move || timer_loop(&timer_rx, &timer_work_tx, &timer_shared))?;

        return Ok(Self {
            debounce,
            shared,
            timer: Some(timer),
            timer_tx: Some(timer_tx),
            workers,
            work_tx: Some(work_tx),
        });
    }

    /// Schedule `task` for `surface` after the debounce delay, cancelling the
    /// surface's previous job.
    pub fn schedule(&self, surface: SurfaceId, task: Task) -> JobHandle {
        let id = self.next_id();
        let token = CancelToken::new();

        if let Some(previous) = self.shared.entries.lock().insert(
            surface,
            Entry {
                id,
                token: token.clone(),
            },
        ) {
            tracing::debug!(surface = surface.0, superseded = previous.id.0, by = id.0, "schedule.supersede");
            previous.token.cancel();
        }

        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        let work = Work {
            id,
            key: Some(surface),
            task,
            token: token.clone(),
        };
        let message = TimerMessage::Schedule {
            due: Instant::now() + self.debounce,
            work,
        };
        let sent = self.timer_tx.as_ref().is_some_and(|tx| return tx.send(message).is_ok());
        if !sent {
            token.cancel();
            self.shared.finish(Some(surface), id);
        }
        return JobHandle { id, token };
    }

    /// Run `task` on a worker as soon as possible, outside any surface queue.
    pub fn submit(&self, task: Task) -> CancelToken {
        let id = self.next_id();
        let token = CancelToken::new();
        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        let work = Work {
            id,
            key: None,
            task,
            token: token.clone(),
        };
        let sent = self.work_tx.as_ref().is_some_and(|tx| return tx.send(work).is_ok());
        if !sent {
            token.cancel();
            self.shared.finish(None, id);
        }
        return token;
    }

    /// Cancel the surface's pending or running job. Returns whether there was one.
    pub fn cancel(&self, surface: SurfaceId) -> bool {
        let Some(entry) = self.shared.entries.lock().remove(&surface) else {
            return false;
        };
        tracing::debug!(surface = surface.0, job = entry.id.0, "schedule.cancel");
        entry.token.cancel();
        return true;
    }

    /// Cancel every surface's job.
    pub fn cancel_all(&self) {
        let entries: Vec<Entry> = self.shared.entries.lock().drain().map(|(_, e)| return e).collect();
        for entry in entries {
            entry.token.cancel();
        }
    }

    /// Whether the surface has a job that has not finished yet.
    pub fn is_pending(&self, surface: SurfaceId) -> bool {
        return self.shared.entries.lock().contains_key(&surface);
    }

    /// Whether every scheduled or submitted job has finished or been dropped.
    pub fn is_idle(&self) -> bool {
        return self.shared.outstanding.load(Ordering::Acquire) == 0;
    }

    /// Allocate the next job id.
    fn next_id(&self) -> JobId {
        return JobId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
    }
}

impl Drop for FetchScheduler {
    fn drop(&mut self) {
        self.cancel_all();
        drop(self.timer_tx.take());
        drop(self.work_tx.take());
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Hold jobs until they are due, then hand them to the workers.
fn timer_loop(rx: &Receiver<TimerMessage>, work_tx: &Sender<Work>, shared: &Shared) {
    let mut queue: BTreeMap<(Instant, JobId), Work> = BTreeMap::new();
    loop {
        let received = match queue.keys().next() {
            Some(&(due, _)) => rx.recv_deadline(due),
            None => rx.recv().map_err(|_| return RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(TimerMessage::Schedule { due, work }) => {
                queue.insert((due, work.id), work);
            },
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        while let Some(entry) = queue.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let work = entry.remove();
            if work.token.is_cancelled() {
                shared.finish(work.key, work.id);
                continue;
            }
            if let Err(unsent) = work_tx.send(work) {
                let work = unsent.into_inner();
                shared.finish(work.key, work.id);
            }
        }
    }

    for (_, work) in queue {
        shared.finish(work.key, work.id);
    }
}

/// Run jobs until the channel closes.
fn worker_loop(rx: &Receiver<Work>, shared: &Shared) {
    while let Ok(work) = rx.recv() {
        let Work { id, key, task, token } = work;
        if token.is_cancelled() {
            tracing::debug!(job = id.0, "schedule.skip_cancelled");
        } else {
            let result = panic::catch_unwind(AssertUnwindSafe(|| task(id, &token)));
            if result.is_err() {
                tracing::error!(job = id.0, "schedule.task_panicked");
            }
        }
        shared.finish(key, id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;

    fn wait_idle(scheduler: &FetchScheduler) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !scheduler.is_idle() {
            assert!(Instant::now() < deadline, "scheduler never went idle");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn rescheduling_cancels_the_previous_job() {
        let scheduler = FetchScheduler::new(Duration::from_millis(30), 2).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let first_tx = tx.clone();
        let first = scheduler.schedule(
            SurfaceId(1),
            Box::new(move |_, _| {
                let _ = first_tx.send("first");
            }),
        );
        let second = scheduler.schedule(
            SurfaceId(1),
            Box::new(move |_, _| {
                let _ = tx.send("second");
            }),
        );

        assert!(first.token.is_cancelled());
        assert!(second.id > first.id);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "second");
        wait_idle(&scheduler);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn surfaces_do_not_cancel_each_other() {
        let scheduler = FetchScheduler::new(Duration::from_millis(5), 2).unwrap();
        let a = scheduler.schedule(SurfaceId(1), Box::new(|_, _| {}));
        let b = scheduler.schedule(SurfaceId(2), Box::new(|_, _| {}));
        assert!(!a.token.is_cancelled());
        assert!(!b.token.is_cancelled());
        wait_idle(&scheduler);
    }

    #[test]
    fn running_job_observes_cancellation() {
        let scheduler = FetchScheduler::new(Duration::from_millis(1), 1).unwrap();
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&saw_cancel);
        scheduler.schedule(
            SurfaceId(1),
            Box::new(move |_, token| {
                let _ = started_tx.send(());
                let _ = token.cancelled().recv_timeout(Duration::from_secs(5));
                flag.store(token.is_cancelled(), Ordering::SeqCst);
            }),
        );
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(scheduler.is_pending(SurfaceId(1)));
        assert!(scheduler.cancel(SurfaceId(1)));
        wait_idle(&scheduler);
        assert!(saw_cancel.load(Ordering::SeqCst));
        assert!(!scheduler.is_pending(SurfaceId(1)));
    }

    #[test]
    fn panicking_task_does_not_kill_the_worker() {
        let scheduler = FetchScheduler::new(Duration::from_millis(1), 1).unwrap();
        scheduler.submit(Box::new(|_, _| panic!("boom")));
        let (tx, rx) = crossbeam_channel::bounded(1);
        scheduler.submit(Box::new(move |_, _| {
            let _ = tx.send(42);
        }));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        wait_idle(&scheduler);
    }

    #[test]
    fn cancelled_jobs_never_start() {
        let scheduler = FetchScheduler::new(Duration::from_millis(20), 1).unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        scheduler.schedule(
            SurfaceId(3),
            Box::new(move |_, _| {
                flag.store(true, Ordering::SeqCst);
            }),
        );
        scheduler.cancel_all();
        wait_idle(&scheduler);
        assert!(!ran.load(Ordering::SeqCst));
    }
}
