//! Cooperative cancellation and a pending-target future.
//!
//! Both are built on a crossbeam channel whose sender is dropped to signal:
//! every receiver then wakes with a disconnect, so the signal can be awaited
//! in `select!` next to timeouts and other channels.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;

use crate::resolver::Resolution;

/// One-shot signal. Opening is idempotent.
struct Latch {
    /// Set once the latch opened.
    open: AtomicBool,
    /// Wakes with a disconnect once the sender is dropped.
    receiver: Receiver<()>,
    /// Dropped to open the latch.
    sender: Mutex<Option<Sender<()>>>,
}

impl Latch {
    fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        return Self {
            open: AtomicBool::new(false),
            receiver,
            sender: Mutex::new(Some(sender)),
        };
    }

    /// Open the latch; returns `false` if it was already open.
    fn open(&self) -> bool {
        let sender = self.sender.lock().take();
        self.open.store(true, Ordering::Release);
        return sender.is_some();
    }

    fn is_open(&self) -> bool {
        return self.open.load(Ordering::Acquire);
    }
}

/// Shared cancellation flag for one scheduled job.
#[derive(Clone)]
pub struct CancelToken {
    /// Opened on cancel.
    latch: Arc<Latch>,
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.debug_struct("CancelToken").field("cancelled", &self.is_cancelled()).finish();
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        return Self::new();
    }
}

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        return Self {
            latch: Arc::new(Latch::new()),
        };
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.latch.open();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        return self.latch.is_open();
    }

    /// Channel that disconnects on cancellation, for use in `select!`.
    pub fn cancelled(&self) -> &Receiver<()> {
        return &self.latch.receiver;
    }
}

/// Completion callback.
type Callback = Box<dyn FnOnce(&Resolution) + Send>;

/// Value and pending callbacks of an `ElementFuture`.
struct FutureState {
    /// Callbacks waiting for completion.
    callbacks: Vec<Callback>,
    /// Set exactly once.
    value: Option<Resolution>,
}

/// Shared part of an `ElementFuture`.
struct FutureInner {
    /// Opened on completion.
    done: Latch,
    /// Value and callbacks.
    state: Mutex<FutureState>,
}

/// A target resolution that may still be running on a worker.
#[derive(Clone)]
pub struct ElementFuture {
    /// Shared completion state.
    inner: Arc<FutureInner>,
}

impl fmt::Debug for ElementFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.debug_struct("ElementFuture").field("value", &self.get_now()).finish();
    }
}

impl Default for ElementFuture {
    fn default() -> Self {
        return Self::new();
    }
}

impl ElementFuture {
    /// An uncompleted future.
    pub fn new() -> Self {
        return Self {
            inner: Arc::new(FutureInner {
                done: Latch::new(),
                state: Mutex::new(FutureState {
                    callbacks: Vec::new(),
                    value: None,
                }),
            }),
        };
    }

    /// A future that is already complete.
    pub fn ready(value: Resolution) -> Self {
        let future = Self::new();
        future.complete(value);
        return future;
    }

    /// Complete with a value and run waiting callbacks on this thread.
    /// Returns `false` if the future was already complete.
    pub fn complete(&self, value: Resolution) -> bool {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.value.is_some() {
                return false;
            }
            state.value = Some(value.clone());
            std::mem::take(&mut state.callbacks)
        };
        self.inner.done.open();
        for callback in callbacks {
            callback(&value);
        }
        return true;
    }

    /// The value if already complete.
    pub fn get_now(&self) -> Option<Resolution> {
        return self.inner.state.lock().value.clone();
    }

    /// Whether the future completed.
    pub fn is_done(&self) -> bool {
        return self.inner.done.is_open();
    }

    /// Block up to `timeout` for the value.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Resolution> {
        if let Some(value) = self.get_now() {
            return Some(value);
        }
        select! {
            recv(self.inner.done.receiver) -> _ => {},
            default(timeout) => return None,
        }
        return self.get_now();
    }

    /// Block up to `timeout` for the value, giving up early on cancellation.
    pub fn wait_cancellable(&self, token: &CancelToken, timeout: Duration) -> Option<Resolution> {
        if let Some(value) = self.get_now() {
            return Some(value);
        }
        if token.is_cancelled() {
            return None;
        }
        select! {
            recv(self.inner.done.receiver) -> _ => {},
            recv(token.cancelled()) -> _ => return None,
            default(timeout) => return None,
        }
        return self.get_now();
    }

    /// Run `callback` on completion: immediately if already complete, otherwise
    /// on the completing thread.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Resolution) + Send + 'static,
    {
        let ready = {
            let mut state = self.inner.state.lock();
            match &state.value {
                Some(value) => Some(value.clone()),
                None => {
                    state.callbacks.push(Box::new(callback));
                    return;
                },
            }
        };
        if let Some(value) = ready {
            callback(&value);
        }
    }
}
