//! Sequential invoker: one worker thread per instance serving an unbounded FIFO of callbacks.
//!
//! ```text
//!  producer A ──invoke_async──┐
//!  producer B ──invoke────────┼──► [ FIFO ] ──► worker thread ──► callback(&mut state)
//!  finisher   ──drain─────────┘                     (one at a time, submission order)
//! ```
//!
//! Blocking and non-blocking submissions share the same queue, so a blocking call
//! waits behind every earlier asynchronous one. A failing callback reports to its own
//! submitter and the worker moves on to the next job.

use std::{
    any::Any,
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    task::{Context, Poll},
    thread::{self, JoinHandle, ThreadId},
};

use tokio::sync::oneshot;

use crate::error::{Error, Result};

type Callback<S> = Box<dyn FnOnce(&mut S) -> Result<()> + Send>;

struct Job<S> {
    callback: Callback<S>,
    reply: oneshot::Sender<Result<()>>,
}

pub struct SequentialInvoker<S: Send + 'static> {
    name: String,
    sender: Option<mpsc::Sender<Job<S>>>,
    worker: Option<JoinHandle<S>>,
    worker_id: ThreadId,
    pending: Arc<AtomicUsize>,
}

impl<S: Send + 'static> SequentialInvoker<S> {
    /// Starts the worker thread. `state` moves onto the worker and is handed to every
    /// callback as `&mut S`.
    pub fn new(name: &str, state: S) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job<S>>();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker_name = name.to_string();
        let worker_pending = pending.clone();
        let worker = thread::Builder::new()
            .name(format!("invoker-{}", name))
            .spawn(move || Self::worker_loop(worker_name, state, receiver, worker_pending))?;

        log::debug!("sequential invoker started: {}", name);
        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            worker_id: worker.thread().id(),
            worker: Some(worker),
            pending,
        })
    }

    /// Enqueues `callback` and blocks until it has run.
    ///
    /// Must not be used where blocking is forbidden; `.await` the handle from
    /// [`invoke_async`](Self::invoke_async) there instead. Called from inside a
    /// callback it fails with [`Error::Invocation`], since the worker would wait on itself.
    pub fn invoke<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(&mut S) -> Result<()> + Send + 'static,
    {
        if thread::current().id() == self.worker_id {
            return Err(Error::Invocation(format!(
                "{}: blocking call from its own worker",
                self.name
            )));
        }
        self.invoke_async(callback)?.wait()
    }

    /// Enqueues `callback` and returns immediately.
    pub fn invoke_async<F>(&self, callback: F) -> Result<Invocation>
    where
        F: FnOnce(&mut S) -> Result<()> + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::Invocation(format!("{} has been shut down", self.name)))?;

        let (reply, rx) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender
            .send(Job {
                callback: Box::new(callback),
                reply,
            })
            .is_err()
        {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Invocation(format!("{} worker has stopped", self.name)));
        }
        Ok(Invocation { rx })
    }

    /// Blocks until every callback submitted before this call has completed.
    pub fn wait_for_pending_invocations(&self) -> Result<()> {
        self.invoke(|_| Ok(()))
    }

    /// Number of submitted callbacks that have not completed yet.
    pub fn pending_invocations(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Runs everything still queued, stops the worker and returns the state.
    pub fn into_inner(mut self) -> Result<S> {
        self.sender.take();
        let worker = self
            .worker
            .take()
            .ok_or_else(|| Error::Invocation(format!("{} has no worker", self.name)))?;
        worker
            .join()
            .map_err(|panic| Error::Invocation(panic_message(panic.as_ref())))
    }

    fn worker_loop(
        name: String,
        mut state: S,
        receiver: mpsc::Receiver<Job<S>>,
        pending: Arc<AtomicUsize>,
    ) -> S {
        while let Ok(job) = receiver.recv() {
            let Job { callback, reply } = job;
            let result = match catch_unwind(AssertUnwindSafe(|| callback(&mut state))) {
                Ok(result) => result,
                Err(panic) => Err(Error::Invocation(panic_message(panic.as_ref()))),
            };
            pending.fetch_sub(1, Ordering::SeqCst);

            if let Err(Err(e)) = reply.send(result) {
                // Nobody holds the handle any more.
                log::error!("{}: detached invocation failed: {}", name, e);
            }
        }
        log::debug!("sequential invoker stopped: {}", name);
        state
    }
}

impl<S: Send + 'static> Drop for SequentialInvoker<S> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("callback panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("callback panicked: {}", s)
    } else {
        "callback panicked".to_string()
    }
}

/// Completion handle of one queued callback.
///
/// Await it, [`wait`](Invocation::wait) on it, or drop it; dropping does not cancel
/// the callback.
#[derive(Debug)]
#[must_use = "dropping the handle discards the write result"]
pub struct Invocation {
    rx: oneshot::Receiver<Result<()>>,
}

impl Invocation {
    /// Blocks the calling thread until the callback has completed.
    pub fn wait(self) -> Result<()> {
        futures::executor::block_on(self)
    }
}

impl Future for Invocation {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| match r {
            Ok(result) => result,
            Err(_) => Err(Error::Invocation(
                "worker dropped the invocation".to_string(),
            )),
        })
    }
}

#[cfg(test)]
#[path = "invoker_test.rs"]
mod invoker_test;
