//! Single-threaded cooperative scheduler.
//!
//! All orchestrator state lives on the thread that calls [`Reactor::run`].
//! Other threads hand work to it through a bounded channel; work scheduled
//! from the loop thread itself goes to a local queue so it can never block
//! on a full channel. Items run in `(due, sequence)` order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crate::{Error, Result};

pub type Work<S> = Box<dyn FnOnce(&mut S, &ReactorHandle<S>) -> anyhow::Result<()> + Send>;

struct Scheduled<S> {
    due: Instant,
    sequence: u64,
    label: &'static str,
    work: Work<S>,
}

impl<S> Ord for Scheduled<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: earliest due, then lowest sequence, first
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl<S> PartialOrd for Scheduled<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> PartialEq for Scheduled<S> {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl<S> Eq for Scheduled<S> {}

enum Envelope<S> {
    Work(Scheduled<S>),
    Wake,
}

struct Shared<S> {
    next_sequence: AtomicU64,
    stopped: AtomicBool,
    loop_thread: Mutex<Option<ThreadId>>,
    local: Mutex<Vec<Scheduled<S>>>,
}

/// Thread-safe entry point for submitting work to a [`Reactor`].
pub struct ReactorHandle<S> {
    tx: SyncSender<Envelope<S>>,
    shared: Arc<Shared<S>>,
}

impl<S> Clone for ReactorHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> ReactorHandle<S> {
    pub fn schedule<F>(&self, label: &'static str, work: F) -> Result<()>
    where
        F: FnOnce(&mut S, &ReactorHandle<S>) -> anyhow::Result<()> + Send + 'static,
    {
        self.schedule_after(Duration::ZERO, label, work)
    }

    /// Run `work` on the loop thread no earlier than `delay` from now.
    ///
    /// Blocks while the cross-thread queue is full.
    pub fn schedule_after<F>(&self, delay: Duration, label: &'static str, work: F) -> Result<()>
    where
        F: FnOnce(&mut S, &ReactorHandle<S>) -> anyhow::Result<()> + Send + 'static,
    {
        let item = Scheduled {
            due: Instant::now() + delay,
            sequence: self.shared.next_sequence.fetch_add(1, AtomicOrdering::SeqCst),
            label,
            work: Box::new(work),
        };

        if self.on_loop_thread() {
            self.shared
                .local
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(item);
            return Ok(());
        }

        self.tx
            .send(Envelope::Work(item))
            .map_err(|_| Error::InvalidOperation("reactor has shut down".to_string()))
    }

    /// Finish the current turn, then return from `run`.
    pub fn stop(&self) {
        self.shared.stopped.store(true, AtomicOrdering::SeqCst);
        if !self.on_loop_thread() {
            // A full queue wakes the loop anyway
            let _ = self.tx.try_send(Envelope::Wake);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(AtomicOrdering::SeqCst)
    }

    fn on_loop_thread(&self) -> bool {
        let current = thread::current().id();
        *self
            .shared
            .loop_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(current)
    }
}

/// Cooperative event loop owning no state of its own; the state is lent
/// to [`Reactor::run`] for the duration of the loop.
pub struct Reactor<S> {
    rx: Receiver<Envelope<S>>,
    handle: ReactorHandle<S>,
    pending: BinaryHeap<Scheduled<S>>,
}

impl<S> Reactor<S> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = sync_channel(capacity.max(1));
        let shared = Arc::new(Shared {
            next_sequence: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            loop_thread: Mutex::new(None),
            local: Mutex::new(Vec::new()),
        });

        Self {
            rx,
            handle: ReactorHandle { tx, shared },
            pending: BinaryHeap::new(),
        }
    }

    pub fn handle(&self) -> ReactorHandle<S> {
        self.handle.clone()
    }

    /// Forget an earlier `stop()` so the loop can run again.
    pub fn clear_stop(&self) {
        self.handle.shared.stopped.store(false, AtomicOrdering::SeqCst);
    }

    /// Execute scheduled work until `stop()` is called.
    ///
    /// A stop issued before the call is honored; see [`Reactor::clear_stop`].
    /// Work left pending when the loop exits is discarded.
    pub fn run(&mut self, state: &mut S) {
        let shared = Arc::clone(&self.handle.shared);
        *shared
            .loop_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());

        tracing::debug!("reactor started");

        loop {
            self.absorb_local();
            while let Ok(envelope) = self.rx.try_recv() {
                self.accept(envelope);
            }

            if self.handle.is_stopped() {
                break;
            }

            let now = Instant::now();
            let next_due = self.pending.peek().map(|item| item.due);
            match next_due {
                Some(due) if due <= now => self.run_turn(state, now),
                Some(due) => match self.rx.recv_timeout(due - now) {
                    Ok(envelope) => self.accept(envelope),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.rx.recv() {
                    Ok(envelope) => self.accept(envelope),
                    Err(_) => break,
                },
            }
        }

        *shared
            .loop_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.discard_pending();

        tracing::debug!("reactor stopped");
    }

    fn run_turn(&mut self, state: &mut S, now: Instant) {
        let mut turn = Vec::new();
        while self.pending.peek().is_some_and(|item| item.due <= now) {
            if let Some(item) = self.pending.pop() {
                turn.push(item);
            }
        }

        for item in turn {
            let label = item.label;
            let handle = &self.handle;
            let result = panic::catch_unwind(AssertUnwindSafe(|| (item.work)(state, handle)));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::error!(work = label, error = %err, "reactor work failed"),
                Err(_) => tracing::error!(work = label, "reactor work panicked"),
            }
        }
    }

    fn accept(&mut self, envelope: Envelope<S>) {
        match envelope {
            Envelope::Work(item) => self.pending.push(item),
            Envelope::Wake => {}
        }
    }

    fn absorb_local(&mut self) {
        let local = std::mem::take(
            &mut *self
                .handle
                .shared
                .local
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.pending.extend(local);
    }

    fn discard_pending(&mut self) {
        self.absorb_local();
        while self.rx.try_recv().is_ok() {}
        if !self.pending.is_empty() {
            tracing::debug!(count = self.pending.len(), "discarding pending reactor work");
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    type Log = Vec<String>;

    fn push(label: &'static str) -> impl FnOnce(&mut Log, &ReactorHandle<Log>) -> anyhow::Result<()> {
        move |log, _| {
            log.push(label.to_string());
            Ok(())
        }
    }

    fn stop_after(delay: Duration, handle: &ReactorHandle<Log>) {
        handle
            .schedule_after(delay, "stop", |_, h| {
                h.stop();
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_runs_in_submission_order() {
        let mut reactor = Reactor::new(16);
        let handle = reactor.handle();
        for label in ["a", "b", "c"] {
            handle.schedule(label, push(label)).unwrap();
        }
        stop_after(Duration::from_millis(20), &handle);

        let mut log = Log::new();
        reactor.run(&mut log);

        assert_eq!(log, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_shorter_delay_can_overtake() {
        let mut reactor = Reactor::new(16);
        let handle = reactor.handle();
        handle
            .schedule_after(Duration::from_millis(60), "late", push("late"))
            .unwrap();
        handle
            .schedule_after(Duration::from_millis(10), "early", push("early"))
            .unwrap();
        stop_after(Duration::from_millis(100), &handle);

        let mut log = Log::new();
        reactor.run(&mut log);

        assert_eq!(log, vec!["early", "late"]);
    }

    #[test]
    fn test_nested_work_runs_in_a_later_turn() {
        let mut reactor = Reactor::new(16);
        let handle = reactor.handle();
        handle
            .schedule("outer", |log: &mut Log, h| {
                log.push("outer".to_string());
                h.schedule("inner", push("inner"))?;
                log.push("outer-done".to_string());
                Ok(())
            })
            .unwrap();
        handle.schedule("sibling", push("sibling")).unwrap();
        stop_after(Duration::from_millis(20), &handle);

        let mut log = Log::new();
        reactor.run(&mut log);

        assert_eq!(log, vec!["outer", "outer-done", "sibling", "inner"]);
    }

    #[test]
    fn test_stop_finishes_current_turn() {
        let mut reactor = Reactor::new(16);
        let handle = reactor.handle();
        handle
            .schedule("stopper", |log: &mut Log, h| {
                h.stop();
                h.schedule("next-turn", push("next-turn"))?;
                log.push("stopper".to_string());
                Ok(())
            })
            .unwrap();
        handle.schedule("same-turn", push("same-turn")).unwrap();

        let mut log = Log::new();
        reactor.run(&mut log);

        assert_eq!(log, vec!["stopper", "same-turn"]);
    }

    #[test]
    fn test_failing_work_does_not_stop_loop() {
        let mut reactor = Reactor::new(16);
        let handle = reactor.handle();
        handle
            .schedule("fails", |_: &mut Log, _| anyhow::bail!("boom"))
            .unwrap();
        handle
            .schedule("panics", |_: &mut Log, _| panic!("kaboom"))
            .unwrap();
        handle.schedule("after", push("after")).unwrap();
        stop_after(Duration::from_millis(20), &handle);

        let mut log = Log::new();
        reactor.run(&mut log);

        assert_eq!(log, vec!["after"]);
    }

    #[test]
    fn test_cross_thread_work_wakes_idle_loop() {
        let mut reactor = Reactor::new(4);
        let handle = reactor.handle();
        let (ready_tx, ready_rx) = channel();

        let producer = thread::spawn(move || {
            ready_rx.recv().unwrap();
            for i in 0..10 {
                let label: &'static str = if i % 2 == 0 { "even" } else { "odd" };
                handle.schedule(label, push(label)).unwrap();
            }
            handle
                .schedule("stop", |_: &mut Log, h| {
                    h.stop();
                    Ok(())
                })
                .unwrap();
        });

        reactor
            .handle()
            .schedule("ready", move |_: &mut Log, _| {
                ready_tx.send(()).unwrap();
                Ok(())
            })
            .unwrap();

        let mut log = Log::new();
        reactor.run(&mut log);
        producer.join().unwrap();

        assert_eq!(log.len(), 10);
        for (i, label) in log.iter().enumerate() {
            assert_eq!(label, if i % 2 == 0 { "even" } else { "odd" });
        }
    }

    #[test]
    fn test_stop_before_run_is_honored() {
        let mut reactor = Reactor::new(16);
        let handle = reactor.handle();
        handle.stop();
        handle.schedule("never", push("never")).unwrap();

        let mut log = Log::new();
        reactor.run(&mut log);

        assert!(log.is_empty());
    }

    #[test]
    fn test_run_can_be_repeated_after_clear_stop() {
        let mut reactor = Reactor::new(16);
        let handle = reactor.handle();
        let mut log = Log::new();

        handle.schedule("first", push("first")).unwrap();
        stop_after(Duration::from_millis(10), &handle);
        reactor.run(&mut log);

        reactor.clear_stop();
        handle.schedule("second", push("second")).unwrap();
        stop_after(Duration::from_millis(10), &handle);
        reactor.run(&mut log);

        assert_eq!(log, vec!["first", "second"]);
    }
}
