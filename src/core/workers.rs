//! Single background decode worker.
//!
//! One thread, one decode at a time. The foreground pushes requests to the
//! head of a shared queue and bumps a counting signal; the worker wakes, drains
//! the queue head-first and hands each result back over a channel.
//!
//! Shutdown is a `None` entry in the queue. Once popped, the worker exits even
//! if real requests are still queued behind it.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use crossbeam_channel::Sender;
use log::{trace, warn};

use crate::core::cache::LoadRequest;
use crate::core::loader::Decoder;
use crate::core::locator::Locator;
use crate::error::Error;

/// Result of one decode attempt, delivered to the foreground thread.
#[derive(Debug)]
pub enum Completion {
    Loaded(LoadRequest),
    Failed { locator: Locator, error: Error },
}

/// Counting wake signal, starts at zero.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    count: Mutex<usize>,
    ready: Condvar,
}

impl Signal {
    pub(crate) fn release(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count += 1;
        self.ready.notify_one();
    }

    pub(crate) fn acquire(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        while *count == 0 {
            count = self.ready.wait(count).unwrap_or_else(|e| e.into_inner());
        }
        *count -= 1;
    }
}

/// Queue state shared between foreground and worker.
///
/// `in_flight` is the request being decoded right now. `delivered` holds
/// locators whose decoded result is sitting in the channel but not yet in the
/// cache. A request for either is a duplicate and must not be queued again.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    items: VecDeque<Option<LoadRequest>>,
    in_flight: Option<Locator>,
    delivered: Vec<Locator>,
}

impl PendingQueue {
    pub(crate) fn is_busy(&self, locator: &Locator) -> bool {
        self.in_flight.as_ref() == Some(locator) || self.delivered.contains(locator)
    }

    pub(crate) fn contains(&self, locator: &Locator) -> bool {
        self.items
            .iter()
            .flatten()
            .any(|req| &req.locator == locator)
    }

    /// Insert at the head. An already queued copy is moved to the head instead;
    /// returns `false` in that case so the caller doesn't signal twice.
    pub(crate) fn push_front(&mut self, request: LoadRequest) -> bool {
        let existing = self
            .items
            .iter()
            .position(|item| item.as_ref().is_some_and(|r| r.locator == request.locator));
        match existing {
            Some(idx) => {
                if let Some(item) = self.items.remove(idx) {
                    self.items.push_front(item);
                }
                false
            }
            None => {
                self.items.push_front(Some(request));
                true
            }
        }
    }

    /// Append at the tail. An already queued copy keeps its place; returns
    /// `false` in that case.
    pub(crate) fn push_back(&mut self, request: LoadRequest) -> bool {
        if self.contains(&request.locator) {
            return false;
        }
        self.items.push_back(Some(request));
        true
    }

    pub(crate) fn push_shutdown(&mut self) {
        self.items.push_front(None);
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of real requests waiting.
    pub(crate) fn len(&self) -> usize {
        self.items.iter().flatten().count()
    }

    pub(crate) fn in_flight(&self) -> Option<&Locator> {
        self.in_flight.as_ref()
    }

    /// Foreground claimed a delivered result.
    pub(crate) fn claim(&mut self, locator: &Locator) {
        self.delivered.retain(|l| l != locator);
    }
}

pub(crate) fn lock_queue(queue: &Mutex<PendingQueue>) -> MutexGuard<'_, PendingQueue> {
    queue.lock().unwrap_or_else(|e| e.into_inner())
}

/// Start the decode thread.
pub(crate) fn spawn(
    queue: Arc<Mutex<PendingQueue>>,
    signal: Arc<Signal>,
    decoder: Arc<dyn Decoder>,
    completions: Sender<Completion>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("tripane-decoder".to_string())
        .spawn(move || {
            trace!("Decode worker started");
            run(&queue, &signal, decoder.as_ref(), &completions);
            trace!("Decode worker stopped");
        })
}

fn run(
    queue: &Mutex<PendingQueue>,
    signal: &Signal,
    decoder: &dyn Decoder,
    completions: &Sender<Completion>,
) {
    loop {
        signal.acquire();

        loop {
            let mut request = {
                let mut pending = lock_queue(queue);
                match pending.items.pop_front() {
                    None => break,
                    Some(None) => {
                        trace!("Decode worker: shutdown request");
                        return;
                    }
                    Some(Some(request)) => {
                        pending.in_flight = Some(request.locator.clone());
                        request
                    }
                }
            };

            trace!("Decode worker: decoding {}", request.locator);
            // Decoder panics must not take the worker down
            let result = panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(&request.locator)))
                .unwrap_or_else(|_| Err(Error::decode(&request.locator, "decoder panicked")));

            let completion = {
                let mut pending = lock_queue(queue);
                pending.in_flight = None;
                match result {
                    Ok(raster) => {
                        pending.delivered.push(request.locator.clone());
                        request.result = Some(Arc::new(raster));
                        Completion::Loaded(request)
                    }
                    Err(error) => {
                        warn!("Decode worker: failed {}: {}", request.locator, error);
                        Completion::Failed {
                            locator: request.locator,
                            error,
                        }
                    }
                }
            };

            if completions.send(completion).is_err() {
                trace!("Decode worker: completion receiver dropped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn req(name: &str) -> LoadRequest {
        LoadRequest::new(Locator::new(name))
    }

    #[test]
    fn test_push_front_dedups_and_moves_to_head() {
        let mut q = PendingQueue::default();
        assert!(q.push_front(req("a")));
        assert!(q.push_front(req("b")));
        assert!(q.push_front(req("c")));
        assert!(!q.push_front(req("a")));
        assert_eq!(q.len(), 3);

        let order: Vec<String> = q
            .items
            .iter()
            .flatten()
            .map(|r| r.locator.to_string())
            .collect();
        assert_eq!(order, ["a", "c", "b"]);
    }

    #[test]
    fn test_push_back_keeps_existing_position() {
        let mut q = PendingQueue::default();
        q.push_front(req("a"));
        assert!(q.push_back(req("b")));
        assert!(!q.push_back(req("a")));
        assert!(q.push_front(req("c")));

        let order: Vec<String> = q
            .items
            .iter()
            .flatten()
            .map(|r| r.locator.to_string())
            .collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[test]
    fn test_shutdown_entry_not_counted() {
        let mut q = PendingQueue::default();
        q.push_front(req("a"));
        q.push_shutdown();
        assert_eq!(q.len(), 1);
        assert!(q.contains(&Locator::new("a")));
        q.clear();
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_busy_tracks_in_flight_and_delivered() {
        let mut q = PendingQueue::default();
        let a = Locator::new("a");
        assert!(!q.is_busy(&a));
        q.in_flight = Some(a.clone());
        assert!(q.is_busy(&a));
        q.in_flight = None;
        q.delivered.push(a.clone());
        assert!(q.is_busy(&a));
        q.claim(&a);
        assert!(!q.is_busy(&a));
    }

    #[test]
    fn test_signal_counts() {
        let signal = Arc::new(Signal::default());
        signal.release();
        signal.release();
        signal.acquire();
        signal.acquire();

        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.acquire())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        signal.release();
        waiter.join().unwrap();
    }
}
