//! Decoded image cache with background loading
//!
//! **Why**: Decoding a large page takes far longer than a UI frame. Recently
//! shown images stay decoded so flipping back and forth is instant, and the
//! next image can be decoded ahead of time.
//!
//! **Used by**: Viewer (primary loads and prefetch)
//!
//! # Architecture
//!
//! - **LruCache**: at most `capacity` completed requests (default 5), MRU first
//! - **PendingQueue**: newest-first, deduplicated by locator
//! - **Decode worker**: one thread, see `core::workers`
//! - **Completion channel**: worker -> foreground; the foreground inserts into
//!   the cache, so there is only ever one cache writer
//!
//! # Concurrency
//!
//! The cache lock and the queue lock are never held together, and neither is
//! held across a decode call.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tripane::core::cache::{CacheEvent, ImageCache, Lookup};
//! use tripane::core::loader::ImageDecoder;
//! use tripane::core::locator::Locator;
//!
//! let cache = ImageCache::new(Arc::new(ImageDecoder), 5).unwrap();
//! if let Lookup::Hit(req) = cache.request_load(Locator::new("page01.png")) {
//!     println!("cached: {}", req.locator);
//! }
//! for event in cache.poll() {
//!     if let CacheEvent::Loaded(req) = event {
//!         println!("decoded: {}", req.locator);
//!     }
//! }
//! ```

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use log::{debug, info, trace, warn};
use lru::LruCache;

use crate::core::loader::Decoder;
use crate::core::locator::Locator;
use crate::core::raster::Raster;
use crate::core::workers::{self, Completion, PendingQueue, Signal, lock_queue};
use crate::error::{Error, Result};

/// Default number of decoded images kept.
pub const DEFAULT_CAPACITY: usize = 5;

/// One image to decode. Equality is by locator only.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub locator: Locator,
    /// Filled in place by the worker when decoding succeeds.
    pub result: Option<Arc<Raster>>,
}

impl LoadRequest {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            result: None,
        }
    }

    pub fn raster(&self) -> Option<&Arc<Raster>> {
        self.result.as_ref()
    }
}

impl PartialEq for LoadRequest {
    fn eq(&self, other: &Self) -> bool {
        self.locator == other.locator
    }
}

impl Eq for LoadRequest {}

/// What `request_load` did with a locator.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Already decoded; no background work.
    Hit(Arc<LoadRequest>),
    /// New request queued.
    Queued,
    /// Was already queued; moved to the head (primary) or left in place
    /// (prefetch).
    Requeued,
    /// Being decoded right now, or decoded and awaiting `complete()`.
    InFlight,
    /// Worker has shut down.
    Closed,
}

/// Foreground notification produced by `complete()`.
#[derive(Debug)]
pub enum CacheEvent {
    Loaded(Arc<LoadRequest>),
    Failed { locator: Locator, error: Error },
}

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

pub struct ImageCache {
    entries: Mutex<LruCache<Locator, Arc<LoadRequest>>>,
    queue: Arc<Mutex<PendingQueue>>,
    signal: Arc<Signal>,
    completions: Receiver<Completion>,
    worker: Option<JoinHandle<()>>,
    stats: CacheStats,
}

impl ImageCache {
    /// Create the cache and start its decode worker.
    ///
    /// `capacity` below 1 is raised to 1.
    pub fn new(decoder: Arc<dyn Decoder>, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let queue = Arc::new(Mutex::new(PendingQueue::default()));
        let signal = Arc::new(Signal::default());
        let (tx, rx) = unbounded();

        let worker = workers::spawn(Arc::clone(&queue), Arc::clone(&signal), decoder, tx)
            .map_err(Error::Io)?;

        info!("ImageCache created: capacity={}", capacity);

        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            queue,
            signal,
            completions: rx,
            worker: Some(worker),
            stats: CacheStats::default(),
        })
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<Locator, Arc<LoadRequest>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up `locator`; on a miss, queue it at the head for decoding unless
    /// it is already being decoded.
    pub fn request_load(&self, locator: Locator) -> Lookup {
        let hit = self.entries().get(&locator).cloned();
        if let Some(entry) = hit {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit: {}", locator);
            return Lookup::Hit(entry);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.enqueue(locator, true)
    }

    /// Background variant for adjacent images: queued at the tail so it never
    /// delays a primary request, and a cached entry keeps its LRU position.
    pub fn request_prefetch(&self, locator: Locator) -> Lookup {
        let hit = self.entries().peek(&locator).cloned();
        if let Some(entry) = hit {
            trace!("Prefetch already cached: {}", locator);
            return Lookup::Hit(entry);
        }
        self.enqueue(locator, false)
    }

    fn enqueue(&self, locator: Locator, urgent: bool) -> Lookup {
        if self.worker.is_none() {
            warn!("Cache closed, dropping request for {}", locator);
            return Lookup::Closed;
        }

        let mut pending = lock_queue(&self.queue);
        if pending.is_busy(&locator) {
            debug!("Cache miss, already in flight: {}", locator);
            return Lookup::InFlight;
        }
        let request = LoadRequest::new(locator.clone());
        let added = if urgent {
            pending.push_front(request)
        } else {
            pending.push_back(request)
        };
        drop(pending);

        if added {
            debug!("Cache miss, queued ({}): {}", if urgent { "head" } else { "tail" }, locator);
            self.signal.release();
            Lookup::Queued
        } else {
            debug!("Cache miss, already queued: {}", locator);
            Lookup::Requeued
        }
    }

    /// Drop every queued request. A decode in progress is not interrupted.
    pub fn clear_pending(&self) {
        let mut pending = lock_queue(&self.queue);
        let dropped = pending.len();
        pending.clear();
        if dropped > 0 {
            debug!("Cleared {} pending requests", dropped);
        }
    }

    /// Empty the cache.
    pub fn flush(&self) {
        self.entries().clear();
        debug!("Cache flushed");
    }

    /// Stop the worker: clear pending, queue the shutdown marker and wait for
    /// the thread to exit. A decode in progress finishes and its completion
    /// stays readable. Safe to call more than once.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        {
            let mut pending = lock_queue(&self.queue);
            pending.clear();
            pending.push_shutdown();
        }
        self.signal.release();
        if handle.join().is_err() {
            warn!("Decode worker panicked during shutdown");
        }
        info!("ImageCache shut down");
    }

    /// Worker completions, for callers that multiplex with other channels.
    /// Pass each received value to `complete()`.
    pub fn completions(&self) -> &Receiver<Completion> {
        &self.completions
    }

    /// Foreground half of a completion: cache successful results (evicting the
    /// least recently used entry when full) and turn it into an event.
    pub fn complete(&self, completion: Completion) -> CacheEvent {
        match completion {
            Completion::Loaded(request) => {
                let locator = request.locator.clone();
                let entry = Arc::new(request);
                {
                    let mut entries = self.entries();
                    if let Some((evicted, _)) = entries.push(locator.clone(), Arc::clone(&entry)) {
                        if evicted != locator {
                            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                            debug!("LRU evicted: {}", evicted);
                        }
                    }
                }
                lock_queue(&self.queue).claim(&locator);
                debug!("Cached: {}", locator);
                CacheEvent::Loaded(entry)
            }
            Completion::Failed { locator, error } => CacheEvent::Failed { locator, error },
        }
    }

    /// Drain completions without blocking.
    pub fn poll(&self) -> Vec<CacheEvent> {
        self.completions
            .try_iter()
            .collect::<Vec<_>>()
            .into_iter()
            .map(|c| self.complete(c))
            .collect()
    }

    /// Block up to `timeout` for the next completion.
    pub fn wait(&self, timeout: Duration) -> Option<CacheEvent> {
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => Some(self.complete(completion)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Cached without touching LRU order.
    pub fn contains(&self, locator: &Locator) -> bool {
        self.entries().contains(locator)
    }

    /// Cached locators, most recently used first.
    pub fn cached(&self) -> Vec<Locator> {
        self.entries().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries().cap().get()
    }

    pub fn pending_len(&self) -> usize {
        lock_queue(&self.queue).len()
    }

    pub fn is_queued(&self, locator: &Locator) -> bool {
        lock_queue(&self.queue).contains(locator)
    }

    pub fn in_flight(&self) -> Option<Locator> {
        lock_queue(&self.queue).in_flight().cloned()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Drop for ImageCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
