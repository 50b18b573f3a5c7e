//! Hand-off between background work and the tick thread.
//!
//! Only the tick thread mutates the [`World`](crate::world::World). Anything
//! produced elsewhere (chunk loads, save writes, callbacks from other
//! threads) travels through one of these queues and is applied when the tick
//! thread drains it:
//!
//! - [`LoadQueue`] runs a load function on worker threads and stages the
//!   results on a channel; [`LoadQueue::integrate`] applies them on the tick
//!   thread, dropping results nobody wants any more.
//! - [`SaveQueue`] collects dirty keys without duplicates and hands them out
//!   a few per tick.
//! - [`Inbox`] carries arbitrary messages from any thread to the tick thread.
//!
//! There are no timeouts: a stalled load stalls only its worker.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::thread::JoinHandle;

/// Results a load queue buffers before workers block on delivery.
pub const RESULT_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("staging queue is shut down")]
    Closed,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// LoadQueue
// ---------------------------------------------------------------------------

/// Background loader keyed by `K`, producing `V`.
///
/// Requests for a key already in flight are folded into the existing
/// request. A cancelled key's result is discarded when it arrives.
pub struct LoadQueue<K, V> {
    jobs: Option<Sender<K>>,
    results: Option<Receiver<(K, V)>>,
    workers: Vec<JoinHandle<()>>,
    pending: HashSet<K>,
    wanted: HashSet<K>,
}

impl<K, V> std::fmt::Debug for LoadQueue<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadQueue")
            .field("workers", &self.workers.len())
            .field("in_flight", &self.pending.len())
            .field("wanted", &self.wanted.len())
            .finish()
    }
}

impl<K, V> LoadQueue<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    /// Start `workers` threads (at least one) running `load`.
    pub fn new<F>(workers: usize, load: F) -> Result<Self, StagingError>
    where
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<K>();
        let (result_tx, result_rx) = crossbeam_channel::bounded::<(K, V)>(RESULT_CAPACITY);
        let load = std::sync::Arc::new(load);

        let mut handles = Vec::new();
        for i in 0..workers.max(1) {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let load = std::sync::Arc::clone(&load);
            let handle = std::thread::Builder::new()
                .name(format!("forge-load-{i}"))
                .spawn(move || {
                    for key in jobs.iter() {
                        let value = load(&key);
                        if results.send((key, value)).is_err() {
                            break;
                        }
                    }
                })?;
            handles.push(handle);
        }

        Ok(Self {
            jobs: Some(job_tx),
            results: Some(result_rx),
            workers: handles,
            pending: HashSet::new(),
            wanted: HashSet::new(),
        })
    }

    /// Ask for `key` to be loaded. Returns `false` if it was already in flight.
    pub fn request(&mut self, key: K) -> Result<bool, StagingError> {
        self.wanted.insert(key.clone());
        if self.pending.contains(&key) {
            return Ok(false);
        }
        let jobs = self.jobs.as_ref().ok_or(StagingError::Closed)?;
        jobs.send(key.clone()).map_err(|_| StagingError::Closed)?;
        self.pending.insert(key);
        Ok(true)
    }

    /// Stop wanting `key`. An in-flight load still completes; its result is dropped.
    pub fn cancel(&mut self, key: &K) {
        self.wanted.remove(key);
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    /// Loads dispatched and not yet integrated.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Apply up to `max` finished loads with `apply`. Call from the tick
    /// thread. Returns how many results were applied.
    pub fn integrate(&mut self, max: usize, mut apply: impl FnMut(K, V)) -> usize {
        let Some(results) = self.results.as_ref() else {
            return 0;
        };
        let mut applied = 0;
        while applied < max {
            match results.try_recv() {
                Ok((key, value)) => {
                    self.pending.remove(&key);
                    if self.wanted.remove(&key) {
                        apply(key, value);
                        applied += 1;
                    } else {
                        log::debug!("discarding load result nobody is waiting for");
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("all load workers have exited");
                    break;
                }
            }
        }
        applied
    }
}

impl<K, V> Drop for LoadQueue<K, V> {
    fn drop(&mut self) {
        // Closing both channels unblocks workers waiting on a job or on delivery.
        self.jobs.take();
        self.results.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("load worker panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SaveQueue
// ---------------------------------------------------------------------------

/// FIFO of keys awaiting a disk write. A key already queued is not queued again.
#[derive(Debug, Clone)]
pub struct SaveQueue<K> {
    queue: VecDeque<K>,
    queued: HashSet<K>,
}

impl<K> Default for SaveQueue<K> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> SaveQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `key`. Returns `false` if it was already waiting.
    pub fn push(&mut self, key: K) -> bool {
        if !self.queued.insert(key.clone()) {
            return false;
        }
        self.queue.push_back(key);
        true
    }

    /// Take up to `max` keys, oldest first.
    pub fn drain_batch(&mut self, max: usize) -> Vec<K> {
        let take = max.min(self.queue.len());
        let batch: Vec<K> = self.queue.drain(..take).collect();
        for key in &batch {
            self.queued.remove(key);
        }
        batch
    }

    pub fn contains(&self, key: &K) -> bool {
        self.queued.contains(key)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Inbox
// ---------------------------------------------------------------------------

/// Messages posted from any thread, drained on the tick thread.
#[derive(Debug)]
pub struct Inbox<M> {
    sender: Sender<M>,
    receiver: Receiver<M>,
}

impl<M> Default for Inbox<M> {
    fn default() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }
}

impl<M: Send> Inbox<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle other threads use to post messages.
    pub fn sender(&self) -> InboxSender<M> {
        InboxSender {
            sender: self.sender.clone(),
        }
    }

    /// Every message posted so far, in arrival order.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// Posting side of an [`Inbox`].
#[derive(Debug)]
pub struct InboxSender<M> {
    sender: Sender<M>,
}

impl<M> Clone for InboxSender<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M> InboxSender<M> {
    pub fn send(&self, message: M) -> Result<(), StagingError> {
        self.sender.send(message).map_err(|_| StagingError::Closed)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
