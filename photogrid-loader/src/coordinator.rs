use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use photogrid_core::{
    cache_budget, CacheStats, Collection, CollectionState, ImageDescriptor, LoaderConfig,
    Rotation, Thumbnail, ThumbnailCache,
};

use crate::decoder::Decode;
use crate::enumerator::CollectionSource;
use crate::error::{DecodeError, LoaderError};
use crate::memory::host_memory;
use crate::pool::WorkerPool;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Identity of one physical display slot. Slots are reused for many indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

/// Called from a worker thread after a result has been queued, so an event
/// loop can schedule a [`Coordinator::pump`].
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// The display side of the grid. Every call happens on the thread that owns
/// the [`Coordinator`].
pub trait GridView {
    fn show_busy(&mut self, slot: SlotId);

    fn show_image(&mut self, slot: SlotId, thumbnail: &Arc<Thumbnail>, rotation: Rotation);

    /// The decode for the slot's current item failed. The default leaves the
    /// busy placeholder in place.
    fn show_failed(&mut self, _slot: SlotId, _error: &DecodeError) {}

    /// The slot's item no longer exists after a refresh.
    fn clear(&mut self, _slot: SlotId) {}

    fn on_build_complete(&mut self, _len: usize) {}

    fn on_refresh_complete(&mut self, _changed: bool) {}
}

/// How a bind request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Rendered straight from the cache.
    Cached,
    /// A decode was queued; the slot shows the busy indicator until it lands.
    Dispatched,
}

/// What one background result did once it reached the owning thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Cached and shown in the slot.
    Rendered { slot: SlotId, index: usize },
    /// Cached only; the slot had moved on to another index.
    CachedOnly { slot: SlotId, index: usize },
    /// Dropped; the collection was replaced while decoding.
    StaleCollection { slot: SlotId, index: usize },
    /// Never decoded; the slot was rebound before a worker picked it up.
    Skipped { slot: SlotId, index: usize },
    Failed { slot: SlotId, index: usize },
    Built { len: usize },
    Refreshed { changed: bool },
}

enum DecodeOutcome {
    Done(Thumbnail),
    Failed(DecodeError),
    Skipped,
}

enum Message {
    Decoded {
        slot: SlotId,
        index: usize,
        path: PathBuf,
        rotation: Rotation,
        generation: u64,
        outcome: DecodeOutcome,
    },
    Enumerated {
        collection: Collection,
        host_memory: u64,
    },
    /// The source panicked; nothing was enumerated.
    EnumerationPanicked { host_memory: u64 },
}

#[derive(Debug)]
struct SlotBinding {
    index: Option<usize>,
    /// Advanced on every rebind and release. Queued decodes compare it with
    /// the value they were dispatched under and skip work when it moved.
    ticket: Arc<AtomicU64>,
}

impl SlotBinding {
    fn new() -> Self {
        Self {
            index: None,
            ticket: Arc::new(AtomicU64::new(0)),
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Owns the collection, the cache and every slot binding, and hands decode
/// and enumeration work to a background pool.
///
/// Not `Sync`: one thread drives it. Results from workers queue up in a
/// channel and take effect only inside [`pump`](Self::pump), where each is
/// checked against the current generation and the slot's current binding.
pub struct Coordinator {
    config: LoaderConfig,
    source: Arc<dyn CollectionSource>,
    decoder: Arc<dyn Decode>,
    pool: WorkerPool,
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
    waker: Option<Waker>,

    state: Option<CollectionState>,
    cache: ThumbnailCache,
    slots: HashMap<SlotId, SlotBinding>,

    decodes_in_flight: usize,
    enumerations_in_flight: usize,
}

impl Coordinator {
    pub fn new(
        config: LoaderConfig,
        source: Arc<dyn CollectionSource>,
        decoder: Arc<dyn Decode>,
    ) -> crate::Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(
            "photogrid-worker",
            1,
            config.worker_limit(),
            config.idle_timeout(),
        );
        let (tx, rx) = mpsc::channel();
        debug!(
            thumbnail_size = config.thumbnail_size,
            max_workers = pool.max_workers(),
            "Coordinator created"
        );
        Ok(Self {
            config,
            source,
            decoder,
            pool,
            tx,
            rx,
            waker: None,
            state: None,
            cache: ThumbnailCache::new(0),
            slots: HashMap::new(),
            decodes_in_flight: 0,
            enumerations_in_flight: 0,
        })
    }

    pub fn with_waker(mut self, waker: Waker) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    // -- Collection lifecycle -----------------------------------------------

    /// Start the first enumeration. The grid is usable once
    /// [`GridView::on_build_complete`] has fired.
    pub fn build(&mut self) {
        debug!("Requesting collection build");
        self.dispatch_enumeration();
    }

    /// Re-enumerate and replace the collection if it changed. The outcome
    /// arrives through [`GridView::on_refresh_complete`].
    pub fn refresh(&mut self) {
        debug!(generation = self.generation(), "Requesting collection refresh");
        self.dispatch_enumeration();
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.current().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero until the first build lands.
    pub fn generation(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.generation())
    }

    pub fn collection(&self) -> Option<&Arc<Collection>> {
        self.state.as_ref().map(|s| s.current())
    }

    pub fn descriptor(&self, index: usize) -> Option<&ImageDescriptor> {
        self.state.as_ref().and_then(|s| s.current().get(index))
    }

    pub fn path(&self, index: usize) -> Option<&Path> {
        self.descriptor(index).map(|d| d.path())
    }

    pub fn rotation(&self, index: usize) -> Option<Rotation> {
        self.descriptor(index).map(|d| d.rotation())
    }

    // -- Slots --------------------------------------------------------------

    /// Point `slot` at `index`.
    ///
    /// The slot shows busy first, then either the cached thumbnail or,
    /// once a worker finishes, the decoded one. An out-of-range index is
    /// rejected without touching the slot's current binding.
    pub fn bind(
        &mut self,
        slot: SlotId,
        index: usize,
        view: &mut dyn GridView,
    ) -> crate::Result<Bound> {
        let state = self.state.as_ref().ok_or(LoaderError::NotReady)?;
        let descriptor = state.current().try_get(index)?.clone();
        let generation = state.generation();

        let binding = self.slots.entry(slot).or_insert_with(SlotBinding::new);
        binding.index = Some(index);
        let ticket = binding.ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let slot_ticket = Arc::clone(&binding.ticket);

        view.show_busy(slot);
        let rotation = descriptor.rotation();
        if let Some(thumb) = self.cache.get(&descriptor.path) {
            view.show_image(slot, &thumb, rotation);
            return Ok(Bound::Cached);
        }

        self.dispatch_decode(
            slot,
            index,
            descriptor.path,
            rotation,
            generation,
            slot_ticket,
            ticket,
        );
        Ok(Bound::Dispatched)
    }

    /// Detach `slot`. Any result still pending for it is cached but not shown.
    pub fn release(&mut self, slot: SlotId) {
        if let Some(binding) = self.slots.get_mut(&slot) {
            binding.index = None;
            binding.ticket.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn bound_index(&self, slot: SlotId) -> Option<usize> {
        self.slots.get(&slot).and_then(|b| b.index)
    }

    // -- Cache --------------------------------------------------------------

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache_budget(&self) -> usize {
        self.cache.budget()
    }

    pub fn is_cached(&self, path: &Path) -> bool {
        self.cache.contains(path)
    }

    // -- Background results -------------------------------------------------

    pub fn decodes_in_flight(&self) -> usize {
        self.decodes_in_flight
    }

    /// No decode or enumeration is outstanding.
    pub fn is_idle(&self) -> bool {
        self.decodes_in_flight == 0 && self.enumerations_in_flight == 0
    }

    /// Apply every result that has arrived, without blocking.
    pub fn pump(&mut self, view: &mut dyn GridView) -> Vec<Resolution> {
        let mut resolved = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            resolved.push(self.resolve(msg, view));
        }
        resolved
    }

    /// Wait up to `timeout` for a result, then apply it and anything else queued.
    pub fn pump_timeout(&mut self, view: &mut dyn GridView, timeout: Duration) -> Vec<Resolution> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => {
                let mut resolved = vec![self.resolve(msg, view)];
                resolved.extend(self.pump(view));
                resolved
            }
            Err(_) => Vec::new(),
        }
    }

    /// Pump until nothing is outstanding or `timeout` passes.
    pub fn drain_until_idle(
        &mut self,
        view: &mut dyn GridView,
        timeout: Duration,
    ) -> Vec<Resolution> {
        let deadline = Instant::now() + timeout;
        let mut resolved = self.pump(view);
        while !self.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    decodes = self.decodes_in_flight,
                    enumerations = self.enumerations_in_flight,
                    "Timed out waiting for background work"
                );
                break;
            }
            resolved.extend(self.pump_timeout(view, deadline - now));
        }
        resolved
    }

    // -- Internals ----------------------------------------------------------

    fn wake(waker: &Option<Waker>) {
        if let Some(waker) = waker {
            waker();
        }
    }

    fn dispatch_enumeration(&mut self) {
        let source = Arc::clone(&self.source);
        let config = self.config.clone();
        let tx = self.tx.clone();
        let waker = self.waker.clone();

        self.pool.execute(move || {
            let enumerated = catch_unwind(AssertUnwindSafe(|| source.enumerate()));
            let host_memory = host_memory(&config);
            let msg = match enumerated {
                Ok(collection) => Message::Enumerated {
                    collection,
                    host_memory,
                },
                Err(_) => Message::EnumerationPanicked { host_memory },
            };
            let _ = tx.send(msg);
            Self::wake(&waker);
        });
        self.enumerations_in_flight += 1;
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_decode(
        &mut self,
        slot: SlotId,
        index: usize,
        path: PathBuf,
        rotation: Rotation,
        generation: u64,
        slot_ticket: Arc<AtomicU64>,
        ticket: u64,
    ) {
        let decoder = Arc::clone(&self.decoder);
        let target = self.config.thumbnail_size;
        let tx = self.tx.clone();
        let waker = self.waker.clone();

        self.pool.execute(move || {
            let outcome = if slot_ticket.load(Ordering::SeqCst) != ticket {
                DecodeOutcome::Skipped
            } else {
                match catch_unwind(AssertUnwindSafe(|| decoder.decode(&path, target))) {
                    Ok(Ok(thumb)) => DecodeOutcome::Done(thumb),
                    Ok(Err(e)) => DecodeOutcome::Failed(e),
                    Err(_) => DecodeOutcome::Failed(DecodeError::Panicked { path: path.clone() }),
                }
            };
            let _ = tx.send(Message::Decoded {
                slot,
                index,
                path,
                rotation,
                generation,
                outcome,
            });
            Self::wake(&waker);
        });
        self.decodes_in_flight += 1;
    }

    fn resolve(&mut self, msg: Message, view: &mut dyn GridView) -> Resolution {
        match msg {
            Message::Decoded {
                slot,
                index,
                path,
                rotation,
                generation,
                outcome,
            } => {
                self.decodes_in_flight = self.decodes_in_flight.saturating_sub(1);
                self.resolve_decode(slot, index, path, rotation, generation, outcome, view)
            }
            Message::Enumerated {
                collection,
                host_memory,
            } => {
                self.enumerations_in_flight = self.enumerations_in_flight.saturating_sub(1);
                self.resolve_enumeration(collection, host_memory, view)
            }
            Message::EnumerationPanicked { host_memory } => {
                self.enumerations_in_flight = self.enumerations_in_flight.saturating_sub(1);
                error!("Collection source panicked");
                if self.state.is_none() {
                    // The grid still becomes usable, just empty.
                    self.resolve_enumeration(Collection::empty(), host_memory, view)
                } else {
                    view.on_refresh_complete(false);
                    Resolution::Refreshed { changed: false }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_decode(
        &mut self,
        slot: SlotId,
        index: usize,
        path: PathBuf,
        rotation: Rotation,
        generation: u64,
        outcome: DecodeOutcome,
        view: &mut dyn GridView,
    ) -> Resolution {
        if generation != self.generation() {
            debug!(
                index,
                generation,
                current = self.generation(),
                "Discarding decode from a replaced collection"
            );
            return Resolution::StaleCollection { slot, index };
        }
        let still_bound = self.bound_index(slot) == Some(index);

        match outcome {
            DecodeOutcome::Skipped => Resolution::Skipped { slot, index },
            DecodeOutcome::Failed(e) => {
                warn!(index, "Thumbnail decode failed: {e}");
                if still_bound {
                    view.show_failed(slot, &e);
                }
                Resolution::Failed { slot, index }
            }
            DecodeOutcome::Done(thumb) => {
                let thumb = Arc::new(thumb);
                self.cache.put(path, Arc::clone(&thumb));
                if still_bound {
                    view.show_image(slot, &thumb, rotation);
                    Resolution::Rendered { slot, index }
                } else {
                    debug!(?slot, index, "Slot moved on, thumbnail cached only");
                    Resolution::CachedOnly { slot, index }
                }
            }
        }
    }

    fn resolve_enumeration(
        &mut self,
        collection: Collection,
        host_memory: u64,
        view: &mut dyn GridView,
    ) -> Resolution {
        let len = collection.len();
        let budget = cache_budget(
            host_memory,
            self.config.memory_divisor,
            len,
            self.config.thumbnail_size,
        );

        if self.state.is_none() {
            self.cache.set_budget(budget);
            self.state = Some(CollectionState::new(collection));
            info!(len, budget, "Collection built");
            view.on_build_complete(len);
            return Resolution::Built { len };
        }

        let changed = self
            .state
            .as_mut()
            .is_some_and(|state| state.replace_if_changed(collection));
        if changed {
            let evicted = self.cache.evict_all();
            self.cache.set_budget(budget);
            info!(
                len,
                budget,
                evicted,
                generation = self.generation(),
                "Collection changed"
            );
            self.rebind_all(view);
        } else {
            debug!(len, "Refresh found no change");
        }
        view.on_refresh_complete(changed);
        Resolution::Refreshed { changed }
    }

    /// Re-run every binding against the new collection.
    fn rebind_all(&mut self, view: &mut dyn GridView) {
        let len = self.len();
        let mut bound: Vec<(SlotId, usize)> = self
            .slots
            .iter()
            .filter_map(|(slot, b)| b.index.map(|i| (*slot, i)))
            .collect();
        bound.sort_unstable();

        for (slot, index) in bound {
            if index >= len {
                self.release(slot);
                view.clear(slot);
                continue;
            }
            if let Err(e) = self.bind(slot, index, view) {
                warn!(?slot, index, "Rebind after refresh failed: {e}");
            }
        }
    }
}
