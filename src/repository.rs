//! # Tide Repository
//!
//! A lazily-populated, thread-safe map from port name to [`PortCache`].
//!
//! ## Load States
//!
//! ```text
//!            ensure_loaded / reload / load_now
//!   Absent ───────────────────────────────────▶ Loading
//!     ▲                                          │    │
//!     │ evict / clear                  decode ok │    │ decode failed
//!     │                                          ▼    ▼
//!     └──────────────────────────────────── Ready    Failed
//! ```
//!
//! `Failed` is sticky: [`TideRepository::ensure_loaded`] will not retry it.
//! A fresh attempt needs [`TideRepository::reload`] or an eviction first.
//!
//! ## Publication
//!
//! Each port has its own slot, a `tokio::sync::watch` channel holding a
//! generation number and the current state. A load records the generation it
//! started under and publishes only if the slot still has that generation and
//! is still `Loading`, in a single replace under the slot's lock. Readers see
//! either the old state or the fully built cache. Evicting or reloading bumps
//! the generation, so an in-flight load from before is dropped on completion.
//!
//! Slots live in a sharded [`DashMap`]; loading one port never blocks
//! readers or loaders of another.
//!
//! ## Execution
//!
//! Decoding runs on Tokio's blocking pool when called inside a runtime, or on
//! a dedicated `tide-loader` thread otherwise. The caller gets a
//! [`LoadHandle`] and may await it, poll its state, or drop it.
//! A load that panics marks the port `Failed` with
//! [`TideError::LoaderPanicked`].

use crate::codec::{self, DecodeOptions};
use crate::error::{Result, TideError};
use crate::interpolate::TideState;
use crate::query::{self, NextTide};
use crate::source::ByteSource;
use crate::{PortCache, TideRecord};
use dashmap::DashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Load state of one port.
#[derive(Debug, Clone)]
pub enum PortState {
    Absent,
    Loading,
    Ready(Arc<PortCache>),
    Failed(Arc<TideError>),
}

impl PortState {
    pub fn is_ready(&self) -> bool {
        matches!(self, PortState::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PortState::Loading)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PortState::Absent => "absent",
            PortState::Loading => "loading",
            PortState::Ready(_) => "ready",
            PortState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u64,
    state: PortState,
}

type SlotCell = Arc<watch::Sender<Slot>>;

/// Outcome of a finished load, shared by every waiter.
pub type LoadResult = std::result::Result<Arc<PortCache>, Arc<TideError>>;

/// Completion signal for a port load.
#[derive(Debug)]
pub struct LoadHandle {
    port: String,
    rx: watch::Receiver<Slot>,
}

impl LoadHandle {
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Current state without waiting.
    pub fn state(&self) -> PortState {
        self.rx.borrow().state.clone()
    }

    pub fn is_finished(&self) -> bool {
        !self.rx.borrow().state.is_loading()
    }

    /// Wait until the port leaves `Loading`.
    ///
    /// If the load is superseded by a reload, this follows the newer load. If
    /// the port is evicted first, the result is [`TideError::Evicted`].
    pub async fn wait(mut self) -> LoadResult {
        loop {
            {
                let slot = self.rx.borrow_and_update();
                match &slot.state {
                    PortState::Ready(cache) => return Ok(Arc::clone(cache)),
                    PortState::Failed(err) => return Err(Arc::clone(err)),
                    PortState::Absent => return Err(evicted(&self.port)),
                    PortState::Loading => {}
                }
            }
            if self.rx.changed().await.is_err() {
                return Err(evicted(&self.port));
            }
        }
    }
}

struct Inner {
    slots: DashMap<String, SlotCell>,
    source: Arc<dyn ByteSource>,
    options: DecodeOptions,
}

impl Inner {
    /// Build the cache, turning failures and panics into a shared error.
    fn load(&self, port: &str) -> LoadResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.build(port)))
            .unwrap_or_else(|_| Err(TideError::LoaderPanicked(port.to_string())));
        match outcome {
            Ok(cache) => Ok(Arc::new(cache)),
            Err(e) => {
                warn!(port, error = %e, "tide data load failed");
                Err(Arc::new(e))
            }
        }
    }

    fn build(&self, port: &str) -> Result<PortCache> {
        let started = Instant::now();
        let decoded = codec::load(self.source.as_ref(), port, &self.options)?;
        let cache = PortCache::from_decoded(port, decoded)?;
        info!(
            port,
            records = cache.record_count(),
            valid_until = cache.valid_until(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded tide data"
        );
        Ok(cache)
    }
}

/// Shared handle to the per-port caches.
///
/// Cloning is cheap and every clone sees the same caches.
#[derive(Clone)]
pub struct TideRepository {
    inner: Arc<Inner>,
}

impl TideRepository {
    pub fn new(source: Arc<dyn ByteSource>) -> Self {
        Self::with_options(source, DecodeOptions::default())
    }

    pub fn with_options(source: Arc<dyn ByteSource>, options: DecodeOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: DashMap::new(),
                source,
                options,
            }),
        }
    }

    /// The port's cache if it is `Ready`. Never blocks on a load.
    pub fn get(&self, port: &str) -> Option<Arc<PortCache>> {
        let slot = self.existing_slot(port)?;
        let cache = match &slot.borrow().state {
            PortState::Ready(cache) => Some(Arc::clone(cache)),
            _ => None,
        };
        cache
    }

    pub fn state(&self, port: &str) -> PortState {
        match self.existing_slot(port) {
            Some(slot) => {
                let state = slot.borrow().state.clone();
                state
            }
            None => PortState::Absent,
        }
    }

    /// Start loading `port` if it is `Absent`.
    ///
    /// Joins an in-flight load rather than starting a second one, and leaves
    /// `Ready` and `Failed` ports alone.
    pub fn ensure_loaded(&self, port: &str) -> LoadHandle {
        self.start(port, false)
    }

    /// Start a fresh load of `port` whatever its state.
    pub fn reload(&self, port: &str) -> LoadHandle {
        self.start(port, true)
    }

    /// Load `port` on the calling thread and wait for the result.
    ///
    /// Returns the existing cache if the port is already `Ready`; otherwise
    /// starts a new generation, like [`reload`](Self::reload).
    pub fn load_now(&self, port: &str) -> LoadResult {
        let slot = self.slot(port);
        let mut existing = None;
        let mut generation = 0;
        slot.send_if_modified(|s| {
            if let PortState::Ready(cache) = &s.state {
                existing = Some(Arc::clone(cache));
                return false;
            }
            s.generation += 1;
            s.state = PortState::Loading;
            generation = s.generation;
            true
        });

        if let Some(cache) = existing {
            return Ok(cache);
        }

        let outcome = self.inner.load(port);
        if publish(&slot, port, generation, finished_state(&outcome)) {
            outcome
        } else {
            Err(evicted(port))
        }
    }

    /// Return `port` to `Absent`, dropping its cache.
    ///
    /// A load in progress is discarded when it finishes and its waiters get
    /// [`TideError::Evicted`]. Returns false if the port was already absent.
    ///
    /// The port's slot is dropped from the map once nothing else holds it.
    pub fn evict(&self, port: &str) -> bool {
        let Some(slot) = self.existing_slot(port) else {
            return false;
        };
        let evicted = evict_slot(&slot);
        drop(slot);
        self.inner
            .slots
            .remove_if(port, |_, slot| is_idle(slot));
        if evicted {
            debug!(port, "evicted port cache");
        }
        evicted
    }

    /// Return every port to `Absent`.
    pub fn clear(&self) {
        let mut evicted = 0;
        self.inner.slots.retain(|_, slot| {
            if evict_slot(slot) {
                evicted += 1;
            }
            !is_idle(slot)
        });
        debug!(evicted, "cleared tide repository");
    }

    /// Ports currently `Ready`, sorted.
    pub fn ports(&self) -> Vec<String> {
        let mut ports: Vec<String> = self
            .inner
            .slots
            .iter()
            .filter(|entry| entry.value().borrow().state.is_ready())
            .map(|entry| entry.key().clone())
            .collect();
        ports.sort();
        ports
    }

    /// Every port the byte source can supply.
    pub fn available_ports(&self) -> Result<Vec<String>> {
        self.inner.source.ports()
    }

    pub fn interval_at(&self, port: &str, t: i64) -> Option<(TideRecord, TideRecord)> {
        query::interval_at(&*self.get(port)?, t)
    }

    pub fn current_state(&self, port: &str, t: i64) -> Option<TideState> {
        query::current_state(&*self.get(port)?, t)
    }

    pub fn next_extremum(&self, port: &str, t: i64) -> Option<NextTide> {
        query::next_extremum(&*self.get(port)?, t)
    }

    pub fn records_in_range(&self, port: &str, start: i64, end: i64) -> Vec<TideRecord> {
        self.get(port)
            .map(|cache| query::records_in_range(&cache, start, end).to_vec())
            .unwrap_or_default()
    }

    /// False when the port is not loaded or `t` is past its data.
    pub fn is_fresh(&self, port: &str, t: i64) -> bool {
        self.get(port)
            .is_some_and(|cache| query::is_fresh(&cache, t))
    }

    fn existing_slot(&self, port: &str) -> Option<SlotCell> {
        self.inner
            .slots
            .get(port)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn slot(&self, port: &str) -> SlotCell {
        if let Some(slot) = self.existing_slot(port) {
            return slot;
        }
        let entry = self
            .inner
            .slots
            .entry(port.to_string())
            .or_insert_with(|| {
                let (tx, _rx) = watch::channel(Slot {
                    generation: 0,
                    state: PortState::Absent,
                });
                Arc::new(tx)
            });
        Arc::clone(entry.value())
    }

    fn start(&self, port: &str, force: bool) -> LoadHandle {
        let slot = self.slot(port);
        let mut started = None;
        slot.send_if_modified(|s| {
            let begin = match s.state {
                PortState::Absent => true,
                PortState::Loading | PortState::Ready(_) | PortState::Failed(_) => force,
            };
            if begin {
                s.generation += 1;
                s.state = PortState::Loading;
                started = Some(s.generation);
            }
            begin
        });

        // Subscribe before spawning so the handle cannot miss the result
        let handle = LoadHandle {
            port: port.to_string(),
            rx: slot.subscribe(),
        };

        match started {
            Some(generation) => {
                debug!(port, generation, "starting tide data load");
                self.spawn_load(port, slot, generation);
            }
            None => debug!(port, "tide data load not needed"),
        }
        handle
    }

    fn spawn_load(&self, port: &str, slot: SlotCell, generation: u64) {
        let inner = Arc::clone(&self.inner);
        let job_port = port.to_string();
        let job_slot = Arc::clone(&slot);
        let job = move || {
            let outcome = inner.load(&job_port);
            publish(&job_slot, &job_port, generation, finished_state(&outcome));
        };

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let _ = runtime.spawn_blocking(job);
            return;
        }

        if let Err(e) = thread::Builder::new()
            .name("tide-loader".to_string())
            .spawn(job)
        {
            warn!(port, error = %e, "could not start loader thread");
            let state = PortState::Failed(Arc::new(TideError::Io(e)));
            publish(&slot, port, generation, state);
        }
    }
}

fn evicted(port: &str) -> Arc<TideError> {
    Arc::new(TideError::Evicted(port.to_string()))
}

fn finished_state(outcome: &LoadResult) -> PortState {
    match outcome {
        Ok(cache) => PortState::Ready(Arc::clone(cache)),
        Err(err) => PortState::Failed(Arc::clone(err)),
    }
}

/// `Absent` and referenced only by the map, so no load or caller can reach it.
fn is_idle(slot: &SlotCell) -> bool {
    Arc::strong_count(slot) == 1 && matches!(slot.borrow().state, PortState::Absent)
}

/// Replace `Loading` with `state` if `generation` is still current.
fn publish(slot: &watch::Sender<Slot>, port: &str, generation: u64, state: PortState) -> bool {
    let published = slot.send_if_modified(|s| {
        if s.generation == generation && s.state.is_loading() {
            s.state = state;
            true
        } else {
            false
        }
    });
    if !published {
        debug!(port, generation, "discarded superseded tide data load");
    }
    published
}

fn evict_slot(slot: &watch::Sender<Slot>) -> bool {
    slot.send_if_modified(|s| {
        if matches!(s.state, PortState::Absent) {
            return false;
        }
        s.generation += 1;
        s.state = PortState::Absent;
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, Endianness};
    use crate::source::MemorySource;

    fn port_bytes() -> Vec<u8> {
        let records = [
            TideRecord::new(1000, 1.0, false),
            TideRecord::new(2000, 3.0, true),
            TideRecord::new(3000, 1.0, false),
            TideRecord::new(4000, 3.0, true),
        ];
        let mut bytes = Vec::new();
        encode(&mut bytes, "Auckland", &records, Endianness::Little).unwrap();
        bytes
    }

    fn repository() -> TideRepository {
        let source = MemorySource::new()
            .with_port("Auckland", port_bytes())
            .with_port("Broken", b"Broken\n".to_vec());
        TideRepository::new(Arc::new(source))
    }

    #[test]
    fn test_get_before_load_is_none() {
        let repo = repository();
        assert!(repo.get("Auckland").is_none());
        assert!(matches!(repo.state("Auckland"), PortState::Absent));
        assert!(!repo.is_fresh("Auckland", 1500));
        assert!(repo.current_state("Auckland", 1500).is_none());
    }

    #[test]
    fn test_load_now_publishes_cache() {
        let repo = repository();
        let cache = repo.load_now("Auckland").unwrap();
        assert_eq!(cache.record_count(), 4);
        assert_eq!(cache.station(), "Auckland");
        assert!(repo.state("Auckland").is_ready());
        assert!(Arc::ptr_eq(&cache, &repo.get("Auckland").unwrap()));
        assert_eq!(repo.ports(), vec!["Auckland"]);
    }

    #[test]
    fn test_load_now_reports_missing_port() {
        let repo = repository();
        let err = repo.load_now("Kaikoura").unwrap_err();
        assert!(matches!(*err, TideError::PortNotFound(_)));
        assert!(matches!(repo.state("Kaikoura"), PortState::Failed(_)));
    }

    #[test]
    fn test_evict_and_clear() {
        let repo = repository();
        repo.load_now("Auckland").unwrap();
        assert!(repo.evict("Auckland"));
        assert!(!repo.evict("Auckland"));
        assert!(repo.get("Auckland").is_none());

        repo.load_now("Auckland").unwrap();
        let _ = repo.load_now("Broken");
        repo.clear();
        assert!(matches!(repo.state("Auckland"), PortState::Absent));
        assert!(matches!(repo.state("Broken"), PortState::Absent));
    }

    #[test]
    fn test_evict_and_clear_drop_idle_slots() {
        let repo = repository();
        let _ = repo.load_now("Kaikoura");
        let _ = repo.load_now("Gisborne");
        repo.load_now("Auckland").unwrap();
        assert_eq!(repo.inner.slots.len(), 3);

        assert!(repo.evict("Kaikoura"));
        assert_eq!(repo.inner.slots.len(), 2);

        repo.clear();
        assert!(repo.inner.slots.is_empty());
        assert!(matches!(repo.state("Auckland"), PortState::Absent));
    }

    #[test]
    fn test_evict_keeps_slot_while_referenced() {
        let repo = repository();
        repo.load_now("Auckland").unwrap();

        // An outstanding load would hold the slot the same way
        let held = repo.existing_slot("Auckland").unwrap();
        assert!(repo.evict("Auckland"));
        assert_eq!(repo.inner.slots.len(), 1);

        drop(held);
        repo.clear();
        assert!(repo.inner.slots.is_empty());
    }

    struct PanickingSource;

    impl ByteSource for PanickingSource {
        fn open(&self, _port: &str) -> Result<Box<dyn std::io::Read + Send>> {
            panic!("byte source failure")
        }

        fn ports(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_load_now_reports_panicking_source() {
        let repo = TideRepository::new(Arc::new(PanickingSource));
        let err = repo.load_now("Auckland").unwrap_err();
        assert!(matches!(*err, TideError::LoaderPanicked(ref port) if port == "Auckland"));
        assert!(matches!(repo.state("Auckland"), PortState::Failed(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_background_panic_fails_the_port() {
        let repo = TideRepository::new(Arc::new(PanickingSource));
        let err = repo.ensure_loaded("Auckland").wait().await.unwrap_err();
        assert!(matches!(*err, TideError::LoaderPanicked(_)));

        // Later callers see the failure rather than waiting on a dead load
        let again = repo.ensure_loaded("Auckland").wait().await;
        assert!(again.is_err());
        assert!(matches!(repo.state("Auckland"), PortState::Failed(_)));
    }

    #[test]
    fn test_ensure_loaded_without_runtime_uses_thread() {
        let repo = repository();
        let handle = repo.ensure_loaded("Auckland");
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let cache = rt.block_on(handle.wait()).unwrap();
        assert_eq!(cache.valid_until(), 4000);
    }
}
