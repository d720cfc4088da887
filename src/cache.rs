//! Memoization for point reads: pluggable key-value stores, single-flight
//! deduplication of concurrent misses, and the cached reader composing them.

use std::{
    collections::HashMap,
    num::NonZeroUsize,
    sync::{Arc, Mutex, OnceLock, PoisonError, RwLock},
};

use lru::LruCache;

use crate::{error::GribError, point::PointReader, reader::ReadAt};

/// A pluggable key-value store for memoized samples. Implementations supply
/// their own locking and must be safe under concurrent `get`/`set`.
pub trait Store: Send + Sync {
    fn get(&self, key: u64) -> Option<f64>;
    fn set(&self, key: u64, value: f64);
}

/// Unbounded store over a hash map behind a read-write lock.
#[derive(Debug, Default)]
pub struct MapStore {
    map: RwLock<HashMap<u64, f64>>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MapStore {
    fn get(&self, key: u64) -> Option<f64> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
    }

    fn set(&self, key: u64, value: f64) {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }
}

/// Bounded store over an LRU cache behind a mutex.
#[derive(Debug)]
pub struct LruStore {
    cache: Mutex<LruCache<u64, f64>>,
}

impl LruStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl Store for LruStore {
    fn get(&self, key: u64) -> Option<f64> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
    }

    fn set(&self, key: u64, value: f64) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, value);
    }
}

/// Deduplicates concurrent reads of the same key: at most one backing read
/// per key is in flight at a time, and latecomers wait for and share its
/// result. Entries are dropped once the read completes.
pub(crate) struct SingleFlight {
    inflight: Mutex<HashMap<u64, Arc<OnceLock<Result<f64, GribError>>>>>,
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn run<F>(&self, key: u64, read: F) -> Result<f64, GribError>
    where
        F: FnOnce() -> Result<f64, GribError>,
    {
        let cell = {
            let mut inflight = self
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(inflight.entry(key).or_default())
        };
        let result = cell.get_or_init(read).clone();
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the cell this call waited on is removed; a newer in-flight
        // read under the same key stays untouched.
        if inflight.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            inflight.remove(&key);
        }
        result
    }
}

/// Geographic region gating cache membership.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

enum Membership {
    BoundingBox(BoundingBox),
    Predicate(Box<dyn Fn(f64, f64) -> bool + Send + Sync>),
}

impl Membership {
    fn contains(&self, lat: f64, lon: f64) -> bool {
        match self {
            Self::BoundingBox(bounds) => bounds.contains(lat, lon),
            Self::Predicate(predicate) => predicate(lat, lon),
        }
    }
}

/// A [`PointReader`] with memoization.
///
/// Queries inside the configured region are cached by linear sample index in
/// the supplied [`Store`]; queries outside it bypass the cache entirely.
/// Concurrent misses for the same index are deduplicated so that at most one
/// backing read per key is in flight at a time.
pub struct CachedPointReader<'s, R: ReadAt + ?Sized, S = MapStore> {
    inner: PointReader<'s, R>,
    store: S,
    membership: Membership,
    flight: SingleFlight,
}

impl<'s, R: ReadAt + ?Sized> CachedPointReader<'s, R, MapStore> {
    /// Caches queries inside `bounds` in an unbounded map store.
    pub fn with_bounds(inner: PointReader<'s, R>, bounds: BoundingBox) -> Self {
        Self {
            inner,
            store: MapStore::new(),
            membership: Membership::BoundingBox(bounds),
            flight: SingleFlight::new(),
        }
    }
}

impl<'s, R: ReadAt + ?Sized, S: Store> CachedPointReader<'s, R, S> {
    /// Caches queries selected by `predicate` in the supplied store.
    pub fn with_predicate<P>(inner: PointReader<'s, R>, store: S, predicate: P) -> Self
    where
        P: Fn(f64, f64) -> bool + Send + Sync + 'static,
    {
        Self {
            inner,
            store,
            membership: Membership::Predicate(Box::new(predicate)),
            flight: SingleFlight::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads the sample nearest to `(lat, lon)`, serving repeated queries of
    /// cached cells without touching the byte source.
    pub fn read_ll(&self, lat: f64, lon: f64) -> Result<(f64, f64, f64), GribError> {
        if !self.membership.contains(lat, lon) {
            return self.inner.read_ll(lat, lon);
        }

        let point = self.inner.grid().index_of(lat, lon)?;
        let (grid_lat, grid_lon) = self.inner.grid().point_of(point.i, point.j)?;
        let key = point.n as u64;
        if let Some(value) = self.store.get(key) {
            return Ok((grid_lat, grid_lon, value));
        }
        // The store is re-checked and filled under the flight entry, so a
        // caller that misses the store either joins the read in progress or
        // finds the value already cached.
        let value = self.flight.run(key, || {
            if let Some(value) = self.store.get(key) {
                return Ok(value);
            }
            let value = self.inner.read_at(point.n)?;
            self.store.set(key, value);
            Ok(value)
        })?;
        Ok((grid_lat, grid_lon, value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    use super::*;

    #[test]
    fn map_store_get_set() {
        let store = MapStore::new();
        assert_eq!(store.get(7), None);
        store.set(7, 1.5);
        assert_eq!(store.get(7), Some(1.5));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lru_store_evicts_the_oldest_entry() {
        let store = LruStore::new(NonZeroUsize::new(2).unwrap());
        store.set(1, 1.0);
        store.set(2, 2.0);
        assert_eq!(store.get(1), Some(1.0));
        store.set(3, 3.0); // evicts key 2
        assert_eq!(store.get(2), None);
        assert_eq!(store.get(1), Some(1.0));
        assert_eq!(store.get(3), Some(3.0));
    }

    #[test]
    fn single_flight_runs_the_read_once() {
        const THREADS: usize = 8;
        let flight = SingleFlight::new();
        let reads = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    barrier.wait();
                    let value = flight.run(42, || {
                        reads.fetch_add(1, Ordering::SeqCst);
                        // Hold the cell long enough for every waiter to pile
                        // onto it.
                        std::thread::sleep(std::time::Duration::from_millis(50));
                        Ok(3.25)
                    });
                    assert_eq!(value, Ok(3.25));
                });
            }
        });

        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn single_flight_removes_completed_entries() {
        let flight = SingleFlight::new();
        assert_eq!(flight.run(1, || Ok(1.0)), Ok(1.0));
        assert_eq!(flight.run(1, || Ok(2.0)), Ok(2.0));
    }

    #[test]
    fn single_flight_shares_failures_without_caching_them() {
        let flight = SingleFlight::new();
        assert_eq!(
            flight.run(9, || Err(GribError::EndOfStream)),
            Err(GribError::EndOfStream)
        );
        assert_eq!(flight.run(9, || Ok(4.0)), Ok(4.0));
    }

    #[test]
    fn bounding_box_membership() {
        let bounds = BoundingBox {
            min_lat: -10.0,
            max_lat: 10.0,
            min_lon: 100.0,
            max_lon: 120.0,
        };
        assert!(bounds.contains(0.0, 110.0));
        assert!(bounds.contains(10.0, 100.0));
        assert!(!bounds.contains(11.0, 110.0));
        assert!(!bounds.contains(0.0, 99.9));
    }
}
