use super::Dd;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identifies the operation a memo entry belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Opcode(pub u16);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
  op: Opcode,
  a: Dd,
  b: Dd,
  c: Dd,
  tag: u64,
}

/// Operation memo shared by all workers. Entries are dropped wholesale when
/// the number of insertions since the last reset exceeds the limit.
pub(crate) struct OpCache {
  map: DashMap<CacheKey, Dd>,
  puts: AtomicUsize,
  limit: usize,
}

impl OpCache {
  pub(crate) fn new(limit: usize) -> Self {
    OpCache { map: DashMap::new(), puts: AtomicUsize::new(0), limit }
  }

  pub(crate) fn get(&self, op: Opcode, a: Dd, b: Dd, c: Dd, tag: u64) -> Option<Dd> {
    self.map.get(&CacheKey { op, a, b, c, tag }).map(|entry| *entry)
  }

  pub(crate) fn put(&self, op: Opcode, a: Dd, b: Dd, c: Dd, tag: u64, result: Dd) {
    if self.puts.fetch_add(1, Ordering::Relaxed) >= self.limit {
      self.clear();
    }
    self.map.insert(CacheKey { op, a, b, c, tag }, result);
  }

  pub(crate) fn clear(&self) {
    self.map.clear();
    self.puts.store(0, Ordering::Relaxed);
  }
}
