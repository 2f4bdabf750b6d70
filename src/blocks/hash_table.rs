use super::*;
use crossbeam_utils::Backoff;
use log::trace;
use parking_lot::RwLock;
use std::sync::atomic::AtomicUsize;

const EMPTY: u64 = 0;
const POISON: u64 = u64::MAX;
const PROBE_LIMIT: usize = 128;
const REHASH_CHUNK: usize = 1 << 12;

#[derive(Default)]
struct Slot {
  signature: AtomicU64,
  previous: AtomicU64,
  block: AtomicU64,
}

fn empty_slots(len: usize) -> Box<[Slot]> {
  (0..len).map(|_| Slot::default()).collect()
}

/// Rotating FNV-1a over both words.
fn hash(a: u64, b: u64) -> u64 {
  const PRIME: u64 = 1099511628211;
  let mut hash: u64 = 14695981039346656037;
  hash ^= a >> 32;
  hash = (hash ^ a).wrapping_mul(PRIME);
  hash = (hash ^ b).wrapping_mul(PRIME);
  hash ^ (hash >> 32)
}

/// Open-addressing table with linear probing. Slots are claimed by a CAS on
/// the signature word; the previous-block word is published last and marks
/// the slot as complete.
pub struct HashTable {
  slots: RwLock<Box<[Slot]>>,
  filled: AtomicUsize,
}

impl HashTable {
  pub fn new(expected: usize) -> Self {
    let len = (expected * 2).next_power_of_two().max(1 << 10);
    HashTable { slots: RwLock::new(empty_slots(len)), filled: AtomicUsize::new(0) }
  }

  pub fn len(&self) -> usize {
    self.slots.read().len()
  }

  /// Doubles the table unless another thread already did since `observed`
  /// was read. Callers block on the lock until the new table is in place.
  fn grow(&self, observed: usize) {
    let mut slots = self.slots.write();
    if slots.len() != observed {
      return;
    }
    let bigger = empty_slots(observed * 2);
    let depth = std::thread::available_parallelism().map_or(1, |n| n.get()).next_power_of_two().trailing_zeros();
    rehash(&slots, &bigger, depth);
    *slots = bigger;
    trace!("block table grown to {} slots", observed * 2);
  }
}

/// Moves every entry of `from` into `to`, splitting the work over scoped
/// threads. Rayon workers may not run here: a stolen task would block on the
/// table lock held by this thread.
fn rehash(from: &[Slot], to: &[Slot], depth: u32) {
  if depth == 0 || from.len() <= REHASH_CHUNK {
    for slot in from {
      let signature = slot.signature.load(Ordering::Relaxed);
      if signature == EMPTY {
        continue;
      }
      let previous = slot.previous.load(Ordering::Relaxed);
      let mut index = hash(signature, previous) as usize & (to.len() - 1);
      while to[index].signature.compare_exchange(EMPTY, signature, Ordering::Relaxed, Ordering::Relaxed).is_err() {
        index = (index + 1) & (to.len() - 1);
      }
      to[index].block.store(slot.block.load(Ordering::Relaxed), Ordering::Relaxed);
      to[index].previous.store(previous, Ordering::Relaxed);
    }
    return;
  }
  let (left, right) = from.split_at(from.len() / 2);
  std::thread::scope(|scope| {
    scope.spawn(|| rehash(left, to, depth - 1));
    rehash(right, to, depth - 1);
  });
}

impl BlockTable for HashTable {
  fn search_or_insert(&self, signature: u64, previous: u64, counter: &BlockCounter) -> Result<u64> {
    debug_assert!(previous != 0);
    let key = signature.wrapping_add(1);
    loop {
      let slots = self.slots.read();
      let len = slots.len();
      if self.filled.load(Ordering::Relaxed) * 4 >= len * 3 {
        drop(slots);
        self.grow(len);
        continue;
      }
      let mut index = hash(key, previous) as usize & (len - 1);
      for _ in 0..PROBE_LIMIT {
        let slot = &slots[index];
        let mut current = slot.signature.load(Ordering::Acquire);
        if current == EMPTY {
          match slot.signature.compare_exchange(EMPTY, key, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
              self.filled.fetch_add(1, Ordering::Relaxed);
              let block = counter.fresh();
              slot.block.store(*block.as_ref().unwrap_or(&POISON), Ordering::Relaxed);
              slot.previous.store(previous, Ordering::Release);
              return block;
            }
            Err(found) => current = found,
          }
        }
        if current == key {
          let backoff = Backoff::new();
          let mut found = slot.previous.load(Ordering::Acquire);
          while found == 0 {
            backoff.snooze();
            found = slot.previous.load(Ordering::Acquire);
          }
          if found == previous {
            return match slot.block.load(Ordering::Relaxed) {
              POISON => Err(Error::BlocksExhausted { limit: counter.limit() }),
              block => Ok(block),
            };
          }
        }
        index = (index + 1) & (len - 1);
      }
      drop(slots);
      self.grow(len);
    }
  }
}
