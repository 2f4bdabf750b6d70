use super::*;
use arrayvec::ArrayVec;
use crossbeam_utils::Backoff;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::sync::atomic::AtomicU32;
use std::sync::OnceLock;

const DEPTH: usize = 5;
const LOCKED: u32 = 0x8000_0000;
const SEGMENT: usize = 1 << 12;

thread_local! {
  static RNG: RefCell<Option<SmallRng>> = RefCell::new(None);
}

/// Seeds the level generator of every worker in the current pool.
fn seed_workers() {
  let base: u64 = rand::random();
  rayon::broadcast(|worker| {
    RNG.with(|rng| *rng.borrow_mut() = Some(SmallRng::seed_from_u64(base ^ worker.index() as u64)));
  });
}

/// Height of a new tower: one level, plus one more with probability 1/4 each.
fn height() -> usize {
  RNG.with(|rng| {
    let bits: u32 = rng.borrow_mut().get_or_insert_with(SmallRng::from_entropy).gen();
    (1 + bits.leading_zeros() as usize / 2).min(DEPTH)
  })
}

#[derive(Default)]
struct Node {
  signature: AtomicU64,
  previous: AtomicU64,
  next: [AtomicU32; DEPTH],
}

/// Ordered skip list over (signature, previous block). A node is identified
/// by the block number it was given; node 0 is the head. Insertion locks the
/// level-0 link of the predecessor, upper levels are linked by CAS.
pub struct SkipList {
  segments: Box<[OnceLock<Box<[Node]>>]>,
}

impl SkipList {
  pub fn new(limit: u64) -> Self {
    seed_workers();
    let count = (limit as usize).div_ceil(SEGMENT).max(1);
    SkipList { segments: (0..count).map(|_| OnceLock::new()).collect() }
  }

  fn node(&self, index: u32) -> &Node {
    let index = index as usize;
    let segment = self.segments[index / SEGMENT].get_or_init(|| (0..SEGMENT).map(|_| Node::default()).collect());
    &segment[index % SEGMENT]
  }

  fn key(&self, index: u32) -> (u64, u64) {
    let node = self.node(index);
    (node.signature.load(Ordering::Relaxed), node.previous.load(Ordering::Relaxed))
  }

  /// Predecessors of `key` from the bottom level up.
  fn search(&self, key: (u64, u64)) -> ArrayVec<u32, DEPTH> {
    let mut trace = ArrayVec::new();
    let mut current = 0;
    for level in (0..DEPTH).rev() {
      loop {
        let next = self.node(current).next[level].load(Ordering::Acquire) & !LOCKED;
        if next == 0 || self.key(next) >= key {
          break;
        }
        current = next;
      }
      trace.push(current);
    }
    trace.reverse();
    trace
  }
}

impl BlockTable for SkipList {
  fn search_or_insert(&self, signature: u64, previous: u64, counter: &BlockCounter) -> Result<u64> {
    let key = (signature, previous);
    let backoff = Backoff::new();
    let (block, mut trace) = loop {
      let trace = self.search(key);
      let predecessor = self.node(trace[0]);
      let successor = predecessor.next[0].load(Ordering::Acquire);
      if successor & LOCKED != 0 {
        backoff.snooze();
        continue;
      }
      if successor != 0 && self.key(successor) <= key {
        if self.key(successor) == key {
          return Ok(successor as u64);
        }
        continue;
      }
      if predecessor.next[0].compare_exchange(successor, successor | LOCKED, Ordering::Acquire, Ordering::Relaxed).is_err()
      {
        backoff.spin();
        continue;
      }
      let block = match counter.fresh() {
        Ok(block) => block as u32,
        Err(error) => {
          predecessor.next[0].store(successor, Ordering::Release);
          return Err(error);
        }
      };
      let node = self.node(block);
      node.signature.store(signature, Ordering::Relaxed);
      node.previous.store(previous, Ordering::Relaxed);
      node.next[0].store(successor, Ordering::Relaxed);
      predecessor.next[0].store(block, Ordering::Release);
      break (block, trace);
    };
    let node = self.node(block);
    for level in 1..height() {
      loop {
        let predecessor = self.node(trace[level]);
        let successor = predecessor.next[level].load(Ordering::Acquire);
        if successor != 0 && self.key(successor) < key {
          trace[level] = successor;
          continue;
        }
        node.next[level].store(successor, Ordering::Relaxed);
        if predecessor.next[level].compare_exchange(successor, block, Ordering::Release, Ordering::Relaxed).is_ok() {
          break;
        }
      }
    }
    Ok(block as u64)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn keys_stay_ordered() {
    let list = SkipList::new(1 << 12);
    let counter = BlockCounter::new(1 << 12);
    for signature in [9, 3, 7, 1, 5, 3, 8] {
      list.search_or_insert(signature, 1, &counter).unwrap();
    }
    let mut keys = Vec::new();
    let mut current = list.node(0).next[0].load(Ordering::Relaxed);
    while current != 0 {
      keys.push(list.key(current).0);
      current = list.node(current).next[0].load(Ordering::Relaxed);
    }
    assert_eq!(keys, vec![1, 3, 5, 7, 8, 9]);
    assert_eq!(counter.count(), 6);
  }

  #[test]
  fn levels_are_bounded() {
    assert!((0..1000).map(|_| height()).all(|height| (1..=DEPTH).contains(&height)));
  }
}
