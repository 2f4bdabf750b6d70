//! Concurrent assignment of block numbers to (signature, previous block) pairs.

mod hash_table;
mod skip_list;

pub use hash_table::*;
pub use skip_list::*;

use crate::config::TableKind;
use crate::dd::{Ctx, Dd, Leaf, Manager, Var, VarMap};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out block numbers for one refinement pass. The same pair always
/// gets the same number; distinct pairs get distinct numbers.
pub trait BlockTable: Send + Sync {
  fn search_or_insert(&self, signature: u64, previous: u64, counter: &BlockCounter) -> Result<u64>;
}

pub fn new_table(kind: TableKind, expected: usize, limit: u64) -> Box<dyn BlockTable> {
  match kind {
    TableKind::HashTable => Box::new(HashTable::new(expected)),
    TableKind::SkipList => Box::new(SkipList::new(limit)),
  }
}

/// Source of fresh block numbers, shared by every pass of one run.
#[derive(Debug)]
pub struct BlockCounter {
  next: AtomicU64,
  limit: u64,
}

impl BlockCounter {
  pub fn new(limit: u64) -> Self {
    BlockCounter { next: AtomicU64::new(1), limit }
  }

  pub fn fresh(&self) -> Result<u64> {
    let block = self.next.fetch_add(1, Ordering::Relaxed);
    if block >= self.limit {
      return Err(Error::BlocksExhausted { limit: self.limit });
    }
    Ok(block)
  }

  /// Number of blocks handed out so far.
  pub fn count(&self) -> u64 {
    (self.next.load(Ordering::Relaxed) - 1).min(self.limit - 1)
  }

  pub fn limit(&self) -> u64 {
    self.limit
  }
}

/// Binary encoding of block numbers. Bit `j` (least significant first) is
/// variable `base + 2j`; `base + 2j + 1` is its primed copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEncoding {
  pub base: Var,
  pub width: u32,
}

impl BlockEncoding {
  pub fn var(&self, bit: u32) -> Var {
    self.base + 2 * bit
  }

  pub fn primed(&self, bit: u32) -> Var {
    self.var(bit) + 1
  }

  pub fn limit(&self) -> u64 {
    1 << self.width
  }

  /// The same encoding with only `width` bits.
  pub fn narrowed(&self, width: u32) -> BlockEncoding {
    BlockEncoding { base: self.base, width: width.min(self.width) }
  }

  pub fn encode<L: Leaf>(&self, ctx: &Ctx<L>, block: u64) -> Result<Dd> {
    let literals = (0..self.width).map(|bit| (self.var(bit), block >> bit & 1 == 1)).collect::<Vec<_>>();
    ctx.cube(&literals)
  }

  /// Block number of a cube over the block variables.
  pub fn decode<L: Leaf>(&self, ctx: &Ctx<L>, mut cube: Dd) -> u64 {
    let mut block = 0;
    while !ctx.is_leaf(cube) {
      let (var, value, rest) = ctx.cube_step(cube);
      if value && var >= self.base {
        block |= 1 << ((var - self.base) / 2);
      }
      cube = rest;
    }
    block
  }

  pub fn variables<L: Leaf>(&self, ctx: &Ctx<L>) -> Result<Dd> {
    ctx.set((0..self.width).map(|bit| self.var(bit)))
  }

  /// Renames block bits to state variables (`s_j`) and primed block bits
  /// to next-state variables (`t_j`).
  pub fn to_states<L: Leaf>(&self, manager: &Manager<L>) -> VarMap {
    manager.var_map((0..self.width).flat_map(|bit| [(self.var(bit), 2 * bit), (self.primed(bit), 2 * bit + 1)]))
  }

  /// Renames block bits to next-state variables.
  pub fn to_next_states<L: Leaf>(&self, manager: &Manager<L>) -> VarMap {
    manager.var_map((0..self.width).map(|bit| (self.var(bit), 2 * bit + 1)))
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use ordered_float::OrderedFloat;
  use rand::rngs::StdRng;
  use rand::{Rng, SeedableRng};
  use std::collections::HashMap;

  #[test]
  fn counter_reports_exhaustion() {
    let counter = BlockCounter::new(3);
    assert_eq!(counter.fresh().unwrap(), 1);
    assert_eq!(counter.fresh().unwrap(), 2);
    assert!(matches!(counter.fresh(), Err(Error::BlocksExhausted { limit: 3 })));
    assert_eq!(counter.count(), 2);
  }

  #[test]
  fn encoding_round_trips() {
    let manager = Manager::<OrderedFloat<f64>>::new(12);
    let ctx = manager.ctx();
    let encoding = BlockEncoding { base: 2_000_000, width: 4 };
    let cube = encoding.encode(&ctx, 11).unwrap();
    assert_eq!(encoding.decode(&ctx, cube), 11);
    let next = ctx.cube(&[(1, true), (3, true), (5, false), (7, true)]).unwrap();
    assert_eq!(ctx.compose(cube, &encoding.to_next_states(&manager)).unwrap(), next);
  }

  /// Many threads insert overlapping random keys; every key must map to one
  /// block and distinct keys to distinct blocks.
  fn hammer(kind: TableKind) {
    let keys = {
      let mut rng = StdRng::seed_from_u64(7);
      (0..3000).map(|_| (rng.gen_range(0..500_u64), rng.gen_range(1..4_u64))).collect::<Vec<_>>()
    };
    let table = new_table(kind, 16, 1 << 20);
    let counter = BlockCounter::new(1 << 20);
    let results = std::thread::scope(|scope| {
      let handles = (0..8)
        .map(|offset| {
          let (table, counter, keys) = (&table, &counter, &keys);
          scope.spawn(move || {
            keys
              .iter()
              .cycle()
              .skip(offset * 97)
              .take(keys.len())
              .map(|&(signature, previous)| {
                ((signature, previous), table.search_or_insert(signature, previous, counter).unwrap())
              })
              .collect::<Vec<_>>()
          })
        })
        .collect::<Vec<_>>();
      handles.into_iter().flat_map(|handle| handle.join().unwrap()).collect::<Vec<_>>()
    });
    let mut blocks = HashMap::new();
    for (key, block) in results {
      assert_eq!(*blocks.entry(key).or_insert(block), block);
    }
    let mut seen = blocks.values().collect::<Vec<_>>();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), blocks.len());
    assert_eq!(counter.count(), blocks.len() as u64);
  }

  #[test]
  fn hash_table_contract() {
    hammer(TableKind::HashTable);
  }

  #[test]
  fn skip_list_contract() {
    hammer(TableKind::SkipList);
  }

  #[test]
  fn exhaustion_is_sticky() {
    for kind in [TableKind::HashTable, TableKind::SkipList] {
      let table = new_table(kind, 4, 3);
      let counter = BlockCounter::new(3);
      assert!(table.search_or_insert(10, 1, &counter).is_ok());
      assert!(table.search_or_insert(11, 1, &counter).is_ok());
      assert!(table.search_or_insert(12, 1, &counter).is_err());
      assert_eq!(table.search_or_insert(10, 1, &counter).unwrap(), 1);
    }
  }
}
