use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use sigref::blocks::{new_table, BlockCounter};
use sigref::{Error, TableKind};
use std::collections::{BTreeSet, HashMap};

fn workload(seed: u64, len: usize) -> Vec<(u64, u64)> {
  let mut rng = StdRng::seed_from_u64(seed);
  (0..len).map(|_| (rng.gen_range(0..len as u64 / 3), rng.gen_range(1..5))).collect()
}

#[test]
fn same_key_same_block() {
  for kind in [TableKind::HashTable, TableKind::SkipList] {
    for seed in 0..8 {
      let keys = workload(seed, 3000);
      let counter = BlockCounter::new(1 << 20);
      let table = new_table(kind, 16, counter.limit());
      let blocks = keys
        .par_iter()
        .map(|&(signature, previous)| table.search_or_insert(signature, previous, &counter).unwrap())
        .collect::<Vec<_>>();

      let mut seen = HashMap::new();
      for (key, block) in keys.iter().zip(&blocks) {
        assert_eq!(*seen.entry(key).or_insert(*block), *block, "{:?} with {:?}", key, kind);
      }
      let distinct = seen.values().collect::<BTreeSet<_>>();
      assert_eq!(distinct.len(), seen.len());
      assert_eq!(counter.count() as usize, seen.len());
    }
  }
}

#[test]
fn tables_induce_the_same_classes() {
  let keys = workload(42, 2000);
  let classes = [TableKind::HashTable, TableKind::SkipList].map(|kind| {
    let counter = BlockCounter::new(1 << 20);
    let table = new_table(kind, 16, counter.limit());
    let blocks =
      keys.par_iter().map(|&(signature, previous)| table.search_or_insert(signature, previous, &counter).unwrap()).collect::<Vec<_>>();
    // first position of every block, which names the class independently of numbering
    let mut first = HashMap::new();
    blocks.iter().enumerate().map(|(index, block)| *first.entry(*block).or_insert(index)).collect::<Vec<_>>()
  });
  assert_eq!(classes[0], classes[1]);
}

#[test]
fn exhaustion_is_reported() {
  for kind in [TableKind::HashTable, TableKind::SkipList] {
    let counter = BlockCounter::new(8);
    let table = new_table(kind, 4, counter.limit());
    let results = (0..32).into_par_iter().map(|signature| table.search_or_insert(signature, 1, &counter)).collect::<Vec<_>>();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 7);
    assert!(results.iter().any(|result| matches!(result, Err(Error::BlocksExhausted { limit: 8 }))));
  }
}
