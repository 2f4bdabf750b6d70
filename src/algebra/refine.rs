use super::*;
use crate::blocks::{new_table, BlockCounter, BlockEncoding, BlockTable};
use crate::config::TableKind;
use crate::dd::{Ctx, Dd, Leaf, Manager};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// State of one refinement pass.
///
/// The first signature seen inside a previous block keeps that block's
/// number; every other (signature, previous block) pair gets a fresh number
/// from the table.
pub struct Pass<'a> {
  table: Box<dyn BlockTable>,
  claims: Box<[AtomicU64]>,
  counter: &'a BlockCounter,
  encoding: BlockEncoding,
  tag: u64,
}

impl<'a> Pass<'a> {
  pub fn new<L: Leaf>(manager: &Manager<L>, kind: TableKind, counter: &'a BlockCounter, encoding: BlockEncoding) -> Self {
    let blocks = counter.count() as usize;
    Pass {
      table: new_table(kind, blocks, counter.limit()),
      claims: (0..=blocks).map(|_| AtomicU64::new(0)).collect(),
      counter,
      encoding,
      tag: manager.fresh_tag(),
    }
  }
}

impl<'m, L: Leaf> Ctx<'m, L> {
  /// Computes the next partition from a signature over state variables and
  /// the previous partition over next-state variables. States without a
  /// previous block stay without a block.
  pub fn refine(&self, signature: Dd, s_vars: Dd, previous: Dd, pass: &Pass) -> Result<Dd> {
    if previous.is_false() {
      return Ok(Dd::FALSE);
    }
    if s_vars.is_true() {
      if let Some(result) = self.cached(REFINE, signature, s_vars, previous, pass.tag) {
        return Ok(result);
      }
      let result = self.assign(signature, previous, pass)?;
      return Ok(self.remember(REFINE, signature, s_vars, previous, pass.tag, result));
    }
    self.safepoint()?;
    let dd_var = self.var(signature);
    let pp_var = self.var(previous);
    let mut vars = s_vars;
    let mut var = self.set_first(vars);
    while var < dd_var && var + 1 < pp_var {
      vars = self.set_next(vars);
      if vars.is_true() {
        return self.refine(signature, vars, previous, pass);
      }
      var = self.set_first(vars);
    }
    if let Some(result) = self.cached(REFINE, signature, vars, previous, pass.tag) {
      return Ok(result);
    }
    let (dd0, dd1) = self.cofactors(signature, var);
    let (pp0, pp1) = self.cofactors(previous, var + 1);
    let next = self.set_next(vars);
    let (low, high) = self.fork(|| self.refine(dd0, next, pp0, pass), || self.refine(dd1, next, pp1, pass))?;
    let result = self.makenode(var + 1, low, high)?;
    Ok(self.remember(REFINE, signature, vars, previous, pass.tag, result))
  }

  fn assign(&self, signature: Dd, previous: Dd, pass: &Pass) -> Result<Dd> {
    let block = pass.encoding.decode(self, previous);
    let claim = match pass.claims.get(block as usize) {
      Some(claim) if block != 0 => claim,
      _ => return Err(Error::Invariant(format!("previous block {} was never handed out", block))),
    };
    let key = signature.raw() + 1;
    loop {
      match claim.load(Ordering::Acquire) {
        current if current == key => return Ok(previous),
        0 => {
          if claim.compare_exchange(0, key, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            return Ok(previous);
          }
        }
        _ => break,
      }
    }
    let block = pass.table.search_or_insert(signature.raw(), block, pass.counter)?;
    pass.encoding.encode(self, block)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::algebra::fixture::*;
  use ordered_float::OrderedFloat;

  #[test]
  fn splits_by_signature_within_blocks() {
    let manager = Manager::<OrderedFloat<f64>>::new(14);
    let ctx = manager.ctx();
    let s_vars = ctx.set([0, 2]).unwrap();
    let counter = BlockCounter::new(BLOCKS.limit());
    counter.fresh().unwrap();
    counter.fresh().unwrap();
    // states 0, 1, 2 in block 1, state 3 in block 2
    let previous = partition(&ctx, 2, &[(0, 1), (1, 1), (2, 1), (3, 2)]);
    let x = ctx.ithvar(1_000_000).unwrap();
    let signature = [(0, x), (1, Dd::TRUE), (2, x), (3, x)]
      .into_iter()
      .fold(Dd::FALSE, |acc, (s, sig)| ctx.or(acc, ctx.and(state(&ctx, 2, s, false), sig).unwrap()).unwrap());
    for kind in [TableKind::HashTable, TableKind::SkipList] {
      let counter = BlockCounter::new(BLOCKS.limit());
      counter.fresh().unwrap();
      counter.fresh().unwrap();
      let pass = Pass::new(&manager, kind, &counter, BLOCKS);
      let next = ctx.refine(signature, s_vars, previous, &pass).unwrap();
      let block_of = |s: u64| {
        let cube = ctx.restrict(next, state(&ctx, 2, s, true)).unwrap();
        BLOCKS.decode(&ctx, cube)
      };
      assert_eq!(block_of(0), block_of(2));
      assert_ne!(block_of(0), block_of(1));
      assert_eq!(block_of(3), 2);
      assert_eq!(counter.count(), 3);
    }
    assert_eq!(counter.count(), 2);
  }

  #[test]
  fn states_without_block_stay_outside() {
    let manager = Manager::<OrderedFloat<f64>>::new(12);
    let ctx = manager.ctx();
    let s_vars = ctx.set([0, 2]).unwrap();
    let counter = BlockCounter::new(BLOCKS.limit());
    counter.fresh().unwrap();
    let previous = partition(&ctx, 2, &[(0, 1), (1, 1)]);
    let pass = Pass::new(&manager, TableKind::HashTable, &counter, BLOCKS);
    let next = ctx.refine(Dd::TRUE, s_vars, previous, &pass).unwrap();
    assert_eq!(next, previous);
  }
}
