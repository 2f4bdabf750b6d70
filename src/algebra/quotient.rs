use super::*;
use crate::blocks::BlockEncoding;
use crate::dd::{Ctx, Dd, Leaf, Var, VarMap, NO_VAR};
use crate::error::{Error, Result};
use dashmap::DashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Path from the root of a partition to the current node.
struct Trace<'t> {
  prev: Option<&'t Trace<'t>>,
  var: Var,
  value: bool,
}

impl<'m, L: Leaf> Ctx<'m, L> {
  /// Interleaves two equally long block cubes into a cube over state
  /// (`left`) and next-state (`right`) variables, on top of `tail`.
  pub fn cubes_to_st(&self, left: Dd, right: Dd, tail: Dd) -> Result<Dd> {
    self.cubes_to_st_at(left, right, tail, 0)
  }

  fn cubes_to_st_at(&self, left: Dd, right: Dd, tail: Dd, depth: Var) -> Result<Dd> {
    if left.is_true() && right.is_true() {
      return Ok(tail);
    }
    if self.is_leaf(left) || self.is_leaf(right) {
      return Err(Error::Invariant("block cubes of different length".into()));
    }
    let (_, left_value, left_rest) = self.cube_step(left);
    let (_, right_value, right_rest) = self.cube_step(right);
    let rest = self.cubes_to_st_at(left_rest, right_rest, tail, depth + 1)?;
    let rest = if right_value {
      self.makenode(2 * depth + 1, Dd::FALSE, rest)?
    } else {
      self.makenode(2 * depth + 1, rest, Dd::FALSE)?
    };
    if left_value {
      self.makenode(2 * depth, Dd::FALSE, rest)
    } else {
      self.makenode(2 * depth, rest, Dd::FALSE)
    }
  }

  /// Quotient of a transition relation over (s, t, actions) in one walk:
  /// source and target states are replaced by their blocks, re-encoded in
  /// state variables. Unless `tau` is `FALSE`, tau steps between states of
  /// the same block are dropped.
  pub fn trans_quotient(&self, dd: Dd, left: Dd, right: Dd, st: Dd, tau: Dd) -> Result<Dd> {
    if dd.is_false() || left.is_false() || right.is_false() {
      return Ok(Dd::FALSE);
    }
    let top = self.var(dd).min(self.var(right)).min(self.var(left).saturating_sub(1));
    let mut st = st;
    while !st.is_true() && self.set_first(st) < top {
      st = self.set_next(st);
    }
    self.safepoint()?;
    let tag = st.raw() << 32 | tau.raw();
    if let Some(result) = self.cached(TRANS_QUOTIENT, dd, left, right, tag) {
      return Ok(result);
    }
    let result = if st.is_true() {
      let mut result = dd;
      if !tau.is_false() && left == right {
        result = self.and(result, self.not(tau)?)?;
      }
      self.cubes_to_st(left, right, result)?
    } else {
      let var = self.set_first(st);
      let (dd0, dd1) = self.cofactors(dd, var);
      let (left0, left1) = self.cofactors(left, var + 1);
      let (right0, right1) = self.cofactors(right, var);
      let next = self.set_next(st);
      let (low, high) = self.fork(
        || self.trans_quotient(dd0, left0, right0, next, tau),
        || self.trans_quotient(dd1, left1, right1, next, tau),
      )?;
      self.or(low, high)?
    };
    Ok(self.remember(TRANS_QUOTIENT, dd, left, right, tag, result))
  }

  /// Second half of the rate quotient. `dd` maps states and target blocks
  /// to summed rates; the source state is replaced by its block from
  /// `left`, and states of one block are combined by maximum.
  pub fn markov_quotient(&self, dd: Dd, left: Dd, s_vars: Dd, to_t: &VarMap, to_s: &VarMap) -> Result<Dd> {
    if dd.is_false() || left.is_false() {
      return Ok(Dd::FALSE);
    }
    let top = self.var(dd).min(self.var(left).saturating_sub(1));
    let mut s_vars = s_vars;
    while !s_vars.is_true() && self.set_first(s_vars) < top {
      s_vars = self.set_next(s_vars);
    }
    self.safepoint()?;
    let tag = to_t.id() << 32 ^ to_s.id();
    if let Some(result) = self.cached(MARKOV_QUOTIENT, dd, left, s_vars, tag) {
      return Ok(result);
    }
    let result = if s_vars.is_true() {
      let (source, targets) = self.fork(|| self.compose(left, to_s), || self.compose(dd, to_t))?;
      self.times(targets, source)?
    } else {
      let var = self.set_first(s_vars);
      let (dd0, dd1) = self.cofactors(dd, var);
      let (left0, left1) = self.cofactors(left, var + 1);
      let next = self.set_next(s_vars);
      let (low, high) = self.fork(
        || self.markov_quotient(dd0, left0, next, to_t, to_s),
        || self.markov_quotient(dd1, left1, next, to_t, to_s),
      )?;
      self.max(low, high)?
    };
    Ok(self.remember(MARKOV_QUOTIENT, dd, left, s_vars, tag, result))
  }

  /// Blocks of the states in `dd`, re-encoded in state variables.
  pub fn states_quotient(&self, dd: Dd, partition: Dd, s_vars: Dd, to_s: &VarMap) -> Result<Dd> {
    if dd.is_false() || partition.is_false() {
      return Ok(Dd::FALSE);
    }
    let top = self.var(dd).min(self.var(partition).saturating_sub(1));
    let mut s_vars = s_vars;
    while !s_vars.is_true() && self.set_first(s_vars) < top {
      s_vars = self.set_next(s_vars);
    }
    self.safepoint()?;
    if let Some(result) = self.cached(STATES_QUOTIENT, dd, partition, s_vars, to_s.id()) {
      return Ok(result);
    }
    let result = if s_vars.is_true() {
      if !dd.is_true() {
        return Err(Error::Invariant("state set depends on non-state variables".into()));
      }
      self.compose(partition, to_s)?
    } else {
      let var = self.set_first(s_vars);
      let (dd0, dd1) = self.cofactors(dd, var);
      let (part0, part1) = self.cofactors(partition, var + 1);
      let next = self.set_next(s_vars);
      let (low, high) = self.fork(
        || self.states_quotient(dd0, part0, next, to_s),
        || self.states_quotient(dd1, part1, next, to_s),
      )?;
      self.or(low, high)?
    };
    Ok(self.remember(STATES_QUOTIENT, dd, partition, s_vars, to_s.id(), result))
  }

  /// Some state of every block of `partition`, indexed by block number.
  /// States are numbered by their next-state bits, `t_i` being bit `i`.
  pub fn pick_representatives(&self, partition: Dd, encoding: BlockEncoding, blocks: u64) -> Result<Vec<u64>> {
    let picked = (0..=blocks).map(|_| AtomicU64::new(0)).collect::<Box<[_]>>();
    let visited = DashSet::new();
    self.pick_from(partition, encoding, None, &picked, &visited)?;
    picked
      .iter()
      .skip(1)
      .map(|state| match state.load(Ordering::Relaxed) {
        0 => Err(Error::Invariant("block without a state".into())),
        state => Ok(state - 1),
      })
      .collect()
  }

  fn pick_from(
    &self,
    dd: Dd,
    encoding: BlockEncoding,
    trace: Option<&Trace>,
    picked: &[AtomicU64],
    visited: &DashSet<Dd>,
  ) -> Result<()> {
    if dd.is_false() || !visited.insert(dd) {
      return Ok(());
    }
    let var = self.var(dd);
    if var == NO_VAR || var >= encoding.base {
      let block = encoding.decode(self, dd) as usize;
      let mut state = 0;
      let mut trace = trace;
      while let Some(step) = trace {
        if step.value {
          state |= 1 << (step.var / 2);
        }
        trace = step.prev;
      }
      return match picked.get(block) {
        Some(slot) if block != 0 => {
          let _ = slot.compare_exchange(0, state + 1, Ordering::Relaxed, Ordering::Relaxed);
          Ok(())
        }
        _ => Err(Error::Invariant(format!("block {} outside the partition", block))),
      };
    }
    let low = Trace { prev: trace, var, value: false };
    let high = Trace { prev: trace, var, value: true };
    self.fork(
      || self.pick_from(self.low(dd), encoding, Some(&low), picked, visited),
      || self.pick_from(self.high(dd), encoding, Some(&high), picked, visited),
    )?;
    Ok(())
  }

  /// Replaces every block cube reached in `partition` through the variables
  /// of `t_vars` by `map(block)`.
  pub fn map_blocks(
    &self,
    partition: Dd,
    encoding: BlockEncoding,
    tag: u64,
    map: &(dyn Fn(&Self, u64) -> Result<Dd> + Sync),
  ) -> Result<Dd> {
    if partition.is_false() {
      return Ok(Dd::FALSE);
    }
    self.safepoint()?;
    if let Some(result) = self.cached(MAP_BLOCKS, partition, Dd::FALSE, Dd::FALSE, tag) {
      return Ok(result);
    }
    let var = self.var(partition);
    let result = if var == NO_VAR || var >= encoding.base {
      map(self, encoding.decode(self, partition))?
    } else {
      let (low, high) = self.fork(
        || self.map_blocks(self.low(partition), encoding, tag, map),
        || self.map_blocks(self.high(partition), encoding, tag, map),
      )?;
      self.makenode(var, low, high)?
    };
    Ok(self.remember(MAP_BLOCKS, partition, Dd::FALSE, Dd::FALSE, tag, result))
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::algebra::fixture::*;
  use crate::dd::Manager;
  use ordered_float::OrderedFloat;

  #[test]
  fn transitions_between_blocks() {
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let ctx = manager.ctx();
    let st = ctx.set([0, 1, 2, 3]).unwrap();
    let part = partition(&ctx, 2, &[(0, 1), (1, 1), (2, 2)]);
    let steps = relation(&ctx, 2, &[(0, 1), (1, 2), (2, 2)]);
    let quotient = ctx.trans_quotient(steps, part, part, st, Dd::FALSE).unwrap();
    let width = BLOCKS.width;
    let expected = relation(&ctx, width, &[(1, 1), (1, 2), (2, 2)]);
    assert_eq!(quotient, expected);
    let tau = ctx.ithvar(1_000_000).unwrap();
    let labelled = ctx.and(steps, tau).unwrap();
    let quotient = ctx.trans_quotient(labelled, part, part, st, tau).unwrap();
    assert_eq!(quotient, ctx.and(relation(&ctx, width, &[(1, 2)]), tau).unwrap());
  }

  #[test]
  fn states_and_representatives() {
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let ctx = manager.ctx();
    let s_vars = ctx.set([0, 2]).unwrap();
    let part = partition(&ctx, 2, &[(0, 1), (1, 1), (2, 2), (3, 2)]);
    let to_s = BLOCKS.to_states(&manager);
    let initial = state(&ctx, 2, 3, false);
    let quotient = ctx.states_quotient(initial, part, s_vars, &to_s).unwrap();
    assert_eq!(quotient, state(&ctx, BLOCKS.width, 2, false));
    let picked = ctx.pick_representatives(part, BLOCKS, 2).unwrap();
    assert!(picked[0] <= 1 && picked[1] >= 2);
    let tag = manager.fresh_tag();
    let renumbered = ctx.map_blocks(part, BLOCKS, tag, &|ctx, block| BLOCKS.encode(ctx, 3 - block)).unwrap();
    assert_eq!(renumbered, partition(&ctx, 2, &[(0, 2), (1, 2), (2, 1), (3, 1)]));
  }

  #[test]
  fn rates_combine_by_maximum() {
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let ctx = manager.ctx();
    let s_vars = ctx.set([0, 2]).unwrap();
    let t_vars = ctx.set([1, 3]).unwrap();
    let part = partition(&ctx, 2, &[(0, 1), (1, 1), (2, 2)]);
    let two = ctx.leaf(OrderedFloat(2.0)).unwrap();
    let rates = ctx.times(relation(&ctx, 2, &[(0, 2), (1, 2), (2, 0), (2, 1)]), two).unwrap();
    let sums = ctx.and_abstract(rates, part, t_vars, crate::dd::Fold::Plus).unwrap();
    let (to_t, to_s) = (BLOCKS.to_next_states(&manager), BLOCKS.to_states(&manager));
    let quotient = ctx.markov_quotient(sums, part, s_vars, &to_t, &to_s).unwrap();
    let four = ctx.leaf(OrderedFloat(4.0)).unwrap();
    let expected = ctx
      .plus(
        ctx.times(relation(&ctx, BLOCKS.width, &[(1, 2)]), two).unwrap(),
        ctx.times(relation(&ctx, BLOCKS.width, &[(2, 1)]), four).unwrap(),
      )
      .unwrap();
    assert_eq!(quotient, expected);
  }
}
