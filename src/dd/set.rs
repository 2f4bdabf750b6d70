use super::*;
use std::collections::BTreeMap;

/// State and next-state variables are numbered below this bound.
pub const STATE_LIMIT: Var = 1_000_000;

/// Variable renaming used by [`Ctx::compose`].
#[derive(Debug, Clone)]
pub struct VarMap {
  id: u64,
  pairs: BTreeMap<Var, Var>,
}

impl VarMap {
  pub fn get(&self, var: Var) -> Option<Var> {
    self.pairs.get(&var).copied()
  }

  pub fn id(&self) -> u64 {
    self.id
  }

  pub(crate) fn last(&self) -> Var {
    self.pairs.keys().next_back().copied().unwrap_or(0)
  }
}

impl<L: Leaf> Manager<L> {
  pub fn var_map(&self, pairs: impl IntoIterator<Item = (Var, Var)>) -> VarMap {
    VarMap { id: self.fresh_tag(), pairs: pairs.into_iter().collect() }
  }
}

impl<'m, L: Leaf> Ctx<'m, L> {
  /// Conjunction of literals; variable sets are cubes of positive literals.
  pub fn cube(&self, literals: &[(Var, bool)]) -> Result<Dd> {
    let mut literals = literals.to_vec();
    literals.sort_unstable_by_key(|&(var, _)| std::cmp::Reverse(var));
    literals.dedup_by_key(|&mut (var, _)| var);
    let mut result = Dd::TRUE;
    for (var, value) in literals {
      result = if value {
        self.makenode(var, Dd::FALSE, result)?
      } else {
        self.makenode(var, result, Dd::FALSE)?
      };
    }
    Ok(result)
  }

  pub fn set(&self, vars: impl IntoIterator<Item = Var>) -> Result<Dd> {
    let literals = vars.into_iter().map(|var| (var, true)).collect::<Vec<_>>();
    self.cube(&literals)
  }

  pub fn set_first(&self, set: Dd) -> Var {
    self.var(set)
  }

  pub fn set_next(&self, set: Dd) -> Dd {
    self.high(set)
  }

  pub fn set_is_empty(&self, set: Dd) -> bool {
    set.is_true()
  }

  pub fn set_vars(&self, mut set: Dd) -> Vec<Var> {
    let mut vars = Vec::new();
    while !self.is_leaf(set) {
      vars.push(self.var(set));
      set = self.high(set);
    }
    vars
  }

  pub fn set_count(&self, set: Dd) -> usize {
    self.set_vars(set).len()
  }

  /// Literal at the top of a cube together with the rest of the cube.
  pub fn cube_step(&self, cube: Dd) -> (Var, bool, Dd) {
    let low = self.low(cube);
    if low.is_false() {
      (self.var(cube), true, self.high(cube))
    } else {
      (self.var(cube), false, low)
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use ordered_float::OrderedFloat;

  #[test]
  fn cubes_and_sets() {
    let manager = Manager::<OrderedFloat<f64>>::new(10);
    let ctx = manager.ctx();
    let set = ctx.set([4, 0, 2]).unwrap();
    assert_eq!(ctx.set_vars(set), vec![0, 2, 4]);
    assert_eq!(ctx.set_first(set), 0);
    assert_eq!(ctx.set_count(ctx.set_next(set)), 2);
    let cube = ctx.cube(&[(2, false), (0, true)]).unwrap();
    assert_eq!(ctx.cube_step(cube), (0, true, ctx.cube(&[(2, false)]).unwrap()));
    assert!(ctx.set_is_empty(ctx.set([]).unwrap()));
  }
}
