use super::*;
use crate::dd::{Ctx, Dd, Leaf};
use crate::error::Result;

impl<'m, L: Leaf> Ctx<'m, L> {
  /// Transitions of `dd` whose source block (looked up in `left`) equals
  /// their target block (looked up in `right`). Both partitions are over
  /// next-state variables; `left` is followed with the source variables.
  pub fn inert(&self, dd: Dd, left: Dd, right: Dd, st: Dd) -> Result<Dd> {
    if dd.is_false() || left.is_false() || right.is_false() {
      return Ok(Dd::FALSE);
    }
    if st.is_true() {
      return Ok(if left == right { dd } else { Dd::FALSE });
    }
    if let Some(result) = self.cached(INERT, dd, left, right, st.raw()) {
      return Ok(result);
    }
    self.safepoint()?;
    let var = self.set_first(st);
    let (dd0, dd1) = self.cofactors(dd, var);
    let (left0, left1) = self.cofactors(left, var + 1);
    let (right0, right1) = self.cofactors(right, var);
    let next = self.set_next(st);
    let (low, high) =
      self.fork(|| self.inert(dd0, left0, right0, next), || self.inert(dd1, left1, right1, next))?;
    let result = self.makenode(var, low, high)?;
    Ok(self.remember(INERT, dd, left, right, st.raw(), result))
  }
}

#[cfg(test)]
mod test {
  use crate::algebra::fixture::*;
  use crate::dd::Manager;
  use ordered_float::OrderedFloat;

  #[test]
  fn keeps_steps_inside_blocks() {
    let manager = Manager::<OrderedFloat<f64>>::new(14);
    let ctx = manager.ctx();
    let st = ctx.set([0, 1, 2, 3]).unwrap();
    let part = partition(&ctx, 2, &[(0, 1), (1, 1), (2, 2)]);
    let steps = relation(&ctx, 2, &[(0, 1), (1, 2), (2, 2), (3, 3), (0, 3)]);
    let inert = ctx.inert(steps, part, part, st).unwrap();
    assert_eq!(inert, relation(&ctx, 2, &[(0, 1), (2, 2)]));
  }
}
