use super::*;
use crate::dd::{Ctx, Dd, Leaf};
use crate::error::{Error, Result};

impl<'m, L: Leaf> Ctx<'m, L> {
  /// Merges two partial functions over `vars`: where only one is defined it
  /// wins, where both agree the common value is kept, and where they
  /// disagree the result is `conflict`. The variables of `vars` must come
  /// before every other variable of `a` and `b`.
  pub fn equi(&self, a: Dd, b: Dd, vars: Dd, conflict: Dd) -> Result<Dd> {
    if a == conflict || b == conflict {
      return Ok(conflict);
    }
    if a.is_false() || a == b {
      return Ok(b);
    }
    if b.is_false() {
      return Ok(a);
    }
    if vars.is_true() {
      return Ok(conflict);
    }
    self.safepoint()?;
    let var = self.var(a).min(self.var(b));
    let mut vars = vars;
    loop {
      let first = self.set_first(vars);
      if first == var {
        break;
      }
      if first > var {
        return Err(Error::Invariant(format!("equi reached variable {} outside its variable set", var)));
      }
      vars = self.set_next(vars);
      if vars.is_true() {
        return Ok(conflict);
      }
    }
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    if let Some(result) = self.cached(EQUI, a, b, vars, conflict.raw()) {
      return Ok(result);
    }
    let (a0, a1) = self.cofactors(a, var);
    let (b0, b1) = self.cofactors(b, var);
    let next = self.set_next(vars);
    let (low, high) =
      self.fork(|| self.equi(a0, b0, next, conflict), || self.equi(a1, b1, next, conflict))?;
    let result = self.makenode(var, low, high)?;
    Ok(self.remember(EQUI, a, b, vars, conflict.raw(), result))
  }

  /// Predecessor of `b` under the relation `a`, where the values reached
  /// through different successors are merged with [`Ctx::equi`] and
  /// disagreement becomes `TRUE`.
  ///
  /// `a` is defined over the pairs of `st` only; `b` is a function over state
  /// variables followed by other variables.
  pub fn relprev_equi(&self, a: Dd, b: Dd, st: Dd) -> Result<Dd> {
    if a.is_false() || b.is_false() {
      return Ok(Dd::FALSE);
    }
    if st.is_true() {
      return Ok(b);
    }
    self.safepoint()?;
    let level = self.var(a).min(self.var(b));
    let mut st = st;
    loop {
      let first = self.set_first(st);
      if level == first || level ^ 1 == first {
        break;
      }
      if level < first {
        return Err(Error::Invariant(format!("relational predecessor skipped variable {}", level)));
      }
      st = self.set_next(st);
      if st.is_true() {
        if !a.is_true() {
          return Err(Error::Invariant("transition relation depends on variables after the state pairs".into()));
        }
        return Ok(b);
      }
    }
    if let Some(result) = self.cached(RELPREV_EQUI, a, b, st, 0) {
      return Ok(result);
    }
    let s = level & !1;
    let t = s + 1;
    let (a0, a1) = self.cofactors(a, s);
    let (b0, b1) = self.cofactors(b, s);
    let (a00, a01) = self.cofactors(a0, t);
    let (a10, a11) = self.cofactors(a1, t);
    let mut next = self.set_next(st);
    if self.set_first(next) == t {
      next = self.set_next(next);
    }
    let ((r00, r01), (r10, r11)) = self.fork(
      || self.fork(|| self.relprev_equi(a00, b0, next), || self.relprev_equi(a01, b1, next)),
      || self.fork(|| self.relprev_equi(a10, b0, next), || self.relprev_equi(a11, b1, next)),
    )?;
    let (low, high) =
      self.fork(|| self.equi(r00, r01, next, Dd::TRUE), || self.equi(r10, r11, next, Dd::TRUE))?;
    let result = self.makenode(s, low, high)?;
    Ok(self.remember(RELPREV_EQUI, a, b, st, 0, result))
  }
}
