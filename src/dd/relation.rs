use super::*;

const RELPREV: Opcode = Opcode(11);
const CLOSURE: Opcode = Opcode(12);

impl<'m, L: Leaf> Ctx<'m, L> {
  /// Relational predecessor over interleaved state/next-state pairs.
  ///
  /// `st` holds pairs `(2i, 2i+1)`. The result is `∃x. a(s, x) ∧ b(x, ..)`:
  /// the state variables of `b` are matched with the next-state variables of
  /// `a`, and every other variable of `b` is carried over. With `b` itself a
  /// relation this is relational composition.
  pub fn relprev(&self, a: Dd, b: Dd, st: Dd) -> Result<Dd> {
    if a.is_false() || b.is_false() {
      return Ok(Dd::FALSE);
    }
    self.safepoint()?;
    let top = self.var(a).min(self.var(b));
    let mut st = st;
    while !st.is_true() && (self.set_first(st) | 1) < top {
      st = self.set_next(st);
    }
    if st.is_true() {
      return self.and(a, b);
    }
    if let Some(result) = self.cached(RELPREV, a, b, st, 0) {
      return Ok(result);
    }
    let s = self.set_first(st) & !1;
    let result = if top < s {
      let (a0, a1) = self.cofactors(a, top);
      let (b0, b1) = self.cofactors(b, top);
      let (low, high) = self.fork(|| self.relprev(a0, b0, st), || self.relprev(a1, b1, st))?;
      self.makenode(top, low, high)?
    } else {
      let mut next = self.set_next(st);
      if self.set_first(next) == s + 1 {
        next = self.set_next(next);
      }
      let (a0, a1) = self.cofactors(a, s);
      let (b0, b1) = self.cofactors(b, s);
      let (a00, a01) = self.cofactors(a0, s + 1);
      let (a10, a11) = self.cofactors(a1, s + 1);
      let ((r00, r01), (r10, r11)) = self.fork(
        || self.fork(|| self.relprev(a00, b0, next), || self.relprev(a01, b1, next)),
        || self.fork(|| self.relprev(a10, b0, next), || self.relprev(a11, b1, next)),
      )?;
      let (low, high) = self.fork(|| self.or(r00, r01), || self.or(r10, r11))?;
      self.makenode(s, low, high)?
    };
    Ok(self.remember(RELPREV, a, b, st, 0, result))
  }

  /// Reflexive-transitive closure of a relation over the pairs in `st`.
  ///
  /// Splits the relation on the top pair into the block matrix
  /// `[[A, B], [C, D]]` and solves it with the star of `A` and of the Schur
  /// complement `D ∨ C A* B`.
  pub fn closure(&self, relation: Dd, st: Dd) -> Result<Dd> {
    if st.is_true() {
      return Ok(Dd::TRUE);
    }
    self.safepoint()?;
    if let Some(result) = self.cached(CLOSURE, relation, st, Dd::FALSE, 0) {
      return Ok(result);
    }
    let s = self.set_first(st) & !1;
    let mut next = self.set_next(st);
    if self.set_first(next) == s + 1 {
      next = self.set_next(next);
    }
    let (r0, r1) = self.cofactors(relation, s);
    let (a, b) = self.cofactors(r0, s + 1);
    let (c, d) = self.cofactors(r1, s + 1);
    let a_star = self.closure(a, next)?;
    let (ca, a_b) = self.fork(|| self.relprev(c, a_star, next), || self.relprev(a_star, b, next))?;
    let detour = self.relprev(ca, b, next)?;
    let d_star = self.closure(self.or(d, detour)?, next)?;
    let (t10, t01) = self.fork(|| self.relprev(d_star, ca, next), || self.relprev(a_b, d_star, next))?;
    let back = self.relprev(t01, ca, next)?;
    let t00 = self.or(a_star, back)?;
    let low = self.makenode(s + 1, t00, t01)?;
    let high = self.makenode(s + 1, t10, d_star)?;
    let result = self.makenode(s, low, high)?;
    Ok(self.remember(CLOSURE, relation, st, Dd::FALSE, 0, result))
  }
}
