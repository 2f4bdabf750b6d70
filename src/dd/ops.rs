use super::*;

const NOT: Opcode = Opcode(1);
const AND: Opcode = Opcode(2);
const OR: Opcode = Opcode(3);
const ITE: Opcode = Opcode(4);
const APPLY: Opcode = Opcode(5);
const ABSTRACT: Opcode = Opcode(6);
const AND_ABSTRACT: Opcode = Opcode(7);
const COMPOSE: Opcode = Opcode(8);
const SWAP_PRIME: Opcode = Opcode(9);
const RESTRICT: Opcode = Opcode(10);

/// Pointwise arithmetic on numeric diagrams. `FALSE` is the undefined value:
/// the identity of `Plus` and `Max`, and absorbing for `Times`, where `TRUE`
/// is the identity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Arith {
  Plus,
  Times,
  Max,
}

/// How the two cofactors of an abstracted variable are combined.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Fold {
  Or,
  Plus,
  Max,
}

impl<'m, L: Leaf> Ctx<'m, L> {
  pub fn ithvar(&self, var: Var) -> Result<Dd> {
    self.makenode(var, Dd::FALSE, Dd::TRUE)
  }

  pub fn nithvar(&self, var: Var) -> Result<Dd> {
    self.makenode(var, Dd::TRUE, Dd::FALSE)
  }

  pub fn not(&self, a: Dd) -> Result<Dd> {
    if a.is_false() {
      return Ok(Dd::TRUE);
    }
    if self.is_leaf(a) {
      return Ok(Dd::FALSE);
    }
    self.safepoint()?;
    if let Some(result) = self.cached(NOT, a, Dd::FALSE, Dd::FALSE, 0) {
      return Ok(result);
    }
    let (low, high) = self.fork(|| self.not(self.low(a)), || self.not(self.high(a)))?;
    let result = self.makenode(self.var(a), low, high)?;
    Ok(self.remember(NOT, a, Dd::FALSE, Dd::FALSE, 0, result))
  }

  pub fn and(&self, a: Dd, b: Dd) -> Result<Dd> {
    if a.is_false() || b.is_false() {
      return Ok(Dd::FALSE);
    }
    if a.is_true() || a == b {
      return Ok(b);
    }
    if b.is_true() || (self.is_leaf(a) && self.is_leaf(b)) {
      return Ok(a);
    }
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    self.safepoint()?;
    if let Some(result) = self.cached(AND, a, b, Dd::FALSE, 0) {
      return Ok(result);
    }
    let var = self.var(a).min(self.var(b));
    let (a0, a1) = self.cofactors(a, var);
    let (b0, b1) = self.cofactors(b, var);
    let (low, high) = self.fork(|| self.and(a0, b0), || self.and(a1, b1))?;
    let result = self.makenode(var, low, high)?;
    Ok(self.remember(AND, a, b, Dd::FALSE, 0, result))
  }

  pub fn or(&self, a: Dd, b: Dd) -> Result<Dd> {
    if a.is_true() || b.is_true() {
      return Ok(Dd::TRUE);
    }
    if a.is_false() || a == b {
      return Ok(b);
    }
    if b.is_false() || (self.is_leaf(a) && self.is_leaf(b)) {
      return Ok(a);
    }
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    self.safepoint()?;
    if let Some(result) = self.cached(OR, a, b, Dd::FALSE, 0) {
      return Ok(result);
    }
    let var = self.var(a).min(self.var(b));
    let (a0, a1) = self.cofactors(a, var);
    let (b0, b1) = self.cofactors(b, var);
    let (low, high) = self.fork(|| self.or(a0, b0), || self.or(a1, b1))?;
    let result = self.makenode(var, low, high)?;
    Ok(self.remember(OR, a, b, Dd::FALSE, 0, result))
  }

  /// If-then-else with a boolean condition and arbitrary branches.
  pub fn ite(&self, f: Dd, g: Dd, h: Dd) -> Result<Dd> {
    if f.is_true() || g == h {
      return Ok(g);
    }
    if f.is_false() {
      return Ok(h);
    }
    if g.is_true() && h.is_false() {
      return Ok(f);
    }
    if g.is_false() && h.is_true() {
      return self.not(f);
    }
    self.safepoint()?;
    if let Some(result) = self.cached(ITE, f, g, h, 0) {
      return Ok(result);
    }
    let var = self.var(f).min(self.var(g)).min(self.var(h));
    let (f0, f1) = self.cofactors(f, var);
    let (g0, g1) = self.cofactors(g, var);
    let (h0, h1) = self.cofactors(h, var);
    let (low, high) = self.fork(|| self.ite(f0, g0, h0), || self.ite(f1, g1, h1))?;
    let result = self.makenode(var, low, high)?;
    Ok(self.remember(ITE, f, g, h, 0, result))
  }

  pub fn apply(&self, a: Dd, b: Dd, op: Arith) -> Result<Dd> {
    match op {
      Arith::Plus | Arith::Max => {
        if a.is_false() {
          return Ok(b);
        }
        if b.is_false() {
          return Ok(a);
        }
        if op == Arith::Max && a == b {
          return Ok(a);
        }
      }
      Arith::Times => {
        if a.is_false() || b.is_false() {
          return Ok(Dd::FALSE);
        }
        if a.is_true() {
          return Ok(b);
        }
        if b.is_true() {
          return Ok(a);
        }
      }
    }
    if self.is_leaf(a) && self.is_leaf(b) {
      let (Some(x), Some(y)) = (self.value(a), self.value(b)) else {
        return Err(Error::Invariant(format!("boolean terminal in {:?}", op)));
      };
      let value = match op {
        Arith::Plus => x.add(y),
        Arith::Times => x.mul(y),
        Arith::Max => x.max_of(y),
      };
      return self.leaf(value);
    }
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    self.safepoint()?;
    if let Some(result) = self.cached(APPLY, a, b, Dd::FALSE, op as u64) {
      return Ok(result);
    }
    let var = self.var(a).min(self.var(b));
    let (a0, a1) = self.cofactors(a, var);
    let (b0, b1) = self.cofactors(b, var);
    let (low, high) = self.fork(|| self.apply(a0, b0, op), || self.apply(a1, b1, op))?;
    let result = self.makenode(var, low, high)?;
    Ok(self.remember(APPLY, a, b, Dd::FALSE, op as u64, result))
  }

  pub fn plus(&self, a: Dd, b: Dd) -> Result<Dd> {
    self.apply(a, b, Arith::Plus)
  }

  pub fn times(&self, a: Dd, b: Dd) -> Result<Dd> {
    self.apply(a, b, Arith::Times)
  }

  pub fn max(&self, a: Dd, b: Dd) -> Result<Dd> {
    self.apply(a, b, Arith::Max)
  }

  fn fold(&self, a: Dd, b: Dd, fold: Fold) -> Result<Dd> {
    match fold {
      Fold::Or => self.or(a, b),
      Fold::Plus => self.plus(a, b),
      Fold::Max => self.max(a, b),
    }
  }

  /// Abstracts the variables of `vars` from `a`. Summing over a variable
  /// that `a` does not depend on doubles the value.
  pub fn abstract_vars(&self, a: Dd, vars: Dd, fold: Fold) -> Result<Dd> {
    if vars.is_true() || a.is_false() {
      return Ok(a);
    }
    if self.is_leaf(a) {
      if fold != Fold::Plus {
        return Ok(a);
      }
      let mut result = a;
      for _ in 0..self.set_count(vars) {
        result = self.plus(result, result)?;
      }
      return Ok(result);
    }
    self.safepoint()?;
    let var = self.var(a);
    let first = self.set_first(vars);
    if first < var {
      let result = self.abstract_vars(a, self.set_next(vars), fold)?;
      return if fold == Fold::Plus { self.plus(result, result) } else { Ok(result) };
    }
    if let Some(result) = self.cached(ABSTRACT, a, vars, Dd::FALSE, fold as u64) {
      return Ok(result);
    }
    let result = if first == var {
      let next = self.set_next(vars);
      let (low, high) =
        self.fork(|| self.abstract_vars(self.low(a), next, fold), || self.abstract_vars(self.high(a), next, fold))?;
      self.fold(low, high, fold)?
    } else {
      let (low, high) =
        self.fork(|| self.abstract_vars(self.low(a), vars, fold), || self.abstract_vars(self.high(a), vars, fold))?;
      self.makenode(var, low, high)?
    };
    Ok(self.remember(ABSTRACT, a, vars, Dd::FALSE, fold as u64, result))
  }

  pub fn exists(&self, a: Dd, vars: Dd) -> Result<Dd> {
    self.abstract_vars(a, vars, Fold::Or)
  }

  /// `abstract_vars(times(a, b), vars, fold)` without building the product.
  pub fn and_abstract(&self, a: Dd, b: Dd, vars: Dd, fold: Fold) -> Result<Dd> {
    if a.is_false() || b.is_false() {
      return Ok(Dd::FALSE);
    }
    if a.is_true() {
      return self.abstract_vars(b, vars, fold);
    }
    if b.is_true() {
      return self.abstract_vars(a, vars, fold);
    }
    if vars.is_true() {
      return self.times(a, b);
    }
    if self.is_leaf(a) && self.is_leaf(b) {
      let product = self.times(a, b)?;
      return self.abstract_vars(product, vars, fold);
    }
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    self.safepoint()?;
    let var = self.var(a).min(self.var(b));
    let first = self.set_first(vars);
    if first < var {
      let result = self.and_abstract(a, b, self.set_next(vars), fold)?;
      return if fold == Fold::Plus { self.plus(result, result) } else { Ok(result) };
    }
    if let Some(result) = self.cached(AND_ABSTRACT, a, b, vars, fold as u64) {
      return Ok(result);
    }
    let (a0, a1) = self.cofactors(a, var);
    let (b0, b1) = self.cofactors(b, var);
    let result = if first == var {
      let next = self.set_next(vars);
      let (low, high) =
        self.fork(|| self.and_abstract(a0, b0, next, fold), || self.and_abstract(a1, b1, next, fold))?;
      self.fold(low, high, fold)?
    } else {
      let (low, high) =
        self.fork(|| self.and_abstract(a0, b0, vars, fold), || self.and_abstract(a1, b1, vars, fold))?;
      self.makenode(var, low, high)?
    };
    Ok(self.remember(AND_ABSTRACT, a, b, vars, fold as u64, result))
  }

  pub fn and_exists(&self, a: Dd, b: Dd, vars: Dd) -> Result<Dd> {
    self.and_abstract(a, b, vars, Fold::Or)
  }

  /// Renames variables according to `map`; the renaming may reorder variables.
  pub fn compose(&self, a: Dd, map: &VarMap) -> Result<Dd> {
    if self.is_leaf(a) || self.var(a) > map.last() {
      return Ok(a);
    }
    self.safepoint()?;
    if let Some(result) = self.cached(COMPOSE, a, Dd::FALSE, Dd::FALSE, map.id()) {
      return Ok(result);
    }
    let (low, high) = self.fork(|| self.compose(self.low(a), map), || self.compose(self.high(a), map))?;
    let var = self.var(a);
    let condition = self.ithvar(map.get(var).unwrap_or(var))?;
    let result = self.ite(condition, high, low)?;
    Ok(self.remember(COMPOSE, a, Dd::FALSE, Dd::FALSE, map.id(), result))
  }

  /// Exchanges every state variable with its next-state partner.
  pub fn swap_prime(&self, a: Dd) -> Result<Dd> {
    if self.is_leaf(a) || self.var(a) >= STATE_LIMIT {
      return Ok(a);
    }
    self.safepoint()?;
    if let Some(result) = self.cached(SWAP_PRIME, a, Dd::FALSE, Dd::FALSE, 0) {
      return Ok(result);
    }
    let (low, high) = self.fork(|| self.swap_prime(self.low(a)), || self.swap_prime(self.high(a)))?;
    let condition = self.ithvar(self.var(a) ^ 1)?;
    let result = self.ite(condition, high, low)?;
    Ok(self.remember(SWAP_PRIME, a, Dd::FALSE, Dd::FALSE, 0, result))
  }

  /// Cofactor of `a` with respect to the literals of `cube`.
  pub fn restrict(&self, a: Dd, cube: Dd) -> Result<Dd> {
    if cube.is_true() || self.is_leaf(a) {
      return Ok(a);
    }
    if cube.is_false() {
      return Ok(Dd::FALSE);
    }
    self.safepoint()?;
    let var = self.var(a);
    let (first, value, rest) = self.cube_step(cube);
    if first < var {
      return self.restrict(a, rest);
    }
    if let Some(result) = self.cached(RESTRICT, a, cube, Dd::FALSE, 0) {
      return Ok(result);
    }
    let result = if first == var {
      self.restrict(if value { self.high(a) } else { self.low(a) }, rest)?
    } else {
      let (low, high) = self.fork(|| self.restrict(self.low(a), cube), || self.restrict(self.high(a), cube))?;
      self.makenode(var, low, high)?
    };
    Ok(self.remember(RESTRICT, a, cube, Dd::FALSE, 0, result))
  }
}
