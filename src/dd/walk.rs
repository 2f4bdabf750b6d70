use super::*;
use std::collections::HashSet;

impl<'m, L: Leaf> Ctx<'m, L> {
  /// Number of assignments to `vars` on which `dd` is not `FALSE`.
  pub fn satcount(&self, dd: Dd, vars: Dd) -> f64 {
    let mut memo = HashMap::new();
    self.satcount_rec(dd, vars, &mut memo)
  }

  fn satcount_rec(&self, dd: Dd, vars: Dd, memo: &mut HashMap<(Dd, Dd), f64>) -> f64 {
    if dd.is_false() {
      return 0.0;
    }
    if vars.is_true() {
      return 1.0;
    }
    if let Some(&count) = memo.get(&(dd, vars)) {
      return count;
    }
    let var = self.var(dd);
    let first = self.set_first(vars);
    let count = if first < var {
      2.0 * self.satcount_rec(dd, self.set_next(vars), memo)
    } else if first == var {
      let next = self.set_next(vars);
      self.satcount_rec(self.low(dd), next, memo) + self.satcount_rec(self.high(dd), next, memo)
    } else {
      self.satcount_rec(self.low(dd), vars, memo) + self.satcount_rec(self.high(dd), vars, memo)
    };
    memo.insert((dd, vars), count);
    count
  }

  pub fn nodecount(&self, dd: Dd) -> usize {
    let mut seen = HashSet::new();
    let mut stack = vec![dd];
    while let Some(dd) = stack.pop() {
      if self.is_leaf(dd) || !seen.insert(dd) {
        continue;
      }
      stack.push(self.low(dd));
      stack.push(self.high(dd));
    }
    seen.len()
  }

  /// Every assignment to `vars` on which `dd` is defined, paired with what is
  /// left of `dd` below the last variable of `vars`.
  pub fn enumerate(&self, dd: Dd, vars: Dd) -> Vec<(Vec<bool>, Dd)> {
    let vars = self.set_vars(vars);
    let mut result = Vec::new();
    let mut trace = Vec::with_capacity(vars.len());
    self.enumerate_rec(dd, &vars, &mut trace, &mut result);
    result
  }

  fn enumerate_rec(&self, dd: Dd, vars: &[Var], trace: &mut Vec<bool>, result: &mut Vec<(Vec<bool>, Dd)>) {
    if dd.is_false() {
      return;
    }
    let Some((&first, rest)) = vars.split_first() else {
      result.push((trace.clone(), dd));
      return;
    };
    let var = self.var(dd);
    if var < first {
      self.enumerate_rec(self.low(dd), vars, trace, result);
      self.enumerate_rec(self.high(dd), vars, trace, result);
      return;
    }
    let (low, high) = self.cofactors(dd, first);
    for (value, child) in [(false, low), (true, high)] {
      trace.push(value);
      self.enumerate_rec(child, rest, trace, result);
      trace.pop();
    }
  }

  /// Follows `assignment` down to a terminal.
  pub fn eval(&self, mut dd: Dd, assignment: impl Fn(Var) -> bool) -> Dd {
    while !self.is_leaf(dd) {
      dd = if assignment(self.var(dd)) { self.high(dd) } else { self.low(dd) };
    }
    dd
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use ordered_float::OrderedFloat;

  #[test]
  fn counting_and_enumeration() {
    let manager = Manager::<OrderedFloat<f64>>::new(12);
    let ctx = manager.ctx();
    let x = ctx.ithvar(0).unwrap();
    let vars = ctx.set([0, 2]).unwrap();
    assert_eq!(ctx.satcount(x, vars), 2.0);
    assert_eq!(ctx.nodecount(x), 1);
    let assignments = ctx.enumerate(x, vars);
    assert_eq!(assignments, vec![(vec![true, false], Dd::TRUE), (vec![true, true], Dd::TRUE)]);
    assert_eq!(ctx.eval(x, |var| var == 0), Dd::TRUE);
    assert_eq!(ctx.eval(x, |_| false), Dd::FALSE);
  }
}
