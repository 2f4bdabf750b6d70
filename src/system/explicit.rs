use super::*;
use crate::config::VariableOrdering;
use crate::dd::Manager;
use crate::error::Error;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Explicitly enumerated system, the exchange format of the binary.
///
/// Which kind of system it describes follows from the edges present: rated
/// edges only make a CTMC, labelled edges only an LTS, and both an IMC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplicitModel {
  pub states: u64,
  pub initial: Vec<u64>,
  pub actions: Vec<String>,
  /// Index of the silent action in `actions`.
  pub tau: Option<usize>,
  pub transitions: Vec<(u64, usize, u64)>,
  pub rates: Vec<(u64, f64, u64)>,
  /// Initial blocks; empty means a single block of all states.
  pub partition: Vec<Vec<u64>>,
  /// Keep one transition relation per action label instead of one for all.
  pub split_by_label: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
  Lts,
  Ctmc,
  Imc,
}

/// Number of bits needed to number `count` things; at least one.
pub fn bits_for(count: u64) -> u32 {
  if count <= 1 {
    1
  } else {
    64 - (count - 1).leading_zeros()
  }
}

impl ExplicitModel {
  pub fn kind(&self) -> ModelKind {
    let interactive = !self.transitions.is_empty() || !self.actions.is_empty();
    match (interactive, self.rates.is_empty()) {
      (_, true) => ModelKind::Lts,
      (false, false) => ModelKind::Ctmc,
      (true, false) => ModelKind::Imc,
    }
  }

  fn validate(&self) -> Result<()> {
    let states = self.states;
    let in_range = |state: &u64| *state < states;
    if !self.transitions.iter().all(|(from, action, to)| in_range(from) && in_range(to) && *action < self.actions.len())
    {
      return Err(Error::Unsupported("transition outside the model"));
    }
    if !self.rates.iter().all(|(from, rate, to)| in_range(from) && in_range(to) && rate.is_finite() && *rate >= 0.0) {
      return Err(Error::Unsupported("rate outside the model"));
    }
    if self.tau.is_some_and(|tau| tau >= self.actions.len()) {
      return Err(Error::Unsupported("silent action outside the model"));
    }
    Ok(())
  }

  /// Encodes the model symbolically.
  pub fn build<L: Leaf>(&self, manager: &Manager<L>, ordering: VariableOrdering) -> Result<System> {
    self.validate()?;
    let kind = self.kind();
    let action_bits = if kind == ModelKind::Ctmc { 0 } else { bits_for(self.actions.len() as u64) };
    let domain = Domain::new(bits_for(self.states), action_bits, ordering);
    let states = manager.step(|ctx| domain.codes_below(ctx, self.states))?;
    // states past the model stay in the sets and get no block; codes that do
    // not fit the state bits would alias real states
    let encodable = |set: &[u64]| {
      let codes = set.iter().copied().filter(|state| state.checked_shr(domain.state_bits).unwrap_or(0) == 0).collect::<Vec<_>>();
      combine(manager, &codes, |ctx, &state| domain.state(ctx, state, false), |ctx, a, b| ctx.or(a, b))
    };
    let initial = encodable(self.initial.as_slice())?;
    let partition = self.partition.iter().map(|set| encodable(set.as_slice())).collect::<Result<Vec<_>>>()?;
    let tau = manager.step(|ctx| match self.tau {
      Some(tau) => domain.action_cube(ctx, tau as u64),
      None => Ok(Dd::FALSE),
    })?;

    let mut groups = BTreeMap::<usize, Vec<(u64, usize, u64)>>::new();
    for &(from, action, to) in &self.transitions {
      let group = if self.split_by_label { action } else { 0 };
      groups.entry(group).or_default().push((from, action, to));
    }
    let relations = groups
      .into_values()
      .map(|edges| {
        let relation = combine(
          manager,
          &edges,
          |ctx, &(from, action, to)| {
            let step = ctx.and(domain.state(ctx, from, false)?, domain.state(ctx, to, true)?)?;
            ctx.and(step, domain.action_cube(ctx, action as u64)?)
          },
          |ctx, a, b| ctx.or(a, b),
        )?;
        let ctx = manager.ctx();
        let relation = Relation::localized(&ctx, &domain, relation.get())?;
        Ok(relation)
      })
      .collect::<Result<Vec<_>>>()?;

    let rated = self
      .rates
      .iter()
      .map(|&(from, rate, to)| Ok((from, L::from_f64(rate).ok_or(Error::Unsupported("rate not representable"))?, to)))
      .collect::<Result<Vec<_>>>()?;
    let rates = combine(
      manager,
      &rated,
      |ctx, (from, value, to)| {
        let step = ctx.and(domain.state(ctx, *from, false)?, domain.state(ctx, *to, true)?)?;
        ctx.times(step, ctx.leaf(value.clone())?)
      },
      |ctx, a, b| ctx.plus(a, b),
    )?;

    info!(
      "Model with {} states, {} actions, {} transitions and {} rates.",
      self.states,
      self.actions.len(),
      self.transitions.len(),
      self.rates.len()
    );
    Ok(match kind {
      ModelKind::Lts => System::Lts(Lts { domain, states, initial, relations, tau, partition }),
      ModelKind::Ctmc => System::Ctmc(Ctmc { domain, states, initial, rates, partition }),
      ModelKind::Imc => System::Imc(Imc { domain, states, initial, relations, tau, rates, partition }),
    })
  }

  /// Enumerates a symbolic system again, numbering its states densely in
  /// the order of their codes. Labels are taken from `template`.
  pub fn extract<L: Leaf>(manager: &Manager<L>, system: &System, template: &ExplicitModel) -> Result<ExplicitModel> {
    let ctx = manager.ctx();
    let domain = system.domain();
    let s_vars = domain.s_vars(&ctx)?;
    let codes = state_codes(&ctx, system.states(), s_vars);
    let index = codes.iter().enumerate().map(|(index, &code)| (code, index as u64)).collect::<HashMap<_, _>>();
    let mut initial = state_codes(&ctx, system.initial(), s_vars)
      .into_iter()
      .filter_map(|code| index.get(&code).copied())
      .collect::<Vec<_>>();
    initial.sort_unstable();
    let partition = system
      .partition()
      .iter()
      .map(|set| state_codes(&ctx, set.get(), s_vars).into_iter().filter_map(|code| index.get(&code).copied()).collect())
      .collect();

    let relations = match system {
      System::Lts(lts) => &lts.relations[..],
      System::Imc(imc) => &imc.relations[..],
      System::Ctmc(_) => &[],
    };
    let sta_vars = domain.sta_vars(&ctx)?;
    let vars = ctx.set_vars(sta_vars);
    let mut transitions = BTreeSet::new();
    for relation in relations {
      let relation = relation.extended(&ctx, &domain)?;
      for (assignment, _) in ctx.enumerate(relation, sta_vars) {
        let (from, to, action) = decode(&domain, &vars, &assignment);
        if let (Some(&from), Some(&to)) = (index.get(&from), index.get(&to)) {
          transitions.insert((from, action as usize, to));
        }
      }
    }

    let rates = match system {
      System::Ctmc(ctmc) => Some(ctmc.rates.get()),
      System::Imc(imc) => Some(imc.rates.get()),
      System::Lts(_) => None,
    };
    let mut rated = Vec::new();
    if let Some(rates) = rates {
      let st_vars = domain.st_vars(&ctx)?;
      let vars = ctx.set_vars(st_vars);
      for (assignment, leaf) in ctx.enumerate(rates, st_vars) {
        let Some(value) = ctx.value(leaf).filter(|value| !value.is_zero()) else {
          continue;
        };
        let (from, to, _) = decode(&domain, &vars, &assignment);
        if let (Some(&from), Some(&to)) = (index.get(&from), index.get(&to)) {
          rated.push((from, value.to_f64(), to));
        }
      }
      rated.sort_by(|a, b| (a.0, a.2).cmp(&(b.0, b.2)));
    }

    Ok(ExplicitModel {
      states: codes.len() as u64,
      initial,
      actions: template.actions.clone(),
      tau: template.tau,
      transitions: transitions.into_iter().collect(),
      rates: rated,
      partition,
      split_by_label: template.split_by_label,
    })
  }
}

/// Codes of the states in `set`, in increasing order.
pub fn state_codes<L: Leaf>(ctx: &Ctx<L>, set: Dd, s_vars: Dd) -> Vec<u64> {
  let mut codes = ctx
    .enumerate(set, s_vars)
    .into_iter()
    .map(|(bits, _)| bits.iter().enumerate().fold(0, |code, (bit, &value)| code | (value as u64) << bit))
    .collect::<Vec<_>>();
  codes.sort_unstable();
  codes.dedup();
  codes
}

/// Source state, target state and action of one assignment to `vars`.
fn decode(domain: &Domain, vars: &[Var], assignment: &[bool]) -> (u64, u64, u64) {
  let (mut from, mut to, mut action) = (0, 0, 0);
  for (&var, &value) in vars.iter().zip(assignment) {
    if !value {
      continue;
    }
    if var < STATE_LIMIT {
      let bit = 1 << (var / 2);
      if var % 2 == 0 {
        from |= bit;
      } else {
        to |= bit;
      }
    } else {
      action |= 1 << (var - domain.action_base());
    }
  }
  (from, to, action)
}

/// Joins the diagrams made from `items`, a bounded number of items per
/// step, so that the garbage of large models is collected on the way.
fn combine<L: Leaf, T>(
  manager: &Manager<L>,
  items: &[T],
  item: impl Fn(&Ctx<L>, &T) -> Result<Dd>,
  join: impl Fn(&Ctx<L>, Dd, Dd) -> Result<Dd>,
) -> Result<Root> {
  let mut joined = manager.protect(Dd::FALSE);
  for chunk in items.chunks(64) {
    joined = manager.step(|ctx| chunk.iter().try_fold(joined.get(), |joined, next| join(ctx, joined, item(ctx, next)?)))?;
  }
  Ok(joined)
}

#[cfg(test)]
mod test {
  use super::*;
  use ordered_float::OrderedFloat;

  fn model() -> ExplicitModel {
    ExplicitModel {
      states: 5,
      initial: vec![0],
      actions: vec!["tau".into(), "a".into(), "b".into()],
      tau: Some(0),
      transitions: vec![(0, 1, 1), (1, 0, 2), (2, 2, 4), (3, 1, 3)],
      partition: vec![vec![0, 1], vec![2, 3, 4]],
      split_by_label: true,
      ..ExplicitModel::default()
    }
  }

  #[test]
  fn kinds_follow_the_edges() {
    assert_eq!(model().kind(), ModelKind::Lts);
    let ctmc = ExplicitModel { states: 2, rates: vec![(0, 1.0, 1)], ..ExplicitModel::default() };
    assert_eq!(ctmc.kind(), ModelKind::Ctmc);
    let imc = ExplicitModel { rates: vec![(0, 1.0, 1)], ..model() };
    assert_eq!(imc.kind(), ModelKind::Imc);
    assert_eq!(bits_for(5), 3);
    assert_eq!(bits_for(1), 1);
  }

  #[test]
  fn build_then_extract() {
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let model = model();
    let system = model.build(&manager, VariableOrdering::ActionsFirst).unwrap();
    let System::Lts(lts) = &system else { panic!("expected an LTS") };
    assert_eq!(lts.relations.len(), 3);
    {
      let ctx = manager.ctx();
      let s_vars = lts.domain.s_vars(&ctx).unwrap();
      assert_eq!(state_codes(&ctx, lts.states.get(), s_vars), vec![0, 1, 2, 3, 4]);
    }
    let extracted = ExplicitModel::extract(&manager, &system, &model).unwrap();
    let mut transitions = model.transitions.clone();
    transitions.sort_unstable();
    assert_eq!(extracted.transitions, transitions);
    assert_eq!(extracted.partition, model.partition);
    assert_eq!(extracted.initial, model.initial);
  }

  #[test]
  fn parallel_rates_add_up() {
    let manager = Manager::<OrderedFloat<f64>>::new(14);
    let model = ExplicitModel { states: 2, rates: vec![(0, 1.5, 1), (0, 0.5, 1), (1, 3.0, 0)], ..ExplicitModel::default() };
    let system = model.build(&manager, VariableOrdering::BlocksFirst).unwrap();
    let extracted = ExplicitModel::extract(&manager, &system, &model).unwrap();
    assert_eq!(extracted.rates, vec![(0, 2.0, 1), (1, 3.0, 0)]);
  }

  #[test]
  fn rejects_dangling_edges() {
    let manager = Manager::<OrderedFloat<f64>>::new(12);
    let model = ExplicitModel { states: 2, actions: vec!["a".into()], transitions: vec![(0, 0, 2)], ..ExplicitModel::default() };
    assert!(matches!(model.build(&manager, VariableOrdering::ActionsFirst), Err(Error::Unsupported(_))));
  }
}
