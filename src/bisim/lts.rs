use super::*;
use crate::system::Lts;

fn statistics<L: Leaf>(ctx: &Ctx<L>, lts: &Lts, relations: &[Root]) -> Result<()> {
  let sta = lts.domain.sta_vars(ctx)?;
  let transitions = relations.iter().map(|relation| ctx.satcount(relation.get(), sta)).sum::<f64>();
  info!("Number of transition relations: {}.", relations.len());
  info!("Number of transitions: {} transitions.", transitions);
  Ok(())
}

pub fn min_lts_strong<L: Leaf>(manager: &Manager<L>, lts: &Lts, config: &Config) -> Result<Outcome> {
  let mut refiner = Refiner::new(manager, config, lts.domain, lts.states.get(), &lts.partition)?;
  let relations = {
    let ctx = manager.ctx();
    let relations = prepare_relations(&ctx, &lts.domain, &lts.relations, config.merge_relations)?;
    statistics(&ctx, lts, &relations)?;
    relations
  };

  let mut old = 0;
  while refiner.blocks() != old {
    old = refiner.blocks();
    let signature = manager.step(|ctx| {
      let relations = relations.iter().map(Root::get).collect::<Vec<_>>();
      sig_strong(ctx, &relations, refiner.partition(), refiner.t_vars())
    })?;
    refiner.refine(signature)?;
    refiner.finish_iteration("");
  }
  Ok(refiner.finish())
}

/// Branching bisimulation. Per iteration the tau steps inside a block are
/// inert: they are removed from the one-step signature, and every state
/// inherits the signatures of the states it reaches by inert steps.
pub fn min_lts_branching<L: Leaf>(manager: &Manager<L>, lts: &Lts, config: &Config) -> Result<Outcome> {
  let mut refiner = Refiner::new(manager, config, lts.domain, lts.states.get(), &lts.partition)?;
  let (relations, taus) = {
    let ctx = manager.ctx();
    let relations = prepare_relations(&ctx, &lts.domain, &lts.relations, config.merge_relations)?;
    statistics(&ctx, lts, &relations)?;
    info!("Precomputing tau transitions for branching bisimulation.");
    let taus = relations
      .iter()
      .map(|relation| Ok(ctx.protect(ctx.and(relation.get(), lts.tau.get())?)))
      .collect::<Result<Vec<_>>>()?;
    (relations, taus)
  };

  let mut old = 0;
  while refiner.blocks() != old {
    old = refiner.blocks();
    let partition = refiner.partition();
    let st = refiner.st_vars();
    let inert = manager.steps(|ctx| taus.iter().map(|tau| ctx.inert(tau.get(), partition, partition, st)).collect())?;
    let signature = manager.step(|ctx| {
      let non_inert = relations
        .iter()
        .zip(&inert)
        .map(|(relation, inert)| ctx.and(relation.get(), ctx.not(inert.get())?))
        .collect::<Result<Vec<_>>>()?;
      sig_strong(ctx, &non_inert, partition, refiner.t_vars())
    })?;
    let inert = manager.steps(|ctx| inert.iter().map(|inert| ctx.exists(inert.get(), refiner.a_vars())).collect())?;
    let signature = close_signature(manager, config.closure, &inert, signature, refiner.domain(), st)?;
    refiner.refine(signature)?;
    refiner.finish_iteration("");
  }
  Ok(refiner.finish())
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::system::ExplicitModel;
  use ordered_float::OrderedFloat;

  fn lts(transitions: Vec<(u64, usize, u64)>, states: u64) -> ExplicitModel {
    ExplicitModel {
      states,
      initial: vec![0],
      actions: vec!["tau".into(), "a".into(), "b".into()],
      tau: Some(0),
      transitions,
      ..ExplicitModel::default()
    }
  }

  #[test]
  fn strong_separates_labels() {
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let model = lts(vec![(0, 1, 1), (1, 1, 0), (2, 2, 2)], 3);
    let System::Lts(system) = model.build(&manager, Default::default()).unwrap() else { panic!("expected an LTS") };
    let outcome = min_lts_strong(&manager, &system, &Config::default()).unwrap();
    assert_eq!(outcome.blocks, 2);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.history, vec![2, 2]);
  }

  #[test]
  fn endless_steps_are_all_alike() {
    // every state can do `a` forever
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let model = lts(vec![(0, 1, 1), (1, 1, 0), (2, 1, 2)], 3);
    let System::Lts(system) = model.build(&manager, Default::default()).unwrap() else { panic!("expected an LTS") };
    let outcome = min_lts_strong(&manager, &system, &Config::default()).unwrap();
    assert_eq!(outcome.blocks, 1);
    assert_eq!(outcome.iterations, 1);
  }

  #[test]
  fn branching_skips_inert_tau() {
    // 0 -tau-> 1 -a-> 2 and 3 -a-> 2: 0, 1 and 3 are branching bisimilar
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let model = lts(vec![(0, 0, 1), (1, 1, 2), (3, 1, 2)], 4);
    let System::Lts(system) = model.build(&manager, Default::default()).unwrap() else { panic!("expected an LTS") };
    let strong = min_lts_strong(&manager, &system, &Config::default()).unwrap();
    assert_eq!(strong.blocks, 3);
    for closure in [Closure::Fixpoint, Closure::Squaring, Closure::Recursive] {
      let config = Config { bisimulation: Bisimulation::Branching, closure, ..Config::default() }.normalized();
      let branching = min_lts_branching(&manager, &system, &config).unwrap();
      assert_eq!(branching.blocks, 2);
    }
  }
}
