use super::*;
use crate::dd::Fold;
use crate::system::Imc;

/// Relations, tau steps and the Markovian part after the maximal-progress
/// cut, all pinned for the whole run.
struct Prepared {
  interactive: Root,
  tau: Root,
  markov: Root,
}

fn prepare<L: Leaf>(manager: &Manager<L>, imc: &Imc, refiner: &Refiner<L>) -> Result<Prepared> {
  let ctx = manager.ctx();
  let relations = prepare_relations(&ctx, &imc.domain, &imc.relations, true)?;
  let interactive = relations.first().map_or(Dd::FALSE, Root::get);
  let sta = imc.domain.sta_vars(&ctx)?;
  info!("Leaf type: {}.", L::NAME);
  info!("Number of Markovian transitions: {}.", ctx.satcount(imc.rates.get(), refiner.st_vars()));
  info!("Number of interactive transitions: {}.", ctx.satcount(interactive, sta));

  let tau = ctx.and(interactive, imc.tau.get())?;
  info!("Number of tau transitions: {}.", ctx.satcount(tau, sta));
  let tau_states = ctx.exists(tau, refiner.ta_vars())?;

  // missing rates become zero, so that only tau states end up undefined
  let markov = ctx.max(imc.rates.get(), ctx.leaf(L::zero())?)?;
  info!("Computing maximal-progress cut.");
  let markov = ctx.times(markov, ctx.not(tau_states)?)?;
  debug!("Markovian transition relation after the cut: {} nodes.", ctx.nodecount(markov));
  Ok(Prepared { interactive: ctx.protect(interactive), tau: ctx.protect(tau), markov: ctx.protect(markov) })
}

/// Strong bisimulation of an IMC. Every iteration refines first by the
/// Markovian signature and then by the interactive one; the run stops early
/// once a Markovian half leaves the block count where the previous one left
/// it.
pub fn min_imc_strong<L: Leaf>(manager: &Manager<L>, imc: &Imc, config: &Config) -> Result<Outcome> {
  let mut refiner = Refiner::new(manager, config, imc.domain, imc.states.get(), &imc.partition)?;
  let prepared = prepare(manager, imc, &refiner)?;

  let (mut old, mut old_markov) = (0, 0);
  while refiner.blocks() != old {
    old = refiner.blocks();
    let signature =
      manager.step(|ctx| ctx.and_abstract(prepared.markov.get(), refiner.partition(), refiner.t_vars(), Fold::Plus))?;
    let blocks = refiner.refine(signature)?;
    debug!("After the Markovian half: {} blocks.", blocks);
    if blocks == old_markov {
      refiner.finish_iteration("-a");
      break;
    }
    old_markov = blocks;
    let signature = manager.step(|ctx| ctx.and_exists(prepared.interactive.get(), refiner.partition(), refiner.t_vars()))?;
    refiner.refine(signature)?;
    refiner.finish_iteration("");
  }
  Ok(refiner.finish())
}

/// Branching bisimulation of an IMC. The Markovian half closes the rate
/// signature over reflexive inert tau steps, merging what different paths
/// reach; the interactive half is the branching signature of the
/// interactive part.
pub fn min_imc_branching<L: Leaf>(manager: &Manager<L>, imc: &Imc, config: &Config) -> Result<Outcome> {
  let mut refiner = Refiner::new(manager, config, imc.domain, imc.states.get(), &imc.partition)?;
  let prepared = prepare(manager, imc, &refiner)?;
  let reflexive = manager.step(|ctx| ctx.or(prepared.tau.get(), imc.domain.full_identity(ctx)?))?;

  let (mut old, mut old_markov) = (0, 0);
  while refiner.blocks() != old {
    old = refiner.blocks();
    let partition = refiner.partition();
    let st = refiner.st_vars();
    let signature = manager.step(|ctx| ctx.and_abstract(prepared.markov.get(), partition, refiner.t_vars(), Fold::Plus))?;
    let inert = manager.step(|ctx| ctx.exists(ctx.inert(reflexive.get(), partition, partition, st)?, refiner.a_vars()))?;
    let signature = close_signature_equi(manager, config.closure, inert, signature, st)?;
    let blocks = refiner.refine(signature)?;
    debug!("After the Markovian half: {} blocks.", blocks);
    if blocks == old_markov {
      refiner.finish_iteration("-a");
      break;
    }
    old_markov = blocks;
    let partition = refiner.partition();
    let st = refiner.st_vars();
    let inert = manager.step(|ctx| ctx.inert(prepared.tau.get(), partition, partition, st))?;
    let signature = manager.step(|ctx| {
      let non_inert = ctx.and(prepared.interactive.get(), ctx.not(inert.get())?)?;
      ctx.and_exists(non_inert, partition, refiner.t_vars())
    })?;
    let inert = manager.step(|ctx| ctx.exists(inert.get(), refiner.a_vars()))?;
    let signature = close_signature(manager, config.closure, &[inert], signature, refiner.domain(), st)?;
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

  fn imc(transitions: Vec<(u64, usize, u64)>, rates: Vec<(u64, f64, u64)>, states: u64) -> ExplicitModel {
    ExplicitModel {
      states,
      initial: vec![0],
      actions: vec!["tau".into(), "a".into()],
      tau: Some(0),
      transitions,
      rates,
      ..ExplicitModel::default()
    }
  }

  #[test]
  fn tau_cuts_rates() {
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let model = imc(vec![(0, 0, 1)], vec![(0, 3.0, 1)], 2);
    let System::Imc(system) = model.build(&manager, Default::default()).unwrap() else { panic!("expected an IMC") };
    let config = Config::default();
    let refiner = Refiner::new(&manager, &config, system.domain, system.states.get(), &[]).unwrap();
    let prepared = prepare(&manager, &system, &refiner).unwrap();
    let ctx = manager.ctx();
    let from_zero = ctx.restrict(prepared.markov.get(), system.domain.state(&ctx, 0, false).unwrap()).unwrap();
    assert!(from_zero.is_false());
    let from_one = ctx.restrict(prepared.markov.get(), system.domain.state(&ctx, 1, false).unwrap()).unwrap();
    assert_eq!(from_one, ctx.leaf(OrderedFloat(0.0)).unwrap());
  }

  #[test]
  fn strong_and_branching() {
    // 0 -tau-> 1, 1 and 2 race at the same rate into 3
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let model = imc(vec![(0, 0, 1)], vec![(1, 1.0, 3), (2, 1.0, 3), (0, 5.0, 3)], 4);
    let System::Imc(system) = model.build(&manager, Default::default()).unwrap() else { panic!("expected an IMC") };
    let strong = min_imc_strong(&manager, &system, &Config::default()).unwrap();
    assert_eq!(strong.blocks, 3);
    for closure in [Closure::Fixpoint, Closure::Squaring, Closure::Recursive] {
      let config = Config { bisimulation: Bisimulation::Branching, closure, ..Config::default() }.normalized();
      let branching = min_imc_branching(&manager, &system, &config).unwrap();
      assert_eq!(branching.blocks, 2);
    }
  }
}
