use super::*;
use crate::dd::Fold;
use crate::system::Ctmc;

/// Lumping of a CTMC: the signature of a state is its summed rate into
/// every block.
pub fn min_ctmc_strong<L: Leaf>(manager: &Manager<L>, ctmc: &Ctmc, config: &Config) -> Result<Outcome> {
  let mut refiner = Refiner::new(manager, config, ctmc.domain, ctmc.states.get(), &ctmc.partition)?;
  {
    let ctx = manager.ctx();
    info!("Leaf type: {}.", L::NAME);
    info!("Number of Markovian transitions: {}.", ctx.satcount(ctmc.rates.get(), refiner.st_vars()));
    debug!("Transition relation: {} nodes.", ctx.nodecount(ctmc.rates.get()));
  }

  let mut old = 0;
  while refiner.blocks() != old {
    old = refiner.blocks();
    let signature =
      manager.step(|ctx| ctx.and_abstract(ctmc.rates.get(), refiner.partition(), refiner.t_vars(), Fold::Plus))?;
    refiner.refine(signature)?;
    refiner.finish_iteration("");
  }
  Ok(refiner.finish())
}
