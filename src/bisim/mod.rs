//! Signature-based partition refinement.
//!
//! Every driver starts from an initial partition over next-state and block
//! variables, computes a signature per state, and lets [`Ctx::refine`] split
//! the blocks by signature until the number of blocks stops growing.

mod ctmc;
mod imc;
mod lts;

pub use ctmc::*;
pub use imc::*;
pub use lts::*;

use crate::algebra::Pass;
use crate::blocks::{BlockCounter, BlockEncoding};
use crate::config::{Bisimulation, Closure, Config};
use crate::dd::{Ctx, Dd, Leaf, Manager, Root};
use crate::error::Result;
use crate::system::{Domain, Relation, System};
use itertools::Itertools;
use log::{debug, info};

/// Result of one refinement run.
#[derive(Debug)]
pub struct Outcome {
  /// Final partition over next-state and block variables.
  pub partition: Root,
  pub encoding: BlockEncoding,
  pub blocks: u64,
  pub iterations: usize,
  /// Number of blocks after every iteration.
  pub history: Vec<u64>,
}

/// Runs the driver matching the kind of `system` and the configured
/// bisimulation.
pub fn minimize<L: Leaf>(manager: &Manager<L>, system: &System, config: &Config) -> Result<Outcome> {
  let config = config.clone().normalized();
  match (system, config.bisimulation) {
    (System::Lts(lts), Bisimulation::Strong) => min_lts_strong(manager, lts, &config),
    (System::Lts(lts), Bisimulation::Branching) => min_lts_branching(manager, lts, &config),
    (System::Ctmc(ctmc), bisimulation) => {
      if bisimulation == Bisimulation::Branching {
        info!("CTMCs have no silent steps, computing strong bisimulation.");
      }
      min_ctmc_strong(manager, ctmc, &config)
    }
    (System::Imc(imc), Bisimulation::Strong) => min_imc_strong(manager, imc, &config),
    (System::Imc(imc), Bisimulation::Branching) => min_imc_branching(manager, imc, &config),
  }
}

/// Partition and block bookkeeping shared by the drivers.
pub(crate) struct Refiner<'a, L: Leaf> {
  manager: &'a Manager<L>,
  config: &'a Config,
  domain: Domain,
  encoding: BlockEncoding,
  counter: BlockCounter,
  partition: Root,
  vars: Vars,
  states: f64,
  history: Vec<u64>,
}

struct Vars {
  s: Root,
  t: Root,
  st: Root,
  a: Root,
  ta: Root,
}

impl<'a, L: Leaf> Refiner<'a, L> {
  pub fn new(manager: &'a Manager<L>, config: &'a Config, domain: Domain, states: Dd, sets: &[Root]) -> Result<Self> {
    let width = (domain.state_bits + 1).min(config.max_block_bits);
    let encoding = domain.blocks(width);
    let counter = BlockCounter::new(encoding.limit());
    let ctx = manager.ctx();
    let partition = initial_partition(&ctx, states, sets, encoding, &counter)?;
    let vars = Vars {
      s: ctx.protect(domain.s_vars(&ctx)?),
      t: ctx.protect(domain.t_vars(&ctx)?),
      st: ctx.protect(domain.st_vars(&ctx)?),
      a: ctx.protect(domain.a_vars(&ctx)?),
      ta: ctx.protect(domain.ta_vars(&ctx)?),
    };
    let counted = ctx.and(vars.t.get(), encoding.variables(&ctx)?)?;
    let states = ctx.satcount(partition, counted);
    info!("Number of state variables: {}.", domain.state_bits);
    info!("Number of action variables: {}.", domain.action_bits);
    info!("Number of block variables: {}.", encoding.width);
    info!("Initial partition: {} states in {} block(s).", states, counter.count());
    debug!("Partition: {} nodes.", ctx.nodecount(partition));
    let partition = ctx.protect(partition);
    drop(ctx);
    Ok(Refiner { manager, config, domain, encoding, counter, partition, vars, states, history: Vec::new() })
  }

  pub fn domain(&self) -> &Domain {
    &self.domain
  }

  pub fn blocks(&self) -> u64 {
    self.counter.count()
  }

  pub fn partition(&self) -> Dd {
    self.partition.get()
  }

  pub fn t_vars(&self) -> Dd {
    self.vars.t.get()
  }

  pub fn st_vars(&self) -> Dd {
    self.vars.st.get()
  }

  pub fn a_vars(&self) -> Dd {
    self.vars.a.get()
  }

  pub fn ta_vars(&self) -> Dd {
    self.vars.ta.get()
  }

  /// Replaces the partition by the one induced by `signature` and returns
  /// the new number of blocks.
  pub fn refine(&mut self, signature: Root) -> Result<u64> {
    let ctx = self.manager.ctx();
    debug!("Signature: {} nodes.", ctx.nodecount(signature.get()));
    let next = {
      let pass = Pass::new(self.manager, self.config.table, &self.counter, self.encoding);
      ctx.refine(signature.get(), self.vars.s.get(), self.partition.get(), &pass)?
    };
    debug!("Partition: {} nodes.", ctx.nodecount(next));
    self.partition = ctx.protect(next);
    Ok(self.blocks())
  }

  /// Records the block count at the end of an iteration and collects
  /// garbage if the node table asked for it. No context may be open.
  pub fn finish_iteration(&mut self, label: &str) {
    let blocks = self.blocks();
    self.history.push(blocks);
    info!("After iteration {}{}: {} blocks.", self.history.len(), label, blocks);
    if self.manager.collect_if_wanted() {
      debug!("Nodes in table after collection: {} of {}.", self.manager.live(), self.manager.capacity());
    }
  }

  pub fn finish(self) -> Outcome {
    info!("Number of iterations: {}.", self.history.len());
    info!("Number of states before bisimulation minimisation: {}.", self.states);
    info!("Number of blocks after bisimulation minimisation: {}.", self.blocks());
    debug!("Blocks per iteration: {}.", self.history.iter().join(", "));
    Outcome {
      blocks: self.counter.count(),
      iterations: self.history.len(),
      partition: self.partition,
      encoding: self.encoding,
      history: self.history,
    }
  }
}

/// Every state set gets the next block number, restricted to the states of
/// the system and to states not taken by an earlier set. Empty sets are
/// skipped. Without sets, all states share one block.
pub fn initial_partition<L: Leaf>(
  ctx: &Ctx<L>,
  states: Dd,
  sets: &[Root],
  encoding: BlockEncoding,
  counter: &BlockCounter,
) -> Result<Dd> {
  if sets.is_empty() {
    let block = encoding.encode(ctx, counter.fresh()?)?;
    return ctx.and(ctx.swap_prime(states)?, block);
  }
  let mut covered = Dd::FALSE;
  let mut partition = Dd::FALSE;
  for set in sets {
    let members = ctx.and(ctx.and(set.get(), states)?, ctx.not(covered)?)?;
    if members.is_false() {
      continue;
    }
    covered = ctx.or(covered, members)?;
    let block = encoding.encode(ctx, counter.fresh()?)?;
    partition = ctx.or(partition, ctx.and(ctx.swap_prime(members)?, block)?)?;
  }
  Ok(partition)
}

/// The relations extended to the full domain, merged into one if asked.
pub fn prepare_relations<L: Leaf>(ctx: &Ctx<L>, domain: &Domain, relations: &[Relation], merge: bool) -> Result<Vec<Root>> {
  let extended = relations.iter().map(|relation| relation.extended(ctx, domain)).collect::<Result<Vec<_>>>()?;
  if merge && extended.len() > 1 {
    info!("Taking the union of all transition relations.");
    return Ok(vec![ctx.protect(big_union(ctx, &extended)?)]);
  }
  Ok(extended.into_iter().map(|relation| ctx.protect(relation)).collect())
}

pub fn big_union<L: Leaf>(ctx: &Ctx<L>, items: &[Dd]) -> Result<Dd> {
  match items {
    [] => Ok(Dd::FALSE),
    [item] => Ok(*item),
    _ => {
      let (left, right) = items.split_at(items.len() / 2);
      let (left, right) = ctx.fork(|| big_union(ctx, left), || big_union(ctx, right))?;
      ctx.or(left, right)
    }
  }
}

/// Union over all relations of the blocks reachable in one step, on
/// (s, a, B).
pub fn sig_strong<L: Leaf>(ctx: &Ctx<L>, relations: &[Dd], partition: Dd, t_vars: Dd) -> Result<Dd> {
  match relations {
    [] => Ok(Dd::FALSE),
    [relation] => ctx.and_exists(*relation, partition, t_vars),
    _ => {
      let (left, right) = relations.split_at(relations.len() / 2);
      let (left, right) =
        ctx.fork(|| sig_strong(ctx, left, partition, t_vars), || sig_strong(ctx, right, partition, t_vars))?;
      ctx.or(left, right)
    }
  }
}

/// Union of the predecessors of `dd` under every relation.
pub fn par_relprev<L: Leaf>(ctx: &Ctx<L>, dd: Dd, relations: &[Dd], st_vars: Dd) -> Result<Dd> {
  match relations {
    [] => Ok(Dd::FALSE),
    [relation] => ctx.relprev(*relation, dd, st_vars),
    _ => {
      let (left, right) = relations.split_at(relations.len() / 2);
      let (left, right) =
        ctx.fork(|| par_relprev(ctx, dd, left, st_vars), || par_relprev(ctx, dd, right, st_vars))?;
      ctx.or(left, right)
    }
  }
}

/// Squares a reflexive relation until it is transitive. Every squaring is
/// a step of its own, so the collector can reclaim the earlier powers.
pub fn square<L: Leaf>(manager: &Manager<L>, relation: Root, st_vars: Dd) -> Result<Root> {
  let mut relation = relation;
  let mut count = 0;
  loop {
    let next = manager.step(|ctx| ctx.relprev(relation.get(), relation.get(), st_vars))?;
    count += 1;
    if next.get() == relation.get() {
      debug!("Squaring stable after {} steps, {} nodes.", count, manager.ctx().nodecount(relation.get()));
      return Ok(relation);
    }
    relation = next;
  }
}

/// Extends `signature` backwards along inert steps: a state also gets the
/// signature of every state it reaches by inert steps.
///
/// `st_vars` must be pinned by the caller.
pub fn close_signature<L: Leaf>(
  manager: &Manager<L>,
  closure: Closure,
  inert: &[Root],
  signature: Root,
  domain: &Domain,
  st_vars: Dd,
) -> Result<Root> {
  let relations = || inert.iter().map(Root::get).collect::<Vec<_>>();
  match closure {
    Closure::Fixpoint => {
      let inert = relations();
      let mut signature = signature;
      let mut steps = 0;
      loop {
        let next = manager.step(|ctx| {
          let step = par_relprev(ctx, signature.get(), &inert, st_vars)?;
          ctx.or(signature.get(), step)
        })?;
        steps += 1;
        if next.get() == signature.get() {
          debug!("Backward reachability stable after {} steps.", steps);
          return Ok(signature);
        }
        signature = next;
      }
    }
    Closure::Squaring => {
      let reflexive = manager.step(|ctx| ctx.or(big_union(ctx, &relations())?, domain.full_identity(ctx)?))?;
      let star = square(manager, reflexive, st_vars)?;
      manager.step(|ctx| ctx.relprev(star.get(), signature.get(), st_vars))
    }
    Closure::Recursive => {
      let star = manager.step(|ctx| ctx.closure(big_union(ctx, &relations())?, st_vars))?;
      manager.step(|ctx| ctx.relprev(star.get(), signature.get(), st_vars))
    }
  }
}

/// Like [`close_signature`] for numeric signatures and a reflexive inert
/// relation: values reached along different inert paths are merged with
/// [`Ctx::equi`], disagreement becoming `TRUE`.
pub fn close_signature_equi<L: Leaf>(
  manager: &Manager<L>,
  closure: Closure,
  inert: Root,
  signature: Root,
  st_vars: Dd,
) -> Result<Root> {
  match closure {
    Closure::Fixpoint => {
      let mut signature = signature;
      loop {
        let next = manager.step(|ctx| ctx.relprev_equi(inert.get(), signature.get(), st_vars))?;
        if next.get() == signature.get() {
          return Ok(signature);
        }
        signature = next;
      }
    }
    Closure::Squaring => {
      let star = square(manager, inert, st_vars)?;
      manager.step(|ctx| ctx.relprev_equi(star.get(), signature.get(), st_vars))
    }
    Closure::Recursive => {
      let star = manager.step(|ctx| ctx.closure(inert.get(), st_vars))?;
      manager.step(|ctx| ctx.relprev_equi(star.get(), signature.get(), st_vars))
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::config::VariableOrdering;
  use ordered_float::OrderedFloat;

  #[test]
  fn initial_partition_skips_empty_sets() {
    let manager = Manager::<OrderedFloat<f64>>::new(14);
    let ctx = manager.ctx();
    let domain = Domain::new(2, 0, VariableOrdering::ActionsFirst);
    let encoding = domain.blocks(3);
    let counter = BlockCounter::new(encoding.limit());
    let states = [0, 1, 2].into_iter().fold(Dd::FALSE, |acc, s| ctx.or(acc, domain.state(&ctx, s, false).unwrap()).unwrap());
    let sets = [vec![0, 1], vec![], vec![1, 2, 3]]
      .into_iter()
      .map(|set| {
        let set = set.into_iter().fold(Dd::FALSE, |acc, s| ctx.or(acc, domain.state(&ctx, s, false).unwrap()).unwrap());
        ctx.protect(set)
      })
      .collect::<Vec<_>>();
    let partition = initial_partition(&ctx, states, &sets, encoding, &counter).unwrap();
    assert_eq!(counter.count(), 2);
    let block_of = |s: u64| encoding.decode(&ctx, ctx.restrict(partition, domain.state(&ctx, s, true).unwrap()).unwrap());
    assert_eq!(block_of(0), 1);
    assert_eq!(block_of(1), 1);
    assert_eq!(block_of(2), 2);
    assert!(ctx.restrict(partition, domain.state(&ctx, 3, true).unwrap()).unwrap().is_false());
  }

  #[test]
  fn closures_agree() {
    let manager = Manager::<OrderedFloat<f64>>::new(16);
    let domain = Domain::new(2, 0, VariableOrdering::ActionsFirst);
    let (st, inert, signature) = {
      let ctx = manager.ctx();
      let edge = |from, to| ctx.and(domain.state(&ctx, from, false).unwrap(), domain.state(&ctx, to, true).unwrap()).unwrap();
      let inert = [ctx.or(edge(0, 1), edge(1, 2)).unwrap(), edge(3, 0)].map(|relation| ctx.protect(relation));
      let signature = ctx.and(domain.state(&ctx, 2, false).unwrap(), ctx.ithvar(2_000_000).unwrap()).unwrap();
      (ctx.protect(domain.st_vars(&ctx).unwrap()), inert, ctx.protect(signature))
    };
    let results = [Closure::Fixpoint, Closure::Squaring, Closure::Recursive]
      .map(|closure| close_signature(&manager, closure, &inert, signature.clone(), &domain, st.get()).unwrap().get());
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
    let ctx = manager.ctx();
    let s_vars = domain.s_vars(&ctx).unwrap();
    assert_eq!(ctx.satcount(ctx.exists(results[0], ctx.set([2_000_000]).unwrap()).unwrap(), s_vars), 4.0);
  }

}
