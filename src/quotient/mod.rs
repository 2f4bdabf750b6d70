//! Construction of the minimized system from a final partition.
//!
//! Each builder turns the states of the input into block states of a new
//! system. The builders differ in how the partition is applied; all of them
//! produce the same system up to the numbering of its states.

mod compose;
mod fused;
mod representative;

pub use compose::*;
pub use fused::*;
pub use representative::*;

use crate::bisim::{big_union, Outcome};
use crate::blocks::BlockEncoding;
use crate::config::{Bisimulation, Config, QuotientKind};
use crate::dd::{Ctx, Dd, Leaf, Manager, Root, VarMap};
use crate::error::Result;
use crate::system::{Ctmc, Domain, Imc, Lts, Relation, System};
use log::info;

/// A partition prepared for one quotient, with the variables both the
/// input and the quotient range over.
pub struct Translation {
  /// Partition over next-state and block variables.
  pub partition: Root,
  pub encoding: BlockEncoding,
  pub blocks: u64,
  pub target: Domain,
  pub s_vars: Root,
  pub t_vars: Root,
  pub st_vars: Root,
  /// Renames block bits to quotient states (primed bits to next states).
  pub to_s: VarMap,
  /// Renames block bits to quotient next states.
  pub to_t: VarMap,
  /// Tau steps inside one block are dropped from the quotient.
  pub drop_inert: bool,
}

pub trait QuotientBuilder {
  /// Partition and encoding the quotient is expressed in, from the final
  /// partition of a run.
  fn encode<L: Leaf>(ctx: &Ctx<L>, domain: &Domain, outcome: &Outcome) -> Result<(Dd, BlockEncoding)>;

  /// State space of the quotient; `states` is the state space of the input.
  fn state_space<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, states: Dd) -> Result<Dd>;

  /// Quotient of a set of states.
  fn states<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, set: Dd) -> Result<Dd>;

  /// Quotient of a transition relation over the whole source domain. `tau`
  /// is the cube of the silent action.
  fn transitions<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, relation: Dd, tau: Dd) -> Result<Dd>;

  /// Quotient of a rate function. States of one block have equal summed
  /// rates into every block, so taking any of them gives the block's rate.
  fn rates<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, rates: Dd) -> Result<Dd>;

  fn translation<L: Leaf>(manager: &Manager<L>, domain: &Domain, outcome: &Outcome, config: &Config) -> Result<Translation> {
    let ctx = manager.ctx();
    let (partition, encoding) = Self::encode(&ctx, domain, outcome)?;
    let target = Domain::new(encoding.width, domain.action_bits, domain.ordering);
    Ok(Translation {
      partition: ctx.protect(partition),
      encoding,
      blocks: outcome.blocks,
      target,
      s_vars: ctx.protect(domain.s_vars(&ctx)?),
      t_vars: ctx.protect(domain.t_vars(&ctx)?),
      st_vars: ctx.protect(domain.st_vars(&ctx)?),
      to_s: encoding.to_states(manager),
      to_t: encoding.to_next_states(manager),
      drop_inert: config.bisimulation == Bisimulation::Branching,
    })
  }

  fn lts<L: Leaf>(manager: &Manager<L>, lts: &Lts, outcome: &Outcome, config: &Config) -> Result<Lts> {
    let translation = Self::translation(manager, &lts.domain, outcome, config)?;
    let ctx = manager.ctx();
    let (states, initial, partition) =
      common::<Self, L>(&ctx, &translation, lts.states.get(), lts.initial.get(), &lts.partition)?;
    let relations = lts
      .relations
      .iter()
      .map(|relation| {
        let extended = relation.extended(&ctx, &lts.domain)?;
        let quotient = Self::transitions(&ctx, &translation, extended, lts.tau.get())?;
        Relation::localized(&ctx, &translation.target, quotient)
      })
      .collect::<Result<Vec<_>>>()?;
    let quotient = Lts { domain: translation.target, states, initial, relations, tau: lts.tau.clone(), partition };
    statistics(&ctx, &System::Lts(quotient.clone()))?;
    Ok(quotient)
  }

  fn ctmc<L: Leaf>(manager: &Manager<L>, ctmc: &Ctmc, outcome: &Outcome, config: &Config) -> Result<Ctmc> {
    let translation = Self::translation(manager, &ctmc.domain, outcome, config)?;
    let ctx = manager.ctx();
    let (states, initial, partition) =
      common::<Self, L>(&ctx, &translation, ctmc.states.get(), ctmc.initial.get(), &ctmc.partition)?;
    let rates = ctx.protect(Self::rates(&ctx, &translation, ctmc.rates.get())?);
    let quotient = Ctmc { domain: translation.target, states, initial, rates, partition };
    statistics(&ctx, &System::Ctmc(quotient.clone()))?;
    Ok(quotient)
  }

  /// Rates of tau states are cut before the quotient is taken, the same
  /// cut the refinement works with.
  fn imc<L: Leaf>(manager: &Manager<L>, imc: &Imc, outcome: &Outcome, config: &Config) -> Result<Imc> {
    let translation = Self::translation(manager, &imc.domain, outcome, config)?;
    let ctx = manager.ctx();
    let (states, initial, partition) =
      common::<Self, L>(&ctx, &translation, imc.states.get(), imc.initial.get(), &imc.partition)?;
    let extended = imc.relations.iter().map(|relation| relation.extended(&ctx, &imc.domain)).collect::<Result<Vec<_>>>()?;
    let interactive = big_union(&ctx, &extended)?;
    let tau_states = ctx.exists(ctx.and(interactive, imc.tau.get())?, imc.domain.ta_vars(&ctx)?)?;
    let markov = ctx.times(imc.rates.get(), ctx.not(tau_states)?)?;

    let relations = extended
      .into_iter()
      .map(|relation| {
        let quotient = Self::transitions(&ctx, &translation, relation, imc.tau.get())?;
        Relation::localized(&ctx, &translation.target, quotient)
      })
      .collect::<Result<Vec<_>>>()?;
    let rates = ctx.protect(Self::rates(&ctx, &translation, markov)?);
    let quotient = Imc { domain: translation.target, states, initial, relations, tau: imc.tau.clone(), rates, partition };
    statistics(&ctx, &System::Imc(quotient.clone()))?;
    Ok(quotient)
  }

  fn system<L: Leaf>(manager: &Manager<L>, system: &System, outcome: &Outcome, config: &Config) -> Result<System> {
    info!("Computing the quotient.");
    Ok(match system {
      System::Lts(lts) => System::Lts(Self::lts(manager, lts, outcome, config)?),
      System::Ctmc(ctmc) => System::Ctmc(Self::ctmc(manager, ctmc, outcome, config)?),
      System::Imc(imc) => System::Imc(Self::imc(manager, imc, outcome, config)?),
    })
  }
}

/// Builds the quotient with the configured builder.
pub fn quotient<L: Leaf>(manager: &Manager<L>, system: &System, outcome: &Outcome, config: &Config) -> Result<System> {
  match config.quotient {
    QuotientKind::ComposeTwice => ComposeTwice::system(manager, system, outcome, config),
    QuotientKind::Fused => Fused::system(manager, system, outcome, config),
    QuotientKind::Representative => Representative::system(manager, system, outcome, config),
  }
}

/// The final partition narrowed to the bits the block count needs.
pub fn trimmed<L: Leaf>(ctx: &Ctx<L>, outcome: &Outcome) -> Result<(Dd, BlockEncoding)> {
  let width = (64 - outcome.blocks.leading_zeros()).max(1);
  let encoding = outcome.encoding;
  let high = (width..encoding.width).map(|bit| (encoding.var(bit), false)).collect::<Vec<_>>();
  let partition = ctx.restrict(outcome.partition.get(), ctx.cube(&high)?)?;
  Ok((partition, encoding.narrowed(width)))
}

/// The states `1..=blocks` of the quotient domain, one per block.
pub fn numbered_states<L: Leaf>(ctx: &Ctx<L>, translation: &Translation) -> Result<Dd> {
  let target = &translation.target;
  let below = target.codes_below(ctx, translation.blocks + 1)?;
  ctx.and(below, ctx.not(target.state(ctx, 0, false)?)?)
}

/// State space, initial states and initial blocks of a quotient.
fn common<B: QuotientBuilder + ?Sized, L: Leaf>(
  ctx: &Ctx<L>,
  translation: &Translation,
  states: Dd,
  initial: Dd,
  sets: &[Root],
) -> Result<(Root, Root, Vec<Root>)> {
  let space = B::state_space(ctx, translation, states)?;
  let initial = B::states(ctx, translation, initial)?;
  let partition = match sets {
    [] => Vec::new(),
    [_] => vec![ctx.protect(space)],
    [first, _] => {
      let first = B::states(ctx, translation, first.get())?;
      let second = ctx.and(space, ctx.not(first)?)?;
      vec![ctx.protect(first), ctx.protect(second)]
    }
    sets => sets.iter().map(|set| Ok(ctx.protect(B::states(ctx, translation, set.get())?))).collect::<Result<_>>()?,
  };
  Ok((ctx.protect(space), ctx.protect(initial), partition))
}

fn statistics<L: Leaf>(ctx: &Ctx<L>, system: &System) -> Result<()> {
  let domain = system.domain();
  info!("Number of states after bisimulation minimisation: {}.", ctx.satcount(system.states(), domain.s_vars(ctx)?));
  match system {
    System::Lts(Lts { relations, .. }) | System::Imc(Imc { relations, .. }) => {
      let sta = domain.sta_vars(ctx)?;
      let mut transitions = 0.0;
      for relation in relations {
        transitions += ctx.satcount(relation.extended(ctx, &domain)?, sta);
      }
      info!("Number of transitions after bisimulation minimisation: {}.", transitions);
    }
    System::Ctmc(_) => {}
  }
  match system {
    System::Ctmc(Ctmc { rates, .. }) | System::Imc(Imc { rates, .. }) => {
      let st = domain.st_vars(ctx)?;
      info!("Number of Markovian transitions after bisimulation minimisation: {}.", ctx.satcount(rates.get(), st));
    }
    System::Lts(_) => {}
  }
  Ok(())
}
