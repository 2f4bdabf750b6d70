use super::*;
use crate::dd::Fold;

/// Replaces source and target states by their blocks in a single walk
/// over the relation and the partition.
pub struct Fused;

impl QuotientBuilder for Fused {
  fn encode<L: Leaf>(ctx: &Ctx<L>, _domain: &Domain, outcome: &Outcome) -> Result<(Dd, BlockEncoding)> {
    trimmed(ctx, outcome)
  }

  fn state_space<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, _states: Dd) -> Result<Dd> {
    numbered_states(ctx, translation)
  }

  fn states<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, set: Dd) -> Result<Dd> {
    ctx.states_quotient(set, translation.partition.get(), translation.s_vars.get(), &translation.to_s)
  }

  fn transitions<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, relation: Dd, tau: Dd) -> Result<Dd> {
    let partition = translation.partition.get();
    let tau = if translation.drop_inert { tau } else { Dd::FALSE };
    ctx.trans_quotient(relation, partition, partition, translation.st_vars.get(), tau)
  }

  fn rates<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, rates: Dd) -> Result<Dd> {
    let partition = translation.partition.get();
    let targets = ctx.and_abstract(rates, partition, translation.t_vars.get(), Fold::Plus)?;
    ctx.markov_quotient(targets, partition, translation.s_vars.get(), &translation.to_t, &translation.to_s)
  }
}
