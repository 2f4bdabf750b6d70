use super::*;
use crate::dd::Fold;

/// Applies the partition to source and target separately: each side is
/// conjoined with the partition, abstracted and renamed in its own step.
pub struct ComposeTwice;

impl QuotientBuilder for ComposeTwice {
  fn encode<L: Leaf>(ctx: &Ctx<L>, _domain: &Domain, outcome: &Outcome) -> Result<(Dd, BlockEncoding)> {
    trimmed(ctx, outcome)
  }

  fn state_space<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, _states: Dd) -> Result<Dd> {
    numbered_states(ctx, translation)
  }

  fn states<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, set: Dd) -> Result<Dd> {
    let by_source = ctx.swap_prime(translation.partition.get())?;
    let blocks = ctx.and_exists(set, by_source, translation.s_vars.get())?;
    ctx.compose(blocks, &translation.to_s)
  }

  fn transitions<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, relation: Dd, tau: Dd) -> Result<Dd> {
    let partition = translation.partition.get();
    let targets = ctx.and_exists(relation, partition, translation.t_vars.get())?;
    let targets = ctx.compose(targets, &translation.to_t)?;
    let by_source = ctx.swap_prime(partition)?;
    let blocks = ctx.and_exists(targets, by_source, translation.s_vars.get())?;
    let quotient = ctx.compose(blocks, &translation.to_s)?;
    if !translation.drop_inert || tau.is_false() {
      return Ok(quotient);
    }
    let inert = ctx.and(translation.target.full_identity(ctx)?, tau)?;
    ctx.and(quotient, ctx.not(inert)?)
  }

  fn rates<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, rates: Dd) -> Result<Dd> {
    let partition = translation.partition.get();
    let targets = ctx.and_abstract(rates, partition, translation.t_vars.get(), Fold::Plus)?;
    let targets = ctx.compose(targets, &translation.to_t)?;
    let by_source = ctx.swap_prime(partition)?;
    let blocks = ctx.and_abstract(targets, by_source, translation.s_vars.get(), Fold::Max)?;
    ctx.compose(blocks, &translation.to_s)
  }
}
