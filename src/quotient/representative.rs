use super::*;
use log::debug;

/// Names every block after one of its states. The quotient keeps the
/// state variables of the input, and its states are those representatives.
pub struct Representative;

impl QuotientBuilder for Representative {
  fn encode<L: Leaf>(ctx: &Ctx<L>, domain: &Domain, outcome: &Outcome) -> Result<(Dd, BlockEncoding)> {
    let partition = outcome.partition.get();
    let representatives = ctx.pick_representatives(partition, outcome.encoding, outcome.blocks)?;
    debug!("Picked {} representatives.", representatives.len());
    let wide = domain.blocks(domain.state_bits);
    let tag = ctx.manager().fresh_tag();
    let by_state = ctx.map_blocks(partition, outcome.encoding, tag, &|ctx, block| {
      let state = block.checked_sub(1).and_then(|index| representatives.get(index as usize));
      match state {
        Some(&state) => wide.encode(ctx, state),
        None => Ok(Dd::FALSE),
      }
    })?;
    Ok((by_state, wide))
  }

  fn state_space<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, states: Dd) -> Result<Dd> {
    Fused::states(ctx, translation, states)
  }

  fn states<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, set: Dd) -> Result<Dd> {
    Fused::states(ctx, translation, set)
  }

  fn transitions<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, relation: Dd, tau: Dd) -> Result<Dd> {
    Fused::transitions(ctx, translation, relation, tau)
  }

  fn rates<L: Leaf>(ctx: &Ctx<L>, translation: &Translation, rates: Dd) -> Result<Dd> {
    Fused::rates(ctx, translation, rates)
  }
}

#[cfg(test)]
mod test {
  use super::super::test::{all_quotients, lts};
  use super::*;

  #[test]
  fn states_are_original_states() {
    let model = lts();
    let config = Config { quotient: QuotientKind::Representative, ..Config::default() };
    let manager = Manager::<ordered_float::OrderedFloat<f64>>::new(16);
    let system = model.build(&manager, config.ordering).unwrap();
    let outcome = crate::bisim::minimize(&manager, &system, &config).unwrap();
    let reduced = quotient(&manager, &system, &outcome, &config).unwrap();
    assert_eq!(reduced.domain(), system.domain());
    let ctx = manager.ctx();
    let s_vars = system.domain().s_vars(&ctx).unwrap();
    // every representative is a state of the input
    let outside = ctx.and(reduced.states(), ctx.not(system.states()).unwrap()).unwrap();
    assert!(outside.is_false());
    assert_eq!(ctx.satcount(reduced.states(), s_vars), 3.0);
  }

  #[test]
  fn agrees_with_fused_up_to_numbering() {
    let quotients = all_quotients(&lts(), &Config::default());
    let (fused, picked) = (&quotients[1], &quotients[2]);
    assert_eq!(fused.states, picked.states);
    assert_eq!(fused.transitions.len(), picked.transitions.len());
    assert_eq!(fused.initial.len(), picked.initial.len());
  }
}
