//! Symbolic transition systems and the layout of their variables.

mod explicit;

pub use explicit::*;

use crate::blocks::BlockEncoding;
use crate::config::VariableOrdering;
use crate::dd::{Ctx, Dd, Leaf, Root, Var, STATE_LIMIT};
use crate::error::Result;
use std::collections::BTreeSet;

/// Variable layout of one system. State bit `i` is `s_i = 2i` with the
/// next-state copy `t_i = 2i + 1`; actions and blocks each get their own
/// namespace above the state variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Domain {
  pub state_bits: u32,
  pub action_bits: u32,
  pub ordering: VariableOrdering,
}

impl Domain {
  pub fn new(state_bits: u32, action_bits: u32, ordering: VariableOrdering) -> Self {
    Domain { state_bits, action_bits, ordering }
  }

  pub fn action_base(&self) -> Var {
    match self.ordering {
      VariableOrdering::ActionsFirst => STATE_LIMIT,
      VariableOrdering::BlocksFirst => 2 * STATE_LIMIT,
    }
  }

  pub fn block_base(&self) -> Var {
    match self.ordering {
      VariableOrdering::ActionsFirst => 2 * STATE_LIMIT,
      VariableOrdering::BlocksFirst => STATE_LIMIT,
    }
  }

  pub fn blocks(&self, width: u32) -> BlockEncoding {
    BlockEncoding { base: self.block_base(), width }
  }

  pub fn action(&self, bit: u32) -> Var {
    self.action_base() + bit
  }

  pub fn s_vars<L: Leaf>(&self, ctx: &Ctx<L>) -> Result<Dd> {
    ctx.set((0..self.state_bits).map(|bit| 2 * bit))
  }

  pub fn t_vars<L: Leaf>(&self, ctx: &Ctx<L>) -> Result<Dd> {
    ctx.set((0..self.state_bits).map(|bit| 2 * bit + 1))
  }

  pub fn st_vars<L: Leaf>(&self, ctx: &Ctx<L>) -> Result<Dd> {
    ctx.set(0..2 * self.state_bits)
  }

  pub fn a_vars<L: Leaf>(&self, ctx: &Ctx<L>) -> Result<Dd> {
    ctx.set((0..self.action_bits).map(|bit| self.action(bit)))
  }

  pub fn sta_vars<L: Leaf>(&self, ctx: &Ctx<L>) -> Result<Dd> {
    ctx.set((0..2 * self.state_bits).chain((0..self.action_bits).map(|bit| self.action(bit))))
  }

  pub fn ta_vars<L: Leaf>(&self, ctx: &Ctx<L>) -> Result<Dd> {
    ctx.set((0..self.state_bits).map(|bit| 2 * bit + 1).chain((0..self.action_bits).map(|bit| self.action(bit))))
  }

  /// Cube of one state over the state (`next` = false) or next-state variables.
  pub fn state<L: Leaf>(&self, ctx: &Ctx<L>, state: u64, next: bool) -> Result<Dd> {
    let literals = (0..self.state_bits).map(|bit| (2 * bit + next as u32, state >> bit & 1 == 1)).collect::<Vec<_>>();
    ctx.cube(&literals)
  }

  pub fn action_cube<L: Leaf>(&self, ctx: &Ctx<L>, action: u64) -> Result<Dd> {
    let literals = (0..self.action_bits).map(|bit| (self.action(bit), action >> bit & 1 == 1)).collect::<Vec<_>>();
    ctx.cube(&literals)
  }

  /// `s_i = t_i` for every given state bit.
  pub fn identity<L: Leaf>(&self, ctx: &Ctx<L>, bits: impl IntoIterator<Item = u32>) -> Result<Dd> {
    let bits = bits.into_iter().collect::<BTreeSet<_>>();
    let mut eq = Dd::TRUE;
    for bit in bits.into_iter().rev() {
      let low = ctx.makenode(2 * bit + 1, eq, Dd::FALSE)?;
      let high = ctx.makenode(2 * bit + 1, Dd::FALSE, eq)?;
      eq = ctx.makenode(2 * bit, low, high)?;
    }
    Ok(eq)
  }

  pub fn full_identity<L: Leaf>(&self, ctx: &Ctx<L>) -> Result<Dd> {
    self.identity(ctx, 0..self.state_bits)
  }

  /// States with a code below `count`, over the state variables.
  pub fn codes_below<L: Leaf>(&self, ctx: &Ctx<L>, count: u64) -> Result<Dd> {
    if self.state_bits >= 64 || count >= 1 << self.state_bits {
      return Ok(Dd::TRUE);
    }
    // compares from the least significant bit up
    let mut less = Dd::FALSE;
    for bit in 0..self.state_bits {
      let var = ctx.ithvar(2 * bit)?;
      less = if count >> bit & 1 == 1 { ctx.ite(var, less, Dd::TRUE)? } else { ctx.ite(var, Dd::FALSE, less)? };
    }
    Ok(less)
  }
}

/// A transition relation together with the state and next-state variables
/// it ranges over. State bits outside that support are left unchanged by
/// every transition of the relation.
#[derive(Debug, Clone)]
pub struct Relation {
  pub relation: Root,
  pub variables: Root,
}

impl Relation {
  /// Drops every state bit the relation never changes from its support.
  pub fn localized<L: Leaf>(ctx: &Ctx<L>, domain: &Domain, relation: Dd) -> Result<Self> {
    let mut relation = relation;
    let mut kept = Vec::new();
    for bit in 0..domain.state_bits {
      let eq = domain.identity(ctx, [bit])?;
      let pair = ctx.set([2 * bit, 2 * bit + 1])?;
      let dropped = ctx.and_exists(relation, eq, pair)?;
      if ctx.and(dropped, eq)? == relation {
        relation = dropped;
      } else {
        kept.extend([2 * bit, 2 * bit + 1]);
      }
    }
    let variables = ctx.set(kept)?;
    Ok(Relation { relation: ctx.protect(relation), variables: ctx.protect(variables) })
  }

  /// State bits of the support.
  pub fn state_bits<L: Leaf>(&self, ctx: &Ctx<L>) -> BTreeSet<u32> {
    ctx.set_vars(self.variables.get()).into_iter().filter(|&var| var < STATE_LIMIT).map(|var| var / 2).collect()
  }

  /// The relation over the whole domain: `s_i = t_i` is added for every
  /// state bit outside the support.
  pub fn extended<L: Leaf>(&self, ctx: &Ctx<L>, domain: &Domain) -> Result<Dd> {
    let present = self.state_bits(ctx);
    let eq = domain.identity(ctx, (0..domain.state_bits).filter(|bit| !present.contains(bit)))?;
    ctx.and(self.relation.get(), eq)
  }
}

#[derive(Debug, Clone)]
pub struct Lts {
  pub domain: Domain,
  pub states: Root,
  pub initial: Root,
  pub relations: Vec<Relation>,
  /// Cube of the silent action over the action variables; `FALSE` when the
  /// system has none.
  pub tau: Root,
  /// Sets of states, each one an initial block.
  pub partition: Vec<Root>,
}

/// Rates are functions from (s, t) to numeric leaves; missing rates are `FALSE`.
#[derive(Debug, Clone)]
pub struct Ctmc {
  pub domain: Domain,
  pub states: Root,
  pub initial: Root,
  pub rates: Root,
  pub partition: Vec<Root>,
}

#[derive(Debug, Clone)]
pub struct Imc {
  pub domain: Domain,
  pub states: Root,
  pub initial: Root,
  pub relations: Vec<Relation>,
  pub tau: Root,
  pub rates: Root,
  pub partition: Vec<Root>,
}

#[derive(Debug, Clone)]
pub enum System {
  Lts(Lts),
  Ctmc(Ctmc),
  Imc(Imc),
}

impl System {
  pub fn domain(&self) -> Domain {
    match self {
      System::Lts(lts) => lts.domain,
      System::Ctmc(ctmc) => ctmc.domain,
      System::Imc(imc) => imc.domain,
    }
  }

  pub fn states(&self) -> Dd {
    match self {
      System::Lts(lts) => lts.states.get(),
      System::Ctmc(ctmc) => ctmc.states.get(),
      System::Imc(imc) => imc.states.get(),
    }
  }

  pub fn initial(&self) -> Dd {
    match self {
      System::Lts(lts) => lts.initial.get(),
      System::Ctmc(ctmc) => ctmc.initial.get(),
      System::Imc(imc) => imc.initial.get(),
    }
  }

  pub fn partition(&self) -> &[Root] {
    match self {
      System::Lts(lts) => &lts.partition,
      System::Ctmc(ctmc) => &ctmc.partition,
      System::Imc(imc) => &imc.partition,
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      System::Lts(_) => "LTS",
      System::Ctmc(_) => "CTMC",
      System::Imc(_) => "IMC",
    }
  }
}
