//! Recursive operators of signature refinement, written directly against
//! diagram cofactors.
//!
//! All of them walk the interleaved state/next-state variables in lock step
//! with one or two partitions, which are functions from next-state variables
//! to a block cube.

mod equi;
mod inert;
mod quotient;
mod refine;

pub use refine::*;

use crate::dd::Opcode;

const REFINE: Opcode = Opcode(32);
const INERT: Opcode = Opcode(33);
const EQUI: Opcode = Opcode(34);
const RELPREV_EQUI: Opcode = Opcode(35);
const TRANS_QUOTIENT: Opcode = Opcode(36);
const MARKOV_QUOTIENT: Opcode = Opcode(37);
const STATES_QUOTIENT: Opcode = Opcode(38);
const MAP_BLOCKS: Opcode = Opcode(39);

#[cfg(test)]
pub(crate) mod fixture {
  use crate::blocks::BlockEncoding;
  use crate::dd::{Ctx, Dd, Leaf};

  pub const BLOCKS: BlockEncoding = BlockEncoding { base: 2_000_000, width: 3 };

  /// Cube of a state over `bits` state (`next` = false) or next-state variables.
  pub fn state<L: Leaf>(ctx: &Ctx<L>, bits: u32, state: u64, next: bool) -> Dd {
    let literals = (0..bits).map(|bit| (2 * bit + next as u32, state >> bit & 1 == 1)).collect::<Vec<_>>();
    ctx.cube(&literals).unwrap()
  }

  /// Partition over next-state variables from `(state, block)` pairs.
  pub fn partition<L: Leaf>(ctx: &Ctx<L>, bits: u32, pairs: &[(u64, u64)]) -> Dd {
    pairs.iter().fold(Dd::FALSE, |acc, &(s, block)| {
      let cube = ctx.and(state(ctx, bits, s, true), BLOCKS.encode(ctx, block).unwrap()).unwrap();
      ctx.or(acc, cube).unwrap()
    })
  }

  /// Relation over state/next-state variables.
  pub fn relation<L: Leaf>(ctx: &Ctx<L>, bits: u32, edges: &[(u64, u64)]) -> Dd {
    edges.iter().fold(Dd::FALSE, |acc, &(from, to)| {
      let edge = ctx.and(state(ctx, bits, from, false), state(ctx, bits, to, true)).unwrap();
      ctx.or(acc, edge).unwrap()
    })
  }
}
