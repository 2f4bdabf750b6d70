use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Bisimulation {
  #[default]
  Strong,
  Branching,
}

/// Numeric representation of rate leaves, fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum LeafType {
  #[default]
  Float,
  Fraction,
  Exact,
}

/// How inert tau steps are closed during branching refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Closure {
  /// Apply one inert step at a time until the signature is stable.
  #[default]
  Fixpoint,
  /// Square the reflexive inert relation until stable, then apply it once.
  Squaring,
  /// Compute the reflexive-transitive closure with the recursive closure operator.
  Recursive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum TableKind {
  #[default]
  HashTable,
  SkipList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum QuotientKind {
  ComposeTwice,
  #[default]
  Fused,
  Representative,
}

/// Relative placement of the action and block variable namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum VariableOrdering {
  #[default]
  ActionsFirst,
  BlocksFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  pub bisimulation: Bisimulation,
  pub leaf: LeafType,
  pub closure: Closure,
  pub merge_relations: bool,
  pub table: TableKind,
  pub quotient: QuotientKind,
  pub ordering: VariableOrdering,
  pub max_block_bits: u32,
  pub node_capacity_log2: u32,
  pub workers: usize,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      bisimulation: Bisimulation::Strong,
      leaf: LeafType::Float,
      closure: Closure::Fixpoint,
      merge_relations: false,
      table: TableKind::HashTable,
      quotient: QuotientKind::Fused,
      ordering: VariableOrdering::ActionsFirst,
      max_block_bits: 25,
      node_capacity_log2: 22,
      workers: 0,
    }
  }
}

impl Config {
  /// Resolves option combinations the driver cannot run as given.
  ///
  /// The squaring and recursive closures work on a single inert relation, so
  /// choosing either forces the transition relations to be merged.
  pub fn normalized(mut self) -> Self {
    if self.closure != Closure::Fixpoint && !self.merge_relations {
      log::debug!("closure {:?} needs a single relation, merging relations", self.closure);
      self.merge_relations = true;
    }
    self.max_block_bits = self.max_block_bits.clamp(1, 31);
    self
  }
}
