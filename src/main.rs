use clap::Parser;
use log::info;
use num::rational::{BigRational, Rational64};
use ordered_float::OrderedFloat;
use sigref::bisim::minimize;
use sigref::dd::{Leaf, Manager};
use sigref::quotient::quotient;
use sigref::system::ExplicitModel;
use sigref::*;
use std::path::PathBuf;

/// Minimizes a transition system modulo bisimulation.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// the model to minimize, bincode encoded; standard input if absent
  input: Option<PathBuf>,

  /// where to write the quotient; standard output if absent
  #[arg(long, short)]
  output: Option<PathBuf>,

  #[arg(long, short, value_enum, default_value_t = Bisimulation::Strong)]
  bisimulation: Bisimulation,

  /// Numbers carried by rate leaves
  #[arg(long, value_enum, default_value_t = LeafType::Float)]
  leaf: LeafType,

  #[arg(long, value_enum, default_value_t = Closure::Fixpoint)]
  closure: Closure,

  /// Refine against the union of all transition relations
  #[arg(long, action)]
  merge_relations: bool,

  #[arg(long, value_enum, default_value_t = TableKind::HashTable)]
  table: TableKind,

  #[arg(long, short, value_enum, default_value_t = QuotientKind::Fused)]
  quotient: QuotientKind,

  #[arg(long, value_enum, default_value_t = VariableOrdering::ActionsFirst)]
  ordering: VariableOrdering,

  #[arg(long, default_value_t = 25)]
  max_block_bits: u32,

  /// Node table holds 2^N nodes
  #[arg(long, default_value_t = 22)]
  node_capacity_log2: u32,

  /// Worker threads; 0 picks one per core
  #[arg(long, short, default_value_t = 0)]
  workers: usize,

  /// More output, repeat for more
  #[arg(long, short, action = clap::ArgAction::Count)]
  verbose: u8,
}

impl Args {
  fn config(&self) -> Config {
    Config {
      bisimulation: self.bisimulation,
      leaf: self.leaf,
      closure: self.closure,
      merge_relations: self.merge_relations,
      table: self.table,
      quotient: self.quotient,
      ordering: self.ordering,
      max_block_bits: self.max_block_bits,
      node_capacity_log2: self.node_capacity_log2,
      workers: self.workers,
    }
    .normalized()
  }
}

fn run<L: Leaf>(model: &ExplicitModel, config: &Config) -> Result<ExplicitModel> {
  let manager = Manager::<L>::new(config.node_capacity_log2);
  let system = model.build(&manager, config.ordering)?;
  info!("Minimizing {} modulo {:?} bisimulation.", system.kind(), config.bisimulation);
  let outcome = minimize(&manager, &system, config)?;
  let reduced = quotient(&manager, &system, &outcome, config)?;
  ExplicitModel::extract(&manager, &reduced, model)
}

fn main() -> Result<()> {
  let args = Args::parse();
  let level = match args.verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
  let config = args.config();

  let pool = rayon::ThreadPoolBuilder::new().num_threads(config.workers).build()?;
  info!("Using {} workers.", pool.current_num_threads());

  let model: ExplicitModel = match &args.input {
    Some(path) => bincode::deserialize_from(std::io::BufReader::new(std::fs::File::open(path)?))?,
    None => bincode::deserialize_from(std::io::stdin().lock())?,
  };
  let reduced = pool.install(|| match config.leaf {
    LeafType::Float => run::<OrderedFloat<f64>>(&model, &config),
    LeafType::Fraction => run::<Rational64>(&model, &config),
    LeafType::Exact => run::<BigRational>(&model, &config),
  })?;
  info!("Quotient has {} states and {} transitions.", reduced.states, reduced.transitions.len() + reduced.rates.len());

  match &args.output {
    Some(path) => bincode::serialize_into(std::io::BufWriter::new(std::fs::File::create(path)?), &reduced)?,
    None => bincode::serialize_into(std::io::stdout().lock(), &reduced)?,
  }
  Ok(())
}
