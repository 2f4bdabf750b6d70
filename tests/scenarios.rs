use ordered_float::OrderedFloat;
use sigref::bisim::{minimize, Outcome};
use sigref::dd::Manager;
use sigref::quotient::quotient;
use sigref::system::ExplicitModel;
use sigref::*;

fn outcome(model: &ExplicitModel, config: &Config) -> Result<Outcome> {
  let manager = Manager::<OrderedFloat<f64>>::new(16);
  let system = model.build(&manager, config.ordering)?;
  minimize(&manager, &system, config)
}

fn labelled(transitions: Vec<(u64, usize, u64)>, states: u64) -> ExplicitModel {
  ExplicitModel {
    states,
    initial: vec![0],
    actions: vec!["tau".into(), "a".into(), "b".into()],
    tau: Some(0),
    transitions,
    ..ExplicitModel::default()
  }
}

#[test]
fn cycle_and_self_loop() {
  // all three states can do `a` forever
  let model = labelled(vec![(0, 1, 1), (1, 1, 0), (2, 1, 2)], 3);
  let outcome = outcome(&model, &Config::default()).unwrap();
  assert_eq!(outcome.blocks, 1);
  assert_eq!(outcome.history, vec![1]);
}

#[test]
fn cycle_and_other_label() {
  let model = labelled(vec![(0, 1, 1), (1, 1, 0), (2, 2, 2)], 3);
  let outcome = outcome(&model, &Config::default()).unwrap();
  assert_eq!(outcome.blocks, 2);
  assert_eq!(outcome.iterations, 2);
}

#[test]
fn symmetric_ctmc() {
  let model = ExplicitModel { states: 2, initial: vec![0], rates: vec![(0, 2.0, 1), (1, 2.0, 0)], ..ExplicitModel::default() };
  let outcome = outcome(&model, &Config::default()).unwrap();
  assert_eq!(outcome.blocks, 1);
  assert_eq!(outcome.iterations, 1);
}

#[test]
fn maximal_progress() {
  // 0 has a tau step and a rate to 1; 2 only the tau step. Without the
  // cut, 0 would be on its own.
  let model = ExplicitModel {
    states: 3,
    initial: vec![0],
    actions: vec!["tau".into()],
    tau: Some(0),
    transitions: vec![(0, 0, 1), (2, 0, 1)],
    rates: vec![(0, 3.0, 1)],
    ..ExplicitModel::default()
  };
  assert_eq!(outcome(&model, &Config::default()).unwrap().blocks, 2);
  // the tau steps are inert, so everything collapses
  let branching = Config { bisimulation: Bisimulation::Branching, ..Config::default() };
  assert_eq!(outcome(&model, &branching).unwrap().blocks, 1);
  let model = ExplicitModel { transitions: vec![(2, 0, 1)], ..model };
  assert_eq!(outcome(&model, &Config::default()).unwrap().blocks, 3);
}

#[test]
fn quotient_of_a_chain_keeps_its_length() {
  // 0 -a-> 1 -a-> 2 and 3 -a-> 4 -a-> 5: positions on the chains match
  let model = labelled(vec![(0, 1, 1), (1, 1, 2), (3, 1, 4), (4, 1, 5)], 6);
  let manager = Manager::<OrderedFloat<f64>>::new(16);
  let config = Config::default();
  let system = model.build(&manager, config.ordering).unwrap();
  let outcome = minimize(&manager, &system, &config).unwrap();
  assert_eq!(outcome.blocks, 3);
  let reduced = quotient(&manager, &system, &outcome, &config).unwrap();
  let reduced = ExplicitModel::extract(&manager, &reduced, &model).unwrap();
  assert_eq!(reduced.states, 3);
  assert_eq!(reduced.transitions.len(), 2);
  assert_eq!(reduced.initial.len(), 1);
}

#[test]
fn blocks_run_out() {
  // a chain of five states needs five blocks
  let model = labelled(vec![(0, 1, 1), (1, 1, 2), (2, 1, 3), (3, 1, 4)], 5);
  let config = Config { max_block_bits: 2, ..Config::default() };
  assert!(matches!(outcome(&model, &config), Err(Error::BlocksExhausted { .. })));
  let config = Config { max_block_bits: 3, ..Config::default() };
  assert_eq!(outcome(&model, &config).unwrap().blocks, 5);
}

#[test]
fn node_table_runs_out() {
  let model = labelled((0..63).map(|state| (state, 1 + (state % 2) as usize, state + 1)).collect(), 64);
  let manager = Manager::<OrderedFloat<f64>>::new(6);
  let result = model.build(&manager, Default::default()).and_then(|system| minimize(&manager, &system, &Config::default()));
  assert!(matches!(result, Err(Error::NodeTableFull { .. })));
}

#[test]
fn long_closures_fit_a_small_table() {
  // 0 -tau-> 1 -tau-> ... -tau-> 199 -a-> 199: one block, reached after 200
  // backward steps whose intermediate signatures are garbage
  let mut transitions = (0..199).map(|state| (state, 0, state + 1)).collect::<Vec<_>>();
  transitions.push((199, 1, 199));
  let model = labelled(transitions, 200);
  let manager = Manager::<OrderedFloat<f64>>::new(10);
  let system = model.build(&manager, Default::default()).unwrap();
  for closure in [Closure::Fixpoint, Closure::Squaring] {
    let config = Config { bisimulation: Bisimulation::Branching, closure, ..Config::default() };
    let outcome = minimize(&manager, &system, &config).unwrap();
    assert_eq!(outcome.blocks, 1);
  }
}

#[test]
fn initial_partition_separates() {
  // 0 and 1 behave alike but start apart
  let model = ExplicitModel { partition: vec![vec![0], vec![1]], ..labelled(vec![(0, 1, 0), (1, 1, 1)], 2) };
  assert_eq!(outcome(&model, &Config::default()).unwrap().blocks, 2);
  let model = ExplicitModel { partition: vec![vec![0, 1]], ..model };
  assert_eq!(outcome(&model, &Config::default()).unwrap().blocks, 1);
}

#[test]
fn states_past_the_model_get_no_block() {
  let model = ExplicitModel {
    initial: vec![0, 3, 40],
    partition: vec![vec![0, 1, 2, 3], vec![1 << 40]],
    ..labelled(vec![(0, 1, 1), (1, 1, 0), (2, 1, 2)], 3)
  };
  let manager = Manager::<OrderedFloat<f64>>::new(16);
  let config = Config::default();
  let system = model.build(&manager, config.ordering).unwrap();
  let outcome = minimize(&manager, &system, &config).unwrap();
  assert_eq!(outcome.blocks, 1);
  let reduced = quotient(&manager, &system, &outcome, &config).unwrap();
  let reduced = ExplicitModel::extract(&manager, &reduced, &model).unwrap();
  assert_eq!(reduced.states, 1);
  assert_eq!(reduced.initial, vec![0]);
}

#[test]
fn malformed_models_are_refused() {
  let model = labelled(vec![(0, 1, 7)], 3);
  assert!(matches!(outcome(&model, &Config::default()), Err(Error::Unsupported(_))));
  let model = ExplicitModel { rates: vec![(0, -1.0, 1)], ..labelled(vec![], 2) };
  assert!(matches!(outcome(&model, &Config::default()), Err(Error::Unsupported(_))));
}
