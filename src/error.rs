use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("diagram node table is full ({capacity} nodes)")]
  NodeTableFull { capacity: usize },
  #[error("no more blocks available (limit {limit})")]
  BlocksExhausted { limit: u64 },
  #[error("invariant violated: {0}")]
  Invariant(String),
  #[error("unsupported input: {0}")]
  Unsupported(&'static str),
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("cannot decode model: {0}")]
  Decode(#[from] bincode::Error),
  #[error(transparent)]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
