pub mod algebra;
pub mod bisim;
pub mod blocks;
pub mod config;
pub mod dd;
pub mod error;
pub mod quotient;
pub mod system;

pub use config::*;
pub use error::{Error, Result};
