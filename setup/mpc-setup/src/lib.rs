pub mod errors;
pub mod utils;
pub mod config;
pub mod contributor;

pub mod circuit;
pub mod commons;
pub mod evaluations;
pub mod phase1;
pub mod phase2;
pub mod keys;
pub mod seal;

pub mod chain;
pub mod marshal;

pub use errors::{Result, SetupError};
