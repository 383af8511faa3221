//! API request handlers

mod detectors;
mod health;

pub use detectors::*;
pub use health::*;
