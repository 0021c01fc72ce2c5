//! Tax burden estimation for sold products and services.

pub mod accumulator;
mod common;

pub use accumulator::{
    AccumulatorError, AccumulatorState, Contribution, TaxAccumulator, TaxSummary,
};
pub use common::round_half_up;
