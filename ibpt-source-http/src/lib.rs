//! Remote [`ibpt_core::provider::RateSource`] over HTTP.

mod source;

pub use source::{HttpRateSource, interpret_response, query_params};
