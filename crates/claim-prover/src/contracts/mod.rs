//! Contract bindings for the claim prover.

mod settlement_request;

pub use settlement_request::*;
