//! Setup and teardown helpers for the hotel cluster pipeline.
//!
//! None of these are on the streaming path. Every public helper logs its
//! failures and returns an empty result instead of an error, so a setup
//! script can carry on past a resource that is already gone.

pub mod error;
pub mod feature_group;
pub mod model_resources;
pub mod params;
pub mod stack;
pub mod storage;
pub mod tags;

pub use error::InfraError;
