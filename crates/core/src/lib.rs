pub mod models;
pub mod parsing;
pub mod validation;

pub use alloy_primitives::{Address, U256};
