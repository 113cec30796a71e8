//! Odds and ends shared by every `rig` crate.

pub mod assert;
pub mod env;
pub mod hash;
pub mod id_gen;
