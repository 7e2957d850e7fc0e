//! Ready-made tier implementations.

pub mod memory;
pub mod moka;
pub mod redis;
