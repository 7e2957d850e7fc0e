//! Notice-bus transports.

pub mod redis;
