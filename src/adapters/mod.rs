//! Adapters: infrastructure implementations of the ports.

pub mod persistence;
pub mod transport;
