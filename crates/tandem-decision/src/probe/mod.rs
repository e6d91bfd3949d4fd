//! Hardware and network probes consumed by the state aggregator.

pub mod hardware;
pub mod network;

pub use hardware::{HardwareProbe, SysinfoHardwareProbe};
pub use network::{HttpNetworkProbe, NetworkProbe};
