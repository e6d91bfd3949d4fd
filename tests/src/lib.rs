//! Tandem Testing Framework
//!
//! Scripted probes and outcome fixtures for exercising the decision core
//! without real hardware or a reachable cloud endpoint.

pub mod fixtures;
pub mod probes;

pub use fixtures::{OutcomeBatch, facade_with, init_tracing};
pub use probes::{FailingHardwareProbe, MockHardwareProbe, MockNetworkProbe};
