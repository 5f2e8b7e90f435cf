mod config;
mod error;
mod gate;

pub use config::{GateConfig, ListenConfig};
pub use error::GateError;
pub use gate::{DEFAULT_GREETING, Gate, GateDecision, RunningGate};
