//! Hardware-agnostic application layer: ports, events, commands, service.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;

pub use commands::{CmdOutcome, RemoteCommand};
pub use events::AppEvent;
pub use service::{CompressorService, CycleInputs, DisplayRefreshHint};
