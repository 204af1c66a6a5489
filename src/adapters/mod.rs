//! Platform adapters implementing the application port traits.

#[cfg(target_os = "espidf")]
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod restart;
pub mod time;

pub use log_sink::LogSink;
pub use nvs::NvsAdapter;
pub use restart::SystemRestart;
pub use time::Esp32TimeAdapter;
