pub mod debounce;
pub mod led;

pub use debounce::{ButtonEdge, Debouncer};
pub use led::LedMode;
