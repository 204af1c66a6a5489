//! Restart adapter.
//!
//! The Reboot state ends the process image: on target this is
//! `esp_restart()` (which does not return); on the host it only logs, so
//! simulations can observe the request.

use log::warn;

use crate::app::ports::RestartPort;

#[derive(Default)]
pub struct SystemRestart;

impl RestartPort for SystemRestart {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        warn!("Restarting node");
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        warn!("Restart requested (ignored on host)");
    }
}
