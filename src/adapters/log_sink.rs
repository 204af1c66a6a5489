//! Event sink that writes everything to the structured log.
//!
//! Used standalone on the host and as the fallback sink on target when
//! the broker link is down. Reports are rendered to their JSON wire form
//! so the log line matches what the broker would have received.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

#[derive(Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::StateChanged { from, to, cause } => {
                info!(
                    "Changed from state <{}> to state <{}> ({cause:?})",
                    from.label(),
                    to.label()
                );
            }
            AppEvent::Report(report) => {
                info!("report: {}", report.to_json());
            }
            AppEvent::PowerOnDenied { source, reason } => {
                warn!("Power-on request from {source:?} denied: {reason:?}");
            }
            AppEvent::OverrideArmed { deadline_ms } => {
                info!(
                    "Compressor disabled at late hours; hold the on-button to \
                     override (deadline {deadline_ms} ms)"
                );
            }
            AppEvent::OverrideForcedOn => {
                info!("Late-hours override accepted, compressor switched on");
            }
            AppEvent::OverrideAbandoned => {
                info!("Late-hours override abandoned");
            }
            AppEvent::TimeoutExtended { deadline_ms } => {
                info!("Auto power-off extended to {deadline_ms} ms");
            }
            AppEvent::CalibrationMode { entered } => {
                info!(
                    "Calibration mode {}",
                    if *entered { "entered" } else { "left" }
                );
            }
        }
    }
}
