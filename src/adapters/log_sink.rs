//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade.  A future websocket or MQTT adapter would implement
//! the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { backend, setpoints } => {
                info!(
                    "START | storage={:?} | CO2={}ppm RH={:.1}% T={:.1}\u{00b0}C",
                    backend, setpoints.co2_ppm, setpoints.rh_percent, setpoints.temp_c
                );
            }
            AppEvent::MeasureStageChanged { from, to } => {
                info!("MEASURE | {:?} -> {:?}", from, to);
            }
            AppEvent::MedianEvaluated(m) => {
                info!(
                    "MEDIAN | CO2={}ppm RH={:.1}% T={:.1}\u{00b0}C",
                    m.co2_ppm, m.rh_percent, m.temp_c
                );
            }
            AppEvent::ActionStarted(action) => {
                info!("ACTION | start {:?}", action);
            }
            AppEvent::ActionStageChanged { action, stage } => {
                info!("ACTION | {:?} -> {:?}", action, stage);
            }
            AppEvent::ActionCompleted(action) => {
                info!("ACTION | {:?} complete", action);
            }
            AppEvent::HeaterChanged(on) => {
                info!("HEATER | {}", if *on { "ON" } else { "OFF" });
            }
            AppEvent::SetpointsChanged(s) => {
                info!(
                    "SETPOINT | CO2={}ppm RH={:.1}% T={:.1}\u{00b0}C",
                    s.co2_ppm, s.rh_percent, s.temp_c
                );
            }
            AppEvent::StorageSaved { next_slot } => {
                info!("STORAGE | saved, next slot {}", next_slot);
            }
            AppEvent::StorageFailed(e) => {
                warn!("STORAGE | save failed: {}", e);
            }
        }
    }
}
