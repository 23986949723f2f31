//! Outbound application events.
//!
//! The [`ChamberService`](super::service::ChamberService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log to serial, push to a
//! web client, record in a test.

use serde::Serialize;

use crate::control::action::{Action, ActionStage};
use crate::control::median::Medians;
use crate::error::StorageError;
use crate::fsm::MeasureStage;
use crate::fsm::context::Setpoints;
use crate::storage::Backend;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the storage backend in use).
    Started {
        backend: Backend,
        setpoints: Setpoints,
    },

    /// The measurement cycle moved between stages.
    MeasureStageChanged { from: MeasureStage, to: MeasureStage },

    /// A full median window was evaluated.
    MedianEvaluated(Medians),

    ActionStarted(Action),

    ActionStageChanged { action: Action, stage: ActionStage },

    ActionCompleted(Action),

    HeaterChanged(bool),

    SetpointsChanged(Setpoints),

    /// A record was written; `next_slot` is where the next one goes.
    StorageSaved { next_slot: u32 },

    StorageFailed(StorageError),
}

/// A point-in-time view of the kernel, suitable for logging or the
/// status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub uptime_ms: u32,
    pub measure_stage: MeasureStage,
    pub action: Action,
    pub action_stage: ActionStage,
    pub outputs: crate::fsm::context::Outputs,
    pub sensors: crate::sensors::SensorSnapshot,
    pub medians: Option<Medians>,
    pub setpoints: Setpoints,
    pub counter: u16,
    pub storage_dirty: bool,
}
