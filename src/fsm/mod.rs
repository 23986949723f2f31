//! Function-pointer finite state machine engine for the measurement cycle.
//!
//! Classic embedded FSM pattern:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StateTable                                              │
//! │  ┌──────────┬───────────┬──────────┬─────────────────┐   │
//! │  │ Stage    │ on_enter  │ on_exit  │ on_update       │   │
//! │  ├──────────┼───────────┼──────────┼─────────────────┤   │
//! │  │ Idle     │ -         │ -        │ fn(ctx)->Option │   │
//! │  │ Swirl    │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option │   │
//! │  │ Median   │ fn(ctx)   │ -        │ fn(ctx)->Option │   │
//! │  │ Evaluate │ -         │ -        │ fn(ctx)->Option │   │
//! │  │ Wait     │ -         │ -        │ fn(ctx)->Option │   │
//! │  └──────────┴───────────┴──────────┴─────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** stage.
//! If it returns `Some(next)`, the engine runs `on_exit` for the
//! current stage, stamps `stage_start_ms`, then runs `on_enter` for the
//! next.  All functions receive `&mut ChamberContext`.

pub mod context;
pub mod states;

use context::ChamberContext;
use log::info;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Stage identity
// ---------------------------------------------------------------------------

/// Measurement-cycle stages.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum MeasureStage {
    Idle = 0,
    Swirl = 1,
    Median = 2,
    Evaluate = 3,
    Wait = 4,
}

impl MeasureStage {
    /// Total number of stages, used to size the table array.
    pub const COUNT: usize = 5;

    /// Convert an index back to `MeasureStage`.  Panics on out-of-range in
    /// debug builds; returns `Idle` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Swirl,
            2 => Self::Median,
            3 => Self::Evaluate,
            4 => Self::Wait,
            _ => {
                debug_assert!(false, "invalid stage index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut ChamberContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut ChamberContext) -> Option<MeasureStage>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single stage.
pub struct StateDescriptor {
    pub id: MeasureStage,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `MeasureStage as usize`.
    table: [StateDescriptor; MeasureStage::COUNT],
    current: usize,
}

impl Fsm {
    /// Construct a new FSM with the given table, starting in `initial`.
    pub fn new(table: [StateDescriptor; MeasureStage::COUNT], initial: MeasureStage) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table rows out of order"
        );
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting stage.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut ChamberContext) {
        info!("FSM starting in stage: {}", self.table[self.current].name);
        ctx.measure.stage_start_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.  Returns the new stage when a
    /// transition happened.
    ///
    /// At most one transition per tick: the next stage's `on_update` runs
    /// on the following tick.
    pub fn tick(&mut self, ctx: &mut ChamberContext) -> Option<MeasureStage> {
        let next = (self.table[self.current].on_update)(ctx)?;
        self.transition(next, ctx);
        Some(next)
    }

    /// Force an immediate transition regardless of `on_update`.
    pub fn force_transition(&mut self, next: MeasureStage, ctx: &mut ChamberContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current stage.
    pub fn current_stage(&self) -> MeasureStage {
        MeasureStage::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: MeasureStage, ctx: &mut ChamberContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.measure.stage_start_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
