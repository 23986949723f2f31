//! Concrete stage handler functions and table builder.
//!
//! Each stage is defined by three plain `fn` pointers.  No closures, no
//! dynamic dispatch, no heap.
//!
//! ```text
//!  IDLE ──[first tick]──▶ SWIRL ──[swirl time]──▶ MEDIAN
//!                           ▲                       │
//!                           │               [K samples taken]
//!                      [wait time]                  ▼
//!                           │                    EVALUATE
//!                           └──── WAIT ◀──[decided]──┘
//! ```

use super::context::ChamberContext;
use super::{MeasureStage, StateDescriptor};
use crate::clock::deadline_reached;
use crate::control::decision;
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static stage table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; MeasureStage::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: MeasureStage::Idle,
            name: "Idle",
            on_enter: None,
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Swirl
        StateDescriptor {
            id: MeasureStage::Swirl,
            name: "Swirl",
            on_enter: Some(swirl_enter),
            on_exit: Some(swirl_exit),
            on_update: swirl_update,
        },
        // Index 2: Median
        StateDescriptor {
            id: MeasureStage::Median,
            name: "Median",
            on_enter: Some(median_enter),
            on_exit: None,
            on_update: median_update,
        },
        // Index 3: Evaluate
        StateDescriptor {
            id: MeasureStage::Evaluate,
            name: "Evaluate",
            on_enter: None,
            on_exit: None,
            on_update: evaluate_update,
        },
        // Index 4: Wait
        StateDescriptor {
            id: MeasureStage::Wait,
            name: "Wait",
            on_enter: None,
            on_exit: None,
            on_update: wait_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(_ctx: &mut ChamberContext) -> Option<MeasureStage> {
    Some(MeasureStage::Swirl)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SWIRL: mix the chamber air before sampling
// ═══════════════════════════════════════════════════════════════════════════

fn swirl_enter(ctx: &mut ChamberContext) {
    ctx.outputs.swirler = true;
}

fn swirl_exit(ctx: &mut ChamberContext) {
    ctx.outputs.swirler = false;
}

fn swirl_update(ctx: &mut ChamberContext) -> Option<MeasureStage> {
    (ctx.ms_in_stage() >= ctx.measure_timings.swirl_ms).then_some(MeasureStage::Median)
}

// ═══════════════════════════════════════════════════════════════════════════
//  MEDIAN: collect K samples of the main channels
// ═══════════════════════════════════════════════════════════════════════════

fn median_enter(ctx: &mut ChamberContext) {
    ctx.measure.sample_index = 0;
    ctx.measure.next_sample_ms = ctx.now_ms;
}

fn median_update(ctx: &mut ChamberContext) -> Option<MeasureStage> {
    let k = ctx.measure_timings.sample_count;

    if ctx.measure.sample_index < k && deadline_reached(ctx.now_ms, ctx.measure.next_sample_ms) {
        let snapshot = ctx.sensors;
        ctx.measure.record(&snapshot);
        ctx.measure.next_sample_ms = ctx
            .measure
            .next_sample_ms
            .wrapping_add(ctx.measure_timings.sample_period_ms);
        debug!(
            "Measure: sample {}/{} CO2={} RH={:.1} T={:.1}",
            ctx.measure.sample_index,
            k,
            snapshot.co2_main(),
            snapshot.rh_main(),
            snapshot.temp_main()
        );
    }

    (ctx.measure.sample_index >= k).then_some(MeasureStage::Evaluate)
}

// ═══════════════════════════════════════════════════════════════════════════
//  EVALUATE: medians in, at most one action out
// ═══════════════════════════════════════════════════════════════════════════

fn evaluate_update(ctx: &mut ChamberContext) -> Option<MeasureStage> {
    let medians = ctx.measure.medians();
    info!(
        "Measure: medians CO2={} ppm RH={:.1}% T={:.1}C",
        medians.co2_ppm, medians.rh_percent, medians.temp_c
    );
    ctx.last_medians = Some(medians);
    ctx.started_action = decision::evaluate(
        &medians,
        &ctx.setpoints,
        &mut ctx.action,
        &mut ctx.outputs,
        &ctx.rules,
        ctx.now_ms,
    );
    Some(MeasureStage::Wait)
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAIT
// ═══════════════════════════════════════════════════════════════════════════

fn wait_update(ctx: &mut ChamberContext) -> Option<MeasureStage> {
    (ctx.ms_in_stage() >= ctx.measure_timings.wait_ms).then_some(MeasureStage::Swirl)
}
