//! Control laws: median filtering, the decision rules, the action state
//! machine and the heater loop.

pub mod action;
pub mod decision;
pub mod heater;
pub mod median;
