//! Median filtering of the measurement window.
//!
//! An even window averages the two central values.  CO2 stays integral:
//! the mean of the two central readings is truncated toward zero.

use heapless::Vec;
use log::warn;
use serde::Serialize;

use crate::config::MEDIAN_SAMPLE_CAPACITY;

/// One median per controlled quantity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Medians {
    pub co2_ppm: i32,
    pub rh_percent: f32,
    pub temp_c: f32,
}

/// Copy the window into a sortable stack buffer.
///
/// A window longer than [`MEDIAN_SAMPLE_CAPACITY`] is a caller bug: it
/// asserts in debug builds and is cut to capacity, with a warning, in
/// release builds.
fn window<T: Copy>(values: &[T]) -> Vec<T, MEDIAN_SAMPLE_CAPACITY> {
    match Vec::from_slice(values) {
        Ok(out) => out,
        Err(()) => {
            debug_assert!(
                false,
                "median window of {} exceeds capacity {}",
                values.len(),
                MEDIAN_SAMPLE_CAPACITY
            );
            warn!(
                "Median: {} samples exceed capacity {}, using the first {}",
                values.len(),
                MEDIAN_SAMPLE_CAPACITY,
                MEDIAN_SAMPLE_CAPACITY
            );
            Vec::from_slice(&values[..MEDIAN_SAMPLE_CAPACITY]).unwrap_or_default()
        }
    }
}

/// Median of a float window.  Empty input yields 0.
pub fn median_f32(values: &[f32]) -> f32 {
    let mut sorted = window(values);
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_unstable_by(f32::total_cmp);
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Median of an integer window.  Empty input yields 0.
pub fn median_i32(values: &[i32]) -> i32 {
    let mut sorted = window(values);
    if sorted.is_empty() {
        return 0;
    }
    sorted.sort_unstable();
    let n = sorted.len();
    if n % 2 == 0 {
        ((i64::from(sorted[n / 2 - 1]) + i64::from(sorted[n / 2])) / 2) as i32
    } else {
        sorted[n / 2]
    }
}
