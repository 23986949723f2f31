//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements    | Connects to                     |
//! |----------------|---------------|---------------------------------|
//! | `block_device` | BlockDevice   | Simulated NOR flash / nothing   |
//! | `hardware`     | ActuatorPort  | `embedded_hal` output pins      |
//! |                | SensorDriver  | nothing (`NoSensors`)           |
//! | `log_sink`     | EventSink     | `log` facade                    |
//! | `time`         | Clock         | `std::time::Instant`            |

pub mod block_device;
pub mod hardware;
pub mod log_sink;
pub mod time;
