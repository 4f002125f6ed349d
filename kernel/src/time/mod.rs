//! Time management subsystem
//!
//! The scheduler measures everything in timer ticks: aging windows,
//! burst lengths and event timestamps.

pub mod clock;

// Re-exports
pub use clock::{Tick, TickCounter, TickSource};
