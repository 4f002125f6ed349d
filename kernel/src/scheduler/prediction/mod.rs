//! Prediction algorithms for scheduler

pub mod ema;

pub use ema::{burst_estimate, BurstHistory};
