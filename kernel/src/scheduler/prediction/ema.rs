//! EMA (Exponential Moving Average) burst prediction
//!
//! Weight 1/2 on the last observed burst, 1/2 on the previous
//! prediction, each halved separately in integer arithmetic:
//! `predicted/2 + last/2` (odd halves round down).

/// Estimated next burst from the previous prediction and the last burst
#[inline]
pub const fn burst_estimate(predicted: u64, last_burst: u64) -> u64 {
    predicted / 2 + last_burst / 2
}

/// Running statistics over the bursts a thread actually executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstHistory {
    /// Number of completed bursts
    pub samples: u64,
    /// Sum of completed bursts (ticks)
    pub total_ticks: u64,
    /// Longest completed burst (ticks)
    pub max_ticks: u64,
}

impl BurstHistory {
    pub const fn new() -> Self {
        Self {
            samples: 0,
            total_ticks: 0,
            max_ticks: 0,
        }
    }

    /// Record a completed burst
    pub fn record(&mut self, ticks: u64) {
        self.samples += 1;
        self.total_ticks = self.total_ticks.saturating_add(ticks);
        if ticks > self.max_ticks {
            self.max_ticks = ticks;
        }
    }

    /// Get average burst
    pub fn average(&self) -> u64 {
        if self.samples == 0 {
            0
        } else {
            self.total_ticks / self.samples
        }
    }
}
