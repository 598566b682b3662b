//! Host liveness estimation from heartbeat samples.
//!
//! The host process reports a heartbeat once per tick; the monitor keeps an
//! exponentially-weighted moving average of the implied tick rate. The
//! estimate starts at the nominal rate so a cold start never looks like a
//! stalled host.

use std::sync::Mutex;
use std::time::Instant;

/// Nominal tick rate of a healthy host (ticks per second).
pub const NOMINAL_RATE: f64 = 20.0;

/// Smoothing factor for the rate EWMA.
const ALPHA: f64 = 0.15;

struct State {
    ewma: f64,
    last_heartbeat: Option<Instant>,
}

/// Exponentially-weighted estimate of host responsiveness.
pub struct LivenessMonitor {
    state: Mutex<State>,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                ewma: NOMINAL_RATE,
                last_heartbeat: None,
            }),
        }
    }

    /// Record one heartbeat, measuring the interval since the previous one.
    /// The first heartbeat only establishes the baseline.
    pub fn record_heartbeat(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        if let Some(last) = state.last_heartbeat {
            let dt_ms = now.duration_since(last).as_millis() as u64;
            state.ewma = blend(state.ewma, dt_ms);
        }
        state.last_heartbeat = Some(now);
    }

    /// Fold an explicit heartbeat interval into the estimate. Used by the
    /// job controller's tests and by hosts that measure their own tick
    /// durations.
    pub fn record_interval_ms(&self, dt_ms: u64) {
        let mut state = self.state.lock().unwrap();
        state.ewma = blend(state.ewma, dt_ms);
        state.last_heartbeat = Some(Instant::now());
    }

    /// Current liveness estimate, in ticks per second.
    pub fn liveness(&self) -> f64 {
        self.state.lock().unwrap().ewma
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// `ewma = alpha * (1000 / max(1, dt)) + (1 - alpha) * ewma`
fn blend(ewma: f64, dt_ms: u64) -> f64 {
    let instantaneous = 1000.0 / dt_ms.max(1) as f64;
    ALPHA * instantaneous + (1.0 - ALPHA) * ewma
}
