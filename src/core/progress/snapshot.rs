use std::time::Duration;

use crate::native::Progress;

/// Progress statistics delivered to handlers at one signal firing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Whole seconds the pass has been running
    pub run: u32,
    /// Estimated seconds remaining
    pub eta: u32,
    /// Total pixels in the pass
    pub tpels: u64,
    /// Pixels computed so far
    pub npels: u64,
    /// 0 to 100
    pub percent: u32,
    pub elapsed: Duration,
}

impl From<&Progress> for ProgressSnapshot {
    fn from(p: &Progress) -> Self {
        Self {
            run: p.run.max(0) as u32,
            eta: p.eta.max(0) as u32,
            tpels: p.tpels.max(0) as u64,
            npels: p.npels.max(0) as u64,
            percent: p.percent.clamp(0, 100) as u32,
            elapsed: Duration::from_secs_f64(p.elapsed.max(0.0)),
        }
    }
}

impl std::fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}% ({}/{} pels), eta {}s",
            self.percent, self.npels, self.tpels, self.eta
        )
    }
}
