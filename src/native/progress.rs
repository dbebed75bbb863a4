use std::time::Duration;

/// Evaluation statistics handed to signal callbacks.
///
/// Laid out for C so it can cross the callback boundary by pointer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    /// Whole seconds the pass has been running
    pub run: i32,
    /// Estimated seconds remaining, 0 until 10% of the work is done
    pub eta: i32,
    /// Total pixels to compute
    pub tpels: i64,
    /// Pixels computed so far
    pub npels: i64,
    /// Percent complete, 0 to 100
    pub percent: i32,
    /// Seconds elapsed with sub-second precision
    pub elapsed: f64,
}

impl Progress {
    pub(crate) fn start(tpels: i64) -> Self {
        Self {
            tpels,
            ..Self::default()
        }
    }

    /// Account for `pels` more pixels computed after `elapsed` wall time.
    pub(crate) fn update(&mut self, pels: i64, elapsed: Duration) {
        self.npels = (self.npels + pels).min(self.tpels);
        self.elapsed = elapsed.as_secs_f64();
        self.run = elapsed.as_secs() as i32;

        if self.tpels > 0 {
            self.percent = (100 * self.npels / self.tpels) as i32;
            let prop = self.npels as f64 / self.tpels as f64;
            if prop > 0.1 {
                let run = self.elapsed;
                self.eta = ((1.0 / prop) * run - run).round() as i32;
            }
        }
    }
}
