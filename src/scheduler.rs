use crate::prelude::*;

/// Decision returned by [`ShiftWindow::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// Inside the window; poll now.
    Active,
    /// Outside the window; sleep this long, then re-check.
    Sleep(Duration),
}

/// Daylight polling window in local hours, start inclusive, stop exclusive.
///
/// Pure decision logic: the caller does the sleeping and re-evaluates
/// afterwards, this never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftWindow {
    start: u32,
    stop: u32,
}

impl ShiftWindow {
    pub fn new(start: u32, stop: u32) -> Result<Self> {
        if stop > 23 {
            bail!("shift stop hour {} out of range (0-23)", stop);
        }
        if start >= stop {
            bail!("shift start hour {} must be before stop hour {}", start, stop);
        }

        Ok(Self { start, stop })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn stop(&self) -> u32 {
        self.stop
    }

    pub fn check(&self, hour: u32, minute: u32) -> Shift {
        if self.start <= hour && hour < self.stop {
            return Shift::Active;
        }

        let minutes = if hour >= self.stop && hour < 24 {
            // evening: wrap past midnight to tomorrow's start
            (self.start + 24 - hour) * 60 - minute
        } else if hour < self.start {
            // small hours: same-day start
            (self.start - hour) * 60 - minute
        } else {
            // out-of-range clock input; re-check shortly
            1
        };

        Shift::Sleep(Duration::from_secs(u64::from(minutes) * 60))
    }
}
