// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Progress logging, ported from the teacher's `utils/progress_logger.rs`
//! and extended with a known-total percentage tick (spec.md §6: "a callback
//! receives format-string messages and a completion-percentage tick").

use log::info;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::{Duration, Instant};

pub struct ProgressLogger {
    start: Instant,
    next_log_time: Instant,
    log_interval: Duration,
    count: usize,
    pub expected_updates: Option<usize>,
    name: String,
    last_percent: Option<u32>,
}

impl ProgressLogger {
    const LIGHT_UPDATE_MASK: usize = (1 << 10) - 1;

    pub fn new<S: ToString>(name: S) -> Self {
        ProgressLogger {
            start: Instant::now(),
            next_log_time: Instant::now(),
            log_interval: Duration::from_secs(10),
            count: 0,
            expected_updates: None,
            name: name.to_string(),
            last_percent: None,
        }
    }

    pub fn expected_updates(mut self, n: usize) -> Self {
        self.expected_updates = Some(n);
        self
    }

    pub fn start<T: AsRef<str>>(&mut self, msg: T) {
        self.start = Instant::now();
        self.next_log_time = self.start + self.log_interval;
        info!("{}", msg.as_ref());
    }

    fn update_if(&mut self) {
        let now = Instant::now();
        if self.next_log_time <= now {
            info!("{}", self);
            self.next_log_time = now + self.log_interval;
        }
    }

    pub fn light_update(&mut self) {
        self.count += 1;
        if (self.count & Self::LIGHT_UPDATE_MASK) == 0 {
            self.update_if();
        }
    }

    pub fn update(&mut self) {
        self.count += 1;
        self.update_if();
    }

    /// Only logs when the integer percentage-complete has advanced since the
    /// last call, so a tight loop over a known total doesn't spam the log.
    pub fn update_with_percentage(&mut self) {
        self.count += 1;
        if let Some(total) = self.expected_updates {
            if total > 0 {
                let percent = ((self.count as u64 * 100) / total as u64) as u32;
                if self.last_percent != Some(percent) {
                    self.last_percent = Some(percent);
                    info!("{} ({}% complete)", self, percent);
                    return;
                }
            }
        }
        self.update_if();
    }

    pub fn done<T: AsRef<str>>(&mut self, opt_msg: Option<T>) {
        if let Some(msg) = opt_msg {
            info!("{}", msg.as_ref());
        }
        self.expected_updates = None;
        info!("{}", self);
    }
}

impl Display for ProgressLogger {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let now = Instant::now();
        let elapsed = now - self.start;
        let rate = self.count as f64 / elapsed.as_secs_f64();
        let speed_in_ns = 1.0E9 / rate;
        write!(
            f,
            "{count} {name}, {speed_in_ns} ns/{name} {rate} {name}/s",
            count = self.count,
            name = self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_advances_monotonically() {
        let mut pl = ProgressLogger::new("items").expected_updates(4);
        pl.start("begin");
        for _ in 0..4 {
            pl.update_with_percentage();
        }
        assert_eq!(pl.last_percent, Some(100));
    }
}
