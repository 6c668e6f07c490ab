//! Flatline detection
//!
//! A miner that stops producing work often keeps answering its API with the
//! same hashrate figure forever. The detector keeps the last N readings and
//! flags the device once all of them are identical and nonzero.

use std::collections::VecDeque;

/// Result of feeding one reading to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatlineStatus {
    Healthy,
    Flatlined,
}

/// Fixed-capacity ring buffer of recent hashrate readings
#[derive(Debug, Clone)]
pub struct FlatlineWindow {
    readings: VecDeque<f64>,
    capacity: usize,
}

impl FlatlineWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.readings.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    /// Re-create the window empty if the requested capacity changed
    pub fn resize(&mut self, capacity: usize) {
        if capacity != self.capacity {
            *self = Self::new(capacity);
        }
    }

    fn push(&mut self, reading: f64) {
        if self.capacity == 0 {
            return;
        }
        while self.readings.len() >= self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    /// Full, and every reading is bit-for-bit the same nonzero value
    fn is_flat(&self) -> bool {
        if !self.is_full() {
            return false;
        }
        let Some(first) = self.readings.front() else {
            return false;
        };
        // 0.0 and -0.0 both mean idle, which is legitimate after a restart
        if *first == 0.0 {
            return false;
        }
        self.readings.iter().all(|r| r.to_bits() == first.to_bits())
    }
}

/// Stuck-output detector. Stateless; the state lives in each loop's window.
pub struct FlatlineDetector;

impl FlatlineDetector {
    /// Record a reading and report whether the device has flatlined.
    ///
    /// On `Flatlined` the window is cleared so the same stuck value has to fill
    /// it again before it can retrigger.
    pub fn update(window: &mut FlatlineWindow, hashrate: f64) -> FlatlineStatus {
        window.push(hashrate);
        if window.is_flat() {
            window.clear();
            FlatlineStatus::Flatlined
        } else {
            FlatlineStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(window: &mut FlatlineWindow, readings: &[f64]) -> Vec<FlatlineStatus> {
        readings.iter().map(|r| FlatlineDetector::update(window, *r)).collect()
    }

    #[test]
    fn test_flatlines_once_window_is_full() {
        let mut w = FlatlineWindow::new(3);
        let statuses = feed(&mut w, &[512.3, 512.3, 512.3]);
        assert_eq!(
            statuses,
            vec![FlatlineStatus::Healthy, FlatlineStatus::Healthy, FlatlineStatus::Flatlined]
        );
        assert!(w.is_empty());
    }

    #[test]
    fn test_varying_hashrate_is_healthy() {
        let mut w = FlatlineWindow::new(3);
        let statuses = feed(&mut w, &[512.3, 513.0, 511.9, 512.4, 510.0]);
        assert!(statuses.iter().all(|s| *s == FlatlineStatus::Healthy));
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn test_single_differing_sample_resets_detection() {
        let mut w = FlatlineWindow::new(3);
        let statuses = feed(&mut w, &[700.0, 700.0, 701.0, 700.0, 700.0]);
        assert!(statuses.iter().all(|s| *s == FlatlineStatus::Healthy));
        // Third identical reading after the blip completes a flat window
        assert_eq!(FlatlineDetector::update(&mut w, 700.0), FlatlineStatus::Flatlined);
    }

    #[test]
    fn test_zero_hashrate_is_never_flatlined() {
        let mut w = FlatlineWindow::new(2);
        let statuses = feed(&mut w, &[0.0, 0.0, 0.0, -0.0]);
        assert!(statuses.iter().all(|s| *s == FlatlineStatus::Healthy));
    }

    #[test]
    fn test_no_retrigger_on_next_sample() {
        let mut w = FlatlineWindow::new(2);
        assert_eq!(feed(&mut w, &[9.5, 9.5])[1], FlatlineStatus::Flatlined);
        assert_eq!(FlatlineDetector::update(&mut w, 9.5), FlatlineStatus::Healthy);
        assert_eq!(FlatlineDetector::update(&mut w, 9.5), FlatlineStatus::Flatlined);
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut w = FlatlineWindow::new(2);
        feed(&mut w, &[1.0, 2.0, 3.0]);
        assert_eq!(w.len(), 2);
        assert_eq!(FlatlineDetector::update(&mut w, 3.0), FlatlineStatus::Flatlined);
    }

    #[test]
    fn test_resize_clears_only_on_change() {
        let mut w = FlatlineWindow::new(3);
        feed(&mut w, &[1.0, 2.0]);
        w.resize(3);
        assert_eq!(w.len(), 2);
        w.resize(5);
        assert_eq!(w.capacity(), 5);
        assert!(w.is_empty());
    }
}
