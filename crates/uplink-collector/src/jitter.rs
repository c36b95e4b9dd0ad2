//! Per-link jitter estimation.
//!
//! Keeps a bounded FIFO window of recent latency samples per link name and
//! reports jitter as the population standard deviation of the window.

use std::collections::{HashMap, VecDeque};

/// Population standard deviation. Zero for fewer than two samples.
pub fn population_stddev(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
    variance.sqrt()
}

/// Sliding-window jitter estimator, keyed by link name.
#[derive(Debug)]
pub struct JitterEstimator {
    capacity: usize,
    windows: HashMap<String, VecDeque<f64>>,
}

impl JitterEstimator {
    pub fn new(capacity: usize) -> Self {
        JitterEstimator {
            capacity: capacity.max(1),
            windows: HashMap::new(),
        }
    }

    /// Record a latency sample and return the jitter over the updated window.
    pub fn record(&mut self, link: &str, latency_ms: f64) -> f64 {
        let window = self.windows.entry(link.to_string()).or_default();
        window.push_back(latency_ms);
        while window.len() > self.capacity {
            window.pop_front();
        }
        let samples: Vec<f64> = window.iter().copied().collect();
        population_stddev(&samples)
    }

    pub fn window_len(&self, link: &str) -> usize {
        self.windows.get(link).map_or(0, VecDeque::len)
    }

    /// Shrink (or grow) the window bound. Shrinking evicts oldest first.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        for window in self.windows.values_mut() {
            while window.len() > self.capacity {
                window.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(got: f64, want: f64) {
        assert!((got - want).abs() < 1e-4, "got {got}, want {want}");
    }

    #[test]
    fn jitter_sequence() {
        let mut est = JitterEstimator::new(10);
        assert_close(est.record("L", 100.0), 0.0);
        assert_close(est.record("L", 110.0), 5.0);
        // stddev of {100, 110, 90} = sqrt(200/3)
        assert_close(est.record("L", 90.0), (200.0_f64 / 3.0).sqrt());
    }

    #[test]
    fn window_evicts_oldest() {
        let mut est = JitterEstimator::new(2);
        est.record("L", 100.0);
        est.record("L", 110.0);
        // third sample evicts 100; stddev of {110, 150} = 20
        assert_close(est.record("L", 150.0), 20.0);
        assert_eq!(est.window_len("L"), 2);
    }

    #[test]
    fn first_sample_of_new_link_is_zero() {
        let mut est = JitterEstimator::new(10);
        est.record("a", 50.0);
        est.record("a", 80.0);
        assert_close(est.record("b", 999.0), 0.0);
        assert_eq!(est.window_len("b"), 1);
    }

    #[test]
    fn links_do_not_share_windows() {
        let mut est = JitterEstimator::new(10);
        est.record("a", 10.0);
        est.record("b", 1000.0);
        assert_close(est.record("a", 20.0), 5.0);
    }

    #[test]
    fn shrinking_capacity_evicts_from_front() {
        let mut est = JitterEstimator::new(4);
        for v in [1.0, 2.0, 3.0, 4.0] {
            est.record("L", v);
        }
        est.set_capacity(2);
        assert_eq!(est.window_len("L"), 2);
        // remaining window is {3, 4}; adding 5 gives {4, 5}
        assert_close(est.record("L", 5.0), 0.5);
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut est = JitterEstimator::new(10);
        for i in 0..50 {
            est.record("L", i as f64);
        }
        assert_eq!(est.window_len("L"), 10);
    }

    #[test]
    fn stddev_of_constant_window_is_zero() {
        let mut est = JitterEstimator::new(5);
        for _ in 0..5 {
            assert_close(est.record("L", 42.0), 0.0);
        }
    }
}
