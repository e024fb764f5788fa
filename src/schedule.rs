//! Cooperative yield helper.

use std::thread;
use std::time::{Duration, Instant};

const YIELDS_PER_CPU: usize = 4;

/// Gives sibling threads a chance to run: yields up to four times per
/// available CPU, sleeping a nanosecond each time, and returns once that
/// budget is spent or `max_wait` has elapsed.
pub fn schedule(max_wait: Duration) {
    let started = Instant::now();
    let cpus = thread::available_parallelism().map_or(1, |n| n.get());
    for _ in 0..cpus * YIELDS_PER_CPU {
        if started.elapsed() >= max_wait {
            return;
        }
        thread::yield_now();
        thread::sleep(Duration::from_nanos(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_wait_returns_immediately() {
        let started = Instant::now();
        schedule(Duration::ZERO);
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
