use std::thread;
use std::time::{Duration, Instant};

/// Paces the pipeline loop to the display refresh.
pub trait Ticker {
    /// Blocks until the next tick and returns its time, or `None` once cancelled.
    fn wait(&mut self) -> Option<Instant>;

    /// Cancels the tick registration; every later [`Ticker::wait`] returns `None`.
    fn cancel(&mut self);
}

/// Fixed-rate ticker. A cycle that overruns its slot is followed by an immediate tick rather
/// than a burst of catch-up ticks.
pub struct RefreshTicker {
    interval: Duration,
    next: Option<Instant>,
    cancelled: bool,
}

impl RefreshTicker {
    pub fn new(refresh_rate: f32) -> Self {
        let rate = if refresh_rate.is_finite() && refresh_rate > 0.0 {
            refresh_rate
        } else {
            60.0
        };
        Self {
            interval: Duration::from_secs_f32(1.0 / rate),
            next: None,
            cancelled: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Ticker for RefreshTicker {
    fn wait(&mut self) -> Option<Instant> {
        if self.cancelled {
            return None;
        }
        let now = Instant::now();
        let deadline = match self.next {
            Some(next) if next > now => {
                thread::sleep(next - now);
                next
            }
            _ => now,
        };
        self.next = Some(deadline + self.interval);
        Some(deadline)
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_spaced_by_the_interval() {
        let mut ticker = RefreshTicker::new(200.0);
        let first = ticker.wait().unwrap();
        let second = ticker.wait().unwrap();
        assert!(second.duration_since(first) >= ticker.interval());
    }

    #[test]
    fn cancelled_ticker_stops_ticking() {
        let mut ticker = RefreshTicker::new(60.0);
        assert!(ticker.wait().is_some());
        ticker.cancel();
        assert!(ticker.wait().is_none());
    }

    #[test]
    fn bogus_rates_fall_back_to_sixty() {
        let ticker = RefreshTicker::new(0.0);
        assert_eq!(ticker.interval(), Duration::from_secs_f32(1.0 / 60.0));
    }
}
