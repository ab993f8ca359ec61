use std::collections::VecDeque;
use std::time::Instant;

const MEAN_WINDOW: usize = 10;

/// Frame rate bookkeeping, updated once per completed draw cycle.
#[derive(Debug, Clone)]
pub struct FrameTiming {
    last: Instant,
    fps: f32,
    samples: VecDeque<f32>,
}

impl FrameTiming {
    pub fn new(start: Instant) -> Self {
        Self {
            last: start,
            fps: 0.0,
            samples: VecDeque::with_capacity(MEAN_WINDOW + 1),
        }
    }

    /// Records a completed cycle at `now` and returns the instantaneous frame rate.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        // two completions within the clock's resolution: keep the previous reading
        if delta > 0.0 {
            self.fps = 1.0 / delta;
            self.samples.push_back(self.fps);
            if self.samples.len() > MEAN_WINDOW {
                self.samples.pop_front();
            }
        }
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Mean of the last few instantaneous readings.
    pub fn mean_fps(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f32>() / self.samples.len() as f32)
    }

    pub fn label(&self) -> String {
        format!("{:.0} fps", self.fps)
    }
}
