use std::time::Instant;

/// Frame clock for the harness loop. `tick` returns the seconds elapsed since
/// the previous tick (zero on the first call).
pub struct FrameClock {
    last: Instant,
    delta: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last: Instant::now(), delta: 0.0 }
    }

    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        self.delta
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
