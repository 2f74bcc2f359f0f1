use std::time::{Duration, Instant};

/// Wall-clock source for the frame loop.
pub struct Clock {
    last: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self { last: Instant::now() }
    }

    /// Time since the previous call (or since creation/reset).
    pub fn delta(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last;
        self.last = now;
        delta
    }

    pub fn reset(&mut self) {
        self.last = Instant::now();
    }
}

/// Fixed-timestep accumulator. Real elapsed time goes in, whole logic ticks come out and
/// the remainder is carried over to the next frame.
#[derive(Debug, Clone)]
pub struct FixedStep {
    interval: Duration,
    accumulator: Duration,
    ticks: u64,
}

impl FixedStep {
    pub fn new(interval: Duration) -> Self {
        assert!(!interval.is_zero(), "tick interval must be non-zero");
        Self {
            interval,
            accumulator: Duration::ZERO,
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks executed so far.
    #[cfg(test)]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulation time in seconds, i.e. ticks times the interval.
    #[cfg(test)]
    pub fn elapsed_secs(&self) -> f64 {
        self.ticks as f64 * self.interval.as_secs_f64()
    }

    /// Feeds `elapsed` into the accumulator and returns how many ticks are due.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed;
        let mut due = 0;
        while self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            due += 1;
        }
        self.ticks += due as u64;
        due
    }

    /// Like [`FixedStep::advance`] but runs `tick` once per due tick, passing the
    /// simulation time at the start of that tick.
    pub fn run<F: FnMut(f64)>(&mut self, elapsed: Duration, mut tick: F) -> u32 {
        let start = self.ticks;
        let due = self.advance(elapsed);
        for n in 0..due as u64 {
            tick((start + n) as f64 * self.interval.as_secs_f64());
        }
        due
    }

    #[cfg(test)]
    pub fn remainder(&self) -> Duration {
        self.accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> FixedStep {
        FixedStep::new(Duration::from_secs_f64(1.0 / 60.0))
    }

    #[test]
    fn short_frames_accumulate_until_a_tick_is_due() {
        let mut fs = step();
        assert_eq!(fs.advance(Duration::from_millis(10)), 0);
        assert_eq!(fs.advance(Duration::from_millis(10)), 1);
        assert_eq!(fs.remainder(), Duration::from_millis(20) - fs.interval());
    }

    #[test]
    fn remainder_is_kept_not_reset() {
        let mut fs = step();
        fs.advance(Duration::from_millis(25));
        assert!(fs.remainder() > Duration::ZERO);
        assert!(fs.remainder() < fs.interval());
    }

    #[test]
    fn tick_count_is_invariant_under_rechunking() {
        let chunkings: Vec<Vec<u64>> = vec![
            vec![1_000_000_000],
            vec![500_000_000, 500_000_000],
            vec![16_000_000; 62].into_iter().chain([8_000_000]).collect(),
            (0..1000).map(|_| 1_000_000).collect(),
            vec![3, 999_999_997],
            vec![7_777_777, 123_456_789, 868_765_434],
        ];
        for chunks in chunkings {
            let total: u64 = chunks.iter().sum();
            assert_eq!(total, 1_000_000_000);
            let mut fs = step();
            let ran: u32 = chunks
                .iter()
                .map(|ns| fs.advance(Duration::from_nanos(*ns)))
                .sum();
            let expected = Duration::from_nanos(total).as_nanos() / fs.interval().as_nanos();
            assert_eq!(ran as u128, expected, "chunks {:?}", chunks);
            assert_eq!(fs.ticks(), ran as u64);
        }
    }

    #[test]
    fn run_passes_simulation_time_per_tick() {
        let mut fs = FixedStep::new(Duration::from_millis(100));
        let mut seen = vec![];
        fs.run(Duration::from_millis(350), |t| seen.push(t));
        assert_eq!(seen.len(), 3);
        assert!((seen[0] - 0.0).abs() < 1e-9);
        assert!((seen[2] - 0.2).abs() < 1e-9);
        assert!((fs.elapsed_secs() - 0.3).abs() < 1e-9);
    }
}
