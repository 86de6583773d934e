//! Circular right-stick gesture used as the camera pan

use std::f64::consts::TAU;
use std::time::Duration;
use tracing::debug;

use crate::input_simulator::InputSink;
use crate::AntiAfkError;

/// Angular steps per full rotation; each loop emits `STEPS_PER_LOOP + 1`
/// samples so the circle closes on its starting point.
pub const STEPS_PER_LOOP: u32 = 60;

/// Parameters for one circular turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularTurn {
    pub loops: u32,
    pub radius: f64,
    /// Time for one full rotation
    pub duration: Duration,
}

impl CircularTurn {
    /// Stick positions of the whole gesture, including the final `(0, 0)` reset
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        (0..self.loops)
            .flat_map(move |_| (0..=STEPS_PER_LOOP).map(move |i| self.point(i)))
            .chain(std::iter::once((0.0, 0.0)))
    }

    fn point(&self, step: u32) -> (f64, f64) {
        let angle = f64::from(step) / f64::from(STEPS_PER_LOOP) * TAU;
        (self.radius * angle.cos(), self.radius * angle.sin())
    }

    /// Sleep between two consecutive samples
    pub fn step_delay(&self) -> Duration {
        self.duration / STEPS_PER_LOOP
    }

    /// Drive the stick through the circle, committing every sample.
    ///
    /// The stick is re-centred even when a sample fails part-way; the first
    /// failure is returned. `sleep` is called after each circle sample and
    /// returns `true` to abandon the rest of the turn.
    pub fn play(
        &self,
        sink: &mut dyn InputSink,
        mut sleep: impl FnMut(Duration) -> bool,
    ) -> Result<(), AntiAfkError> {
        debug!(
            "Playing circular turn: loops={}, radius={}, duration={:?}",
            self.loops, self.radius, self.duration
        );
        let delay = self.step_delay();

        let mut played = || -> Result<(), AntiAfkError> {
            for _ in 0..self.loops {
                for step in 0..=STEPS_PER_LOOP {
                    let (x, y) = self.point(step);
                    sink.set_right_stick(x, y)?;
                    sink.commit()?;
                    if sleep(delay) {
                        debug!("Circular turn interrupted");
                        return Ok(());
                    }
                }
            }
            Ok(())
        };
        let result = played();

        let reset = sink.set_right_stick(0.0, 0.0).and_then(|_| sink.commit());
        result.and(reset)
    }
}
