//! The conversion cascade: planning and per-channel execution.

pub mod half_fir;
pub mod plan;
pub mod stage;

pub use plan::CascadePlan;
pub use stage::{FixedClock, Stage};

use crate::fifo::SampleFifo;

/// Per-channel streaming converter instantiated from a [`CascadePlan`].
///
/// Feed with [`RateConverter::input`], pump with [`RateConverter::process`],
/// drain with [`RateConverter::output`]. Output counts are inexact while
/// streaming (block convolution buffers internally) and become exact after
/// [`RateConverter::flush`]: the total emitted is `round(samples_in /
/// factor)`.
#[derive(Debug)]
pub struct RateConverter {
    stages: Vec<Stage>,
    output: SampleFifo,
    factor: f64,
    samples_in: u64,
    samples_out: u64,
}

impl RateConverter {
    /// Builds the stage chain, pre-loading each stage's FIFO with the zeros
    /// that absorb its filter delay.
    pub fn new(plan: &CascadePlan) -> Self {
        let ctx = plan.context();
        let mut stages: Vec<Stage> = plan.stages.iter().map(|s| s.instantiate(ctx)).collect();
        for s in &mut stages {
            let preload = s.preload;
            s.fifo.write_zeros(preload);
        }
        Self {
            stages,
            output: SampleFifo::new(),
            factor: plan.factor(),
            samples_in: 0,
            samples_out: 0,
        }
    }

    /// Input rate divided by output rate.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Total samples accepted so far.
    pub fn samples_in(&self) -> u64 {
        self.samples_in
    }

    /// Total samples emitted so far.
    pub fn samples_out(&self) -> u64 {
        self.samples_out
    }

    /// Queues `samples` at the head of the cascade.
    pub fn input(&mut self, samples: &[f64]) {
        self.samples_in += samples.len() as u64;
        match self.stages.first_mut() {
            Some(stage) => stage.fifo.write(samples),
            None => self.output.write(samples),
        }
    }

    /// Pumps every stage over whatever it has buffered.
    pub fn process(&mut self) {
        for i in 0..self.stages.len() {
            let (head, tail) = self.stages.split_at_mut(i + 1);
            let out = match tail.first_mut() {
                Some(next) => &mut next.fifo,
                None => &mut self.output,
            };
            head[i].process(out);
        }
    }

    /// Converted samples waiting to be read.
    pub fn occupancy(&self) -> usize {
        self.output.occupancy()
    }

    /// Reads up to `max` converted samples.
    pub fn output(&mut self, max: usize) -> &[f64] {
        let n = max.min(self.output.occupancy());
        self.samples_out += n as u64;
        self.output.read(n).unwrap_or(&[])
    }

    /// Reads converted samples into `out`, returning the count copied.
    pub fn output_into(&mut self, out: &mut [f64]) -> usize {
        let n = self.output.read_into(out);
        self.samples_out += n as u64;
        n
    }

    /// Pushes synthetic zeros through the cascade until exactly
    /// `round(samples_in / factor)` samples have been produced in total,
    /// then trims any excess tail.
    pub fn flush(&mut self) {
        let target = (self.samples_in as f64 / self.factor + 0.5) as u64;
        if target <= self.samples_out {
            return;
        }
        let remaining = (target - self.samples_out) as usize;
        let zeros = [0.0f64; 1024];
        while !self.stages.is_empty() && self.output.occupancy() < remaining {
            if let Some(stage) = self.stages.first_mut() {
                stage.fifo.write(&zeros);
            }
            self.process();
        }
        self.output.trim_to(remaining);
        self.samples_in = 0;
    }
}
