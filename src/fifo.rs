//! Addressable sample FIFO used as the inter-stage transport.
//!
//! Unlike a fixed ring buffer, this queue is growable and keeps its valid
//! region `[begin, end)` contiguous, so stages can run their filters over a
//! plain slice. The discarded prefix is reclaimed by a left-compaction once
//! it exceeds a threshold, which bounds amortized copy cost.

/// Compaction threshold: leading garbage beyond this many items is reclaimed
/// before the backing store is grown.
const FIFO_MIN: usize = 0x4000;

/// Growable FIFO of `f64` samples with reserve/write/read/trim operations.
///
/// Owned exclusively by one stage; no internal locking.
#[derive(Debug, Clone)]
pub struct SampleFifo {
    data: Vec<f64>,
    begin: usize,
    end: usize,
}

impl SampleFifo {
    /// Creates an empty FIFO with the default initial allocation.
    pub fn new() -> Self {
        Self {
            data: vec![0.0; FIFO_MIN],
            begin: 0,
            end: 0,
        }
    }

    /// Number of unread samples.
    #[inline]
    pub fn occupancy(&self) -> usize {
        self.end - self.begin
    }

    /// Returns true when no unread samples are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Discards all contents.
    #[inline]
    pub fn clear(&mut self) {
        self.begin = 0;
        self.end = 0;
    }

    /// The unread samples as a contiguous slice.
    #[inline]
    pub fn valid(&self) -> &[f64] {
        &self.data[self.begin..self.end]
    }

    /// Reserves a writable region of `n` samples at the tail and returns it.
    ///
    /// Grows the backing store if needed; compacts first when the discarded
    /// prefix exceeds the threshold. The region is zero-initialized only on
    /// fresh growth, so callers must overwrite all `n` samples.
    pub fn reserve(&mut self, n: usize) -> &mut [f64] {
        if self.begin == self.end {
            self.clear();
        }
        loop {
            if self.end + n <= self.data.len() {
                let start = self.end;
                self.end += n;
                return &mut self.data[start..self.end];
            }
            if self.begin > FIFO_MIN {
                self.data.copy_within(self.begin..self.end, 0);
                self.end -= self.begin;
                self.begin = 0;
                continue;
            }
            self.data.resize(self.data.len() + n, 0.0);
        }
    }

    /// Appends `samples` at the tail.
    pub fn write(&mut self, samples: &[f64]) {
        self.reserve(samples.len()).copy_from_slice(samples);
    }

    /// Appends `n` zero samples at the tail.
    pub fn write_zeros(&mut self, n: usize) {
        self.reserve(n).fill(0.0);
    }

    /// Reads and consumes `n` samples, returning them as a slice.
    ///
    /// Fails without consuming anything if fewer than `n` are available.
    pub fn read(&mut self, n: usize) -> Option<&[f64]> {
        if n > self.occupancy() {
            return None;
        }
        let start = self.begin;
        self.begin += n;
        Some(&self.data[start..start + n])
    }

    /// Reads and consumes up to `out.len()` samples into `out`.
    ///
    /// Returns the number of samples copied.
    pub fn read_into(&mut self, out: &mut [f64]) -> usize {
        let n = out.len().min(self.occupancy());
        out[..n].copy_from_slice(&self.data[self.begin..self.begin + n]);
        self.begin += n;
        n
    }

    /// Consumes `n` samples without copying them. `n` is clamped to the
    /// occupancy.
    pub fn consume(&mut self, n: usize) {
        self.begin += n.min(self.occupancy());
    }

    /// Shrinks the valid region to exactly `n` samples, dropping the tail.
    pub fn trim_to(&mut self, n: usize) {
        self.end = self.begin + n.min(self.occupancy());
    }

    /// Drops the last `n` samples of the valid region.
    pub fn trim_by(&mut self, n: usize) {
        self.end -= n.min(self.occupancy());
    }
}

impl Default for SampleFifo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let mut f = SampleFifo::new();
        f.write(&[1.0, 2.0, 3.0]);
        assert_eq!(f.occupancy(), 3);
        assert_eq!(f.read(2).unwrap(), &[1.0, 2.0]);
        assert_eq!(f.occupancy(), 1);
        assert_eq!(f.read(1).unwrap(), &[3.0]);
        assert!(f.is_empty());
    }

    #[test]
    fn short_read_fails_without_consuming() {
        let mut f = SampleFifo::new();
        f.write(&[1.0, 2.0]);
        assert!(f.read(3).is_none());
        assert_eq!(f.occupancy(), 2);
    }

    #[test]
    fn reserve_then_trim_by() {
        let mut f = SampleFifo::new();
        let r = f.reserve(8);
        for (i, s) in r.iter_mut().enumerate() {
            *s = i as f64;
        }
        f.trim_by(3);
        assert_eq!(f.occupancy(), 5);
        assert_eq!(f.valid(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn trim_to_keeps_head() {
        let mut f = SampleFifo::new();
        f.write(&[1.0, 2.0, 3.0, 4.0]);
        f.trim_to(2);
        assert_eq!(f.valid(), &[1.0, 2.0]);
    }

    #[test]
    fn grows_past_initial_allocation() {
        let mut f = SampleFifo::new();
        let big: Vec<f64> = (0..3 * FIFO_MIN).map(|i| i as f64).collect();
        f.write(&big);
        assert_eq!(f.occupancy(), big.len());
        assert_eq!(f.valid()[big.len() - 1], (big.len() - 1) as f64);
    }

    #[test]
    fn compaction_preserves_order() {
        let mut f = SampleFifo::new();
        // Fill, drain past the compaction threshold, then force a reserve
        // that must compact rather than grow.
        let n = 2 * FIFO_MIN;
        let data: Vec<f64> = (0..n).map(|i| i as f64).collect();
        f.write(&data);
        f.consume(FIFO_MIN + 16);
        let before: Vec<f64> = f.valid().to_vec();
        f.reserve(FIFO_MIN);
        f.trim_by(FIFO_MIN);
        assert_eq!(f.valid(), &before[..]);
    }

    #[test]
    fn write_zeros() {
        let mut f = SampleFifo::new();
        f.write(&[5.0]);
        f.write_zeros(3);
        assert_eq!(f.valid(), &[5.0, 0.0, 0.0, 0.0]);
    }
}
