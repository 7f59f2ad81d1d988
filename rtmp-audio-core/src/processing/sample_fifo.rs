/// Circular FIFO of interleaved 16-bit samples.
///
/// Used to cut capture frames of arbitrary length into fixed-size codec
/// frames. Not synchronized; it lives inside a single encoder.
///
/// Overflow behavior: drops oldest samples and counts them.
#[derive(Debug)]
pub struct SampleFifo {
    buffer: Vec<i16>,
    write_index: usize,
    read_index: usize,
    available: usize,
    capacity: usize,
    overflowed: u64,
}

impl SampleFifo {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0; capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
            capacity,
            overflowed: 0,
        }
    }

    /// Append samples.
    ///
    /// If the FIFO overflows, the oldest samples are dropped. If `samples`
    /// is larger than capacity, only its last `capacity` samples are kept.
    pub fn write(&mut self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }

        let samples = if samples.len() > self.capacity {
            self.overflowed += (samples.len() - self.capacity) as u64;
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        let overflow = (self.available + samples.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % self.capacity;
            self.available -= overflow;
            self.overflowed += overflow as u64;
        }

        for &sample in samples {
            self.buffer[self.write_index] = sample;
            self.write_index = (self.write_index + 1) % self.capacity;
        }
        self.available += samples.len();
    }

    /// Read and remove up to `count` samples.
    pub fn read(&mut self, count: usize) -> Vec<i16> {
        let to_read = count.min(self.available);
        if to_read == 0 {
            return Vec::new();
        }

        let mut result = Vec::with_capacity(to_read);
        for i in 0..to_read {
            result.push(self.buffer[(self.read_index + i) % self.capacity]);
        }
        self.read_index = (self.read_index + to_read) % self.capacity;
        self.available -= to_read;
        result
    }

    /// Read exactly `count` samples, or nothing if fewer are buffered.
    pub fn read_exact(&mut self, count: usize) -> Option<Vec<i16>> {
        if count == 0 || self.available < count {
            return None;
        }
        Some(self.read(count))
    }

    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Total number of samples lost to overflow since creation.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_write_read() {
        let mut fifo = SampleFifo::new(10);
        fifo.write(&[1, 2, 3]);

        assert_eq!(fifo.count(), 3);
        assert_eq!(fifo.read(3), vec![1, 2, 3]);
        assert!(fifo.is_empty());
    }

    #[test]
    fn read_exact_waits_for_full_frame() {
        let mut fifo = SampleFifo::new(16);
        fifo.write(&[1, 2, 3]);
        assert_eq!(fifo.read_exact(4), None);
        assert_eq!(fifo.count(), 3);

        fifo.write(&[4, 5]);
        assert_eq!(fifo.read_exact(4), Some(vec![1, 2, 3, 4]));
        assert_eq!(fifo.count(), 1);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut fifo = SampleFifo::new(4);
        fifo.write(&[1, 2, 3, 4]);
        fifo.write(&[5, 6]);

        assert_eq!(fifo.count(), 4);
        assert_eq!(fifo.overflowed(), 2);
        assert_eq!(fifo.read(4), vec![3, 4, 5, 6]);
    }

    #[test]
    fn write_larger_than_capacity() {
        let mut fifo = SampleFifo::new(3);
        fifo.write(&[1, 2, 3, 4, 5]);

        assert_eq!(fifo.read(3), vec![3, 4, 5]);
        assert_eq!(fifo.overflowed(), 2);
    }

    #[test]
    fn wraparound() {
        let mut fifo = SampleFifo::new(4);
        fifo.write(&[1, 2, 3]);
        fifo.read(2);
        fifo.write(&[4, 5, 6]);

        assert_eq!(fifo.count(), 4);
        assert_eq!(fifo.read(4), vec![3, 4, 5, 6]);
    }

    #[test]
    fn reset_clears() {
        let mut fifo = SampleFifo::new(10);
        fifo.write(&[1, 2, 3]);
        fifo.reset();

        assert!(fifo.is_empty());
        assert!(fifo.read(10).is_empty());
    }
}
