/// A raw buffer of interleaved 16-bit PCM samples.
///
/// Produced by a [`CaptureSource`](crate::CaptureSource) and moved into the
/// encoder; never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    /// Capture time in microseconds since the session's capture started.
    pub timestamp_us: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, timestamp_us: u64) -> Self {
        Self {
            samples,
            timestamp_us,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }
}

/// One compressed access unit emitted by an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedUnit {
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds, derived from the originating
    /// frame. Zero or negative marks codec metadata rather than audio.
    pub pts_us: i64,
}

impl EncodedUnit {
    pub fn new(data: Vec<u8>, pts_us: i64) -> Self {
        Self { data, pts_us }
    }

    /// Whether this unit carries audio that should be transmitted.
    pub fn is_payload(&self) -> bool {
        !self.data.is_empty() && self.pts_us > 0
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_requires_size_and_positive_pts() {
        assert!(EncodedUnit::new(vec![1, 2], 10).is_payload());
        assert!(!EncodedUnit::new(vec![], 10).is_payload());
        assert!(!EncodedUnit::new(vec![1, 2], 0).is_payload());
        assert!(!EncodedUnit::new(vec![1, 2], -5).is_payload());
    }
}
