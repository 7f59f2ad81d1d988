//! PCM packetizing encoder.
//!
//! Behaves like a hardware AAC encoder from the pump's point of view: a
//! bounded input queue, an output queue, a leading codec-config unit and
//! fixed 1024-sample access units. The payload is little-endian PCM.

use std::collections::VecDeque;

use rtmp_audio_core::models::config::{ControllerOptions, SessionConfig};
use rtmp_audio_core::models::error::StreamError;
use rtmp_audio_core::models::frame::{AudioFrame, EncodedUnit};
use rtmp_audio_core::processing::sample_fifo::SampleFifo;
use rtmp_audio_core::traits::encoder::AudioEncoder;

/// Samples per channel in one AAC-LC access unit.
pub const SAMPLES_PER_UNIT: usize = 1024;

/// Sample rates indexed by their MPEG-4 sampling frequency index.
const FREQUENCY_INDEX: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// Two-byte AAC-LC `AudioSpecificConfig` for the given format.
///
/// Only rates with a frequency index fit in two bytes.
pub fn audio_specific_config(sample_rate: u32, channels: u16) -> Result<[u8; 2], StreamError> {
    const AAC_LC: u8 = 2;
    let index = FREQUENCY_INDEX
        .iter()
        .position(|&rate| rate == sample_rate)
        .ok_or_else(|| StreamError::encode(format!("no frequency index for {sample_rate} Hz")))?
        as u8;
    Ok([
        (AAC_LC << 3) | (index >> 1),
        ((index & 1) << 7) | ((channels as u8 & 0x0f) << 3),
    ])
}

pub struct PcmPacketizer {
    sample_rate: u32,
    channels: u16,
    depth: usize,
    input: VecDeque<AudioFrame>,
    fifo: SampleFifo,
    /// Presentation time of the oldest sample in `fifo`.
    head_pts_us: Option<i64>,
    output: VecDeque<EncodedUnit>,
    stopped: bool,
}

impl PcmPacketizer {
    pub fn new(config: &SessionConfig, options: &ControllerOptions) -> Result<Self, StreamError> {
        let channels = config.channel_count;
        let unit_samples = SAMPLES_PER_UNIT * channels as usize;
        log::debug!(
            "pcm packetizer: {} Hz, {} ch, target {} bps, {} input slots",
            config.sample_rate,
            channels,
            config.bitrate,
            options.encoder_queue_depth
        );

        let mut output = VecDeque::new();
        output.push_back(EncodedUnit::new(
            audio_specific_config(config.sample_rate, channels)?.to_vec(),
            0,
        ));

        Ok(Self {
            sample_rate: config.sample_rate,
            channels,
            depth: options.encoder_queue_depth.max(1),
            input: VecDeque::new(),
            // One second of headroom before the FIFO starts dropping.
            fifo: SampleFifo::new((config.sample_rate as usize * channels as usize).max(unit_samples * 2)),
            head_pts_us: None,
            output,
            stopped: false,
        })
    }

    /// Frames waiting for an input slot to be processed.
    pub fn queued(&self) -> usize {
        self.input.len()
    }

    fn unit_samples(&self) -> usize {
        SAMPLES_PER_UNIT * self.channels as usize
    }

    fn samples_to_us(&self, samples: usize) -> i64 {
        let frames = (samples / self.channels as usize) as i64;
        frames * 1_000_000 / self.sample_rate as i64
    }

    fn ensure_running(&self) -> Result<(), StreamError> {
        if self.stopped {
            return Err(StreamError::encode("encoder stopped"));
        }
        Ok(())
    }

    /// Move queued frames into the FIFO and cut every complete unit.
    fn encode_pending(&mut self) {
        while let Some(frame) = self.input.pop_front() {
            if self.fifo.is_empty() {
                self.head_pts_us = Some(frame.timestamp_us as i64);
            }
            let before = self.fifo.overflowed();
            self.fifo.write(&frame.samples);
            let lost = (self.fifo.overflowed() - before) as usize;
            if lost > 0 {
                log::warn!("packetizer fifo overflow, {lost} samples lost");
                self.advance_head(lost);
            }
        }

        let unit_samples = self.unit_samples();
        while let Some(samples) = self.fifo.read_exact(unit_samples) {
            self.emit(&samples);
        }
    }

    fn emit(&mut self, samples: &[i16]) {
        let pts = self.head_pts_us.unwrap_or(0);
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.output.push_back(EncodedUnit::new(data, pts));
        self.advance_head(samples.len());
    }

    fn advance_head(&mut self, samples: usize) {
        let step = self.samples_to_us(samples);
        if let Some(pts) = self.head_pts_us.as_mut() {
            *pts += step;
        }
    }
}

impl AudioEncoder for PcmPacketizer {
    fn try_queue(&mut self, frame: AudioFrame) -> Result<bool, StreamError> {
        self.ensure_running()?;
        if frame.len() % self.channels as usize != 0 {
            return Err(StreamError::encode(format!(
                "frame of {} samples is not a whole number of {}-channel frames",
                frame.len(),
                self.channels
            )));
        }
        if self.input.len() >= self.depth {
            return Ok(false);
        }
        self.input.push_back(frame);
        Ok(true)
    }

    fn dequeue(&mut self) -> Result<Option<EncodedUnit>, StreamError> {
        self.ensure_running()?;
        self.encode_pending();
        Ok(self.output.pop_front())
    }

    fn flush(&mut self) -> Result<Vec<EncodedUnit>, StreamError> {
        self.ensure_running()?;
        self.encode_pending();

        let remaining = self.fifo.count();
        if remaining > 0 {
            let tail = self.fifo.read(remaining);
            self.emit(&tail);
        }
        Ok(self.output.drain(..).collect())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.stopped = true;
        self.input.clear();
        self.output.clear();
        self.fifo.reset();
        self.head_pts_us = None;
        Ok(())
    }
}
