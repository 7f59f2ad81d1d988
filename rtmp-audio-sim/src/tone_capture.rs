//! Real-time paced sine tone standing in for a microphone.
//!
//! Delivers 20 ms frames of interleaved 16-bit PCM at the wall-clock rate
//! a device would, so the pump loop sees realistic blocking reads.

use std::f32::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use rtmp_audio_core::models::config::SessionConfig;
use rtmp_audio_core::models::error::StreamError;
use rtmp_audio_core::models::frame::AudioFrame;
use rtmp_audio_core::traits::capture_source::CaptureSource;

const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Sine generator implementing [`CaptureSource`].
pub struct ToneCapture {
    sample_rate: u32,
    channels: u16,
    frequency: f32,
    amplitude: f32,
    phase: f32,
    started: Option<Instant>,
    frames_delivered: u64,
    fail_after: Option<u64>,
}

impl ToneCapture {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channel_count,
            frequency: 440.0,
            amplitude: 0.25,
            phase: 0.0,
            started: None,
            frames_delivered: 0,
            fail_after: None,
        }
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Report a device failure once `frames` frames have been delivered.
    pub fn fail_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Samples per channel in one frame.
    pub fn frame_len(&self) -> usize {
        (self.sample_rate as u64 * FRAME_DURATION.as_millis() as u64 / 1000) as usize
    }

    fn synthesize(&mut self) -> Vec<i16> {
        let frames = self.frame_len();
        let step = TAU * self.frequency / self.sample_rate as f32;
        let mut samples = Vec::with_capacity(frames * self.channels as usize);

        for _ in 0..frames {
            let value = (self.phase.sin() * self.amplitude * i16::MAX as f32) as i16;
            for _ in 0..self.channels {
                samples.push(value);
            }
            self.phase = (self.phase + step) % TAU;
        }
        samples
    }
}

impl CaptureSource for ToneCapture {
    fn start(&mut self) -> Result<(), StreamError> {
        if self.started.is_some() {
            return Err(StreamError::capture("tone capture already running"));
        }
        log::debug!(
            "tone capture: {} Hz, {} ch, {:.0} Hz tone",
            self.sample_rate,
            self.channels,
            self.frequency
        );
        self.started = Some(Instant::now());
        Ok(())
    }

    fn read(&mut self, timeout: Duration) -> Result<Option<AudioFrame>, StreamError> {
        let Some(started) = self.started else {
            return Err(StreamError::capture("tone capture not started"));
        };

        if self.fail_after.is_some_and(|n| self.frames_delivered >= n) {
            return Err(StreamError::capture("simulated device failure"));
        }

        let due = started + FRAME_DURATION * (self.frames_delivered as u32 + 1);
        let now = Instant::now();
        if due > now {
            let wait = due - now;
            if wait > timeout {
                thread::sleep(timeout);
                return Ok(None);
            }
            thread::sleep(wait);
        }

        let samples = self.synthesize();
        self.frames_delivered += 1;
        let timestamp_us = started.elapsed().as_micros() as u64;
        Ok(Some(AudioFrame::new(samples, timestamp_us)))
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        if self.started.take().is_some() {
            log::debug!("tone capture stopped after {} frames", self.frames_delivered);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rate: u32, channels: u16) -> SessionConfig {
        SessionConfig::parse("rtmp://localhost/live/test", rate, channels, 128_000).unwrap()
    }

    #[test]
    fn frames_are_sized_and_timestamped() {
        let mut capture = ToneCapture::new(&config(48_000, 2));
        capture.start().unwrap();

        let timeout = Duration::from_millis(100);
        let first = capture.read(timeout).unwrap().unwrap();
        let second = capture.read(timeout).unwrap().unwrap();

        assert_eq!(capture.frame_len(), 960);
        assert_eq!(first.len(), 960 * 2);
        assert!(first.timestamp_us > 0);
        assert!(second.timestamp_us >= first.timestamp_us + 15_000);
        // Interleaved channels carry the same tone.
        assert_eq!(first.samples[10], first.samples[11]);
        capture.stop().unwrap();
    }

    #[test]
    fn frequency_sets_the_tone_period() {
        // 1 kHz at 8 kHz repeats every 8 samples; 440 Hz does not.
        let mut tuned = ToneCapture::new(&config(8_000, 1)).with_frequency(1_000.0);
        let mut default = ToneCapture::new(&config(8_000, 1));
        tuned.start().unwrap();
        default.start().unwrap();

        let timeout = Duration::from_millis(100);
        let tuned = tuned.read(timeout).unwrap().unwrap().samples;
        let default = default.read(timeout).unwrap().unwrap().samples;

        assert_eq!(tuned[2], i16::MAX / 4);
        assert!((tuned[9] - tuned[1]).abs() <= 1);
        assert_ne!(tuned[1..9], default[1..9]);
    }

    #[test]
    fn read_before_start_fails() {
        let mut capture = ToneCapture::new(&config(44_100, 1));
        assert!(matches!(
            capture.read(Duration::from_millis(10)),
            Err(StreamError::CaptureFailure(_))
        ));
    }

    #[test]
    fn short_timeout_returns_nothing() {
        let mut capture = ToneCapture::new(&config(44_100, 1));
        capture.start().unwrap();
        assert_eq!(capture.read(Duration::from_millis(1)).unwrap(), None);
    }

    #[test]
    fn injected_failure() {
        let mut capture = ToneCapture::new(&config(16_000, 1)).fail_after(2);
        capture.start().unwrap();

        let timeout = Duration::from_millis(100);
        assert!(capture.read(timeout).unwrap().is_some());
        assert!(capture.read(timeout).unwrap().is_some());
        assert!(matches!(capture.read(timeout), Err(StreamError::CaptureFailure(_))));
    }
}
