use std::time::Duration;

use super::destination::Destination;
use super::error::StreamError;

/// Sample rates with an MPEG-4 sampling frequency index, 8 kHz and up.
///
/// Encoders describe these with a two-byte codec config; any other rate
/// would need the explicit-frequency form.
pub const SUPPORTED_SAMPLE_RATES: [u32; 12] = [
    8_000, 11_025, 12_000, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000, 64_000, 88_200, 96_000,
];

/// Immutable per-session configuration.
///
/// Validated once by [`SessionConfig::parse`] / [`SessionConfig::validate`]
/// before a session starts and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Where the audio is published.
    pub destination: Destination,

    /// Capture and encode sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Interleaved channel count, 1 or 2 (default: 1).
    pub channel_count: u16,

    /// Target encoder bitrate in bits per second (default: 128000).
    pub bitrate: u32,
}

impl SessionConfig {
    pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
    pub const DEFAULT_CHANNEL_COUNT: u16 = 1;
    pub const DEFAULT_BITRATE: u32 = 128_000;

    /// Parse the destination and validate the audio parameters.
    pub fn parse(
        destination: &str,
        sample_rate: u32,
        channel_count: u16,
        bitrate: u32,
    ) -> Result<Self, StreamError> {
        let config = Self {
            destination: Destination::parse(destination)?,
            sample_rate,
            channel_count,
            bitrate,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse the destination and use the default audio parameters.
    pub fn with_defaults(destination: &str) -> Result<Self, StreamError> {
        Self::parse(
            destination,
            Self::DEFAULT_SAMPLE_RATE,
            Self::DEFAULT_CHANNEL_COUNT,
            Self::DEFAULT_BITRATE,
        )
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(StreamError::invalid(format!(
                "unsupported sample rate: {}",
                self.sample_rate
            )));
        }
        if ![1, 2].contains(&self.channel_count) {
            return Err(StreamError::invalid(format!(
                "unsupported channel count: {}",
                self.channel_count
            )));
        }
        if self.bitrate == 0 {
            return Err(StreamError::invalid("bitrate must be positive"));
        }
        Ok(())
    }
}

/// Controller tuning that applies to every session it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Upper bound on a single capture pull. Also bounds how long a
    /// concurrent `stop()` waits for the pump loop to notice it.
    pub capture_timeout: Duration,

    /// Number of encoder input slots. When all are occupied the pump drops
    /// the frame instead of blocking capture.
    pub encoder_queue_depth: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            capture_timeout: Duration::from_millis(100),
            encoder_queue_depth: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_plugin_defaults() {
        let config = SessionConfig::with_defaults("rtmp://host/app/key").unwrap();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.channel_count, 1);
        assert_eq!(config.bitrate, 128_000);
        assert_eq!(config.destination.stream_key, "key");
    }

    #[test]
    fn rejects_bad_parameters() {
        let cases = [
            (0, 1, 128_000),
            (9_000, 1, 128_000),
            (7_350, 1, 128_000),
            (192_000, 2, 128_000),
            (44_100, 3, 128_000),
            (44_100, 0, 128_000),
            (44_100, 2, 0),
        ];
        for (rate, channels, bitrate) in cases {
            let err = SessionConfig::parse("rtmp://host/app/key", rate, channels, bitrate).unwrap_err();
            assert!(matches!(err, StreamError::InvalidArgument(_)));
        }
    }

    #[test]
    fn accepts_every_indexed_rate() {
        for rate in SUPPORTED_SAMPLE_RATES {
            assert!(SessionConfig::parse("rtmp://host/app/key", rate, 2, 64_000).is_ok(), "{rate}");
        }
    }

    #[test]
    fn rejects_missing_destination() {
        assert!(matches!(
            SessionConfig::with_defaults(""),
            Err(StreamError::InvalidArgument(_))
        ));
    }
}
