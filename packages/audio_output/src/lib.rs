#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]
#![forbid(unsafe_code)]

//! The output-sink contract every playback backend satisfies.
//!
//! A [`Sink`] consumes already-aligned PCM bytes. `open` negotiates the
//! final [`AudioFormat`] (a backend may downgrade, e.g. S24 -> S16), `play`
//! accepts short writes and truncates to the sink's `max_chunk`, and
//! `close` must be callable more than once.

use std::fmt;

use thiserror::Error;

pub mod config;
pub mod encoder;

#[cfg(feature = "cpal")]
pub mod cpal;

#[cfg(feature = "pipe")]
pub mod pipe;

pub use config::{ConfigError, OutputConfig};
pub use encoder::FrameEncoder;

/// Sample format of a negotiated [`AudioFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    S8,
    S16,
    S24,
    S32,
    Float,
}

impl SampleFormat {
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::S8 => 1,
            Self::S16 => 2,
            Self::S24 => 3,
            Self::S32 | Self::Float => 4,
        }
    }
}

/// Negotiated PCM format: sample rate, channel count, and sample layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    #[must_use]
    pub const fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// Bytes in one frame (one sample across all channels).
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }
}

#[derive(Debug, Error)]
pub enum SinkOpenError {
    #[error("driver does not support the requested configuration")]
    UnsupportedFormat,
    #[error("backend failed to open: {0}")]
    Backend(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum SinkWriteError {
    #[error("backend refused to accept any data")]
    Fatal,
    #[error("backend write failed: {0}")]
    Backend(String),
}

/// The contract every output backend satisfies: open a format, play
/// frame-aligned bytes (short writes allowed), close idempotently.
pub trait Sink: Send {
    /// Opens the sink for the requested format. May rewrite `format` to
    /// the nearest one the backend actually supports. `write_size` is
    /// the configured write-size hint (see `OutputConfig::write_size`);
    /// the sink combines it with the negotiated frame size to compute
    /// its own `max_chunk` for [`Sink::play`].
    ///
    /// # Errors
    ///
    /// * If the backend cannot be opened at all, or refuses every
    ///   candidate format.
    fn open(
        &mut self,
        format: AudioFormat,
        write_size: usize,
    ) -> Result<AudioFormat, SinkOpenError>;

    /// Submits `src` to the backend, truncated to `min(src.len(),
    /// max_chunk)`, and returns the number of bytes actually accepted,
    /// always a multiple of `frame_size`.
    ///
    /// # Errors
    ///
    /// * If the backend rejects the write (including a fatal zero-byte
    ///   acceptance).
    fn play(&mut self, src: &[u8]) -> Result<usize, SinkWriteError>;

    /// Releases backend resources. Must be safe to call more than once.
    fn close(&mut self);
}

/// Immutable descriptor for a registered output backend.
pub struct SinkDescriptor {
    pub name: &'static str,
    #[allow(clippy::type_complexity)]
    create: Box<dyn Fn(&OutputConfig) -> Result<Box<dyn Sink>, SinkOpenError> + Send + Sync>,
}

impl fmt::Debug for SinkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

impl SinkDescriptor {
    pub fn new<F>(name: &'static str, create: F) -> Self
    where
        F: Fn(&OutputConfig) -> Result<Box<dyn Sink>, SinkOpenError> + Send + Sync + 'static,
    {
        Self {
            name,
            create: Box::new(create),
        }
    }

    /// # Errors
    ///
    /// * If the backend fails to construct from `config`.
    pub fn create(&self, config: &OutputConfig) -> Result<Box<dyn Sink>, SinkOpenError> {
        (self.create)(config)
    }
}

/// Given `write_size` bytes and a negotiated `frame_size`, computes the
/// largest chunk a sink will submit to its backend in one `play` call:
/// the write size rounded down to a whole number of frames, but never
/// less than one frame.
#[must_use]
pub fn max_chunk(write_size: usize, frame_size: usize) -> usize {
    std::cmp::max(1, write_size / frame_size) * frame_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn frame_size_is_channels_times_bytes_per_sample() {
        let format = AudioFormat::new(44100, 2, SampleFormat::S16);
        assert_eq!(format.frame_size(), 4);
    }

    #[test_log::test]
    fn max_chunk_rounds_down_to_whole_frames() {
        // S6: write_size=1000, frame_size=4 -> max_chunk=1000
        assert_eq!(max_chunk(1000, 4), 1000);
        assert_eq!(max_chunk(999, 4), 996);
        assert_eq!(max_chunk(3, 4), 4);
    }
}
