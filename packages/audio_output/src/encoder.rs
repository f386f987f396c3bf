//! Converts decoded `symphonia` audio buffers into interleaved bytes in
//! a sink's negotiated [`AudioFormat`] — the seam between the decoder
//! worker and the output sink contract.
//!
//! Grounded on the `SampleBuffer`/`copy_interleaved_typed` usage in the
//! teacher's `cpal`/`pulseaudio` backends, which perform the same
//! conversion just before handing samples to the device.

use symphonia::core::audio::{AudioBuffer, RawSampleBuffer, Signal as _};
use symphonia::core::sample::i24;

use crate::{AudioFormat, SampleFormat};

/// Encodes `symphonia` audio buffers into the byte layout a [`Sink`]
/// was opened with.
///
/// [`Sink`]: crate::Sink
pub struct FrameEncoder {
    format: AudioFormat,
}

impl FrameEncoder {
    #[must_use]
    pub const fn new(format: AudioFormat) -> Self {
        Self { format }
    }

    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Encodes `decoded` into interleaved bytes matching
    /// [`FrameEncoder::format`]. Returns an empty vec for an
    /// empty buffer.
    #[must_use]
    pub fn encode(&self, decoded: &AudioBuffer<f32>) -> Vec<u8> {
        if decoded.frames() == 0 {
            return Vec::new();
        }
        match self.format.sample_format {
            SampleFormat::S8 => encode_as::<i8>(decoded),
            SampleFormat::S16 => encode_as::<i16>(decoded),
            SampleFormat::S24 => encode_as::<i24>(decoded),
            SampleFormat::S32 => encode_as::<i32>(decoded),
            SampleFormat::Float => encode_as::<f32>(decoded),
        }
    }
}

fn encode_as<S>(decoded: &AudioBuffer<f32>) -> Vec<u8>
where
    S: symphonia::core::sample::Sample
        + symphonia::core::conv::FromSample<f32>
        + symphonia::core::conv::IntoSample<f32>
        + symphonia::core::audio::RawSample,
{
    let spec = *decoded.spec();
    let mut sample_buf =
        RawSampleBuffer::<S>::new(decoded.capacity() as symphonia::core::units::Duration, spec);
    sample_buf.copy_interleaved_typed(decoded);
    sample_buf.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::audio::{Channels, SignalSpec};

    #[test]
    fn empty_buffer_encodes_to_empty_bytes() {
        let spec = SignalSpec::new(44100, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let buffer = AudioBuffer::<f32>::new(1024, spec);
        let encoder = FrameEncoder::new(AudioFormat::new(44100, 2, SampleFormat::S16));
        assert!(encoder.encode(&buffer).is_empty());
    }

    #[test]
    fn encodes_to_frame_aligned_byte_count() {
        let spec = SignalSpec::new(44100, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let mut buffer = AudioBuffer::<f32>::new(128, spec);
        buffer.render_reserved(Some(128));
        let format = AudioFormat::new(44100, 2, SampleFormat::S16);
        let encoder = FrameEncoder::new(format);
        let bytes = encoder.encode(&buffer);
        assert_eq!(bytes.len() % format.frame_size(), 0);
        assert_eq!(bytes.len(), 128 * format.frame_size());
    }
}
