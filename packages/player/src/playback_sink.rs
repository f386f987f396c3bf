//! Bridges the decoder's raw `symphonia` frames to an output [`Sink`],
//! the seam the original spec leaves as "hands frames to a decoder-side
//! API out of scope here".

use spindle_audio_decoder::{DecodeError as AudioDecodeError, DecodeSink};
use spindle_audio_output::{AudioFormat, FrameEncoder, SampleFormat, Sink, SinkOpenError};
use symphonia::core::audio::AudioBuffer;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackSinkError {
    #[error(transparent)]
    Open(#[from] SinkOpenError),
    #[error("sink write failed: {0}")]
    Write(String),
}

impl From<PlaybackSinkError> for AudioDecodeError {
    fn from(err: PlaybackSinkError) -> Self {
        Self::Io(std::io::Error::other(err.to_string()))
    }
}

/// Adapts a boxed [`Sink`] into a [`DecodeSink`]: the first decoded
/// buffer negotiates the output format and builds the [`FrameEncoder`];
/// every call after that encodes and writes in `max_chunk`-sized
/// pieces, honoring short writes.
pub struct PlaybackSink {
    sink: Box<dyn Sink>,
    encoder: Option<FrameEncoder>,
    write_size: usize,
}

impl PlaybackSink {
    #[must_use]
    pub const fn new(sink: Box<dyn Sink>, write_size: usize) -> Self {
        Self {
            sink,
            encoder: None,
            write_size,
        }
    }

    fn open(&mut self, spec: &symphonia::core::audio::SignalSpec) -> Result<(), PlaybackSinkError> {
        if self.encoder.is_some() {
            return Ok(());
        }
        let requested = AudioFormat::new(
            spec.rate,
            u16::try_from(spec.channels.count()).unwrap_or(u16::MAX),
            SampleFormat::Float,
        );
        let negotiated = self.sink.open(requested, self.write_size)?;
        self.encoder = Some(FrameEncoder::new(negotiated));
        Ok(())
    }

    /// Writes `bytes` to the sink, looping on short writes — the sink
    /// itself truncates each call to its own `max_chunk`.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PlaybackSinkError> {
        let mut offset = 0;
        while offset < bytes.len() {
            let written = self
                .sink
                .play(&bytes[offset..])
                .map_err(|err| PlaybackSinkError::Write(err.to_string()))?;
            if written == 0 {
                return Err(PlaybackSinkError::Write(
                    "sink accepted zero bytes".to_string(),
                ));
            }
            offset += written;
        }
        Ok(())
    }
}

impl DecodeSink for PlaybackSink {
    fn write(&mut self, decoded: AudioBuffer<f32>) -> Result<(), AudioDecodeError> {
        self.open(decoded.spec())
            .map_err(PlaybackSinkError::into_audio_decode_error)?;
        let bytes = self.encoder.as_ref().unwrap().encode(&decoded);
        self.write_bytes(&bytes)
            .map_err(PlaybackSinkError::into_audio_decode_error)
    }

    fn flush(&mut self) -> Result<(), AudioDecodeError> {
        self.sink.close();
        Ok(())
    }
}

impl PlaybackSinkError {
    fn into_audio_decode_error(self) -> AudioDecodeError {
        self.into()
    }
}
