//! The minimal decoder-side API a plugin's decode entry points write
//! through: `DecodeSink` receives raw `symphonia` audio buffers as they
//! come off the packet loop. How those buffers become sound is outside
//! this crate's scope; `spindle_audio_output` supplies a `Sink`-backed
//! implementation.

use switchy_async::util::CancellationToken;
use symphonia::core::audio::AudioBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions, FinalizeResult};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Symphonia(#[from] SymphoniaError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no audio track with a supported codec")]
    NoSupportedTrack,
    #[error("decode cancelled")]
    Cancelled,
    #[error(transparent)]
    InputStream(#[from] crate::input_stream::InputStreamError),
}

/// Receives decoded frames from a packet loop. Implementors typically
/// wrap an `spindle_audio_output::Sink` plus a frame encoder.
pub trait DecodeSink {
    /// # Errors
    ///
    /// * If the sink fails to accept the buffer.
    fn write(&mut self, decoded: AudioBuffer<f32>) -> Result<(), DecodeError>;

    /// # Errors
    ///
    /// * If the sink fails to flush pending audio.
    fn flush(&mut self) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Probes `mss` with `hint`, decodes the first supported track (or
/// `track_num` if given), optionally seeking to `seek_time` first, and
/// writes every decoded buffer to `sink`.
///
/// # Errors
///
/// * If no format reader recognizes the stream.
/// * If decoding encounters a fatal (non-recoverable) error.
///
/// # Panics
///
/// * If `reader.seek` reports `ResetRequired` but no supported track
///   remains — this indicates a malformed stream.
pub fn decode_probed(
    mss: MediaSourceStream,
    hint: &Hint,
    sink: &mut dyn DecodeSink,
    track_num: Option<usize>,
    seek_time: Option<f64>,
    verify: bool,
    cancellation_token: Option<&CancellationToken>,
) -> Result<(), DecodeError> {
    let probed = symphonia::default::get_probe().format(
        hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    decode(
        probed.format,
        sink,
        track_num,
        seek_time,
        DecoderOptions { verify },
        cancellation_token,
    )
}

fn first_supported_track(tracks: &[Track]) -> Option<&Track> {
    tracks
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
}

struct PlayTrackOptions {
    track_id: u32,
    seek_ts: u64,
}

fn decode(
    mut reader: Box<dyn FormatReader>,
    sink: &mut dyn DecodeSink,
    track_num: Option<usize>,
    seek_time: Option<f64>,
    decode_opts: DecoderOptions,
    cancellation_token: Option<&CancellationToken>,
) -> Result<(), DecodeError> {
    let track = track_num
        .and_then(|t| reader.tracks().get(t))
        .or_else(|| first_supported_track(reader.tracks()));
    let Some(track) = track else {
        return Err(DecodeError::NoSupportedTrack);
    };
    let mut track_id = track.id;

    let seek_ts = seek_time.map_or(0, |time| {
        let seek_to = SeekTo::Time {
            time: Time::from(time),
            track_id: Some(track_id),
        };
        match reader.seek(SeekMode::Accurate, seek_to) {
            Ok(seeked_to) => seeked_to.required_ts,
            Err(SymphoniaError::ResetRequired) => {
                track_id = first_supported_track(reader.tracks())
                    .expect("stream has no supported track after reset")
                    .id;
                0
            }
            Err(err) => {
                log::warn!("seek error: {err}");
                0
            }
        }
    });

    let mut options = PlayTrackOptions { track_id, seek_ts };
    loop {
        match play_track(&mut reader, sink, &options, decode_opts, cancellation_token) {
            Err(DecodeError::Symphonia(SymphoniaError::ResetRequired)) => {
                let track_id = first_supported_track(reader.tracks())
                    .expect("stream has no supported track after reset")
                    .id;
                options = PlayTrackOptions {
                    track_id,
                    seek_ts: 0,
                };
            }
            result => break ignore_end_of_stream(result),
        }
    }
}

fn play_track(
    reader: &mut Box<dyn FormatReader>,
    sink: &mut dyn DecodeSink,
    options: &PlayTrackOptions,
    decode_opts: DecoderOptions,
    cancellation_token: Option<&CancellationToken>,
) -> Result<(), DecodeError> {
    let track = reader
        .tracks()
        .iter()
        .find(|track| track.id == options.track_id)
        .expect("track_id was selected from this reader's own tracks")
        .clone();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &decode_opts)?;

    let result = loop {
        if cancellation_token.is_some_and(CancellationToken::is_cancelled) {
            return Err(DecodeError::Cancelled);
        }

        let packet: Packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(err) => break Err(DecodeError::Symphonia(err)),
        };

        if packet.track_id() != options.track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if packet.ts() >= options.seek_ts {
                    let mut buf = decoded.make_equivalent();
                    decoded.convert(&mut buf);
                    sink.write(buf)?;
                }
            }
            Err(SymphoniaError::DecodeError(err)) => {
                log::warn!("decode error: {err}");
            }
            Err(err) => break Err(DecodeError::Symphonia(err)),
        }
    };

    if result.is_ok() || matches!(result, Err(DecodeError::Cancelled)) {
        sink.flush()?;
    }

    result?;

    let finalization: FinalizeResult = decoder.finalize();
    if let Some(false) = finalization.verify_ok {
        log::warn!("decoder verification failed");
    }
    Ok(())
}

fn ignore_end_of_stream(result: Result<(), DecodeError>) -> Result<(), DecodeError> {
    match result {
        Err(DecodeError::Symphonia(SymphoniaError::IoError(err)))
            if err.kind() == std::io::ErrorKind::UnexpectedEof =>
        {
            Ok(())
        }
        other => other,
    }
}
