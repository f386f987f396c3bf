#![allow(clippy::module_name_repetitions)]

//! `cpal`-backed [`Sink`]: the cross-platform default output backend.
//!
//! Grounded on the buffering/backpressure shape of the teacher's
//! `CpalAudioOutputImpl` (small bounded ring buffer, a `Condvar` the
//! audio callback signals on drain), stripped of progress tracking and
//! volume control (not part of the sink contract) and adapted from an
//! `AudioBuffer<f32>`-typed `write` to the byte-oriented `play` this
//! crate's [`Sink`] trait requires.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SizedSample};

use crate::{
    AudioFormat, OutputConfig, SampleFormat, Sink, SinkDescriptor, SinkOpenError, SinkWriteError,
};

/// Ring buffer capacity target, in seconds of audio at the negotiated rate.
const BUFFER_SECONDS: usize = 2;
const BACKPRESSURE_TIMEOUT: Duration = Duration::from_millis(5000);

trait CpalSample: cpal::Sample + SizedSample + Send + 'static {
    fn write_bytes(out: &mut [Self], bytes: &[u8]);
}

impl CpalSample for f32 {
    fn write_bytes(out: &mut [Self], bytes: &[u8]) {
        for (dst, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
            *dst = f32::from_le_bytes(chunk.try_into().unwrap());
        }
    }
}

impl CpalSample for i16 {
    fn write_bytes(out: &mut [Self], bytes: &[u8]) {
        for (dst, chunk) in out.iter_mut().zip(bytes.chunks_exact(2)) {
            *dst = i16::from_le_bytes(chunk.try_into().unwrap());
        }
    }
}

struct SharedState {
    buffer: Mutex<VecDeque<u8>>,
    space_available: Condvar,
    stream_started: AtomicBool,
}

/// Cross-platform default output sink riding on `cpal`.
pub struct CpalSink {
    device: Device,
    frame_size: usize,
    max_chunk: usize,
    stream: Option<cpal::Stream>,
    shared: Option<Arc<SharedState>>,
}

impl CpalSink {
    #[must_use]
    pub fn new(device: Device) -> Self {
        Self {
            device,
            frame_size: 0,
            max_chunk: 0,
            stream: None,
            shared: None,
        }
    }

    fn build_stream<T: CpalSample>(
        &self,
        config: &cpal::StreamConfig,
        shared: Arc<SharedState>,
    ) -> Result<cpal::Stream, SinkOpenError> {
        self.device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    audio_callback::<T>(data, &shared);
                },
                |err| log::error!("cpal stream error: {err}"),
                None,
            )
            .map_err(|e| SinkOpenError::Backend(e.to_string()))
    }
}

fn audio_callback<T: CpalSample>(output: &mut [T], state: &SharedState) {
    let bytes_per_sample = std::mem::size_of::<T>();
    let Ok(mut buffer) = state.buffer.lock() else {
        return;
    };
    let available_samples = buffer.len() / bytes_per_sample;
    let take = std::cmp::min(output.len(), available_samples);

    let drained: Vec<u8> = buffer.drain(..take * bytes_per_sample).collect();
    T::write_bytes(&mut output[..take], &drained);
    for sample in &mut output[take..] {
        *sample = T::EQUILIBRIUM;
    }
    drop(buffer);
    state.space_available.notify_one();
}

impl Sink for CpalSink {
    fn open(
        &mut self,
        format: AudioFormat,
        write_size: usize,
    ) -> Result<AudioFormat, SinkOpenError> {
        let supported = self
            .device
            .default_output_config()
            .map_err(|e| SinkOpenError::Backend(e.to_string()))?;

        let negotiated_format = match supported.sample_format() {
            cpal::SampleFormat::I16 => AudioFormat::new(
                supported.sample_rate().0,
                format.channels,
                SampleFormat::S16,
            ),
            _ => AudioFormat::new(
                supported.sample_rate().0,
                format.channels,
                SampleFormat::Float,
            ),
        };

        let config = cpal::StreamConfig {
            channels: negotiated_format.channels,
            sample_rate: cpal::SampleRate(negotiated_format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity_bytes = BUFFER_SECONDS
            * negotiated_format.sample_rate as usize
            * negotiated_format.frame_size();
        let shared = Arc::new(SharedState {
            buffer: Mutex::new(VecDeque::with_capacity(capacity_bytes)),
            space_available: Condvar::new(),
            stream_started: AtomicBool::new(false),
        });

        let stream = match negotiated_format.sample_format {
            SampleFormat::S16 => self.build_stream::<i16>(&config, shared.clone())?,
            _ => self.build_stream::<f32>(&config, shared.clone())?,
        };

        self.frame_size = negotiated_format.frame_size();
        self.max_chunk = crate::max_chunk(write_size, self.frame_size);
        self.shared = Some(shared);
        self.stream = Some(stream);
        Ok(negotiated_format)
    }

    fn play(&mut self, src: &[u8]) -> Result<usize, SinkWriteError> {
        debug_assert_eq!(src.len() % self.frame_size.max(1), 0);
        let shared = self.shared.as_ref().ok_or(SinkWriteError::Fatal)?;
        let stream = self.stream.as_ref().ok_or(SinkWriteError::Fatal)?;

        let src = &src[..std::cmp::min(src.len(), self.max_chunk)];
        if src.is_empty() {
            return Ok(0);
        }

        let mut buffer = shared
            .buffer
            .lock()
            .map_err(|_| SinkWriteError::Backend("poisoned buffer lock".to_string()))?;

        let capacity = buffer.capacity();
        while buffer.len() + src.len() > capacity {
            buffer = shared
                .space_available
                .wait_timeout(buffer, BACKPRESSURE_TIMEOUT)
                .map_err(|_| SinkWriteError::Backend("poisoned buffer lock".to_string()))?
                .0;
        }
        buffer.extend(src.iter().copied());
        let buffered = buffer.len();
        drop(buffer);

        if !shared.stream_started.load(Ordering::Relaxed) && buffered >= self.frame_size {
            stream
                .play()
                .map_err(|e| SinkWriteError::Backend(e.to_string()))?;
            shared.stream_started.store(true, Ordering::Relaxed);
        }

        Ok(src.len())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
        self.shared = None;
    }
}

/// Builds a [`SinkDescriptor`] for the default `cpal` output device.
#[must_use]
pub fn descriptor() -> SinkDescriptor {
    SinkDescriptor::new("cpal", |_config: &OutputConfig| {
        let host = cpal::default_host();
        let Some(device) = host.default_output_device() else {
            list_devices(&host);
            return Err(SinkOpenError::Backend(
                "no default output device".to_string(),
            ));
        };
        Ok(Box::new(CpalSink::new(device)))
    })
}

/// Logs every device the host reports, for diagnosing a missing default
/// output device.
fn list_devices(host: &Host) {
    for device in host.output_devices().into_iter().flatten() {
        log::debug!("device: {}", device.name().unwrap_or_default());
    }
}
