//! Pipe sink: spawns a shell `command` and writes raw PCM to its stdin.
//!
//! A direct transliteration of MPD's `PipeOutputPlugin.cxx`
//! (`popen`/`fwrite`/`pclose`), since the teacher has no equivalent
//! backend of its own.

use std::io::Write as _;
use std::process::{Child, Command, Stdio};

use crate::{AudioFormat, OutputConfig, Sink, SinkDescriptor, SinkOpenError, SinkWriteError};

/// Writes raw PCM bytes to the stdin of a spawned `command`.
pub struct PipeSink {
    command: String,
    child: Option<Child>,
    max_chunk: usize,
}

impl PipeSink {
    #[must_use]
    pub const fn new(command: String) -> Self {
        Self {
            command,
            child: None,
            max_chunk: usize::MAX,
        }
    }
}

impl Sink for PipeSink {
    fn open(
        &mut self,
        format: AudioFormat,
        write_size: usize,
    ) -> Result<AudioFormat, SinkOpenError> {
        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SinkOpenError::Backend(format!("error opening pipe {:?}: {e}", self.command))
            })?;
        self.child = Some(child);
        self.max_chunk = crate::max_chunk(write_size, format.frame_size());
        Ok(format)
    }

    fn play(&mut self, src: &[u8]) -> Result<usize, SinkWriteError> {
        let src = &src[..std::cmp::min(src.len(), self.max_chunk)];
        let child = self.child.as_mut().ok_or(SinkWriteError::Fatal)?;
        let stdin = child.stdin.as_mut().ok_or(SinkWriteError::Fatal)?;
        let written = stdin
            .write(src)
            .map_err(|e| SinkWriteError::Backend(format!("write error on pipe: {e}")))?;
        if written == 0 && !src.is_empty() {
            return Err(SinkWriteError::Fatal);
        }
        Ok(written)
    }

    fn close(&mut self) {
        if let Some(mut child) = self.child.take() {
            drop(child.stdin.take());
            let _ = child.wait();
        }
    }
}

/// Builds a [`SinkDescriptor`] for a pipe sink, reading `command` from
/// the `OutputConfig`.
///
/// # Errors
///
/// * [`SinkOpenError::Config`] if `command` is unset.
#[must_use]
pub fn descriptor() -> SinkDescriptor {
    SinkDescriptor::new("pipe", |config: &OutputConfig| {
        let command = config.command.clone().ok_or_else(|| {
            SinkOpenError::Backend("no \"command\" parameter specified".to_string())
        })?;
        Ok(Box::new(PipeSink::new(command)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SampleFormat;

    #[test]
    fn writes_bytes_to_command_stdin() {
        let mut sink = PipeSink::new("cat > /dev/null".to_string());
        let format = AudioFormat::new(44100, 2, SampleFormat::S16);
        let negotiated = sink.open(format, 1024).unwrap();
        assert_eq!(negotiated, format);
        let written = sink.play(&[0u8; 16]).unwrap();
        assert_eq!(written, 16);
        sink.close();
        sink.close();
    }

    // S6: play of more bytes than max_chunk submits only max_chunk.
    #[test]
    fn play_truncates_to_max_chunk() {
        let mut sink = PipeSink::new("cat > /dev/null".to_string());
        let format = AudioFormat::new(44100, 1, SampleFormat::S8);
        sink.open(format, 1000).unwrap();
        let written = sink.play(&[0u8; 4096]).unwrap();
        assert_eq!(written, 1000);
        sink.close();
    }

    #[test]
    fn missing_command_is_rejected() {
        let descriptor = descriptor();
        let config = OutputConfig {
            command: None,
            ..OutputConfig::default()
        };
        assert!(descriptor.create(&config).is_err());
    }
}
