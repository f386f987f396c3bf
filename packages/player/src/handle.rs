//! A small facade over [`ControlState`] + [`Notify`] so callers don't
//! hand-write raw control-word mutation at every call site.
//!
//! Shaped like the teacher's `audio_output::command::AudioHandle`
//! (a typed API in front of a shared primitive) but translated to the
//! level-triggered `command` word the worker protocol actually uses:
//! this does not replace word-based signaling with message passing,
//! it just writes the word and signals for you.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::control::{Command, ControlState, DecodeError, DecodeState};
use crate::notify::Notify;
use crate::song_ref::SongRef;

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("decoder did not reach idle before timing out")]
    Timeout,
}

/// Drives the decoder worker from outside its thread.
pub struct PlayerHandle {
    control: Arc<ControlState>,
    decoder_notify: Arc<Notify>,
    client_notify: Arc<Notify>,
}

impl PlayerHandle {
    #[must_use]
    pub const fn new(
        control: Arc<ControlState>,
        decoder_notify: Arc<Notify>,
        client_notify: Arc<Notify>,
    ) -> Self {
        Self {
            control,
            decoder_notify,
            client_notify,
        }
    }

    /// Requests the worker start decoding `song`.
    pub fn start(&self, song: SongRef) {
        self.control.set_next_song(Some(song));
        self.control.set_command(Command::Start);
        self.decoder_notify.signal();
    }

    /// Requests the worker seek within the current song.
    pub fn seek(&self, where_: f64) {
        self.control.set_seek_where(where_);
        self.control.set_command(Command::Seek);
        self.decoder_notify.signal();
    }

    /// Requests the worker stop, if it's decoding.
    pub fn stop(&self) {
        self.control.set_command(Command::Stop);
        self.decoder_notify.signal();
    }

    #[must_use]
    pub fn state(&self) -> DecodeState {
        self.control.state()
    }

    #[must_use]
    pub fn error(&self) -> Option<DecodeError> {
        self.control.error()
    }

    /// Blocks, via the controller-side notification, until the worker
    /// reports `DecodeState::Stop`, or until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// * [`HandleError::Timeout`] if the worker is still not idle once
    ///   `timeout` elapses.
    pub fn wait_for_idle(&self, timeout: Duration) -> Result<(), HandleError> {
        let deadline = Instant::now() + timeout;
        while self.control.state() != DecodeState::Stop {
            if Instant::now() >= deadline {
                return Err(HandleError::Timeout);
            }
            self.client_notify.wait();
        }
        Ok(())
    }
}
