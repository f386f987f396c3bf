//! The shared control record the decoder worker and its controller
//! communicate through, plus the level-triggered `command` word the
//! worker polls between blocking operations to notice a request.
//!
//! Resolved (see `DESIGN.md`) as a `Mutex<ControlStateInner>` rather
//! than hand-rolled atomics: the fields always change together, and a
//! mutex over a small struct is no less correct.

use std::sync::Mutex;

use crate::song_ref::SongRef;

/// A request the controller has posted to the worker. Level-triggered:
/// the worker re-reads `command` at every cancellation-safe point
/// rather than consuming a one-shot message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    Start,
    Seek,
    Stop,
}

/// The worker's own state, as observed by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Stop,
    Start,
    Decode,
}

/// Why the worker stopped with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The input stream could not be opened.
    File,
    /// No registered plugin could decode the stream.
    UnknownType,
}

#[derive(Debug, Clone)]
struct ControlStateInner {
    command: Command,
    state: DecodeState,
    error: Option<DecodeError>,
    current_song: Option<SongRef>,
    next_song: Option<SongRef>,
    seekable: bool,
    seek_where: f64,
}

impl Default for ControlStateInner {
    fn default() -> Self {
        Self {
            command: Command::None,
            state: DecodeState::Stop,
            error: None,
            current_song: None,
            next_song: None,
            seekable: false,
            seek_where: 0.0,
        }
    }
}

/// Shared between the decoder worker and any number of controllers.
/// Locked for the duration of each field access; callers should not
/// hold the lock across a blocking operation.
#[derive(Default)]
pub struct ControlState(Mutex<ControlStateInner>);

impl ControlState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ControlStateInner> {
        self.0.lock().unwrap()
    }

    #[must_use]
    pub fn command(&self) -> Command {
        self.lock().command
    }

    pub fn set_command(&self, command: Command) {
        self.lock().command = command;
    }

    #[must_use]
    pub fn state(&self) -> DecodeState {
        self.lock().state
    }

    pub fn set_state(&self, state: DecodeState) {
        self.lock().state = state;
    }

    #[must_use]
    pub fn error(&self) -> Option<DecodeError> {
        self.lock().error
    }

    pub fn set_error(&self, error: Option<DecodeError>) {
        self.lock().error = error;
    }

    #[must_use]
    pub fn next_song(&self) -> Option<SongRef> {
        self.lock().next_song.clone()
    }

    pub fn set_next_song(&self, song: Option<SongRef>) {
        self.lock().next_song = song;
    }

    pub fn take_current_song(&self) -> Option<SongRef> {
        let mut inner = self.lock();
        inner.current_song = inner.next_song.clone();
        inner.current_song.clone()
    }

    #[must_use]
    pub fn seekable(&self) -> bool {
        self.lock().seekable
    }

    pub fn set_seekable(&self, seekable: bool) {
        self.lock().seekable = seekable;
    }

    #[must_use]
    pub fn seek_where(&self) -> f64 {
        self.lock().seek_where
    }

    pub fn set_seek_where(&self, seek_where: f64) {
        self.lock().seek_where = seek_where;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_stop_with_no_command() {
        let control = ControlState::new();
        assert_eq!(control.command(), Command::None);
        assert_eq!(control.state(), DecodeState::Stop);
        assert!(control.error().is_none());
    }

    #[test]
    fn take_current_song_copies_next_song() {
        let control = ControlState::new();
        let song = SongRef::File("a.flac".into());
        control.set_next_song(Some(song.clone()));
        assert_eq!(control.take_current_song(), Some(song));
    }
}
