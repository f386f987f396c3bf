//! The decoder worker: a dedicated thread running the `decodeStart`
//! protocol and the IDLE/DECODING state machine, exactly as MPD's
//! `decoder_task`/`decodeStart` do.

use std::sync::Arc;

use spindle_audio_decoder::{
    DecodeSink, InputStream, LocalFileStream, PluginRegistry, StreamTypes, UrlStream,
};

use crate::control::{Command, ControlState, DecodeError as ControlError, DecodeState};
use crate::notify::Notify;
use crate::song_ref::SongRef;

/// Runs the worker loop on the current thread until told to shut down
/// by dropping every [`Arc`] clone of `control`/`decoder_notify` and
/// breaking the caller's own loop — there is no explicit shutdown
/// command, matching MPD's detached decoder thread.
pub fn run<F>(
    control: &Arc<ControlState>,
    decoder_notify: &Arc<Notify>,
    client_notify: &Arc<Notify>,
    registry: &PluginRegistry,
    make_sink: F,
) where
    F: Fn() -> Box<dyn DecodeSink>,
{
    loop {
        debug_assert_eq!(control.state(), DecodeState::Stop);

        match control.command() {
            command @ (Command::Start | Command::Seek) => {
                log::debug!("worker: dispatching {command:?}");
                decode_start(control, client_notify, registry, &make_sink);
            }
            Command::Stop => {
                log::trace!("worker: STOP with nothing decoding, ignoring");
                control.set_command(Command::None);
                client_notify.signal();
            }
            Command::None => {
                decoder_notify.wait();
                client_notify.signal();
            }
        }
    }
}

fn decode_start<F>(
    control: &ControlState,
    client_notify: &Notify,
    registry: &PluginRegistry,
    make_sink: &F,
) where
    F: Fn() -> Box<dyn DecodeSink>,
{
    // A command of Seek while idle is a start-then-seek: there was no
    // decode in progress to seek within, so begin decoding the current
    // song from `seek_where` instead of position 0.
    let seek_time = (control.command() == Command::Seek).then(|| control.seek_where());

    let Some(song) = control.take_current_song() else {
        log::debug!("worker: no song queued, returning to STOP");
        control.set_state(DecodeState::Stop);
        control.set_command(Command::None);
        return;
    };

    log::debug!("worker: decoding {song:?}");
    control.set_state(DecodeState::Start);
    control.set_command(Command::None);
    client_notify.signal();

    let mut stream: Box<dyn InputStream> = match open_stream(&song) {
        Ok(stream) => stream,
        Err(()) => {
            log::warn!("worker: failed to open stream for {song:?}");
            control.set_error(Some(ControlError::File));
            control.set_state(DecodeState::Stop);
            control.set_command(Command::None);
            return;
        }
    };

    if wait_for_ready(stream.as_mut(), control).is_err() {
        log::debug!("worker: readiness wait aborted by command or I/O error");
        finish(control, client_notify);
        return;
    }

    control.set_seekable(stream.seekable());

    if control.command() == Command::Stop {
        log::debug!("worker: STOP observed after readiness wait, aborting decode");
        finish(control, client_notify);
        return;
    }

    let mut sink = make_sink();
    match dispatch(&song, stream, registry, sink.as_mut(), seek_time) {
        Ok(()) => log::debug!("worker: decode of {song:?} finished"),
        Err(DispatchError::UnknownType) => {
            log::warn!("worker: no plugin could decode {song:?}");
            control.set_error(Some(ControlError::UnknownType));
        }
        Err(DispatchError::Failed) => {
            log::warn!("worker: decode of {song:?} failed");
            control.set_error(Some(ControlError::File));
        }
    }

    finish(control, client_notify);
}

/// Polls `stream` until it reports ready, aborting early on an
/// intervening controller command or a buffering failure. Matches the
/// original's readiness wait: a cooperative, level-triggered poll
/// rather than a blocking read, so a STOP can be observed mid-wait.
fn wait_for_ready(stream: &mut dyn InputStream, control: &ControlState) -> Result<(), ()> {
    while !stream.is_ready() {
        if control.command() != Command::None {
            return Err(());
        }
        if stream.buffer().is_err() {
            return Err(());
        }
    }
    Ok(())
}

fn finish(control: &ControlState, client_notify: &Notify) {
    control.set_state(DecodeState::Stop);
    control.set_command(Command::None);
    client_notify.signal();
}

fn open_stream(song: &SongRef) -> Result<Box<dyn InputStream>, ()> {
    match song {
        SongRef::File(path) => LocalFileStream::open(path)
            .map(|stream| Box::new(stream) as Box<dyn InputStream>)
            .map_err(|_| ()),
        SongRef::Url(url) => Ok(Box::new(UrlStream::open(url.clone()))),
    }
}

enum DispatchError {
    UnknownType,
    Failed,
}

fn dispatch(
    song: &SongRef,
    stream: Box<dyn InputStream>,
    registry: &PluginRegistry,
    sink: &mut dyn DecodeSink,
    seek_time: Option<f64>,
) -> Result<(), DispatchError> {
    if song.is_file() {
        dispatch_file(song, stream, registry, sink, seek_time)
    } else {
        dispatch_url(song, stream, registry, sink, seek_time)
    }
}

fn dispatch_url(
    song: &SongRef,
    mut stream: Box<dyn InputStream>,
    registry: &PluginRegistry,
    sink: &mut dyn DecodeSink,
    seek_time: Option<f64>,
) -> Result<(), DispatchError> {
    // First: try plugins by the stream's reported MIME type.
    if let Some(mime) = stream.mime() {
        for plugin in registry.by_mime(&mime) {
            let Some(stream_decode) = plugin.entry.stream_decode() else {
                continue;
            };
            if !plugin.stream_types().contains(StreamTypes::URL) {
                continue;
            }
            if let Some(try_decode) = &plugin.try_decode
                && !try_decode(stream.as_mut())
            {
                continue;
            }
            log::trace!("worker: dispatching {:?} by mime {mime:?}", plugin.name);
            return stream_decode(stream, sink, seek_time).map_err(|_| DispatchError::Failed);
        }
    }

    // Second: fall back to suffix matching against the URL's path.
    if let Some(suffix) = song.suffix() {
        for plugin in registry.by_suffix(suffix) {
            let Some(stream_decode) = plugin.entry.stream_decode() else {
                continue;
            };
            if !plugin.stream_types().contains(StreamTypes::URL) {
                continue;
            }
            if let Some(try_decode) = &plugin.try_decode
                && !try_decode(stream.as_mut())
            {
                continue;
            }
            log::trace!("worker: dispatching {:?} by suffix {suffix:?}", plugin.name);
            return stream_decode(stream, sink, seek_time).map_err(|_| DispatchError::Failed);
        }
    }

    // Last resort: bastard streams with neither a suffix nor a MIME
    // type get handed to the mp3 plugin unconditionally.
    if let Some(plugin) = registry.by_name("mp3")
        && let Some(stream_decode) = plugin.entry.stream_decode()
    {
        log::trace!("worker: no mime or suffix match, falling back to mp3 plugin");
        return stream_decode(stream, sink, seek_time).map_err(|_| DispatchError::Failed);
    }

    Err(DispatchError::UnknownType)
}

fn dispatch_file(
    song: &SongRef,
    mut stream: Box<dyn InputStream>,
    registry: &PluginRegistry,
    sink: &mut dyn DecodeSink,
    seek_time: Option<f64>,
) -> Result<(), DispatchError> {
    let SongRef::File(path) = song else {
        unreachable!("dispatch_file is only called for SongRef::File")
    };
    let Some(suffix) = song.suffix() else {
        return Err(DispatchError::UnknownType);
    };

    for plugin in registry.by_suffix(suffix) {
        if !plugin.stream_types().contains(StreamTypes::FILE) {
            continue;
        }
        if let Some(try_decode) = &plugin.try_decode
            && !try_decode(stream.as_mut())
        {
            continue;
        }

        if let Some(file_decode) = plugin.entry.file_decode() {
            log::trace!("worker: dispatching {:?} by suffix {suffix:?}", plugin.name);
            // Ownership of the stream transfers to the file decoder:
            // drop it before handing over the bare path.
            drop(stream);
            return file_decode(path.clone(), sink, seek_time).map_err(|_| DispatchError::Failed);
        } else if let Some(stream_decode) = plugin.entry.stream_decode() {
            log::trace!("worker: dispatching {:?} by suffix {suffix:?}", plugin.name);
            return stream_decode(stream, sink, seek_time).map_err(|_| DispatchError::Failed);
        }
    }

    Err(DispatchError::UnknownType)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_audio_decoder::{DecodeEntry, DecoderPlugin, InputStreamError};
    use std::io::SeekFrom;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use url::Url;

    /// A stream whose readiness and MIME type are fixed at construction,
    /// standing in for `LocalFileStream`/`UrlStream` in dispatch tests.
    struct FakeStream {
        ready: bool,
        mime: Option<String>,
    }

    impl InputStream for FakeStream {
        fn buffer(&mut self) -> Result<(), InputStreamError> {
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn seekable(&self) -> bool {
            false
        }

        fn size(&self) -> Option<u64> {
            None
        }

        fn mime(&self) -> Option<String> {
            self.mime.clone()
        }

        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, InputStreamError> {
            Ok(0)
        }

        fn seek(&mut self, _pos: SeekFrom) -> Result<u64, InputStreamError> {
            Err(InputStreamError::NotSeekable)
        }
    }

    /// Becomes ready only after a fixed number of `buffer()` calls, so
    /// tests can interleave a controller command mid-wait.
    struct SlowStream {
        polls_until_ready: usize,
    }

    impl InputStream for SlowStream {
        fn buffer(&mut self) -> Result<(), InputStreamError> {
            self.polls_until_ready = self.polls_until_ready.saturating_sub(1);
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.polls_until_ready == 0
        }

        fn seekable(&self) -> bool {
            false
        }

        fn size(&self) -> Option<u64> {
            None
        }

        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, InputStreamError> {
            Ok(0)
        }

        fn seek(&mut self, _pos: SeekFrom) -> Result<u64, InputStreamError> {
            Err(InputStreamError::NotSeekable)
        }
    }

    struct RecordingSink;

    impl DecodeSink for RecordingSink {
        fn write(
            &mut self,
            _decoded: symphonia::core::audio::AudioBuffer<f32>,
        ) -> Result<(), spindle_audio_decoder::DecodeError> {
            Ok(())
        }
    }

    fn file_plugin(
        name: &'static str,
        suffixes: &'static [&'static str],
        log: Arc<Mutex<Vec<&'static str>>>,
    ) -> DecoderPlugin {
        DecoderPlugin {
            name,
            mime_types: &[],
            suffixes,
            try_decode: None,
            entry: DecodeEntry::File(Arc::new(move |_path, _sink, _seek_time| {
                log.lock().unwrap().push(name);
                Ok(())
            })),
        }
    }

    fn url_plugin(
        name: &'static str,
        mimes: &'static [&'static str],
        suffixes: &'static [&'static str],
        log: Arc<Mutex<Vec<&'static str>>>,
    ) -> DecoderPlugin {
        DecoderPlugin {
            name,
            mime_types: mimes,
            suffixes,
            try_decode: None,
            entry: DecodeEntry::Stream(Arc::new(move |_stream, _sink, _seek_time| {
                log.lock().unwrap().push(name);
                Ok(())
            })),
        }
    }

    // S1 - File, suffix dispatch, success.
    #[test]
    fn s1_file_suffix_dispatch_transfers_ownership_to_file_decode() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = PluginRegistry::new(vec![file_plugin("flac", &["flac"], log.clone())]);
        let song = SongRef::File(PathBuf::from("/lib/a.flac"));
        let stream: Box<dyn InputStream> = Box::new(FakeStream {
            ready: true,
            mime: None,
        });
        let mut sink = RecordingSink;

        let result = dispatch(&song, stream, &registry, &mut sink, None);

        assert!(result.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["flac"]);
    }

    // S2 - URL, MIME dispatch.
    #[test]
    fn s2_url_mime_dispatch_prefers_mime_over_suffix() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = PluginRegistry::new(vec![url_plugin(
            "mp3",
            &["audio/mpeg"],
            &["mp3"],
            log.clone(),
        )]);
        let song = SongRef::Url(Url::parse("http://h/s").unwrap());
        let stream: Box<dyn InputStream> = Box::new(FakeStream {
            ready: true,
            mime: Some("audio/mpeg".to_string()),
        });
        let mut sink = RecordingSink;

        let result = dispatch(&song, stream, &registry, &mut sink, None);

        assert!(result.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["mp3"]);
    }

    // S3 - URL, no MIME, suffix fallback.
    #[test]
    fn s3_url_suffix_fallback_when_mime_unmatched() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = PluginRegistry::new(vec![url_plugin("vorbis", &[], &["ogg"], log.clone())]);
        let song = SongRef::Url(Url::parse("http://h/song.ogg").unwrap());
        let stream: Box<dyn InputStream> = Box::new(FakeStream {
            ready: true,
            mime: None,
        });
        let mut sink = RecordingSink;

        let result = dispatch(&song, stream, &registry, &mut sink, None);

        assert!(result.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["vorbis"]);
    }

    // S4 - URL, no MIME, no suffix, mp3 safety net.
    #[test]
    fn s4_url_mp3_fallback_when_no_mime_and_no_suffix() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = PluginRegistry::new(vec![url_plugin(
            "mp3",
            &["audio/mpeg"],
            &["mp3"],
            log.clone(),
        )]);
        let song = SongRef::Url(Url::parse("http://h/stream").unwrap());
        let stream: Box<dyn InputStream> = Box::new(FakeStream {
            ready: true,
            mime: None,
        });
        let mut sink = RecordingSink;

        let result = dispatch(&song, stream, &registry, &mut sink, None);

        assert!(result.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["mp3"]);
    }

    // S5 - STOP during readiness.
    #[test]
    fn s5_stop_during_readiness_wait_aborts_without_dispatch() {
        let control = ControlState::new();
        let mut stream = SlowStream {
            polls_until_ready: 5,
        };

        // Simulate the controller issuing STOP after the worker has
        // already started polling, but before the stream reports ready.
        control.set_command(Command::Stop);

        let result = wait_for_ready(&mut stream, &control);

        assert!(result.is_err());
    }

    #[test]
    fn s5_readiness_wait_succeeds_without_intervening_command() {
        let control = ControlState::new();
        let mut stream = SlowStream {
            polls_until_ready: 3,
        };

        let result = wait_for_ready(&mut stream, &control);

        assert!(result.is_ok());
        assert!(stream.is_ready());
    }

    // S1 variant for seek plumbing: dispatch passes seek_time through to
    // the chosen plugin's decode entry point unchanged.
    #[test]
    fn dispatch_passes_seek_time_through_to_file_decode() {
        let seen_seek_time = Arc::new(Mutex::new(None));
        let captured = seen_seek_time.clone();
        let registry = PluginRegistry::new(vec![DecoderPlugin {
            name: "flac",
            mime_types: &[],
            suffixes: &["flac"],
            try_decode: None,
            entry: DecodeEntry::File(Arc::new(move |_path, _sink, seek_time| {
                *captured.lock().unwrap() = Some(seek_time);
                Ok(())
            })),
        }]);
        let song = SongRef::File(PathBuf::from("/lib/a.flac"));
        let stream: Box<dyn InputStream> = Box::new(FakeStream {
            ready: true,
            mime: None,
        });
        let mut sink = RecordingSink;

        let result = dispatch(&song, stream, &registry, &mut sink, Some(42.5));

        assert!(result.is_ok());
        assert_eq!(*seen_seek_time.lock().unwrap(), Some(Some(42.5)));
    }

    // A STOP->SEEK is equivalent to START-then-seek: decode_start reads
    // seek_where and threads it through as the seek_time for the
    // freshly started decode, instead of always starting from 0.
    #[test]
    fn decode_start_reads_seek_where_when_command_is_seek() {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "spindle-worker-seek-test-{}-{}",
            std::process::id(),
            std::ptr::addr_of!(path) as usize
        ));
        std::fs::write(&path, b"not a real flac file").unwrap();

        let seen_seek_time = Arc::new(Mutex::new(None));
        let captured = seen_seek_time.clone();
        let registry = PluginRegistry::new(vec![DecoderPlugin {
            name: "flac",
            mime_types: &[],
            suffixes: &["flac"],
            try_decode: None,
            entry: DecodeEntry::File(Arc::new(move |_path, _sink, seek_time| {
                *captured.lock().unwrap() = Some(seek_time);
                Ok(())
            })),
        }]);

        let control = ControlState::new();
        control.set_next_song(Some(SongRef::File(path.with_extension("flac"))));
        std::fs::rename(&path, path.with_extension("flac")).unwrap();
        control.set_seek_where(42.5);
        control.set_command(Command::Seek);

        let client_notify = Notify::new();
        decode_start(&control, &client_notify, &registry, &|| {
            Box::new(RecordingSink) as Box<dyn DecodeSink>
        });

        std::fs::remove_file(path.with_extension("flac")).ok();
        assert_eq!(*seen_seek_time.lock().unwrap(), Some(Some(42.5)));
    }
}
