#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]
#![warn(rust_2018_idioms)]

//! The decoder worker's control protocol: a shared [`ControlState`],
//! a `Notify` pair for worker/controller wakeups, the `decodeStart`
//! state machine, and a [`PlayerHandle`] facade in front of it all.

pub mod control;
pub mod handle;
pub mod notify;
pub mod playback_sink;
pub mod song_ref;
pub mod worker;

pub use control::{Command, ControlState, DecodeError, DecodeState};
pub use handle::{HandleError, PlayerHandle};
pub use notify::Notify;
pub use playback_sink::PlaybackSink;
pub use song_ref::{LibraryRoot, LibraryRootError, SongRef};

use std::sync::Arc;
use std::thread;

use spindle_audio_decoder::{DecodeSink, PluginRegistry};

/// Spawns the decoder worker on a dedicated thread and returns a
/// [`PlayerHandle`] to drive it.
///
/// `make_sink` is called once per `decodeStart` to build the
/// [`DecodeSink`] that decoded frames are written to — typically a
/// [`PlaybackSink`] wrapping an output `Sink`.
pub fn spawn<F>(registry: PluginRegistry, make_sink: F) -> PlayerHandle
where
    F: Fn() -> Box<dyn DecodeSink> + Send + 'static,
{
    let control = Arc::new(ControlState::new());
    let decoder_notify = Arc::new(Notify::new());
    let client_notify = Arc::new(Notify::new());

    let worker_control = control.clone();
    let worker_decoder_notify = decoder_notify.clone();
    let worker_client_notify = client_notify.clone();
    thread::Builder::new()
        .name("spindle-decoder".to_string())
        .spawn(move || {
            worker::run(
                &worker_control,
                &worker_decoder_notify,
                &worker_client_notify,
                &registry,
                make_sink,
            );
        })
        .expect("failed to spawn decoder worker thread");

    PlayerHandle::new(control, decoder_notify, client_notify)
}
