#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]
#![warn(rust_2018_idioms)]

//! The input-stream abstraction and decoder plugin contract: how bytes
//! (local file or remote URL) become decoded `symphonia` audio buffers.

pub mod decode;
pub mod input_stream;
pub mod plugin;
pub mod symphonia_plugin;

pub use decode::{DecodeError, DecodeSink};
pub use input_stream::{InputStream, InputStreamError, LocalFileStream, UrlStream};
pub use plugin::{DecodeEntry, DecoderPlugin, PluginRegistry, StreamTypes};

/// Builds the default registry: the `symphonia` reference plugin plus
/// its `mp3` alias (see [`symphonia_plugin::mp3_alias`]).
#[must_use]
pub fn default_registry() -> PluginRegistry {
    PluginRegistry::new(vec![
        symphonia_plugin::plugin(),
        symphonia_plugin::mp3_alias(),
    ])
}
