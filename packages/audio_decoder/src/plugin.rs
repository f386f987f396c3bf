//! Decoder plugin descriptors and the registry that looks them up by
//! MIME type, filename suffix, or name.

use std::path::PathBuf;
use std::sync::Arc;

use crate::decode::{DecodeError, DecodeSink};
use crate::input_stream::InputStream;

/// Which kinds of `InputStream` a plugin can decode, as a small bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTypes(u8);

impl StreamTypes {
    pub const FILE: Self = Self(0b01);
    pub const URL: Self = Self(0b10);

    #[must_use]
    pub const fn all() -> Self {
        Self(Self::FILE.0 | Self::URL.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for StreamTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

type StreamDecodeFn = Arc<
    dyn Fn(Box<dyn InputStream>, &mut dyn DecodeSink, Option<f64>) -> Result<(), DecodeError>
        + Send
        + Sync,
>;
type FileDecodeFn =
    Arc<dyn Fn(PathBuf, &mut dyn DecodeSink, Option<f64>) -> Result<(), DecodeError> + Send + Sync>;
type TryDecodeFn = Arc<dyn Fn(&mut dyn InputStream) -> bool + Send + Sync>;

/// The decode entry points a plugin provides: a stream-oriented decoder,
/// a file-oriented decoder (which takes ownership of the path instead
/// of an open stream), or both.
#[derive(Clone)]
pub enum DecodeEntry {
    Stream(StreamDecodeFn),
    File(FileDecodeFn),
    Both {
        stream: StreamDecodeFn,
        file: FileDecodeFn,
    },
}

impl DecodeEntry {
    #[must_use]
    pub const fn stream_types(&self) -> StreamTypes {
        match self {
            Self::Stream(_) => StreamTypes::URL,
            Self::File(_) => StreamTypes::FILE,
            Self::Both { .. } => StreamTypes::all(),
        }
    }

    #[must_use]
    pub fn stream_decode(&self) -> Option<&StreamDecodeFn> {
        match self {
            Self::Stream(f) | Self::Both { stream: f, .. } => Some(f),
            Self::File(_) => None,
        }
    }

    #[must_use]
    pub fn file_decode(&self) -> Option<&FileDecodeFn> {
        match self {
            Self::File(f) | Self::Both { file: f, .. } => Some(f),
            Self::Stream(_) => None,
        }
    }
}

/// Describes a decoder and the MIME types / suffixes it claims to
/// handle, plus its decode entry points.
pub struct DecoderPlugin {
    pub name: &'static str,
    pub mime_types: &'static [&'static str],
    pub suffixes: &'static [&'static str],
    pub try_decode: Option<TryDecodeFn>,
    pub entry: DecodeEntry,
}

impl DecoderPlugin {
    #[must_use]
    pub const fn stream_types(&self) -> StreamTypes {
        self.entry.stream_types()
    }

    #[must_use]
    pub fn handles_mime(&self, mime: &str) -> bool {
        self.mime_types.contains(&mime)
    }

    #[must_use]
    pub fn handles_suffix(&self, suffix: &str) -> bool {
        self.suffixes
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(suffix))
    }
}

/// An immutable registry of decoder plugins, queryable by MIME type,
/// suffix, or name, in registration order.
pub struct PluginRegistry {
    plugins: Vec<DecoderPlugin>,
}

impl PluginRegistry {
    #[must_use]
    pub const fn new(plugins: Vec<DecoderPlugin>) -> Self {
        Self { plugins }
    }

    pub fn by_mime<'a>(&'a self, mime: &'a str) -> impl Iterator<Item = &'a DecoderPlugin> + 'a {
        self.plugins
            .iter()
            .filter(move |plugin| plugin.handles_mime(mime))
    }

    pub fn by_suffix<'a>(
        &'a self,
        suffix: &'a str,
    ) -> impl Iterator<Item = &'a DecoderPlugin> + 'a {
        self.plugins
            .iter()
            .filter(move |plugin| plugin.handles_suffix(suffix))
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&DecoderPlugin> {
        self.plugins.iter().find(|plugin| plugin.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecoderPlugin> {
        self.plugins.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_plugin(
        name: &'static str,
        mimes: &'static [&'static str],
        suffixes: &'static [&'static str],
    ) -> DecoderPlugin {
        DecoderPlugin {
            name,
            mime_types: mimes,
            suffixes,
            try_decode: None,
            entry: DecodeEntry::File(Arc::new(|_path, _sink, _seek_time| Ok(()))),
        }
    }

    #[test]
    fn by_mime_and_suffix_filter_correctly() {
        let registry = PluginRegistry::new(vec![
            fake_plugin("mp3", &["audio/mpeg"], &["mp3"]),
            fake_plugin("flac", &["audio/flac"], &["flac"]),
        ]);
        assert_eq!(registry.by_mime("audio/mpeg").count(), 1);
        assert_eq!(registry.by_suffix("flac").count(), 1);
        assert_eq!(registry.by_suffix("FLAC").count(), 1);
        assert!(registry.by_name("mp3").is_some());
        assert!(registry.by_name("ogg").is_none());
    }
}
